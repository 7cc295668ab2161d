//! A composable, read-only view over a symbol table.
//!
//! Expresses repeated ad-hoc filtering of symbol tables as pure
//! transformations over a materialized symbol table view, with
//! composable predicates, over anything that looks enough like a symbol.

/// The subset of a symbol's fields every filter in this module needs.
/// Implemented by both `goblin::elf::sym::Sym` (for querying `SRC`) and
/// `crate::object::Section` (for querying the in-progress `DST`).
pub trait SymbolLike {
    /// The address or offset this entry's extent starts at.
    fn start(&self) -> u32;
    /// The byte length of this entry's extent. Zero for sizeless symbols.
    fn extent(&self) -> u32;
}

/// A materialized, borrowed view over a symbol table, with chainable
/// predicate filters. Each filter returns a new view over the subset that
/// matched, preserving original order.
pub struct SymtabView<'a, T> {
    entries: Vec<&'a T>,
}

impl<'a, T: SymbolLike> SymtabView<'a, T> {
    /// Wrap a full table as a view over all of its entries.
    pub fn new(table: &'a [T]) -> Self {
        SymtabView {
            entries: table.iter().collect(),
        }
    }

    /// Wrap an already-filtered set of references as a view, for callers
    /// (like `DestObject::find_symbol_covering`) whose candidate set isn't
    /// a contiguous slice of the backing table.
    pub fn from_refs(entries: Vec<&'a T>) -> Self {
        SymtabView { entries }
    }

    /// Entries whose start address falls in `[lo, hi)`.
    pub fn by_range(&self, lo: u32, hi: u32) -> Self {
        SymtabView {
            entries: self
                .entries
                .iter()
                .copied()
                .filter(|e| e.start() >= lo && e.start() < hi)
                .collect(),
        }
    }

    /// Entries whose half-open `[start, start+extent)` span contains
    /// `addr`. This answers "materialize or locate symbol in DST": does
    /// an existing recovered symbol already cover this address?
    pub fn by_containing_addr(&self, addr: u32) -> Self {
        SymtabView {
            entries: self
                .entries
                .iter()
                .copied()
                .filter(|e| e.extent() > 0 && addr >= e.start() && addr < e.start() + e.extent())
                .collect(),
        }
    }

    /// Entries matching an arbitrary predicate, for one-off filters when
    /// the caller's notion of "type" or "name pattern" doesn't fit a
    /// single reusable method.
    pub fn filter<P: Fn(&T) -> bool>(&self, pred: P) -> Self {
        SymtabView {
            entries: self.entries.iter().copied().filter(|e| pred(e)).collect(),
        }
    }

    /// The first matching entry, if any. Relocation reconstruction's
    /// determinism rule ("symbol reuse always picks the first match in
    /// the current symbol table") is this method.
    pub fn first(&self) -> Option<&'a T> {
        self.entries.first().copied()
    }

    /// Whether the view is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All matching entries.
    pub fn all(&self) -> &[&'a T] {
        &self.entries
    }
}
