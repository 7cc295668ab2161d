//! An index permutation that keeps dependent references consistent.
//!
//! Modeled as a first-class "permutation + dependent references"
//! operation: a callback invoked on each swap lets relocation tables
//! update atomically under the same permutation. Finalization's
//! local-first reordering (Step C) is the only caller, but the type
//! itself knows nothing about symbols or relocations — it is a bijection
//! on `usize` positions, kept together with its inverse, supporting
//! atomic pairwise swaps.

/// A bijection `old position -> new position` on table indices, built up
/// through a sequence of pairwise swaps, with its inverse tracked
/// alongside so a swap can be expressed in terms of either direction.
pub struct Permutation {
    forward: Vec<usize>,
    backward: Vec<usize>,
}

impl Permutation {
    /// The identity permutation on `len` positions.
    pub fn identity(len: usize) -> Self {
        Permutation {
            forward: (0..len).collect(),
            backward: (0..len).collect(),
        }
    }

    /// Swap the entries currently occupying positions `i` and `j`, calling
    /// `on_swap(i, j)` exactly once with the two positions being
    /// exchanged. Callers use `on_swap` to rewrite any dependent
    /// references (e.g. a relocation's `symbol` field) under the same
    /// exchange.
    pub fn swap<F: FnMut(usize, usize)>(&mut self, i: usize, j: usize, mut on_swap: F) {
        if i == j {
            return;
        }
        self.forward.swap(i, j);
        let fi = self.forward[i];
        let fj = self.forward[j];
        self.backward[fi] = i;
        self.backward[fj] = j;
        on_swap(i, j);
    }

    /// Where the entry originally at `old` now lives.
    pub fn map(&self, old: usize) -> usize {
        self.forward[old]
    }

    /// Which original position now occupies `new`.
    pub fn inverse(&self, new: usize) -> usize {
        self.backward[new]
    }

    /// Number of positions tracked.
    pub fn len(&self) -> usize {
        self.forward.len()
    }
}
