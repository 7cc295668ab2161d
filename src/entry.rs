//! Entry-point Fixup.
//!
//! Finds whichever Function Recovery section began at `SRC`'s entry point
//! and gives it a `_start` alias. If nothing lines up — a stripped or
//! unusual entry point — this is a diagnostic, not a failure: the rest of
//! the pipeline still produces a valid object, just without `_start`.

use goblin::elf::sym::{STB_GLOBAL, STT_FUNC};
use log::warn;

use crate::object::DestObject;
use crate::source::SourceObject;

/// Add a `_start` symbol aliasing the function section that begins at
/// `src`'s entry point, if one exists.
pub fn fixup_entry_point(src: &SourceObject, dst: &mut DestObject) {
    let entry = src.entry();
    let matching = dst
        .function_sections()
        .into_iter()
        .find(|&idx| dst.sections[idx].addr == entry);

    match matching {
        Some(idx) => {
            let size = dst.sections[idx].size;
            dst.add_symbol("_start", 0, size, STB_GLOBAL, STT_FUNC, idx);
        }
        None => {
            warn!("no recovered function section begins at entry point {entry:#x}; _start omitted");
        }
    }
}
