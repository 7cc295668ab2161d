//! Finalization: the three closing steps that turn an
//! accumulated `DestObject` into something ready to serialize — zero out
//! the provisional virtual addresses Function Recovery and the Relocation
//! Reconstructor needed, add per-section symbols, and move every local
//! symbol to the front of the table (ELF requires locals precede globals).

use goblin::elf::sym::{STB_LOCAL, STT_SECTION};

use crate::object::DestObject;

/// Run all three Finalization steps over `dst` in place.
pub fn finalize(dst: &mut DestObject) {
    for section in dst.sections.iter_mut() {
        section.addr = 0;
    }

    let progbits: Vec<usize> = dst
        .sections
        .iter()
        .enumerate()
        .filter(|(_, s)| s.data.is_some())
        .map(|(i, _)| i)
        .collect();
    for idx in progbits {
        dst.add_symbol("", 0, 0, STB_LOCAL, STT_SECTION, idx);
    }

    dst.finalize_symbol_order();
}
