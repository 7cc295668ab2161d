//! The Relocation Reconstructor — the pipeline's core algorithm.
//!
//! For every recovered function section, replays every relocation in
//! `SRC` whose offset falls in the closed interval
//! `[F.addr, F.addr + F.size]`: resolves what the linker actually pointed
//! at, classifies that address via the Memory Layout Reconstructor, and
//! either reuses an already-materialized `DST` symbol or creates a new
//! one. `R_386_32` and `R_386_PC32` are the only relocation types this
//! binary format ever emits for this class of input; anything else is a
//! diagnostic, not a hard error.

use goblin::elf::reloc::{R_386_32, R_386_PC32};
use log::{trace, warn};

use crate::error::{DelinkError, Result};
use crate::layout::{MemoryLayout, PointerClass};
use crate::object::DestObject;
use crate::source::SourceObject;

/// Run the Relocation Reconstructor, appending `.rel<F.name>` entries to
/// `dst` for every function section it already holds.
pub fn reconstruct_relocations(src: &SourceObject, layout: &MemoryLayout, dst: &mut DestObject) -> Result<()> {
    let relocations = src.relocations();

    for fn_idx in dst.function_sections() {
        let (f_addr, f_size) = {
            let section = &dst.sections[fn_idx];
            (section.addr, section.size)
        };

        for reloc in &relocations {
            let offset = reloc.r_offset as u32;
            if offset < f_addr || offset > f_addr + f_size {
                continue;
            }

            let sym = src.symbol(reloc.r_sym);
            let target_addr = match reloc.r_type {
                R_386_32 => src.read_u32_at(reloc.r_offset as usize),
                R_386_PC32 => sym.st_value as u32,
                other => {
                    warn!("skipping relocation of unsupported type {other} at {offset:#x}");
                    continue;
                }
            };

            let mut size = sym.st_size as u32;
            if size == 0 {
                size = src.symbol_size_at(target_addr);
            }

            let class = layout.classify(target_addr);
            trace!("relocation at {offset:#x} targets {target_addr:#x}, classified as {class:?}");

            let symbol_idx = match class {
                PointerClass::Text => match dst.find_symbol_covering(target_addr) {
                    Some(idx) => idx,
                    None => {
                        return Err(DelinkError::MissingFunctionSymbol {
                            offset: reloc.r_offset as usize,
                            addr: target_addr,
                        })
                    }
                },
                PointerClass::Rodata => match dst.find_symbol_covering(target_addr) {
                    Some(idx) => idx,
                    None => {
                        let bytes = src.region_bytes(&layout.rodata, target_addr, size);
                        dst.add_rodata_object(target_addr, bytes)
                    }
                },
                PointerClass::Data => match dst.find_symbol_covering(target_addr) {
                    Some(idx) => idx,
                    None => {
                        let bytes = src.region_bytes(&layout.data, target_addr, size);
                        dst.add_data_object(target_addr, bytes)
                    }
                },
                PointerClass::Bss => match dst.find_symbol_covering(target_addr) {
                    Some(idx) => idx,
                    None => dst.add_bss_object(target_addr, size),
                },
                PointerClass::Got | PointerClass::Stack | PointerClass::Unclassified => {
                    warn!(
                        "dropping relocation at {offset:#x}: target {target_addr:#x} classified as {class:?}"
                    );
                    continue;
                }
            };

            let local_offset = offset - f_addr;
            dst.add_relocation(fn_idx, local_offset, symbol_idx, reloc.r_type);
        }
    }

    Ok(())
}
