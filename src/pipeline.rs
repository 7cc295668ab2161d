//! Orchestrates the five components over one input executable: parse
//! `SRC`, reconstruct its memory layout, recover functions, reconstruct
//! relocations, fix up the entry point, finalize, and serialize `DST`.
//! One top-level function a caller (the CLI binary, or an embedding
//! crate) calls once per input.

use std::io::Cursor;

use log::info;

use crate::entry::fixup_entry_point;
use crate::error::{DelinkError, Result};
use crate::finalize::finalize;
use crate::functions::recover_functions;
use crate::layout::MemoryLayout;
use crate::object::DestObject;
use crate::relocations::reconstruct_relocations;
use crate::source::SourceObject;

/// Turn a linked 32-bit x86 `ET_EXEC` executable into an `ET_REL`
/// relocatable object file, returning the serialized bytes of the output.
pub fn run(src_bytes: &[u8]) -> Result<Vec<u8>> {
    let src = SourceObject::parse(src_bytes)?;
    if src.executable_sections().is_empty() {
        return Err(DelinkError::NoExecutableSection);
    }

    info!("reconstructing memory layout");
    let layout = MemoryLayout::reconstruct(&src);

    let mut dst = DestObject::new();

    info!("recovering functions");
    recover_functions(&src, &mut dst);

    info!("reconstructing relocations");
    reconstruct_relocations(&src, &layout, &mut dst)?;

    info!("fixing up entry point");
    fixup_entry_point(&src, &mut dst);

    info!("finalizing object");
    finalize(&mut dst);

    let mut out = Cursor::new(Vec::new());
    dst.write(&mut out)?;
    Ok(out.into_inner())
}
