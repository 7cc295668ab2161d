//! `delink` turns a fully linked 32-bit x86 ELF executable back into a
//! relocatable object file (`ET_REL`) by inverting static linking: it
//! discovers the functions and data objects inside the executable, emits
//! each as an independent section, rebuilds a symbol table naming them,
//! and reconstructs the relocation entries a linker would need to
//! re-link the result.
//!
//! The embeddable surface is [`run`]; everything else is pipeline
//! internals the CLI binary and the five components above use directly.

mod entry;
mod error;
mod finalize;
mod functions;
mod layout;
mod object;
mod permutation;
mod pipeline;
mod relocations;
mod source;
mod symtab_view;

pub use crate::error::{DelinkError, Result};
pub use crate::layout::{MemoryLayout, PointerClass};
pub use crate::pipeline::run;
