//! The crate-wide error taxonomy.
//!
//! Kept deliberately small: only conditions that indicate a bug (an
//! invariant violation) or an unusable input are errors here. A
//! relocation pointing into the GOT, stack, or an unclassified region,
//! or targeting an empty layout region, is never represented as a
//! `DelinkError` variant — it is logged via `log::warn!` and the
//! relocation is dropped instead.

use thiserror::Error;

/// Everything that can go wrong while turning an executable into a
/// relocatable object file.
#[derive(Error, Debug)]
pub enum DelinkError {
    /// The input could not be parsed as an ELF file at all.
    #[error("failed to parse input as ELF: {0}")]
    Load(#[from] goblin::error::Error),

    /// The input parsed, but isn't the shape this crate understands.
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    /// No alloc+execinstr section was found; Function Recovery has nothing
    /// to do and there is no way to produce a useful object file.
    #[error("input has no executable section")]
    NoExecutableSection,

    /// A relocation's referent classified as `text`, but Function Recovery
    /// never created a symbol covering that address. This is a bug in
    /// Function Recovery, not a property of the input.
    #[error("relocation at offset {offset:#x} targets address {addr:#x} in text, but no function symbol covers it")]
    MissingFunctionSymbol {
        /// Offset of the relocation in the source executable.
        offset: usize,
        /// The address the relocation's referent resolved to.
        addr: u32,
    },

    /// Finalization's local-first permutation tried to swap in a symbol
    /// index that doesn't exist. Indicates a bug in the permutation
    /// bookkeeping, not a property of the input.
    #[error("symbol permutation referenced out-of-range index {0}")]
    PermutationOutOfRange(usize),

    /// Propagated I/O failure while reading the input or writing the
    /// output file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Propagated failure while serializing the output object with scroll.
    #[error("failed to write output object: {0}")]
    Write(#[from] scroll::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DelinkError>;
