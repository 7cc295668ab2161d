//! A read-only view over the source executable.
//!
//! Every `goblin` call the pipeline needs lives behind this module, the
//! same way the output writer keeps every `goblin` write call behind
//! one module. `SRC` is immutable for the lifetime of the pipeline, so
//! everything here borrows rather than copies.

use goblin::elf::{Elf, Reloc, SectionHeader, Sym};
use goblin::elf::header::{EM_386, ET_EXEC};
use goblin::elf::section_header::{SHF_ALLOC, SHF_EXECINSTR};
use goblin::elf::sym::STT_FUNC;

use crate::error::{DelinkError, Result};
use crate::layout::Region;

/// The parsed source executable, plus the raw bytes it was parsed from
/// (needed to recover section contents and relocation addends, which
/// `goblin`'s `Elf` does not retain itself).
pub struct SourceObject<'a> {
    pub elf: Elf<'a>,
    pub bytes: &'a [u8],
}

impl<'a> SourceObject<'a> {
    /// Parse `bytes` as a 32-bit x86 `ET_EXEC` ELF file.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let elf = Elf::parse(bytes)?;
        if elf.header.e_machine != EM_386 || elf.is_64 {
            return Err(DelinkError::UnsupportedInput(
                "delink only understands 32-bit EM_386 input".into(),
            ));
        }
        if elf.header.e_type != ET_EXEC {
            return Err(DelinkError::UnsupportedInput(
                "input is not an ET_EXEC executable".into(),
            ));
        }
        if elf.syms.is_empty() {
            return Err(DelinkError::UnsupportedInput(
                "input has no symbol table (stripped binaries are unsupported)".into(),
            ));
        }
        Ok(SourceObject { elf, bytes })
    }

    /// The executable's entry point virtual address.
    pub fn entry(&self) -> u32 {
        self.elf.header.e_entry as u32
    }

    /// All sections flagged `alloc | execinstr`, in section-table order.
    pub fn executable_sections(&self) -> Vec<&SectionHeader> {
        self.elf
            .section_headers
            .iter()
            .filter(|s| s.sh_flags as u32 & (SHF_ALLOC | SHF_EXECINSTR) == (SHF_ALLOC | SHF_EXECINSTR))
            .collect()
    }

    /// Every section header, for the Memory Layout Reconstructor's scan.
    pub fn sections(&self) -> &[SectionHeader] {
        &self.elf.section_headers
    }

    /// A section's name, resolved through the section header string table.
    pub fn section_name(&self, section: &SectionHeader) -> &str {
        self.elf
            .shdr_strtab
            .get_at(section.sh_name)
            .unwrap_or("")
    }

    /// The bytes backing a `SHT_PROGBITS` section.
    pub fn section_bytes(&self, section: &SectionHeader) -> &'a [u8] {
        let start = section.sh_offset as usize;
        let end = start + section.sh_size as usize;
        &self.bytes[start..end]
    }

    /// All `STT_FUNC` symbols with nonzero size whose value lies in
    /// `[lo, hi)`, sorted by `(value ascending, size descending)` per
    /// per Function Recovery's sweep order.
    pub fn function_symbols_in(&self, lo: u32, hi: u32) -> Vec<Sym> {
        let mut found: Vec<Sym> = self
            .elf
            .syms
            .iter()
            .filter(|s| {
                s.st_type() == STT_FUNC
                    && s.st_size > 0
                    && (s.st_value as u32) >= lo
                    && (s.st_value as u32) < hi
            })
            .collect();
        found.sort_by(|a, b| {
            a.st_value
                .cmp(&b.st_value)
                .then(b.st_size.cmp(&a.st_size))
        });
        found
    }

    /// A symbol by its symbol-table index.
    pub fn symbol(&self, idx: usize) -> Sym {
        self.elf.syms.get(idx).expect("relocation references valid symtab index")
    }

    /// A symbol's name, resolved through the symbol string table.
    pub fn symbol_name(&self, sym: &Sym) -> &str {
        self.elf.strtab.get_at(sym.st_name).unwrap_or("")
    }

    /// Look for another symbol with the same value as `addr` that has a
    /// nonzero size. This is the fallback scan for zero-sized referents
    /// the Relocation Reconstructor uses to backfill a referent's size.
    pub fn symbol_size_at(&self, addr: u32) -> u32 {
        self.elf
            .syms
            .iter()
            .find(|s| s.st_value as u32 == addr && s.st_size > 0)
            .map(|s| s.st_size as u32)
            .unwrap_or(0)
    }

    /// All relocation entries across every `SHT_REL` table in the source,
    /// in table order, concatenated in section-table order.
    pub fn relocations(&self) -> Vec<Reloc> {
        let mut out = Vec::new();
        for (_section_idx, rels) in self.elf.shdr_relocs.iter() {
            out.extend(rels.iter());
        }
        out
    }

    /// Bytes backing `size` bytes at virtual address `addr`, assumed to
    /// fall within `region` (the Memory Layout Reconstructor's record for
    /// whichever class `addr` classified as). Used to copy rodata/data
    /// object contents into `DST`.
    pub fn region_bytes(&self, region: &Region, addr: u32, size: u32) -> &'a [u8] {
        let file_offset = region.offset + (addr as u64 - region.addr);
        let start = file_offset as usize;
        &self.bytes[start..start + size as usize]
    }

    /// Read a little-endian 32-bit value from the file's byte image at a
    /// given offset — the in-place addend/baked-address bytes a REL-style
    /// relocation leaves behind.
    pub fn read_u32_at(&self, offset: usize) -> u32 {
        u32::from_le_bytes([
            self.bytes[offset],
            self.bytes[offset + 1],
            self.bytes[offset + 2],
            self.bytes[offset + 3],
        ])
    }
}
