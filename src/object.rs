//! `DestObject`: the in-progress `DST` accumulator and its ELF32 `ET_REL`
//! writer.
//!
//! An append-only accumulator of interned strings, sections, and symbols,
//! with builder-style helpers for the handful of section/symbol shapes the
//! pipeline ever creates, and a `write` method that serializes everything
//! to bytes via `goblin`'s container-aware structs and `scroll`. Nothing
//! here knows about a declare/define policy layer — the five pipeline
//! components talk to it directly.

use std::io::{Seek, SeekFrom, Write};

use goblin::container::{Container, Ctx, Endian};
use goblin::elf::header::{self, Header};
use goblin::elf::reloc::Reloc;
use goblin::elf::section_header::{
    SectionHeader, SHF_ALLOC, SHF_EXECINSTR, SHF_INFO_LINK, SHF_WRITE, SHT_NOBITS, SHT_NULL,
    SHT_PROGBITS, SHT_REL, SHT_STRTAB, SHT_SYMTAB,
};
use goblin::elf::sym::{Sym, STB_GLOBAL, STB_LOCAL, STT_FUNC, STT_OBJECT};
use indexmap::IndexMap;
use scroll::IOwrite;
use string_interner::{DefaultStringInterner, DefaultSymbol};

use crate::error::Result;
use crate::permutation::Permutation;
use crate::symtab_view::{SymbolLike, SymtabView};

const STRTAB_INDEX: u32 = 1;
const SYMTAB_INDEX: u32 = 2;

/// What kind of section this is, for layout purposes at write time.
/// Relocation sections have no variant here — they are never represented
/// as `Section` values, only as `reloc_tables` entries materialized
/// directly into section headers at write time (see `DestObject::write`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Null,
    StrTab,
    SymTab,
    Bits,
    NoBits,
}

/// A section in the destination object.
pub struct Section {
    pub name: String,
    pub kind: SectionKind,
    pub flags: u32,
    /// Provisional virtual address, zeroed by Finalization Step A
    /// before the object is written.
    pub addr: u32,
    pub size: u32,
    pub data: Option<Vec<u8>>,
    pub link: u32,
    pub info: u32,
    pub align: u32,
    /// The function/object symbol this section exists to back, if any.
    /// `None` for `.strtab`/`.symtab`/the null section; relocation
    /// sections are never represented here (see `reloc_tables` below) so
    /// they have no occasion to set it either.
    pub primary_symbol: Option<usize>,
}

impl SymbolLike for Section {
    fn start(&self) -> u32 {
        self.addr
    }
    fn extent(&self) -> u32 {
        self.size
    }
}

/// A symbol in the destination object's symbol table.
#[derive(Clone)]
pub struct Symbol {
    pub name: String,
    pub value: u32,
    pub size: u32,
    pub bind: u8,
    pub sym_type: u8,
    pub section: usize,
}

/// One relocation entry, expressed at the function-local offset
/// (`R.offset - F.addr`).
pub struct RelocEntry {
    pub offset: u32,
    pub symbol: usize,
    pub reloc_type: u32,
}

/// The in-progress relocatable object file.
pub struct DestObject {
    pub sections: Vec<Section>,
    pub symbols: Vec<Symbol>,
    /// Keyed by the index (into `sections`) of the function section being
    /// patched, in first-referenced order — this becomes `.rel<F.name>`
    /// at write time. Kept separate from `sections` because a relocation
    /// section's own index must never disturb the indices function/object
    /// sections were assigned at creation time (see DESIGN.md).
    pub reloc_tables: IndexMap<usize, Vec<RelocEntry>>,
    /// Number of local symbols, set by Finalization Step C.
    pub nlocals: usize,
    strings: DefaultStringInterner,
}

impl DestObject {
    /// A fresh, empty object: just the mandatory null section/symbol and
    /// the `.strtab`/`.symtab` section slots every ELF object needs.
    pub fn new() -> Self {
        let mut strings = DefaultStringInterner::default();
        strings.get_or_intern(""); // keep string index 0 == empty, mirroring the null-terminated strtab byte 0
        strings.get_or_intern(".strtab");
        strings.get_or_intern(".symtab");

        let sections = vec![
            Section {
                name: String::new(),
                kind: SectionKind::Null,
                flags: 0,
                addr: 0,
                size: 0,
                data: None,
                link: 0,
                info: 0,
                align: 0,
                primary_symbol: None,
            },
            Section {
                name: ".strtab".into(),
                kind: SectionKind::StrTab,
                flags: 0,
                addr: 0,
                size: 0,
                data: None,
                link: 0,
                info: 0,
                align: 1,
                primary_symbol: None,
            },
            Section {
                name: ".symtab".into(),
                kind: SectionKind::SymTab,
                flags: 0,
                addr: 0,
                size: 0,
                data: None,
                link: STRTAB_INDEX,
                info: 0,
                align: 4,
                primary_symbol: None,
            },
        ];

        let symbols = vec![Symbol {
            name: String::new(),
            value: 0,
            size: 0,
            bind: STB_LOCAL,
            sym_type: 0,
            section: 0,
        }];

        DestObject {
            sections,
            symbols,
            reloc_tables: IndexMap::new(),
            nlocals: 0,
            strings,
        }
    }

    fn intern(&mut self, name: &str) -> DefaultSymbol {
        self.strings.get_or_intern(name)
    }

    fn push_section(&mut self, section: Section) -> usize {
        self.sections.push(section);
        self.sections.len() - 1
    }

    fn push_symbol(&mut self, symbol: Symbol) -> usize {
        self.symbols.push(symbol);
        self.symbols.len() - 1
    }

    /// Create a `.text.<label>` section holding `bytes` at provisional
    /// virtual address `addr`, plus its `STT_FUNC`/`STB_GLOBAL` symbol
    /// named `label`. Used for both named function sections and
    /// anonymous gap sections — every emitted section gets a function
    /// symbol, gaps included.
    pub fn add_text_section(&mut self, label: &str, addr: u32, bytes: &[u8], align: u32) -> usize {
        self.intern(&format!(".text.{label}"));
        self.intern(label);
        let size = bytes.len() as u32;
        let section_idx = self.push_section(Section {
            name: format!(".text.{label}"),
            kind: SectionKind::Bits,
            flags: SHF_ALLOC | SHF_EXECINSTR,
            addr,
            size,
            data: Some(bytes.to_vec()),
            link: 0,
            info: 0,
            align,
            primary_symbol: None,
        });
        let symbol_idx = self.push_symbol(Symbol {
            name: label.to_string(),
            value: 0,
            size,
            bind: STB_GLOBAL,
            sym_type: STT_FUNC,
            section: section_idx,
        });
        self.sections[section_idx].primary_symbol = Some(symbol_idx);
        symbol_idx
    }

    /// Create a `.rodata.<addr>` section backed by `bytes`, with a local
    /// `STT_OBJECT` symbol.
    pub fn add_rodata_object(&mut self, addr: u32, bytes: &[u8]) -> usize {
        self.add_data_object_impl(".rodata", addr, Some(bytes), SHF_ALLOC, STB_LOCAL)
    }

    /// Create a `.data.<addr>` section backed by `bytes`, with a local
    /// `STT_OBJECT` symbol.
    pub fn add_data_object(&mut self, addr: u32, bytes: &[u8]) -> usize {
        self.add_data_object_impl(".data", addr, Some(bytes), SHF_ALLOC | SHF_WRITE, STB_LOCAL)
    }

    /// Create a `.bss.<addr>` `SHT_NOBITS` section of `size` bytes, with a
    /// global `STT_OBJECT` symbol.
    pub fn add_bss_object(&mut self, addr: u32, size: u32) -> usize {
        let label = format!("{addr:x}");
        self.intern(&format!(".bss.{label}"));
        self.intern(&label);
        let section_idx = self.push_section(Section {
            name: format!(".bss.{label}"),
            kind: SectionKind::NoBits,
            flags: SHF_ALLOC | SHF_WRITE,
            addr,
            size,
            data: None,
            link: 0,
            info: 0,
            align: 4,
            primary_symbol: None,
        });
        let symbol_idx = self.push_symbol(Symbol {
            name: label,
            value: 0,
            size,
            bind: STB_GLOBAL,
            sym_type: STT_OBJECT,
            section: section_idx,
        });
        self.sections[section_idx].primary_symbol = Some(symbol_idx);
        symbol_idx
    }

    fn add_data_object_impl(
        &mut self,
        prefix: &str,
        addr: u32,
        bytes: Option<&[u8]>,
        flags: u32,
        bind: u8,
    ) -> usize {
        let label = format!("{addr:x}");
        let name = format!("{prefix}.{label}");
        self.intern(&name);
        self.intern(&label);
        let data = bytes.map(|b| b.to_vec());
        let size = data.as_ref().map(|d| d.len() as u32).unwrap_or(0);
        let section_idx = self.push_section(Section {
            name,
            kind: SectionKind::Bits,
            flags,
            addr,
            size,
            data,
            link: 0,
            info: 0,
            align: 4,
            primary_symbol: None,
        });
        let symbol_idx = self.push_symbol(Symbol {
            name: label,
            value: 0,
            size,
            bind,
            sym_type: STT_OBJECT,
            section: section_idx,
        });
        self.sections[section_idx].primary_symbol = Some(symbol_idx);
        symbol_idx
    }

    /// Add a standalone symbol not tied to creating a new section — used
    /// by Entry-point Fixup's `_start` and Finalization's per-section
    /// `STT_SECTION` symbols.
    pub fn add_symbol(&mut self, name: &str, value: u32, size: u32, bind: u8, sym_type: u8, section: usize) -> usize {
        self.intern(name);
        self.push_symbol(Symbol {
            name: name.to_string(),
            value,
            size,
            bind,
            sym_type,
            section,
        })
    }

    /// Does any existing section cover `addr` with a materialized symbol?
    /// This is the "materialize or locate symbol in DST" lookup.
    /// Determinism rule: the first match, in section-creation order, wins.
    pub fn find_symbol_covering(&self, addr: u32) -> Option<usize> {
        let candidates: Vec<&Section> = self
            .sections
            .iter()
            .filter(|s| s.primary_symbol.is_some())
            .collect();
        let view: SymtabView<Section> = SymtabView::from_refs(candidates);
        view.by_containing_addr(addr)
            .first()
            .and_then(|s| s.primary_symbol)
    }

    /// Record a relocation at `offset` (already function-local) against
    /// `symbol`, patching `function_section`.
    pub fn add_relocation(&mut self, function_section: usize, offset: u32, symbol: usize, reloc_type: u32) {
        self.reloc_tables
            .entry(function_section)
            .or_default()
            .push(RelocEntry {
                offset,
                symbol,
                reloc_type,
            });
    }

    /// Finalization Step C: reorder the symbol table so
    /// every `STB_LOCAL` symbol precedes every other binding, preserving
    /// relative order within each class, rewriting every relocation's
    /// `symbol` field under the same exchange so it keeps pointing at the
    /// same logical symbol. Sets `nlocals` to the post-reorder local count.
    pub fn finalize_symbol_order(&mut self) {
        let n = self.symbols.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&i| u8::from(self.symbols[i].bind != STB_LOCAL));

        // `order[new_pos] = old_index`. The cycle-swap loop below walks a
        // position `i` to where it belongs by repeatedly swapping it with
        // whatever sits at its destination, which realizes the *inverse*
        // of whatever array drives it. So invert `order` into `source`
        // (`source[old_index] = new_pos`) before driving the loop with it.
        let mut source = vec![0usize; n];
        for (new_pos, &old_idx) in order.iter().enumerate() {
            source[old_idx] = new_pos;
        }

        let mut permutation = Permutation::identity(n);
        let symbols = &mut self.symbols;
        let reloc_tables = &mut self.reloc_tables;

        for i in 0..n {
            while source[i] != i {
                let j = source[i];
                symbols.swap(i, j);
                source.swap(i, j);
                permutation.swap(i, j, |a, b| {
                    for entries in reloc_tables.values_mut() {
                        for entry in entries.iter_mut() {
                            if entry.symbol == a {
                                entry.symbol = b;
                            } else if entry.symbol == b {
                                entry.symbol = a;
                            }
                        }
                    }
                });
            }
        }

        self.nlocals = self.symbols.iter().filter(|s| s.bind == STB_LOCAL).count();
    }

    /// All sections flagged `alloc | execinstr` — the function sections
    /// Function Recovery created, in section-index order. Used by the
    /// Relocation Reconstructor (one relocation table at most per such
    /// section) and Entry-point Fixup.
    pub fn function_sections(&self) -> Vec<usize> {
        self.sections
            .iter()
            .enumerate()
            .filter(|(_, s)| s.flags & (SHF_ALLOC | SHF_EXECINSTR) == (SHF_ALLOC | SHF_EXECINSTR))
            .map(|(i, _)| i)
            .collect()
    }

    /// Serialize to ELF32 `ET_REL` bytes, writing into `out`.
    pub fn write<W: Write + Seek>(mut self, mut out: W) -> Result<()> {
        let ctx = Ctx::new(Container::Little, Endian::Little);

        // finalize .strtab contents now that no more names will be interned
        let strtab_bytes = self.render_strtab();

        let header_size = Header::size(&ctx) as u64;

        let mut bits_size = 0u64;
        for section in &self.sections {
            if let Some(data) = &section.data {
                bits_size += data.len() as u64;
            }
        }

        let strtab_offset = header_size + bits_size;
        let strtab_size = strtab_bytes.len() as u64;
        let symtab_offset = strtab_offset + strtab_size;
        let sym_entsize = Sym::size(ctx.container) as u64;
        let symtab_size = self.symbols.len() as u64 * sym_entsize;
        let reloc_offset = symtab_offset + symtab_size;
        let reloc_entsize = Reloc::size(false, ctx) as u64;
        let total_relocs: u64 = self.reloc_tables.values().map(|v| v.len() as u64).sum();
        let shoff = reloc_offset + total_relocs * reloc_entsize;
        let nshdrs = self.sections.len() + self.reloc_tables.len();

        let mut header = Header::new(ctx);
        header.e_machine = header::EM_386;
        header.e_type = header::ET_REL;
        header.e_shoff = shoff;
        header.e_shnum = nshdrs as u16;
        header.e_shstrndx = STRTAB_INDEX as u16;

        out.iowrite_with(header, ctx)?;

        for section in &self.sections {
            if let Some(data) = &section.data {
                out.write_all(data)?;
            }
        }

        out.seek(SeekFrom::Start(strtab_offset))?;
        out.write_all(&strtab_bytes)?;

        out.seek(SeekFrom::Start(symtab_offset))?;
        for symbol in &self.symbols {
            let name_offset = self.strtab_offset_of(&symbol.name);
            let sym = Sym {
                st_name: name_offset,
                st_info: (symbol.bind << 4) | symbol.sym_type,
                st_other: 0,
                st_shndx: symbol.section,
                st_value: symbol.value as u64,
                st_size: symbol.size as u64,
            };
            out.iowrite_with(sym, ctx)?;
        }

        out.seek(SeekFrom::Start(reloc_offset))?;
        let mut section_headers: Vec<SectionHeader> = Vec::with_capacity(self.sections.len());
        let mut file_cursor = header_size;
        for section in &self.sections {
            let mut shdr = SectionHeader::default();
            shdr.sh_name = self.strtab_offset_of(&section.name);
            shdr.sh_flags = section.flags as u64;
            shdr.sh_addr = 0; // Finalization Step A: all virtual addresses are zero
            shdr.sh_link = section.link;
            shdr.sh_info = section.info;
            shdr.sh_addralign = section.align.max(1) as u64;
            match section.kind {
                SectionKind::Null => {
                    shdr.sh_type = SHT_NULL;
                }
                SectionKind::StrTab => {
                    shdr.sh_type = SHT_STRTAB;
                    shdr.sh_offset = strtab_offset;
                    shdr.sh_size = strtab_size;
                }
                SectionKind::SymTab => {
                    shdr.sh_type = SHT_SYMTAB;
                    shdr.sh_offset = symtab_offset;
                    shdr.sh_size = symtab_size;
                    shdr.sh_link = STRTAB_INDEX;
                    shdr.sh_info = self.nlocals as u32;
                    shdr.sh_entsize = sym_entsize;
                }
                SectionKind::Bits => {
                    shdr.sh_type = SHT_PROGBITS;
                    shdr.sh_offset = file_cursor;
                    shdr.sh_size = section.size as u64;
                    file_cursor += section.size as u64;
                }
                SectionKind::NoBits => {
                    shdr.sh_type = SHT_NOBITS;
                    shdr.sh_offset = file_cursor;
                    shdr.sh_size = section.size as u64;
                }
            }
            section_headers.push(shdr);
        }

        let mut roffset = reloc_offset;
        for (&fn_section_idx, entries) in self.reloc_tables.iter() {
            let rel_name = format!(".rel{}", self.sections[fn_section_idx].name);
            let mut shdr = SectionHeader::default();
            shdr.sh_name = self.strtab_offset_of(&rel_name);
            shdr.sh_type = SHT_REL;
            shdr.sh_flags = SHF_INFO_LINK as u64;
            shdr.sh_link = SYMTAB_INDEX;
            shdr.sh_info = fn_section_idx as u32;
            shdr.sh_addralign = 4;
            shdr.sh_entsize = reloc_entsize;
            shdr.sh_offset = roffset;
            shdr.sh_size = entries.len() as u64 * reloc_entsize;
            roffset += shdr.sh_size;
            section_headers.push(shdr);

            for entry in entries {
                let rel = Reloc {
                    r_offset: entry.offset as u64,
                    r_sym: entry.symbol,
                    r_type: entry.reloc_type,
                    r_addend: None,
                };
                out.iowrite_with(rel, (false, ctx))?;
            }
        }

        debug_assert_eq!(section_headers.len(), nshdrs);

        out.seek(SeekFrom::Start(shoff))?;
        for shdr in section_headers {
            out.iowrite_with(shdr, ctx)?;
        }

        out.flush()?;
        Ok(())
    }

    fn render_strtab(&mut self) -> Vec<u8> {
        // intern the .rel<name> strings that will be needed at write time
        // so strtab offsets are stable once rendered. Gathering them here
        // (rather than only on demand inside write) keeps string interning
        // a single pre-write pass, done entirely before the offset
        // arithmetic below runs.
        let rel_names: Vec<String> = self
            .reloc_tables
            .keys()
            .map(|&idx| format!(".rel{}", self.sections[idx].name))
            .collect();
        for name in &rel_names {
            self.intern(name);
        }

        let mut bytes = Vec::new();
        for (_, text) in self.strings.iter() {
            bytes.extend_from_slice(text.as_bytes());
            bytes.push(0);
        }
        bytes
    }

    fn strtab_offset_of(&self, name: &str) -> usize {
        let mut offset = 0usize;
        for (_, text) in self.strings.iter() {
            if text == name {
                return offset;
            }
            offset += text.len() + 1;
        }
        0
    }
}

impl Default for DestObject {
    fn default() -> Self {
        Self::new()
    }
}
