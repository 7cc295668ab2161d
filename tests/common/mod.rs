//! Hand-assembled ELF32 `ET_EXEC` fixtures for the integration tests.
//!
//! `delink` only ever reads `SRC` through `goblin`, so these builders
//! write the same container-aware structs `goblin` hands back on parse
//! (`Header`, `SectionHeader`, `Sym`, `Reloc`), serialized with `scroll`
//! exactly as `delink::object::DestObject::write` does for `DST`. Each
//! fixture is a minimal, valid `ET_EXEC` binary: a null section, the
//! caller's sections, a section-header string table, a symbol string
//! table, a symbol table, and (if any relocations were requested) one
//! combined `SHT_REL` table.

use std::io::{Cursor, Seek, SeekFrom, Write};

use goblin::container::{Container, Ctx, Endian};
use goblin::elf::header::{self, Header};
use goblin::elf::reloc::Reloc;
use goblin::elf::section_header::{
    SectionHeader, SHF_ALLOC, SHF_EXECINSTR, SHF_WRITE, SHT_NOBITS, SHT_PROGBITS, SHT_REL,
    SHT_STRTAB, SHT_SYMTAB,
};
use goblin::elf::sym::Sym;
use scroll::IOwrite;

/// One section to include in the fixture beyond the null section.
pub struct SectionSpec {
    pub name: &'static str,
    pub nobits: bool,
    pub flags: u32,
    pub addr: u32,
    /// File contents for a `PROGBITS` section; ignored (but still sized)
    /// for a `NOBITS` one.
    pub data: Vec<u8>,
    /// Size in bytes; for `NOBITS` sections this is the only size source
    /// since there is no backing data.
    pub size: u32,
    pub align: u32,
}

impl SectionSpec {
    pub fn text(name: &'static str, addr: u32, data: Vec<u8>) -> Self {
        let size = data.len() as u32;
        SectionSpec {
            name,
            nobits: false,
            flags: SHF_ALLOC | SHF_EXECINSTR,
            addr,
            data,
            size,
            align: 4,
        }
    }

    pub fn rodata(name: &'static str, addr: u32, data: Vec<u8>) -> Self {
        let size = data.len() as u32;
        SectionSpec {
            name,
            nobits: false,
            flags: SHF_ALLOC,
            addr,
            data,
            size,
            align: 4,
        }
    }

    pub fn data(name: &'static str, addr: u32, data: Vec<u8>) -> Self {
        let size = data.len() as u32;
        SectionSpec {
            name,
            nobits: false,
            flags: SHF_ALLOC | SHF_WRITE,
            addr,
            data,
            size,
            align: 4,
        }
    }

    pub fn bss(name: &'static str, addr: u32, size: u32) -> Self {
        SectionSpec {
            name,
            nobits: true,
            flags: SHF_ALLOC | SHF_WRITE,
            addr,
            data: Vec::new(),
            size,
            align: 4,
        }
    }
}

/// One symbol table entry, after the mandatory null entry at index 0.
pub struct SymSpec {
    pub name: &'static str,
    pub value: u32,
    pub size: u32,
    /// `(bind << 4) | sym_type`, matching `goblin::elf::sym::Sym::st_info`.
    pub info: u8,
    /// 1-based index into the `sections` slice passed to [`build_exec`]
    /// (section 0 is always the null section).
    pub shndx: u16,
}

/// One relocation entry; `sym_index` is the 1-based symbol-table index
/// (matching the indices `build_exec`'s symbol table ends up with: 0 is
/// the null symbol, 1 is `symbols[0]`, and so on).
pub struct RelocSpec {
    pub offset: u32,
    pub sym_index: usize,
    pub r_type: u32,
}

struct StrTab {
    bytes: Vec<u8>,
}

impl StrTab {
    fn new() -> Self {
        StrTab { bytes: vec![0] }
    }

    fn add(&mut self, name: &str) -> u32 {
        if name.is_empty() {
            return 0;
        }
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(name.as_bytes());
        self.bytes.push(0);
        offset
    }
}

/// Build a minimal, valid little-endian ELF32 `ET_EXEC`/`EM_386` binary
/// with the given entry point, sections, symbols, and relocations.
pub fn build_exec(
    entry: u32,
    sections: &[SectionSpec],
    symbols: &[SymSpec],
    relocs: &[RelocSpec],
) -> Vec<u8> {
    let ctx = Ctx::new(Container::Little, Endian::Little);

    let mut shstrtab = StrTab::new();
    let mut strtab = StrTab::new();

    let null_section_count = 1;
    let first_user_section = null_section_count;
    let shstrtab_idx = first_user_section + sections.len();
    let strtab_idx = shstrtab_idx + 1;
    let symtab_idx = strtab_idx + 1;
    let has_relocs = !relocs.is_empty();
    let nshdrs = symtab_idx + 1 + usize::from(has_relocs);

    let mut section_names = Vec::with_capacity(sections.len());
    for s in sections {
        section_names.push(shstrtab.add(s.name));
    }
    let shstrtab_name = shstrtab.add(".shstrtab");
    let strtab_name = shstrtab.add(".strtab");
    let symtab_name = shstrtab.add(".symtab");
    let rel_name = if has_relocs {
        shstrtab.add(".rel.text")
    } else {
        0
    };

    let mut sym_names = Vec::with_capacity(symbols.len());
    for sym in symbols {
        sym_names.push(strtab.add(sym.name));
    }

    let header_size = Header::size(&ctx) as u64;
    let mut cursor = header_size;
    let mut data_offsets = Vec::with_capacity(sections.len());
    for s in sections {
        data_offsets.push(cursor);
        if !s.nobits {
            cursor += s.data.len() as u64;
        }
    }

    let shstrtab_offset = cursor;
    cursor += shstrtab.bytes.len() as u64;
    let strtab_offset = cursor;
    cursor += strtab.bytes.len() as u64;

    let symtab_offset = cursor;
    let sym_entsize = Sym::size(ctx.container) as u64;
    let nsyms = symbols.len() as u64 + 1;
    cursor += nsyms * sym_entsize;

    let reloc_offset = cursor;
    let reloc_entsize = Reloc::size(false, ctx) as u64;
    cursor += relocs.len() as u64 * reloc_entsize;

    let shoff = cursor;

    let mut header = Header::new(ctx);
    header.e_machine = header::EM_386;
    header.e_type = header::ET_EXEC;
    header.e_entry = entry as u64;
    header.e_shoff = shoff;
    header.e_shnum = nshdrs as u16;
    header.e_shstrndx = shstrtab_idx as u16;

    let mut out = Cursor::new(Vec::new());
    out.iowrite_with(header, ctx).unwrap();

    for s in sections {
        if !s.nobits {
            out.write_all(&s.data).unwrap();
        }
    }

    out.seek(SeekFrom::Start(shstrtab_offset)).unwrap();
    out.write_all(&shstrtab.bytes).unwrap();
    out.seek(SeekFrom::Start(strtab_offset)).unwrap();
    out.write_all(&strtab.bytes).unwrap();

    out.seek(SeekFrom::Start(symtab_offset)).unwrap();
    let null_sym = Sym {
        st_name: 0,
        st_info: 0,
        st_other: 0,
        st_shndx: 0,
        st_value: 0,
        st_size: 0,
    };
    out.iowrite_with(null_sym, ctx).unwrap();
    for (sym, &name_off) in symbols.iter().zip(sym_names.iter()) {
        let s = Sym {
            st_name: name_off,
            st_info: sym.info,
            st_other: 0,
            st_shndx: sym.shndx as usize,
            st_value: sym.value as u64,
            st_size: sym.size as u64,
        };
        out.iowrite_with(s, ctx).unwrap();
    }

    out.seek(SeekFrom::Start(reloc_offset)).unwrap();
    for r in relocs {
        let rel = Reloc {
            r_offset: r.offset as u64,
            r_sym: r.sym_index,
            r_type: r.r_type,
            r_addend: None,
        };
        out.iowrite_with(rel, (false, ctx)).unwrap();
    }

    let mut shdrs = Vec::with_capacity(nshdrs);
    shdrs.push(SectionHeader::default());
    for (i, s) in sections.iter().enumerate() {
        let mut shdr = SectionHeader::default();
        shdr.sh_name = section_names[i];
        shdr.sh_type = if s.nobits { SHT_NOBITS } else { SHT_PROGBITS };
        shdr.sh_flags = s.flags as u64;
        shdr.sh_addr = s.addr as u64;
        shdr.sh_offset = data_offsets[i];
        shdr.sh_size = s.size as u64;
        shdr.sh_addralign = s.align as u64;
        shdrs.push(shdr);
    }

    let mut shstrtab_shdr = SectionHeader::default();
    shstrtab_shdr.sh_name = shstrtab_name;
    shstrtab_shdr.sh_type = SHT_STRTAB;
    shstrtab_shdr.sh_offset = shstrtab_offset;
    shstrtab_shdr.sh_size = shstrtab.bytes.len() as u64;
    shstrtab_shdr.sh_addralign = 1;
    shdrs.push(shstrtab_shdr);

    let mut strtab_shdr = SectionHeader::default();
    strtab_shdr.sh_name = strtab_name;
    strtab_shdr.sh_type = SHT_STRTAB;
    strtab_shdr.sh_offset = strtab_offset;
    strtab_shdr.sh_size = strtab.bytes.len() as u64;
    strtab_shdr.sh_addralign = 1;
    shdrs.push(strtab_shdr);

    let mut symtab_shdr = SectionHeader::default();
    symtab_shdr.sh_name = symtab_name;
    symtab_shdr.sh_type = SHT_SYMTAB;
    symtab_shdr.sh_offset = symtab_offset;
    symtab_shdr.sh_size = nsyms * sym_entsize;
    symtab_shdr.sh_link = strtab_idx as u32;
    symtab_shdr.sh_entsize = sym_entsize;
    symtab_shdr.sh_addralign = 4;
    shdrs.push(symtab_shdr);

    if has_relocs {
        let mut rel_shdr = SectionHeader::default();
        rel_shdr.sh_name = rel_name;
        rel_shdr.sh_type = SHT_REL;
        rel_shdr.sh_offset = reloc_offset;
        rel_shdr.sh_size = relocs.len() as u64 * reloc_entsize;
        rel_shdr.sh_link = symtab_idx as u32;
        rel_shdr.sh_info = 1;
        rel_shdr.sh_entsize = reloc_entsize;
        rel_shdr.sh_addralign = 4;
        shdrs.push(rel_shdr);
    }

    debug_assert_eq!(shdrs.len(), nshdrs);

    out.seek(SeekFrom::Start(shoff)).unwrap();
    for shdr in shdrs {
        out.iowrite_with(shdr, ctx).unwrap();
    }

    out.flush().unwrap();
    out.into_inner()
}
