//! Function Recovery.
//!
//! For each executable section, sweep its
//! `STT_FUNC` symbols left to right, splitting the section into named
//! function sections with anonymous gap sections filling whatever the
//! symbol table doesn't cover. No byte of an executable section is ever
//! dropped.

use log::{debug, trace};

use crate::object::DestObject;
use crate::source::SourceObject;

/// Run Function Recovery over every executable section of `src`, emitting
/// `.text.<name>` and `.text.<addr>` sections (plus their `STT_FUNC`
/// symbols) into `dst`.
pub fn recover_functions(src: &SourceObject, dst: &mut DestObject) {
    for section in src.executable_sections() {
        let start = section.sh_addr as u32;
        let end = (section.sh_addr + section.sh_size) as u32;
        let align = section.sh_addralign.max(1) as u32;
        let bytes = src.section_bytes(section);

        debug!(
            "function recovery: section at {:#x}..{:#x} ({} bytes)",
            start,
            end,
            bytes.len()
        );

        let symbols = src.function_symbols_in(start, end);
        let mut cursor = start;

        for sym in symbols {
            let value = sym.st_value as u32;
            let size = sym.st_size as u32;

            if value < cursor {
                // Overlaps a symbol already emitted (sort put the larger,
                // earlier-winning symbol first); drop it silently.
                trace!("dropping overlapping symbol at {:#x} (cursor at {:#x})", value, cursor);
                continue;
            }
            if value + size > end {
                trace!("dropping symbol at {:#x} extending past section end", value);
                continue;
            }

            if value > cursor {
                let gap = &bytes[(cursor - start) as usize..(value - start) as usize];
                let label = format!("{cursor:x}");
                dst.add_text_section(&label, cursor, gap, align);
                cursor = value;
            }

            let name = src.symbol_name(&sym);
            let content = &bytes[(value - start) as usize..(value - start + size) as usize];
            dst.add_text_section(name, value, content, align);
            cursor = value + size;
        }

        if cursor < end {
            let gap = &bytes[(cursor - start) as usize..];
            let label = format!("{cursor:x}");
            dst.add_text_section(&label, cursor, gap, align);
        }
    }
}
