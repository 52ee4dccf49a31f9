//! Dispatch for the DWARF debug dumps: each requested name selects one
//! .debug_* decoder.
use crate::dwarf::{info, line, ranges};
use crate::elf::ElfFile;
use crate::error::DecodeError;
use crate::utils;
use crate::utils::uwriteln;
use std::io::Write;

pub fn debug_dump(out: &mut impl Write, file: &ElfFile, which: &str) -> Result<(), DecodeError> {
    match which {
        "info" => info::dump_info(out, file),
        "line" => line::dump_line(out, file),
        "abbrev" => dump_abbrev(out, file),
        "aranges" => ranges::dump_aranges(out, file),
        "pubnames" => ranges::dump_pubnames(out, file),
        _ => Err(DecodeError::Structural(format!(
            "unknown debug dump {which}: expected info, abbrev, line, aranges, or pubnames"
        ))),
    }
}

/// Dump every abbreviation table in .debug_abbrev. This is the raw section
/// view: the per-unit pairing with .debug_info happens in the info dump.
fn dump_abbrev(out: &mut impl Write, file: &ElfFile) -> Result<(), DecodeError> {
    let section = file
        .find_section_named(".debug_abbrev")
        .ok_or_else(|| DecodeError::Structural("couldn't find section .debug_abbrev".to_string()))?;
    let section_start = section.obytes.start.0 as usize;
    let section_end = (section.obytes.end().0 as usize).min(file.reader.len());

    uwriteln!(out, "The section .debug_abbrev contains:");
    let mut offset = section_start;
    while offset < section_end {
        let table = match crate::dwarf::AbbrevTable::new(&file.reader, offset, section_end) {
            Ok(table) => table,
            Err(err) => {
                utils::warn(&format!("failed to read abbreviation table: {err}"));
                break;
            }
        };
        if table.entries.is_empty() {
            break;
        }

        uwriteln!(out);
        uwriteln!(out, "  Table at offset {:#x}:", offset - section_start);
        uwriteln!(out, "  Number TAG");
        for abbreviation in table.entries.iter() {
            uwriteln!(
                out,
                "   {}      {} [{}]",
                abbreviation.code,
                abbreviation.tag.text(),
                if abbreviation.has_children { "has children" } else { "no children" }
            );
            for attr in abbreviation.attrs.iter() {
                uwriteln!(out, "    {:26} {:?}", attr.name.text(), attr.encoding);
            }
        }

        // re-walk to find where this table's terminating zero code ends
        let mut s = crate::elf::Stream::new(&file.reader, offset);
        while s.offset < section_end {
            match crate::dwarf::Abbreviation::new(&mut s) {
                Ok(Some(_)) => (),
                _ => break,
            }
        }
        offset = s.offset;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{DwarfBuilder, elf_with_debug_sections};

    #[test]
    fn abbrev_dump_lists_codes_and_attrs() {
        let mut d = DwarfBuilder::new();
        d.abbrev(1, 0x11, true, &[(0x03, 0x08)]);
        d.abbrev(2, 0x2e, true, &[(0x03, 0x08), (0x3f, 0x0c)]);
        d.end_abbrevs();
        let file = elf_with_debug_sections(&d);

        let mut v: Vec<u8> = Vec::new();
        debug_dump(&mut v, &file, "abbrev").unwrap();
        let s = String::from_utf8(v).unwrap();
        assert!(s.contains("DW_TAG_compile_unit"), "{s}");
        assert!(s.contains("DW_TAG_subprogram"), "{s}");
        assert!(s.contains("DW_AT_external"), "{s}");
        assert!(s.contains("has children"), "{s}");
    }

    #[test]
    fn unknown_dump_names_are_rejected() {
        let d = DwarfBuilder::new();
        let file = elf_with_debug_sections(&d);
        let mut v: Vec<u8> = Vec::new();
        assert!(matches!(
            debug_dump(&mut v, &file, "frames"),
            Err(DecodeError::Structural(_))
        ));
    }
}
