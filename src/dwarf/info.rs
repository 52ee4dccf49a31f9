//! The .debug_info tree walk. DIEs are stored as a flat, depth-first stream:
//! each cites an abbreviation code, the matching abbreviation says which
//! attribute values follow and how they are encoded, and a zero code closes
//! the current children list. The output is a linear annotated trace, so the
//! walker only tracks the nesting depth, not a tree.
use crate::dwarf::{AbbrevTable, AttributeName, FormEncoding, decode_i64, decode_u64};
use crate::elf::{Bytes, ElfFile, Offset, Stream};
use crate::error::DecodeError;
use crate::utils;
use crate::utils::uwriteln;
use std::io::Write;

struct UnitHeader {
    unit_end: usize,

    version: u16,

    /// Where this unit's abbreviations start, relative to .debug_abbrev.
    abbrev_offset: u64,

    /// Size of a DW_FORM_addr value in this unit.
    addr_size: u8,

    /// Set when the unit uses the 64-bit initial-length escape.
    sixty_four: bool,
}

impl UnitHeader {
    fn new(s: &mut Stream) -> Result<Self, DecodeError> {
        // See section 7.5.1: a length of 0xffffffff escapes to a 64-bit
        // length. DWARF 2 proper never emits it but tolerating it is cheap.
        let word = s.read_word()?;
        let (sixty_four, length) = if word == 0xffffffff {
            (true, s.read_xword()?)
        } else {
            (false, word as u64)
        };
        let unit_end = s.offset.saturating_add(length as usize);

        let version = s.read_half()?;
        let abbrev_offset = if sixty_four {
            s.read_xword()?
        } else {
            s.read_word()? as u64
        };
        let addr_size = s.read_byte()?;
        Ok(UnitHeader {
            unit_end,
            version,
            abbrev_offset,
            addr_size,
            sixty_four,
        })
    }
}

/// One decoded attribute value, kept structured until rendering so the
/// symbolic annotations can look at the integer.
enum AttributeValue {
    Address(u64),
    Int(u64),
    Signed(i64),
    Reference(u64),
    Text(String),
    Flag(u8),
    Block(Vec<u8>),
}

pub fn dump_info(out: &mut impl Write, file: &ElfFile) -> Result<(), DecodeError> {
    let info = file
        .find_section_named(".debug_info")
        .ok_or_else(|| DecodeError::Structural("couldn't find section .debug_info".to_string()))?;
    let abbrev = file
        .find_section_named(".debug_abbrev")
        .ok_or_else(|| DecodeError::Structural("couldn't find section .debug_abbrev".to_string()))?;
    let strings = file.find_section_named(".debug_str").map(|s| s.obytes);

    let section_start = info.obytes.start.0 as usize;
    let section_end = (info.obytes.end().0 as usize).min(file.reader.len());

    uwriteln!(out, "The section .debug_info contains:");
    let mut offset = section_start;
    while offset + 11 <= section_end {
        let mut s = Stream::new(&file.reader, offset);
        let header = match UnitHeader::new(&mut s) {
            Ok(header) => header,
            Err(err) => {
                utils::warn(&format!("failed to read compilation unit header: {err}"));
                break;
            }
        };
        let mut unit_end = header.unit_end;
        if unit_end > section_end {
            utils::warn("compilation unit length runs past the end of .debug_info");
            unit_end = section_end;
        }

        uwriteln!(out);
        uwriteln!(out, "  Compilation Unit @ offset {:#x}:", offset - section_start);
        uwriteln!(out, "   Length:        {:#x}", unit_end - offset);
        uwriteln!(out, "   Version:       {}", header.version);
        uwriteln!(out, "   Abbrev Offset: {:#x}", header.abbrev_offset);
        uwriteln!(out, "   Pointer Size:  {}", header.addr_size);
        if header.version != 2 {
            utils::warn(&format!(
                "only DWARF version 2 is supported: skipping unit with version {}",
                header.version
            ));
            offset = unit_end;
            continue;
        }

        // The table is scoped to this unit and rebuilt for the next one even
        // when both cite the same abbreviation offset.
        let abbrev_start = abbrev.obytes.start.0.saturating_add(header.abbrev_offset) as usize;
        let abbrev_end = (abbrev.obytes.end().0 as usize).min(file.reader.len());
        let table = match AbbrevTable::new(&file.reader, abbrev_start, abbrev_end) {
            Ok(table) => table,
            Err(err) => {
                utils::warn(&format!("failed to read abbreviations: {err}"));
                offset = unit_end;
                continue;
            }
        };

        if let Err(err) = dump_dies(out, file, &mut s, unit_end, section_start, &table, &header, strings) {
            utils::warn(&format!("failed to read compilation unit: {err}"));
        }
        offset = unit_end;
    }
    Ok(())
}

fn dump_dies(
    out: &mut impl Write,
    file: &ElfFile,
    s: &mut Stream,
    unit_end: usize,
    section_start: usize,
    table: &AbbrevTable,
    header: &UnitHeader,
    strings: Option<Bytes<Offset>>,
) -> Result<(), DecodeError> {
    let mut depth: u32 = 0;
    while s.offset < unit_end {
        let die_offset = s.offset - section_start;
        let code = decode_u64(s)?;
        if code == 0 {
            // closes one children list
            depth = depth.saturating_sub(1);
            continue;
        }

        let abbreviation = table.find(code).ok_or_else(|| {
            DecodeError::Structural(format!("abbreviation code {code} is not in the unit's table"))
        })?;
        uwriteln!(
            out,
            " <{depth}><{die_offset:x}>: Abbrev Number: {code} ({})",
            abbreviation.tag.text()
        );
        for ae in abbreviation.attrs.iter() {
            let value = read_form(file, s, ae.encoding, header, strings)?;
            uwriteln!(out, "     {:26} : {}", ae.name.text(), attribute_text(ae.name, &value));
        }
        if abbreviation.has_children {
            depth += 1;
        }
    }
    Ok(())
}

fn read_form(
    file: &ElfFile,
    s: &mut Stream,
    encoding: FormEncoding,
    header: &UnitHeader,
    strings: Option<Bytes<Offset>>,
) -> Result<AttributeValue, DecodeError> {
    fn addr(s: &mut Stream, size: u8) -> Result<u64, DecodeError> {
        match size {
            4 => Ok(s.read_word()? as u64),
            8 => s.read_xword(),
            _ => Err(DecodeError::Structural(format!("bad address size: {size}"))),
        }
    }

    fn block(s: &mut Stream, length: u64) -> Result<AttributeValue, DecodeError> {
        let bytes = s.reader.slice(s.offset, length as usize)?.to_vec();
        s.skip(length as usize);
        Ok(AttributeValue::Block(bytes))
    }

    match encoding {
        FormEncoding::DW_FORM_addr => Ok(AttributeValue::Address(addr(s, header.addr_size)?)),
        FormEncoding::DW_FORM_data1 => Ok(AttributeValue::Int(s.read_byte()? as u64)),
        FormEncoding::DW_FORM_data2 => Ok(AttributeValue::Int(s.read_half()? as u64)),
        FormEncoding::DW_FORM_data4 => Ok(AttributeValue::Int(s.read_word()? as u64)),
        FormEncoding::DW_FORM_data8 => Ok(AttributeValue::Int(s.read_xword()?)),
        FormEncoding::DW_FORM_sdata => Ok(AttributeValue::Signed(decode_i64(s)?)),
        FormEncoding::DW_FORM_udata => Ok(AttributeValue::Int(decode_u64(s)?)),
        FormEncoding::DW_FORM_ref1 => Ok(AttributeValue::Reference(s.read_byte()? as u64)),
        FormEncoding::DW_FORM_ref2 => Ok(AttributeValue::Reference(s.read_half()? as u64)),
        FormEncoding::DW_FORM_ref4 => Ok(AttributeValue::Reference(s.read_word()? as u64)),
        FormEncoding::DW_FORM_ref8 => Ok(AttributeValue::Reference(s.read_xword()?)),
        FormEncoding::DW_FORM_ref_udata => Ok(AttributeValue::Reference(decode_u64(s)?)),
        // in version 2 a ref_addr is address-sized
        FormEncoding::DW_FORM_ref_addr => Ok(AttributeValue::Reference(addr(s, header.addr_size)?)),
        FormEncoding::DW_FORM_flag => Ok(AttributeValue::Flag(s.read_byte()?)),
        FormEncoding::DW_FORM_string => Ok(AttributeValue::Text(s.read_string()?)),
        FormEncoding::DW_FORM_strp => {
            let delta = if header.sixty_four {
                s.read_xword()?
            } else {
                s.read_word()? as u64
            };
            match strings {
                Some(bytes) => {
                    let mut s = Stream::new(&file.reader, bytes.start.0.saturating_add(delta) as usize);
                    Ok(AttributeValue::Text(s.read_string()?))
                }
                None => {
                    utils::warn("DW_FORM_strp used without a .debug_str section");
                    Ok(AttributeValue::Text(format!("<.debug_str offset {delta:#x}>")))
                }
            }
        }
        FormEncoding::DW_FORM_block1 => {
            let length = s.read_byte()? as u64;
            block(s, length)
        }
        FormEncoding::DW_FORM_block2 => {
            let length = s.read_half()? as u64;
            block(s, length)
        }
        FormEncoding::DW_FORM_block4 => {
            let length = s.read_word()? as u64;
            block(s, length)
        }
        FormEncoding::DW_FORM_block => {
            let length = decode_u64(s)?;
            block(s, length)
        }
        FormEncoding::DW_FORM_indirect => {
            let form = FormEncoding::from_u64(decode_u64(s)?)?;
            if form == FormEncoding::DW_FORM_indirect {
                return Err(DecodeError::Structural("DW_FORM_indirect refers to itself".to_string()));
            }
            read_form(file, s, form, header, strings)
        }
    }
}

fn attribute_text(name: AttributeName, value: &AttributeValue) -> String {
    let text = match value {
        AttributeValue::Address(value) => format!("{value:#x}"),
        AttributeValue::Int(value) => format!("{value}"),
        AttributeValue::Signed(value) => format!("{value}"),
        AttributeValue::Reference(value) => format!("<{value:#x}>"),
        AttributeValue::Text(value) => value.clone(),
        AttributeValue::Flag(value) => format!("{value}"),
        AttributeValue::Block(bytes) => {
            let hex: Vec<String> = bytes.iter().map(|b| format!("{b:x}")).collect();
            let block = format!("{} byte block: {}", bytes.len(), hex.join(" "));
            if matches!(
                name,
                AttributeName::DW_AT_location
                    | AttributeName::DW_AT_data_member_location
                    | AttributeName::DW_AT_vtable_elem_location
            ) {
                format!("{block} (location expression)")
            } else {
                block
            }
        }
    };
    let annotated = match value {
        AttributeValue::Int(v) => annotate(name, *v),
        AttributeValue::Signed(v) => annotate(name, *v as u64),
        _ => None,
    };
    match annotated {
        Some(annotation) => format!("{text} {annotation}"),
        None => text,
    }
}

/// A few attributes carry small enumerations worth spelling out. Values not
/// in the tables get a generic annotation, never an error: vendor extensions
/// live in these spaces.
fn annotate(name: AttributeName, value: u64) -> Option<String> {
    let annotation = match name {
        AttributeName::DW_AT_language => match value {
            0x01 => "(ANSI C)".to_string(),
            0x02 => "(non-ANSI C)".to_string(),
            0x03 => "(Ada)".to_string(),
            0x04 => "(C++)".to_string(),
            0x05 => "(Cobol 74)".to_string(),
            0x06 => "(Cobol 85)".to_string(),
            0x07 => "(Fortran 77)".to_string(),
            0x08 => "(Fortran 90)".to_string(),
            0x09 => "(Pascal 83)".to_string(),
            0x0a => "(Modula 2)".to_string(),
            _ => "(unknown language)".to_string(),
        },
        AttributeName::DW_AT_encoding => match value {
            0x1 => "(machine address)".to_string(),
            0x2 => "(boolean)".to_string(),
            0x3 => "(complex float)".to_string(),
            0x4 => "(float)".to_string(),
            0x5 => "(signed)".to_string(),
            0x6 => "(signed char)".to_string(),
            0x7 => "(unsigned)".to_string(),
            0x8 => "(unsigned char)".to_string(),
            _ => "(unknown type)".to_string(),
        },
        AttributeName::DW_AT_inline => match value {
            0 => "(not inlined)".to_string(),
            1 => "(inlined)".to_string(),
            2 => "(declared as inline but ignored)".to_string(),
            3 => "(declared as inline and inlined)".to_string(),
            _ => "(unknown inline attribute)".to_string(),
        },
        AttributeName::DW_AT_accessibility => match value {
            1 => "(public)".to_string(),
            2 => "(protected)".to_string(),
            3 => "(private)".to_string(),
            _ => "(unknown accessibility)".to_string(),
        },
        AttributeName::DW_AT_visibility => match value {
            1 => "(local)".to_string(),
            2 => "(exported)".to_string(),
            3 => "(qualified)".to_string(),
            _ => "(unknown visibility)".to_string(),
        },
        AttributeName::DW_AT_virtuality => match value {
            0 => "(none)".to_string(),
            1 => "(virtual)".to_string(),
            2 => "(pure virtual)".to_string(),
            _ => "(unknown virtuality)".to_string(),
        },
        AttributeName::DW_AT_identifier_case => match value {
            0 => "(case sensitive)".to_string(),
            1 => "(up case)".to_string(),
            2 => "(down case)".to_string(),
            3 => "(case insensitive)".to_string(),
            _ => "(unknown case)".to_string(),
        },
        AttributeName::DW_AT_calling_convention => match value {
            1 => "(normal)".to_string(),
            2 => "(program)".to_string(),
            3 => "(nocall)".to_string(),
            _ => "(unknown convention)".to_string(),
        },
        _ => return None,
    };
    Some(annotation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{DwarfBuilder, elf_with_debug_sections};
    use std::path::PathBuf;

    #[test]
    fn walks_the_die_tree_with_depths_and_annotations() {
        let mut d = DwarfBuilder::new();
        d.abbrev(1, 0x11, true, &[(0x03, 0x08), (0x13, 0x0b)]); // compile_unit: name string, language data1
        d.abbrev(2, 0x24, false, &[(0x0b, 0x0b)]); // base_type: byte_size data1
        d.end_abbrevs();

        let mut dies = Vec::new();
        dies.push(1); // compile_unit
        dies.extend_from_slice(b"test.c\0");
        dies.push(0x01); // ANSI C
        dies.push(2); // base_type child
        dies.push(4);
        dies.push(0); // end of children
        d.info_unit(2, 0, 8, &dies);

        let file = elf_with_debug_sections(&d);
        let mut out: Vec<u8> = Vec::new();
        dump_info(&mut out, &file).unwrap();
        let s = String::from_utf8(out).unwrap();

        assert!(s.contains("DW_TAG_compile_unit"), "{s}");
        assert!(s.contains("test.c"), "{s}");
        assert!(s.contains("(ANSI C)"), "{s}");
        assert!(s.contains(" <1>"), "{s}"); // the child is one level down
        assert!(s.contains("DW_TAG_base_type"), "{s}");
        assert!(s.contains("Pointer Size:  8"), "{s}");
    }

    #[test]
    fn non_v2_units_are_skipped_with_a_warning() {
        let mut d = DwarfBuilder::new();
        d.abbrev(1, 0x11, false, &[]);
        d.end_abbrevs();
        d.info_unit(4, 0, 8, &[1]);

        let before = utils::warning_count();
        let file = elf_with_debug_sections(&d);
        let mut out: Vec<u8> = Vec::new();
        dump_info(&mut out, &file).unwrap();
        let s = String::from_utf8(out).unwrap();
        assert!(utils::warning_count() > before);
        assert!(!s.contains("Abbrev Number"), "{s}");
        assert!(s.contains("Version:       4"), "{s}");
    }

    #[test]
    fn missing_debug_info_is_reported() {
        let d = DwarfBuilder::new();
        let file = elf_with_debug_sections(&d);
        let _ = file; // an empty builder still makes the sections, so build one without
        let b = crate::fixtures::ElfBuilder::new(true, true);
        let file = crate::elf::ElfFile::from_reader(PathBuf::from("synthetic"), b.reader()).unwrap();
        let mut out: Vec<u8> = Vec::new();
        assert!(matches!(dump_info(&mut out, &file), Err(DecodeError::Structural(_))));
    }
}
