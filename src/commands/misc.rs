//! The byte-level reports: raw hex dumps of individual sections and the
//! note records.
use crate::cli::ReportArgs;
use crate::elf::ElfFile;
use crate::elf::sections::{SectionHeader, SectionType, StringTable};
use crate::error::DecodeError;
use crate::utils::uwriteln;
use std::io::Write;

/// Hex dump of one section, selected by name or by index.
pub fn hex_dump(out: &mut impl Write, file: &ElfFile, which: &str) -> Result<(), DecodeError> {
    let section = find_requested_section(file, which).ok_or_else(|| {
        DecodeError::Structural(format!("couldn't find section {which}"))
    })?;
    if section.obytes.is_empty() {
        uwriteln!(out, "Section {} has no data to dump.", section.name);
        return Ok(());
    }

    uwriteln!(out, "Hex dump of section {}:", section.name);
    let start = section.obytes.start.0 as usize;
    let size = section.obytes.size as usize;
    dump_bytes(out, file, start, size);

    // string tables are more useful as strings
    if section.stype == SectionType::StringTable {
        let table = StringTable {
            bytes: section.obytes,
        };
        uwriteln!(out);
        uwriteln!(out, "String dump of section {}:", section.name);
        let mut index = 0;
        while (index as u64) < table.bytes.size {
            match table.get(&file.reader, index) {
                Some(s) => {
                    if !s.is_empty() {
                        uwriteln!(out, "  [{index:6x}]  {s}");
                    }
                    index += s.len() + 1;
                }
                None => break,
            }
        }
    }
    Ok(())
}

fn find_requested_section<'a>(file: &'a ElfFile, which: &str) -> Option<&'a SectionHeader> {
    if let Ok(index) = which.parse::<u32>() {
        return file.find_section(index);
    }
    file.find_section_named(which)
}

fn dump_bytes(out: &mut impl Write, file: &ElfFile, start: usize, size: usize) {
    let end = start.saturating_add(size).min(file.reader.len());
    let mut at = start;
    while at < end {
        let row = (end - at).min(16);
        let mut hex = String::new();
        let mut ascii = String::new();
        for i in 0..row {
            let byte = match file.reader.read_byte(at + i) {
                Ok(byte) => byte,
                Err(_) => break,
            };
            hex.push_str(&format!("{byte:02x} "));
            if i == 7 {
                hex.push(' ');
            }
            if byte.is_ascii_graphic() {
                ascii.push(byte as char);
            } else {
                ascii.push('.');
            }
        }
        uwriteln!(out, "  {:08x}  {hex:<49} {ascii}", at - start);
        at += row;
    }
}

pub fn notes(out: &mut impl Write, file: &ElfFile, _args: &ReportArgs) -> Result<(), DecodeError> {
    let groups = file.notes();
    if groups.is_empty() {
        uwriteln!(out, "There are no notes in this file.");
        return Ok(());
    }

    for (source, notes) in groups {
        uwriteln!(out, "Notes in {source}:");
        uwriteln!(out, "  Owner     Data size  Description");
        for note in notes {
            uwriteln!(
                out,
                "  {:8}  {:#09x}  {}",
                note.name,
                note.desc.size,
                note.type_name()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ElfBuilder;
    use std::path::PathBuf;

    #[test]
    fn hex_dump_renders_hex_and_ascii() {
        let mut b = ElfBuilder::new(true, true);
        let at = b.append(b"Hello\x01World");
        b.add_section(".stuff", 1, 0, 0, at, 11, 0, 0, 0);
        let file = ElfFile::from_reader(PathBuf::from("synthetic"), b.reader()).unwrap();

        let mut v: Vec<u8> = Vec::new();
        hex_dump(&mut v, &file, ".stuff").unwrap();
        let s = String::from_utf8(v).unwrap();
        assert!(s.contains("48 65 6c 6c 6f"), "{s}"); // Hello
        assert!(s.contains("Hello.World"), "{s}");

        // the same section by index
        let mut v: Vec<u8> = Vec::new();
        hex_dump(&mut v, &file, "1").unwrap();
        assert!(String::from_utf8(v).unwrap().contains("Hello.World"));
    }

    #[test]
    fn string_tables_also_dump_as_strings() {
        let mut b = ElfBuilder::new(true, true);
        let at = b.append(b"\0alpha\0beta\0");
        b.add_section(".strs", 3, 0, 0, at, 12, 0, 0, 0);
        let file = ElfFile::from_reader(PathBuf::from("synthetic"), b.reader()).unwrap();

        let mut v: Vec<u8> = Vec::new();
        hex_dump(&mut v, &file, ".strs").unwrap();
        let s = String::from_utf8(v).unwrap();
        assert!(s.contains("alpha"), "{s}");
        assert!(s.contains("beta"), "{s}");
    }

    #[test]
    fn unknown_sections_are_structural_errors() {
        let b = ElfBuilder::new(true, true);
        let file = ElfFile::from_reader(PathBuf::from("synthetic"), b.reader()).unwrap();
        let mut v: Vec<u8> = Vec::new();
        assert!(matches!(
            hex_dump(&mut v, &file, ".nonesuch"),
            Err(DecodeError::Structural(_))
        ));
    }
}
