//! The dynamic segment: tag/value pairs telling the run-time loader how to
//! link the object. Usually located through a SHT_DYNAMIC section; stripped
//! files keep only the PT_DYNAMIC segment, where the table's extent is known
//! only from its DT_NULL terminator.
use super::{Reader, Stream};
use crate::elf::arch::MachineHandler;
use crate::elf::sections::SectionHeader;
use crate::elf::segments::ProgramHeader;
use crate::error::DecodeError;
use crate::utils;
use std::collections::BTreeMap;

pub const DT_NULL: i64 = 0;
pub const DT_NEEDED: i64 = 1;
pub const DT_PLTRELSZ: i64 = 2;
pub const DT_PLTGOT: i64 = 3;
pub const DT_HASH: i64 = 4;
pub const DT_STRTAB: i64 = 5;
pub const DT_SYMTAB: i64 = 6;
pub const DT_RELA: i64 = 7;
pub const DT_RELASZ: i64 = 8;
pub const DT_RELAENT: i64 = 9;
pub const DT_STRSZ: i64 = 10;
pub const DT_SYMENT: i64 = 11;
pub const DT_INIT: i64 = 12;
pub const DT_FINI: i64 = 13;
pub const DT_SONAME: i64 = 14;
pub const DT_RPATH: i64 = 15;
pub const DT_SYMBOLIC: i64 = 16;
pub const DT_REL: i64 = 17;
pub const DT_RELSZ: i64 = 18;
pub const DT_RELENT: i64 = 19;
pub const DT_PLTREL: i64 = 20;
pub const DT_DEBUG: i64 = 21;
pub const DT_TEXTREL: i64 = 22;
pub const DT_JMPREL: i64 = 23;
pub const DT_BIND_NOW: i64 = 24;
pub const DT_INIT_ARRAY: i64 = 25;
pub const DT_FINI_ARRAY: i64 = 26;
pub const DT_INIT_ARRAYSZ: i64 = 27;
pub const DT_FINI_ARRAYSZ: i64 = 28;
pub const DT_RUNPATH: i64 = 29;
pub const DT_FLAGS: i64 = 30;
pub const DT_PREINIT_ARRAY: i64 = 32;
pub const DT_PREINIT_ARRAYSZ: i64 = 33;
pub const DT_GNU_HASH: i64 = 0x6ffffef5;
pub const DT_VERSYM: i64 = 0x6ffffff0;
pub const DT_RELACOUNT: i64 = 0x6ffffff9;
pub const DT_RELCOUNT: i64 = 0x6ffffffa;
pub const DT_FLAGS_1: i64 = 0x6ffffffb;
pub const DT_VERDEF: i64 = 0x6ffffffc;
pub const DT_VERDEFNUM: i64 = 0x6ffffffd;
pub const DT_VERNEED: i64 = 0x6ffffffe;
pub const DT_VERNEEDNUM: i64 = 0x6fffffff;

/// One tag/value pair. The value is a plain integer or a pointer, depending
/// on the tag.
#[derive(Clone, Copy, Debug)]
pub struct DynamicEntry {
    pub tag: i64,
    pub value: u64,
}

impl DynamicEntry {
    pub fn new(s: &mut Stream) -> Result<Self, DecodeError> {
        if s.reader.sixty_four_bit {
            let tag = s.read_sxword()?;
            let value = s.read_xword()?;
            Ok(DynamicEntry { tag, value })
        } else {
            let tag = s.read_word()? as i32 as i64;
            let value = s.read_word()? as u64;
            Ok(DynamicEntry { tag, value })
        }
    }

    pub fn record_size(sixty_four_bit: bool) -> u64 {
        if sixty_four_bit { 16 } else { 8 }
    }
}

/// Read the entries of a SHT_DYNAMIC section: the section size says exactly
/// how many there are.
pub fn read_dynamic_section(
    reader: &Reader,
    section: &SectionHeader,
) -> Result<Vec<DynamicEntry>, DecodeError> {
    let record = DynamicEntry::record_size(reader.sixty_four_bit);
    if section.obytes.end().0 > reader.len() as u64 {
        return Err(DecodeError::Io(format!(
            "dynamic section ({} bytes at {:#x}) runs past the end of the file",
            section.obytes.size, section.obytes.start.0
        )));
    }

    let count = section.obytes.size / record;
    let mut s = Stream::new(reader, section.obytes.start.0 as usize);
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        entries.push(DynamicEntry::new(&mut s)?);
    }
    Ok(entries)
}

/// Read the entries of a PT_DYNAMIC segment. Nothing records the count so we
/// scan for the DT_NULL terminator, bounded by the smaller of the segment and
/// the file: on a malformed file the terminator may simply never appear.
pub fn read_dynamic_segment(
    reader: &Reader,
    segment: &ProgramHeader,
) -> Result<Vec<DynamicEntry>, DecodeError> {
    let record = DynamicEntry::record_size(reader.sixty_four_bit);
    let start = segment.obytes.start.0;
    let end = segment.obytes.end().0.min(reader.len() as u64);

    let mut entries = Vec::new();
    let mut s = Stream::new(reader, start as usize);
    loop {
        if (s.offset as u64) + record > end {
            return Err(DecodeError::Structural(
                "dynamic segment has no DT_NULL terminator".to_string(),
            ));
        }
        let entry = DynamicEntry::new(&mut s)?;
        entries.push(entry);
        if entry.tag == DT_NULL {
            return Ok(entries);
        }
    }
}

/// The decoded values of the well-known tags, collected in one pass so later
/// consumers (symbol and relocation dumping without a section table) don't
/// re-scan. At most one value is kept per tag; a repeated pointer-bearing tag
/// is a format error in the input and is reported, not silently overwritten.
pub struct DynamicInfo {
    values: BTreeMap<i64, u64>,
}

const POINTER_TAGS: [i64; 13] = [
    DT_PLTGOT, DT_HASH, DT_STRTAB, DT_SYMTAB, DT_RELA, DT_INIT, DT_FINI, DT_REL, DT_JMPREL,
    DT_GNU_HASH, DT_VERSYM, DT_VERDEF, DT_VERNEED,
];

const SIZE_TAGS: [i64; 10] = [
    DT_PLTRELSZ, DT_RELASZ, DT_RELAENT, DT_STRSZ, DT_SYMENT, DT_RELSZ, DT_RELENT, DT_PLTREL,
    DT_VERDEFNUM, DT_VERNEEDNUM,
];

impl DynamicInfo {
    pub fn new(entries: &[DynamicEntry]) -> Self {
        let mut values = BTreeMap::new();
        for entry in entries.iter() {
            let pointer = POINTER_TAGS.contains(&entry.tag);
            if !pointer && !SIZE_TAGS.contains(&entry.tag) {
                continue;
            }
            if values.contains_key(&entry.tag) {
                if pointer {
                    utils::warn(&format!(
                        "duplicate dynamic tag {}: keeping the first value",
                        generic_tag_name(entry.tag).unwrap_or("<unknown>")
                    ));
                }
                continue;
            }
            values.insert(entry.tag, entry.value);
        }
        DynamicInfo { values }
    }

    pub fn get(&self, tag: i64) -> Option<u64> {
        self.values.get(&tag).copied()
    }
}

fn generic_tag_name(tag: i64) -> Option<&'static str> {
    match tag {
        DT_NULL => Some("NULL"),
        DT_NEEDED => Some("NEEDED"),
        DT_PLTRELSZ => Some("PLTRELSZ"),
        DT_PLTGOT => Some("PLTGOT"),
        DT_HASH => Some("HASH"),
        DT_STRTAB => Some("STRTAB"),
        DT_SYMTAB => Some("SYMTAB"),
        DT_RELA => Some("RELA"),
        DT_RELASZ => Some("RELASZ"),
        DT_RELAENT => Some("RELAENT"),
        DT_STRSZ => Some("STRSZ"),
        DT_SYMENT => Some("SYMENT"),
        DT_INIT => Some("INIT"),
        DT_FINI => Some("FINI"),
        DT_SONAME => Some("SONAME"),
        DT_RPATH => Some("RPATH"),
        DT_SYMBOLIC => Some("SYMBOLIC"),
        DT_REL => Some("REL"),
        DT_RELSZ => Some("RELSZ"),
        DT_RELENT => Some("RELENT"),
        DT_PLTREL => Some("PLTREL"),
        DT_DEBUG => Some("DEBUG"),
        DT_TEXTREL => Some("TEXTREL"),
        DT_JMPREL => Some("JMPREL"),
        DT_BIND_NOW => Some("BIND_NOW"),
        DT_INIT_ARRAY => Some("INIT_ARRAY"),
        DT_FINI_ARRAY => Some("FINI_ARRAY"),
        DT_INIT_ARRAYSZ => Some("INIT_ARRAYSZ"),
        DT_FINI_ARRAYSZ => Some("FINI_ARRAYSZ"),
        DT_RUNPATH => Some("RUNPATH"),
        DT_FLAGS => Some("FLAGS"),
        DT_PREINIT_ARRAY => Some("PREINIT_ARRAY"),
        DT_PREINIT_ARRAYSZ => Some("PREINIT_ARRAYSZ"),
        DT_GNU_HASH => Some("GNU_HASH"),
        DT_VERSYM => Some("VERSYM"),
        DT_RELACOUNT => Some("RELACOUNT"),
        DT_RELCOUNT => Some("RELCOUNT"),
        DT_FLAGS_1 => Some("FLAGS_1"),
        DT_VERDEF => Some("VERDEF"),
        DT_VERDEFNUM => Some("VERDEFNUM"),
        DT_VERNEED => Some("VERNEED"),
        DT_VERNEEDNUM => Some("VERNEEDNUM"),
        _ => None,
    }
}

/// The display name for a tag. Tags in the reserved ranges go through the
/// machine handler; an unrecognized specific tag is rendered, never an error.
pub fn tag_name(tag: i64, machine: &dyn MachineHandler) -> String {
    if let Some(name) = generic_tag_name(tag) {
        return name.to_string();
    }
    match tag {
        0x70000000..=0x7fffffff => match machine.dynamic_tag_name(tag) {
            Some(name) => name.to_string(),
            None => format!("Processor Specific: {tag:#x}"),
        },
        0x60000000..=0x6fffffff => format!("Operating System specific: {tag:#x}"),
        _ => format!("<unknown>: {tag:#x}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elf::arch;
    use crate::elf::segments::read_segments;
    use crate::fixtures::ElfBuilder;

    const PT_DYNAMIC: u32 = 2;

    #[test]
    fn segment_scan_stops_at_the_terminator() {
        let mut b = ElfBuilder::new(true, true);
        let at = b.append_dyn64(&[(DT_NEEDED, 1), (DT_STRTAB, 0x400000), (DT_NULL, 0)]);
        b.add_segment(PT_DYNAMIC, at, 0x400000 + at, 48, 48, 4, 8);
        let r = b.reader();
        let h = crate::elf::ElfHeader::new(&r).unwrap();
        let segments = read_segments(&r, &h).unwrap();
        let entries = read_dynamic_segment(&r, &segments[0]).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].tag, DT_NEEDED);
        assert_eq!(entries[2].tag, DT_NULL);
    }

    #[test]
    fn missing_terminator_is_structural() {
        let mut b = ElfBuilder::new(true, true);
        let at = b.append_dyn64(&[(DT_NEEDED, 1), (DT_STRTAB, 0x400000)]);
        b.add_segment(PT_DYNAMIC, at, 0x400000 + at, 32, 32, 4, 8);
        let r = b.reader();
        let h = crate::elf::ElfHeader::new(&r).unwrap();
        let segments = read_segments(&r, &h).unwrap();
        assert!(matches!(
            read_dynamic_segment(&r, &segments[0]),
            Err(DecodeError::Structural(_))
        ));
    }

    #[test]
    fn duplicate_pointer_tags_keep_the_first_value() {
        let before = crate::utils::warning_count();
        let entries = vec![
            DynamicEntry { tag: DT_SYMTAB, value: 0x1000 },
            DynamicEntry { tag: DT_SYMTAB, value: 0x2000 },
            DynamicEntry { tag: DT_NULL, value: 0 },
        ];
        let info = DynamicInfo::new(&entries);
        assert_eq!(info.get(DT_SYMTAB), Some(0x1000));
        assert!(crate::utils::warning_count() > before);
    }

    #[test]
    fn tag_names_fall_back_by_range() {
        let generic = arch::handler(0);
        let mips = arch::handler(8);
        assert_eq!(tag_name(DT_SONAME, generic), "SONAME");
        assert_eq!(tag_name(0x70000001, mips), "MIPS_RLD_VERSION");
        assert_eq!(tag_name(0x70000099, mips), "Processor Specific: 0x70000099");
        assert_eq!(tag_name(0x60000001, generic), "Operating System specific: 0x60000001");
    }
}
