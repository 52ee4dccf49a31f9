//! Section headers describe the link-time view of the file. Also see
//! segments.
use super::{Reader, Stream};
use crate::elf::arch::MachineHandler;
use crate::elf::{Bytes, ElfHeader, Offset, VirtualAddr};
use crate::error::DecodeError;
use crate::utils;

const WRITE_FLAG: u64 = 1 << 0; // Writable
pub const ALLOC_FLAG: u64 = 1 << 1; // Occupies memory during execution
const EXECINSTR_FLAG: u64 = 1 << 2; // Executable
const MERGE_FLAG: u64 = 1 << 4; // Might be merged
const STRINGS_FLAG: u64 = 1 << 5; // Contains nul-terminated strings
const INFO_LINK_FLAG: u64 = 1 << 6; // sh_info contains a section index
const LINK_ORDER_FLAG: u64 = 1 << 7; // Preserve order after combining
const OS_NONCONFORMING_FLAG: u64 = 1 << 8; // Non-standard OS specific handling required
const GROUP_FLAG: u64 = 1 << 9; // Section is member of a group
const TLS_FLAG: u64 = 1 << 10; // Section holds thread-local data
const COMPRESSED_FLAG: u64 = 1 << 11; // Section holds compressed data
const MASKOS_FLAG: u64 = 0x0ff00000; // OS-specific
const MASKPROC_FLAG: u64 = 0xf0000000; // Processor-specific

/// Describes a section.
#[derive(Clone)]
pub struct SectionHeader {
    // Elf32_Shdr or Elf64_Shdr, see https://refspecs.linuxbase.org/elf/gabi4+/ch4.sheader.html
    /// Resolved from the section name string table. Empty means no name.
    pub name: String,

    /// Index into the section name string table.
    pub name_index: u32,

    /// Type of the section.
    pub stype: SectionType,

    /// Write, alloc, and/or exec.
    pub flags: u64,

    /// Addressing for the bytes in the section using offsets from the start of the file.
    pub obytes: Bytes<Offset>,

    /// Addressing for the bytes in the section as loaded into memory. Only
    /// meaningful when the alloc flag is set.
    pub vbytes: Bytes<VirtualAddr>,

    /// Index of an associated section, usually a string or symbol table.
    pub link: u32,

    /// Additional section info.
    pub info: u32,

    /// Section alignment.
    pub align: u64,

    /// Set if the section holds a table of fixed-size entries.
    pub entry_size: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SectionType {
    /// Dynamic linking information.
    Dynamic,

    /// Dynamic linker symbol table.
    DynamicSymbolTable,

    /// Array of pointers to termination functions.
    FiniArray,

    /// GNU style hash table.
    GnuHash,

    /// Array of pointers to initialization functions.
    InitArray,

    /// Uninitialized data.
    NoBits,

    /// Arbitrary metadata.
    Note,

    /// Not to be used.
    Null,

    /// Array of pointers to functions called before the regular
    /// initialization functions.
    PreinitArray,

    /// CPU instructions or constant data.
    ProgBits,

    /// Relocation entries with addends.
    RelocationsWith,

    /// Relocation entries without addends.
    RelocationsWithout,

    /// Strings for use by the linker and debugger.
    StringTable,

    /// SysV symbol hash table.
    SymbolHashTable,

    /// Full symbol table, including debugging symbols.
    SymbolTable,

    /// GNU symbol versions that are provided.
    VerDef,

    /// GNU symbol versions that are required.
    VerNeed,

    /// GNU symbol version table.
    VerSym,

    OsSpecific(u32),
    ProcSpecific(u32),
    UserSpecific(u32),
    Unknown(u32),
}

impl SectionType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0x0 => SectionType::Null,
            0x1 => SectionType::ProgBits,
            0x2 => SectionType::SymbolTable,
            0x3 => SectionType::StringTable,
            0x4 => SectionType::RelocationsWith,
            0x5 => SectionType::SymbolHashTable,
            0x6 => SectionType::Dynamic,
            0x7 => SectionType::Note,
            0x8 => SectionType::NoBits,
            0x9 => SectionType::RelocationsWithout,
            0xb => SectionType::DynamicSymbolTable,
            0xe => SectionType::InitArray,
            0xf => SectionType::FiniArray,
            0x10 => SectionType::PreinitArray,
            0x6ffffff6 => SectionType::GnuHash,
            0x6ffffffd => SectionType::VerDef,
            0x6ffffffe => SectionType::VerNeed,
            0x6fffffff => SectionType::VerSym,
            0x60000000..0x70000000 => SectionType::OsSpecific(value),
            0x70000000..0x80000000 => SectionType::ProcSpecific(value),
            0x80000000.. => SectionType::UserSpecific(value),
            _ => {
                utils::warn(&format!("unknown section type: {value:#x}"));
                SectionType::Unknown(value)
            }
        }
    }

    pub fn name(&self, machine: &dyn MachineHandler) -> String {
        match self {
            SectionType::Dynamic => "DYNAMIC".to_string(),
            SectionType::DynamicSymbolTable => "DYNSYM".to_string(),
            SectionType::FiniArray => "FINI_ARRAY".to_string(),
            SectionType::GnuHash => "GNU_HASH".to_string(),
            SectionType::InitArray => "INIT_ARRAY".to_string(),
            SectionType::NoBits => "NOBITS".to_string(),
            SectionType::Note => "NOTE".to_string(),
            SectionType::Null => "NULL".to_string(),
            SectionType::PreinitArray => "PREINIT_ARRAY".to_string(),
            SectionType::ProgBits => "PROGBITS".to_string(),
            SectionType::RelocationsWith => "RELA".to_string(),
            SectionType::RelocationsWithout => "REL".to_string(),
            SectionType::StringTable => "STRTAB".to_string(),
            SectionType::SymbolHashTable => "HASH".to_string(),
            SectionType::SymbolTable => "SYMTAB".to_string(),
            SectionType::VerDef => "VERDEF".to_string(),
            SectionType::VerNeed => "VERNEED".to_string(),
            SectionType::VerSym => "VERSYM".to_string(),
            SectionType::OsSpecific(v) => format!("Operating System specific: {v:#x}"),
            SectionType::ProcSpecific(v) => match machine.section_type_name(*v) {
                Some(name) => name.to_string(),
                None => format!("Processor Specific: {v:#x}"),
            },
            SectionType::UserSpecific(v) => format!("Application specific: {v:#x}"),
            SectionType::Unknown(v) => format!("<unknown>: {v:#x}"),
        }
    }
}

impl SectionHeader {
    pub fn new(reader: &Reader, offset: usize) -> Result<Self, DecodeError> {
        let mut s = Stream::new(reader, offset);
        let name_index = s.read_word()?;
        let stype = SectionType::from_u32(s.read_word()?);
        let flags = if reader.sixty_four_bit {
            s.read_xword()?
        } else {
            s.read_word()? as u64
        };
        let vaddr = s.read_addr()?;
        let offset = s.read_offset()?;
        let size = if reader.sixty_four_bit {
            s.read_xword()?
        } else {
            s.read_word()? as u64
        };
        let link = s.read_word()?;
        let info = s.read_word()?;
        let align = if reader.sixty_four_bit {
            s.read_xword()?
        } else {
            s.read_word()? as u64
        };
        let entry_size = if reader.sixty_four_bit {
            s.read_xword()?
        } else {
            s.read_word()? as u64
        };
        Ok(SectionHeader {
            name: String::new(),
            name_index,
            stype,
            flags,
            obytes: Bytes::<Offset>::from_raw(offset, size),
            vbytes: Bytes::<VirtualAddr>::from_raw(vaddr, size),
            link,
            info,
            align,
            entry_size,
        })
    }

    pub fn flags(flags: u64) -> String {
        let mut result = Vec::new();
        if flags & WRITE_FLAG != 0 {
            result.push("WRITE");
        }
        if flags & ALLOC_FLAG != 0 {
            result.push("ALLOC");
        }
        if flags & EXECINSTR_FLAG != 0 {
            result.push("EXEC");
        }
        if flags & MERGE_FLAG != 0 {
            result.push("MERGE");
        }
        if flags & STRINGS_FLAG != 0 {
            result.push("STRINGS");
        }
        if flags & INFO_LINK_FLAG != 0 {
            result.push("INFO");
        }
        if flags & LINK_ORDER_FLAG != 0 {
            result.push("LINK");
        }
        if flags & OS_NONCONFORMING_FLAG != 0 {
            result.push("OS_NONCONFORMING");
        }
        if flags & GROUP_FLAG != 0 {
            result.push("GROUP");
        }
        if flags & TLS_FLAG != 0 {
            result.push("TLS");
        }
        if flags & COMPRESSED_FLAG != 0 {
            result.push("COMPRESSED");
        }
        if flags & MASKOS_FLAG != 0 {
            result.push("MASKOS");
        }
        if flags & MASKPROC_FLAG != 0 {
            result.push("MASKPROC");
        }
        if result.is_empty() {
            result.push("none");
        }
        result.join(" ")
    }
}

/// A slice of the file holding nul-terminated strings, indexed by byte
/// position. Index zero is by convention an empty string.
#[derive(Clone)]
pub struct StringTable {
    pub bytes: Bytes<Offset>,
}

impl StringTable {
    pub fn empty() -> Self {
        StringTable {
            bytes: Bytes::<Offset>::from_raw(0, 0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the string starting at `index`. Note that an index can point
    /// into the middle of a longer string; that's normal and how linkers save
    /// space for names like `printf` inside `__printf`.
    pub fn get(&self, reader: &Reader, index: usize) -> Option<String> {
        if (index as u64) >= self.bytes.size {
            return None;
        }
        let end = self.bytes.end().0 as usize;
        let mut s = String::new();
        let mut offset = self.bytes.start.0 as usize + index;
        loop {
            if offset >= end {
                utils::warn("string table entry is not nul terminated");
                break;
            }
            match reader.read_byte(offset) {
                Ok(0) => break,
                Ok(byte) => s.push(byte as char),
                Err(_) => {
                    utils::warn("string table runs past the end of the file");
                    break;
                }
            }
            offset += 1;
        }
        Some(s)
    }
}

/// Read the whole section header table and resolve names against the table
/// named by e_shstrndx. A missing or empty name table yields headers with
/// empty names, not an error.
pub fn read_sections(
    reader: &Reader,
    header: &ElfHeader,
) -> Result<(Vec<SectionHeader>, StringTable), DecodeError> {
    let count = header.num_section_entries as usize;
    if count == 0 {
        return Ok((Vec::new(), StringTable::empty()));
    }

    let entry_size = header.section_entry_size as usize;
    let table_size = count
        .checked_mul(entry_size)
        .ok_or_else(|| DecodeError::Resource(format!("section header table is too large: {count} entries")))?;
    let start = header.section_offset as usize;
    if start.checked_add(table_size).is_none_or(|end| end > reader.len()) {
        return Err(DecodeError::Io(format!(
            "section header table ({count} entries at {start:#x}) runs past the end of the file"
        )));
    }

    let mut sections = Vec::with_capacity(count);
    for i in 0..count {
        sections.push(SectionHeader::new(reader, start + i * entry_size)?);
    }

    let names = string_table_at(reader, &sections, header.string_table_index as u32);
    for section in sections.iter_mut() {
        match names.get(reader, section.name_index as usize) {
            Some(name) => section.name = name,
            None => {
                if section.name_index != 0 {
                    utils::warn(&format!("bad section name index: {}", section.name_index));
                }
            }
        }
    }
    Ok((sections, names))
}

/// The string table stored in the section at `index`. A zero-sized section at
/// that index yields an empty table rather than an error.
pub fn string_table_at(reader: &Reader, sections: &[SectionHeader], index: u32) -> StringTable {
    match sections.get(index as usize) {
        Some(section) if index != 0 => {
            let table = StringTable {
                bytes: section.obytes,
            };
            if table.bytes.end().0 > reader.len() as u64 {
                utils::warn(&format!("string table in section {index} runs past the end of the file"));
                return StringTable::empty();
            }
            table
        }
        _ => {
            if index != 0 {
                utils::warn(&format!("bad string table section index: {index}"));
            }
            StringTable::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ElfBuilder;

    const SHT_PROGBITS: u32 = 1;

    #[test]
    fn names_resolve_through_shstrtab() {
        let mut b = ElfBuilder::new(true, true);
        let at = b.append(b"hello world");
        b.add_section(".text", SHT_PROGBITS, 6, 0x1000, at, 11, 0, 0, 0);
        b.add_section(".data", SHT_PROGBITS, 3, 0x2000, at, 11, 0, 0, 0);
        let r = b.reader();
        let h = crate::elf::ElfHeader::new(&r).unwrap();
        let (sections, names) = read_sections(&r, &h).unwrap();
        // null section + 2 + .shstrtab
        assert_eq!(sections.len(), 4);
        assert_eq!(sections[1].name, ".text");
        assert_eq!(sections[2].name, ".data");
        assert_eq!(sections[3].name, ".shstrtab");
        assert!(!names.is_empty());
    }

    #[test]
    fn truncated_table_is_an_io_error() {
        let mut b = ElfBuilder::new(true, true);
        b.add_section(".text", SHT_PROGBITS, 6, 0x1000, 0, 0, 0, 0, 0);
        b.patch_sh_count(1000);
        let r = b.reader();
        let h = crate::elf::ElfHeader::new(&r).unwrap();
        assert!(matches!(read_sections(&r, &h), Err(DecodeError::Io(_))));
    }

    #[test]
    fn missing_name_table_yields_empty_names() {
        let mut b = ElfBuilder::new(true, true);
        b.add_section(".text", SHT_PROGBITS, 6, 0x1000, 0, 0, 0, 0, 0);
        b.patch_shstrndx(0);
        let r = b.reader();
        let h = crate::elf::ElfHeader::new(&r).unwrap();
        let (sections, names) = read_sections(&r, &h).unwrap();
        assert!(names.is_empty());
        assert!(sections.iter().all(|s| s.name.is_empty()));
    }

    #[test]
    fn flag_text() {
        insta::assert_snapshot!(SectionHeader::flags(0x7), @"WRITE ALLOC EXEC");
        insta::assert_snapshot!(SectionHeader::flags(0x0), @"none");
    }

    #[test]
    fn string_lookups_are_bounded() {
        let mut b = ElfBuilder::new(true, true);
        let at = b.append(b"abc\0");
        b.add_section(".strs", 3, 0, 0, at, 4, 0, 0, 0);
        let r = b.reader();
        let h = crate::elf::ElfHeader::new(&r).unwrap();
        let (sections, _) = read_sections(&r, &h).unwrap();
        let table = StringTable {
            bytes: sections[1].obytes,
        };
        assert_eq!(table.get(&r, 0).unwrap(), "abc");
        assert_eq!(table.get(&r, 1).unwrap(), "bc");
        assert!(table.get(&r, 4).is_none());
        assert!(table.get(&r, 5000).is_none());
    }
}
