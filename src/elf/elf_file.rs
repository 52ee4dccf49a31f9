//! One parsed ELF file: the envelope plus the derived tables every report
//! reads. Everything is built once, up front, and only read afterwards; the
//! table errors that can happen here (truncated program or section header
//! tables) are reported and leave an empty table so the other reports still
//! run.
use super::{Reader, Stream};
use crate::elf::arch::{self, MachineHandler};
use crate::elf::dynamic::{self, DynamicEntry, DynamicInfo};
use crate::elf::notes::Note;
use crate::elf::sections::{self, SectionHeader, SectionType, StringTable};
use crate::elf::segments::{self, ProgramHeader, SegmentType};
use crate::elf::symbols::{self, SymbolIndex, SymbolTable, SymbolTableEntry, SymbolType};
use crate::elf::{Bytes, ElfHeader, Offset, SectionIndex};
use crate::error::DecodeError;
use crate::utils;
use memmap2::Mmap;
use std::fs::File;
use std::path::PathBuf;

pub struct ElfFile {
    pub path: PathBuf,
    pub reader: Reader,
    pub header: ElfHeader,
    pub segments: Vec<ProgramHeader>,
    pub sections: Vec<SectionHeader>,

    /// The difference between link-time virtual addresses and file offsets,
    /// used to translate the pointers in the dynamic segment.
    pub load_bias: u64,

    /// Resolved once from e_machine and consulted for all the
    /// processor-specific code ranges.
    pub machine: &'static dyn MachineHandler,
}

impl ElfFile {
    pub fn new(path: PathBuf) -> Result<Self, DecodeError> {
        let file = File::open(path.clone())
            .map_err(|err| DecodeError::Io(format!("couldn't open {}: {err}", path.display())))?;

        // This is unsafe because it has undefined behavior if the underlying
        // file is modified while the memory map is in use.
        let bytes = unsafe { Mmap::map(&file) }
            .map_err(|err| DecodeError::Io(format!("couldn't map {}: {err}", path.display())))?;
        let reader = Reader::new(bytes)?;
        ElfFile::from_reader(path, reader)
    }

    pub fn from_reader(path: PathBuf, reader: Reader) -> Result<Self, DecodeError> {
        let header = ElfHeader::new(&reader)?;
        let segments = match segments::read_segments(&reader, &header) {
            Ok(segments) => segments,
            Err(err) => {
                utils::warn(&format!("failed to read program headers: {err}"));
                Vec::new()
            }
        };
        let sections = match sections::read_sections(&reader, &header) {
            Ok((sections, _)) => sections,
            Err(err) => {
                utils::warn(&format!("failed to read section headers: {err}"));
                Vec::new()
            }
        };
        let load_bias = segments::load_bias(&segments);
        let machine = arch::handler(header.machine);

        let file = ElfFile {
            path,
            reader,
            header,
            segments,
            sections,
            load_bias,
            machine,
        };
        file.check_duplicate_sections();
        Ok(file)
    }

    // Linkers emit at most one of each of these; a second one is tolerated
    // (first seen wins everywhere below) but worth flagging.
    fn check_duplicate_sections(&self) {
        let dynsyms = self
            .sections
            .iter()
            .filter(|s| s.stype == SectionType::DynamicSymbolTable)
            .count();
        if dynsyms > 1 {
            utils::warn(&format!("{dynsyms} dynamic symbol table sections: using the first"));
        }
        let dynstrs = self.sections.iter().filter(|s| s.name == ".dynstr").count();
        if dynstrs > 1 {
            utils::warn(&format!("{dynstrs} .dynstr sections: using the first"));
        }
    }

    pub fn find_section_named(&self, name: &str) -> Option<&SectionHeader> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn find_section(&self, section_index: u32) -> Option<&SectionHeader> {
        let section = self.sections.get(section_index as usize);
        if section.is_none() {
            utils::warn(&format!("bad section index: {section_index}"));
        }
        section
    }

    pub fn section_name(&self, section_index: u32) -> String {
        match self.find_section(section_index) {
            Some(section) => section.name.clone(),
            None => format!("<section index {section_index}>"),
        }
    }

    pub fn find_symbols(&self) -> Option<SymbolTable> {
        self.do_find_symbols(SectionType::SymbolTable)
    }

    pub fn find_dynamic_symbols(&self) -> Option<SymbolTable> {
        if !self.sections.is_empty() {
            return self.do_find_symbols(SectionType::DynamicSymbolTable);
        }
        self.dynamic_symbols_from_segments()
    }

    fn do_find_symbols(&self, stype: SectionType) -> Option<SymbolTable> {
        let section = self.sections.iter().find(|s| s.stype == stype)?;
        self.read_symbol_section(section, stype == SectionType::DynamicSymbolTable)
    }

    /// The symbol table stored in the section at `index`, e.g. the one a
    /// relocation section's sh_link names.
    pub fn symbol_table_at(&self, index: u32) -> Option<SymbolTable> {
        let section = self.find_section(index)?;
        match section.stype {
            SectionType::SymbolTable | SectionType::DynamicSymbolTable => self
                .read_symbol_section(section, section.stype == SectionType::DynamicSymbolTable),
            _ => {
                utils::warn(&format!("section {index} is not a symbol table"));
                None
            }
        }
    }

    fn read_symbol_section(&self, section: &SectionHeader, dynamic: bool) -> Option<SymbolTable> {
        let entry_size = if section.entry_size != 0 {
            section.entry_size
        } else {
            SymbolTableEntry::record_size(self.reader.sixty_four_bit)
        };
        let count = section.obytes.size / entry_size;
        match symbols::read_symbols(&self.reader, section.obytes.start.0, count, entry_size) {
            Ok(entries) => Some(SymbolTable {
                section_name: section.name.clone(),
                dynamic,
                entries,
                strings: sections::string_table_at(&self.reader, &self.sections, section.link),
            }),
            Err(err) => {
                utils::warn(&format!("failed to read symbols in {}: {err}", section.name));
                None
            }
        }
    }

    /// Locate the dynamic symbol table through the dynamic segment when the
    /// section table has been stripped. Nothing records that table's size, so
    /// like the reference tools we assume it runs to the end of the file and
    /// divide by the record size. That deliberately overestimates; it is the
    /// documented behavior for section-less files, not a bug to fix.
    fn dynamic_symbols_from_segments(&self) -> Option<SymbolTable> {
        let entries = match self.dynamic_entries() {
            Ok(Some(entries)) => entries,
            _ => return None,
        };
        let info = DynamicInfo::new(&entries);

        let vaddr = info.get(dynamic::DT_SYMTAB)?;
        let offset = vaddr.wrapping_sub(self.load_bias);
        if offset >= self.reader.len() as u64 {
            utils::warn(&format!("DT_SYMTAB points outside the file: {vaddr:#x}"));
            return None;
        }
        let entry_size = info
            .get(dynamic::DT_SYMENT)
            .filter(|&size| size != 0)
            .unwrap_or_else(|| SymbolTableEntry::record_size(self.reader.sixty_four_bit));
        let count = (self.reader.len() as u64 - offset) / entry_size;

        match symbols::read_symbols(&self.reader, offset, count, entry_size) {
            Ok(entries) => Some(SymbolTable {
                section_name: "PT_DYNAMIC".to_string(),
                dynamic: true,
                entries,
                strings: self.dynamic_strings(&info),
            }),
            Err(err) => {
                utils::warn(&format!("failed to read dynamic symbols: {err}"));
                None
            }
        }
    }

    /// The string table for dynamic symbols: .dynstr when there is a section
    /// table, DT_STRTAB translated by the load bias otherwise.
    pub fn dynamic_strings(&self, info: &DynamicInfo) -> StringTable {
        if let Some(section) = self.find_section_named(".dynstr") {
            return StringTable {
                bytes: section.obytes,
            };
        }
        if let Some(vaddr) = info.get(dynamic::DT_STRTAB) {
            let offset = vaddr.wrapping_sub(self.load_bias);
            if offset < self.reader.len() as u64 {
                let limit = self.reader.len() as u64 - offset;
                let size = info.get(dynamic::DT_STRSZ).unwrap_or(limit).min(limit);
                return StringTable {
                    bytes: Bytes::<Offset>::from_raw(offset, size),
                };
            }
            utils::warn(&format!("DT_STRTAB points outside the file: {vaddr:#x}"));
        }
        StringTable::empty()
    }

    /// The dynamic entries, from the section table when present and from the
    /// PT_DYNAMIC segment otherwise. None when the file isn't dynamically
    /// linked at all.
    pub fn dynamic_entries(&self) -> Result<Option<Vec<DynamicEntry>>, DecodeError> {
        if let Some(section) = self.sections.iter().find(|s| s.stype == SectionType::Dynamic) {
            return Ok(Some(dynamic::read_dynamic_section(&self.reader, section)?));
        }
        if let Some(segment) = self.segments.iter().find(|s| s.stype == SegmentType::Dynamic) {
            return Ok(Some(dynamic::read_dynamic_segment(&self.reader, segment)?));
        }
        Ok(None)
    }

    /// A symbol's display name, with the fallbacks the reports rely on:
    /// section symbols borrow their section's name, and a missing string
    /// table degrades to the raw index instead of failing the report.
    pub fn symbol_name(&self, table: &SymbolTable, entry: &SymbolTableEntry) -> String {
        if entry.name.0 == 0 {
            if entry.stype == SymbolType::Section
                && let SymbolIndex::Index(SectionIndex(index)) = entry.index
            {
                return self.section_name(index);
            }
            return String::new();
        }
        if table.strings.is_empty() {
            return format!("<string table index {}>", entry.name.0);
        }
        match table.strings.get(&self.reader, entry.name.0 as usize) {
            Some(name) => name,
            None => {
                utils::warn(&format!("bad symbol name index: {}", entry.name.0));
                format!("<string table index {}>", entry.name.0)
            }
        }
    }

    /// All note records, preferring the section view when one exists.
    pub fn notes(&self) -> Vec<(String, Vec<Note>)> {
        let mut groups = Vec::new();
        let note_sections: Vec<&SectionHeader> = self
            .sections
            .iter()
            .filter(|s| s.stype == SectionType::Note)
            .collect();
        if !note_sections.is_empty() {
            for section in note_sections {
                let notes = self.read_notes(section.obytes);
                groups.push((section.name.clone(), notes));
            }
            return groups;
        }
        for segment in self.segments.iter() {
            if segment.stype == SegmentType::Note {
                let notes = self.read_notes(segment.obytes);
                groups.push(("PT_NOTE".to_string(), notes));
            }
        }
        groups
    }

    fn read_notes(&self, bytes: Bytes<Offset>) -> Vec<Note> {
        let mut notes = Vec::new();
        let end = bytes.end().0.min(self.reader.len() as u64) as usize;
        let mut s = Stream::new(&self.reader, bytes.start.0 as usize);
        // Damaged files (typically truncated ones) are common enough that a
        // bad note just stops the walk rather than dropping the report.
        while s.offset + 12 <= end {
            match Note::new(&mut s) {
                Ok(note) => notes.push(note),
                Err(err) => {
                    utils::warn(&format!("failed to read note at offset {}: {err}", s.offset));
                    break;
                }
            }
        }
        notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ElfBuilder;

    const SHT_DYNSYM: u32 = 11;
    const SHT_STRTAB: u32 = 3;

    fn file_with_two_dynsyms() -> ElfFile {
        let mut b = ElfBuilder::new(true, true);
        let strings = b.append(b"\0first\0second\0");
        let sym1 = b.append_symbol(1, 0x100, 0, 0x12, 0, 1);
        let sym2 = b.append_symbol(7, 0x200, 0, 0x12, 0, 1);
        // 24 bytes of records starting at the leading null entry is enough
        // for a one-symbol table; entries start at the symbol itself here
        let strtab = b.add_section(".dynstr", SHT_STRTAB, 0, 0, strings, 14, 0, 0, 0);
        b.add_section(".dynsym", SHT_DYNSYM, 2, 0, sym1, 24, strtab, 1, 24);
        b.add_section(".dynsym2", SHT_DYNSYM, 2, 0, sym2, 24, strtab, 1, 24);
        ElfFile::from_reader(PathBuf::from("synthetic"), b.reader()).unwrap()
    }

    #[test]
    fn duplicate_dynsym_uses_the_first_and_warns() {
        let before = utils::warning_count();
        let file = file_with_two_dynsyms();
        assert!(utils::warning_count() > before);

        let table = file.find_dynamic_symbols().unwrap();
        assert_eq!(table.entries.len(), 1);
        assert_eq!(file.symbol_name(&table, &table.entries[0]), "first");
    }

    #[test]
    fn missing_string_table_degrades_to_indices() {
        let mut b = ElfBuilder::new(true, true);
        let sym = b.append_symbol(5, 0x100, 0, 0x12, 0, 1);
        b.add_section(".dynsym", SHT_DYNSYM, 2, 0, sym, 24, 0, 1, 24);
        let file = ElfFile::from_reader(PathBuf::from("synthetic"), b.reader()).unwrap();
        let table = file.find_dynamic_symbols().unwrap();
        assert_eq!(
            file.symbol_name(&table, &table.entries[0]),
            "<string table index 5>"
        );
    }

    #[test]
    fn section_symbols_borrow_their_sections_name() {
        let mut b = ElfBuilder::new(true, true);
        // a section symbol: no name, type SECTION, pointing at section 1
        let sym = b.append_symbol(0, 0, 0, 0x03, 0, 1);
        b.add_section(".dynsym", SHT_DYNSYM, 2, 0, sym, 24, 0, 1, 24);
        let file = ElfFile::from_reader(PathBuf::from("synthetic"), b.reader()).unwrap();
        let table = file.find_dynamic_symbols().unwrap();
        assert_eq!(file.symbol_name(&table, &table.entries[0]), ".dynsym");
    }
}
