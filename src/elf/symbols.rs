use super::{Reader, Stream};
use crate::elf::sections::{SectionHeader, StringTable};
use crate::elf::{SectionIndex, StringIndex};
use crate::error::DecodeError;
use crate::utils;

/// One symbol table plus the string table its names resolve against.
pub struct SymbolTable {
    pub section_name: String,

    /// True for .dynsym, false for .symtab.
    pub dynamic: bool,

    pub entries: Vec<SymbolTableEntry>,

    pub strings: StringTable,
}

pub struct SymbolTableEntry {
    // see https://refspecs.linuxbase.org/elf/gabi4+/ch4.symtab.html
    /// Index into the symbol string table.
    pub name: StringIndex,

    /// Can be an address, absolute value, etc.
    pub value: u64,

    /// Size of the symbol. Zero if the symbol has no or unknown size.
    pub size: u64,

    pub stype: SymbolType,

    pub binding: SymbolBinding,

    pub visibility: SymbolVisibility,

    pub index: SymbolIndex,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SymbolIndex {
    /// Symbol has an absolute value that will not change with relocation.
    Abs,

    /// A common block that has not yet been allocated. Value has alignment.
    Common,

    /// Symbol value refers to another section at this index.
    Index(SectionIndex),

    /// Value is undefined. The linker will fix these up.
    Undef,

    /// Used when Index overflows. The related section is SHT_SYMTAB_SHNDX.
    XIndex,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SymbolVisibility {
    /// Visibility is per binding.
    Default,

    /// Visible only within its object file. CPU may special case this.
    Internal,

    /// Visible only within its object file.
    Hidden,

    /// Visible to other object files but cannot be preempted.
    Protected,
}

/// Linkage visibility and behavior.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SymbolBinding {
    /// Not visible outside the object file containing its definition. These
    /// appear before global and weak symbols in the table.
    Local,

    /// Visible to all object files.
    Global,

    /// Like Global but with lower precedence: can be preempted by a Global.
    Weak,

    /// For use by OS or CPU.
    Reserved,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SymbolType {
    None,

    /// A data object, variable, array, etc.
    Object,

    /// Function or other executable code.
    Func,

    /// Another section. Used for relocation.
    Section,

    /// Source file associated with the symbol table.
    File,

    /// Uninitialized common blocks. Used by the linker.
    Common,

    /// Thread Local Storage data. Value is an offset to the data.
    Tls,

    /// For use by OS or CPU.
    Reserved,
}

impl SymbolTableEntry {
    pub fn new(reader: &Reader, offset: usize) -> Result<Self, DecodeError> {
        // Field order differs between the 32- and 64-bit records: the 64-bit
        // layout moves info/other/shndx ahead of the wide value and size.
        let mut s = Stream::new(reader, offset);
        if reader.sixty_four_bit {
            let name = s.read_word()?; // 4
            let info = s.read_byte()?; // 1
            let other = s.read_byte()?; // 1
            let index = s.read_half()?; // 2
            let value = s.read_addr()?; // 8
            let size = s.read_xword()?; // 8
            Ok(SymbolTableEntry {
                name: StringIndex(name),
                value,
                size,
                stype: SymbolType::from_u8(info),
                binding: SymbolBinding::from_u8(info),
                visibility: SymbolVisibility::from_u8(other),
                index: SymbolIndex::from_u16(index),
            })
        } else {
            let name = s.read_word()?;
            let value = s.read_addr()?;
            let size = s.read_word()? as u64;
            let info = s.read_byte()?;
            let other = s.read_byte()?;
            let index = s.read_half()?;
            Ok(SymbolTableEntry {
                name: StringIndex(name),
                value,
                size,
                stype: SymbolType::from_u8(info),
                binding: SymbolBinding::from_u8(info),
                visibility: SymbolVisibility::from_u8(other),
                index: SymbolIndex::from_u16(index),
            })
        }
    }

    pub fn record_size(sixty_four_bit: bool) -> u64 {
        if sixty_four_bit { 24 } else { 16 }
    }

    pub fn undefined(&self) -> bool {
        self.index == SymbolIndex::Undef
    }
}

/// Read a packed array of symbol records. Used both for symbol table sections
/// and for symbol tables located through the dynamic segment.
pub fn read_symbols(
    reader: &Reader,
    offset: u64,
    count: u64,
    entry_size: u64,
) -> Result<Vec<SymbolTableEntry>, DecodeError> {
    let entry_size = if entry_size == 0 {
        SymbolTableEntry::record_size(reader.sixty_four_bit)
    } else {
        entry_size
    };
    let table_size = count
        .checked_mul(entry_size)
        .ok_or_else(|| DecodeError::Resource(format!("symbol table is too large: {count} entries")))?;
    if offset.checked_add(table_size).is_none_or(|end| end > reader.len() as u64) {
        return Err(DecodeError::Io(format!(
            "symbol table ({count} entries at {offset:#x}) runs past the end of the file"
        )));
    }

    let mut entries = Vec::with_capacity(count as usize);
    for i in 0..count {
        entries.push(SymbolTableEntry::new(reader, (offset + i * entry_size) as usize)?);
    }
    Ok(entries)
}

impl SymbolIndex {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => SymbolIndex::Undef,
            0xfff1 => SymbolIndex::Abs,
            0xfff2 => SymbolIndex::Common,
            0xffff => SymbolIndex::XIndex,
            _ => SymbolIndex::Index(SectionIndex(value as u32)),
        }
    }

    pub fn text(&self) -> String {
        match self {
            SymbolIndex::Abs => "ABS".to_string(),
            SymbolIndex::Common => "COM".to_string(),
            SymbolIndex::Index(SectionIndex(i)) => format!("{i}"),
            SymbolIndex::Undef => "UND".to_string(),
            SymbolIndex::XIndex => "XINDEX".to_string(),
        }
    }
}

impl SymbolVisibility {
    pub fn from_u8(value: u8) -> Self {
        match value & 0x3 {
            0 => SymbolVisibility::Default,
            1 => SymbolVisibility::Internal,
            2 => SymbolVisibility::Hidden,
            _ => SymbolVisibility::Protected,
        }
    }
}

impl SymbolBinding {
    pub fn from_u8(value: u8) -> Self {
        match value >> 4 {
            0 => SymbolBinding::Local,
            1 => SymbolBinding::Global,
            2 => SymbolBinding::Weak,
            10 | 12 | 13 | 15 => SymbolBinding::Reserved,
            _ => {
                utils::warn(&format!("unknown symbol binding: {}", value >> 4));
                SymbolBinding::Reserved
            }
        }
    }
}

impl SymbolType {
    pub fn from_u8(value: u8) -> Self {
        match value & 0xf {
            0 => SymbolType::None,
            1 => SymbolType::Object,
            2 => SymbolType::Func,
            3 => SymbolType::Section,
            4 => SymbolType::File,
            5 => SymbolType::Common,
            6 => SymbolType::Tls,
            10 | 12 | 13 | 15 => SymbolType::Reserved,
            _ => {
                utils::warn(&format!("unknown symbol type: {}", value & 0xf));
                SymbolType::Reserved
            }
        }
    }
}

/// The SysV symbol hash table: an array of bucket heads followed by an array
/// of chain links, both indexing the dynamic symbol table.
pub struct HashTable {
    pub buckets: Vec<u32>,
    pub chains: Vec<u32>,
}

impl HashTable {
    pub fn new(reader: &Reader, section: &SectionHeader) -> Result<Self, DecodeError> {
        let mut s = Stream::new(reader, section.obytes.start.0 as usize);
        let nbucket = s.read_word()? as usize;
        let nchain = s.read_word()? as usize;

        let need = 8u64 + 4 * (nbucket as u64 + nchain as u64);
        if need > section.obytes.size {
            return Err(DecodeError::Structural(format!(
                "hash table claims {nbucket} buckets and {nchain} chains but the section holds {} bytes",
                section.obytes.size
            )));
        }

        let mut buckets = Vec::with_capacity(nbucket);
        for _ in 0..nbucket {
            buckets.push(s.read_word()?);
        }
        let mut chains = Vec::with_capacity(nchain);
        for _ in 0..nchain {
            chains.push(s.read_word()?);
        }
        Ok(HashTable { buckets, chains })
    }

    /// Chain length for each bucket. The walk is bounded by the chain count
    /// so a corrupt table with a cycle terminates.
    pub fn bucket_lengths(&self) -> Vec<usize> {
        let mut lengths = Vec::with_capacity(self.buckets.len());
        for &head in self.buckets.iter() {
            let mut length = 0;
            let mut next = head as usize;
            let mut steps = 0;
            while next != 0 && next < self.chains.len() {
                length += 1;
                steps += 1;
                if steps > self.chains.len() {
                    utils::warn("cycle in symbol hash chain");
                    break;
                }
                next = self.chains[next] as usize;
            }
            lengths.push(length);
        }
        lengths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ElfBuilder;

    #[test]
    fn both_record_layouts_normalize() {
        for &sixty_four in &[true, false] {
            let mut b = ElfBuilder::new(sixty_four, true);
            // name=5, value=0x1234, size=0x10, info=global|func, other=hidden, shndx=2
            let at = b.append_symbol(5, 0x1234, 0x10, 0x12, 2, 2);
            let r = b.reader();
            let e = SymbolTableEntry::new(&r, at as usize).unwrap();
            assert_eq!(e.name, StringIndex(5));
            assert_eq!(e.value, 0x1234);
            assert_eq!(e.size, 0x10);
            assert_eq!(e.stype, SymbolType::Func);
            assert_eq!(e.binding, SymbolBinding::Global);
            assert_eq!(e.visibility, SymbolVisibility::Hidden);
            assert_eq!(e.index, SymbolIndex::Index(SectionIndex(2)));
        }
    }

    #[test]
    fn truncated_symbol_table_is_an_io_error() {
        let b = ElfBuilder::new(true, true);
        let r = b.reader();
        let len = r.len() as u64;
        assert!(matches!(
            read_symbols(&r, len - 8, 10, 24),
            Err(DecodeError::Io(_))
        ));
    }

    #[test]
    fn hash_chains_are_bounded() {
        // bucket 0 -> 1 -> 2 -> 0 (end), bucket 1 -> cycle between 3 and 4
        let t = HashTable {
            buckets: vec![1, 3],
            chains: vec![0, 2, 0, 4, 3],
        };
        let lengths = t.bucket_lengths();
        assert_eq!(lengths[0], 2);
        assert!(lengths[1] <= t.chains.len() + 1);
    }
}
