//! The ELF file header. The identification bytes (magic, class, data
//! encoding) are validated by `Reader::new` before this runs, so everything
//! here can use the width- and order-aware read functions.
use super::{Reader, Stream};
use crate::elf::arch;
use crate::error::DecodeError;

pub struct ElfHeader {
    /// Relocatable, executable, shared object, or core.
    pub etype: u16,

    /// CPU architecture, e.g. x86-64 or MIPS.
    pub machine: u16,

    /// The OS the binary was compiled for.
    pub abi: u8,

    pub abiversion: u8,

    /// Virtual address at which execution starts. Zero for non-executables.
    pub entry: u64,

    /// Offset in the file to the program header table.
    pub ph_offset: u64,

    /// Offset in the file to the section header table.
    pub section_offset: u64,

    /// Processor-specific flags.
    pub flags: u32,

    pub ph_entry_size: u16,
    pub num_ph_entries: u16,
    pub section_entry_size: u16,
    pub num_section_entries: u16,

    /// Section index of the section name string table.
    pub string_table_index: u16,
}

impl ElfHeader {
    pub fn new(reader: &Reader) -> Result<Self, DecodeError> {
        let abi = reader.read_byte(0x07)?;
        let abiversion = reader.read_byte(0x08)?;

        let mut s = Stream::new(reader, 0x10);
        let etype = s.read_half()?;
        let machine = s.read_half()?;
        let _version = s.read_word()?;
        let entry = s.read_addr()?;
        let ph_offset = s.read_offset()?;
        let section_offset = s.read_offset()?;
        let flags = s.read_word()?;
        let _header_size = s.read_half()?;
        let ph_entry_size = s.read_half()?;
        let num_ph_entries = s.read_half()?;
        let section_entry_size = s.read_half()?;
        let num_section_entries = s.read_half()?;
        let string_table_index = s.read_half()?;

        Ok(ElfHeader {
            etype,
            machine,
            abi,
            abiversion,
            entry,
            ph_offset,
            section_offset,
            flags,
            ph_entry_size,
            num_ph_entries,
            section_entry_size,
            num_section_entries,
            string_table_index,
        })
    }

    pub fn stype(&self) -> String {
        match self.etype {
            0 => "none".to_string(),
            1 => "relocatable object".to_string(),
            2 => "executable".to_string(),
            3 => "shared object".to_string(),
            4 => "core".to_string(),
            0xfe00..=0xfeff => format!("Operating System specific: {:#x}", self.etype),
            0xff00..=0xffff => format!("Processor Specific: {:#x}", self.etype),
            _ => format!("<unknown>: {:#x}", self.etype),
        }
    }

    pub fn machine_name(&self) -> String {
        arch::machine_name(self.machine)
    }

    pub fn abi_name(&self) -> String {
        match self.abi {
            0 => "UNIX - System V".to_string(),
            1 => "HP-UX".to_string(),
            2 => "NetBSD".to_string(),
            3 => "Linux".to_string(),
            6 => "Solaris".to_string(),
            9 => "FreeBSD".to_string(),
            12 => "OpenBSD".to_string(),
            97 => "ARM".to_string(),
            255 => "standalone".to_string(),
            _ => format!("<unknown>: {:#x}", self.abi),
        }
    }
}
