//! Program headers describe segments, the load-time view of the file. Also
//! see sections.
use super::{Reader, Stream};
use crate::elf::arch::MachineHandler;
use crate::elf::sections::{SectionHeader, ALLOC_FLAG};
use crate::elf::{Bytes, ElfHeader, Offset, VirtualAddr};
use crate::error::DecodeError;

const EXECUTE_FLAG: u32 = 0x1;
const WRITE_FLAG: u32 = 0x2;
const READ_FLAG: u32 = 0x4;

// Addresses in the dynamic segment are link-time VMAs; rounding both sides to
// this granularity before subtracting matches the reference readelf tools.
const PAGE_MASK: u64 = !0xffff;

/// Describes one segment.
pub struct ProgramHeader {
    // Elf64_Phdr or Elf32_Phdr, see https://llvm.org/doxygen/BinaryFormat_2ELF_8h_source.html
    pub stype: SegmentType,

    /// Addressing for the segment's bytes using offsets from the start of the file.
    pub obytes: Bytes<Offset>,

    /// Addressing for the segment's bytes as loaded into memory. The size here
    /// is mem_size which can exceed the size on file (e.g. for bss).
    pub vbytes: Bytes<VirtualAddr>,

    /// Physical address of the first byte in the segment. Usually zero.
    pub paddr: u64,

    /// Read/Write/Execute flags.
    pub flags: u32,

    pub align: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SegmentType {
    /// Not to be used.
    Null,

    /// A loadable segment, described by p_filesz and p_memsz.
    Load,

    /// Dynamic linking information.
    Dynamic,

    /// Location of a nul-terminated path to invoke as an interpreter.
    Interpreter,

    /// The location and size of auxiliary information.
    Note,

    /// Reserved but has unspecified semantics.
    Shlib,

    /// The location and size of the program header table itself.
    Phdr,

    /// The Thread-Local Storage template.
    Tls,

    /// Reserved for OS-specific semantics, e.g. GNU_STACK.
    OsSpecific(u32),

    /// Reserved for processor-specific semantics; named via the machine handler.
    ProcSpecific(u32),

    Unknown(u32),
}

impl SegmentType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => SegmentType::Null,
            1 => SegmentType::Load,
            2 => SegmentType::Dynamic,
            3 => SegmentType::Interpreter,
            4 => SegmentType::Note,
            5 => SegmentType::Shlib,
            6 => SegmentType::Phdr,
            7 => SegmentType::Tls,
            0x60000000..0x70000000 => SegmentType::OsSpecific(value),
            0x70000000..0x80000000 => SegmentType::ProcSpecific(value),
            _ => SegmentType::Unknown(value),
        }
    }

    pub fn name(&self, machine: &dyn MachineHandler) -> String {
        match self {
            SegmentType::Null => "NULL".to_string(),
            SegmentType::Load => "LOAD".to_string(),
            SegmentType::Dynamic => "DYNAMIC".to_string(),
            SegmentType::Interpreter => "INTERP".to_string(),
            SegmentType::Note => "NOTE".to_string(),
            SegmentType::Shlib => "SHLIB".to_string(),
            SegmentType::Phdr => "PHDR".to_string(),
            SegmentType::Tls => "TLS".to_string(),
            SegmentType::OsSpecific(v) => match v {
                0x6474e550 => "GNU_EH_FRAME".to_string(),
                0x6474e551 => "GNU_STACK".to_string(),
                0x6474e552 => "GNU_RELRO".to_string(),
                0x6474e553 => "GNU_PROPERTY".to_string(),
                _ => format!("Operating System specific: {v:#x}"),
            },
            SegmentType::ProcSpecific(v) => match machine.segment_type_name(*v) {
                Some(name) => name.to_string(),
                None => format!("Processor Specific: {v:#x}"),
            },
            SegmentType::Unknown(v) => format!("<unknown>: {v:#x}"),
        }
    }
}

impl ProgramHeader {
    pub fn new(reader: &Reader, offset: usize) -> Result<Self, DecodeError> {
        // Field sizes and order differ between 32-bit and 64-bit ELF files,
        // see https://llvm.org/doxygen/BinaryFormat_2ELF_8h_source.html.
        let mut s = Stream::new(reader, offset);
        if reader.sixty_four_bit {
            let p_type = SegmentType::from_u32(s.read_word()?);
            let p_flags = s.read_word()?;
            let p_offset = s.read_offset()?;
            let p_vaddr = s.read_addr()?;
            let p_paddr = s.read_addr()?;
            let p_filesz = s.read_xword()?;
            let p_memsz = s.read_xword()?;
            let p_align = s.read_xword()?;
            Ok(ProgramHeader {
                stype: p_type,
                obytes: Bytes::<Offset>::from_raw(p_offset, p_filesz),
                vbytes: Bytes::<VirtualAddr>::from_raw(p_vaddr, p_memsz),
                paddr: p_paddr,
                flags: p_flags,
                align: p_align,
            })
        } else {
            let p_type = SegmentType::from_u32(s.read_word()?);
            let p_offset = s.read_offset()?;
            let p_vaddr = s.read_addr()?;
            let p_paddr = s.read_addr()?;
            let p_filesz = s.read_word()? as u64;
            let p_memsz = s.read_word()? as u64;
            let p_flags = s.read_word()?;
            let p_align = s.read_word()? as u64;
            Ok(ProgramHeader {
                stype: p_type,
                obytes: Bytes::<Offset>::from_raw(p_offset, p_filesz),
                vbytes: Bytes::<VirtualAddr>::from_raw(p_vaddr, p_memsz),
                paddr: p_paddr,
                flags: p_flags,
                align: p_align,
            })
        }
    }

    pub fn flags(flags: u32) -> String {
        let mut result = String::new();
        result.push(if flags & READ_FLAG != 0 { 'r' } else { '-' });
        result.push(if flags & WRITE_FLAG != 0 { 'w' } else { '-' });
        result.push(if flags & EXECUTE_FLAG != 0 { 'x' } else { '-' });
        result
    }
}

/// Read the whole program header table. A zero entry count is fine (core
/// files stripped of headers exist); a table that runs past the end of the
/// file is not.
pub fn read_segments(reader: &Reader, header: &ElfHeader) -> Result<Vec<ProgramHeader>, DecodeError> {
    let count = header.num_ph_entries as usize;
    if count == 0 {
        return Ok(Vec::new());
    }

    let entry_size = header.ph_entry_size as usize;
    let table_size = count
        .checked_mul(entry_size)
        .ok_or_else(|| DecodeError::Resource(format!("program header table is too large: {count} entries")))?;
    let start = header.ph_offset as usize;
    if start.checked_add(table_size).is_none_or(|end| end > reader.len()) {
        return Err(DecodeError::Io(format!(
            "program header table ({count} entries at {start:#x}) runs past the end of the file"
        )));
    }

    let mut segments = Vec::with_capacity(count);
    for i in 0..count {
        segments.push(ProgramHeader::new(reader, start + i * entry_size)?);
    }
    Ok(segments)
}

/// The constant difference between link-time virtual addresses and file
/// offsets, taken from the first loadable segment. Zero when nothing is
/// loadable.
pub fn load_bias(segments: &[ProgramHeader]) -> u64 {
    for segment in segments.iter() {
        if segment.stype == SegmentType::Load {
            let vaddr = segment.vbytes.start.0 & PAGE_MASK;
            let offset = segment.obytes.start.0 & PAGE_MASK;
            return vaddr.wrapping_sub(offset);
        }
    }
    0
}

/// The sections that live inside a segment. Allocated sections are matched in
/// the virtual address domain, everything else in the file offset domain; the
/// two must not be conflated because non-allocated sections have meaningless
/// addresses.
pub fn sections_in_segment<'a>(
    segment: &ProgramHeader,
    sections: &'a [SectionHeader],
) -> Vec<&'a SectionHeader> {
    sections
        .iter()
        .skip(1) // index 0 is the reserved null section
        .filter(|section| {
            if section.flags & ALLOC_FLAG != 0 {
                segment.vbytes.encloses(&section.vbytes)
            } else {
                segment.obytes.encloses(&section.obytes)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ElfBuilder;

    const PT_LOAD: u32 = 1;
    const PT_NOTE: u32 = 4;

    #[test]
    fn no_load_segment_means_zero_bias() {
        let mut b = ElfBuilder::new(true, true);
        b.add_segment(PT_NOTE, 0x200, 0, 0x10, 0x10, 4, 4);
        let r = b.reader();
        let h = crate::elf::ElfHeader::new(&r).unwrap();
        let segments = read_segments(&r, &h).unwrap();
        assert_eq!(load_bias(&segments), 0);
    }

    #[test]
    fn low_load_segment_means_zero_bias() {
        let mut b = ElfBuilder::new(true, true);
        b.add_segment(PT_LOAD, 0x0, 0x1000, 0x10, 0x10, 5, 0x1000);
        let r = b.reader();
        let h = crate::elf::ElfHeader::new(&r).unwrap();
        let segments = read_segments(&r, &h).unwrap();
        assert_eq!(load_bias(&segments), 0);
    }

    #[test]
    fn bias_is_aligned_vaddr_minus_aligned_offset() {
        let mut b = ElfBuilder::new(true, true);
        b.add_segment(PT_LOAD, 0x1000, 0x401000, 0x10, 0x10, 5, 0x1000);
        let r = b.reader();
        let h = crate::elf::ElfHeader::new(&r).unwrap();
        let segments = read_segments(&r, &h).unwrap();
        assert_eq!(load_bias(&segments), 0x400000);
    }

    #[test]
    fn truncated_table_is_an_io_error() {
        let mut b = ElfBuilder::new(true, true);
        b.add_segment(PT_LOAD, 0x0, 0x1000, 0x10, 0x10, 5, 0x1000);
        b.patch_ph_count(300);
        let r = b.reader();
        let h = crate::elf::ElfHeader::new(&r).unwrap();
        assert!(matches!(read_segments(&r, &h), Err(DecodeError::Io(_))));
    }

    #[test]
    fn both_record_layouts_decode() {
        for &sixty_four in &[true, false] {
            let mut b = ElfBuilder::new(sixty_four, true);
            b.add_segment(PT_LOAD, 0x40, 0x10040, 0x20, 0x30, 6, 8);
            let r = b.reader();
            let h = crate::elf::ElfHeader::new(&r).unwrap();
            let segments = read_segments(&r, &h).unwrap();
            assert_eq!(segments.len(), 1);
            let s = &segments[0];
            assert_eq!(s.stype, SegmentType::Load);
            assert_eq!(s.obytes.start.0, 0x40);
            assert_eq!(s.obytes.size, 0x20);
            assert_eq!(s.vbytes.start.0, 0x10040);
            assert_eq!(s.vbytes.size, 0x30);
            assert_eq!(ProgramHeader::flags(s.flags), "rw-");
        }
    }
}
