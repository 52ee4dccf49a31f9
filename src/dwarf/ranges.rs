//! The two flat lookup tables: .debug_aranges maps address ranges to
//! compilation units and .debug_pubnames maps global names to DIE offsets.
//! Both are a small fixed header followed by records ending at an all-zero
//! sentinel.
use crate::elf::{ElfFile, Stream};
use crate::error::DecodeError;
use crate::utils;
use crate::utils::uwriteln;
use std::io::Write;

pub fn dump_aranges(out: &mut impl Write, file: &ElfFile) -> Result<(), DecodeError> {
    let section = file
        .find_section_named(".debug_aranges")
        .ok_or_else(|| DecodeError::Structural("couldn't find section .debug_aranges".to_string()))?;
    let section_start = section.obytes.start.0 as usize;
    let section_end = (section.obytes.end().0 as usize).min(file.reader.len());

    uwriteln!(out, "The section .debug_aranges contains:");
    let mut offset = section_start;
    while offset + 12 <= section_end {
        let mut s = Stream::new(&file.reader, offset);
        let length = s.read_word()? as u64;
        let mut unit_end = s.offset.saturating_add(length as usize);
        if unit_end > section_end {
            utils::warn("aranges length runs past the end of .debug_aranges");
            unit_end = section_end;
        }
        let version = s.read_half()?;
        let info_offset = s.read_word()?;
        let addr_size = s.read_byte()?;
        let seg_size = s.read_byte()?;

        uwriteln!(out);
        uwriteln!(out, "  Length:                   {length}");
        uwriteln!(out, "  Version:                  {version}");
        uwriteln!(out, "  Offset into .debug_info:  {info_offset:#x}");
        uwriteln!(out, "  Pointer Size:             {addr_size}");
        uwriteln!(out, "  Segment Size:             {seg_size}");
        if version != 2 {
            utils::warn(&format!(
                "only DWARF version 2 aranges are supported: skipping set with version {version}"
            ));
            offset = unit_end;
            continue;
        }
        if addr_size != 4 && addr_size != 8 {
            utils::warn(&format!("bad aranges address size: {addr_size}"));
            offset = unit_end;
            continue;
        }

        // The first tuple is aligned to twice the pointer size from the start
        // of the section.
        let tuple = 2 * addr_size as usize;
        let misaligned = (s.offset - section_start) % tuple;
        if misaligned != 0 {
            s.skip(tuple - misaligned);
        }

        uwriteln!(out, "    Address   Length");
        while s.offset + tuple <= unit_end {
            let address = read_address(&mut s, addr_size)?;
            let length = read_address(&mut s, addr_size)?;
            if address == 0 && length == 0 {
                break;
            }
            uwriteln!(out, "    {address:#x}  {length}");
        }
        offset = unit_end;
    }
    Ok(())
}

pub fn dump_pubnames(out: &mut impl Write, file: &ElfFile) -> Result<(), DecodeError> {
    let section = file
        .find_section_named(".debug_pubnames")
        .ok_or_else(|| DecodeError::Structural("couldn't find section .debug_pubnames".to_string()))?;
    let section_end = (section.obytes.end().0 as usize).min(file.reader.len());

    uwriteln!(out, "The section .debug_pubnames contains:");
    let mut offset = section.obytes.start.0 as usize;
    while offset + 14 <= section_end {
        let mut s = Stream::new(&file.reader, offset);
        let length = s.read_word()? as u64;
        let mut unit_end = s.offset.saturating_add(length as usize);
        if unit_end > section_end {
            utils::warn("pubnames length runs past the end of .debug_pubnames");
            unit_end = section_end;
        }
        let version = s.read_half()?;
        let info_offset = s.read_word()?;
        let info_length = s.read_word()?;

        uwriteln!(out);
        uwriteln!(out, "  Length:                              {length}");
        uwriteln!(out, "  Version:                             {version}");
        uwriteln!(out, "  Offset into .debug_info:             {info_offset:#x}");
        uwriteln!(out, "  Size of area in .debug_info section: {info_length}");
        if version != 2 {
            utils::warn(&format!(
                "only DWARF version 2 pubnames are supported: skipping set with version {version}"
            ));
            offset = unit_end;
            continue;
        }

        uwriteln!(out, "    Offset    Name");
        while s.offset + 4 <= unit_end {
            let die_offset = s.read_word()?;
            if die_offset == 0 {
                break;
            }
            let name = s.read_string()?;
            uwriteln!(out, "    {die_offset:<8x}  {name}");
        }
        offset = unit_end;
    }
    Ok(())
}

fn read_address(s: &mut Stream, addr_size: u8) -> Result<u64, DecodeError> {
    let value = s.reader.read_uint(s.offset, addr_size as usize)?;
    s.skip(addr_size as usize);
    Ok(value)
}
