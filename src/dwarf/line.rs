//! The .debug_line state machine. Each unit carries a little bytecode
//! program; executing it yields a matrix of (address, file, line, column)
//! rows. Registers reset to header-defined defaults at the start of every
//! sequence, which is also what DW_LNE_end_sequence does after emitting its
//! final row.
use crate::dwarf::{decode_i64, decode_u64};
use crate::elf::{ElfFile, Reader, Stream};
use crate::error::DecodeError;
use crate::utils;
use crate::utils::uwriteln;
use std::io::Write;

const LNS_COPY: u8 = 1;
const LNS_ADVANCE_PC: u8 = 2;
const LNS_ADVANCE_LINE: u8 = 3;
const LNS_SET_FILE: u8 = 4;
const LNS_SET_COLUMN: u8 = 5;
const LNS_NEGATE_STMT: u8 = 6;
const LNS_SET_BASIC_BLOCK: u8 = 7;
const LNS_CONST_ADD_PC: u8 = 8;
const LNS_FIXED_ADVANCE_PC: u8 = 9;

const LNE_END_SEQUENCE: u8 = 1;
const LNE_SET_ADDRESS: u8 = 2;
const LNE_DEFINE_FILE: u8 = 3;

pub struct LineHeader {
    pub unit_end: usize,
    pub version: u16,
    pub min_insn_length: u8,
    pub default_is_stmt: bool,

    /// Smallest line advance a special opcode can make. Stored in the file
    /// as 8-bit two's complement; sign extension matters since it is almost
    /// always negative.
    pub line_base: i8,

    pub line_range: u8,

    /// Opcodes at or above this value are "special" and advance both the
    /// address and the line in one byte.
    pub opcode_base: u8,

    pub std_opcode_lengths: Vec<u8>,
    pub include_dirs: Vec<String>,
    pub files: Vec<FileEntry>,
}

pub struct FileEntry {
    pub name: String,
    pub dir: u64,
    pub mtime: u64,
    pub size: u64,
}

#[derive(Clone, Copy)]
pub struct LineRow {
    pub address: u64,
    pub file: u64,
    pub line: i64,
    pub column: u64,
    pub is_stmt: bool,
    pub basic_block: bool,
    pub end_sequence: bool,
}

struct Registers {
    address: u64,
    file: u64,
    line: i64,
    column: u64,
    is_stmt: bool,
    basic_block: bool,
}

impl Registers {
    fn new(default_is_stmt: bool) -> Self {
        Registers {
            address: 0,
            file: 1,
            line: 1,
            column: 0,
            is_stmt: default_is_stmt,
            basic_block: false,
        }
    }

    fn row(&self, end_sequence: bool) -> LineRow {
        LineRow {
            address: self.address,
            file: self.file,
            line: self.line,
            column: self.column,
            is_stmt: self.is_stmt,
            basic_block: self.basic_block,
            end_sequence,
        }
    }
}

/// One executed line-number program: its header, the file table after any
/// DW_LNE_define_file appends, and the emitted rows.
pub struct LineProgram {
    pub header: LineHeader,
    pub rows: Vec<LineRow>,
}

impl LineProgram {
    /// Parse and execute the unit starting at `offset`. A unit with an
    /// unsupported version is reported and returned with no rows so the
    /// caller can continue at `header.unit_end`.
    pub fn parse(reader: &Reader, offset: usize, section_end: usize) -> Result<Self, DecodeError> {
        let mut s = Stream::new(reader, offset);
        let word = s.read_word()?;
        let (sixty_four, length) = if word == 0xffffffff {
            (true, s.read_xword()?)
        } else {
            (false, word as u64)
        };
        let mut unit_end = s.offset.saturating_add(length as usize);
        if unit_end > section_end {
            utils::warn("line number unit length runs past the end of .debug_line");
            unit_end = section_end;
        }

        let version = s.read_half()?;
        let mut header = LineHeader {
            unit_end,
            version,
            min_insn_length: 1,
            default_is_stmt: true,
            line_base: 0,
            line_range: 1,
            opcode_base: 1,
            std_opcode_lengths: Vec::new(),
            include_dirs: Vec::new(),
            files: Vec::new(),
        };
        if version != 2 {
            utils::warn(&format!(
                "only DWARF version 2 line numbers are supported: skipping unit with version {version}"
            ));
            return Ok(LineProgram {
                header,
                rows: Vec::new(),
            });
        }

        let _header_length = if sixty_four {
            s.read_xword()?
        } else {
            s.read_word()? as u64
        };
        header.min_insn_length = s.read_byte()?;
        header.default_is_stmt = s.read_byte()? != 0;
        header.line_base = s.read_byte()? as i8;
        header.line_range = s.read_byte()?;
        header.opcode_base = s.read_byte()?;
        if header.line_range == 0 || header.opcode_base == 0 {
            return Err(DecodeError::Structural(
                "line number header has a zero line_range or opcode_base".to_string(),
            ));
        }
        for _ in 1..header.opcode_base {
            header.std_opcode_lengths.push(s.read_byte()?);
        }

        // Both name tables must be consumed before the opcodes start:
        // DW_LNS_set_file refers to the file table by one-based index.
        loop {
            let dir = s.read_string()?;
            if dir.is_empty() {
                break;
            }
            header.include_dirs.push(dir);
        }
        loop {
            let name = s.read_string()?;
            if name.is_empty() {
                break;
            }
            let dir = decode_u64(&mut s)?;
            let mtime = decode_u64(&mut s)?;
            let size = decode_u64(&mut s)?;
            header.files.push(FileEntry {
                name,
                dir,
                mtime,
                size,
            });
        }

        let mut program = LineProgram {
            header,
            rows: Vec::new(),
        };
        program.run(&mut s)?;
        Ok(program)
    }

    fn run(&mut self, s: &mut Stream) -> Result<(), DecodeError> {
        let unit_end = self.header.unit_end;
        let opcode_base = self.header.opcode_base;
        let line_base = self.header.line_base as i64;
        let line_range = self.header.line_range as u64;
        let min_insn = self.header.min_insn_length as u64;
        let default_is_stmt = self.header.default_is_stmt;
        let mut regs = Registers::new(default_is_stmt);

        while s.offset < unit_end {
            let opcode = s.read_byte()?;
            if opcode >= opcode_base {
                // a special opcode advances address and line together
                let adjusted = (opcode - opcode_base) as u64;
                regs.address = regs.address.wrapping_add((adjusted / line_range) * min_insn);
                regs.line = regs.line.wrapping_add(line_base + (adjusted % line_range) as i64);
                self.rows.push(regs.row(false));
                regs.basic_block = false;
                continue;
            }
            match opcode {
                0 => {
                    // extended opcodes carry their own length
                    let length = decode_u64(s)? as usize;
                    let next = s.offset.saturating_add(length).min(unit_end);
                    if length == 0 {
                        utils::warn("zero length extended line number opcode");
                        continue;
                    }
                    let sub = s.read_byte()?;
                    match sub {
                        LNE_END_SEQUENCE => {
                            self.rows.push(regs.row(true));
                            regs = Registers::new(default_is_stmt);
                        }
                        LNE_SET_ADDRESS => {
                            regs.address = read_sized_uint(s, length - 1)?;
                        }
                        LNE_DEFINE_FILE => {
                            let name = s.read_string()?;
                            let dir = decode_u64(s)?;
                            let mtime = decode_u64(s)?;
                            let size = decode_u64(s)?;
                            self.header.files.push(FileEntry {
                                name,
                                dir,
                                mtime,
                                size,
                            });
                        }
                        _ => {
                            utils::warn(&format!("unknown extended line number opcode: {sub}"));
                        }
                    }
                    // trust the declared length over however much we consumed
                    s.offset = next;
                }
                LNS_COPY => {
                    self.rows.push(regs.row(false));
                    regs.basic_block = false;
                }
                LNS_ADVANCE_PC => {
                    regs.address = regs.address.wrapping_add(decode_u64(s)?.wrapping_mul(min_insn));
                }
                LNS_ADVANCE_LINE => {
                    regs.line = regs.line.wrapping_add(decode_i64(s)?);
                }
                LNS_SET_FILE => {
                    regs.file = decode_u64(s)?;
                }
                LNS_SET_COLUMN => {
                    regs.column = decode_u64(s)?;
                }
                LNS_NEGATE_STMT => {
                    regs.is_stmt = !regs.is_stmt;
                }
                LNS_SET_BASIC_BLOCK => {
                    regs.basic_block = true;
                }
                LNS_CONST_ADD_PC => {
                    let adjusted = (255 - opcode_base) as u64;
                    regs.address = regs.address.wrapping_add((adjusted / line_range) * min_insn);
                }
                LNS_FIXED_ADVANCE_PC => {
                    regs.address = regs.address.wrapping_add(s.read_half()? as u64);
                }
                _ => {
                    // a standard opcode we don't know; its argument count is
                    // in the header so it can at least be skipped
                    utils::warn(&format!("unknown standard line number opcode: {opcode}"));
                    for _ in 0..self.header.std_opcode_lengths[opcode as usize - 1] {
                        decode_u64(s)?;
                    }
                }
            }
        }
        Ok(())
    }
}

// DW_LNE_set_address stores an address as wide as the extended record allows.
fn read_sized_uint(s: &mut Stream, size: usize) -> Result<u64, DecodeError> {
    if size == 0 || size > 8 {
        return Err(DecodeError::Structural(format!("bad address size: {size}")));
    }
    let mut result: u64 = 0;
    if s.reader.little_endian {
        for i in 0..size {
            result |= (s.read_byte()? as u64) << (8 * i);
        }
    } else {
        for _ in 0..size {
            result = (result << 8) | s.read_byte()? as u64;
        }
    }
    Ok(result)
}

pub fn dump_line(out: &mut impl Write, file: &ElfFile) -> Result<(), DecodeError> {
    let section = file
        .find_section_named(".debug_line")
        .ok_or_else(|| DecodeError::Structural("couldn't find section .debug_line".to_string()))?;
    let section_end = (section.obytes.end().0 as usize).min(file.reader.len());

    uwriteln!(out, "The section .debug_line contains:");
    let mut offset = section.obytes.start.0 as usize;
    while offset + 10 <= section_end {
        let program = LineProgram::parse(&file.reader, offset, section_end)?;
        let header = &program.header;

        uwriteln!(out);
        uwriteln!(out, "  DWARF Version:              {}", header.version);
        uwriteln!(out, "  Minimum Instruction Length: {}", header.min_insn_length);
        uwriteln!(out, "  Initial value of 'is_stmt': {}", header.default_is_stmt as u8);
        uwriteln!(out, "  Line Base:                  {}", header.line_base);
        uwriteln!(out, "  Line Range:                 {}", header.line_range);
        uwriteln!(out, "  Opcode Base:                {}", header.opcode_base);
        if !header.include_dirs.is_empty() {
            uwriteln!(out, "  The Directory Table:");
            for (i, dir) in header.include_dirs.iter().enumerate() {
                uwriteln!(out, "    {}  {}", i + 1, dir);
            }
        }
        if !header.files.is_empty() {
            uwriteln!(out, "  The File Name Table:");
            uwriteln!(out, "    Entry  Dir  Time  Size  Name");
            for (i, f) in header.files.iter().enumerate() {
                uwriteln!(out, "    {}  {}  {}  {}  {}", i + 1, f.dir, f.mtime, f.size, f.name);
            }
        }
        if !program.rows.is_empty() {
            uwriteln!(out, "  Address            File  Line  Column  Stmt  BB  End");
            for row in program.rows.iter() {
                uwriteln!(
                    out,
                    "  {:#018x} {:5} {:5} {:7}  {:4}  {:2}  {}",
                    row.address,
                    row.file,
                    row.line,
                    row.column,
                    if row.is_stmt { "yes" } else { "no" },
                    if row.basic_block { "bb" } else { "" },
                    if row.end_sequence { "yes" } else { "" }
                );
            }
        }
        offset = header.unit_end;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{DwarfBuilder, ElfBuilder};

    fn set_address(program: &mut Vec<u8>, addr: u64) {
        program.push(0); // extended
        program.push(9); // length: sub-opcode + 8 address bytes
        program.push(LNE_SET_ADDRESS);
        program.extend_from_slice(&addr.to_le_bytes());
    }

    fn end_sequence(program: &mut Vec<u8>) {
        program.push(0);
        program.push(1);
        program.push(LNE_END_SEQUENCE);
    }

    fn parse(program: &[u8]) -> LineProgram {
        let mut d = DwarfBuilder::new();
        // line_base -5, line_range 14, opcode_base 10: gcc's usual header
        d.line_unit(2, -5, 14, 10, &[0, 1, 1, 1, 1, 0, 0, 0, 1], &["include"], &[("test.c", 1, 0, 0)], program);
        let mut b = ElfBuilder::new(true, true);
        let at = b.append(&d.line_bytes);
        let r = b.reader();
        LineProgram::parse(&r, at as usize, at as usize + d.line_bytes.len()).unwrap()
    }

    #[test]
    fn minimal_program_emits_two_rows() {
        let mut program = Vec::new();
        set_address(&mut program, 0x1000);
        program.push(LNS_COPY);
        program.push(LNS_ADVANCE_LINE);
        program.push(5); // LEB128 +5
        end_sequence(&mut program);

        let p = parse(&program);
        assert_eq!(p.rows.len(), 2);
        assert_eq!(p.rows[0].address, 0x1000);
        assert_eq!(p.rows[0].line, 1);
        assert!(!p.rows[0].end_sequence);
        assert_eq!(p.rows[1].address, 0x1000);
        assert_eq!(p.rows[1].line, 6);
        assert!(p.rows[1].end_sequence);
    }

    #[test]
    fn registers_reset_between_sequences() {
        let mut program = Vec::new();
        set_address(&mut program, 0x1000);
        program.push(LNS_ADVANCE_LINE);
        program.push(9);
        program.push(LNS_NEGATE_STMT);
        program.push(LNS_SET_BASIC_BLOCK);
        program.push(LNS_COPY);
        end_sequence(&mut program);
        // second sequence must start from the defaults again
        set_address(&mut program, 0x2000);
        program.push(LNS_COPY);
        end_sequence(&mut program);

        let p = parse(&program);
        assert_eq!(p.rows.len(), 4);
        assert_eq!(p.rows[0].line, 10);
        assert!(!p.rows[0].is_stmt);
        assert!(p.rows[0].basic_block);
        assert_eq!(p.rows[2].address, 0x2000);
        assert_eq!(p.rows[2].line, 1);
        assert!(p.rows[2].is_stmt);
    }

    #[test]
    fn special_opcodes_advance_address_and_line() {
        let mut program = Vec::new();
        set_address(&mut program, 0x400000);
        // special opcode: adjusted = 34 -> address += 2, line += -5 + 6 = 1
        program.push(10 + 34);
        end_sequence(&mut program);

        let p = parse(&program);
        assert_eq!(p.rows[0].address, 0x400002);
        assert_eq!(p.rows[0].line, 2);
    }

    #[test]
    fn define_file_appends_to_the_table() {
        let mut program = Vec::new();
        let mut ext = Vec::new();
        ext.push(LNE_DEFINE_FILE);
        ext.extend_from_slice(b"gen.c\0");
        ext.extend_from_slice(&[1, 0, 0]); // dir, mtime, size
        program.push(0);
        program.push(ext.len() as u8);
        program.extend_from_slice(&ext);
        end_sequence(&mut program);

        let p = parse(&program);
        assert_eq!(p.header.files.len(), 2);
        assert_eq!(p.header.files[1].name, "gen.c");
        assert_eq!(p.header.files[1].dir, 1);
    }

    #[test]
    fn unsupported_version_yields_no_rows() {
        let mut d = DwarfBuilder::new();
        d.line_unit(3, -5, 14, 10, &[0, 1, 1, 1, 1, 0, 0, 0, 1], &[], &[], &[LNS_COPY]);
        let mut b = ElfBuilder::new(true, true);
        let at = b.append(&d.line_bytes);
        let r = b.reader();
        let before = utils::warning_count();
        let p = LineProgram::parse(&r, at as usize, at as usize + d.line_bytes.len()).unwrap();
        assert!(p.rows.is_empty());
        assert!(utils::warning_count() > before);
        assert_eq!(p.header.unit_end, at as usize + d.line_bytes.len());
    }
}
