use crate::error::DecodeError;
use crate::utils;
use memmap2::Mmap;

/// Reads fixed-size integers out of the mapped file. The byte order and word
/// width are fixed once, from the identification bytes, before anything
/// width-dependent is read; every later extraction goes through here.
#[derive(Debug)]
pub struct Reader {
    pub little_endian: bool,
    pub sixty_four_bit: bool,
    bytes: Mmap,
}

/// How a decoded integer is rendered. The fixed-width modes pad to the
/// file's word width, not the host's, so a 32-bit file prints identically
/// everywhere.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueFormat {
    Hex,
    PrefixedHex,
    FixedHex,
    Dec,
    FixedDec,
}

impl Reader {
    /// These functions all return a Result because input files are sometimes
    /// truncated or corrupt and we want to report as much as we can when that
    /// happens.
    pub fn new(bytes: Mmap) -> Result<Self, DecodeError> {
        // see https://en.wikipedia.org/wiki/Executable_and_Linkable_Format
        utils::require(
            bytes.len() >= 16,
            DecodeError::Io("file is too small to hold an ELF identification".to_string()),
        )?;
        let magic = &bytes[0..4];
        utils::require(
            magic[0] == 0x7f && magic[1] == b'E' && magic[2] == b'L' && magic[3] == b'F',
            DecodeError::BadMagic,
        )?;

        let ei_class = bytes[0x04];
        let ei_data = bytes[0x05];
        let ei_version = bytes[0x06];
        utils::require(
            ei_class == 1 || ei_class == 2,
            DecodeError::Structural(format!("bad ELF class: {ei_class}")),
        )?;
        utils::require(
            ei_data == 1 || ei_data == 2,
            DecodeError::Structural(format!("bad ELF data encoding: {ei_data}")),
        )?;
        if ei_class == 2 && usize::BITS < 64 {
            return Err(DecodeError::UnsupportedWidth);
        }
        if ei_version != 1 {
            utils::warn(&format!("unexpected ELF version: {ei_version}"));
        }

        Ok(Reader {
            bytes,
            sixty_four_bit: ei_class == 2,
            little_endian: ei_data == 1,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn slice(&self, offset: usize, size: usize) -> Result<&[u8], DecodeError> {
        match offset.checked_add(size) {
            Some(end) if end <= self.bytes.len() => Ok(&self.bytes[offset..end]),
            _ => Err(DecodeError::Io(format!(
                "read of {size} bytes at offset {offset:#x} runs past the end of the file"
            ))),
        }
    }

    /// Extract an unsigned integer of 1, 2, 4, or 8 bytes. Any other width is
    /// a programming error, not a data error, so it panics.
    pub fn read_uint(&self, offset: usize, width: usize) -> Result<u64, DecodeError> {
        match width {
            1 => Ok(self.read_byte(offset)? as u64),
            2 => Ok(self.read_half(offset)? as u64),
            4 => Ok(self.read_word(offset)? as u64),
            8 => self.read_xword(offset),
            _ => panic!("unsupported read width: {width}"),
        }
    }

    pub fn read_byte(&self, offset: usize) -> Result<u8, DecodeError> {
        Ok(self.slice(offset, 1)?[0])
    }

    pub fn read_half(&self, offset: usize) -> Result<u16, DecodeError> {
        let slice = self.slice(offset, 2)?;
        if self.little_endian {
            Ok(u16::from_le_bytes(slice.try_into().unwrap()))
        } else {
            Ok(u16::from_be_bytes(slice.try_into().unwrap()))
        }
    }

    pub fn read_word(&self, offset: usize) -> Result<u32, DecodeError> {
        let slice = self.slice(offset, 4)?;
        if self.little_endian {
            Ok(u32::from_le_bytes(slice.try_into().unwrap()))
        } else {
            Ok(u32::from_be_bytes(slice.try_into().unwrap()))
        }
    }

    pub fn read_xword(&self, offset: usize) -> Result<u64, DecodeError> {
        let slice = self.slice(offset, 8)?;
        if self.little_endian {
            Ok(u64::from_le_bytes(slice.try_into().unwrap()))
        } else {
            Ok(u64::from_be_bytes(slice.try_into().unwrap()))
        }
    }

    /// Read a u32 or u64 word depending on the file's class. For sanity the
    /// result is always widened to 64 bits.
    pub fn read_addr(&self, offset: usize) -> Result<u64, DecodeError> {
        if self.sixty_four_bit {
            self.read_xword(offset)
        } else {
            Ok(self.read_word(offset)? as u64)
        }
    }

    pub fn format_value(&self, value: u64, format: ValueFormat) -> String {
        match format {
            ValueFormat::Hex => format!("{value:x}"),
            ValueFormat::PrefixedHex => format!("0x{value:x}"),
            ValueFormat::FixedHex => {
                if self.sixty_four_bit {
                    format!("{value:016x}")
                } else {
                    format!("{value:08x}")
                }
            }
            ValueFormat::Dec => format!("{value}"),
            ValueFormat::FixedDec => {
                if self.sixty_four_bit {
                    format!("{value:20}")
                } else {
                    format!("{value:10}")
                }
            }
        }
    }
}

/// A cursor over the reader for the record-at-a-time decoders.
pub struct Stream<'a> {
    pub reader: &'a Reader,
    pub offset: usize,
}

impl<'a> Stream<'a> {
    pub fn new(reader: &'a Reader, offset: usize) -> Self {
        Stream { reader, offset }
    }

    pub fn read_byte(&mut self) -> Result<u8, DecodeError> {
        let byte = self.reader.read_byte(self.offset)?;
        self.offset += 1;
        Ok(byte)
    }

    pub fn read_half(&mut self) -> Result<u16, DecodeError> {
        let half = self.reader.read_half(self.offset)?;
        self.offset += 2;
        Ok(half)
    }

    pub fn read_word(&mut self) -> Result<u32, DecodeError> {
        let word = self.reader.read_word(self.offset)?;
        self.offset += 4;
        Ok(word)
    }

    pub fn read_xword(&mut self) -> Result<u64, DecodeError> {
        let xword = self.reader.read_xword(self.offset)?;
        self.offset += 8;
        Ok(xword)
    }

    pub fn read_sxword(&mut self) -> Result<i64, DecodeError> {
        Ok(self.read_xword()? as i64)
    }

    /// A word in 32-bit files, an xword in 64-bit files.
    pub fn read_addr(&mut self) -> Result<u64, DecodeError> {
        let addr = self.reader.read_addr(self.offset)?;
        self.offset += if self.reader.sixty_four_bit { 8 } else { 4 };
        Ok(addr)
    }

    pub fn read_offset(&mut self) -> Result<u64, DecodeError> {
        self.read_addr()
    }

    pub fn skip(&mut self, count: usize) {
        self.offset += count;
    }

    /// Read a nul-terminated string. Non-ASCII bytes are kept as-is; section
    /// and symbol names are nominally ASCII but damaged files disagree.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let mut s = String::new();
        loop {
            let byte = self.read_byte()?;
            if byte == 0 {
                break;
            }
            s.push(byte as char);
        }
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ElfBuilder;

    fn reader_with_payload(sixty_four: bool, little: bool, payload: &[u8]) -> (Reader, usize) {
        let mut b = ElfBuilder::new(sixty_four, little);
        let offset = b.append(payload);
        (b.reader(), offset as usize)
    }

    #[test]
    fn uint_little_endian() {
        let (r, at) = reader_with_payload(true, true, &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        assert_eq!(r.read_uint(at, 1).unwrap(), 0x01);
        assert_eq!(r.read_uint(at, 2).unwrap(), 0x0201);
        assert_eq!(r.read_uint(at, 4).unwrap(), 0x04030201);
        assert_eq!(r.read_uint(at, 8).unwrap(), 0x0807060504030201);
    }

    #[test]
    fn uint_big_endian() {
        let (r, at) = reader_with_payload(true, false, &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        assert_eq!(r.read_uint(at, 1).unwrap(), 0x01);
        assert_eq!(r.read_uint(at, 2).unwrap(), 0x0102);
        assert_eq!(r.read_uint(at, 4).unwrap(), 0x01020304);
        assert_eq!(r.read_uint(at, 8).unwrap(), 0x0102030405060708);
    }

    #[test]
    fn uint_formats_as_expected_hex() {
        let (r, at) = reader_with_payload(true, true, &[0x01, 0x02, 0x03, 0x04]);
        let v = r.read_uint(at, 4).unwrap();
        assert_eq!(r.format_value(v, ValueFormat::PrefixedHex), "0x4030201");

        let (r, at) = reader_with_payload(true, false, &[0x01, 0x02, 0x03, 0x04]);
        let v = r.read_uint(at, 4).unwrap();
        assert_eq!(r.format_value(v, ValueFormat::PrefixedHex), "0x1020304");
    }

    #[test]
    fn fixed_width_tracks_file_class() {
        let (r64, _) = reader_with_payload(true, true, &[0]);
        let (r32, _) = reader_with_payload(false, true, &[0]);
        assert_eq!(r64.format_value(0xabcd, ValueFormat::FixedHex), "000000000000abcd");
        assert_eq!(r32.format_value(0xabcd, ValueFormat::FixedHex), "0000abcd");
        assert_eq!(r32.format_value(7, ValueFormat::Dec), "7");
        assert_eq!(r32.format_value(7, ValueFormat::FixedDec).len(), 10);
    }

    #[test]
    fn short_reads_are_io_errors() {
        let (r, _) = reader_with_payload(true, true, &[0xff]);
        let end = r.len();
        assert!(matches!(r.read_word(end - 2), Err(DecodeError::Io(_))));
        assert!(matches!(r.read_byte(usize::MAX), Err(DecodeError::Io(_))));
        // offset + size overflow must not wrap into a successful read
        assert!(matches!(r.slice(usize::MAX, 2), Err(DecodeError::Io(_))));
    }

    #[test]
    fn strings_stop_at_nul() {
        let (r, at) = reader_with_payload(true, true, b"abc\0def\0");
        let mut s = Stream::new(&r, at);
        assert_eq!(s.read_string().unwrap(), "abc");
        assert_eq!(s.read_string().unwrap(), "def");
    }
}
