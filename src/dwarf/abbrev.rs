use crate::dwarf::{AttributeName, FormEncoding, Tag, decode_u64};
use crate::elf::{Reader, Stream};
use crate::error::DecodeError;

/// One abbreviation: how DIEs that cite its code are encoded in .debug_info.
pub struct Abbreviation {
    /// The code DIEs cite. Codes are usually dense from 1 but nothing
    /// requires that, so lookups go by code, not position.
    pub code: u64,

    /// DW_TAG_compile_unit, DW_TAG_typedef, DW_TAG_base_type, etc.
    pub tag: Tag,

    /// If true then subsequent entries are children (until a null entry).
    /// Otherwise they are siblings.
    pub has_children: bool,

    /// The attributes of a .debug_info entry along with how each value is
    /// encoded.
    pub attrs: Vec<AttributeEncoding>,
}

pub struct AttributeEncoding {
    pub name: AttributeName,
    pub encoding: FormEncoding,
}

/// The abbreviations one compilation unit uses. Each unit gets its own table
/// built from its own abbreviation offset and dropped when the unit is done:
/// two units may use different encodings at the same code, even when the raw
/// bytes happen to match.
pub struct AbbrevTable {
    pub entries: Vec<Abbreviation>,
}

impl Abbreviation {
    /// Returns an abbreviation or None at the zero code that ends the
    /// table.
    pub fn new(stream: &mut Stream) -> Result<Option<Self>, DecodeError> {
        let code = decode_u64(stream)?;
        if code == 0 {
            return Ok(None);
        }

        let tag = Tag::from_u64(decode_u64(stream)?);
        let has_children = stream.read_byte()? != 0;

        let mut attrs = Vec::new();
        loop {
            let name = decode_u64(stream)?;
            let encoding = decode_u64(stream)?;
            if name == 0 && encoding == 0 {
                break;
            }

            let name = AttributeName::from_u64(name);
            let encoding = FormEncoding::from_u64(encoding)?;
            attrs.push(AttributeEncoding { name, encoding })
        }
        Ok(Some(Abbreviation {
            code,
            tag,
            has_children,
            attrs,
        }))
    }
}

impl AbbrevTable {
    /// Read the table starting at `offset` into .debug_abbrev, stopping at
    /// the terminating zero code or the end of the section.
    pub fn new(reader: &Reader, offset: usize, end: usize) -> Result<Self, DecodeError> {
        let mut stream = Stream::new(reader, offset);
        let mut entries = Vec::new();
        while stream.offset < end {
            match Abbreviation::new(&mut stream)? {
                Some(abbreviation) => entries.push(abbreviation),
                None => break,
            }
        }
        Ok(AbbrevTable { entries })
    }

    // Tables are small so a linear scan beats building a map.
    pub fn find(&self, code: u64) -> Option<&Abbreviation> {
        self.entries.iter().find(|a| a.code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{DwarfBuilder, ElfBuilder};

    #[test]
    fn table_parses_codes_tags_and_attrs() {
        let mut d = DwarfBuilder::new();
        d.abbrev(1, 0x11, true, &[(0x03, 0x08), (0x10, 0x06)]); // compile_unit: name, stmt_list
        d.abbrev(3, 0x24, false, &[(0x0b, 0x0b)]); // base_type: byte_size, codes skip 2
        d.end_abbrevs();

        let mut b = ElfBuilder::new(true, true);
        let at = b.append(&d.abbrev_bytes);
        let r = b.reader();
        let table = AbbrevTable::new(&r, at as usize, at as usize + d.abbrev_bytes.len()).unwrap();

        assert_eq!(table.entries.len(), 2);
        let cu = table.find(1).unwrap();
        assert_eq!(cu.tag, Tag::DW_TAG_compile_unit);
        assert!(cu.has_children);
        assert_eq!(cu.attrs.len(), 2);
        assert_eq!(cu.attrs[0].name, AttributeName::DW_AT_name);
        assert_eq!(cu.attrs[0].encoding, FormEncoding::DW_FORM_string);

        // lookup is by code: code 2 was never defined
        assert!(table.find(2).is_none());
        let base = table.find(3).unwrap();
        assert_eq!(base.tag, Tag::DW_TAG_base_type);
        assert!(!base.has_children);
    }
}
