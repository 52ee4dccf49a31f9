//! Note records: small (owner, type, blob) annotations left by compilers,
//! linkers, and the kernel. Found in PT_NOTE segments and SHT_NOTE sections;
//! all three header fields and the two payloads are 4-byte aligned.
use super::Stream;
use crate::elf::{Bytes, Offset};
use crate::error::DecodeError;

pub struct Note {
    /// The note's owner, e.g. "GNU" or "CORE".
    pub name: String,

    pub ntype: u32,

    /// Location of the descriptor bytes.
    pub desc: Bytes<Offset>,
}

impl Note {
    /// Reads one note record and leaves the stream at the next one.
    pub fn new(s: &mut Stream) -> Result<Self, DecodeError> {
        let name_size = s.read_word()? as usize;
        let desc_size = s.read_word()? as usize;
        let ntype = s.read_word()?;

        let mut name = String::new();
        for i in 0..name_size {
            let byte = s.read_byte()?;
            // the name field includes its nul terminator
            if byte != 0 && i < name_size - 1 {
                name.push(byte as char);
            }
        }
        s.skip(align_to_word(name_size) - name_size);

        let desc = Bytes::<Offset>::from_raw(s.offset as u64, desc_size as u64);
        s.skip(align_to_word(desc_size));
        Ok(Note { name, ntype, desc })
    }

    /// Note types are scoped by owner: type 1 is NT_GNU_ABI_TAG for "GNU"
    /// notes but NT_PRSTATUS for core notes.
    pub fn type_name(&self) -> String {
        match (self.name.as_str(), self.ntype) {
            ("GNU", 1) => "NT_GNU_ABI_TAG".to_string(),
            ("GNU", 2) => "NT_GNU_HWCAP".to_string(),
            ("GNU", 3) => "NT_GNU_BUILD_ID".to_string(),
            ("GNU", 4) => "NT_GNU_GOLD_VERSION".to_string(),
            ("GNU", 5) => "NT_GNU_PROPERTY_TYPE_0".to_string(),
            ("CORE" | "LINUX", 1) => "NT_PRSTATUS".to_string(),
            ("CORE" | "LINUX", 2) => "NT_PRFPREG".to_string(),
            ("CORE" | "LINUX", 3) => "NT_PRPSINFO".to_string(),
            ("CORE" | "LINUX", 6) => "NT_AUXV".to_string(),
            ("CORE" | "LINUX", 0x46494c45) => "NT_FILE".to_string(),
            ("CORE" | "LINUX", 0x53494749) => "NT_SIGINFO".to_string(),
            (_, t) => format!("Unknown note type: {t:#x}"),
        }
    }
}

fn align_to_word(n: usize) -> usize {
    (n + 3) & !3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ElfBuilder;

    #[test]
    fn notes_are_word_aligned() {
        let mut b = ElfBuilder::new(true, true);
        let mut bytes = Vec::new();
        // namesz=4 ("GNU\0"), descsz=2, type=3, then padded payloads
        for v in [4u32, 2, 3] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(b"GNU\0");
        bytes.extend_from_slice(&[0xab, 0xcd, 0, 0]);
        // second note right after the padding
        for v in [5u32, 0, 1] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(b"CORE\0\0\0\0");
        let at = b.append(&bytes);
        let r = b.reader();

        let mut s = Stream::new(&r, at as usize);
        let first = Note::new(&mut s).unwrap();
        assert_eq!(first.name, "GNU");
        assert_eq!(first.type_name(), "NT_GNU_BUILD_ID");
        assert_eq!(first.desc.size, 2);

        let second = Note::new(&mut s).unwrap();
        assert_eq!(second.name, "CORE");
        assert_eq!(second.type_name(), "NT_PRSTATUS");
        assert_eq!(second.desc.size, 0);
    }
}
