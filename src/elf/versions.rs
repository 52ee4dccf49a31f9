//! GNU symbol versioning: .gnu.version (one 16-bit entry per dynamic
//! symbol), .gnu.version_r (versions required from other objects), and
//! .gnu.version_d (versions this object defines). The latter two are chains
//! linked by byte offsets, not indices, so they are walked iteratively with
//! the entry counts from sh_info as a bound.
use super::{Reader, Stream};
use crate::elf::sections::{SectionHeader, SectionType, StringTable};
use crate::elf::symbols::SymbolTableEntry;
use crate::error::DecodeError;
use crate::utils;

/// The top bit of a versym entry hides the symbol from the default lookup
/// scope; the low 15 bits select a definition or need.
pub const VERSYM_HIDDEN: u16 = 0x8000;
pub const VERSYM_VERSION: u16 = 0x7fff;

/// A version this object defines.
pub struct VersionDef {
    pub flags: u16,

    /// The index that versym entries refer to.
    pub index: u16,

    pub hash: u32,

    /// First name is the version itself, the rest are its predecessors.
    pub names: Vec<String>,
}

/// A version required from some other object.
pub struct VersionNeed {
    /// Name of the file the versions are needed from.
    pub file: String,

    pub aux: Vec<VersionNeedAux>,
}

pub struct VersionNeedAux {
    pub hash: u32,
    pub flags: u16,

    /// The index that versym entries refer to (the spec calls it "other").
    pub other: u16,

    pub name: String,
}

/// A resolved version for one symbol.
pub struct VersionString {
    pub name: String,
    pub hidden: bool,
}

pub fn read_versym(reader: &Reader, section: &SectionHeader) -> Result<Vec<u16>, DecodeError> {
    let count = section.obytes.size / 2;
    let mut s = Stream::new(reader, section.obytes.start.0 as usize);
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        entries.push(s.read_half()?);
    }
    Ok(entries)
}

pub fn read_verneed(
    reader: &Reader,
    section: &SectionHeader,
    strings: &StringTable,
) -> Result<Vec<VersionNeed>, DecodeError> {
    let start = section.obytes.start.0 as usize;
    let end = section.obytes.end().0 as usize;
    let mut needs = Vec::new();

    let mut offset = start;
    // sh_info holds the number of verneed records; the next fields are
    // trusted only within that bound so a corrupt chain cannot loop.
    for _ in 0..section.info {
        if offset + 16 > end {
            utils::warn("verneed chain runs past the end of its section");
            break;
        }
        let mut s = Stream::new(reader, offset);
        let version = s.read_half()?;
        if version != 1 {
            utils::warn(&format!("unexpected verneed version: {version}"));
        }
        let count = s.read_half()?;
        let file = s.read_word()?;
        let aux_offset = s.read_word()? as usize;
        let next = s.read_word()? as usize;

        let mut aux = Vec::new();
        let mut at = offset + aux_offset;
        for _ in 0..count {
            if at + 16 > end {
                utils::warn("vernaux chain runs past the end of its section");
                break;
            }
            let mut s = Stream::new(reader, at);
            let hash = s.read_word()?;
            let flags = s.read_half()?;
            let other = s.read_half()?;
            let name = s.read_word()?;
            let aux_next = s.read_word()? as usize;
            aux.push(VersionNeedAux {
                hash,
                flags,
                other,
                name: strings
                    .get(reader, name as usize)
                    .unwrap_or_else(|| format!("<string table index {name}>")),
            });
            if aux_next == 0 {
                break;
            }
            at = at.saturating_add(aux_next);
        }

        needs.push(VersionNeed {
            file: strings
                .get(reader, file as usize)
                .unwrap_or_else(|| format!("<string table index {file}>")),
            aux,
        });
        if next == 0 {
            break;
        }
        offset = offset.saturating_add(next);
    }
    Ok(needs)
}

pub fn read_verdef(
    reader: &Reader,
    section: &SectionHeader,
    strings: &StringTable,
) -> Result<Vec<VersionDef>, DecodeError> {
    let start = section.obytes.start.0 as usize;
    let end = section.obytes.end().0 as usize;
    let mut defs = Vec::new();

    let mut offset = start;
    for _ in 0..section.info {
        if offset + 20 > end {
            utils::warn("verdef chain runs past the end of its section");
            break;
        }
        let mut s = Stream::new(reader, offset);
        let version = s.read_half()?;
        if version != 1 {
            utils::warn(&format!("unexpected verdef version: {version}"));
        }
        let flags = s.read_half()?;
        let index = s.read_half()?;
        let count = s.read_half()?;
        let hash = s.read_word()?;
        let aux_offset = s.read_word()? as usize;
        let next = s.read_word()? as usize;

        let mut names = Vec::new();
        let mut at = offset + aux_offset;
        for _ in 0..count {
            if at + 8 > end {
                utils::warn("verdaux chain runs past the end of its section");
                break;
            }
            let mut s = Stream::new(reader, at);
            let name = s.read_word()?;
            let aux_next = s.read_word()? as usize;
            names.push(
                strings
                    .get(reader, name as usize)
                    .unwrap_or_else(|| format!("<string table index {name}>")),
            );
            if aux_next == 0 {
                break;
            }
            at = at.saturating_add(aux_next);
        }

        defs.push(VersionDef {
            flags,
            index,
            hash,
            names,
        });
        if next == 0 {
            break;
        }
        offset = offset.saturating_add(next);
    }
    Ok(defs)
}

/// The version a symbol's versym entry refers to, or None for local/global
/// base entries.
///
/// The search order matters: an undefined (or not-yet-allocated) symbol takes
/// its version from what this object *needs*, and only a defined symbol falls
/// back to what this object *defines*. Searching the chains in the other
/// order mis-attributes versions whenever a need and a definition share an
/// index.
pub fn resolve_version(
    versym: u16,
    symbol: &SymbolTableEntry,
    sections: &[SectionHeader],
    needs: &[VersionNeed],
    defs: &[VersionDef],
) -> Option<VersionString> {
    let index = versym & VERSYM_VERSION;
    if index == 0 || index == 1 {
        return None;
    }
    let hidden = versym & VERSYM_HIDDEN != 0;

    let nobits = match symbol.index {
        crate::elf::symbols::SymbolIndex::Index(section) => sections
            .get(section.0 as usize)
            .is_some_and(|s| s.stype == SectionType::NoBits),
        _ => false,
    };
    if symbol.undefined() || nobits {
        for need in needs.iter() {
            for aux in need.aux.iter() {
                if aux.other & VERSYM_VERSION == index {
                    return Some(VersionString {
                        name: aux.name.clone(),
                        hidden,
                    });
                }
            }
        }
    }
    if !symbol.undefined() {
        for def in defs.iter() {
            if def.index & VERSYM_VERSION == index {
                return Some(VersionString {
                    name: def.names.first().cloned().unwrap_or_default(),
                    hidden,
                });
            }
        }
    }
    utils::warn(&format!("bad version index: {index}"));
    None
}
