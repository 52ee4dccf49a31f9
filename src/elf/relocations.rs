// see https://intezer.com/blog/executable-and-linkable-format-101-part-3-relocations/
use super::{Reader, Stream};
use crate::elf::arch::MachineHandler;
use crate::error::DecodeError;

/// One relocation record. The two shapes differ only in whether the addend
/// is stored explicitly; keeping them as separate variants makes the absence
/// of an addend visible instead of leaving a field undefined.
#[derive(Debug)]
pub enum Relocation {
    Rel { offset: u64, info: u64 },
    Rela { offset: u64, info: u64, addend: i64 },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RelocationKind {
    Rel,
    Rela,
}

impl RelocationKind {
    pub fn record_size(&self, sixty_four_bit: bool) -> u64 {
        match (self, sixty_four_bit) {
            (RelocationKind::Rel, true) => 16,
            (RelocationKind::Rela, true) => 24,
            (RelocationKind::Rel, false) => 8,
            (RelocationKind::Rela, false) => 12,
        }
    }
}

impl Relocation {
    pub fn new(reader: &Reader, offset: usize, kind: RelocationKind) -> Result<Self, DecodeError> {
        let mut s = Stream::new(reader, offset);
        let offset = s.read_addr()?;
        let info = if reader.sixty_four_bit {
            s.read_xword()?
        } else {
            s.read_word()? as u64
        };
        match kind {
            RelocationKind::Rel => Ok(Relocation::Rel { offset, info }),
            RelocationKind::Rela => {
                let addend = if reader.sixty_four_bit {
                    s.read_sxword()?
                } else {
                    s.read_word()? as i32 as i64
                };
                Ok(Relocation::Rela {
                    offset,
                    info,
                    addend,
                })
            }
        }
    }

    pub fn offset(&self) -> u64 {
        match self {
            Relocation::Rel { offset, .. } => *offset,
            Relocation::Rela { offset, .. } => *offset,
        }
    }

    pub fn info(&self) -> u64 {
        match self {
            Relocation::Rel { info, .. } => *info,
            Relocation::Rela { info, .. } => *info,
        }
    }

    pub fn addend(&self) -> Option<i64> {
        match self {
            Relocation::Rel { .. } => None,
            Relocation::Rela { addend, .. } => Some(*addend),
        }
    }

    /// The symbol/type split of the info word depends on the record width.
    pub fn symbol_index(&self, sixty_four_bit: bool) -> u32 {
        if sixty_four_bit {
            (self.info() >> 32) as u32
        } else {
            (self.info() >> 8) as u32
        }
    }

    pub fn rtype(&self, sixty_four_bit: bool) -> u64 {
        if sixty_four_bit {
            self.info() & 0xffffffff
        } else {
            self.info() & 0xff
        }
    }

    pub fn type_name(&self, sixty_four_bit: bool, machine: &dyn MachineHandler) -> String {
        let rtype = self.rtype(sixty_four_bit);
        match machine.relocation_name(rtype) {
            Some(name) => name.to_string(),
            None => format!("unrecognised: {rtype:x}"),
        }
    }
}

/// Read a packed relocation array of `size` bytes starting at `offset`.
/// A trailing partial record is reported and dropped.
pub fn read_relocations(
    reader: &Reader,
    offset: u64,
    size: u64,
    kind: RelocationKind,
) -> Result<Vec<Relocation>, DecodeError> {
    let record = kind.record_size(reader.sixty_four_bit);
    if offset.checked_add(size).is_none_or(|end| end > reader.len() as u64) {
        return Err(DecodeError::Io(format!(
            "relocation table ({size} bytes at {offset:#x}) runs past the end of the file"
        )));
    }
    if size % record != 0 {
        crate::utils::warn(&format!(
            "relocation table size {size} is not a multiple of the {record} byte record"
        ));
    }

    let count = size / record;
    let mut result = Vec::with_capacity(count as usize);
    for i in 0..count {
        result.push(Relocation::new(reader, (offset + i * record) as usize, kind)?);
    }
    Ok(result)
}
