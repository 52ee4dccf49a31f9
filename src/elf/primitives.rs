use std::ops::Add;

/// Index into the section table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct SectionIndex(pub u32);

/// Index into a string table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct StringIndex(pub u32);

/// The position of a byte within the ELF file.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct Offset(pub u64);

/// The address a byte would have once the file is loaded. Only bytes inside
/// allocated sections and load segments have one of these.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct VirtualAddr(pub u64);

/// A range of bytes addressed either by file offset or by virtual address.
/// Tables carry both so that containment checks use the right domain: load
/// addressing for allocated sections, file addressing for everything else.
#[derive(Copy, Clone)]
pub struct Bytes<A>
where
    A: Add<u64, Output = A> + Copy + Ord,
{
    pub start: A,
    pub size: u64,
}

impl Bytes<Offset> {
    pub fn from_raw(start: u64, size: u64) -> Self {
        Bytes {
            start: Offset(start),
            size,
        }
    }
}

impl Bytes<VirtualAddr> {
    pub fn from_raw(start: u64, size: u64) -> Self {
        Bytes {
            start: VirtualAddr(start),
            size,
        }
    }
}

impl<A: Add<u64, Output = A> + Copy + Ord> Bytes<A> {
    /// True when the whole of `other` lies within this range.
    pub fn encloses(&self, other: &Bytes<A>) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }

    pub fn end(&self) -> A {
        self.start + self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl Add<u64> for VirtualAddr {
    type Output = VirtualAddr;

    fn add(self, rhs: u64) -> Self::Output {
        VirtualAddr(self.0.wrapping_add(rhs))
    }
}

impl Add<u64> for Offset {
    type Output = Offset;

    fn add(self, rhs: u64) -> Self::Output {
        Offset(self.0.wrapping_add(rhs))
    }
}
