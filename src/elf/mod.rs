//! Decoding of the ELF container itself: the file header, the program and
//! section header tables, and the dynamic-linking metadata (dynamic entries,
//! symbols, versions, relocations, notes).
//! Quick ELF reference: https://gist.github.com/x0nu11byt3/bcb35c3de461e5fb66173071a2379779
//!
//! ELF files start with an ELF header which includes:
//! * A magic number to identify the file as an ELF file.
//! * The word width and byte order every later record is read with.
//! * The offset to and number of program headers.
//! * The offset to and number of section headers.
//!
//! Program headers identify segments, the OS loader's view of the file.
//! Section headers identify sections, the linker's view. Either table can be
//! missing: core files usually have no sections and fully-stripped shared
//! objects are still loadable, which is why the dynamic decoders can work
//! from the segments alone.
pub mod arch;
pub mod dynamic;
pub mod elf_file;
pub mod header;
pub mod io;
pub mod notes;
pub mod primitives;
pub mod relocations;
pub mod sections;
pub mod segments;
pub mod symbols;
pub mod versions;

pub use elf_file::*;
pub use header::*;
pub use io::*;
pub use primitives::*;
