pub mod dwarf;
pub mod dynamic;
pub mod elf;
pub mod misc;
pub mod tables;

pub use dwarf::*;
pub use dynamic::*;
pub use elf::*;
pub use misc::*;
