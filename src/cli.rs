//! The command surface: flags selecting which reports run over the input
//! file.
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(about = "Displays information about ELF object files and their DWARF debug data", long_about = None)]
pub struct Cli {
    /// path to an ELF object, executable, shared library, or core file
    pub file: PathBuf,

    /// Show the ELF file header (the default when nothing else is selected)
    #[arg(short = 'H', long)]
    pub file_header: bool,

    /// Show the program headers (segments)
    #[arg(short = 'l', long)]
    pub program_headers: bool,

    /// Show the section headers
    #[arg(short = 'S', long)]
    pub section_headers: bool,

    /// Show the symbol tables
    #[arg(short = 's', long)]
    pub symbols: bool,

    /// Show the relocations
    #[arg(short = 'r', long)]
    pub relocs: bool,

    /// Show the dynamic segment
    #[arg(short = 'd', long)]
    pub dynamic: bool,

    /// Show the GNU symbol version sections
    #[arg(short = 'V', long)]
    pub version_info: bool,

    /// Show the note records
    #[arg(short = 'n', long)]
    pub notes: bool,

    /// Show a histogram of symbol hash bucket lengths
    #[arg(short = 'I', long)]
    pub histogram: bool,

    /// Run every report
    #[arg(short = 'a', long)]
    pub all: bool,

    /// Hex dump the section with this name or index (repeatable)
    #[arg(short = 'x', long, value_name = "NAME|INDEX")]
    pub hex_dump: Vec<String>,

    /// Dump a DWARF debug section: info, abbrev, line, aranges, or pubnames
    /// (repeatable)
    #[arg(short = 'w', long, value_name = "SECTION")]
    pub debug_dump: Vec<String>,

    /// Add column headers to the tables
    #[arg(short = 't', long)]
    pub titles: bool,

    /// Explain columns, fields, etc.
    #[arg(short = 'e', long)]
    pub explain: bool,
}

/// The presentation options every report receives.
pub struct ReportArgs {
    pub titles: bool,
    pub explain: bool,
}

impl Cli {
    pub fn report_args(&self) -> ReportArgs {
        ReportArgs {
            titles: self.titles,
            explain: self.explain,
        }
    }

    /// True when no report was selected at all, in which case the file
    /// header alone is shown.
    pub fn nothing_selected(&self) -> bool {
        !(self.file_header
            || self.program_headers
            || self.section_headers
            || self.symbols
            || self.relocs
            || self.dynamic
            || self.version_info
            || self.notes
            || self.histogram
            || self.all
            || !self.hex_dump.is_empty()
            || !self.debug_dump.is_empty())
    }
}
