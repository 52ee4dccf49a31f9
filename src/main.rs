mod cli;
mod commands;
mod dwarf;
mod elf;
mod error;
#[cfg(test)]
mod fixtures;
mod utils;

use clap::Parser;
use cli::Cli;
use elf::ElfFile;
use std::io::Write;
use std::process;
use utils::{Styling, uwriteln, warn};

fn load_file(cli: &Cli) -> ElfFile {
    match ElfFile::new(cli.file.clone()) {
        Ok(file) => file,
        Err(err) => {
            warn(&format!("couldn't load {}: {err}", cli.file.display()));
            process::exit(1);
        }
    }
}

// One failed report must not take the rest of the run with it: the point of
// the tool is inspecting files that are often damaged.
fn report<W: Write>(
    out: &mut W,
    title: &str,
    wanted: bool,
    f: impl FnOnce(&mut W) -> Result<(), error::DecodeError>,
) {
    if !wanted {
        return;
    }
    uwriteln!(out, "{}", title.report_title());
    if let Err(err) = f(out) {
        warn(&format!("{title}: {err}"));
    }
    uwriteln!(out);
}

fn main() {
    let cli = Cli::parse();
    let file = load_file(&cli);
    let args = cli.report_args();
    let all = cli.all;
    let header_only = cli.nothing_selected();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    uwriteln!(out, "File: {}", file.path.display());
    uwriteln!(out);

    report(&mut out, "ELF file header", cli.file_header || all || header_only, |out| {
        commands::file_header(out, &file, &args)
    });
    report(&mut out, "Program headers", cli.program_headers || all, |out| {
        commands::segments(out, &file, &args)
    });
    report(&mut out, "Section headers", cli.section_headers || all, |out| {
        commands::sections(out, &file, &args)
    });
    report(&mut out, "Dynamic segment", cli.dynamic || all, |out| {
        commands::dynamic(out, &file, &args)
    });
    report(&mut out, "Symbols", cli.symbols || all, |out| {
        commands::symbols(out, &file, &args)
    });
    report(&mut out, "Version sections", cli.version_info || all, |out| {
        commands::versions(out, &file, &args)
    });
    report(&mut out, "Relocations", cli.relocs || all, |out| {
        commands::relocations(out, &file, &args)
    });
    report(&mut out, "Notes", cli.notes || all, |out| {
        commands::notes(out, &file, &args)
    });
    report(&mut out, "Symbol hash histogram", cli.histogram || all, |out| {
        commands::histogram(out, &file, &args)
    });
    for which in cli.hex_dump.iter() {
        report(&mut out, &format!("Hex dump of {which}"), true, |out| {
            commands::hex_dump(out, &file, which)
        });
    }
    for which in cli.debug_dump.iter() {
        report(&mut out, &format!("Debug dump of {which}"), true, |out| {
            commands::debug_dump(out, &file, which)
        });
    }

    let warnings = utils::warning_count();
    if warnings > 0 {
        eprintln!("{}", format!("{warnings} problems were reported").warn());
    }
}
