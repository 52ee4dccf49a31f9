//! Reports for the envelope: the file header and the two header tables.
use super::tables::{SimpleTableBuilder, TableBuilder, add_field, add_simple};
use crate::cli::ReportArgs;
use crate::elf::segments::{ProgramHeader, SegmentType, sections_in_segment};
use crate::elf::sections::SectionHeader;
use crate::elf::{ElfFile, Stream, ValueFormat};
use crate::error::DecodeError;
use crate::utils;
use crate::utils::uwriteln;
use std::io::Write;

pub fn file_header(out: &mut impl Write, file: &ElfFile, args: &ReportArgs) -> Result<(), DecodeError> {
    let mut b = SimpleTableBuilder::new();

    add_simple!(b, "type", file.header.stype(), "type of ELF file");
    add_simple!(
        b,
        "class",
        if file.reader.sixty_four_bit { "ELF64" } else { "ELF32" },
        "whether file records use 32-bit or 64-bit layouts"
    );
    if file.reader.little_endian {
        add_simple!(
            b,
            "data",
            "little endian",
            "multi-byte fields store their least significant byte first"
        );
    } else {
        add_simple!(
            b,
            "data",
            "big endian",
            "multi-byte fields store their most significant byte first"
        );
    }
    add_simple!(b, "machine", file.header.machine_name(), "CPU architecture");
    add_simple!(b, "osabi", file.header.abi_name(), "the OS the binary was compiled for");
    add_simple!(b, "abiversion", file.header.abiversion, "zero for Linux");
    add_simple!(
        b,
        "entry",
        "{:#x}",
        file.header.entry,
        "virtual address at which execution starts"
    );
    add_simple!(
        b,
        "flags",
        "{:#x}",
        file.header.flags,
        "processor-specific flags"
    );
    add_simple!(
        b,
        "ph_offset",
        file.header.ph_offset,
        "offset in the file to the program header table"
    );
    add_simple!(
        b,
        "num_ph_entries",
        file.header.num_ph_entries,
        "number of entries in the program header table"
    );
    add_simple!(
        b,
        "section_offset",
        file.header.section_offset,
        "offset in the file to the section header table"
    );
    add_simple!(
        b,
        "num_section_entries",
        file.header.num_section_entries,
        "number of entries in the section header table"
    );
    add_simple!(
        b,
        "string_table_index",
        file.header.string_table_index,
        "section index of the section name string table"
    );
    b.writeln(out, args.explain);
    Ok(())
}

pub fn segments(out: &mut impl Write, file: &ElfFile, args: &ReportArgs) -> Result<(), DecodeError> {
    if file.segments.is_empty() {
        uwriteln!(out, "There are no program headers in this file.");
        return Ok(());
    }

    let mut builder = TableBuilder::new();
    builder.add_col_l("type", "the segment type");
    builder.add_col_r("offset", "the offset into the file at which the segment appears");
    builder.add_col_r("vaddr", "the virtual address the segment is loaded at");
    builder.add_col_r("paddr", "the physical address, usually zero");
    builder.add_col_r("filesz", "the size of the segment in the file");
    builder.add_col_r("memsz", "the size of the segment in memory");
    builder.add_col_r("flags", "readable, writeable, and/or executable");
    builder.add_col_r("align", "the alignment of the segment");

    for segment in file.segments.iter() {
        add_field!(builder, "type", segment.stype.name(file.machine));
        add_field!(
            builder,
            "offset",
            file.reader.format_value(segment.obytes.start.0, ValueFormat::Hex)
        );
        add_field!(
            builder,
            "vaddr",
            file.reader.format_value(segment.vbytes.start.0, ValueFormat::FixedHex)
        );
        add_field!(
            builder,
            "paddr",
            file.reader.format_value(segment.paddr, ValueFormat::FixedHex)
        );
        add_field!(builder, "filesz", file.reader.format_value(segment.obytes.size, ValueFormat::Hex));
        add_field!(builder, "memsz", file.reader.format_value(segment.vbytes.size, ValueFormat::Hex));
        add_field!(builder, "flags", ProgramHeader::flags(segment.flags));
        add_field!(builder, "align", file.reader.format_value(segment.align, ValueFormat::Hex));
    }
    builder.writeln(&mut *out, args.titles, args.explain);

    if let Some(interp) = interpreter(file) {
        uwriteln!(out, "      [Requesting program interpreter: {interp}]");
    }

    if !file.sections.is_empty() {
        uwriteln!(out);
        uwriteln!(out, " Section to Segment mapping:");
        for (i, segment) in file.segments.iter().enumerate() {
            let names: Vec<String> = sections_in_segment(segment, &file.sections)
                .iter()
                .map(|s| s.name.clone())
                .collect();
            uwriteln!(out, "  {i:02}: {}", names.join(" "));
        }
    }
    Ok(())
}

fn interpreter(file: &ElfFile) -> Option<String> {
    let segment = file
        .segments
        .iter()
        .find(|s| s.stype == SegmentType::Interpreter)?;
    let mut s = Stream::new(&file.reader, segment.obytes.start.0 as usize);
    match s.read_string() {
        Ok(path) => Some(path),
        Err(err) => {
            utils::warn(&format!("failed to read the interpreter path: {err}"));
            None
        }
    }
}

pub fn sections(out: &mut impl Write, file: &ElfFile, args: &ReportArgs) -> Result<(), DecodeError> {
    if file.sections.is_empty() {
        uwriteln!(out, "There are no sections in this file.");
        return Ok(());
    }

    let mut builder = TableBuilder::new();
    builder.add_col_r("nr", "the section's index, the domain symbol st_shndx values refer to");
    builder.add_col_l("name", "resolved from the section name string table");
    builder.add_col_l("type", "the section type");
    builder.add_col_r("addr", "the virtual address of the section, zero if not allocated");
    builder.add_col_r("offset", "the offset into the file at which the section appears");
    builder.add_col_r("size", "the size of the section in bytes");
    builder.add_col_r("es", "the entry size, if the section holds a table of fixed-size records");
    builder.add_col_l("flags", "write, alloc, exec, and friends");
    builder.add_col_r("link", "the index of an associated section");
    builder.add_col_r("info", "extra section-specific information");
    builder.add_col_r("align", "the alignment of the section");

    for (i, section) in file.sections.iter().enumerate() {
        add_field!(builder, "nr", i);
        add_field!(builder, "name", section.name);
        add_field!(builder, "type", section.stype.name(file.machine));
        add_field!(
            builder,
            "addr",
            file.reader.format_value(section.vbytes.start.0, ValueFormat::FixedHex)
        );
        add_field!(builder, "offset", file.reader.format_value(section.obytes.start.0, ValueFormat::Hex));
        add_field!(builder, "size", file.reader.format_value(section.obytes.size, ValueFormat::Hex));
        add_field!(builder, "es", file.reader.format_value(section.entry_size, ValueFormat::Hex));
        add_field!(builder, "flags", SectionHeader::flags(section.flags));
        add_field!(builder, "link", section.link);
        add_field!(builder, "info", section.info);
        add_field!(builder, "align", "{:x}", section.align);
    }
    builder.writeln(out, args.titles, args.explain);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ElfBuilder;
    use std::path::PathBuf;

    fn report(f: impl Fn(&mut Vec<u8>, &ElfFile, &ReportArgs) -> Result<(), DecodeError>, file: &ElfFile) -> String {
        let mut v: Vec<u8> = Vec::new();
        let args = ReportArgs {
            titles: true,
            explain: false,
        };
        f(&mut v, file, &args).unwrap();
        crate::utils::strip_escapes(&String::from_utf8(v).unwrap())
    }

    #[test]
    fn file_header_report_names_the_machine() {
        let mut b = ElfBuilder::new(true, true);
        b.set_machine(62);
        let file = ElfFile::from_reader(PathBuf::from("synthetic"), b.reader()).unwrap();
        let s = report(file_header, &file);
        assert!(s.contains("ELF64"), "{s}");
        assert!(s.contains("little endian"), "{s}");
        assert!(s.contains("Advanced Micro Devices X86-64"), "{s}");
    }

    #[test]
    fn segment_report_includes_the_mapping() {
        let mut b = ElfBuilder::new(true, true);
        let at = b.append(b"\0\0\0\0some bytes to hold");
        b.add_segment(1, at, 0x10000 + at, 16, 16, 5, 0x1000);
        b.add_section(".text", 1, 6, 0x10000 + at, at, 16, 0, 0, 0);
        let file = ElfFile::from_reader(PathBuf::from("synthetic"), b.reader()).unwrap();
        let s = report(segments, &file);
        assert!(s.contains("LOAD"), "{s}");
        assert!(s.contains("Section to Segment mapping"), "{s}");
        assert!(s.contains(".text"), "{s}");
    }

    #[test]
    fn section_report_lists_names_and_types() {
        let mut b = ElfBuilder::new(true, true);
        b.add_section(".rodata", 1, 2, 0x2000, 0x100, 0x40, 0, 0, 0);
        let file = ElfFile::from_reader(PathBuf::from("synthetic"), b.reader()).unwrap();
        let s = report(sections, &file);
        assert!(s.contains(".rodata"), "{s}");
        assert!(s.contains("PROGBITS"), "{s}");
        assert!(s.contains(".shstrtab"), "{s}");
    }
}
