//! Reports for the dynamic-linking metadata: the dynamic segment itself,
//! symbols, GNU versions, relocations, and the hash-bucket histogram.
use super::tables::{TableBuilder, add_field};
use crate::cli::ReportArgs;
use crate::elf::dynamic::{self, DynamicInfo};
use crate::elf::relocations::{Relocation, RelocationKind, read_relocations};
use crate::elf::sections::{SectionType, StringTable};
use crate::elf::symbols::{HashTable, SymbolTable};
use crate::elf::versions::{self, VersionDef, VersionNeed};
use crate::elf::{ElfFile, ValueFormat};
use crate::error::DecodeError;
use crate::utils;
use crate::utils::uwriteln;
use std::io::Write;

pub fn dynamic(out: &mut impl Write, file: &ElfFile, args: &ReportArgs) -> Result<(), DecodeError> {
    let entries = match file.dynamic_entries()? {
        Some(entries) => entries,
        None => {
            uwriteln!(out, "There is no dynamic segment in this file.");
            return Ok(());
        }
    };
    let info = DynamicInfo::new(&entries);
    let strings = file.dynamic_strings(&info);

    uwriteln!(out, "The dynamic segment contains {} entries:", entries.len());
    let mut builder = TableBuilder::new();
    builder.add_col_r("tag", "the numeric entry tag");
    builder.add_col_l("type", "the tag's name");
    builder.add_col_l("value", "integer, pointer, or name depending on the tag");
    for entry in entries.iter() {
        add_field!(builder, "tag", "{:#010x}", entry.tag);
        add_field!(builder, "type", dynamic::tag_name(entry.tag, file.machine));
        add_field!(builder, "value", entry_value(file, entry.tag, entry.value, &strings));
    }
    builder.writeln(out, args.titles, args.explain);
    Ok(())
}

fn entry_value(file: &ElfFile, tag: i64, value: u64, strings: &StringTable) -> String {
    let named = |what: &str| -> String {
        match strings.get(&file.reader, value as usize) {
            Some(name) => format!("{what}: [{name}]"),
            None => {
                utils::warn(&format!("bad dynamic string offset: {value}"));
                format!("{what}: <string table offset {value:#x}>")
            }
        }
    };
    match tag {
        dynamic::DT_NEEDED => named("Shared library"),
        dynamic::DT_SONAME => named("Library soname"),
        dynamic::DT_RPATH => named("Library rpath"),
        dynamic::DT_RUNPATH => named("Library runpath"),
        dynamic::DT_PLTRELSZ
        | dynamic::DT_RELASZ
        | dynamic::DT_RELAENT
        | dynamic::DT_STRSZ
        | dynamic::DT_SYMENT
        | dynamic::DT_RELSZ
        | dynamic::DT_RELENT
        | dynamic::DT_INIT_ARRAYSZ
        | dynamic::DT_FINI_ARRAYSZ => format!("{} (bytes)", file.reader.format_value(value, ValueFormat::Dec)),
        dynamic::DT_PLTREL => dynamic::tag_name(value as i64, file.machine),
        dynamic::DT_NULL
        | dynamic::DT_SYMBOLIC
        | dynamic::DT_TEXTREL
        | dynamic::DT_BIND_NOW
        | dynamic::DT_FLAGS
        | dynamic::DT_FLAGS_1
        | dynamic::DT_VERDEFNUM
        | dynamic::DT_VERNEEDNUM => format!("{value:#x}"),
        _ => file.reader.format_value(value, ValueFormat::PrefixedHex),
    }
}

pub fn symbols(out: &mut impl Write, file: &ElfFile, args: &ReportArgs) -> Result<(), DecodeError> {
    let mut any = false;
    for table in [file.find_dynamic_symbols(), file.find_symbols()].into_iter().flatten() {
        if any {
            uwriteln!(out);
        }
        any = true;
        dump_symbol_table(out, file, &table, args);
    }
    if !any {
        uwriteln!(out, "There are no symbol tables in this file.");
    }
    Ok(())
}

fn dump_symbol_table(out: &mut impl Write, file: &ElfFile, table: &SymbolTable, args: &ReportArgs) {
    uwriteln!(
        out,
        "Symbol table {} contains {} entries:",
        table.section_name,
        table.entries.len()
    );

    let version_tables = if table.dynamic { version_tables(file) } else { None };

    let mut builder = TableBuilder::new();
    builder.add_col_r("num", "the symbol's index, the domain relocation records refer to");
    builder.add_col_r("value", "address, absolute value, or alignment");
    builder.add_col_r("size", "size of the symbol, zero if unknown");
    builder.add_col_l("type", "func, object, section, etc");
    builder.add_col_l("bind", "local, global, or weak");
    builder.add_col_l("vis", "default, hidden, internal, or protected");
    builder.add_col_r("ndx", "index of the section the symbol lives in");
    builder.add_col_l("name", "resolved from the symbol string table");
    for (i, entry) in table.entries.iter().enumerate() {
        let mut name = file.symbol_name(table, entry);
        if let Some((versym, needs, defs)) = &version_tables
            && let Some(&v) = versym.get(i)
            && let Some(version) = versions::resolve_version(v, entry, &file.sections, needs, defs)
        {
            // GNU convention: one @ for hidden versions, two for the default
            let sep = if version.hidden { "@" } else { "@@" };
            name = format!("{name}{sep}{}", version.name);
        }
        add_field!(builder, "num", i);
        add_field!(
            builder,
            "value",
            file.reader.format_value(entry.value, ValueFormat::FixedHex)
        );
        add_field!(builder, "size", file.reader.format_value(entry.size, ValueFormat::FixedDec));
        add_field!(builder, "type", "{:?}", entry.stype);
        add_field!(builder, "bind", "{:?}", entry.binding);
        add_field!(builder, "vis", "{:?}", entry.visibility);
        add_field!(builder, "ndx", entry.index.text());
        add_field!(builder, "name", name);
    }
    builder.writeln(out, args.titles, args.explain);
}

type VersionTables = (Vec<u16>, Vec<VersionNeed>, Vec<VersionDef>);

fn version_tables(file: &ElfFile) -> Option<VersionTables> {
    let versym_section = file.sections.iter().find(|s| s.stype == SectionType::VerSym)?;
    let versym = match versions::read_versym(&file.reader, versym_section) {
        Ok(versym) => versym,
        Err(err) => {
            utils::warn(&format!("failed to read the version table: {err}"));
            return None;
        }
    };

    let mut needs = Vec::new();
    if let Some(section) = file.sections.iter().find(|s| s.stype == SectionType::VerNeed) {
        let strings = crate::elf::sections::string_table_at(&file.reader, &file.sections, section.link);
        match versions::read_verneed(&file.reader, section, &strings) {
            Ok(read) => needs = read,
            Err(err) => utils::warn(&format!("failed to read version needs: {err}")),
        }
    }
    let mut defs = Vec::new();
    if let Some(section) = file.sections.iter().find(|s| s.stype == SectionType::VerDef) {
        let strings = crate::elf::sections::string_table_at(&file.reader, &file.sections, section.link);
        match versions::read_verdef(&file.reader, section, &strings) {
            Ok(read) => defs = read,
            Err(err) => utils::warn(&format!("failed to read version definitions: {err}")),
        }
    }
    Some((versym, needs, defs))
}

pub fn versions(out: &mut impl Write, file: &ElfFile, _args: &ReportArgs) -> Result<(), DecodeError> {
    let Some((versym, needs, defs)) = version_tables(file) else {
        uwriteln!(out, "There are no version sections in this file.");
        return Ok(());
    };

    if !defs.is_empty() {
        uwriteln!(out, "Version definitions:");
        for def in defs.iter() {
            uwriteln!(
                out,
                "  index {}: flags {:#x} hash {:#x} names {}",
                def.index,
                def.flags,
                def.hash,
                def.names.join(", ")
            );
        }
    }
    if !needs.is_empty() {
        uwriteln!(out, "Version needs:");
        for need in needs.iter() {
            uwriteln!(out, "  from {}:", need.file);
            for aux in need.aux.iter() {
                uwriteln!(
                    out,
                    "    index {}: flags {:#x} hash {:#x} name {}",
                    aux.other,
                    aux.flags,
                    aux.hash,
                    aux.name
                );
            }
        }
    }
    uwriteln!(out, "Version symbols ({} entries):", versym.len());
    let rendered: Vec<String> = versym.iter().map(|v| format!("{v:#x}")).collect();
    uwriteln!(out, "  {}", rendered.join(" "));
    Ok(())
}

pub fn relocations(out: &mut impl Write, file: &ElfFile, args: &ReportArgs) -> Result<(), DecodeError> {
    let mut any = false;
    if !file.sections.is_empty() {
        for section in file.sections.iter() {
            let kind = match section.stype {
                SectionType::RelocationsWith => RelocationKind::Rela,
                SectionType::RelocationsWithout => RelocationKind::Rel,
                _ => continue,
            };
            any = true;
            let symbols = file.symbol_table_at(section.link);
            uwriteln!(
                out,
                "Relocation section {} at offset {:#x} contains {} entries:",
                section.name,
                section.obytes.start.0,
                section.obytes.size / kind.record_size(file.reader.sixty_four_bit)
            );
            match read_relocations(&file.reader, section.obytes.start.0, section.obytes.size, kind) {
                Ok(relocations) => dump_relocation_table(out, file, &relocations, symbols.as_ref(), args),
                Err(err) => utils::warn(&format!("failed to read {}: {err}", section.name)),
            }
        }
    } else {
        any = dynamic_relocations(out, file, args)?;
    }
    if !any {
        uwriteln!(out, "There are no relocations in this file.");
    }
    Ok(())
}

/// Relocation tables located through the dynamic segment. When DT_PLTREL is
/// absent the PLT table's kind is unknowable from the file alone and the
/// machine's default applies.
fn dynamic_relocations(out: &mut impl Write, file: &ElfFile, args: &ReportArgs) -> Result<bool, DecodeError> {
    let entries = match file.dynamic_entries()? {
        Some(entries) => entries,
        None => return Ok(false),
    };
    let info = DynamicInfo::new(&entries);
    let symbols = file.find_dynamic_symbols();

    let plt_kind = match info.get(dynamic::DT_PLTREL) {
        Some(7) => RelocationKind::Rela,
        Some(17) => RelocationKind::Rel,
        Some(other) => {
            utils::warn(&format!("bad DT_PLTREL value: {other}"));
            machine_default(file)
        }
        None => machine_default(file),
    };
    let tables = [
        ("DT_RELA", info.get(dynamic::DT_RELA), info.get(dynamic::DT_RELASZ), RelocationKind::Rela),
        ("DT_REL", info.get(dynamic::DT_REL), info.get(dynamic::DT_RELSZ), RelocationKind::Rel),
        ("DT_JMPREL", info.get(dynamic::DT_JMPREL), info.get(dynamic::DT_PLTRELSZ), plt_kind),
    ];

    let mut any = false;
    for (label, vaddr, size, kind) in tables {
        let (Some(vaddr), Some(size)) = (vaddr, size) else {
            continue;
        };
        any = true;
        let offset = vaddr.wrapping_sub(file.load_bias);
        uwriteln!(
            out,
            "Relocation table {label} at offset {offset:#x} contains {} entries:",
            size / kind.record_size(file.reader.sixty_four_bit)
        );
        match read_relocations(&file.reader, offset, size, kind) {
            Ok(relocations) => dump_relocation_table(out, file, &relocations, symbols.as_ref(), args),
            Err(err) => utils::warn(&format!("failed to read {label}: {err}")),
        }
    }
    Ok(any)
}

fn machine_default(file: &ElfFile) -> RelocationKind {
    if file.machine.rela_default() {
        RelocationKind::Rela
    } else {
        RelocationKind::Rel
    }
}

fn dump_relocation_table(
    out: &mut impl Write,
    file: &ElfFile,
    relocations: &[Relocation],
    symbols: Option<&SymbolTable>,
    args: &ReportArgs,
) {
    let sixty_four = file.reader.sixty_four_bit;
    let mut builder = TableBuilder::new();
    builder.add_col_r("offset", "where the relocation applies");
    builder.add_col_r("info", "the raw info word encoding symbol index and type");
    builder.add_col_l("type", "the machine-specific relocation type");
    builder.add_col_r("sym value", "the referenced symbol's value");
    builder.add_col_l("sym name + addend", "the referenced symbol and the explicit addend, if any");

    for relocation in relocations.iter() {
        let symbol_index = relocation.symbol_index(sixty_four);
        let (value, mut name) = match (symbol_index, symbols) {
            (0, _) => (String::new(), String::new()),
            (_, Some(table)) => match table.entries.get(symbol_index as usize) {
                Some(entry) => (
                    file.reader.format_value(entry.value, ValueFormat::FixedHex),
                    file.symbol_name(table, entry),
                ),
                None => {
                    utils::warn(&format!("bad symbol index: {symbol_index}"));
                    (String::new(), format!("bad symbol index: {symbol_index}"))
                }
            },
            (_, None) => (String::new(), format!("<symbol index {symbol_index}>")),
        };
        if let Some(addend) = relocation.addend()
            && symbol_index != 0
        {
            name = format!("{name} + {addend:x}");
        }

        add_field!(
            builder,
            "offset",
            file.reader.format_value(relocation.offset(), ValueFormat::FixedHex)
        );
        add_field!(
            builder,
            "info",
            file.reader.format_value(relocation.info(), ValueFormat::FixedHex)
        );
        add_field!(builder, "type", relocation.type_name(sixty_four, file.machine));
        add_field!(builder, "sym value", value);
        add_field!(builder, "sym name + addend", name);
    }
    builder.writeln(out, args.titles, args.explain);
}

pub fn histogram(out: &mut impl Write, file: &ElfFile, _args: &ReportArgs) -> Result<(), DecodeError> {
    let Some(section) = file
        .sections
        .iter()
        .find(|s| s.stype == SectionType::SymbolHashTable)
    else {
        uwriteln!(out, "There is no symbol hash table in this file.");
        return Ok(());
    };

    let table = HashTable::new(&file.reader, section)?;
    let lengths = table.bucket_lengths();
    let longest = lengths.iter().copied().max().unwrap_or(0);

    uwriteln!(
        out,
        "Histogram for bucket list length (total of {} buckets):",
        table.buckets.len()
    );
    uwriteln!(out, " Length  Number     % of total");
    let total = lengths.len().max(1);
    for length in 0..=longest {
        let count = lengths.iter().filter(|&&l| l == length).count();
        uwriteln!(
            out,
            " {:6}  {:6}     {:5.1}%",
            length,
            count,
            100.0 * count as f64 / total as f64
        );
    }
    Ok(())
}
