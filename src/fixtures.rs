//! Builders that assemble small synthetic ELF images in memory so the
//! decoders can be tested against both record widths and byte orders without
//! shipping binary test files.
use crate::elf::Reader;
use memmap2::{Mmap, MmapMut};

pub fn map_bytes(bytes: &[u8]) -> Mmap {
    assert!(!bytes.is_empty());
    let mut map = MmapMut::map_anon(bytes.len()).unwrap();
    map.copy_from_slice(bytes);
    map.make_read_only().unwrap()
}

struct RawSegment {
    ptype: u32,
    offset: u64,
    vaddr: u64,
    filesz: u64,
    memsz: u64,
    flags: u32,
    align: u64,
}

struct RawSection {
    name: String,
    stype: u32,
    flags: u64,
    addr: u64,
    offset: u64,
    size: u64,
    link: u32,
    info: u32,
    entsize: u64,
}

pub struct ElfBuilder {
    sixty_four: bool,
    little: bool,
    bytes: Vec<u8>,
    segments: Vec<RawSegment>,
    sections: Vec<RawSection>,
    ph_count_override: Option<u16>,
    sh_count_override: Option<u16>,
    shstrndx_override: Option<u16>,
}

impl ElfBuilder {
    pub fn new(sixty_four: bool, little: bool) -> Self {
        let ehsize = if sixty_four { 64 } else { 52 };
        let mut b = ElfBuilder {
            sixty_four,
            little,
            bytes: vec![0; ehsize],
            segments: Vec::new(),
            sections: Vec::new(),
            ph_count_override: None,
            sh_count_override: None,
            shstrndx_override: None,
        };
        b.bytes[0..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
        b.bytes[4] = if sixty_four { 2 } else { 1 };
        b.bytes[5] = if little { 1 } else { 2 };
        b.bytes[6] = 1; // EV_CURRENT
        b.set_type(2); // executable
        b.set_machine(if sixty_four { 62 } else { 3 });
        b.patch_word(20, 1); // e_version
        let (ehsize_at, phentsize_at, shentsize_at) = if sixty_four { (52, 54, 58) } else { (40, 42, 46) };
        b.patch_half(ehsize_at, ehsize as u16);
        b.patch_half(phentsize_at, if sixty_four { 56 } else { 32 });
        b.patch_half(shentsize_at, if sixty_four { 64 } else { 40 });
        b
    }

    pub fn set_type(&mut self, etype: u16) {
        self.patch_half(16, etype);
    }

    pub fn set_machine(&mut self, machine: u16) {
        self.patch_half(18, machine);
    }

    /// Append raw bytes and return their file offset.
    pub fn append(&mut self, data: &[u8]) -> u64 {
        let at = self.bytes.len() as u64;
        self.bytes.extend_from_slice(data);
        at
    }

    pub fn append_symbol(&mut self, name: u32, value: u64, size: u64, info: u8, other: u8, shndx: u16) -> u64 {
        let mut record = Vec::new();
        if self.sixty_four {
            self.put_u32(&mut record, name);
            record.push(info);
            record.push(other);
            self.put_u16(&mut record, shndx);
            self.put_u64(&mut record, value);
            self.put_u64(&mut record, size);
        } else {
            self.put_u32(&mut record, name);
            self.put_u32(&mut record, value as u32);
            self.put_u32(&mut record, size as u32);
            record.push(info);
            record.push(other);
            self.put_u16(&mut record, shndx);
        }
        self.append(&record)
    }

    pub fn append_rela64(&mut self, offset: u64, symbol: u32, rtype: u32, addend: i64) -> u64 {
        assert!(self.sixty_four);
        let mut record = Vec::new();
        self.put_u64(&mut record, offset);
        self.put_u64(&mut record, ((symbol as u64) << 32) | rtype as u64);
        self.put_u64(&mut record, addend as u64);
        self.append(&record)
    }

    pub fn append_rel32(&mut self, offset: u32, symbol: u32, rtype: u8) -> u64 {
        assert!(!self.sixty_four);
        let mut record = Vec::new();
        self.put_u32(&mut record, offset);
        self.put_u32(&mut record, (symbol << 8) | rtype as u32);
        self.append(&record)
    }

    pub fn append_dyn64(&mut self, entries: &[(i64, u64)]) -> u64 {
        assert!(self.sixty_four);
        let mut record = Vec::new();
        for &(tag, value) in entries {
            self.put_u64(&mut record, tag as u64);
            self.put_u64(&mut record, value);
        }
        self.append(&record)
    }

    pub fn add_segment(&mut self, ptype: u32, offset: u64, vaddr: u64, filesz: u64, memsz: u64, flags: u32, align: u64) {
        self.segments.push(RawSegment {
            ptype,
            offset,
            vaddr,
            filesz,
            memsz,
            flags,
            align,
        });
    }

    /// Returns the index the section will have in the final table (index 0
    /// is the automatic null section).
    pub fn add_section(&mut self, name: &str, stype: u32, flags: u64, addr: u64, offset: u64, size: u64, link: u32, info: u32, entsize: u64) -> u32 {
        self.sections.push(RawSection {
            name: name.to_string(),
            stype,
            flags,
            addr,
            offset,
            size,
            link,
            info,
            entsize,
        });
        self.sections.len() as u32
    }

    pub fn patch_ph_count(&mut self, count: u16) {
        self.ph_count_override = Some(count);
    }

    pub fn patch_sh_count(&mut self, count: u16) {
        self.sh_count_override = Some(count);
    }

    pub fn patch_shstrndx(&mut self, index: u16) {
        self.shstrndx_override = Some(index);
    }

    pub fn reader(&self) -> Reader {
        Reader::new(map_bytes(&self.build())).unwrap()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.build()
    }

    fn build(&self) -> Vec<u8> {
        let mut out = self.bytes.clone();
        let (phoff_at, shoff_at, phnum_at, shnum_at, shstrndx_at) = if self.sixty_four {
            (32, 40, 56, 60, 62)
        } else {
            (28, 32, 44, 48, 50)
        };

        if !self.segments.is_empty() {
            while out.len() % 8 != 0 {
                out.push(0);
            }
            let phoff = out.len() as u64;
            for segment in self.segments.iter() {
                let mut record = Vec::new();
                if self.sixty_four {
                    self.put_u32(&mut record, segment.ptype);
                    self.put_u32(&mut record, segment.flags);
                    self.put_u64(&mut record, segment.offset);
                    self.put_u64(&mut record, segment.vaddr);
                    self.put_u64(&mut record, segment.vaddr);
                    self.put_u64(&mut record, segment.filesz);
                    self.put_u64(&mut record, segment.memsz);
                    self.put_u64(&mut record, segment.align);
                } else {
                    self.put_u32(&mut record, segment.ptype);
                    self.put_u32(&mut record, segment.offset as u32);
                    self.put_u32(&mut record, segment.vaddr as u32);
                    self.put_u32(&mut record, segment.vaddr as u32);
                    self.put_u32(&mut record, segment.filesz as u32);
                    self.put_u32(&mut record, segment.memsz as u32);
                    self.put_u32(&mut record, segment.flags);
                    self.put_u32(&mut record, segment.align as u32);
                }
                out.extend_from_slice(&record);
            }
            patch_at(&mut out, phoff_at, &self.addr_bytes(phoff));
            patch_at(&mut out, phnum_at, &self.u16_bytes(self.segments.len() as u16));
        }

        if !self.sections.is_empty() {
            // string table for section names, always ending with .shstrtab
            let mut strtab = vec![0u8];
            let mut name_offsets = Vec::new();
            for section in self.sections.iter() {
                name_offsets.push(strtab.len() as u32);
                strtab.extend_from_slice(section.name.as_bytes());
                strtab.push(0);
            }
            let shstrtab_name = strtab.len() as u32;
            strtab.extend_from_slice(b".shstrtab");
            strtab.push(0);
            let strtab_offset = out.len() as u64;
            let strtab_size = strtab.len() as u64;
            out.extend_from_slice(&strtab);

            while out.len() % 8 != 0 {
                out.push(0);
            }
            let shoff = out.len() as u64;
            self.put_section(&mut out, 0, 0, 0, 0, 0, 0, 0, 0, 0); // null section
            for (section, &name) in self.sections.iter().zip(name_offsets.iter()) {
                self.put_section(
                    &mut out,
                    name,
                    section.stype,
                    section.flags,
                    section.addr,
                    section.offset,
                    section.size,
                    section.link,
                    section.info,
                    section.entsize,
                );
            }
            self.put_section(&mut out, shstrtab_name, 3, 0, 0, strtab_offset, strtab_size, 0, 0, 0);

            let count = self.sections.len() as u16 + 2;
            patch_at(&mut out, shoff_at, &self.addr_bytes(shoff));
            patch_at(&mut out, shnum_at, &self.u16_bytes(count));
            patch_at(&mut out, shstrndx_at, &self.u16_bytes(count - 1));
        }

        if let Some(count) = self.ph_count_override {
            patch_at(&mut out, phnum_at, &self.u16_bytes(count));
        }
        if let Some(count) = self.sh_count_override {
            patch_at(&mut out, shnum_at, &self.u16_bytes(count));
        }
        if let Some(index) = self.shstrndx_override {
            patch_at(&mut out, shstrndx_at, &self.u16_bytes(index));
        }
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn put_section(&self, out: &mut Vec<u8>, name: u32, stype: u32, flags: u64, addr: u64, offset: u64, size: u64, link: u32, info: u32, entsize: u64) {
        let mut record = Vec::new();
        self.put_u32(&mut record, name);
        self.put_u32(&mut record, stype);
        if self.sixty_four {
            self.put_u64(&mut record, flags);
            self.put_u64(&mut record, addr);
            self.put_u64(&mut record, offset);
            self.put_u64(&mut record, size);
            self.put_u32(&mut record, link);
            self.put_u32(&mut record, info);
            self.put_u64(&mut record, 0); // align
            self.put_u64(&mut record, entsize);
        } else {
            self.put_u32(&mut record, flags as u32);
            self.put_u32(&mut record, addr as u32);
            self.put_u32(&mut record, offset as u32);
            self.put_u32(&mut record, size as u32);
            self.put_u32(&mut record, link);
            self.put_u32(&mut record, info);
            self.put_u32(&mut record, 0); // align
            self.put_u32(&mut record, entsize as u32);
        }
        out.extend_from_slice(&record);
    }

    fn put_u16(&self, out: &mut Vec<u8>, value: u16) {
        if self.little {
            out.extend_from_slice(&value.to_le_bytes());
        } else {
            out.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn put_u32(&self, out: &mut Vec<u8>, value: u32) {
        if self.little {
            out.extend_from_slice(&value.to_le_bytes());
        } else {
            out.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn put_u64(&self, out: &mut Vec<u8>, value: u64) {
        if self.little {
            out.extend_from_slice(&value.to_le_bytes());
        } else {
            out.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn u16_bytes(&self, value: u16) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.put_u16(&mut bytes, value);
        bytes
    }

    fn addr_bytes(&self, value: u64) -> Vec<u8> {
        let mut bytes = Vec::new();
        if self.sixty_four {
            self.put_u64(&mut bytes, value);
        } else {
            self.put_u32(&mut bytes, value as u32);
        }
        bytes
    }

    fn patch_half(&mut self, at: usize, value: u16) {
        let bytes = self.u16_bytes(value);
        patch_at(&mut self.bytes, at, &bytes);
    }

    fn patch_word(&mut self, at: usize, value: u32) {
        let mut bytes = Vec::new();
        self.put_u32(&mut bytes, value);
        patch_at(&mut self.bytes, at, &bytes);
    }
}

fn patch_at(out: &mut [u8], at: usize, bytes: &[u8]) {
    out[at..at + bytes.len()].copy_from_slice(bytes);
}

/// Assembles the byte content of the five DWARF v2 sections the decoders
/// understand. Always little endian; the ELF-level tests cover byte order.
pub struct DwarfBuilder {
    pub abbrev_bytes: Vec<u8>,
    pub info_bytes: Vec<u8>,
    pub line_bytes: Vec<u8>,
    pub aranges_bytes: Vec<u8>,
    pub pubnames_bytes: Vec<u8>,
    pub str_bytes: Vec<u8>,
}

fn uleb(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            return;
        }
    }
}

impl DwarfBuilder {
    pub fn new() -> Self {
        DwarfBuilder {
            abbrev_bytes: Vec::new(),
            info_bytes: Vec::new(),
            line_bytes: Vec::new(),
            aranges_bytes: Vec::new(),
            pubnames_bytes: Vec::new(),
            str_bytes: Vec::new(),
        }
    }

    pub fn abbrev(&mut self, code: u64, tag: u64, has_children: bool, attrs: &[(u64, u64)]) {
        uleb(&mut self.abbrev_bytes, code);
        uleb(&mut self.abbrev_bytes, tag);
        self.abbrev_bytes.push(has_children as u8);
        for &(name, form) in attrs {
            uleb(&mut self.abbrev_bytes, name);
            uleb(&mut self.abbrev_bytes, form);
        }
        self.abbrev_bytes.push(0);
        self.abbrev_bytes.push(0);
    }

    pub fn end_abbrevs(&mut self) {
        self.abbrev_bytes.push(0);
    }

    pub fn info_unit(&mut self, version: u16, abbrev_offset: u32, addr_size: u8, dies: &[u8]) {
        let length = 2 + 4 + 1 + dies.len() as u32;
        self.info_bytes.extend_from_slice(&length.to_le_bytes());
        self.info_bytes.extend_from_slice(&version.to_le_bytes());
        self.info_bytes.extend_from_slice(&abbrev_offset.to_le_bytes());
        self.info_bytes.push(addr_size);
        self.info_bytes.extend_from_slice(dies);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn line_unit(
        &mut self,
        version: u16,
        line_base: i8,
        line_range: u8,
        opcode_base: u8,
        std_lengths: &[u8],
        dirs: &[&str],
        files: &[(&str, u64, u64, u64)],
        program: &[u8],
    ) {
        assert_eq!(std_lengths.len(), opcode_base as usize - 1);
        let mut tables = Vec::new();
        for dir in dirs {
            tables.extend_from_slice(dir.as_bytes());
            tables.push(0);
        }
        tables.push(0);
        for &(name, dir, mtime, size) in files {
            tables.extend_from_slice(name.as_bytes());
            tables.push(0);
            uleb(&mut tables, dir);
            uleb(&mut tables, mtime);
            uleb(&mut tables, size);
        }
        tables.push(0);

        let header_length = (5 + std_lengths.len() + tables.len()) as u32;
        let length = 2 + 4 + header_length + program.len() as u32;
        self.line_bytes.extend_from_slice(&length.to_le_bytes());
        self.line_bytes.extend_from_slice(&version.to_le_bytes());
        self.line_bytes.extend_from_slice(&header_length.to_le_bytes());
        self.line_bytes.push(1); // min_insn_length
        self.line_bytes.push(1); // default_is_stmt
        self.line_bytes.push(line_base as u8);
        self.line_bytes.push(line_range);
        self.line_bytes.push(opcode_base);
        self.line_bytes.extend_from_slice(std_lengths);
        self.line_bytes.extend_from_slice(&tables);
        self.line_bytes.extend_from_slice(program);
    }

    pub fn aranges_unit(&mut self, version: u16, info_offset: u32, addr_size: u8, ranges: &[(u64, u64)]) {
        let unit_start = self.aranges_bytes.len();
        let tuple = 2 * addr_size as usize;
        let header_end = unit_start + 12;
        let padding = (tuple - header_end % tuple) % tuple;
        let body = padding + (ranges.len() + 1) * tuple;
        let length = (2 + 4 + 1 + 1 + body) as u32;

        self.aranges_bytes.extend_from_slice(&length.to_le_bytes());
        self.aranges_bytes.extend_from_slice(&version.to_le_bytes());
        self.aranges_bytes.extend_from_slice(&info_offset.to_le_bytes());
        self.aranges_bytes.push(addr_size);
        self.aranges_bytes.push(0); // segment size
        self.aranges_bytes.extend(std::iter::repeat_n(0u8, padding));
        for &(addr, size) in ranges {
            self.put_address(addr, addr_size);
            self.put_address(size, addr_size);
        }
        self.put_address(0, addr_size);
        self.put_address(0, addr_size);
    }

    fn put_address(&mut self, value: u64, addr_size: u8) {
        if addr_size == 8 {
            self.aranges_bytes.extend_from_slice(&value.to_le_bytes());
        } else {
            self.aranges_bytes.extend_from_slice(&(value as u32).to_le_bytes());
        }
    }

    pub fn pubnames_unit(&mut self, version: u16, info_offset: u32, info_length: u32, names: &[(u32, &str)]) {
        let mut body = Vec::new();
        for &(offset, name) in names {
            body.extend_from_slice(&offset.to_le_bytes());
            body.extend_from_slice(name.as_bytes());
            body.push(0);
        }
        body.extend_from_slice(&0u32.to_le_bytes());

        let length = (2 + 4 + 4 + body.len()) as u32;
        self.pubnames_bytes.extend_from_slice(&length.to_le_bytes());
        self.pubnames_bytes.extend_from_slice(&version.to_le_bytes());
        self.pubnames_bytes.extend_from_slice(&info_offset.to_le_bytes());
        self.pubnames_bytes.extend_from_slice(&info_length.to_le_bytes());
        self.pubnames_bytes.extend_from_slice(&body);
    }
}

/// An ELF file carrying the builder's DWARF sections, ready for the dump
/// functions.
pub fn elf_with_debug_sections(d: &DwarfBuilder) -> crate::elf::ElfFile {
    const SHT_PROGBITS: u32 = 1;
    let mut b = ElfBuilder::new(true, true);
    let tables = [
        (".debug_abbrev", &d.abbrev_bytes),
        (".debug_info", &d.info_bytes),
        (".debug_line", &d.line_bytes),
        (".debug_aranges", &d.aranges_bytes),
        (".debug_pubnames", &d.pubnames_bytes),
        (".debug_str", &d.str_bytes),
    ];
    for (name, bytes) in tables {
        let at = b.append(bytes);
        b.add_section(name, SHT_PROGBITS, 0, 0, at, bytes.len() as u64, 0, 0, 0);
    }
    crate::elf::ElfFile::from_reader(std::path::PathBuf::from("synthetic"), b.reader()).unwrap()
}
