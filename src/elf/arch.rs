//! Machine-specific lookups. The file header's e_machine field is resolved
//! once into a handler and the handler is consulted wherever a numeric code
//! has a processor-specific meaning: relocation types, dynamic tags, and
//! segment/section types. Only a few architectures define extensions for the
//! latter two; everything else uses the generic fallbacks.
pub trait MachineHandler {
    /// Name for a relocation type code, e.g. `R_X86_64_PLT32`.
    fn relocation_name(&self, rtype: u64) -> Option<&'static str>;

    /// Name for a dynamic tag in the processor-specific range.
    fn dynamic_tag_name(&self, _tag: i64) -> Option<&'static str> {
        None
    }

    /// Name for a segment type in the processor-specific range.
    fn segment_type_name(&self, _ptype: u32) -> Option<&'static str> {
        None
    }

    /// Name for a section type in the processor-specific range.
    fn section_type_name(&self, _stype: u32) -> Option<&'static str> {
        None
    }

    /// Whether relocation tables default to explicit addends when nothing
    /// else says. Matters for PLT relocations located through the dynamic
    /// segment without a DT_PLTREL entry.
    fn rela_default(&self) -> bool {
        true
    }
}

pub fn handler(machine: u16) -> &'static dyn MachineHandler {
    match machine {
        2 | 18 | 43 => &Sparc,
        3 => &I386,
        8 | 10 => &Mips,
        15 => &Parisc,
        40 => &Arm,
        62 => &X86_64,
        183 => &Aarch64,
        _ => &Generic,
    }
}

pub fn machine_name(machine: u16) -> String {
    // see https://refspecs.linuxfoundation.org/elf/gabi4+/ch4.eheader.html
    match machine {
        0 => "None".to_string(),
        2 => "Sparc".to_string(),
        3 => "Intel 80386".to_string(),
        8 => "MIPS R3000".to_string(),
        15 => "HPPA".to_string(),
        18 => "Sparc v8+".to_string(),
        20 => "PowerPC".to_string(),
        21 => "PowerPC64".to_string(),
        22 => "IBM S/390".to_string(),
        40 => "ARM".to_string(),
        43 => "Sparc v9".to_string(),
        50 => "Intel IA-64".to_string(),
        62 => "Advanced Micro Devices X86-64".to_string(),
        183 => "AArch64".to_string(),
        243 => "RISC-V".to_string(),
        _ => format!("<unknown>: {machine:#x}"),
    }
}

struct Generic;
#[allow(non_camel_case_types)]
struct X86_64;
struct I386;
struct Arm;
struct Aarch64;
struct Mips;
struct Sparc;
struct Parisc;

impl MachineHandler for Generic {
    fn relocation_name(&self, _rtype: u64) -> Option<&'static str> {
        None
    }
}

impl MachineHandler for X86_64 {
    fn relocation_name(&self, rtype: u64) -> Option<&'static str> {
        // see https://gitlab.com/x86-psABIs/x86-64-ABI
        match rtype {
            0 => Some("R_X86_64_NONE"),
            1 => Some("R_X86_64_64"),
            2 => Some("R_X86_64_PC32"),
            3 => Some("R_X86_64_GOT32"),
            4 => Some("R_X86_64_PLT32"),
            5 => Some("R_X86_64_COPY"),
            6 => Some("R_X86_64_GLOB_DAT"),
            7 => Some("R_X86_64_JUMP_SLOT"),
            8 => Some("R_X86_64_RELATIVE"),
            9 => Some("R_X86_64_GOTPCREL"),
            10 => Some("R_X86_64_32"),
            11 => Some("R_X86_64_32S"),
            12 => Some("R_X86_64_16"),
            13 => Some("R_X86_64_PC16"),
            14 => Some("R_X86_64_8"),
            15 => Some("R_X86_64_PC8"),
            16 => Some("R_X86_64_DTPMOD64"),
            17 => Some("R_X86_64_DTPOFF64"),
            18 => Some("R_X86_64_TPOFF64"),
            19 => Some("R_X86_64_TLSGD"),
            20 => Some("R_X86_64_TLSLD"),
            21 => Some("R_X86_64_DTPOFF32"),
            22 => Some("R_X86_64_GOTTPOFF"),
            23 => Some("R_X86_64_TPOFF32"),
            24 => Some("R_X86_64_PC64"),
            25 => Some("R_X86_64_GOTOFF64"),
            26 => Some("R_X86_64_GOTPC32"),
            32 => Some("R_X86_64_SIZE32"),
            33 => Some("R_X86_64_SIZE64"),
            37 => Some("R_X86_64_IRELATIVE"),
            41 => Some("R_X86_64_GOTPCRELX"),
            42 => Some("R_X86_64_REX_GOTPCRELX"),
            _ => None,
        }
    }
}

impl MachineHandler for I386 {
    fn relocation_name(&self, rtype: u64) -> Option<&'static str> {
        match rtype {
            0 => Some("R_386_NONE"),
            1 => Some("R_386_32"),
            2 => Some("R_386_PC32"),
            3 => Some("R_386_GOT32"),
            4 => Some("R_386_PLT32"),
            5 => Some("R_386_COPY"),
            6 => Some("R_386_GLOB_DAT"),
            7 => Some("R_386_JMP_SLOT"),
            8 => Some("R_386_RELATIVE"),
            9 => Some("R_386_GOTOFF"),
            10 => Some("R_386_GOTPC"),
            _ => None,
        }
    }

    fn rela_default(&self) -> bool {
        false
    }
}

impl MachineHandler for Arm {
    fn relocation_name(&self, rtype: u64) -> Option<&'static str> {
        match rtype {
            0 => Some("R_ARM_NONE"),
            1 => Some("R_ARM_PC24"),
            2 => Some("R_ARM_ABS32"),
            21 => Some("R_ARM_GLOB_DAT"),
            22 => Some("R_ARM_JUMP_SLOT"),
            23 => Some("R_ARM_RELATIVE"),
            _ => None,
        }
    }

    fn rela_default(&self) -> bool {
        false
    }
}

impl MachineHandler for Aarch64 {
    fn relocation_name(&self, rtype: u64) -> Option<&'static str> {
        match rtype {
            0 => Some("R_AARCH64_NONE"),
            257 => Some("R_AARCH64_ABS64"),
            258 => Some("R_AARCH64_ABS32"),
            1024 => Some("R_AARCH64_COPY"),
            1025 => Some("R_AARCH64_GLOB_DAT"),
            1026 => Some("R_AARCH64_JUMP_SLOT"),
            1027 => Some("R_AARCH64_RELATIVE"),
            1030 => Some("R_AARCH64_TLS_TPREL"),
            1032 => Some("R_AARCH64_IRELATIVE"),
            _ => None,
        }
    }
}

impl MachineHandler for Mips {
    fn relocation_name(&self, rtype: u64) -> Option<&'static str> {
        match rtype {
            0 => Some("R_MIPS_NONE"),
            1 => Some("R_MIPS_16"),
            2 => Some("R_MIPS_32"),
            3 => Some("R_MIPS_REL32"),
            4 => Some("R_MIPS_26"),
            5 => Some("R_MIPS_HI16"),
            6 => Some("R_MIPS_LO16"),
            7 => Some("R_MIPS_GPREL16"),
            8 => Some("R_MIPS_LITERAL"),
            9 => Some("R_MIPS_GOT16"),
            10 => Some("R_MIPS_PC16"),
            11 => Some("R_MIPS_CALL16"),
            12 => Some("R_MIPS_GPREL32"),
            126 => Some("R_MIPS_JUMP_SLOT"),
            _ => None,
        }
    }

    fn dynamic_tag_name(&self, tag: i64) -> Option<&'static str> {
        match tag {
            0x70000001 => Some("MIPS_RLD_VERSION"),
            0x70000002 => Some("MIPS_TIME_STAMP"),
            0x70000003 => Some("MIPS_ICHECKSUM"),
            0x70000004 => Some("MIPS_IVERSION"),
            0x70000005 => Some("MIPS_FLAGS"),
            0x70000006 => Some("MIPS_BASE_ADDRESS"),
            0x7000000a => Some("MIPS_LOCAL_GOTNO"),
            0x70000011 => Some("MIPS_SYMTABNO"),
            0x70000012 => Some("MIPS_UNREFEXTNO"),
            0x70000013 => Some("MIPS_GOTSYM"),
            0x70000016 => Some("MIPS_RLD_MAP"),
            _ => None,
        }
    }

    fn segment_type_name(&self, ptype: u32) -> Option<&'static str> {
        match ptype {
            0x70000000 => Some("MIPS_REGINFO"),
            0x70000001 => Some("MIPS_RTPROC"),
            0x70000002 => Some("MIPS_OPTIONS"),
            0x70000003 => Some("MIPS_ABIFLAGS"),
            _ => None,
        }
    }

    fn section_type_name(&self, stype: u32) -> Option<&'static str> {
        match stype {
            0x70000006 => Some("MIPS_REGINFO"),
            0x7000000d => Some("MIPS_OPTIONS"),
            0x7000002a => Some("MIPS_ABIFLAGS"),
            _ => None,
        }
    }

    fn rela_default(&self) -> bool {
        false
    }
}

impl MachineHandler for Sparc {
    fn relocation_name(&self, rtype: u64) -> Option<&'static str> {
        match rtype {
            0 => Some("R_SPARC_NONE"),
            1 => Some("R_SPARC_8"),
            2 => Some("R_SPARC_16"),
            3 => Some("R_SPARC_32"),
            19 => Some("R_SPARC_GLOB_DAT"),
            20 => Some("R_SPARC_JMP_SLOT"),
            22 => Some("R_SPARC_RELATIVE"),
            32 => Some("R_SPARC_64"),
            54 => Some("R_SPARC_UA64"),
            _ => None,
        }
    }

    fn dynamic_tag_name(&self, tag: i64) -> Option<&'static str> {
        match tag {
            0x70000001 => Some("SPARC_REGISTER"),
            _ => None,
        }
    }
}

impl MachineHandler for Parisc {
    fn relocation_name(&self, rtype: u64) -> Option<&'static str> {
        match rtype {
            0 => Some("R_PARISC_NONE"),
            1 => Some("R_PARISC_DIR32"),
            2 => Some("R_PARISC_DIR21L"),
            0x40 => Some("R_PARISC_ABS_CALL"),
            0x41 => Some("R_PARISC_IPLT"),
            0x42 => Some("R_PARISC_EPLT"),
            _ => None,
        }
    }

    fn dynamic_tag_name(&self, tag: i64) -> Option<&'static str> {
        match tag {
            0x70000000 => Some("HP_LOAD_MAP"),
            0x70000001 => Some("HP_DLD_FLAGS"),
            0x70000002 => Some("HP_DLD_HOOK"),
            0x70000003 => Some("HP_UX10_INIT"),
            _ => None,
        }
    }

    fn segment_type_name(&self, ptype: u32) -> Option<&'static str> {
        match ptype {
            0x70000000 => Some("PARISC_ARCHEXT"),
            0x70000001 => Some("PARISC_UNWIND"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_resolves_from_machine_id() {
        assert_eq!(handler(62).relocation_name(7), Some("R_X86_64_JUMP_SLOT"));
        assert_eq!(handler(3).rela_default(), false);
        assert_eq!(handler(62).rela_default(), true);
        assert_eq!(handler(8).segment_type_name(0x70000003), Some("MIPS_ABIFLAGS"));
        assert_eq!(handler(9999).relocation_name(1), None);
    }

    #[test]
    fn unknown_machines_render_as_hex() {
        assert_eq!(machine_name(0x1234), "<unknown>: 0x1234");
    }
}
