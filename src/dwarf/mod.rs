//! Decoding of DWARF version 2 debugging information, stored in the
//! ".debug_FOO" ELF sections: ".debug_abbrev", ".debug_info", ".debug_line",
//! ".debug_aranges", and ".debug_pubnames". The format is documented at
//! https://dwarfstd.org/doc/dwarf-2.0.0.pdf; the readelf source at
//! https://github.com/bminor/binutils-gdb/tree/master/binutils is also
//! useful.
use crate::elf::Stream;
use crate::error::DecodeError;

pub mod abbrev;
pub mod info;
pub mod line;
pub mod ranges;

pub use abbrev::*;

/// A DIE's kind, e.g. a compile unit, a function, or a type.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)] // figure 16
pub enum Tag {
    //                                value
    DW_TAG_array_type,             // 0x01
    DW_TAG_class_type,             // 0x02
    DW_TAG_entry_point,            // 0x03
    DW_TAG_enumeration_type,       // 0x04
    DW_TAG_formal_parameter,       // 0x05
    DW_TAG_imported_declaration,   // 0x08
    DW_TAG_label,                  // 0x0a
    DW_TAG_lexical_block,          // 0x0b
    DW_TAG_member,                 // 0x0d
    DW_TAG_pointer_type,           // 0x0f
    DW_TAG_reference_type,         // 0x10
    DW_TAG_compile_unit,           // 0x11
    DW_TAG_string_type,            // 0x12
    DW_TAG_structure_type,         // 0x13
    DW_TAG_subroutine_type,        // 0x15
    DW_TAG_typedef,                // 0x16
    DW_TAG_union_type,             // 0x17
    DW_TAG_unspecified_parameters, // 0x18
    DW_TAG_variant,                // 0x19
    DW_TAG_common_block,           // 0x1a
    DW_TAG_common_inclusion,       // 0x1b
    DW_TAG_inheritance,            // 0x1c
    DW_TAG_inlined_subroutine,     // 0x1d
    DW_TAG_module,                 // 0x1e
    DW_TAG_ptr_to_member_type,     // 0x1f
    DW_TAG_set_type,               // 0x20
    DW_TAG_subrange_type,          // 0x21
    DW_TAG_with_stmt,              // 0x22
    DW_TAG_access_declaration,     // 0x23
    DW_TAG_base_type,              // 0x24
    DW_TAG_catch_block,            // 0x25
    DW_TAG_const_type,             // 0x26
    DW_TAG_constant,               // 0x27
    DW_TAG_enumerator,             // 0x28
    DW_TAG_file_type,              // 0x29
    DW_TAG_friend,                 // 0x2a
    DW_TAG_namelist,               // 0x2b
    DW_TAG_namelist_item,          // 0x2c
    DW_TAG_packed_type,            // 0x2d
    DW_TAG_subprogram,             // 0x2e
    DW_TAG_template_type_param,    // 0x2f
    DW_TAG_template_value_param,   // 0x30
    DW_TAG_thrown_type,            // 0x31
    DW_TAG_try_block,              // 0x32
    DW_TAG_variant_part,           // 0x33
    DW_TAG_variable,               // 0x34
    DW_TAG_volatile_type,          // 0x35
    DW_TAG_user(u64),              // [0x4080, 0xffff]
    Unknown(u64),
}

impl Tag {
    /// Unknown tags are kept, not rejected: the abbreviation still tells us
    /// how to skip the DIE's attributes.
    pub fn from_u64(value: u64) -> Self {
        match value {
            0x01 => Tag::DW_TAG_array_type,
            0x02 => Tag::DW_TAG_class_type,
            0x03 => Tag::DW_TAG_entry_point,
            0x04 => Tag::DW_TAG_enumeration_type,
            0x05 => Tag::DW_TAG_formal_parameter,
            0x08 => Tag::DW_TAG_imported_declaration,
            0x0a => Tag::DW_TAG_label,
            0x0b => Tag::DW_TAG_lexical_block,
            0x0d => Tag::DW_TAG_member,
            0x0f => Tag::DW_TAG_pointer_type,
            0x10 => Tag::DW_TAG_reference_type,
            0x11 => Tag::DW_TAG_compile_unit,
            0x12 => Tag::DW_TAG_string_type,
            0x13 => Tag::DW_TAG_structure_type,
            0x15 => Tag::DW_TAG_subroutine_type,
            0x16 => Tag::DW_TAG_typedef,
            0x17 => Tag::DW_TAG_union_type,
            0x18 => Tag::DW_TAG_unspecified_parameters,
            0x19 => Tag::DW_TAG_variant,
            0x1a => Tag::DW_TAG_common_block,
            0x1b => Tag::DW_TAG_common_inclusion,
            0x1c => Tag::DW_TAG_inheritance,
            0x1d => Tag::DW_TAG_inlined_subroutine,
            0x1e => Tag::DW_TAG_module,
            0x1f => Tag::DW_TAG_ptr_to_member_type,
            0x20 => Tag::DW_TAG_set_type,
            0x21 => Tag::DW_TAG_subrange_type,
            0x22 => Tag::DW_TAG_with_stmt,
            0x23 => Tag::DW_TAG_access_declaration,
            0x24 => Tag::DW_TAG_base_type,
            0x25 => Tag::DW_TAG_catch_block,
            0x26 => Tag::DW_TAG_const_type,
            0x27 => Tag::DW_TAG_constant,
            0x28 => Tag::DW_TAG_enumerator,
            0x29 => Tag::DW_TAG_file_type,
            0x2a => Tag::DW_TAG_friend,
            0x2b => Tag::DW_TAG_namelist,
            0x2c => Tag::DW_TAG_namelist_item,
            0x2d => Tag::DW_TAG_packed_type,
            0x2e => Tag::DW_TAG_subprogram,
            0x2f => Tag::DW_TAG_template_type_param,
            0x30 => Tag::DW_TAG_template_value_param,
            0x31 => Tag::DW_TAG_thrown_type,
            0x32 => Tag::DW_TAG_try_block,
            0x33 => Tag::DW_TAG_variant_part,
            0x34 => Tag::DW_TAG_variable,
            0x35 => Tag::DW_TAG_volatile_type,
            0x4080..=0xffff => Tag::DW_TAG_user(value),
            _ => Tag::Unknown(value),
        }
    }

    pub fn text(&self) -> String {
        match self {
            Tag::DW_TAG_user(value) => format!("DW_TAG_user: {value:#x}"),
            Tag::Unknown(value) => format!("unknown tag value: {value:#x}"),
            _ => format!("{self:?}"),
        }
    }
}

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)] // figure 17
pub enum AttributeName {
    //                             value & class
    DW_AT_sibling,              // 0x01 reference
    DW_AT_location,             // 0x02 block, constant
    DW_AT_name,                 // 0x03 string
    DW_AT_ordering,             // 0x09 constant
    DW_AT_byte_size,            // 0x0b constant
    DW_AT_bit_offset,           // 0x0c constant
    DW_AT_bit_size,             // 0x0d constant
    DW_AT_stmt_list,            // 0x10 constant
    DW_AT_low_pc,               // 0x11 address
    DW_AT_high_pc,              // 0x12 address
    DW_AT_language,             // 0x13 constant
    DW_AT_discr,                // 0x15 reference
    DW_AT_discr_value,          // 0x16 constant
    DW_AT_visibility,           // 0x17 constant
    DW_AT_import,               // 0x18 reference
    DW_AT_string_length,        // 0x19 block, constant
    DW_AT_common_reference,     // 0x1a reference
    DW_AT_comp_dir,             // 0x1b string
    DW_AT_const_value,          // 0x1c string, constant, block
    DW_AT_containing_type,      // 0x1d reference
    DW_AT_default_value,        // 0x1e reference
    DW_AT_inline,               // 0x20 constant
    DW_AT_is_optional,          // 0x21 flag
    DW_AT_lower_bound,          // 0x22 constant, reference
    DW_AT_producer,             // 0x25 string
    DW_AT_prototyped,           // 0x27 flag
    DW_AT_return_addr,          // 0x2a block, constant
    DW_AT_start_scope,          // 0x2c constant
    DW_AT_stride_size,          // 0x2e constant
    DW_AT_upper_bound,          // 0x2f constant, reference
    DW_AT_abstract_origin,      // 0x31 reference
    DW_AT_accessibility,        // 0x32 constant
    DW_AT_address_class,        // 0x33 constant
    DW_AT_artificial,           // 0x34 flag
    DW_AT_base_types,           // 0x35 reference
    DW_AT_calling_convention,   // 0x36 constant
    DW_AT_count,                // 0x37 constant, reference
    DW_AT_data_member_location, // 0x38 block, reference
    DW_AT_decl_column,          // 0x39 constant
    DW_AT_decl_file,            // 0x3a constant
    DW_AT_decl_line,            // 0x3b constant
    DW_AT_declaration,          // 0x3c flag
    DW_AT_discr_list,           // 0x3d block
    DW_AT_encoding,             // 0x3e constant
    DW_AT_external,             // 0x3f flag
    DW_AT_frame_base,           // 0x40 block, constant
    DW_AT_friend,               // 0x41 reference
    DW_AT_identifier_case,      // 0x42 constant
    DW_AT_macro_info,           // 0x43 constant
    DW_AT_namelist_item,        // 0x44 block
    DW_AT_priority,             // 0x45 reference
    DW_AT_segment,              // 0x46 block, constant
    DW_AT_specification,        // 0x47 reference
    DW_AT_static_link,          // 0x48 block, constant
    DW_AT_type,                 // 0x49 reference
    DW_AT_use_location,         // 0x4a block, constant
    DW_AT_variable_parameter,   // 0x4b flag
    DW_AT_virtuality,           // 0x4c constant
    DW_AT_vtable_elem_location, // 0x4d block, reference
    DW_AT_user(u64),            // [0x2000, 0x3fff]
    Unknown(u64),
}

impl AttributeName {
    pub fn from_u64(value: u64) -> Self {
        match value {
            0x01 => AttributeName::DW_AT_sibling,
            0x02 => AttributeName::DW_AT_location,
            0x03 => AttributeName::DW_AT_name,
            0x09 => AttributeName::DW_AT_ordering,
            0x0b => AttributeName::DW_AT_byte_size,
            0x0c => AttributeName::DW_AT_bit_offset,
            0x0d => AttributeName::DW_AT_bit_size,
            0x10 => AttributeName::DW_AT_stmt_list,
            0x11 => AttributeName::DW_AT_low_pc,
            0x12 => AttributeName::DW_AT_high_pc,
            0x13 => AttributeName::DW_AT_language,
            0x15 => AttributeName::DW_AT_discr,
            0x16 => AttributeName::DW_AT_discr_value,
            0x17 => AttributeName::DW_AT_visibility,
            0x18 => AttributeName::DW_AT_import,
            0x19 => AttributeName::DW_AT_string_length,
            0x1a => AttributeName::DW_AT_common_reference,
            0x1b => AttributeName::DW_AT_comp_dir,
            0x1c => AttributeName::DW_AT_const_value,
            0x1d => AttributeName::DW_AT_containing_type,
            0x1e => AttributeName::DW_AT_default_value,
            0x20 => AttributeName::DW_AT_inline,
            0x21 => AttributeName::DW_AT_is_optional,
            0x22 => AttributeName::DW_AT_lower_bound,
            0x25 => AttributeName::DW_AT_producer,
            0x27 => AttributeName::DW_AT_prototyped,
            0x2a => AttributeName::DW_AT_return_addr,
            0x2c => AttributeName::DW_AT_start_scope,
            0x2e => AttributeName::DW_AT_stride_size,
            0x2f => AttributeName::DW_AT_upper_bound,
            0x31 => AttributeName::DW_AT_abstract_origin,
            0x32 => AttributeName::DW_AT_accessibility,
            0x33 => AttributeName::DW_AT_address_class,
            0x34 => AttributeName::DW_AT_artificial,
            0x35 => AttributeName::DW_AT_base_types,
            0x36 => AttributeName::DW_AT_calling_convention,
            0x37 => AttributeName::DW_AT_count,
            0x38 => AttributeName::DW_AT_data_member_location,
            0x39 => AttributeName::DW_AT_decl_column,
            0x3a => AttributeName::DW_AT_decl_file,
            0x3b => AttributeName::DW_AT_decl_line,
            0x3c => AttributeName::DW_AT_declaration,
            0x3d => AttributeName::DW_AT_discr_list,
            0x3e => AttributeName::DW_AT_encoding,
            0x3f => AttributeName::DW_AT_external,
            0x40 => AttributeName::DW_AT_frame_base,
            0x41 => AttributeName::DW_AT_friend,
            0x42 => AttributeName::DW_AT_identifier_case,
            0x43 => AttributeName::DW_AT_macro_info,
            0x44 => AttributeName::DW_AT_namelist_item,
            0x45 => AttributeName::DW_AT_priority,
            0x46 => AttributeName::DW_AT_segment,
            0x47 => AttributeName::DW_AT_specification,
            0x48 => AttributeName::DW_AT_static_link,
            0x49 => AttributeName::DW_AT_type,
            0x4a => AttributeName::DW_AT_use_location,
            0x4b => AttributeName::DW_AT_variable_parameter,
            0x4c => AttributeName::DW_AT_virtuality,
            0x4d => AttributeName::DW_AT_vtable_elem_location,
            0x2000..=0x3fff => AttributeName::DW_AT_user(value),
            _ => AttributeName::Unknown(value),
        }
    }

    pub fn text(&self) -> String {
        match self {
            AttributeName::DW_AT_user(value) => format!("DW_AT_user: {value:#x}"),
            AttributeName::Unknown(value) => format!("unknown AT value: {value:#x}"),
            _ => format!("{self:?}"),
        }
    }
}

/// How an attribute's value is encoded. Unlike tags and attribute names an
/// unknown form cannot be skipped over: the form is the only thing that says
/// how many bytes the value occupies, so an unknown one ends the unit.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)] // section 7.5.4
pub enum FormEncoding {
    //                   value & class
    DW_FORM_addr,      // 0x01 address
    DW_FORM_block2,    // 0x03 block
    DW_FORM_block4,    // 0x04 block
    DW_FORM_data2,     // 0x05 constant
    DW_FORM_data4,     // 0x06 constant
    DW_FORM_data8,     // 0x07 constant
    DW_FORM_string,    // 0x08 string
    DW_FORM_block,     // 0x09 block
    DW_FORM_block1,    // 0x0a block
    DW_FORM_data1,     // 0x0b constant
    DW_FORM_flag,      // 0x0c flag
    DW_FORM_sdata,     // 0x0d constant
    DW_FORM_strp,      // 0x0e string
    DW_FORM_udata,     // 0x0f constant
    DW_FORM_ref_addr,  // 0x10 reference
    DW_FORM_ref1,      // 0x11 reference
    DW_FORM_ref2,      // 0x12 reference
    DW_FORM_ref4,      // 0x13 reference
    DW_FORM_ref8,      // 0x14 reference
    DW_FORM_ref_udata, // 0x15 reference
    DW_FORM_indirect,  // 0x16 (form is stored with the value)
}

impl FormEncoding {
    pub fn from_u64(value: u64) -> Result<Self, DecodeError> {
        match value {
            0x01 => Ok(FormEncoding::DW_FORM_addr),
            0x03 => Ok(FormEncoding::DW_FORM_block2),
            0x04 => Ok(FormEncoding::DW_FORM_block4),
            0x05 => Ok(FormEncoding::DW_FORM_data2),
            0x06 => Ok(FormEncoding::DW_FORM_data4),
            0x07 => Ok(FormEncoding::DW_FORM_data8),
            0x08 => Ok(FormEncoding::DW_FORM_string),
            0x09 => Ok(FormEncoding::DW_FORM_block),
            0x0a => Ok(FormEncoding::DW_FORM_block1),
            0x0b => Ok(FormEncoding::DW_FORM_data1),
            0x0c => Ok(FormEncoding::DW_FORM_flag),
            0x0d => Ok(FormEncoding::DW_FORM_sdata),
            0x0e => Ok(FormEncoding::DW_FORM_strp),
            0x0f => Ok(FormEncoding::DW_FORM_udata),
            0x10 => Ok(FormEncoding::DW_FORM_ref_addr),
            0x11 => Ok(FormEncoding::DW_FORM_ref1),
            0x12 => Ok(FormEncoding::DW_FORM_ref2),
            0x13 => Ok(FormEncoding::DW_FORM_ref4),
            0x14 => Ok(FormEncoding::DW_FORM_ref8),
            0x15 => Ok(FormEncoding::DW_FORM_ref_udata),
            0x16 => Ok(FormEncoding::DW_FORM_indirect),
            _ => Err(DecodeError::Structural(format!("unknown form encoding: {value:#x}"))),
        }
    }
}

/// Unsigned LEB128: seven value bits per byte, low bits first, high bit set
/// on every byte but the last.
pub fn decode_u64(stream: &mut Stream) -> Result<u64, DecodeError> {
    let mut result = 0;
    let mut shift = 0;
    loop {
        let byte = stream.read_byte()? as u64;
        if shift >= 64 {
            return Err(DecodeError::Structural("LEB128 value is too large".to_string()));
        }
        result |= (byte & 0x7f) << shift;
        if (byte & 0x80) == 0 {
            break;
        }
        shift += 7;
    }
    Ok(result)
}

/// Signed LEB128: same shape, but bit 6 of the last byte is the sign and
/// must be extended through the remaining high bits.
pub fn decode_i64(stream: &mut Stream) -> Result<i64, DecodeError> {
    let mut result: u64 = 0;
    let mut shift = 0;
    loop {
        let byte = stream.read_byte()? as u64;
        if shift >= 64 {
            return Err(DecodeError::Structural("LEB128 value is too large".to_string()));
        }
        result |= (byte & 0x7f) << shift;
        shift += 7;
        if (byte & 0x80) == 0 {
            if shift < 64 && (byte & 0x40) != 0 {
                result |= !0u64 << shift;
            }
            break;
        }
    }
    Ok(result as i64)
}
