//! PE (Portable Executable) parsing.
//!
//! Walks the DOS stub, COFF header, optional header, and section table, and
//! lowers the result into the uniform [`ParsedBinary`] model.

pub mod header;
pub mod section;

use chrono::{TimeZone, Utc};
use indexmap::IndexMap;

use crate::{Format, ParseError, ParsedBinary};
use header::{
    machine_name, read_u16, read_u32, read_u64, subsystem_name, DOS_MAGIC,
    IMAGE_FILE_DLL, IMAGE_FILE_EXECUTABLE_IMAGE, PE32PLUS_MAGIC, PE_SIGNATURE,
};
use section::{parse_section, SECTION_HEADER_SIZE};

/// PE parser.
pub struct Pe;

impl Pe {
    /// Parses a PE image into the uniform binary model.
    pub fn parse(data: &[u8]) -> Result<ParsedBinary, ParseError> {
        if data.len() < 0x40 {
            return Err(ParseError::too_small("PE", 0x40, data.len()));
        }
        if data[0..2] != DOS_MAGIC {
            return Err(ParseError::invalid("PE", "MZ signature missing"));
        }

        let e_lfanew = read_field(data, 0x3C, read_u32, "e_lfanew")? as usize;
        let pe_sig = data
            .get(e_lfanew..e_lfanew + 4)
            .ok_or(ParseError::Truncated {
                context: "PE signature",
                offset: e_lfanew as u64,
            })?;
        if pe_sig != PE_SIGNATURE {
            return Err(ParseError::invalid("PE", "PE signature missing"));
        }

        // COFF file header follows the signature.
        let coff = e_lfanew + 4;
        let machine = read_field(data, coff, read_u16, "COFF machine")?;
        let section_count = read_field(data, coff + 2, read_u16, "COFF section count")?;
        let timestamp = read_field(data, coff + 4, read_u32, "COFF timestamp")?;
        let opt_size = read_field(data, coff + 16, read_u16, "COFF optional-header size")?;
        let characteristics = read_field(data, coff + 18, read_u16, "COFF characteristics")?;

        let opt_base = coff + 20;
        let opt_magic = read_field(data, opt_base, read_u16, "optional-header magic")?;
        let is_pe32_plus = opt_magic == PE32PLUS_MAGIC;
        let bits = if is_pe32_plus { 64 } else { 32 };

        let entry_rva = read_field(data, opt_base + 16, read_u32, "entry point")? as u64;
        let base_of_code = read_field(data, opt_base + 20, read_u32, "base of code")? as u64;
        let image_base = if is_pe32_plus {
            read_field(data, opt_base + 24, read_u64, "image base")?
        } else {
            read_field(data, opt_base + 28, read_u32, "image base")? as u64
        };
        // Subsystem sits at +68 for PE32+; the same offset is read for PE32
        // to match the behaviour the report format was built against.
        let subsystem = read_field(data, opt_base + 68, read_u16, "subsystem")?;

        let table_base = opt_base + opt_size as usize;
        let mut sections = Vec::with_capacity(section_count as usize);
        for i in 0..section_count as usize {
            let offset = table_base + i * SECTION_HEADER_SIZE;
            match parse_section(data, offset, i) {
                Some(sec) => sections.push(sec),
                None => break,
            }
        }

        let type_desc = if characteristics & IMAGE_FILE_DLL != 0 {
            "DLL"
        } else if characteristics & IMAGE_FILE_EXECUTABLE_IMAGE != 0 {
            "EXE"
        } else {
            "OBJ"
        };
        let arch = machine_name(machine);
        let entry_point = image_base.wrapping_add(entry_rva);

        let mut info = IndexMap::new();
        info.insert("machine".into(), arch.clone());
        info.insert("type".into(), type_desc.into());
        info.insert("timestamp".into(), format_timestamp(timestamp));
        info.insert("subsystem".into(), subsystem_name(subsystem));
        info.insert("image_base".into(), format!("{:#x}", image_base));
        info.insert("entry_point".into(), format!("{:#x}", entry_point));
        info.insert("base_of_code".into(), format!("{:#x}", base_of_code));
        info.insert("sections".into(), section_count.to_string());

        let summary = format!(
            "PE {} for {}, {}-bit, {} section(s)",
            type_desc, arch, bits, section_count
        );

        Ok(ParsedBinary {
            format: Format::Pe,
            type_desc: type_desc.into(),
            arch,
            bits,
            entry_point: Some(entry_point),
            sections,
            info,
            summary,
        })
    }
}

fn read_field<T>(
    data: &[u8],
    offset: usize,
    read: impl Fn(&[u8], usize) -> Option<T>,
    context: &'static str,
) -> Result<T, ParseError> {
    read(data, offset).ok_or(ParseError::Truncated {
        context,
        offset: offset as u64,
    })
}

/// Renders a COFF timestamp as `YYYY-MM-DD HH:MM:SS UTC`.
fn format_timestamp(timestamp: u32) -> String {
    match Utc.timestamp_opt(timestamp as i64, 0).single() {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("{:#x}", timestamp),
    }
}
