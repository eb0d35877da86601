//! ELF parsing.
//!
//! Handles both classes and both byte orders. Section names resolve through
//! the section-header string table; a missing or out-of-range name yields a
//! synthesized `section_i`.

pub mod header;
pub mod section;

use indexmap::IndexMap;

use crate::{Format, ParseError, ParsedBinary};
use binscope_core::SectionRecord;
use header::{machine_bits, machine_name, type_name, ElfClass, ElfData, Reader, ELF_MAGIC};
use section::RawSection;

/// ELF parser.
pub struct Elf;

impl Elf {
    /// Parses an ELF image into the uniform binary model.
    pub fn parse(data: &[u8]) -> Result<ParsedBinary, ParseError> {
        if data.len() < 16 {
            return Err(ParseError::too_small("ELF", 16, data.len()));
        }
        if data[0..4] != ELF_MAGIC {
            return Err(ParseError::invalid("ELF", "magic bytes missing"));
        }

        let class = match data[4] {
            1 => ElfClass::Elf32,
            2 => ElfClass::Elf64,
            other => {
                return Err(ParseError::invalid(
                    "ELF",
                    format!("unknown ei_class {}", other),
                ))
            }
        };
        let data_order = match data[5] {
            1 => ElfData::Little,
            2 => ElfData::Big,
            other => {
                return Err(ParseError::invalid(
                    "ELF",
                    format!("unknown ei_data {}", other),
                ))
            }
        };
        let reader = Reader { data_order };

        let e_type = read(reader.u16(data, 16), "e_type")?;
        let e_machine = read(reader.u16(data, 18), "e_machine")?;
        let e_entry = read(reader.addr(data, 24, class), "e_entry")?;
        let (shoff_at, tail_at) = match class {
            ElfClass::Elf32 => (32, 46),
            ElfClass::Elf64 => (40, 58),
        };
        let e_shoff = read(reader.addr(data, shoff_at, class), "e_shoff")?;
        let e_shentsize = read(reader.u16(data, tail_at), "e_shentsize")?;
        let e_shnum = read(reader.u16(data, tail_at + 2), "e_shnum")?;
        let e_shstrndx = read(reader.u16(data, tail_at + 4), "e_shstrndx")?;

        let mut raw_sections = Vec::with_capacity(e_shnum as usize);
        for i in 0..e_shnum as usize {
            let offset = e_shoff as usize + i * e_shentsize as usize;
            match RawSection::parse(data, offset, class, reader) {
                Some(raw) => raw_sections.push(raw),
                None => break,
            }
        }

        // Resolve names through the section-header string table.
        let strtab = raw_sections
            .get(e_shstrndx as usize)
            .and_then(|s| slice_range(data, s.sh_offset, s.sh_size));
        let sections: Vec<SectionRecord> = raw_sections
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                let name = strtab
                    .and_then(|tab| string_at(tab, raw.sh_name as usize))
                    .unwrap_or_else(|| format!("section_{}", i));
                raw.clone().into_record(name)
            })
            .collect();

        let arch = machine_name(e_machine);
        let bits = machine_bits(e_machine).unwrap_or(match class {
            ElfClass::Elf32 => 32,
            ElfClass::Elf64 => 64,
        });
        let type_desc = type_name(e_type);
        let endian = match data_order {
            ElfData::Little => "little-endian",
            ElfData::Big => "big-endian",
        };

        let mut info = IndexMap::new();
        info.insert("machine".into(), arch.clone());
        info.insert("type".into(), type_desc.clone());
        info.insert("endianness".into(), endian.into());
        info.insert("entry_point".into(), format!("{:#x}", e_entry));
        info.insert("section_headers".into(), e_shnum.to_string());
        info.insert("shstrndx".into(), e_shstrndx.to_string());

        let summary = format!(
            "ELF {} for {}, {}-bit {}, {} section(s)",
            type_desc, arch, bits, endian, e_shnum
        );

        Ok(ParsedBinary {
            format: Format::Elf,
            type_desc,
            arch,
            bits,
            entry_point: Some(e_entry),
            sections,
            info,
            summary,
        })
    }
}

fn read<T>(value: Option<T>, context: &'static str) -> Result<T, ParseError> {
    value.ok_or(ParseError::Truncated { context, offset: 0 })
}

fn slice_range(data: &[u8], offset: u64, size: u64) -> Option<&[u8]> {
    let start = usize::try_from(offset).ok()?;
    let len = usize::try_from(size).ok()?;
    data.get(start..start.checked_add(len)?)
}

/// NUL-terminated string at `offset` within the string table.
fn string_at(table: &[u8], offset: usize) -> Option<String> {
    let tail = table.get(offset..)?;
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    Some(String::from_utf8_lossy(&tail[..end]).to_string())
}
