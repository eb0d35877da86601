//! # binscope-formats
//!
//! Binary format detection and header parsers for binscope:
//! - magic-byte classification into PE / ELF / Mach-O / Java class / raw
//! - PE (DOS, COFF, optional header, section table)
//! - ELF (32/64, both byte orders, section headers, string table)
//!
//! Both parsers lower their native section headers into the uniform
//! [`SectionRecord`](binscope_core::SectionRecord); nothing downstream sees
//! format-specific structures.

pub mod elf;
pub mod error;
pub mod pe;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use binscope_core::SectionRecord;

pub use elf::Elf;
pub use error::ParseError;
pub use pe::Pe;

/// Detected binary format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Format {
    Pe,
    Elf,
    MachO32,
    MachO64,
    MachOFat,
    JavaClass,
    Raw,
}

impl Format {
    /// Human description of the format.
    pub fn description(&self) -> &'static str {
        match self {
            Format::Pe => "PE (Windows executable)",
            Format::Elf => "ELF (Linux/Unix executable)",
            Format::MachO32 => "Mach-O 32-bit (macOS)",
            Format::MachO64 => "Mach-O 64-bit (macOS)",
            Format::MachOFat => "Mach-O universal binary (macOS)",
            Format::JavaClass => "Java class file",
            Format::Raw => "raw binary",
        }
    }

    /// Short tag used in the report's `file.format` field.
    pub fn tag(&self) -> &'static str {
        match self {
            Format::Pe => "PE",
            Format::Elf => "ELF",
            Format::MachO32 => "Mach-O 32",
            Format::MachO64 => "Mach-O 64",
            Format::MachOFat => "Mach-O fat",
            Format::JavaClass => "Java class",
            Format::Raw => "Raw",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Result of magic-byte classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub format: Format,
    pub description: String,
}

/// Classifies a buffer by its magic bytes.
///
/// The check order is part of the contract: MZ before ELF before the 32-bit
/// magic comparisons, and Mach-O before Java class, so `CA FE BA BE` always
/// classifies as a fat Mach-O. The [`Format::JavaClass`] variant survives for
/// display but is never produced here.
pub fn detect(data: &[u8]) -> Detection {
    if data.len() < 4 {
        return Detection {
            format: Format::Raw,
            description: "raw binary (too small)".into(),
        };
    }

    if data[0..2] == [0x4D, 0x5A] {
        return detection(Format::Pe);
    }

    if data[0..4] == [0x7F, b'E', b'L', b'F'] {
        return detection(Format::Elf);
    }

    let magic = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    match magic {
        0xFEED_FACE | 0xCEFA_EDFE => detection(Format::MachO32),
        0xFEED_FACF | 0xCFFA_EDFE => detection(Format::MachO64),
        0xCAFE_BABE => detection(Format::MachOFat),
        _ => detection(Format::Raw),
    }
}

fn detection(format: Format) -> Detection {
    Detection {
        format,
        description: format.description().into(),
    }
}

/// A binary lowered to the uniform model every downstream stage consumes.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedBinary {
    /// Detected format tag.
    pub format: Format,
    /// File-type description (EXE/DLL/OBJ, ET_EXEC, ...).
    pub type_desc: String,
    /// Architecture label (AMD64, x86, AArch64, ...).
    pub arch: String,
    /// Word width: 16, 32, or 64.
    pub bits: u32,
    /// Entry point virtual address, when the format carries one.
    pub entry_point: Option<u64>,
    /// Sections in table order.
    pub sections: Vec<SectionRecord>,
    /// Display facts in insertion order.
    pub info: IndexMap<String, String>,
    /// One-line human summary.
    pub summary: String,
}

impl ParsedBinary {
    /// A pass-through binary for formats without a header parser: the whole
    /// buffer becomes one synthetic code section so the disassembly stage
    /// still has something to frame.
    pub fn pass_through(format: Format, len: usize) -> Self {
        let bits = match format {
            Format::MachO64 => 64,
            _ => 32,
        };
        let section = SectionRecord {
            name: "raw".into(),
            virtual_address: 0,
            virtual_size: len as u64,
            raw_offset: 0,
            raw_size: len as u64,
            flags: 0,
            flags_str: String::new(),
            type_str: "RAW".into(),
            is_code: true,
        };
        let mut info = IndexMap::new();
        info.insert("size".into(), len.to_string());
        Self {
            format,
            type_desc: format.description().into(),
            arch: "unknown".into(),
            bits,
            entry_point: None,
            sections: vec![section],
            info,
            summary: format!("{}, {} bytes", format.description(), len),
        }
    }

    /// First section suitable for disassembly: the first executable section
    /// with raw bytes, else the first section with raw bytes at all.
    pub fn primary_code_section(&self) -> Option<&SectionRecord> {
        self.sections
            .iter()
            .find(|s| s.is_code && s.raw_size > 0)
            .or_else(|| self.sections.iter().find(|s| s.raw_size > 0))
    }
}
