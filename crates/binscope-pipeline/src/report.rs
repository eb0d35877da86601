//! The immutable analysis report.
//!
//! Produced once by the pipeline, then shared by reference; consumers treat
//! it as an opaque serialisable value. Every address is lowercase `0x` hex
//! zero-padded to the architecture's nibble count.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Serialize;

use binscope_analysis::{SignatureHit, Xref};
use binscope_core::{format_addr, Instruction, SectionRecord};
use binscope_formats::ParsedBinary;

/// The complete analysis result.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub file: FileInfo,
    pub sections: Vec<SectionSummary>,
    pub disasm: DisasmInfo,
    pub analysis: Analysis,
}

/// Header facts plus file metadata.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub size_str: String,
    pub format: String,
    #[serde(rename = "type")]
    pub type_desc: String,
    pub arch: String,
    pub bits: u32,
    #[serde(flatten)]
    pub info: IndexMap<String, String>,
}

/// One section row of the report.
#[derive(Debug, Clone, Serialize)]
pub struct SectionSummary {
    pub name: String,
    pub virtual_address: String,
    pub size: u64,
    pub raw_size: u64,
    pub flags: String,
    pub is_code: bool,
    #[serde(rename = "type")]
    pub type_str: String,
}

impl SectionSummary {
    pub fn from_record(record: &SectionRecord, bits: u32) -> Self {
        Self {
            name: record.name.clone(),
            virtual_address: format_addr(record.virtual_address, bits),
            size: record.virtual_size,
            raw_size: record.raw_size,
            flags: record.flags_str.clone(),
            is_code: record.is_code,
            type_str: record.type_str.clone(),
        }
    }
}

/// The disassembly listing of the primary code section.
#[derive(Debug, Clone, Serialize)]
pub struct DisasmInfo {
    pub section: String,
    pub fallback: bool,
    pub instructions: Vec<Instruction>,
    pub base_va: String,
}

/// The static-analysis results.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub xrefs: BTreeMap<String, Vec<Xref>>,
    pub func_labels: BTreeMap<String, String>,
    pub byte_sigs: Vec<SignatureHit>,
}

impl Report {
    /// Assembles the file facts from a parsed binary, keeping the display
    /// map free of keys the report carries as first-class fields.
    pub fn file_info(name: &str, size: u64, parsed: &ParsedBinary) -> FileInfo {
        let info: IndexMap<String, String> = parsed
            .info
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "type" | "machine"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        FileInfo {
            name: name.to_string(),
            size,
            size_str: format_size(size),
            format: parsed.format.tag().to_string(),
            type_desc: parsed.type_desc.clone(),
            arch: parsed.arch.clone(),
            bits: parsed.bits,
            info,
        }
    }
}

/// Humanizes a byte count: `640 bytes`, `4.0 KiB`, `1.2 MiB`.
pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{} bytes", bytes)
    } else if b < KIB * KIB {
        format!("{:.1} KiB", b / KIB)
    } else if b < KIB * KIB * KIB {
        format!("{:.1} MiB", b / (KIB * KIB))
    } else {
        format!("{:.1} GiB", b / (KIB * KIB * KIB))
    }
}
