//! The analysis pipeline.
//!
//! Drives detection, header parsing, disassembly, and the static analyses
//! over one input buffer, emitting stage events as it goes and assembling
//! the immutable report. Parser failures stop the pipeline at the
//! `headers` stage; decoding problems degrade to the hex-dump fallback and
//! are not errors.

use serde_json::json;
use thiserror::Error;

use binscope_analysis::{build_xrefs, detect_functions, scan_signatures};
use binscope_core::format_addr;
use binscope_disasm::{DecoderAdapter, Listing};
use binscope_formats::{detect, Elf, Format, ParseError, ParsedBinary, Pe};

use crate::progress::{ProgressSink, StageEvent, StageId};
use crate::report::{Analysis, DisasmInfo, Report, SectionSummary};

/// Why an analysis run stopped without a report.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Header parsing failed; surfaced at the `headers` stage.
    #[error("header parsing failed: {0}")]
    Headers(#[from] ParseError),
}

/// The input buffer plus its original name.
#[derive(Debug, Clone)]
pub struct InputSource {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl InputSource {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// The pipeline orchestrator.
pub struct Pipeline {
    adapter: DecoderAdapter,
}

impl Pipeline {
    /// A pipeline using the built-in x86 decoder.
    pub fn new() -> Self {
        Self {
            adapter: DecoderAdapter::new(),
        }
    }

    /// A pipeline over a caller-chosen decoder adapter (hex-dump-only, or a
    /// fake decoder in tests).
    pub fn with_adapter(adapter: DecoderAdapter) -> Self {
        Self { adapter }
    }

    /// Runs every stage over `input`, reporting progress to `sink`.
    ///
    /// Produces exactly one of: a complete report (also handed to the sink
    /// as the terminal `results` event) or an error identifying the failed
    /// stage. The input buffer is dropped when this returns.
    pub fn analyze(
        &self,
        input: InputSource,
        sink: &mut dyn ProgressSink,
    ) -> Result<Report, PipelineError> {
        let size = input.size();

        sink.stage(StageEvent::done_with(
            StageId::Upload,
            format!("received {}", input.name),
            json!({ "name": input.name, "size": size }),
        ));

        sink.stage(StageEvent::running(StageId::Detect, "detecting format"));
        let detection = detect(&input.bytes);
        sink.stage(StageEvent::done(StageId::Detect, detection.description.clone()));

        sink.stage(StageEvent::running(StageId::Headers, "parsing headers"));
        let parsed = match self.parse_headers(detection.format, &input.bytes) {
            Ok(parsed) => parsed,
            Err(err) => {
                let message = err.to_string();
                sink.stage(StageEvent::error(StageId::Headers, message.clone()));
                sink.error(StageId::Headers, &message);
                return Err(err.into());
            }
        };
        sink.stage(StageEvent::done(StageId::Headers, parsed.summary.clone()));

        sink.stage(StageEvent::running(StageId::Sections, "reading section table"));
        sink.stage(StageEvent::done_with(
            StageId::Sections,
            format!("{} section(s)", parsed.sections.len()),
            json!({ "count": parsed.sections.len() }),
        ));

        sink.stage(StageEvent::running(StageId::Disasm, "disassembling"));
        let (section_name, base_va, code) = match parsed.primary_code_section() {
            Some(section) => (
                section.name.clone(),
                section.virtual_address,
                section.raw_range(&input.bytes).unwrap_or(&[]).to_vec(),
            ),
            None => (String::new(), 0, Vec::new()),
        };
        let listing = if code.is_empty() {
            Listing {
                instructions: Vec::new(),
                fallback: true,
            }
        } else {
            self.adapter.decode(&code, base_va, parsed.bits)
        };
        let disasm_label = if listing.fallback {
            format!("hex view of {} ({} rows)", section_name, listing.instructions.len())
        } else {
            format!(
                "{} instruction(s) in {}",
                listing.instructions.len(),
                section_name
            )
        };
        sink.stage(StageEvent::done(StageId::Disasm, disasm_label));

        sink.stage(StageEvent::running(StageId::Refs, "resolving references"));
        let xrefs = build_xrefs(&listing.instructions, parsed.bits);
        let func_labels = detect_functions(&listing.instructions);
        let byte_sigs = scan_signatures(&code, base_va, parsed.bits);
        sink.stage(StageEvent::done_with(
            StageId::Refs,
            format!(
                "{} target(s), {} function(s), {} signature hit(s)",
                xrefs.len(),
                func_labels.len(),
                byte_sigs.len()
            ),
            json!({
                "xrefs": xrefs.len(),
                "functions": func_labels.len(),
                "signatures": byte_sigs.len(),
            }),
        ));

        sink.stage(StageEvent::running(StageId::Report, "assembling report"));
        let report = Report {
            file: Report::file_info(&input.name, size, &parsed),
            sections: parsed
                .sections
                .iter()
                .map(|s| SectionSummary::from_record(s, parsed.bits))
                .collect(),
            disasm: DisasmInfo {
                section: section_name,
                fallback: listing.fallback,
                instructions: listing.instructions,
                base_va: format_addr(base_va, parsed.bits),
            },
            analysis: Analysis {
                xrefs,
                func_labels,
                byte_sigs,
            },
        };
        sink.stage(StageEvent::done(StageId::Report, "report ready"));
        sink.results(&report);

        Ok(report)
    }

    fn parse_headers(&self, format: Format, bytes: &[u8]) -> Result<ParsedBinary, ParseError> {
        match format {
            Format::Pe => Pe::parse(bytes),
            Format::Elf => Elf::parse(bytes),
            other => Ok(ParsedBinary::pass_through(other, bytes.len())),
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
