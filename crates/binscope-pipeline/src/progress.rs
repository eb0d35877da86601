//! Progress events and the sink interface.
//!
//! The pipeline reports its stages through a [`ProgressSink`]; transport is
//! the consumer's concern. Event types are the whole contract: a sequence
//! of `stage` events, then exactly one `results` or `error`.

use serde::{Deserialize, Serialize};

use crate::report::Report;

/// Pipeline stage identifiers, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageId {
    Upload,
    Detect,
    Headers,
    Sections,
    Disasm,
    Refs,
    Report,
}

impl StageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Upload => "upload",
            StageId::Detect => "detect",
            StageId::Headers => "headers",
            StageId::Sections => "sections",
            StageId::Disasm => "disasm",
            StageId::Refs => "refs",
            StageId::Report => "report",
        }
    }
}

/// Stage progress state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Running,
    Done,
    Error,
}

/// One progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    pub id: StageId,
    pub status: StageStatus,
    pub label: String,
    /// Stage-specific payload, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl StageEvent {
    pub fn running(id: StageId, label: impl Into<String>) -> Self {
        Self {
            id,
            status: StageStatus::Running,
            label: label.into(),
            result: None,
        }
    }

    pub fn done(id: StageId, label: impl Into<String>) -> Self {
        Self {
            id,
            status: StageStatus::Done,
            label: label.into(),
            result: None,
        }
    }

    pub fn done_with(id: StageId, label: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            id,
            status: StageStatus::Done,
            label: label.into(),
            result: Some(result),
        }
    }

    pub fn error(id: StageId, label: impl Into<String>) -> Self {
        Self {
            id,
            status: StageStatus::Error,
            label: label.into(),
            result: None,
        }
    }
}

/// Receiver for pipeline progress. The sink call between stages is also
/// the pipeline's cooperative yield point.
pub trait ProgressSink {
    /// A stage changed state.
    fn stage(&mut self, event: StageEvent);

    /// Terminal event: the finished report.
    fn results(&mut self, report: &Report);

    /// Terminal event: the pipeline failed at `stage`.
    fn error(&mut self, stage: StageId, message: &str);
}

/// A sink that discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn stage(&mut self, _event: StageEvent) {}
    fn results(&mut self, _report: &Report) {}
    fn error(&mut self, _stage: StageId, _message: &str) {}
}
