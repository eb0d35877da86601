//! # binscope-pipeline
//!
//! Orchestration for the binscope analysis pipeline: the input-source and
//! progress-sink interfaces, the stage sequencing, and the immutable report
//! the consumer receives once analysis completes.

pub mod pipeline;
pub mod progress;
pub mod report;

pub use pipeline::{InputSource, Pipeline, PipelineError};
pub use progress::{NullSink, ProgressSink, StageEvent, StageId, StageStatus};
pub use report::{format_size, Analysis, DisasmInfo, FileInfo, Report, SectionSummary};
