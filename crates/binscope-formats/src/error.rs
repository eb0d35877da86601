//! Error types for binary format parsing.

use thiserror::Error;

/// Error type for binary format parsing.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Magic bytes absent or an impossible field value.
    #[error("invalid {format} image: {reason}")]
    InvalidFormat {
        format: &'static str,
        reason: String,
    },

    /// Buffer shorter than a required fixed-size header prefix.
    #[error("{format} image too small: expected at least {expected} bytes, got {actual}")]
    TooSmall {
        format: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A structure points past the end of the buffer.
    #[error("truncated {context} at offset {offset:#x}")]
    Truncated { context: &'static str, offset: u64 },
}

impl ParseError {
    /// Creates a new InvalidFormat error.
    pub fn invalid(format: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            format,
            reason: reason.into(),
        }
    }

    /// Creates a new TooSmall error.
    pub fn too_small(format: &'static str, expected: usize, actual: usize) -> Self {
        Self::TooSmall {
            format,
            expected,
            actual,
        }
    }
}
