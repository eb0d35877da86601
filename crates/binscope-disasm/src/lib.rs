//! # binscope-disasm
//!
//! Instruction decoding behind a pluggable seam. The [`DecoderAdapter`]
//! wraps any [`Decoder`] implementation, caps the work it will accept, and
//! substitutes a hex-dump framing whenever semantic decoding is unavailable
//! or fails. Callers see the same record shape either way.

pub mod adapter;
pub mod fallback;
pub mod x86;

pub use adapter::{DecoderAdapter, FakeDecoder, MAX_INPUT_BYTES, MAX_INSTRUCTIONS};
pub use fallback::hex_dump;
pub use x86::X86Decoder;

use binscope_core::Instruction;
use thiserror::Error;

/// Errors a decoder backend may report. The adapter never propagates these;
/// they select the fallback framing.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No decoder backend is available.
    #[error("decoder unavailable")]
    Unavailable,

    /// The backend failed part-way through.
    #[error("decode failed: {0}")]
    Failed(String),
}

/// A decoder backend: bytes + base address + bit width to an instruction
/// list. Implementations produce the canonical record shape (lowercase hex,
/// NASM-style operand text).
pub trait Decoder {
    fn decode(&self, bytes: &[u8], base_va: u64, bits: u32)
        -> Result<Vec<Instruction>, DecodeError>;
}

/// A decoded (or hex-framed) code listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Instruction records, in address order.
    pub instructions: Vec<Instruction>,
    /// True when the hex-dump framing was substituted.
    pub fallback: bool,
}
