//! The capped, fallback-aware decoder adapter.

use std::panic::{catch_unwind, AssertUnwindSafe};

use binscope_core::Instruction;

use crate::fallback::hex_dump;
use crate::x86::X86Decoder;
use crate::{DecodeError, Decoder, Listing};

/// Input cap: decoding stops after this many bytes.
pub const MAX_INPUT_BYTES: usize = 2 * 1024 * 1024;

/// Instruction-count cap per listing.
pub const MAX_INSTRUCTIONS: usize = 10_000;

/// Wraps a decoder backend, enforcing resource caps and substituting the
/// hex-dump framing when decoding is unavailable or fails. Neither decoder
/// errors nor decoder panics propagate past this type.
pub struct DecoderAdapter {
    backend: Option<Box<dyn Decoder + Send + Sync>>,
}

impl DecoderAdapter {
    /// Adapter over the built-in x86/x86-64 decoder.
    pub fn new() -> Self {
        Self {
            backend: Some(Box::new(X86Decoder)),
        }
    }

    /// Adapter over a caller-supplied backend (tests inject fakes here).
    pub fn with_backend(backend: Box<dyn Decoder + Send + Sync>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Adapter with no backend: every listing is the hex-dump framing.
    pub fn fallback_only() -> Self {
        Self { backend: None }
    }

    /// Decodes `bytes` at `base_va`. Bit widths other than 16/32/64 clamp
    /// to 32. The result is capped and never an error.
    pub fn decode(&self, bytes: &[u8], base_va: u64, bits: u32) -> Listing {
        let bits = match bits {
            16 | 32 | 64 => bits,
            _ => 32,
        };
        let input = &bytes[..bytes.len().min(MAX_INPUT_BYTES)];

        match &self.backend {
            Some(backend) => {
                // A panicking backend degrades to the fallback exactly like
                // one that reports an error.
                let decoded =
                    catch_unwind(AssertUnwindSafe(|| backend.decode(input, base_va, bits)));
                match decoded {
                    Ok(Ok(mut instructions)) => {
                        instructions.truncate(MAX_INSTRUCTIONS);
                        Listing {
                            instructions,
                            fallback: false,
                        }
                    }
                    Ok(Err(_)) | Err(_) => self.frame(input, base_va),
                }
            }
            None => self.frame(input, base_va),
        }
    }

    fn frame(&self, bytes: &[u8], base_va: u64) -> Listing {
        Listing {
            instructions: hex_dump(bytes, base_va),
            fallback: true,
        }
    }
}

impl Default for DecoderAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DecoderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderAdapter")
            .field("backend", &self.backend.is_some())
            .finish()
    }
}

/// A deterministic fake backend for tests: returns a fixed listing or a
/// fixed error.
pub struct FakeDecoder {
    pub result: Result<Vec<Instruction>, String>,
}

impl Decoder for FakeDecoder {
    fn decode(
        &self,
        _bytes: &[u8],
        _base_va: u64,
        _bits: u32,
    ) -> Result<Vec<Instruction>, DecodeError> {
        match &self.result {
            Ok(instructions) => Ok(instructions.clone()),
            Err(msg) => Err(DecodeError::Failed(msg.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_backend_frames_hex() {
        let adapter = DecoderAdapter::fallback_only();
        let listing = adapter.decode(&[0x90, 0xC3], 0x400000, 64);
        assert!(listing.fallback);
        assert_eq!(listing.instructions.len(), 1);
        assert_eq!(listing.instructions[0].bytes, "90 c3");
    }

    #[test]
    fn backend_error_frames_hex() {
        let adapter = DecoderAdapter::with_backend(Box::new(FakeDecoder {
            result: Err("backend exploded".into()),
        }));
        let listing = adapter.decode(&[0x90], 0, 64);
        assert!(listing.fallback);
        assert_eq!(listing.instructions.len(), 1);
    }

    struct PanickingDecoder;

    impl Decoder for PanickingDecoder {
        fn decode(
            &self,
            _bytes: &[u8],
            _base_va: u64,
            _bits: u32,
        ) -> Result<Vec<Instruction>, DecodeError> {
            panic!("backend blew up");
        }
    }

    #[test]
    fn backend_panic_frames_hex() {
        let adapter = DecoderAdapter::with_backend(Box::new(PanickingDecoder));
        let listing = adapter.decode(&[0x90, 0xC3], 0x400000, 64);
        assert!(listing.fallback);
        assert_eq!(listing.instructions.len(), 1);
        assert_eq!(listing.instructions[0].bytes, "90 c3");
    }

    #[test]
    fn backend_success_is_not_fallback() {
        let inst = Instruction::new("0x0000000000400000", "90", "nop", "");
        let adapter = DecoderAdapter::with_backend(Box::new(FakeDecoder {
            result: Ok(vec![inst.clone()]),
        }));
        let listing = adapter.decode(&[0x90], 0x400000, 64);
        assert!(!listing.fallback);
        assert_eq!(listing.instructions, vec![inst]);
    }

    #[test]
    fn instruction_count_is_capped() {
        let inst = Instruction::new("0x00000000", "90", "nop", "");
        let adapter = DecoderAdapter::with_backend(Box::new(FakeDecoder {
            result: Ok(vec![inst; MAX_INSTRUCTIONS + 100]),
        }));
        let listing = adapter.decode(&[0x90], 0, 32);
        assert_eq!(listing.instructions.len(), MAX_INSTRUCTIONS);
    }

    #[test]
    fn odd_bit_width_clamps_to_32() {
        // The clamp is observable through the fallback path staying stable.
        let adapter = DecoderAdapter::fallback_only();
        let listing = adapter.decode(&[0xCC], 0, 48);
        assert_eq!(listing.instructions[0].address, "0x00000000");
    }
}
