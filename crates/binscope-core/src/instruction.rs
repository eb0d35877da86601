//! The textual instruction record shared by the disassembly listing, the
//! analysis passes, and the interpreter.

use serde::{Deserialize, Serialize};

use crate::addr::parse_addr;

/// One decoded (or hex-framed) instruction.
///
/// The record is textual by design: `address` is a canonical lowercase hex
/// string zero-padded to the architecture's nibble count, `bytes` is
/// space-separated lowercase hex, and `operands` is the decoder's NASM-style
/// rendering (`401000h` immediates). Consumers that need numeric addresses
/// parse them back with [`addr_value`](Self::addr_value).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Canonical instruction address.
    pub address: String,
    /// Space-separated hex of exactly this instruction's encoding.
    pub bytes: String,
    /// Lowercase mnemonic.
    pub mnemonic: String,
    /// Operand text, empty when the instruction takes none.
    pub operands: String,
}

impl Instruction {
    /// Creates an instruction record from already-canonical parts.
    pub fn new(
        address: impl Into<String>,
        bytes: impl Into<String>,
        mnemonic: impl Into<String>,
        operands: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            bytes: bytes.into(),
            mnemonic: mnemonic.into(),
            operands: operands.into(),
        }
    }

    /// Numeric value of the canonical address.
    pub fn addr_value(&self) -> Option<u64> {
        parse_addr(&self.address)
    }

    /// The mnemonic, trimmed and lowercased, for classification.
    pub fn mnemonic_key(&self) -> String {
        self.mnemonic.trim().to_ascii_lowercase()
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.operands.is_empty() {
            write!(f, "{}  {}", self.address, self.mnemonic)
        } else {
            write!(f, "{}  {} {}", self.address, self.mnemonic, self.operands)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_value_round_trips() {
        let inst = Instruction::new("0x00401000", "c3", "ret", "");
        assert_eq!(inst.addr_value(), Some(0x401000));
    }

    #[test]
    fn mnemonic_key_normalizes() {
        let inst = Instruction::new("0x0", "90", " NOP ", "");
        assert_eq!(inst.mnemonic_key(), "nop");
    }

    #[test]
    fn display_omits_empty_operands() {
        let inst = Instruction::new("0x00401000", "c3", "ret", "");
        assert_eq!(inst.to_string(), "0x00401000  ret");
        let inst = Instruction::new("0x00401000", "b8 05 00 00 00", "mov", "eax, 5");
        assert_eq!(inst.to_string(), "0x00401000  mov eax, 5");
    }
}
