//! Cross-reference index.
//!
//! Direct call/jump/conditional-jump targets resolve to a reverse map keyed
//! by canonical target address. Register, memory-expression, and symbol
//! operands are indirect and never indexed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use binscope_core::{flow, format_addr, Instruction};

/// Kind of control transfer referencing a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XrefKind {
    Call,
    Jmp,
    Jcc,
}

/// One reference site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Xref {
    /// Canonical address of the referencing instruction.
    pub from: String,
    /// Transfer kind.
    #[serde(rename = "type")]
    pub kind: XrefKind,
}

/// Parses a direct branch-target operand.
///
/// Exactly two forms are accepted: NASM `NNNNh` and `0xNNNN`. Anything else
/// (registers, memory expressions, symbols) is indirect.
pub fn parse_direct_target(operand: &str) -> Option<u64> {
    let op = operand.trim().to_ascii_lowercase();
    if let Some(digits) = op.strip_suffix('h') {
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return u64::from_str_radix(digits, 16).ok();
        }
        return None;
    }
    if let Some(digits) = op.strip_prefix("0x") {
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return u64::from_str_radix(digits, 16).ok();
        }
    }
    None
}

/// Builds the reverse cross-reference index for a listing.
///
/// Keys are canonical target addresses padded to `bits / 4` nibbles; values
/// are every static call/branch site naming that target, in listing order.
pub fn build_xrefs(instructions: &[Instruction], bits: u32) -> BTreeMap<String, Vec<Xref>> {
    let mut xrefs: BTreeMap<String, Vec<Xref>> = BTreeMap::new();

    for inst in instructions {
        let mnemonic = inst.mnemonic_key();
        let kind = if mnemonic == "call" {
            XrefKind::Call
        } else if mnemonic == "jmp" {
            XrefKind::Jmp
        } else if flow::is_jcc(&mnemonic) {
            XrefKind::Jcc
        } else {
            continue;
        };

        let Some(target) = parse_direct_target(&inst.operands) else {
            continue;
        };
        xrefs.entry(format_addr(target, bits)).or_default().push(Xref {
            from: inst.address.clone(),
            kind,
        });
    }

    xrefs
}
