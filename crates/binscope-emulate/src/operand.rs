//! NASM-dialect operand parsing.
//!
//! Operand text arrives lowercased from the decoder: an optional width
//! keyword, then a memory expression in brackets, a register name, or an
//! immediate (`NNNNh`, `0xN`, or decimal, optionally negative). Memory
//! expressions are `+`/`-` separated sums of scaled registers, registers,
//! and immediates, evaluated modulo 2^64.

use crate::registers::{lookup, RegisterFile, RegSpec};

/// A parsed operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A register alias.
    Reg(RegSpec),
    /// A memory reference with an optional explicit width.
    Mem {
        terms: Vec<Term>,
        width: Option<u32>,
    },
    /// An immediate value.
    Imm(u64),
}

/// One signed term of an address expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Term {
    pub negate: bool,
    pub kind: TermKind,
}

/// What a term contributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TermKind {
    Reg(RegSpec),
    Scaled(RegSpec, u64),
    Imm(u64),
}

/// Splits an operand string at top-level commas.
pub fn split_operands(text: &str) -> Vec<&str> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parses a single operand.
pub fn parse_operand(text: &str) -> Result<Operand, String> {
    let lowered = text.trim().to_ascii_lowercase();
    let (rest, width) = strip_width(&lowered);
    let rest = rest.trim();

    if let Some(inner) = rest.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        let terms = parse_expr(inner)?;
        return Ok(Operand::Mem { terms, width });
    }
    if let Some(spec) = lookup(rest) {
        return Ok(Operand::Reg(spec));
    }
    if let Some(value) = parse_immediate(rest) {
        return Ok(Operand::Imm(value));
    }
    Err(format!("unparseable operand '{}'", text.trim()))
}

/// Evaluates an address expression against the register file.
pub fn eval_terms(terms: &[Term], regs: &RegisterFile) -> u64 {
    let mut sum = 0u64;
    for term in terms {
        let value = match term.kind {
            TermKind::Reg(spec) => regs.read(spec),
            TermKind::Scaled(spec, scale) => regs.read(spec).wrapping_mul(scale),
            TermKind::Imm(value) => value,
        };
        sum = if term.negate {
            sum.wrapping_sub(value)
        } else {
            sum.wrapping_add(value)
        };
    }
    sum
}

/// Parses an immediate: `NNNNh`, `0xN`, or decimal, with an optional sign.
pub fn parse_immediate(text: &str) -> Option<u64> {
    let trimmed = text.trim();
    let (digits, negate) = match trimmed.strip_prefix('-') {
        Some(rest) => (rest.trim(), true),
        None => (trimmed, false),
    };

    let value = if let Some(hex) = digits.strip_suffix('h') {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u64::from_str_radix(hex, 16).ok()?
    } else if let Some(hex) = digits.strip_prefix("0x") {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u64::from_str_radix(hex, 16).ok()?
    } else {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse::<u64>().ok()?
    };

    Some(if negate { value.wrapping_neg() } else { value })
}

fn strip_width(text: &str) -> (&str, Option<u32>) {
    for (keyword, width) in [
        ("qword ", 64u32),
        ("dword ", 32),
        ("word ", 16),
        ("byte ", 8),
    ] {
        if let Some(rest) = text.strip_prefix(keyword) {
            let rest = rest.strip_prefix("ptr ").unwrap_or(rest);
            return (rest, Some(width));
        }
    }
    (text, None)
}

fn parse_expr(inner: &str) -> Result<Vec<Term>, String> {
    let cleaned: String = inner
        .trim()
        .strip_prefix("rel ")
        .unwrap_or(inner.trim())
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return Err(format!("empty address expression '[{}]'", inner));
    }

    let mut terms = Vec::new();
    let mut negate = false;
    let mut current = String::new();
    for ch in cleaned.chars() {
        if ch == '+' || ch == '-' {
            if current.is_empty() {
                // A leading minus is a sign; any other bare operator is
                // a malformed expression.
                if ch == '-' && terms.is_empty() && !negate {
                    negate = true;
                    continue;
                }
                return Err(format!("malformed address expression '[{}]'", inner));
            }
            terms.push(parse_term(&current, negate)?);
            current.clear();
            negate = ch == '-';
        } else {
            current.push(ch);
        }
    }
    if current.is_empty() {
        return Err(format!("malformed address expression '[{}]'", inner));
    }
    terms.push(parse_term(&current, negate)?);
    Ok(terms)
}

fn parse_term(text: &str, negate: bool) -> Result<Term, String> {
    let kind = if let Some((lhs, rhs)) = text.split_once('*') {
        match (lookup(lhs), rhs.parse::<u64>().ok()) {
            (Some(spec), Some(scale)) => TermKind::Scaled(spec, scale),
            _ => match (lhs.parse::<u64>().ok(), lookup(rhs)) {
                (Some(scale), Some(spec)) => TermKind::Scaled(spec, scale),
                _ => return Err(format!("bad scaled term '{}'", text)),
            },
        }
    } else if let Some(spec) = lookup(text) {
        TermKind::Reg(spec)
    } else if let Some(value) = parse_immediate(text) {
        TermKind::Imm(value)
    } else {
        return Err(format!("bad address term '{}'", text));
    };
    Ok(Term { negate, kind })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regs_with(pairs: &[(&str, u64)]) -> RegisterFile {
        let mut regs = RegisterFile::new();
        for (name, value) in pairs {
            regs.set(name, *value);
        }
        regs
    }

    fn eval(text: &str, regs: &RegisterFile) -> u64 {
        match parse_operand(text).unwrap() {
            Operand::Mem { terms, .. } => eval_terms(&terms, regs),
            other => panic!("expected memory operand, got {:?}", other),
        }
    }

    #[test]
    fn parses_registers_and_immediates() {
        assert!(matches!(parse_operand("rax"), Ok(Operand::Reg(_))));
        assert_eq!(parse_operand("401000h").unwrap(), Operand::Imm(0x401000));
        assert_eq!(parse_operand("0x10").unwrap(), Operand::Imm(0x10));
        assert_eq!(parse_operand("42").unwrap(), Operand::Imm(42));
        assert_eq!(parse_operand("-1").unwrap(), Operand::Imm(u64::MAX));
    }

    #[test]
    fn width_prefix_sets_memory_width() {
        match parse_operand("dword [rax]").unwrap() {
            Operand::Mem { width, .. } => assert_eq!(width, Some(32)),
            other => panic!("unexpected {:?}", other),
        }
        match parse_operand("byte [rsp+1]").unwrap() {
            Operand::Mem { width, .. } => assert_eq!(width, Some(8)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn address_expressions_sum_signed_terms() {
        let regs = regs_with(&[("rax", 0x1000), ("rcx", 4)]);
        assert_eq!(eval("[rax+8]", &regs), 0x1008);
        assert_eq!(eval("[rax-8]", &regs), 0xFF8);
        assert_eq!(eval("[rax+rcx*4+10h]", &regs), 0x1020);
        assert_eq!(eval("[rax + rcx*2]", &regs), 0x1008);
        assert_eq!(eval("[401000h]", &regs), 0x401000);
    }

    #[test]
    fn address_arithmetic_wraps_modulo_64() {
        let regs = regs_with(&[("rax", 0)]);
        assert_eq!(eval("[rax-1]", &regs), u64::MAX);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_operand("xmm0").is_err());
        assert!(parse_operand("[rax+]").is_err());
        assert!(parse_operand("[]").is_err());
        assert!(parse_operand("sub_401000").is_err());
    }

    #[test]
    fn split_operands_handles_memory_forms() {
        assert_eq!(split_operands("eax, 5"), vec!["eax", "5"]);
        assert_eq!(
            split_operands("dword [rax+4], 10h"),
            vec!["dword [rax+4]", "10h"]
        );
        assert!(split_operands("").is_empty());
    }
}
