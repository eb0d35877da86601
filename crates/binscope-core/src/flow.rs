//! Mnemonic flow classification.
//!
//! The conditional-jump set is closed: xref resolution, CFG construction,
//! and the interpreter's condition table all key off the same list.

/// Every conditional-transfer mnemonic recognized by the analyses.
pub const JCC_MNEMONICS: &[&str] = &[
    "jo", "jno", "js", "jns", "je", "jne", "jz", "jnz", "jb", "jnae", "jc", "jnb", "jae", "jnc",
    "jbe", "jna", "ja", "jnbe", "jl", "jnge", "jge", "jnl", "jle", "jng", "jg", "jnle", "jp",
    "jpe", "jnp", "jpo", "jcxz", "jecxz", "jrcxz", "loop", "loope", "loopne",
];

/// Mnemonics that terminate a function body.
pub const END_OF_FUNCTION: &[&str] = &["ret", "retn", "retq", "retf", "ud2", "hlt", "int3"];

/// Mnemonics after which control never falls through.
pub const END_OF_FLOW: &[&str] = &["jmp", "ret", "retn", "retq", "retf", "ud2", "hlt"];

/// Returns true for any conditional-transfer mnemonic.
pub fn is_jcc(mnemonic: &str) -> bool {
    JCC_MNEMONICS.contains(&mnemonic)
}

/// Returns true for the return family.
pub fn is_return(mnemonic: &str) -> bool {
    matches!(mnemonic, "ret" | "retn" | "retq" | "retf")
}

/// Returns true when the instruction ends straight-line flow
/// (unconditional jump, return, trap, halt).
pub fn ends_flow(mnemonic: &str) -> bool {
    END_OF_FLOW.contains(&mnemonic)
}

/// Returns true when the instruction ends a function body in a linear scan.
pub fn ends_function(mnemonic: &str) -> bool {
    END_OF_FUNCTION.contains(&mnemonic)
}

/// Returns true when the instruction transfers control somewhere it names
/// (call, jmp, or any Jcc) and so starts a new basic block after itself.
pub fn is_block_boundary(mnemonic: &str) -> bool {
    mnemonic == "call" || ends_flow(mnemonic) || is_jcc(mnemonic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jcc_set_is_closed() {
        assert!(is_jcc("jne"));
        assert!(is_jcc("loopne"));
        assert!(is_jcc("jrcxz"));
        assert!(!is_jcc("jmp"));
        assert!(!is_jcc("call"));
    }

    #[test]
    fn flow_terminators() {
        assert!(ends_flow("jmp"));
        assert!(ends_flow("retq"));
        assert!(ends_flow("ud2"));
        assert!(!ends_flow("call"));
        assert!(!ends_flow("jne"));
    }

    #[test]
    fn function_terminators_include_padding() {
        assert!(ends_function("int3"));
        assert!(ends_function("ret"));
        assert!(!ends_function("jmp"));
    }

    #[test]
    fn block_boundaries() {
        assert!(is_block_boundary("call"));
        assert!(is_block_boundary("jne"));
        assert!(is_block_boundary("hlt"));
        assert!(!is_block_boundary("mov"));
    }
}
