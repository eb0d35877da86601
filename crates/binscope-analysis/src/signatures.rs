//! Fixed byte-signature scanning.
//!
//! A small catalogue of idiomatic x86 byte sequences is matched against the
//! code buffer: string-op fills and copies, system-call gates, and
//! import-thunk indirections.

use serde::{Deserialize, Serialize};

use binscope_core::format_addr;

/// Scan cap: only the first MiB of the code buffer is searched.
pub const SCAN_CAP: usize = 1024 * 1024;

struct Signature {
    pattern: &'static [u8],
    name: &'static str,
    note: &'static str,
}

const SIGNATURES: &[Signature] = &[
    Signature {
        pattern: &[0xF3, 0xAA],
        name: "rep stosb",
        note: "memory fill, byte-wise (memset idiom)",
    },
    Signature {
        pattern: &[0xF3, 0xAB],
        name: "rep stosd",
        note: "memory fill, dword-wise (memset idiom)",
    },
    Signature {
        pattern: &[0xF3, 0xA4],
        name: "rep movsb",
        note: "memory copy, byte-wise (memcpy idiom)",
    },
    Signature {
        pattern: &[0xF3, 0xA5],
        name: "rep movsd",
        note: "memory copy, dword-wise (memcpy idiom)",
    },
    Signature {
        pattern: &[0x0F, 0x05],
        name: "syscall",
        note: "direct x86-64 system call",
    },
    Signature {
        pattern: &[0xCD, 0x80],
        name: "int 80h",
        note: "legacy Linux system call gate",
    },
    Signature {
        pattern: &[0xFF, 0x25],
        name: "jmp [mem]",
        note: "indirect jump, often an import thunk",
    },
    Signature {
        pattern: &[0xFF, 0x15],
        name: "call [mem]",
        note: "indirect call through a pointer, often an import",
    },
];

/// One pattern match in the code buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureHit {
    /// Canonical virtual address of the match.
    pub address: String,
    /// Pattern name.
    pub name: String,
    /// Human note.
    pub note: String,
}

/// Scans `code` for every catalogue pattern.
///
/// Patterns are searched in catalogue order; within one pattern the scan
/// advances by the pattern length on a match, so a pattern never overlaps
/// itself (matches of different patterns may overlap).
pub fn scan_signatures(code: &[u8], base_va: u64, bits: u32) -> Vec<SignatureHit> {
    let window = &code[..code.len().min(SCAN_CAP)];
    let mut hits = Vec::new();

    for sig in SIGNATURES {
        let mut offset = 0;
        while offset + sig.pattern.len() <= window.len() {
            if &window[offset..offset + sig.pattern.len()] == sig.pattern {
                hits.push(SignatureHit {
                    address: format_addr(base_va + offset as u64, bits),
                    name: sig.name.to_string(),
                    note: sig.note.to_string(),
                });
                offset += sig.pattern.len();
            } else {
                offset += 1;
            }
        }
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_fill_idioms() {
        let code = [0xF3, 0xAA, 0x90, 0xF3, 0xAB];
        let hits = scan_signatures(&code, 0x400000, 32);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].name, "rep stosb");
        assert_eq!(hits[0].address, "0x00400000");
        assert_eq!(hits[1].name, "rep stosd");
        assert_eq!(hits[1].address, "0x00400003");
    }

    #[test]
    fn addresses_pad_per_bits() {
        let hits = scan_signatures(&[0x0F, 0x05], 0x401000, 64);
        assert_eq!(hits[0].address, "0x0000000000401000");
        assert_eq!(hits[0].name, "syscall");
    }

    #[test]
    fn same_pattern_does_not_overlap_itself() {
        // AA F3 AA F3 AA: matches at 1 and 3 would overlap; only 1 survives
        // plus the scan resumes at 3.
        let code = [0xF3, 0xAA, 0xF3, 0xAA];
        let hits = scan_signatures(&code, 0, 32);
        let stosb: Vec<_> = hits.iter().filter(|h| h.name == "rep stosb").collect();
        assert_eq!(stosb.len(), 2);
        assert_eq!(stosb[0].address, "0x00000000");
        assert_eq!(stosb[1].address, "0x00000002");
    }

    #[test]
    fn scan_respects_cap() {
        let mut code = vec![0u8; SCAN_CAP + 16];
        let len = code.len();
        code[len - 2] = 0xCD;
        code[len - 1] = 0x80;
        assert!(scan_signatures(&code, 0, 32).is_empty());
    }

    #[test]
    fn empty_code_has_no_hits() {
        assert!(scan_signatures(&[], 0, 32).is_empty());
    }
}
