//! Hex-dump fallback framing.
//!
//! When no semantic decoder is available the listing degrades to rows of
//! raw bytes: the mnemonic column carries the ASCII transliteration so a
//! reader can still spot embedded strings.

use binscope_core::Instruction;

/// Bytes per fallback row.
pub const ROW_BYTES: usize = 16;

/// Maximum rows in a fallback listing. Deliberately smaller than the
/// decoder's input cap; a hexdump longer than this stops being readable.
pub const MAX_ROWS: usize = 32;

/// Frames `bytes` as hex-dump rows starting at `base_va`.
///
/// Row addresses are 8-nibble `0x` hex regardless of bit width; non-printable
/// bytes transliterate to `.`; the operand column is empty.
pub fn hex_dump(bytes: &[u8], base_va: u64) -> Vec<Instruction> {
    bytes
        .chunks(ROW_BYTES)
        .take(MAX_ROWS)
        .enumerate()
        .map(|(row, chunk)| {
            let address = format!("{:#010x}", base_va + (row * ROW_BYTES) as u64);
            let hex = chunk
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ");
            let ascii: String = chunk
                .iter()
                .map(|&b| {
                    if (0x20..0x7F).contains(&b) {
                        b as char
                    } else {
                        '.'
                    }
                })
                .collect();
            Instruction::new(address, hex, ascii, "")
        })
        .collect()
}
