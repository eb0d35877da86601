//! x86/x86-64 decoder backend built on iced-x86.

use iced_x86::{Decoder as IcedDecoder, DecoderOptions, Formatter, NasmFormatter};

use binscope_core::{format_addr, Instruction};

use crate::adapter::MAX_INSTRUCTIONS;
use crate::{DecodeError, Decoder};

/// Linear x86/x86-64 decoder producing NASM-dialect instruction records.
pub struct X86Decoder;

impl Decoder for X86Decoder {
    fn decode(
        &self,
        bytes: &[u8],
        base_va: u64,
        bits: u32,
    ) -> Result<Vec<Instruction>, DecodeError> {
        let mut decoder = IcedDecoder::with_ip(bits, bytes, base_va, DecoderOptions::NONE);
        let mut formatter = NasmFormatter::new();
        formatter.options_mut().set_space_after_operand_separator(true);
        formatter.options_mut().set_show_branch_size(false);
        formatter.options_mut().set_uppercase_hex(false);

        let mut instructions = Vec::new();
        let mut inst = iced_x86::Instruction::default();
        let mut text = String::new();

        while decoder.can_decode() && instructions.len() < MAX_INSTRUCTIONS {
            decoder.decode_out(&mut inst);
            if inst.is_invalid() {
                continue;
            }

            text.clear();
            formatter.format(&inst, &mut text);
            let (mnemonic, operands) = match text.split_once(' ') {
                Some((m, o)) => (m.to_string(), o.to_string()),
                None => (text.clone(), String::new()),
            };

            let offset = (inst.ip() - base_va) as usize;
            let encoding = &bytes[offset..offset + inst.len()];
            let hex = encoding
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ");

            instructions.push(Instruction {
                address: format_addr(inst.ip(), bits),
                bytes: hex,
                mnemonic,
                operands,
            });
        }

        Ok(instructions)
    }
}
