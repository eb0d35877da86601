//! The single-stepping interpreter.
//!
//! State is a register file, flags, paged memory, and a breakpoint set. The
//! instruction stream is the decoded listing: stepping looks the current
//! `rip` up in an address map, commits the fall-through `rip` before
//! dispatch, and lets control-transfer mnemonics overwrite it.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use binscope_core::Instruction;

use crate::flags::{Condition, Flags};
use crate::memory::PagedMemory;
use crate::operand::{eval_terms, parse_operand, split_operands, Operand};
use crate::registers::{width_mask, RegisterFile};

/// Initial stack pointer after `load`.
pub const STACK_TOP: u64 = 0x7FFF_0000;

/// A structured execution fault. Stepping returns this instead of
/// unwinding; interpreter state stays usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Trap {
    /// Human description of the fault.
    pub message: String,
    /// The faulting instruction, absent when `rip` mapped to none.
    pub inst: Option<Instruction>,
}

/// Run-loop tuning.
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Steps per cooperative batch; the cancel hook is polled between
    /// batches.
    pub batch_size: usize,
    /// Hard cap on steps per run session.
    pub max_steps: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_steps: 50_000,
        }
    }
}

/// Why a run session stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The new `rip` landed on a breakpoint.
    Breakpoint(u64),
    /// A step faulted.
    Trap(Trap),
    /// The session step cap was reached.
    StepLimit,
    /// The cancel hook asked to stop.
    Cancelled,
}

/// Result of a run session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub reason: StopReason,
    pub steps: usize,
}

/// The deterministic x86 interpreter.
#[derive(Debug)]
pub struct Interpreter {
    bits: u32,
    config: InterpreterConfig,
    regs: RegisterFile,
    flags: Flags,
    mem: PagedMemory,
    breakpoints: BTreeSet<u64>,
    insts: Vec<Instruction>,
    by_addr: HashMap<u64, usize>,
}

impl Interpreter {
    /// Creates an interpreter for the given bit width (16, 32, or 64;
    /// anything else is treated as 32).
    pub fn new(bits: u32) -> Self {
        Self::with_config(bits, InterpreterConfig::default())
    }

    pub fn with_config(bits: u32, config: InterpreterConfig) -> Self {
        let bits = match bits {
            16 | 32 | 64 => bits,
            _ => 32,
        };
        Self {
            bits,
            config,
            regs: RegisterFile::new(),
            flags: Flags::new(),
            mem: PagedMemory::new(),
            breakpoints: BTreeSet::new(),
            insts: Vec::new(),
            by_addr: HashMap::new(),
        }
    }

    /// Loads a listing and resets execution state: registers and memory are
    /// cleared, `rip` points at the first instruction, `rsp` at the stack
    /// top with a few pages pre-touched so dumps render.
    pub fn load(&mut self, instructions: Vec<Instruction>) {
        self.regs.clear();
        self.flags.clear();
        self.mem.clear();

        self.by_addr = instructions
            .iter()
            .enumerate()
            .filter_map(|(i, inst)| inst.addr_value().map(|addr| (addr, i)))
            .collect();
        self.insts = instructions;

        let entry = self.insts.first().and_then(|i| i.addr_value()).unwrap_or(0);
        self.regs.set_rip(entry);
        self.regs.set_rsp(STACK_TOP);
        for page in 0..4u64 {
            self.mem.touch(STACK_TOP - page * 4096);
        }
    }

    /// Word size in bytes for push/pop/call/ret.
    fn word_bytes(&self) -> u32 {
        self.bits / 8
    }

    // ==================== State access ====================

    pub fn register(&self, name: &str) -> Option<u64> {
        self.regs.get(name)
    }

    pub fn set_register(&mut self, name: &str, value: u64) -> bool {
        self.regs.set(name, value)
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn rip(&self) -> u64 {
        self.regs.rip()
    }

    pub fn read_memory(&self, address: u64, size: u32) -> u64 {
        self.mem.read(address, size)
    }

    pub fn write_memory(&mut self, address: u64, value: u64, size: u32) {
        self.mem.write(address, value, size)
    }

    pub fn add_breakpoint(&mut self, address: u64) {
        self.breakpoints.insert(address);
    }

    pub fn remove_breakpoint(&mut self, address: u64) {
        self.breakpoints.remove(&address);
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = u64> + '_ {
        self.breakpoints.iter().copied()
    }

    /// Canonical register dump for interactive display.
    pub fn dump_registers(&self) -> String {
        let mut out = String::new();
        for (name, value) in self.regs.iter() {
            out.push_str(&format!("  {:4}: {:#018x}\n", name, value));
        }
        let f = &self.flags;
        out.push_str(&format!(
            "  flags: cf={} zf={} sf={} of={} pf={} af={}\n",
            f.cf as u8, f.zf as u8, f.sf as u8, f.of as u8, f.pf as u8, f.af as u8
        ));
        out
    }

    // ==================== Stepping ====================

    /// Executes one instruction.
    ///
    /// The fall-through `rip` is committed before dispatch; control
    /// transfers overwrite it during execution. Faults come back as a
    /// structured [`Trap`] and leave the interpreter usable.
    pub fn step(&mut self) -> Result<Instruction, Trap> {
        let rip = self.regs.rip();
        let Some(&index) = self.by_addr.get(&rip) else {
            return Err(Trap {
                message: "RIP at unmapped address".into(),
                inst: None,
            });
        };
        let inst = self.insts[index].clone();
        let rip_next = self
            .insts
            .get(index + 1)
            .and_then(|i| i.addr_value())
            .unwrap_or(rip);
        self.regs.set_rip(rip_next);

        match self.dispatch(&inst, rip_next) {
            Ok(()) => Ok(inst),
            Err(message) => Err(Trap {
                message,
                inst: Some(inst),
            }),
        }
    }

    /// Runs until a breakpoint, trap, cancellation, or the step cap.
    pub fn run(&mut self) -> RunOutcome {
        self.run_with(|| true)
    }

    /// Runs with a cancel hook polled at batch boundaries.
    pub fn run_with(&mut self, mut keep_going: impl FnMut() -> bool) -> RunOutcome {
        let mut steps = 0usize;
        loop {
            for _ in 0..self.config.batch_size {
                if steps >= self.config.max_steps {
                    return RunOutcome {
                        reason: StopReason::StepLimit,
                        steps,
                    };
                }
                match self.step() {
                    Ok(_) => steps += 1,
                    Err(trap) => {
                        return RunOutcome {
                            reason: StopReason::Trap(trap),
                            steps,
                        }
                    }
                }
                if self.breakpoints.contains(&self.regs.rip()) {
                    return RunOutcome {
                        reason: StopReason::Breakpoint(self.regs.rip()),
                        steps,
                    };
                }
            }
            if !keep_going() {
                return RunOutcome {
                    reason: StopReason::Cancelled,
                    steps,
                };
            }
        }
    }

    // ==================== Dispatch ====================

    fn dispatch(&mut self, inst: &Instruction, rip_next: u64) -> Result<(), String> {
        let mnemonic = inst.mnemonic_key();
        match mnemonic.as_str() {
            // No state change; operands (if any) are irrelevant.
            "nop" | "int3" | "endbr64" | "endbr32" | "pause" => return Ok(()),
            // Accepted but never taken.
            "jcxz" | "jecxz" | "jrcxz" => return Ok(()),
            _ => {}
        }

        let ops: Vec<Operand> = split_operands(&inst.operands)
            .into_iter()
            .map(parse_operand)
            .collect::<Result<_, _>>()?;

        match mnemonic.as_str() {
            "mov" | "movq" | "movl" => {
                let (dst, src) = two_operands(&ops, &mnemonic)?;
                let width = self.operand_width(dst, Some(src));
                let value = self.read_operand(src, width);
                self.write_operand(dst, width, value);
                Ok(())
            }
            "movzx" => {
                let (dst, src) = two_operands(&ops, &mnemonic)?;
                let src_width = self
                    .explicit_width(src)
                    .ok_or("movzx source width unknown")?;
                let value = self.read_operand(src, src_width);
                let width = self.operand_width(dst, None);
                self.write_operand(dst, width, value);
                Ok(())
            }
            "movsx" | "movsxd" => {
                let (dst, src) = two_operands(&ops, &mnemonic)?;
                let src_width = self
                    .explicit_width(src)
                    .ok_or("movsx source width unknown")?;
                let value = sign_extend(self.read_operand(src, src_width), src_width);
                let width = self.operand_width(dst, None);
                self.write_operand(dst, width, value);
                Ok(())
            }

            "push" => {
                let src = one_operand(&ops, &mnemonic)?;
                let word = self.word_bytes();
                let value = self.read_operand(src, word * 8);
                let rsp = self.regs.rsp().wrapping_sub(word as u64);
                self.regs.set_rsp(rsp);
                self.mem.write(rsp, value, word);
                Ok(())
            }
            "pop" => {
                let dst = one_operand(&ops, &mnemonic)?;
                let word = self.word_bytes();
                let rsp = self.regs.rsp();
                let value = self.mem.read(rsp, word);
                self.regs.set_rsp(rsp.wrapping_add(word as u64));
                self.write_operand(dst, word * 8, value);
                Ok(())
            }

            "add" | "sub" | "cmp" => {
                let (dst, src) = two_operands(&ops, &mnemonic)?;
                let width = self.operand_width(dst, Some(src));
                let a = self.read_operand(dst, width);
                let b = self.read_operand(src, width);
                let result = if mnemonic == "add" {
                    let r = a.wrapping_add(b);
                    self.flags.update_add(a, b, r, width);
                    r
                } else {
                    let r = a.wrapping_sub(b);
                    self.flags.update_sub(a, b, r, width);
                    r
                };
                if mnemonic != "cmp" {
                    self.write_operand(dst, width, result & width_mask(width));
                }
                Ok(())
            }
            "xor" | "and" | "or" | "test" => {
                let (dst, src) = two_operands(&ops, &mnemonic)?;
                let width = self.operand_width(dst, Some(src));
                let a = self.read_operand(dst, width);
                let b = self.read_operand(src, width);
                let result = match mnemonic.as_str() {
                    "xor" => a ^ b,
                    "or" => a | b,
                    _ => a & b,
                } & width_mask(width);
                self.flags.update_logic(result, width);
                if mnemonic != "test" {
                    self.write_operand(dst, width, result);
                }
                Ok(())
            }
            "not" => {
                let dst = one_operand(&ops, &mnemonic)?;
                let width = self.operand_width(dst, None);
                let value = !self.read_operand(dst, width) & width_mask(width);
                self.write_operand(dst, width, value);
                Ok(())
            }
            "neg" => {
                let dst = one_operand(&ops, &mnemonic)?;
                let width = self.operand_width(dst, None);
                let value = self.read_operand(dst, width);
                let result = value.wrapping_neg() & width_mask(width);
                self.flags.update_sub(0, value, result, width);
                self.flags.cf = value != 0;
                self.flags.of = value == 1u64 << (width - 1);
                self.write_operand(dst, width, result);
                Ok(())
            }
            "inc" | "dec" => {
                let dst = one_operand(&ops, &mnemonic)?;
                let width = self.operand_width(dst, None);
                let value = self.read_operand(dst, width);
                let result = if mnemonic == "inc" {
                    let r = value.wrapping_add(1) & width_mask(width);
                    self.flags.update_inc(value, r, width);
                    r
                } else {
                    let r = value.wrapping_sub(1) & width_mask(width);
                    self.flags.update_dec(value, r, width);
                    r
                };
                self.write_operand(dst, width, result);
                Ok(())
            }

            "lea" => {
                let (dst, src) = two_operands(&ops, &mnemonic)?;
                let Operand::Mem { terms, .. } = src else {
                    return Err("lea source must be a memory expression".into());
                };
                let address = eval_terms(terms, &self.regs);
                let width = self.operand_width(dst, None);
                self.write_operand(dst, width, address);
                Ok(())
            }

            "shl" | "sal" | "shr" | "sar" => {
                let (dst, src) = two_operands(&ops, &mnemonic)?;
                let width = self.operand_width(dst, None);
                let count = ((self.read_operand(src, 8) & 0x3F) % width as u64) as u32;
                if count == 0 {
                    return Ok(());
                }
                let value = self.read_operand(dst, width);
                let (result, cf) = match mnemonic.as_str() {
                    "shl" | "sal" => (
                        (value << count) & width_mask(width),
                        (value >> (width - count)) & 1 != 0,
                    ),
                    "shr" => (value >> count, (value >> (count - 1)) & 1 != 0),
                    _ => (
                        (sign_extend(value, width) as i64 >> count) as u64 & width_mask(width),
                        (value >> (count - 1)) & 1 != 0,
                    ),
                };
                self.flags.update_logic(result, width);
                self.flags.cf = cf;
                self.write_operand(dst, width, result);
                Ok(())
            }

            "call" => {
                let target = self.resolve_target(&ops, &mnemonic)?;
                let word = self.word_bytes();
                let rsp = self.regs.rsp().wrapping_sub(word as u64);
                self.regs.set_rsp(rsp);
                self.mem.write(rsp, rip_next, word);
                self.regs.set_rip(target);
                Ok(())
            }
            "ret" | "retn" | "retq" => {
                let word = self.word_bytes();
                let rsp = self.regs.rsp();
                let target = self.mem.read(rsp, word);
                self.regs.set_rsp(rsp.wrapping_add(word as u64));
                self.regs.set_rip(target);
                Ok(())
            }
            "jmp" => {
                let target = self.resolve_target(&ops, &mnemonic)?;
                self.regs.set_rip(target);
                Ok(())
            }

            m if m.starts_with('j') => match Condition::from_suffix(&m[1..]) {
                Some(condition) => {
                    if self.flags.check(condition) {
                        let target = self.resolve_target(&ops, &mnemonic)?;
                        self.regs.set_rip(target);
                    }
                    Ok(())
                }
                None => Err(format!("unsupported mnemonic '{}'", m)),
            },

            other => Err(format!("unsupported mnemonic '{}'", other)),
        }
    }

    /// Branch targets may be a register, an immediate, or a single-level
    /// memory dereference.
    fn resolve_target(&self, ops: &[Operand], mnemonic: &str) -> Result<u64, String> {
        let op = one_operand(ops, mnemonic)?;
        Ok(match op {
            Operand::Reg(spec) => self.regs.read(*spec),
            Operand::Imm(value) => *value,
            Operand::Mem { terms, width } => {
                let address = eval_terms(terms, &self.regs);
                self.mem.read(address, width.unwrap_or(self.bits) / 8)
            }
        })
    }

    /// The register or explicit-memory width of an operand, if it has one.
    fn explicit_width(&self, op: &Operand) -> Option<u32> {
        match op {
            Operand::Reg(spec) => Some(spec.width),
            Operand::Mem { width, .. } => *width,
            Operand::Imm(_) => None,
        }
    }

    /// Operand width for an instruction: destination's own width, else the
    /// source's, else the machine word.
    fn operand_width(&self, dst: &Operand, src: Option<&Operand>) -> u32 {
        self.explicit_width(dst)
            .or_else(|| src.and_then(|s| self.explicit_width(s)))
            .unwrap_or(self.bits)
    }

    fn read_operand(&self, op: &Operand, width: u32) -> u64 {
        match op {
            Operand::Reg(spec) => self.regs.read(*spec),
            Operand::Imm(value) => value & width_mask(width),
            Operand::Mem { terms, .. } => {
                let address = eval_terms(terms, &self.regs);
                self.mem.read(address, width / 8)
            }
        }
    }

    fn write_operand(&mut self, op: &Operand, width: u32, value: u64) {
        match op {
            Operand::Reg(spec) => self.regs.write(*spec, value),
            Operand::Mem { terms, .. } => {
                let address = eval_terms(terms, &self.regs);
                self.mem.write(address, value, width / 8);
            }
            Operand::Imm(_) => {}
        }
    }
}

fn one_operand<'a>(ops: &'a [Operand], mnemonic: &str) -> Result<&'a Operand, String> {
    ops.first()
        .ok_or_else(|| format!("'{}' needs an operand", mnemonic))
}

fn two_operands<'a>(ops: &'a [Operand], mnemonic: &str) -> Result<(&'a Operand, &'a Operand), String> {
    match ops {
        [dst, src, ..] => Ok((dst, src)),
        _ => Err(format!("'{}' needs two operands", mnemonic)),
    }
}

fn sign_extend(value: u64, from_width: u32) -> u64 {
    if from_width >= 64 {
        return value;
    }
    let shift = 64 - from_width;
    (((value << shift) as i64) >> shift) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst(addr: u64, mnemonic: &str, operands: &str) -> Instruction {
        Instruction::new(format!("{:#018x}", addr), "00", mnemonic, operands)
    }

    fn loaded(stream: Vec<Instruction>) -> Interpreter {
        let mut interp = Interpreter::new(64);
        interp.load(stream);
        interp
    }

    #[test]
    fn load_resets_state() {
        let mut interp = loaded(vec![inst(0x401000, "nop", "")]);
        interp.set_register("rax", 7);
        interp.load(vec![inst(0x401000, "nop", "")]);
        assert_eq!(interp.register("rax"), Some(0));
        assert_eq!(interp.rip(), 0x401000);
        assert_eq!(interp.register("rsp"), Some(STACK_TOP));
    }

    #[test]
    fn step_at_unmapped_rip_traps_without_inst() {
        let mut interp = loaded(vec![inst(0x401000, "nop", "")]);
        interp.set_register("rip", 0x999999);
        let trap = interp.step().unwrap_err();
        assert_eq!(trap.message, "RIP at unmapped address");
        assert!(trap.inst.is_none());
    }

    #[test]
    fn unsupported_mnemonic_traps_with_inst() {
        let mut interp = loaded(vec![inst(0x401000, "cpuid", "")]);
        let trap = interp.step().unwrap_err();
        assert!(trap.message.contains("unsupported mnemonic"));
        assert_eq!(trap.inst.unwrap().mnemonic, "cpuid");
        // State stays usable: rip already advanced to the fall-through.
        assert_eq!(interp.rip(), 0x401000);
    }

    #[test]
    fn mov_imm_and_reg() {
        let mut interp = loaded(vec![
            inst(0x401000, "mov", "rax, 1234h"),
            inst(0x401007, "mov", "rbx, rax"),
        ]);
        interp.step().unwrap();
        interp.step().unwrap();
        assert_eq!(interp.register("rbx"), Some(0x1234));
    }

    #[test]
    fn mov_to_32_bit_register_zero_extends() {
        let mut interp = loaded(vec![inst(0x401000, "mov", "eax, 0deadbeefh")]);
        interp.set_register("rax", 0x1111_2222_3333_4444);
        interp.step().unwrap();
        assert_eq!(interp.register("rax"), Some(0xDEAD_BEEF));
    }

    #[test]
    fn mov_to_8_bit_registers_preserves_parent() {
        let mut interp = loaded(vec![
            inst(0x401000, "mov", "al, 0aah"),
            inst(0x401002, "mov", "ah, 0bbh"),
        ]);
        interp.set_register("rax", 0x1111_2222_3333_4444);
        interp.step().unwrap();
        interp.step().unwrap();
        assert_eq!(interp.register("rax"), Some(0x1111_2222_3333_BBAA));
    }

    #[test]
    fn push_pop_round_trips() {
        let mut interp = loaded(vec![
            inst(0x401000, "push", "rax"),
            inst(0x401001, "pop", "rbx"),
        ]);
        interp.set_register("rax", 0xFEED_F00D_CAFE_BABE);
        let rsp0 = interp.register("rsp").unwrap();
        interp.step().unwrap();
        assert_eq!(interp.register("rsp"), Some(rsp0 - 8));
        interp.step().unwrap();
        assert_eq!(interp.register("rbx"), Some(0xFEED_F00D_CAFE_BABE));
        assert_eq!(interp.register("rsp"), Some(rsp0));
    }

    #[test]
    fn xor_self_zeroes_and_sets_flags() {
        let mut interp = loaded(vec![inst(0x401000, "xor", "rax, rax")]);
        interp.set_register("rax", 0x1234_5678);
        interp.step().unwrap();
        assert_eq!(interp.register("rax"), Some(0));
        let flags = interp.flags();
        assert!(flags.zf);
        assert!(!flags.sf);
        assert!(!flags.cf);
        assert!(!flags.of);
    }

    #[test]
    fn call_and_ret_restore_rip_and_rsp() {
        let mut interp = loaded(vec![
            inst(0x401000, "call", "401010h"),
            inst(0x401005, "nop", ""),
            inst(0x401010, "ret", ""),
        ]);
        let rsp0 = interp.register("rsp").unwrap();

        interp.step().unwrap();
        assert_eq!(interp.rip(), 0x401010);
        assert_eq!(interp.register("rsp"), Some(rsp0 - 8));

        interp.step().unwrap();
        assert_eq!(interp.rip(), 0x401005);
        assert_eq!(interp.register("rsp"), Some(rsp0));
    }

    #[test]
    fn mov_add_ret_scenario() {
        let mut interp = loaded(vec![
            inst(0x401000, "mov", "eax, 5"),
            inst(0x401005, "add", "eax, 3"),
            inst(0x401008, "ret", ""),
        ]);
        let rsp0 = interp.register("rsp").unwrap();
        interp.write_memory(rsp0, 0xDEAD, 8);

        interp.step().unwrap();
        interp.step().unwrap();
        let flags = interp.flags();
        assert!(!flags.zf);
        assert!(!flags.sf);
        assert!(!flags.cf);
        assert!(!flags.of);
        // 8 = 0b1000: one set bit, odd parity.
        assert!(!flags.pf);

        interp.step().unwrap();
        assert_eq!(interp.register("eax"), Some(8));
        assert_eq!(interp.rip(), 0xDEAD);
        assert_eq!(interp.register("rsp"), Some(rsp0 + 8));
    }

    #[test]
    fn conditional_jump_taken_and_not() {
        let stream = vec![
            inst(0x401000, "cmp", "rax, 0"),
            inst(0x401004, "je", "401010h"),
            inst(0x401006, "nop", ""),
            inst(0x401010, "nop", ""),
        ];
        let mut interp = loaded(stream.clone());
        interp.step().unwrap();
        interp.step().unwrap();
        assert_eq!(interp.rip(), 0x401010);

        let mut interp = loaded(stream);
        interp.set_register("rax", 1);
        interp.step().unwrap();
        interp.step().unwrap();
        assert_eq!(interp.rip(), 0x401006);
    }

    #[test]
    fn jcxz_is_never_taken() {
        let mut interp = loaded(vec![
            inst(0x401000, "jrcxz", "401010h"),
            inst(0x401002, "nop", ""),
        ]);
        interp.set_register("rcx", 0);
        interp.step().unwrap();
        assert_eq!(interp.rip(), 0x401002);
    }

    #[test]
    fn jump_through_register_and_memory() {
        let mut interp = loaded(vec![
            inst(0x401000, "jmp", "rax"),
            inst(0x401002, "jmp", "qword [rbx]"),
        ]);
        interp.set_register("rax", 0x401002);
        interp.set_register("rbx", 0x500000);
        interp.write_memory(0x500000, 0x12345, 8);

        interp.step().unwrap();
        assert_eq!(interp.rip(), 0x401002);
        interp.step().unwrap();
        assert_eq!(interp.rip(), 0x12345);
    }

    #[test]
    fn movzx_and_movsx_extend() {
        let mut interp = loaded(vec![
            inst(0x401000, "movzx", "eax, bl"),
            inst(0x401003, "movsx", "rcx, bl"),
        ]);
        interp.set_register("rbx", 0xFF);
        interp.step().unwrap();
        assert_eq!(interp.register("rax"), Some(0xFF));
        interp.step().unwrap();
        assert_eq!(interp.register("rcx"), Some(u64::MAX));
    }

    #[test]
    fn lea_computes_without_memory_access() {
        let mut interp = loaded(vec![inst(0x401000, "lea", "rax, [rbx+rcx*4+10h]")]);
        interp.set_register("rbx", 0x1000);
        interp.set_register("rcx", 2);
        interp.step().unwrap();
        assert_eq!(interp.register("rax"), Some(0x1018));
        assert_eq!(interp.read_memory(0x1018, 8), 0);
    }

    #[test]
    fn shifts_update_carry_from_last_bit_out() {
        let mut interp = loaded(vec![
            inst(0x401000, "mov", "eax, 3"),
            inst(0x401005, "shr", "eax, 1"),
        ]);
        interp.step().unwrap();
        interp.step().unwrap();
        assert_eq!(interp.register("eax"), Some(1));
        assert!(interp.flags().cf);
    }

    #[test]
    fn sar_is_arithmetic() {
        let mut interp = loaded(vec![inst(0x401000, "sar", "eax, 4")]);
        interp.set_register("eax", 0x8000_0000);
        interp.step().unwrap();
        assert_eq!(interp.register("eax"), Some(0xF800_0000));
        assert!(interp.flags().sf);
    }

    #[test]
    fn inc_preserves_carry() {
        let mut interp = loaded(vec![
            inst(0x401000, "cmp", "rax, 1"),
            inst(0x401004, "inc", "rax"),
        ]);
        interp.step().unwrap();
        assert!(interp.flags().cf);
        interp.step().unwrap();
        assert!(interp.flags().cf);
        assert_eq!(interp.register("rax"), Some(1));
    }

    #[test]
    fn neg_sets_carry_unless_zero() {
        let mut interp = loaded(vec![
            inst(0x401000, "neg", "rax"),
            inst(0x401003, "neg", "rbx"),
        ]);
        interp.set_register("rax", 5);
        interp.step().unwrap();
        assert_eq!(interp.register("rax"), Some(5u64.wrapping_neg()));
        assert!(interp.flags().cf);
        interp.step().unwrap();
        assert_eq!(interp.register("rbx"), Some(0));
        assert!(!interp.flags().cf);
    }

    #[test]
    fn mem_operand_width_prefix_applies() {
        let mut interp = loaded(vec![
            inst(0x401000, "mov", "dword [rsp-8], 0ffffffffh"),
            inst(0x401008, "mov", "byte [rsp-8], 0"),
        ]);
        let rsp = interp.register("rsp").unwrap();
        interp.step().unwrap();
        interp.step().unwrap();
        assert_eq!(interp.read_memory(rsp - 8, 4), 0xFFFF_FF00);
    }

    #[test]
    fn run_stops_at_breakpoint() {
        let mut interp = loaded(vec![
            inst(0x401000, "mov", "rax, 1"),
            inst(0x401007, "mov", "rbx, 2"),
            inst(0x40100e, "ret", ""),
        ]);
        interp.add_breakpoint(0x40100e);
        let outcome = interp.run();
        assert_eq!(outcome.reason, StopReason::Breakpoint(0x40100e));
        assert_eq!(outcome.steps, 2);
        assert_eq!(interp.register("rbx"), Some(2));
    }

    #[test]
    fn run_stops_on_trap() {
        let mut interp = loaded(vec![inst(0x401000, "ret", "")]);
        // ret pops a zero return address; the next step is unmapped.
        let outcome = interp.run();
        match outcome.reason {
            StopReason::Trap(trap) => assert_eq!(trap.message, "RIP at unmapped address"),
            other => panic!("unexpected stop: {:?}", other),
        }
        assert_eq!(outcome.steps, 1);
    }

    #[test]
    fn run_honors_step_cap() {
        let mut interp = Interpreter::with_config(
            64,
            InterpreterConfig {
                batch_size: 10,
                max_steps: 25,
            },
        );
        interp.load(vec![inst(0x401000, "jmp", "401000h")]);
        let outcome = interp.run();
        assert_eq!(outcome.reason, StopReason::StepLimit);
        assert_eq!(outcome.steps, 25);
    }

    #[test]
    fn run_observes_cancellation_at_batch_boundary() {
        let mut interp = Interpreter::with_config(
            64,
            InterpreterConfig {
                batch_size: 10,
                max_steps: 50_000,
            },
        );
        interp.load(vec![inst(0x401000, "jmp", "401000h")]);
        let mut polls = 0;
        let outcome = interp.run_with(|| {
            polls += 1;
            polls < 3
        });
        assert_eq!(outcome.reason, StopReason::Cancelled);
        assert_eq!(outcome.steps, 30);
    }

    #[test]
    fn stack_pages_are_pre_touched() {
        let interp = loaded(vec![inst(0x401000, "nop", "")]);
        assert_eq!(interp.read_memory(STACK_TOP - 8, 8), 0);
        assert!(interp.dump_registers().contains("rsp"));
    }
}
