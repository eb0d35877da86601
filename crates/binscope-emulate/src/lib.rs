//! # binscope-emulate
//!
//! A deterministic single-stepping interpreter for the decoded x86/x86-64
//! listing. State is a tagged 64-bit register file, concrete flags, sparse
//! 4 KiB-paged memory, and a breakpoint set; semantics cover the common
//! data-movement, arithmetic, logic, shift, stack, and control-transfer
//! instructions. Faults surface as structured traps, never panics.
//!
//! ```
//! use binscope_core::Instruction;
//! use binscope_emulate::Interpreter;
//!
//! let mut interp = Interpreter::new(64);
//! interp.load(vec![
//!     Instruction::new("0x0000000000401000", "b8 05 00 00 00", "mov", "eax, 5"),
//!     Instruction::new("0x0000000000401005", "83 c0 03", "add", "eax, 3"),
//! ]);
//! interp.step().unwrap();
//! interp.step().unwrap();
//! assert_eq!(interp.register("eax"), Some(8));
//! ```

pub mod flags;
pub mod interp;
pub mod memory;
pub mod operand;
pub mod registers;

pub use flags::{Condition, Flags};
pub use interp::{Interpreter, InterpreterConfig, RunOutcome, StopReason, Trap, STACK_TOP};
pub use memory::{PagedMemory, PAGE_SIZE};
pub use operand::{parse_operand, split_operands, Operand};
pub use registers::{lookup, RegSpec, RegisterFile};
