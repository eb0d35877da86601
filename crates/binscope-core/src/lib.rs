//! # binscope-core
//!
//! Core abstractions for the binscope binary analyzer. This crate defines
//! the types shared by every pipeline stage: the textual instruction record,
//! the uniform section record, canonical address formatting, mnemonic
//! flow classification, and basic blocks for the CFG builder.

pub mod addr;
pub mod basic_block;
pub mod flow;
pub mod instruction;
pub mod section;

pub use addr::{format_addr, parse_addr, strip_hex};
pub use basic_block::{BasicBlock, Edge, EdgeKind};
pub use instruction::Instruction;
pub use section::SectionRecord;
