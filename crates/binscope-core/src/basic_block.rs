//! Basic block representation.
//!
//! Blocks reference instructions by value and successors by address key;
//! there is no pointer graph to manage.

use serde::{Deserialize, Serialize};

use crate::Instruction;

/// Classification of a successor edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Execution continues into the next linear block.
    Fall,
    /// Execution transfers to a named target.
    Jump,
}

/// A successor edge of a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Address of the first instruction of the successor block.
    pub to: u64,
    /// How control reaches it.
    pub kind: EdgeKind,
}

/// A maximal straight-line instruction sequence with a single entry and a
/// single exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlock {
    /// Address of the first instruction; doubles as the block identifier.
    pub id: u64,
    /// The contiguous instructions of this block, in order.
    pub insts: Vec<Instruction>,
    /// Successor edges.
    pub succs: Vec<Edge>,
}

impl BasicBlock {
    /// Creates an empty block starting at `id`.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            insts: Vec::new(),
            succs: Vec::new(),
        }
    }

    /// The last instruction of the block, if any.
    pub fn last_instruction(&self) -> Option<&Instruction> {
        self.insts.last()
    }
}
