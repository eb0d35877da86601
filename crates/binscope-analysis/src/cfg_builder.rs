//! Control-flow graph construction.
//!
//! Partitions a linear instruction stream into basic blocks and classifies
//! the successor edges of each block's final instruction.

use std::collections::BTreeSet;

use binscope_core::{flow, BasicBlock, Edge, EdgeKind, Instruction};

use crate::xrefs::parse_direct_target;

/// Builds the basic-block partition of a linear listing.
///
/// Block identifiers are first-instruction addresses; blocks come back in
/// address order. Instructions whose addresses fail to parse are skipped.
pub fn build_cfg(instructions: &[Instruction]) -> Vec<BasicBlock> {
    let parsed: Vec<(u64, &Instruction)> = instructions
        .iter()
        .filter_map(|inst| inst.addr_value().map(|addr| (addr, inst)))
        .collect();
    if parsed.is_empty() {
        return Vec::new();
    }
    let in_map: BTreeSet<u64> = parsed.iter().map(|(addr, _)| *addr).collect();

    // Block starts: the first instruction, every instruction after a
    // control transfer, and every resolvable in-map transfer target.
    let mut starts = BTreeSet::new();
    starts.insert(parsed[0].0);
    for (i, (_, inst)) in parsed.iter().enumerate() {
        let mnemonic = inst.mnemonic_key();
        if !flow::is_block_boundary(&mnemonic) {
            continue;
        }
        if let Some((next_addr, _)) = parsed.get(i + 1) {
            starts.insert(*next_addr);
        }
        if let Some(target) = parse_direct_target(&inst.operands) {
            if in_map.contains(&target) {
                starts.insert(target);
            }
        }
    }

    // Partition the linear sequence at the start addresses.
    let mut blocks: Vec<BasicBlock> = Vec::new();
    for (addr, inst) in &parsed {
        if starts.contains(addr) {
            blocks.push(BasicBlock::new(*addr));
        }
        if let Some(block) = blocks.last_mut() {
            block.insts.push((*inst).clone());
        }
    }

    // Classify the out-edges of each block's final instruction.
    let block_ids: BTreeSet<u64> = blocks.iter().map(|b| b.id).collect();
    for i in 0..blocks.len() {
        let Some(last) = blocks[i].last_instruction() else {
            continue;
        };
        let mnemonic = last.mnemonic_key();
        let target = parse_direct_target(&last.operands).filter(|t| block_ids.contains(t));
        let next = blocks.get(i + 1).map(|b| b.id);

        let mut succs = Vec::new();
        if flow::is_jcc(&mnemonic) {
            if let Some(next_id) = next {
                succs.push(Edge {
                    to: next_id,
                    kind: EdgeKind::Fall,
                });
            }
            if let Some(target_id) = target {
                succs.push(Edge {
                    to: target_id,
                    kind: EdgeKind::Jump,
                });
            }
        } else if mnemonic == "jmp" {
            if let Some(target_id) = target {
                succs.push(Edge {
                    to: target_id,
                    kind: EdgeKind::Jump,
                });
            }
        } else if flow::ends_flow(&mnemonic) {
            // ret/ud2/hlt: no successors.
        } else if let Some(next_id) = next {
            // Everything else, calls included, falls through.
            succs.push(Edge {
                to: next_id,
                kind: EdgeKind::Fall,
            });
        }
        blocks[i].succs = succs;
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst(addr: u64, mnemonic: &str, operands: &str) -> Instruction {
        Instruction::new(format!("{:#010x}", addr), "00", mnemonic, operands)
    }

    #[test]
    fn conditional_branch_has_fall_and_jump_edges() {
        let stream = vec![
            inst(0x00, "mov", "eax, 1"),
            inst(0x05, "jne", "0x10"),
            inst(0x08, "mov", "eax, 2"),
            inst(0x10, "ret", ""),
        ];
        let blocks = build_cfg(&stream);

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].id, 0x00);
        assert_eq!(
            blocks[0].succs,
            vec![
                Edge {
                    to: 0x08,
                    kind: EdgeKind::Fall
                },
                Edge {
                    to: 0x10,
                    kind: EdgeKind::Jump
                },
            ]
        );
        assert_eq!(
            blocks[1].succs,
            vec![Edge {
                to: 0x10,
                kind: EdgeKind::Fall
            }]
        );
        assert!(blocks[2].succs.is_empty());
    }

    #[test]
    fn unconditional_jmp_has_jump_edge_only() {
        let stream = vec![
            inst(0x00, "jmp", "0x05"),
            inst(0x02, "nop", ""),
            inst(0x05, "ret", ""),
        ];
        let blocks = build_cfg(&stream);

        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[0].succs,
            vec![Edge {
                to: 0x05,
                kind: EdgeKind::Jump
            }]
        );
    }

    #[test]
    fn call_falls_through_and_target_starts_block() {
        let stream = vec![
            inst(0x00, "call", "10h"),
            inst(0x05, "mov", "eax, 1"),
            inst(0x10, "ret", ""),
        ];
        let blocks = build_cfg(&stream);

        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[0].succs,
            vec![Edge {
                to: 0x05,
                kind: EdgeKind::Fall
            }]
        );
        assert_eq!(blocks[1].id, 0x05);
        assert_eq!(blocks[2].id, 0x10);
    }

    #[test]
    fn ret_terminates_without_edges() {
        let stream = vec![inst(0x00, "ret", ""), inst(0x01, "nop", "")];
        let blocks = build_cfg(&stream);

        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].succs.is_empty());
    }

    #[test]
    fn out_of_map_target_adds_no_edge() {
        let stream = vec![inst(0x00, "jmp", "0x999"), inst(0x02, "ret", "")];
        let blocks = build_cfg(&stream);

        assert!(blocks[0].succs.is_empty());
    }

    #[test]
    fn indirect_jump_has_no_jump_edge() {
        let stream = vec![inst(0x00, "jmp", "rax"), inst(0x02, "ret", "")];
        let blocks = build_cfg(&stream);

        assert!(blocks[0].succs.is_empty());
    }

    #[test]
    fn empty_listing_builds_no_blocks() {
        assert!(build_cfg(&[]).is_empty());
    }

    #[test]
    fn backward_branch_splits_earlier_block() {
        let stream = vec![
            inst(0x00, "mov", "eax, 0"),
            inst(0x05, "inc", "eax"),
            inst(0x07, "cmp", "eax, 10"),
            inst(0x0a, "jne", "0x05"),
            inst(0x0c, "ret", ""),
        ];
        let blocks = build_cfg(&stream);

        let ids: Vec<u64> = blocks.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![0x00, 0x05, 0x0c]);
        assert_eq!(
            blocks[1].succs,
            vec![
                Edge {
                    to: 0x0c,
                    kind: EdgeKind::Fall
                },
                Edge {
                    to: 0x05,
                    kind: EdgeKind::Jump
                },
            ]
        );
    }
}
