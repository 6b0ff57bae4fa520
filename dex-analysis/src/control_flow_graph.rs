// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Basic-block control-flow graph over a method's code vector.
//!
//! Blocks are maximal instruction ranges: a leader is offset 0, every
//! `Label`, and every offset following a branching instruction. Dummy entry
//! and exit blocks delimit the graph so that every real block has a
//! predecessor path from the entry and every terminator an edge to the exit.

use dex_ir::{CodeOffset, IRInstruction, IROpcode, Label};
use std::{
    collections::{BTreeMap, BTreeSet},
    ops::Range,
};

pub type BlockId = u16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BlockContent {
    /// Instructions in the inclusive offset range `lower..=upper`.
    Basic { lower: CodeOffset, upper: CodeOffset },
    Dummy,
}

#[derive(Debug)]
struct Block {
    successors: Vec<BlockId>,
    content: BlockContent,
}

#[derive(Debug)]
pub struct ControlFlowGraph {
    entry_block_id: BlockId,
    exit_block_id: BlockId,
    blocks: BTreeMap<BlockId, Block>,
}

impl ControlFlowGraph {
    pub fn new(code: &[IRInstruction]) -> Self {
        assert!(
            code.len() <= CodeOffset::MAX as usize,
            "method code exceeds the addressable offset range"
        );
        let label_offsets: BTreeMap<Label, CodeOffset> = code
            .iter()
            .enumerate()
            .filter(|(_, insn)| insn.opcode() == IROpcode::Label)
            .map(|(offset, insn)| {
                (
                    insn.label().expect("label instruction target"),
                    offset as CodeOffset,
                )
            })
            .collect();

        let mut leaders: BTreeSet<CodeOffset> = BTreeSet::new();
        if !code.is_empty() {
            leaders.insert(0);
        }
        for (offset, insn) in code.iter().enumerate() {
            let offset = offset as CodeOffset;
            if insn.opcode() == IROpcode::Label {
                leaders.insert(offset);
            }
            if insn.opcode().is_branching() {
                if let Some(label) = insn.label() {
                    leaders.insert(*label_offsets.get(&label).expect("branch target"));
                }
                if (offset as usize) + 1 < code.len() {
                    leaders.insert(offset + 1);
                }
            }
        }

        // Basic blocks get ids in code order; the dummies follow.
        let leaders: Vec<CodeOffset> = leaders.into_iter().collect();
        let block_of_offset = |offset: CodeOffset| -> BlockId {
            match leaders.binary_search(&offset) {
                Ok(idx) => idx as BlockId,
                Err(idx) => (idx - 1) as BlockId,
            }
        };
        let entry_block_id = leaders.len() as BlockId;
        let exit_block_id = entry_block_id + 1;

        let mut blocks = BTreeMap::new();
        for (idx, &lower) in leaders.iter().enumerate() {
            let upper = leaders
                .get(idx + 1)
                .map(|next| next - 1)
                .unwrap_or(code.len() as CodeOffset - 1);
            let terminator = &code[upper as usize];
            let successors = match terminator.opcode() {
                IROpcode::Goto => {
                    let target = *label_offsets
                        .get(&terminator.label().expect("goto target"))
                        .expect("branch target");
                    vec![block_of_offset(target)]
                },
                op if op.is_conditional_branch() => {
                    let target = *label_offsets
                        .get(&terminator.label().expect("branch target"))
                        .expect("branch target");
                    let fall_through = if (upper as usize) + 1 < code.len() {
                        block_of_offset(upper + 1)
                    } else {
                        exit_block_id
                    };
                    vec![block_of_offset(target), fall_through]
                },
                op if op.is_branching() => vec![exit_block_id],
                _ => {
                    if (upper as usize) + 1 < code.len() {
                        vec![block_of_offset(upper + 1)]
                    } else {
                        vec![exit_block_id]
                    }
                },
            };
            blocks.insert(idx as BlockId, Block {
                successors,
                content: BlockContent::Basic { lower, upper },
            });
        }
        blocks.insert(entry_block_id, Block {
            successors: vec![if leaders.is_empty() { exit_block_id } else { 0 }],
            content: BlockContent::Dummy,
        });
        blocks.insert(exit_block_id, Block {
            successors: vec![],
            content: BlockContent::Dummy,
        });

        Self {
            entry_block_id,
            exit_block_id,
            blocks,
        }
    }

    pub fn entry_block(&self) -> BlockId {
        self.entry_block_id
    }

    pub fn exit_block(&self) -> BlockId {
        self.exit_block_id
    }

    /// All block ids, basic blocks in code order followed by the dummies.
    pub fn blocks(&self) -> Vec<BlockId> {
        self.blocks.keys().copied().collect()
    }

    pub fn successors(&self, block_id: BlockId) -> &[BlockId] {
        &self.blocks[&block_id].successors
    }

    /// Offsets of the instructions in the block; empty for the dummies.
    pub fn instr_indexes(&self, block_id: BlockId) -> Range<CodeOffset> {
        match self.blocks[&block_id].content {
            BlockContent::Basic { lower, upper } => lower..upper + 1,
            BlockContent::Dummy => 0..0,
        }
    }

    pub fn num_blocks(&self) -> u16 {
        self.blocks.len() as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dex_ir::{
        IRInstruction,
        IROpcode::{self, *},
        Label,
    };

    #[test]
    fn test_straight_line() {
        let code = vec![
            IRInstruction::new(LoadParam).with_dest(0),
            IRInstruction::new(AddInt).with_dest(1).with_srcs(vec![0, 0]),
            IRInstruction::new(ReturnVoid),
        ];
        let cfg = ControlFlowGraph::new(&code);
        assert_eq!(cfg.num_blocks(), 3);
        assert_eq!(cfg.instr_indexes(0), 0..3);
        assert_eq!(cfg.successors(cfg.entry_block()), &[0]);
        assert_eq!(cfg.successors(0), &[cfg.exit_block()]);
        assert_eq!(cfg.instr_indexes(cfg.entry_block()), 0..0);
    }

    #[test]
    fn test_diamond() {
        // 0: load-param v0
        // 1: if-eqz v0, L0
        // 2: const v1, #1
        // 3: goto L1
        // 4: L0:
        // 5: const v1, #2
        // 6: L1:
        // 7: return-void
        let code = vec![
            IRInstruction::new(LoadParam).with_dest(0),
            IRInstruction::new(IfEqz).with_srcs(vec![0]).with_label(Label::new(0)),
            IRInstruction::new(Const).with_dest(1).with_literal(1),
            IRInstruction::new(Goto).with_label(Label::new(1)),
            IRInstruction::new(IROpcode::Label).with_label(Label::new(0)),
            IRInstruction::new(Const).with_dest(1).with_literal(2),
            IRInstruction::new(IROpcode::Label).with_label(Label::new(1)),
            IRInstruction::new(ReturnVoid),
        ];
        let cfg = ControlFlowGraph::new(&code);
        // blocks: [0..1], [2..3], [4..5], [6..7], entry, exit
        assert_eq!(cfg.num_blocks(), 6);
        assert_eq!(cfg.instr_indexes(0), 0..2);
        assert_eq!(cfg.successors(0), &[2, 1]);
        assert_eq!(cfg.successors(1), &[3]);
        assert_eq!(cfg.successors(2), &[3]);
        assert_eq!(cfg.successors(3), &[cfg.exit_block()]);
    }

    #[test]
    fn test_loop_back_edge() {
        // 0: load-param v0
        // 1: L0:
        // 2: add-int v1, v0, v0
        // 3: if-eqz v1, L0
        // 4: return-void
        let code = vec![
            IRInstruction::new(LoadParam).with_dest(0),
            IRInstruction::new(IROpcode::Label).with_label(Label::new(0)),
            IRInstruction::new(AddInt).with_dest(1).with_srcs(vec![0, 0]),
            IRInstruction::new(IfEqz).with_srcs(vec![1]).with_label(Label::new(0)),
            IRInstruction::new(ReturnVoid),
        ];
        let cfg = ControlFlowGraph::new(&code);
        // blocks: [0..0], [1..3], [4..4], entry, exit
        assert_eq!(cfg.num_blocks(), 5);
        assert_eq!(cfg.successors(0), &[1]);
        assert_eq!(cfg.successors(1), &[1, 2]);
        assert_eq!(cfg.successors(2), &[cfg.exit_block()]);
    }

    #[test]
    fn test_empty_method() {
        let cfg = ControlFlowGraph::new(&[]);
        assert_eq!(cfg.num_blocks(), 2);
        assert_eq!(cfg.successors(cfg.entry_block()), &[cfg.exit_block()]);
    }
}
