// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Forward monotone fixpoint engine over a control-flow graph.
//!
//! A pass instantiates [`TransferFunctions`] with its abstract state and
//! per-instruction effect; [`DataflowAnalysis::analyze_function`] then runs a
//! worklist iteration from the entry block until the per-block entry states
//! stabilize. The entry state of a block is the join of its predecessors'
//! exit states; blocks never reached stay out of the result map.

use crate::{
    control_flow_graph::{BlockId, ControlFlowGraph},
    dataflow_domains::{AbstractDomain, JoinResult},
};
use dex_ir::{CodeOffset, IRInstruction};
use std::collections::{BTreeMap, VecDeque};

/// Entry and exit state of one block at the fixpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockState<State: Clone> {
    pub pre: State,
    pub post: State,
}

pub type StateMap<State> = BTreeMap<BlockId, BlockState<State>>;

/// The per-instruction effect of an analysis.
pub trait TransferFunctions {
    type State: AbstractDomain + Clone;

    fn execute(&self, state: &mut Self::State, instr: &IRInstruction, offset: CodeOffset);

    fn execute_block(
        &self,
        block_id: BlockId,
        pre_state: &Self::State,
        instrs: &[IRInstruction],
        cfg: &ControlFlowGraph,
    ) -> Self::State {
        let mut state = pre_state.clone();
        for offset in cfg.instr_indexes(block_id) {
            self.execute(&mut state, &instrs[offset as usize], offset);
        }
        state
    }
}

pub trait DataflowAnalysis: TransferFunctions {
    fn analyze_function(
        &self,
        initial_state: Self::State,
        instrs: &[IRInstruction],
        cfg: &ControlFlowGraph,
    ) -> StateMap<Self::State> {
        let mut state_map: StateMap<Self::State> = StateMap::new();
        let mut work_list = VecDeque::new();
        let entry = cfg.entry_block();
        state_map.insert(entry, BlockState {
            pre: initial_state.clone(),
            post: initial_state,
        });
        work_list.push_back(entry);

        while let Some(block_id) = work_list.pop_front() {
            let pre = state_map
                .get(&block_id)
                .expect("worklist block has a pre state")
                .pre
                .clone();
            let post = self.execute_block(block_id, &pre, instrs, cfg);
            for successor in cfg.successors(block_id) {
                match state_map.get_mut(successor) {
                    Some(successor_state) => {
                        if successor_state.pre.join(&post) == JoinResult::Changed {
                            work_list.push_back(*successor);
                        }
                    },
                    None => {
                        state_map.insert(*successor, BlockState {
                            pre: post.clone(),
                            post: post.clone(),
                        });
                        work_list.push_back(*successor);
                    },
                }
            }
            state_map
                .get_mut(&block_id)
                .expect("worklist block has a state")
                .post = post;
        }
        state_map
    }
}
