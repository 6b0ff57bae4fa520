// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Analysis infrastructure over the register IR: basic-block control-flow
//! graphs, abstract-domain primitives, and a monotone fixpoint dataflow
//! engine instantiated by per-pass transfer functions.

pub mod control_flow_graph;
pub mod dataflow_analysis;
pub mod dataflow_domains;

pub use control_flow_graph::{BlockId, ControlFlowGraph};
pub use dataflow_analysis::{BlockState, DataflowAnalysis, StateMap, TransferFunctions};
pub use dataflow_domains::{AbstractDomain, EnvironmentDomain, FlatDomain, JoinResult};
