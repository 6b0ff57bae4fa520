// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Optimization passes over the register IR.
//!
//! Passes run per method and mutate the method's code in place; a driver is
//! expected to iterate methods, feed each pass the resolver and type-oracle
//! collaborators it needs, and fold the returned statistics.

pub mod common_subexpression_elimination;
pub mod type_oracle;

pub use common_subexpression_elimination::{
    CommonSubexpressionElimination, CseStats, Forwarding, METRIC_ELIMINATED_INSTRUCTIONS,
    METRIC_RESULTS_CAPTURED,
};
pub use type_oracle::{OpcodeTypeOracle, RegKind, TypeOracle};
