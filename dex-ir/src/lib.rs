// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! A register-based, Dalvik-style intermediate representation for method
//! code, as consumed by the analysis and optimization layers.
//!
//! The IR is a flat vector of instructions per method. Branch targets are
//! expressed via `Label` pseudo-instructions so that code vectors can be
//! rebuilt by transformation passes without invalidating control flow.

pub mod instruction;
pub mod method;
pub mod opcode;
pub mod refs;

pub use instruction::{CodeOffset, IRInstruction, Label, Payload, Register, RESULT_REGISTER};
pub use method::MethodData;
pub use opcode::IROpcode;
pub use refs::{
    DataId, FieldAttrs, FieldId, FieldResolver, FieldSearch, FieldTable, MethodId, StringId,
    TypeId,
};
