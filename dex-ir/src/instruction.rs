// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! The instruction type: an opcode together with an optional destination
//! register, source registers, one carried attribute (the payload), and a
//! branch-target label where applicable.

use crate::{
    opcode::IROpcode,
    refs::{DataId, FieldId, MethodId, StringId, TypeId},
};
use itertools::Itertools;
use std::fmt;

/// A machine register. Wide values occupy the pair `(r, r + 1)`.
pub type Register = u32;

/// The distinguished register holding the result of the most recent invoke
/// or result-attached instruction, until captured by a `MoveResult*`.
pub const RESULT_REGISTER: Register = Register::MAX;

/// Index of an instruction within a method's code vector.
pub type CodeOffset = u16;

/// A branch target, marked in code by a `Label` pseudo-instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(u16);

impl Label {
    pub fn new(idx: u16) -> Self {
        Self(idx)
    }

    pub fn raw(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// The single attribute an instruction carries besides its registers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Payload {
    #[default]
    None,
    Literal(i64),
    String(StringId),
    Type(TypeId),
    Field(FieldId),
    Method(MethodId),
    Data(DataId),
}

/// One IR instruction.
///
/// Built with the `with_*` constructors:
///
/// ```
/// use dex_ir::{IRInstruction, IROpcode};
///
/// let add = IRInstruction::new(IROpcode::AddInt).with_dest(2).with_srcs(vec![0, 1]);
/// assert_eq!(format!("{}", add), "add-int v2, v0, v1");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IRInstruction {
    opcode: IROpcode,
    dest: Option<Register>,
    srcs: Vec<Register>,
    payload: Payload,
    label: Option<Label>,
}

impl IRInstruction {
    pub fn new(opcode: IROpcode) -> Self {
        Self {
            opcode,
            dest: None,
            srcs: Vec::new(),
            payload: Payload::None,
            label: None,
        }
    }

    pub fn with_dest(mut self, dest: Register) -> Self {
        self.dest = Some(dest);
        self
    }

    pub fn with_srcs(mut self, srcs: Vec<Register>) -> Self {
        self.srcs = srcs;
        self
    }

    pub fn with_literal(mut self, literal: i64) -> Self {
        self.payload = Payload::Literal(literal);
        self
    }

    pub fn with_string(mut self, string: StringId) -> Self {
        self.payload = Payload::String(string);
        self
    }

    pub fn with_type(mut self, ty: TypeId) -> Self {
        self.payload = Payload::Type(ty);
        self
    }

    pub fn with_field(mut self, field: FieldId) -> Self {
        self.payload = Payload::Field(field);
        self
    }

    pub fn with_method(mut self, method: MethodId) -> Self {
        self.payload = Payload::Method(method);
        self
    }

    pub fn with_data(mut self, data: DataId) -> Self {
        self.payload = Payload::Data(data);
        self
    }

    pub fn with_label(mut self, label: Label) -> Self {
        self.label = Some(label);
        self
    }

    pub fn opcode(&self) -> IROpcode {
        self.opcode
    }

    pub fn dest(&self) -> Option<Register> {
        self.dest
    }

    /// The destination occupies the wide pair `(dest, dest + 1)`.
    pub fn dest_is_wide(&self) -> bool {
        self.opcode.dest_is_wide()
    }

    pub fn srcs(&self) -> &[Register] {
        &self.srcs
    }

    /// The `i`-th source register. Panics when out of range.
    pub fn src(&self, i: usize) -> Register {
        self.srcs[i]
    }

    pub fn payload(&self) -> Payload {
        self.payload
    }

    pub fn literal(&self) -> Option<i64> {
        match self.payload {
            Payload::Literal(l) => Some(l),
            _ => None,
        }
    }

    pub fn string(&self) -> Option<StringId> {
        match self.payload {
            Payload::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_ref(&self) -> Option<TypeId> {
        match self.payload {
            Payload::Type(t) => Some(t),
            _ => None,
        }
    }

    pub fn field(&self) -> Option<FieldId> {
        match self.payload {
            Payload::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn method(&self) -> Option<MethodId> {
        match self.payload {
            Payload::Method(m) => Some(m),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<DataId> {
        match self.payload {
            Payload::Data(d) => Some(d),
            _ => None,
        }
    }

    pub fn label(&self) -> Option<Label> {
        self.label
    }

    pub fn has_move_result(&self) -> bool {
        self.opcode.has_move_result()
    }

    pub fn has_move_result_pseudo(&self) -> bool {
        self.opcode.has_move_result_pseudo()
    }
}

impl fmt::Display for IRInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.opcode == IROpcode::Label {
            return write!(f, "{}:", self.label.expect("label instruction target"));
        }
        let mut operands: Vec<String> = Vec::new();
        if let Some(dest) = self.dest {
            operands.push(format!("v{}", dest));
        }
        for &r in &self.srcs {
            if r == RESULT_REGISTER {
                operands.push("vRESULT".to_string());
            } else {
                operands.push(format!("v{}", r));
            }
        }
        match self.payload {
            Payload::None => {},
            Payload::Literal(l) => operands.push(format!("#{}", l)),
            Payload::String(s) => operands.push(format!("string@{}", s.raw())),
            Payload::Type(t) => operands.push(format!("type@{}", t.raw())),
            Payload::Field(fl) => operands.push(format!("field@{}", fl.raw())),
            Payload::Method(m) => operands.push(format!("method@{}", m.raw())),
            Payload::Data(d) => operands.push(format!("data@{}", d.raw())),
        }
        if let Some(label) = self.label {
            operands.push(format!("{}", label));
        }
        if operands.is_empty() {
            write!(f, "{}", self.opcode)
        } else {
            write!(f, "{} {}", self.opcode, operands.iter().join(", "))
        }
    }
}
