// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Implements the common subexpression elimination (CSE) transformation.
//!
//! The pass runs a global value numbering scheme as an abstract
//! interpretation over a method's control-flow graph. The abstract state
//! tracks
//! 1. a mapping from registers to values, and
//! 2. a mapping from values to their first defining instructions.
//!
//! A value describes a computation the way an instruction does, with an
//! opcode, source dependencies, and at most one carried attribute (literal,
//! string, type, field, method, or data payload). Unlike an instruction it
//! has no identity, and its sources are other values rather than registers.
//! Values are interned into dense integer ids whose low bits record two
//! classifications fixed at interning time:
//! - whether the value is a pre-state source (see below), and
//! - whether it is barrier sensitive, i.e. read from the heap or derived
//!   from something that was.
//!
//! Memory reads participate in the numbering, so a redundant later read can
//! reuse the result of an earlier one. True memory barriers are modeled
//! conservatively: monitor instructions, invocations, volatile or unresolved
//! field accesses, and every heap write clear the barrier-sensitive half of
//! the definition environment and havoc every register holding a barrier
//! sensitive value. Thread-local behavior is therefore unaffected.
//!
//! There are no phi nodes. Conflicting register or definition information
//! merges to top at join points. When an instruction later reads a source
//! register whose binding is top, a fresh "pre-state source" value is
//! created, standing for the content of that register just before the
//! instruction, and pinned into the register environment. This recovers
//! tracking of merged or havocked registers lazily.
//!
//! Instructions whose result is tied to their position (parameter loads,
//! `move-exception`, allocations, and every barrier-inducing instruction)
//! get a positional value carrying their own code offset, which keeps
//! structurally equal occurrences apart.
//!
//! After the fixpoint is reached, each block is replayed once from its entry
//! state. Every instruction whose destination holds a value with an earlier
//! recorded definition yields a forwarding record. Patching then
//! - moves the result of each distinct earlier instruction into a fresh
//!   temp right after it, and
//! - moves the temp into the destination of each later equivalent
//!   instruction right after that one.
//!
//! The forwarded instruction itself is left in place; copy propagation and
//! local dead-code elimination are expected to collapse the now redundant
//! work in a subsequent pass.

use crate::type_oracle::{RegKind, TypeOracle};
use dex_analysis::{
    AbstractDomain, ControlFlowGraph, DataflowAnalysis, EnvironmentDomain, FlatDomain, JoinResult,
    TransferFunctions,
};
use dex_ir::{
    CodeOffset, DataId, FieldId, FieldResolver, FieldSearch, IRInstruction, IROpcode, MethodData,
    MethodId, Payload, Register, StringId, TypeId, RESULT_REGISTER,
};
use log::{debug, info};
use std::{cell::RefCell, collections::BTreeMap, ops::AddAssign};

pub const METRIC_RESULTS_CAPTURED: &str = "num_results_captured";
pub const METRIC_ELIMINATED_INSTRUCTIONS: &str = "num_eliminated_instructions";

// =================================================================================================
// Value numbering

/// Dense value id. The two low bits carry the classification, the rest the
/// interning serial.
pub type ValueId = u32;

const IS_PRE_STATE_SRC: ValueId = 0x01;
const IS_BARRIER_SENSITIVE: ValueId = 0x02;
const VALUE_ID_BASE: ValueId = 0x04;

pub fn is_pre_state_src(value_id: ValueId) -> bool {
    value_id & IS_PRE_STATE_SRC != 0
}

pub fn is_barrier_sensitive(value_id: ValueId) -> bool {
    value_id & IS_BARRIER_SENSITIVE != 0
}

/// What a value computes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum ValueOp {
    Insn(IROpcode),
    /// Marker for values representing the content of a source register just
    /// before a given instruction, used to recover from merged or havocked
    /// registers.
    PreStateSrc,
}

/// The one attribute a value carries besides its sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum ValuePayload {
    None,
    Literal(i64),
    String(StringId),
    Type(TypeId),
    Field(FieldId),
    Method(MethodId),
    Data(DataId),
    /// Ties the value to one instruction, keeping it distinct from any
    /// structurally equal value at another position.
    PositionalInsn(CodeOffset),
}

impl From<Payload> for ValuePayload {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::None => ValuePayload::None,
            Payload::Literal(l) => ValuePayload::Literal(l),
            Payload::String(s) => ValuePayload::String(s),
            Payload::Type(t) => ValuePayload::Type(t),
            Payload::Field(f) => ValuePayload::Field(f),
            Payload::Method(m) => ValuePayload::Method(m),
            Payload::Data(d) => ValuePayload::Data(d),
        }
    }
}

/// An abstract, identity-free description of a computation. For commutative
/// opcodes `srcs` is kept sorted, giving a canonical form. For pre-state
/// sources `srcs` holds the register itself rather than a value id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct IRValue {
    op: ValueOp,
    srcs: Vec<ValueId>,
    payload: ValuePayload,
}

/// Interns values into ids. Lives for the analysis of one method.
#[derive(Default)]
struct ValueTable {
    ids: BTreeMap<IRValue, ValueId>,
}

impl ValueTable {
    fn intern(&mut self, value: IRValue) -> ValueId {
        if let Some(&id) = self.ids.get(&value) {
            return id;
        }
        let serial = ValueId::try_from(self.ids.len()).expect("value id serial overflow");
        let mut id = serial
            .checked_mul(VALUE_ID_BASE)
            .expect("value id serial overflow");
        match value.op {
            ValueOp::PreStateSrc => id |= IS_PRE_STATE_SRC,
            ValueOp::Insn(opcode) if opcode.is_heap_read() => id |= IS_BARRIER_SENSITIVE,
            ValueOp::Insn(_) => {
                if value.srcs.iter().any(|&src| is_barrier_sensitive(src)) {
                    id |= IS_BARRIER_SENSITIVE;
                }
            },
        }
        self.ids.insert(value, id);
        id
    }
}

// =================================================================================================
// Abstract state

/// Product of the two definition environments and the register environment.
///
/// The definition environment is split by barrier sensitivity; only the
/// sensitive half is wiped at memory barriers. Defining instructions are
/// stored as offsets into the code vector under analysis and are only
/// consulted before any patching mutates it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CseState {
    sensitive_defs: EnvironmentDomain<ValueId, CodeOffset>,
    insensitive_defs: EnvironmentDomain<ValueId, CodeOffset>,
    refs: EnvironmentDomain<Register, ValueId>,
}

impl CseState {
    pub fn top() -> Self {
        Self {
            sensitive_defs: EnvironmentDomain::top(),
            insensitive_defs: EnvironmentDomain::top(),
            refs: EnvironmentDomain::top(),
        }
    }

    pub fn bottom() -> Self {
        Self {
            sensitive_defs: EnvironmentDomain::bottom(),
            insensitive_defs: EnvironmentDomain::bottom(),
            refs: EnvironmentDomain::bottom(),
        }
    }

    pub fn is_top(&self) -> bool {
        self.sensitive_defs.is_top() && self.insensitive_defs.is_top() && self.refs.is_top()
    }

    pub fn is_bottom(&self) -> bool {
        self.sensitive_defs.is_bottom()
            && self.insensitive_defs.is_bottom()
            && self.refs.is_bottom()
    }

    pub fn leq(&self, other: &Self) -> bool {
        self.sensitive_defs.leq(&other.sensitive_defs)
            && self.insensitive_defs.leq(&other.insensitive_defs)
            && self.refs.leq(&other.refs)
    }

    pub fn def_env(&self, barrier_sensitive: bool) -> &EnvironmentDomain<ValueId, CodeOffset> {
        if barrier_sensitive {
            &self.sensitive_defs
        } else {
            &self.insensitive_defs
        }
    }

    pub fn ref_env(&self) -> &EnvironmentDomain<Register, ValueId> {
        &self.refs
    }

    fn def_env_mut(&mut self, barrier_sensitive: bool) -> &mut EnvironmentDomain<ValueId, CodeOffset> {
        if barrier_sensitive {
            &mut self.sensitive_defs
        } else {
            &mut self.insensitive_defs
        }
    }
}

impl AbstractDomain for CseState {
    fn join(&mut self, other: &Self) -> JoinResult {
        self.sensitive_defs
            .join(&other.sensitive_defs)
            .combine(self.insensitive_defs.join(&other.insensitive_defs))
            .combine(self.refs.join(&other.refs))
    }
}

// =================================================================================================
// Transfer function

struct Analyzer<'a> {
    resolver: &'a dyn FieldResolver,
    /// Interning happens during transfer, which only has `&self`.
    values: RefCell<ValueTable>,
}

impl<'a> Analyzer<'a> {
    fn new(resolver: &'a dyn FieldResolver) -> Self {
        Self {
            resolver,
            values: RefCell::new(ValueTable::default()),
        }
    }

    /// Whether prior heap-derived facts survive past `insn`. Heap writes,
    /// monitor instructions and invocations never do; field reads only when
    /// the field resolves and is not volatile.
    fn induces_barrier(&self, insn: &IRInstruction) -> bool {
        let opcode = insn.opcode();
        if opcode.is_monitor()
            || opcode == IROpcode::FillArrayData
            || opcode.is_aput()
            || opcode.is_iput()
            || opcode.is_sput()
            || opcode.is_invoke()
        {
            return true;
        }
        if let Some(field) = insn.field() {
            let search = if opcode.is_sfield_op() {
                FieldSearch::Static
            } else {
                FieldSearch::Instance
            };
            return match self.resolver.resolve_field(field, search) {
                None => true,
                Some(attrs) => attrs.is_volatile,
            };
        }
        false
    }

    /// Numbers the computation of `insn` in `state`. Source registers bound
    /// to top get a pre-state source pinned back into the register
    /// environment, so subsequent instructions observe the same placeholder.
    fn value_id_of(&self, insn: &IRInstruction, offset: CodeOffset, state: &mut CseState) -> ValueId {
        let opcode = insn.opcode();
        let mut srcs = Vec::with_capacity(insn.srcs().len());
        let mut pinned: BTreeMap<Register, ValueId> = BTreeMap::new();
        for &reg in insn.srcs() {
            let value_id = match state.refs.get(&reg) {
                FlatDomain::Value(id) => id,
                _ => *pinned.entry(reg).or_insert_with(|| {
                    self.values.borrow_mut().intern(IRValue {
                        op: ValueOp::PreStateSrc,
                        // the register itself, not a value id
                        srcs: vec![reg],
                        payload: ValuePayload::PositionalInsn(offset),
                    })
                }),
            };
            srcs.push(value_id);
        }
        for (reg, value_id) in pinned {
            state.refs.set(reg, FlatDomain::Value(value_id));
        }
        if opcode.is_commutative() {
            srcs.sort_unstable();
        }
        let positional = opcode.is_load_param()
            || matches!(
                opcode,
                IROpcode::MoveException
                    | IROpcode::NewArray
                    | IROpcode::NewInstance
                    | IROpcode::FilledNewArray
            )
            || self.induces_barrier(insn);
        let payload = if positional {
            ValuePayload::PositionalInsn(offset)
        } else {
            ValuePayload::from(insn.payload())
        };
        self.values.borrow_mut().intern(IRValue {
            op: ValueOp::Insn(opcode),
            srcs,
            payload,
        })
    }
}

fn set_dest(state: &mut CseState, insn: &IRInstruction, value: FlatDomain<ValueId>) {
    let dest = insn.dest().expect("destination register");
    state.refs.set(dest, value);
    if insn.dest_is_wide() {
        state.refs.set(dest + 1, FlatDomain::Top);
    }
}

/// Records `offset` as the defining instruction of `value_id` unless one is
/// already known.
fn record_def(state: &mut CseState, value_id: ValueId, offset: CodeOffset) {
    let ibs = is_barrier_sensitive(value_id);
    if state.def_env(ibs).get(&value_id).value().is_none() {
        state.def_env_mut(ibs).set(value_id, FlatDomain::Value(offset));
    }
}

impl TransferFunctions for Analyzer<'_> {
    type State = CseState;

    fn execute(&self, state: &mut CseState, insn: &IRInstruction, offset: CodeOffset) {
        let opcode = insn.opcode();
        if opcode.is_move() {
            let value = state.refs.get(&insn.src(0));
            set_dest(state, insn, value);
        } else if opcode.is_any_move_result() {
            let value = state.refs.get(&RESULT_REGISTER);
            if let FlatDomain::Value(value_id) = value {
                record_def(state, value_id, offset);
            }
            set_dest(state, insn, value);
        } else if insn.dest().is_some() {
            let value_id = self.value_id_of(insn, offset, state);
            record_def(state, value_id, offset);
            set_dest(state, insn, FlatDomain::Value(value_id));
        } else if insn.has_move_result() || insn.has_move_result_pseudo() {
            let value_id = self.value_id_of(insn, offset, state);
            state
                .refs
                .set(RESULT_REGISTER, FlatDomain::Value(value_id));
        }

        if self.induces_barrier(insn) {
            state.def_env_mut(true).clear();
            let havocked: Vec<Register> = state
                .refs
                .iter()
                .filter(|(_, value_id)| is_barrier_sensitive(**value_id))
                .map(|(reg, _)| *reg)
                .collect();
            for reg in havocked {
                state.refs.set(reg, FlatDomain::Top);
            }
        }
    }
}

impl DataflowAnalysis for Analyzer<'_> {}

// =================================================================================================
// The pass

/// The result of `earlier` can replace the computation of `insn`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Forwarding {
    pub earlier: CodeOffset,
    pub insn: CodeOffset,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CseStats {
    /// Distinct earlier instructions whose result got captured into a temp.
    pub results_captured: usize,
    /// Later instructions made redundant, one per forwarding.
    pub instructions_eliminated: usize,
}

impl AddAssign for CseStats {
    fn add_assign(&mut self, other: Self) {
        self.results_captured += other.results_captured;
        self.instructions_eliminated += other.instructions_eliminated;
    }
}

impl CseStats {
    pub fn metrics(&self) -> [(&'static str, usize); 2] {
        [
            (METRIC_RESULTS_CAPTURED, self.results_captured),
            (METRIC_ELIMINATED_INSTRUCTIONS, self.instructions_eliminated),
        ]
    }
}

/// Per-method common subexpression elimination.
///
/// [`analyze`](Self::analyze) runs the fixpoint and records all forwarding
/// opportunities; [`patch`](Self::patch) materializes them. The split keeps
/// every consultation of recorded instruction offsets ahead of the first
/// code mutation.
pub struct CommonSubexpressionElimination {
    forwardings: Vec<Forwarding>,
    stats: CseStats,
}

impl CommonSubexpressionElimination {
    pub fn analyze(method: &MethodData, resolver: &dyn FieldResolver) -> Self {
        let code = &method.code;
        let cfg = ControlFlowGraph::new(code);
        let analyzer = Analyzer::new(resolver);
        let state_map = analyzer.analyze_function(CseState::top(), code, &cfg);

        // Replay each block from its entry state at the fixpoint and pair
        // every instruction with the first definition of its value.
        let mut forwardings = Vec::new();
        for block_id in cfg.blocks() {
            let Some(block_state) = state_map.get(&block_id) else {
                // unreachable block
                continue;
            };
            let mut env = block_state.pre.clone();
            for offset in cfg.instr_indexes(block_id) {
                let insn = &code[offset as usize];
                analyzer.execute(&mut env, insn, offset);
                let Some(dest) = insn.dest() else {
                    continue;
                };
                let opcode = insn.opcode();
                // moves and constants are cheaper to leave to copy
                // propagation
                if opcode.is_move() || opcode.is_const() {
                    continue;
                }
                let FlatDomain::Value(value_id) = env.ref_env().get(&dest) else {
                    continue;
                };
                assert!(
                    !is_pre_state_src(value_id),
                    "pre-state source bound to an instruction destination"
                );
                let ibs = is_barrier_sensitive(value_id);
                let FlatDomain::Value(earlier) = env.def_env(ibs).get(&value_id) else {
                    continue;
                };
                if earlier == offset {
                    continue;
                }
                if code[earlier as usize].opcode().is_load_param() {
                    continue;
                }
                forwardings.push(Forwarding {
                    earlier,
                    insn: offset,
                });
            }
        }

        Self {
            forwardings,
            stats: CseStats::default(),
        }
    }

    pub fn forwardings(&self) -> &[Forwarding] {
        &self.forwardings
    }

    pub fn stats(&self) -> &CseStats {
        &self.stats
    }

    /// Materializes the recorded forwardings. Returns whether the method
    /// changed.
    pub fn patch(&mut self, method: &mut MethodData, types: &dyn TypeOracle) -> bool {
        if self.forwardings.is_empty() {
            return false;
        }

        // One temp per distinct forwarding source. The same move opcode
        // serves both the capture after the source and the forwarding after
        // each replaced instruction.
        let mut captures: BTreeMap<CodeOffset, (IROpcode, Register)> = BTreeMap::new();
        for forwarding in &self.forwardings {
            if captures.contains_key(&forwarding.earlier) {
                continue;
            }
            let (kind, wide) = {
                let earlier_insn = &method.code[forwarding.earlier as usize];
                (
                    types
                        .dest_kind(forwarding.earlier, earlier_insn)
                        .expect("destination type unavailable while patching"),
                    earlier_insn.dest_is_wide(),
                )
            };
            let (move_opcode, temp) = if kind == RegKind::Reference {
                (IROpcode::MoveObject, method.allocate_temp())
            } else if wide {
                (IROpcode::MoveWide, method.allocate_wide_temp())
            } else {
                (IROpcode::Move, method.allocate_temp())
            };
            captures.insert(forwarding.earlier, (move_opcode, temp));
        }

        let mut forwards_at: BTreeMap<CodeOffset, (IROpcode, Register)> = BTreeMap::new();
        for forwarding in &self.forwardings {
            let (move_opcode, temp) = captures[&forwarding.earlier];
            debug!(
                "forwarding [{}] {} to [{}] {} via v{}",
                forwarding.earlier,
                method.code[forwarding.earlier as usize],
                forwarding.insn,
                method.code[forwarding.insn as usize],
                temp
            );
            let previous = forwards_at.insert(forwarding.insn, (move_opcode, temp));
            assert!(previous.is_none(), "instruction forwarded twice");
        }

        let code = std::mem::take(&mut method.code);
        let mut rebuilt = Vec::with_capacity(code.len() + captures.len() + forwards_at.len());
        for (offset, insn) in code.into_iter().enumerate() {
            let offset = offset as CodeOffset;
            let dest = insn.dest();
            rebuilt.push(insn);
            if let Some(&(move_opcode, temp)) = captures.get(&offset) {
                let src = dest.expect("forwarding source has a destination");
                rebuilt.push(
                    IRInstruction::new(move_opcode)
                        .with_dest(temp)
                        .with_srcs(vec![src]),
                );
            }
            if let Some(&(move_opcode, temp)) = forwards_at.get(&offset) {
                let dest = dest.expect("forwarded instruction has a destination");
                rebuilt.push(
                    IRInstruction::new(move_opcode)
                        .with_dest(dest)
                        .with_srcs(vec![temp]),
                );
            }
        }
        method.code = rebuilt;

        self.stats.results_captured += captures.len();
        self.stats.instructions_eliminated += self.forwardings.len();
        info!(
            "captured {} results, eliminated {} redundant instructions",
            captures.len(),
            self.forwardings.len()
        );
        true
    }
}

// =================================================================================================
// Tests


#[cfg(test)]
mod property_tests {
    use super::*;
    use dex_ir::{FieldAttrs, FieldTable, Label};
    use proptest::prelude::*;

    fn resolver() -> FieldTable {
        let mut fields = FieldTable::new();
        fields.insert(FieldId::new(0), FieldAttrs { is_volatile: false });
        fields.insert(FieldId::new(1), FieldAttrs { is_volatile: true });
        fields
    }

    /// One or two well-formed instructions over registers v0..v5.
    fn arb_unit() -> impl Strategy<Value = Vec<IRInstruction>> {
        prop_oneof![
            (0u32..6, -8i64..8).prop_map(|(dest, literal)| vec![IRInstruction::new(
                IROpcode::Const
            )
            .with_dest(dest)
            .with_literal(literal)]),
            (0u32..6, 0u32..6, 0u32..6).prop_map(|(dest, a, b)| vec![IRInstruction::new(
                IROpcode::AddInt
            )
            .with_dest(dest)
            .with_srcs(vec![a, b])]),
            (0u32..6, 0u32..6, 0u32..6).prop_map(|(dest, a, b)| vec![IRInstruction::new(
                IROpcode::SubInt
            )
            .with_dest(dest)
            .with_srcs(vec![a, b])]),
            (0u32..6, 0u32..6).prop_map(|(dest, src)| vec![IRInstruction::new(IROpcode::Move)
                .with_dest(dest)
                .with_srcs(vec![src])]),
            (0u32..6, 0u32..6, 0u32..3).prop_map(|(dest, obj, field)| vec![
                IRInstruction::new(IROpcode::Iget)
                    .with_dest(dest)
                    .with_srcs(vec![obj])
                    .with_field(FieldId::new(field))
            ]),
            (0u32..6, 0u32..6, 0u32..3).prop_map(|(src, obj, field)| vec![
                IRInstruction::new(IROpcode::Iput)
                    .with_srcs(vec![src, obj])
                    .with_field(FieldId::new(field))
            ]),
            (0u32..6, 0u32..3).prop_map(|(dest, method)| vec![
                IRInstruction::new(IROpcode::InvokeStatic).with_method(MethodId::new(method)),
                IRInstruction::new(IROpcode::MoveResult).with_dest(dest),
            ]),
            (0u32..6, 0u32..4).prop_map(|(dest, string)| vec![
                IRInstruction::new(IROpcode::ConstString).with_string(StringId::new(string)),
                IRInstruction::new(IROpcode::MoveResultPseudoObject).with_dest(dest),
            ]),
        ]
    }

    /// A diamond: prologue, branch over two generated arms, generated tail.
    fn arb_program() -> impl Strategy<Value = Vec<IRInstruction>> {
        (
            prop::collection::vec(arb_unit(), 0..8),
            prop::collection::vec(arb_unit(), 0..8),
            prop::collection::vec(arb_unit(), 0..8),
        )
            .prop_map(|(then_units, else_units, tail_units)| {
                let mut code = vec![
                    IRInstruction::new(IROpcode::LoadParam).with_dest(0),
                    IRInstruction::new(IROpcode::IfEqz)
                        .with_srcs(vec![0])
                        .with_label(Label::new(0)),
                ];
                code.extend(then_units.into_iter().flatten());
                code.push(IRInstruction::new(IROpcode::Goto).with_label(Label::new(1)));
                code.push(IRInstruction::new(IROpcode::Label).with_label(Label::new(0)));
                code.extend(else_units.into_iter().flatten());
                code.push(IRInstruction::new(IROpcode::Label).with_label(Label::new(1)));
                code.extend(tail_units.into_iter().flatten());
                code.push(IRInstruction::new(IROpcode::ReturnVoid));
                code
            })
    }

    fn arb_env<K: Ord + Clone + std::fmt::Debug, V: Clone + Eq + std::fmt::Debug>(
        keys: impl Strategy<Value = K>,
        values: impl Strategy<Value = V>,
    ) -> impl Strategy<Value = EnvironmentDomain<K, V>> {
        prop_oneof![
            1 => Just(EnvironmentDomain::bottom()),
            4 => prop::collection::btree_map(keys, values, 0..5).prop_map(|bindings| {
                let mut env = EnvironmentDomain::top();
                for (key, value) in bindings {
                    env.set(key, FlatDomain::Value(value));
                }
                env
            }),
        ]
    }

    fn arb_state() -> impl Strategy<Value = CseState> {
        (
            arb_env(0u32..8, 0u16..16),
            arb_env(0u32..8, 0u16..16),
            arb_env(0u32..6, 0u32..32),
        )
            .prop_map(|(sensitive_defs, insensitive_defs, refs)| CseState {
                sensitive_defs,
                insensitive_defs,
                refs,
            })
    }

    proptest! {
        #[test]
        fn fixpoint_is_idempotent(code in arb_program()) {
            let fields = resolver();
            let cfg = ControlFlowGraph::new(&code);
            let analyzer = Analyzer::new(&fields);
            let first = analyzer.analyze_function(CseState::top(), &code, &cfg);
            let second = analyzer.analyze_function(CseState::top(), &code, &cfg);
            prop_assert_eq!(&first, &second);
        }

        #[test]
        fn replay_from_entry_states_is_stable(code in arb_program()) {
            let fields = resolver();
            let method = MethodData::new(6, code);
            let first = CommonSubexpressionElimination::analyze(&method, &fields);
            let second = CommonSubexpressionElimination::analyze(&method, &fields);
            prop_assert_eq!(first.forwardings(), second.forwardings());
        }

        #[test]
        fn join_is_an_upper_bound(a in arb_state(), b in arb_state()) {
            let mut joined = a.clone();
            joined.join(&b);
            prop_assert!(a.leq(&joined));
            prop_assert!(b.leq(&joined));

            // absorbing: joining an operand again changes nothing
            let mut again = joined.clone();
            prop_assert_eq!(again.join(&b), JoinResult::Unchanged);
            prop_assert_eq!(&again, &joined);

            // commutative
            let mut flipped = b.clone();
            flipped.join(&a);
            prop_assert_eq!(&flipped, &joined);
        }

        #[test]
        fn commutative_sources_are_sorted(a in 0u32..6, b in 0u32..6) {
            let fields = resolver();
            let analyzer = Analyzer::new(&fields);
            let mut state = CseState::top();
            analyzer.execute(&mut state, &IRInstruction::new(IROpcode::LoadParam).with_dest(a), 0);
            analyzer.execute(&mut state, &IRInstruction::new(IROpcode::LoadParam).with_dest(b), 1);

            let one = IRInstruction::new(IROpcode::AddInt).with_dest(6).with_srcs(vec![a, b]);
            let two = IRInstruction::new(IROpcode::AddInt).with_dest(7).with_srcs(vec![b, a]);
            analyzer.execute(&mut state, &one, 2);
            analyzer.execute(&mut state, &two, 3);
            prop_assert_eq!(state.refs.get(&6), state.refs.get(&7));
            for value in analyzer.values.borrow().ids.keys() {
                if let ValueOp::Insn(opcode) = value.op {
                    if opcode.is_commutative() {
                        let mut sorted = value.srcs.clone();
                        sorted.sort_unstable();
                        prop_assert_eq!(&sorted, &value.srcs);
                    }
                }
            }
        }
    }
}
