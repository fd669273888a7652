//! Compositional matchers over operand trees.
//!
//! Each matcher is a pure predicate on a value: it inspects the value's
//! defining instruction (and, by nesting calls, the producers of its
//! operands) and returns its captures on success. Failure leaves no trace,
//! so matchers can be retried freely.

use crate::ir::function::Function;
use crate::ir::instr::{BuiltinKind, InstId, Instr, Opcode};
use crate::ir::types::StringEncoding;
use crate::ir::value::{ValueDef, ValueId};

/// The instruction defining `v`, if `v` is an instruction result.
pub fn def_inst(func: &Function, v: ValueId) -> Option<InstId> {
    match func.value_def(v)? {
        ValueDef::InstResult { inst } => Some(*inst),
        ValueDef::BlockParam { .. } => None,
    }
}

/// The defining instruction of `v` together with its id.
pub fn inst_def<'f>(func: &'f Function, v: ValueId) -> Option<(InstId, &'f Instr)> {
    let id = def_inst(func, v)?;
    Some((id, &func.inst(id).instr))
}

/// Matches a single-operand instruction of the given opcode, capturing its
/// id and operand.
pub fn unary_op(func: &Function, v: ValueId, opcode: Opcode) -> Option<(InstId, ValueId)> {
    let (id, instr) = inst_def(func, v)?;
    if instr.opcode() != opcode {
        return None;
    }
    let ops = instr.operands();
    match ops.as_slice() {
        [only] => Some((id, *only)),
        _ => None,
    }
}

/// Matches an integer literal, capturing its value.
pub fn int_literal(func: &Function, v: ValueId) -> Option<i128> {
    match inst_def(func, v)? {
        (_, Instr::IntegerLiteral { value }) => Some(*value),
        _ => None,
    }
}

pub fn is_const_zero(func: &Function, v: ValueId) -> bool {
    int_literal(func, v) == Some(0)
}

pub fn is_const_one(func: &Function, v: ValueId) -> bool {
    int_literal(func, v) == Some(1)
}

/// Matches a string literal, capturing its contents and encoding.
pub fn string_literal<'f>(func: &'f Function, v: ValueId) -> Option<(&'f str, StringEncoding)> {
    match inst_def(func, v)? {
        (_, Instr::StringLiteral { value, encoding }) => Some((value, *encoding)),
        _ => None,
    }
}

/// Matches a direct reference to a named function, capturing the name.
pub fn function_ref<'f>(func: &'f Function, v: ValueId) -> Option<&'f str> {
    match inst_def(func, v)? {
        (_, Instr::FunctionRef { name }) => Some(name),
        _ => None,
    }
}

/// Matches an apply of the given builtin, capturing its arguments.
pub fn builtin_apply<'f>(
    func: &'f Function,
    v: ValueId,
    kind: BuiltinKind,
) -> Option<&'f [ValueId]> {
    let (found, args) = any_builtin_apply(func, v)?;
    (found == kind).then_some(args)
}

/// Matches an apply of any builtin, capturing the kind and arguments.
pub fn any_builtin_apply<'f>(func: &'f Function, v: ValueId) -> Option<(BuiltinKind, &'f [ValueId])> {
    let (_, instr) = inst_def(func, v)?;
    let Instr::Apply { callee, args, .. } = instr else {
        return None;
    };
    match inst_def(func, *callee)? {
        (_, Instr::BuiltinRef { kind }) => Some((*kind, args.as_slice())),
        _ => None,
    }
}

/// Matches `tuple_extract(agg, index)`, capturing the aggregate.
pub fn tuple_extract_of(func: &Function, v: ValueId, index: usize) -> Option<ValueId> {
    match inst_def(func, v)? {
        (_, Instr::TupleExtract { operand, index: i }) if *i == index => Some(*operand),
        _ => None,
    }
}

/// Matches `index_raw_pointer(base, index)`, capturing both operands.
pub fn index_raw_pointer(func: &Function, v: ValueId) -> Option<(ValueId, ValueId)> {
    match inst_def(func, v)? {
        (_, Instr::IndexRawPointer { base, index }) => Some((*base, *index)),
        _ => None,
    }
}

/// Matches a statically-known metatype producer, capturing its id.
pub fn metatype_inst(func: &Function, v: ValueId) -> Option<InstId> {
    match inst_def(func, v)? {
        (id, Instr::Metatype) => Some(id),
        _ => None,
    }
}
