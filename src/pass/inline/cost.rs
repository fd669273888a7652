//! Inline cost model.
//!
//! Every instruction classifies as `Free`, `Expensive`, or
//! `CannotBeInlined`; a function's cost is the sum over its body. The model
//! assumes one IR instruction maps to roughly one machine-level instruction,
//! which is coarse but stable.

use crate::ir::function::{Function, FunctionId};
use crate::ir::instr::{InstId, Instr, Opcode};
use crate::ir::module::Module;
use crate::ir::types::MetatypeRepr;
use crate::pattern;

/// Sentinel returned for functions that must never be inlined.
pub const CANNOT_INLINE_COST: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InlineCost {
    Free,
    Expensive,
    CannotBeInlined,
}

pub(crate) fn instruction_cost(func: &Function, id: InstId) -> InlineCost {
    let node = func.inst(id);
    match node.instr.opcode() {
        // Constants, references and debug info cost nothing.
        Opcode::IntegerLiteral
        | Opcode::FloatLiteral
        | Opcode::StringLiteral
        | Opcode::BuiltinRef
        | Opcode::GlobalAddr
        | Opcode::FunctionRef
        | Opcode::DebugValue
        | Opcode::DebugValueAddr
        | Opcode::FixLifetime => InlineCost::Free,

        // Typed GEPs are address arithmetic folded into their users.
        Opcode::TupleElementAddr | Opcode::StructElementAddr => InlineCost::Free,

        // Aggregates are exploded at lower levels; these are no-ops.
        Opcode::Tuple | Opcode::Struct | Opcode::TupleExtract | Opcode::StructExtract => {
            InlineCost::Free
        }

        // Unchecked and pointer casts are free.
        Opcode::AddressToPointer
        | Opcode::PointerToAddress
        | Opcode::UncheckedRefCast
        | Opcode::UncheckedAddrCast
        | Opcode::UncheckedRefBitCast
        | Opcode::UncheckedTrivialBitCast
        | Opcode::RawPointerToRef
        | Opcode::RefToRawPointer
        | Opcode::Upcast
        | Opcode::ThinToThickFunction
        | Opcode::ConvertFunction
        | Opcode::ThickToObjCMetatype
        | Opcode::ObjCToThickMetatype
        | Opcode::ObjCMetatypeToObject
        | Opcode::ObjCExistentialMetatypeToObject => InlineCost::Free,

        Opcode::Return | Opcode::Unreachable => InlineCost::Free,

        // Thin metatypes have no runtime representation. Thick and foreign
        // ones may require generic or lazy instantiation.
        Opcode::Metatype => {
            let repr = node
                .result
                .and_then(|r| func.value_type(r))
                .and_then(|t| t.metatype_repr());
            if repr == Some(MetatypeRepr::Thin) {
                InlineCost::Free
            } else {
                InlineCost::Expensive
            }
        }

        // A direct call back into the enclosing function pins the body:
        // inlining it anywhere would replicate the recursion.
        Opcode::Apply => {
            if let Instr::Apply { callee, .. } = &node.instr {
                if pattern::function_ref(func, *callee) == Some(func.name.as_str()) {
                    return InlineCost::CannotBeInlined;
                }
            }
            InlineCost::Expensive
        }

        _ => InlineCost::Expensive,
    }
}

/// The inlining cost of `func`.
///
/// Transparent functions are always free. Summation aborts once the running
/// total exceeds `cutoff`, returning the partial sum; a directly-recursive
/// function returns [`CANNOT_INLINE_COST`].
pub fn function_cost(module: &Module, func: FunctionId, cutoff: u64) -> u64 {
    let f = module.function(func);
    log::debug!("calculating inline cost for '{}'", f.name);

    if f.transparent {
        return 0;
    }

    let mut cost = 0u64;
    for &block in f.layout() {
        for &inst in &f.block(block).insts {
            match instruction_cost(f, inst) {
                InlineCost::CannotBeInlined => return CANNOT_INLINE_COST,
                InlineCost::Free => {}
                InlineCost::Expensive => cost += 1,
            }
            // Past the cutoff the exact total no longer matters.
            if cost > cutoff {
                return cost;
            }
        }
    }
    log::debug!("inline cost for '{}': {}", f.name, cost);
    cost
}
