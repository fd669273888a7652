//! Reference-counting peepholes.
//!
//! Value-level retains and releases decay according to what is known about
//! the operand: trivial operands need no counting at all, plain references
//! take the strong form, and enum constructions forward the operation to
//! their payload. Adjacent release/retain pairs on the same value cancel;
//! the matching operations live in other blocks and are left to the global
//! reference-count optimizer.

use crate::ir::instr::{InstId, Instr, Opcode};
use crate::ir::value::ValueId;
use crate::pattern;

use super::Combiner;

impl Combiner<'_> {
    /// The payload of `v`'s defining `enum` construction, if `v` is one:
    /// `Some(None)` for a payloadless case.
    fn enum_construction_payload(&self, v: ValueId) -> Option<Option<ValueId>> {
        match pattern::inst_def(self.func, v) {
            Some((_, Instr::Enum { payload, .. })) => Some(*payload),
            _ => None,
        }
    }

    pub(super) fn visit_release_value(&mut self, id: InstId) -> Option<InstId> {
        let operand = self.unary_operand(id);

        // Releasing a just-built enum: nothing to do for payloadless or
        // trivial-payload cases; otherwise release the payload directly.
        if let Some(payload) = self.enum_construction_payload(operand) {
            return match payload {
                None => {
                    self.erase_and_note(id);
                    None
                }
                Some(p) if self.value_ty(p).is_trivial(self.defs) => {
                    self.erase_and_note(id);
                    None
                }
                Some(p) => {
                    let mut b = self.builder_before(id);
                    let new = b.create_release_value(p);
                    Some(new)
                }
            };
        }

        let ty = self.value_ty(operand);
        if ty.has_reference_semantics() {
            let mut b = self.builder_before(id);
            let new = b.create_strong_release(operand);
            return Some(new);
        }
        if ty.is_trivial(self.defs) {
            self.erase_and_note(id);
        }
        None
    }

    pub(super) fn visit_retain_value(&mut self, id: InstId) -> Option<InstId> {
        let operand = self.unary_operand(id);

        if let Some(payload) = self.enum_construction_payload(operand) {
            return match payload {
                None => {
                    self.erase_and_note(id);
                    None
                }
                Some(p) if self.value_ty(p).is_trivial(self.defs) => {
                    self.erase_and_note(id);
                    None
                }
                Some(p) => {
                    let mut b = self.builder_before(id);
                    let new = b.create_retain_value(p);
                    Some(new)
                }
            };
        }

        let ty = self.value_ty(operand);
        if ty.has_reference_semantics() {
            let mut b = self.builder_before(id);
            let new = b.create_strong_retain(operand);
            return Some(new);
        }
        if ty.is_trivial(self.defs) {
            self.erase_and_note(id);
            return None;
        }

        // release_value %v directly followed by retain_value %v cancels.
        if let Some(prev) = self.func.prev_in_block(id) {
            if let Instr::ReleaseValue { operand: released } = self.func.inst(prev).instr {
                if released == operand {
                    self.erase(prev);
                    self.erase_and_note(id);
                }
            }
        }
        None
    }

    pub(super) fn visit_strong_retain(&mut self, id: InstId) -> Option<InstId> {
        let operand = self.unary_operand(id);

        if self.is_trivially_counted_producer(operand) {
            self.erase_and_note(id);
            return None;
        }

        // strong_release %v directly followed by strong_retain %v cancels.
        if let Some(prev) = self.func.prev_in_block(id) {
            if let Instr::StrongRelease { operand: released } = self.func.inst(prev).instr {
                if released == operand {
                    self.erase(prev);
                    self.erase_and_note(id);
                }
            }
        }
        None
    }

    pub(super) fn visit_strong_release(&mut self, id: InstId) -> Option<InstId> {
        let operand = self.unary_operand(id);
        if self.is_trivially_counted_producer(operand) {
            self.erase_and_note(id);
        }
        None
    }

    /// Values produced by these conversions carry no counting obligations:
    /// a thin function has no context to own, and metatype-to-object
    /// conversions yield permanent objects.
    fn is_trivially_counted_producer(&self, v: ValueId) -> bool {
        matches!(
            pattern::inst_def(self.func, v).map(|(_, i)| i.opcode()),
            Some(
                Opcode::ThinToThickFunction
                    | Opcode::ObjCMetatypeToObject
                    | Opcode::ObjCExistentialMetatypeToObject
            )
        )
    }
}
