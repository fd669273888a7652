//! Enum rules: address-form injection collapsing, take-data promotion,
//! switch-over-address promotion and tag folding.

use crate::ir::instr::{InstId, Instr, Opcode};
use crate::ir::types::Type;
use crate::pattern;

use super::Combiner;

impl Combiner<'_> {
    /// `unchecked_enum_data(unchecked_ref_bit_cast X->Y, #case)` where
    /// `#case` is the first payloaded case is layout compatible with the
    /// payload itself.
    pub(super) fn visit_unchecked_enum_data(&mut self, id: InstId) -> Option<InstId> {
        let (operand, case) = match self.func.inst(id).instr {
            Instr::UncheckedEnumData { operand, case } => (operand, case),
            _ => unreachable!(),
        };
        let op_ty = self.value_ty(operand);
        if op_ty.has_archetype() || op_ty.is_trivial(self.defs) {
            return None;
        }

        let (_, x) = pattern::unary_op(self.func, operand, Opcode::UncheckedRefBitCast)?;

        let Type::Enum(name) = &op_ty else {
            return None;
        };
        if self.defs.first_payloaded_case(name) != Some(case) {
            return None;
        }

        let result_ty = self.result_ty(id);
        let mut b = self.builder_before(id);
        let (new, _) = b.create_unchecked_ref_bit_cast(x, result_ty);
        Some(new)
    }

    /// `switch_enum_addr` over a loadable enum loads the value and switches
    /// on it directly; cases and default are preserved.
    pub(super) fn visit_switch_enum_addr(&mut self, id: InstId) -> Option<InstId> {
        let (operand, cases, default) = match &self.func.inst(id).instr {
            Instr::SwitchEnumAddr { operand, cases, default } => {
                (*operand, cases.clone(), *default)
            }
            _ => unreachable!(),
        };
        if !self.value_ty(operand).object_type().is_loadable(self.defs) {
            return None;
        }

        let mut b = self.builder_before(id);
        let (_, value) = b.create_load(operand);
        b.create_switch_enum(value, cases, default);
        drop(b);
        self.erase_and_note(id);
        None
    }

    /// Collapses the two frontend initialization patterns
    ///
    ///   %payload_addr = init_enum_data_addr %slot, #case
    ///   store %payload to %payload_addr
    ///   inject_enum_addr %slot, #case
    ///
    ///   inject_enum_addr %slot, #case       // no payload
    ///
    /// into a whole-enum construction and a single store. Later cleanups
    /// forward the stored value.
    pub(super) fn visit_inject_enum_addr(&mut self, id: InstId) -> Option<InstId> {
        let (operand, case) = match self.func.inst(id).instr {
            Instr::InjectEnumAddr { operand, case } => (operand, case),
            _ => unreachable!(),
        };
        let addr_ty = self.value_ty(operand);
        assert!(addr_ty.is_address(), "inject_enum_addr of a non-address");
        if addr_ty.is_address_only(self.defs) {
            return None;
        }
        let enum_ty = addr_ty.object_type().clone();
        let Type::Enum(name) = &enum_ty else {
            return None;
        };

        if self.defs.case_payload(name, case).is_none() {
            let mut b = self.builder_before(id);
            let (_, e) = b.create_enum(enum_ty.clone(), case, None);
            b.create_store(e, operand);
            drop(b);
            self.erase_and_note(id);
            return None;
        }

        // Payloaded case: only safe when the payload store is directly
        // previous in the same block, so no intervening flow can observe
        // the half-initialized slot.
        let prev = self.func.prev_in_block(id)?;
        let (stored, dst) = match self.func.inst(prev).instr {
            Instr::Store { value, addr } => (value, addr),
            _ => return None,
        };
        let (proj, base, proj_case) = match pattern::inst_def(self.func, dst) {
            Some((pid, Instr::InitEnumDataAddr { operand: base, case: c })) => (pid, *base, *c),
            _ => return None,
        };
        if base != operand || !self.func.has_one_use(dst) {
            return None;
        }

        let mut b = self.builder_before(id);
        let (_, e) = b.create_enum(enum_ty, proj_case, Some(stored));
        b.create_store(e, operand);
        drop(b);
        self.erase(prev);
        self.erase(proj);
        self.erase_and_note(id);
        None
    }

    /// `unchecked_take_enum_data_addr` whose users are all loads becomes a
    /// load of the whole enum plus a value-level payload extraction per use.
    pub(super) fn visit_unchecked_take_enum_data_addr(&mut self, id: InstId) -> Option<InstId> {
        let (operand, case) = match self.func.inst(id).instr {
            Instr::UncheckedTakeEnumDataAddr { operand, case } => (operand, case),
            _ => unreachable!(),
        };
        let result = self.result_of(id);
        if !self.func.has_uses(result) {
            return None;
        }

        // An enum is address-only if any case is; a loadable payload can
        // still come out of an address-only enum, and then this rewrite
        // must not fire.
        if self.value_ty(operand).is_address_only(self.defs) {
            return None;
        }

        let mut loads = Vec::new();
        for u in self.func.uses_of(result) {
            match self.func.inst(u.user).instr {
                Instr::Load { .. } => loads.push(u.user),
                _ => return None,
            }
        }

        for load in loads {
            let payload_ty = self.result_ty(load);
            let mut b = self.builder_before(load);
            let (_, whole) = b.create_load(operand);
            let (extract, _) = b.create_unchecked_enum_data(whole, case, payload_ty);
            self.replace_with(load, extract);
        }

        self.erase_and_note(id);
        None
    }

    /// `enum_is_tag` of a statically-constructed enum folds to 0 or 1.
    pub(super) fn visit_enum_is_tag(&mut self, id: InstId) -> Option<InstId> {
        let (operand, case) = match self.func.inst(id).instr {
            Instr::EnumIsTag { operand, case } => (operand, case),
            _ => unreachable!(),
        };
        let constructed = match pattern::inst_def(self.func, operand) {
            Some((_, Instr::Enum { case: c, .. })) => *c,
            _ => return None,
        };
        let result_ty = self.result_ty(id);
        let mut b = self.builder_before(id);
        let (new, _) = b.create_integer_literal((constructed == case) as i128, result_ty);
        Some(new)
    }
}
