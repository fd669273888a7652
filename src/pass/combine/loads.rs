//! Load and allocation rules: aggregate-load splitting, load hoisting
//! through upcasts, and promotion of existential stack allocations to their
//! concrete payload type.

use crate::ir::instr::{InstId, Instr, Opcode};
use crate::ir::types::Type;
use crate::ir::value::ValueId;
use crate::pattern;

use super::Combiner;

/// Which projection family a load user belongs to. Ordered so equal
/// projections sort adjacently.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ProjKind {
    Struct,
    Tuple,
}

impl Combiner<'_> {
    pub(super) fn visit_load(&mut self, id: InstId) -> Option<InstId> {
        let addr = self.unary_operand(id);

        // (load (upcast p)) -> (upcast (load p))
        if let Some((_, x)) = pattern::unary_op(self.func, addr, Opcode::Upcast) {
            let result_ty = self.result_ty(id);
            let mut b = self.builder_before(id);
            let (_, nl) = b.create_load(x);
            let (up, _) = b.create_upcast(nl, result_ty);
            return Some(up);
        }

        self.split_aggregate_load(id, addr);
        None
    }

    /// A load whose only users are struct/tuple extracts is canonicalized
    /// into one `(element_addr; load)` pair per distinct projection.
    fn split_aggregate_load(&mut self, id: InstId, addr: ValueId) {
        let result = self.result_of(id);
        if !self.func.has_uses(result) {
            return;
        }

        let mut projections: Vec<(ProjKind, usize, InstId)> = Vec::new();
        for u in self.func.uses_of(result) {
            match &self.func.inst(u.user).instr {
                Instr::StructExtract { field, .. } => {
                    projections.push((ProjKind::Struct, *field, u.user));
                }
                Instr::TupleExtract { index, .. } => {
                    projections.push((ProjKind::Tuple, *index, u.user));
                }
                _ => return,
            }
        }

        // Sort so duplicate projections become adjacent and share one load.
        projections.sort();

        let mut last: Option<(ProjKind, usize, InstId)> = None;
        for (kind, index, user) in projections {
            if let Some((lk, li, prev_load)) = last {
                if lk == kind && li == index {
                    let prev_value = self.result_of(prev_load);
                    self.replace_with_value(user, prev_value);
                    continue;
                }
            }
            let elem_ty = self.result_ty(user);
            let mut b = self.builder_before(id);
            let (_, gep) = match kind {
                ProjKind::Struct => {
                    b.create_struct_element_addr(addr, index, elem_ty.address_type())
                }
                ProjKind::Tuple => {
                    b.create_tuple_element_addr(addr, index, elem_ty.address_type())
                }
            };
            let (new_load, _) = b.create_load(gep);
            self.replace_with(user, new_load);
            last = Some((kind, index, new_load));
        }

        self.erase_and_note(id);
    }

    /// A stack slot whose only users are one `init_existential`, destroys
    /// and the dealloc is re-allocated at the concrete payload type.
    pub(super) fn visit_alloc_stack(&mut self, id: InstId) -> Option<InstId> {
        let result = self.result_of(id);

        let mut init: Option<InstId> = None;
        for u in self.func.uses_of(result) {
            match &self.func.inst(u.user).instr {
                Instr::DestroyAddr { .. } | Instr::DeallocStack { .. } => {}
                Instr::InitExistential { .. } => {
                    if init.is_some() {
                        return None;
                    }
                    init = Some(u.user);
                }
                _ => return None,
            }
        }
        let init = init?;

        let concrete = match &self.func.inst(init).instr {
            Instr::InitExistential { concrete_ty, .. } => concrete_ty.clone(),
            _ => unreachable!(),
        };

        let mut b = self.builder_before(id);
        let (_, conc_addr) = b.create_alloc_stack(concrete);
        drop(b);

        // Users of the existential projection now address the new slot.
        let init_result = self.result_of(init);
        self.enqueue_users(init_result);
        self.func.replace_all_uses(init_result, conc_addr);
        self.erase_and_note(init);

        // Rewrite destroys and deallocs at their own positions.
        let users: Vec<InstId> = self.func.uses_of(result).iter().map(|u| u.user).collect();
        for user in users {
            match self.func.inst(user).instr.opcode() {
                Opcode::DestroyAddr => {
                    let mut b = self.builder_before(user);
                    b.create_destroy_addr(conc_addr);
                    drop(b);
                    self.erase(user);
                }
                Opcode::DeallocStack => {
                    let mut b = self.builder_before(user);
                    b.create_dealloc_stack(conc_addr);
                    drop(b);
                    self.erase(user);
                }
                _ => unreachable!("alloc_stack user set changed during rewrite"),
            }
        }

        self.erase_and_note(id);
        None
    }

    /// `struct_extract(unchecked_ref_bit_cast X->Y, #field)` of a
    /// single-property struct is layout compatible with the field itself.
    pub(super) fn visit_struct_extract(&mut self, id: InstId) -> Option<InstId> {
        let operand = match self.func.inst(id).instr {
            Instr::StructExtract { operand, .. } => operand,
            _ => unreachable!(),
        };
        let op_ty = self.value_ty(operand);
        if op_ty.has_archetype() || op_ty.is_trivial(self.defs) {
            return None;
        }

        let (_, x) = pattern::unary_op(self.func, operand, Opcode::UncheckedRefBitCast)?;

        let Type::Struct(name) = &op_ty else {
            return None;
        };
        self.defs.single_stored_field(name)?;

        let result_ty = self.result_ty(id);
        let mut b = self.builder_before(id);
        let (new, _) = b.create_unchecked_ref_bit_cast(x, result_ty);
        Some(new)
    }
}
