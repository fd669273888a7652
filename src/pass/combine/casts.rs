//! Cast folding rules.
//!
//! Casts of the same family collapse pairwise, bit casts absorb weaker
//! casts, and unchecked casts that provably move up a class hierarchy
//! decay into plain upcasts.

use crate::ir::instr::{BuiltinKind, InstId, Instr, Opcode};
use crate::ir::types::{MetatypeRepr, Type};
use crate::ir::value::ValueId;
use crate::pattern;

use super::Combiner;

impl Combiner<'_> {
    pub(super) fn unary_operand(&self, id: InstId) -> ValueId {
        let ops = self.func.inst(id).instr.operands();
        match ops.as_slice() {
            [only] => *only,
            _ => panic!("{} is not unary", self.func.inst(id).instr.name()),
        }
    }

    /// `upcast(upcast x)` folds by redirecting the outer operand to `x`.
    pub(super) fn visit_upcast(&mut self, id: InstId) -> Option<InstId> {
        let operand = self.unary_operand(id);
        if let Some((inner, x)) = pattern::unary_op(self.func, operand, Opcode::Upcast) {
            self.redirect_operand(id, 0, x);
            if !self.func.has_uses(self.result_of(inner)) {
                self.erase(inner);
            }
            self.note_rewrite();
        }
        None
    }

    pub(super) fn visit_unchecked_ref_cast(&mut self, id: InstId) -> Option<InstId> {
        let operand = self.unary_operand(id);
        let result_ty = self.result_ty(id);

        // (unchecked_ref_cast (unchecked_ref_cast x X->Y) Y->Z)
        //   -> (unchecked_ref_cast x X->Z)
        // (unchecked_ref_cast (upcast x X->Y) Y->Z) -> (unchecked_ref_cast x X->Z)
        let inner = pattern::unary_op(self.func, operand, Opcode::UncheckedRefCast)
            .or_else(|| pattern::unary_op(self.func, operand, Opcode::Upcast));
        if let Some((_, x)) = inner {
            let mut b = self.builder_before(id);
            let (new, _) = b.create_unchecked_ref_cast(x, result_ty);
            return Some(new);
        }

        // An unchecked cast to a superclass is just an upcast.
        let op_ty = self.value_ty(operand);
        if result_ty != op_ty && result_ty.is_superclass_of(&op_ty, self.defs) {
            let mut b = self.builder_before(id);
            let (new, _) = b.create_upcast(operand, result_ty);
            return Some(new);
        }

        None
    }

    pub(super) fn visit_unchecked_addr_cast(&mut self, id: InstId) -> Option<InstId> {
        let operand = self.unary_operand(id);
        let result_ty = self.result_ty(id);

        // (unchecked_addr_cast (unchecked_addr_cast x X->Y) Y->Z)
        //   -> (unchecked_addr_cast x X->Z)
        if let Some((_, x)) = pattern::unary_op(self.func, operand, Opcode::UncheckedAddrCast) {
            let mut b = self.builder_before(id);
            let (new, _) = b.create_unchecked_addr_cast(x, result_ty);
            return Some(new);
        }

        // (unchecked_addr_cast cls->superclass) -> (upcast cls->superclass)
        let op_ty = self.value_ty(operand);
        if result_ty != op_ty
            && result_ty
                .object_type()
                .is_superclass_of(op_ty.object_type(), self.defs)
        {
            let mut b = self.builder_before(id);
            let (new, _) = b.create_upcast(operand, result_ty);
            return Some(new);
        }

        self.rewrite_addr_cast_of_loads(id, operand, &op_ty, &result_ty);
        None
    }

    /// If every user of the cast is a load, load the original type instead
    /// and bit-cast each loaded value.
    fn rewrite_addr_cast_of_loads(
        &mut self,
        id: InstId,
        operand: ValueId,
        op_ty: &Type,
        result_ty: &Type,
    ) {
        let result = self.result_of(id);
        if !self.func.has_uses(result) {
            return;
        }

        let input_ty = op_ty.object_type();
        let output_ty = result_ty.object_type();

        if input_ty.is_address_only(self.defs) || output_ty.is_address_only(self.defs) {
            return;
        }

        let input_trivial = input_ty.is_trivial(self.defs);
        let output_trivial = output_ty.is_trivial(self.defs);

        // Never turn a trivial value into a reference-counted one.
        if input_trivial && !output_trivial {
            return;
        }

        // Two structs may differ in size; casting pointers between them is
        // how the standard library reinterprets differently-sized integers,
        // and those must stay loads through the cast.
        if matches!(input_ty, Type::Struct(_)) && matches!(output_ty, Type::Struct(_)) {
            return;
        }

        let mut loads = Vec::new();
        for u in self.func.uses_of(result) {
            match self.func.inst(u.user).instr {
                Instr::Load { .. } => loads.push(u.user),
                _ => return,
            }
        }

        for load in loads {
            let load_ty = self.result_ty(load);
            let mut b = self.builder_before(load);
            let (_, nl) = b.create_load(operand);
            let (bc, _) = if output_trivial {
                b.create_unchecked_trivial_bit_cast(nl, load_ty)
            } else {
                b.create_unchecked_ref_bit_cast(nl, load_ty)
            };
            self.replace_with(load, bc);
        }
        self.erase_and_note(id);
    }

    pub(super) fn visit_unchecked_ref_bit_cast(&mut self, id: InstId) -> Option<InstId> {
        let operand = self.unary_operand(id);

        // (unchecked_ref_bit_cast Y->Z (unchecked_ref_bit_cast X->Y x))
        //   -> (unchecked_ref_bit_cast X->Z x)
        if let Some((_, x)) = pattern::unary_op(self.func, operand, Opcode::UncheckedRefBitCast) {
            let result_ty = self.result_ty(id);
            let mut b = self.builder_before(id);
            let (new, _) = b.create_unchecked_ref_bit_cast(x, result_ty);
            return Some(new);
        }
        None
    }

    pub(super) fn visit_unchecked_trivial_bit_cast(&mut self, id: InstId) -> Option<InstId> {
        let operand = self.unary_operand(id);

        // A trivial bit cast absorbs both trivial and ref bit casts beneath it.
        let inner = pattern::unary_op(self.func, operand, Opcode::UncheckedTrivialBitCast)
            .or_else(|| pattern::unary_op(self.func, operand, Opcode::UncheckedRefBitCast));
        if let Some((_, x)) = inner {
            let result_ty = self.result_ty(id);
            let mut b = self.builder_before(id);
            let (new, _) = b.create_unchecked_trivial_bit_cast(x, result_ty);
            return Some(new);
        }
        None
    }

    /// `ref_to_raw_pointer(unchecked_ref_cast x)` ignores the cast: the raw
    /// pointer is the same either way.
    pub(super) fn visit_ref_to_raw_pointer(&mut self, id: InstId) -> Option<InstId> {
        let operand = self.unary_operand(id);
        if let Some((inner, x)) = pattern::unary_op(self.func, operand, Opcode::UncheckedRefCast) {
            self.redirect_operand(id, 0, x);
            if !self.func.has_uses(self.result_of(inner)) {
                self.erase(inner);
            }
            self.note_rewrite();
        }
        None
    }

    /// `raw_pointer_to_ref(ref_to_raw_pointer x)` is an unchecked ref cast.
    pub(super) fn visit_raw_pointer_to_ref(&mut self, id: InstId) -> Option<InstId> {
        let operand = self.unary_operand(id);
        if let Some((_, x)) = pattern::unary_op(self.func, operand, Opcode::RefToRawPointer) {
            let result_ty = self.result_ty(id);
            let mut b = self.builder_before(id);
            let (new, _) = b.create_unchecked_ref_cast(x, result_ty);
            return Some(new);
        }
        None
    }

    pub(super) fn visit_pointer_to_address(&mut self, id: InstId) -> Option<InstId> {
        let operand = self.unary_operand(id);
        let result_ty = self.result_ty(id);

        // (pointer_to_address (address_to_pointer x)) -> (unchecked_addr_cast x)
        // Always legal: the round trip implies layout compatibility.
        if let Some((_, x)) = pattern::unary_op(self.func, operand, Opcode::AddressToPointer) {
            let mut b = self.builder_before(id);
            let (new, _) = b.create_unchecked_addr_cast(x, result_ty);
            return Some(new);
        }

        // Turn a raw-pointer stride walk back into a typed index:
        //
        //   %bytes = smul_over %distance, strideof(T)
        //   %ptr'  = index_raw_pointer %ptr, tuple_extract(%bytes, 0)
        //   %a     = pointer_to_address %ptr', $*T
        // ->
        //   %a     = index_addr (pointer_to_address %ptr, $*T), %distance
        let (ptr, idx) = pattern::index_raw_pointer(self.func, operand)?;
        let bytes = pattern::tuple_extract_of(self.func, idx, 0)?;
        let args = pattern::builtin_apply(self.func, bytes, BuiltinKind::SMulOver)?;
        if args.len() != 3 {
            return None;
        }
        let (distance, stride) = (args[0], args[1]);
        let (skind, sargs) = pattern::any_builtin_apply(self.func, stride)?;
        if !skind.is_strideof() || sargs.len() != 1 {
            return None;
        }
        let metatype = pattern::metatype_inst(self.func, sargs[0])?;
        let instance = self
            .result_ty(metatype)
            .metatype_instance()?
            .clone();

        // The stride type must be the type we are casting to, or the walk
        // would advance by the wrong amount.
        if Type::address_of(instance) != result_ty {
            return None;
        }

        let mut b = self.builder_before(id);
        let (_, base) = b.create_pointer_to_address(ptr, result_ty);
        let (new, _) = b.create_index_addr(base, distance);
        Some(new)
    }

    /// With runtime asserts stripped, a checked cast degrades to the
    /// matching unchecked cast.
    pub(super) fn visit_unconditional_checked_cast(&mut self, id: InstId) -> Option<InstId> {
        if !self.options.remove_runtime_asserts {
            return None;
        }
        let operand = self.unary_operand(id);
        let result_ty = self.result_ty(id);
        let op_ty = self.value_ty(operand);

        if op_ty.is_address() {
            let mut b = self.builder_before(id);
            let (new, _) = b.create_unchecked_addr_cast(operand, result_ty);
            return Some(new);
        }
        if op_ty.has_reference_semantics() {
            let mut b = self.builder_before(id);
            let (new, _) = b.create_unchecked_ref_cast(operand, result_ty);
            return Some(new);
        }
        None
    }

    pub(super) fn visit_thick_to_objc_metatype(&mut self, id: InstId) -> Option<InstId> {
        self.fold_metatype_conversion(id, MetatypeRepr::Thick)
    }

    pub(super) fn visit_objc_to_thick_metatype(&mut self, id: InstId) -> Option<InstId> {
        self.fold_metatype_conversion(id, MetatypeRepr::ObjC)
    }

    /// A representation conversion over a same-kind metatype producer is
    /// folded by reissuing the producer in the target representation.
    fn fold_metatype_conversion(
        &mut self,
        id: InstId,
        source_repr: MetatypeRepr,
    ) -> Option<InstId> {
        let operand = self.unary_operand(id);
        if self.value_ty(operand).metatype_repr() != Some(source_repr) {
            return None;
        }
        let result_ty = self.result_ty(id);

        let (_, instr) = pattern::inst_def(self.func, operand)?;
        match instr {
            Instr::Metatype => {
                let mut b = self.builder_before(id);
                let (new, _) = b.create_metatype(result_ty);
                Some(new)
            }
            Instr::ValueMetatype { operand: base } => {
                let base = *base;
                let mut b = self.builder_before(id);
                let (new, _) = b.create_value_metatype(base, result_ty);
                Some(new)
            }
            Instr::ExistentialMetatype { operand: base } => {
                let base = *base;
                let mut b = self.builder_before(id);
                let (new, _) = b.create_existential_metatype(base, result_ty);
                Some(new)
            }
            _ => None,
        }
    }
}
