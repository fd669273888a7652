//! Apply rewrites and builtin constant folding: closure-application
//! flattening, convert_function unwrapping, dead effectless calls,
//! arithmetic identities, runtime-assert stripping and branch-condition
//! simplification.

use crate::ir::instr::{BuiltinKind, InstId, Instr, Opcode, OperandList};
use crate::ir::types::{EffectsKind, Type, TypeTrait};
use crate::ir::value::ValueId;
use crate::pattern;

use super::Combiner;

/// What the oracle knows about a value being zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IsZeroKind {
    Zero,
    NotZero,
    Unknown,
}

impl Combiner<'_> {
    pub(super) fn visit_apply(&mut self, id: InstId) -> Option<InstId> {
        let (callee, args, subs, transparent) = match &self.func.inst(id).instr {
            Instr::Apply { callee, args, substitutions, transparent } => {
                (*callee, args.clone(), substitutions.clone(), *transparent)
            }
            _ => unreachable!(),
        };

        // apply{partial_apply(x, y)}(z) -> apply(z, x, y)
        if let Some((pai, Instr::PartialApply { .. })) = pattern::inst_def(self.func, callee) {
            return self.fold_apply_of_partial_apply(id, pai, &args, &subs, transparent);
        }

        if let Some((_, Instr::BuiltinRef { kind })) = pattern::inst_def(self.func, callee) {
            let kind = *kind;
            return self.fold_builtin(id, kind, &args, &subs);
        }

        if let Some((cfi, Instr::ConvertFunction { .. })) = pattern::inst_def(self.func, callee) {
            return self.fold_apply_of_convert_function(id, cfi, &args);
        }

        if let Some(name) = pattern::function_ref(self.func, callee) {
            if let Some(decl) = self.decls.get(name) {
                if decl.effects < EffectsKind::ReadWrite {
                    if self.eliminate_dead_effectless_call(id, callee, &args) {
                        return None;
                    }
                    if let Some(new) = self.fold_string_concat(id) {
                        return Some(new);
                    }
                }
            }
        }

        // (apply (thin_to_thick_function f)) -> (apply f)
        if subs.is_empty() {
            if let Some((_, f)) = pattern::unary_op(self.func, callee, Opcode::ThinToThickFunction)
            {
                let result_ty = self.result_ty(id);
                let mut b = self.builder_before(id);
                let (new, _) =
                    b.create_apply(f, args.iter().copied(), Vec::new(), transparent, result_ty);
                return Some(new);
            }
        }

        None
    }

    /// Flattens a call of a closure into a call of the closed-over function
    /// with the captured arguments appended.
    fn fold_apply_of_partial_apply(
        &mut self,
        id: InstId,
        pai: InstId,
        outer_args: &[ValueId],
        outer_subs: &[Type],
        transparent: bool,
    ) -> Option<InstId> {
        if !outer_subs.is_empty() {
            return None;
        }
        let (pai_callee, pai_args, pai_subs) = match &self.func.inst(pai).instr {
            Instr::PartialApply { callee, args, substitutions } => {
                (*callee, args.clone(), substitutions.clone())
            }
            _ => unreachable!(),
        };
        if pai_subs.iter().any(Type::has_archetype) {
            return None;
        }
        pattern::function_ref(self.func, pai_callee)?;

        let mut all_args: OperandList = outer_args.iter().copied().collect();
        all_args.extend(pai_args.iter().copied());

        // The closure owned its captures; the flattened apply consumes them
        // directly, so each non-address capture needs a balancing retain.
        let to_retain: Vec<ValueId> = pai_args
            .iter()
            .copied()
            .filter(|&a| !self.value_ty(a).is_address())
            .collect();

        let result_ty = self.result_ty(id);
        let pai_value = self.result_of(pai);
        let mut b = self.builder_before(id);
        for &arg in &to_retain {
            b.create_retain_value(arg);
        }
        let (new, _) = b.create_apply(pai_callee, all_args, pai_subs, transparent, result_ty);
        // The apply consumed the closure itself.
        b.create_strong_release(pai_value);
        Some(new)
    }

    fn fold_builtin(
        &mut self,
        id: InstId,
        kind: BuiltinKind,
        args: &[ValueId],
        subs: &[Type],
    ) -> Option<InstId> {
        match kind {
            BuiltinKind::CanBeClass => {
                let queried = subs.first()?;
                let folded = match queried.can_be_class(self.defs) {
                    TypeTrait::IsNot => 0,
                    TypeTrait::Is => 1,
                    TypeTrait::CanBe => return None,
                };
                let result_ty = self.result_ty(id);
                let mut b = self.builder_before(id);
                let (new, _) = b.create_integer_literal(folded, result_ty);
                Some(new)
            }
            BuiltinKind::ICmpEq => self.fold_compare_eq(id, args, false),
            BuiltinKind::ICmpNe => self.fold_compare_eq(id, args, true),
            BuiltinKind::Sub => self.fold_sub(id, args),
            BuiltinKind::SMulOver => self.normalize_stride_multiply(id, args),
            _ => None,
        }
    }

    /// Folds pointer equality when the oracle can classify both sides'
    /// zero-ness. Two distinct known-non-zero values prove nothing.
    fn fold_compare_eq(&mut self, id: InstId, args: &[ValueId], negate: bool) -> Option<InstId> {
        if args.len() != 2 {
            return None;
        }
        let lhs = self.is_zero_value(args[0]);
        let rhs = self.is_zero_value(args[1]);
        if lhs == IsZeroKind::Unknown || rhs == IsZeroKind::Unknown {
            return None;
        }
        if lhs == IsZeroKind::NotZero && rhs == IsZeroKind::NotZero {
            return None;
        }
        let folded = ((lhs == rhs) ^ negate) as i128;
        let result_ty = self.result_ty(id);
        let mut b = self.builder_before(id);
        let (new, _) = b.create_integer_literal(folded, result_ty);
        Some(new)
    }

    fn is_zero_value(&self, v: ValueId) -> IsZeroKind {
        if let Some(k) = pattern::int_literal(self.func, v) {
            return if k == 0 { IsZeroKind::Zero } else { IsZeroKind::NotZero };
        }
        // A fresh stack allocation is never null.
        match pattern::inst_def(self.func, v).map(|(_, i)| i.opcode()) {
            Some(Opcode::AllocStack) => IsZeroKind::NotZero,
            _ => IsZeroKind::Unknown,
        }
    }

    fn fold_sub(&mut self, id: InstId, args: &[ValueId]) -> Option<InstId> {
        if args.len() != 2 {
            return None;
        }

        // sub(x, x) -> 0
        if args[0] == args[1] {
            let result_ty = self.result_ty(id);
            if matches!(result_ty, Type::Int { .. }) {
                let mut b = self.builder_before(id);
                let (new, _) = b.create_integer_literal(0, result_ty);
                return Some(new);
            }
        }

        // sub(ptrtoint(index_raw_pointer(base, n)), ptrtoint(base)) -> n
        let pa = pattern::builtin_apply(self.func, args[0], BuiltinKind::PtrToInt);
        let pb = pattern::builtin_apply(self.func, args[1], BuiltinKind::PtrToInt);
        if let (Some([pa0]), Some([pb0])) = (pa, pb) {
            let (pa0, pb0) = (*pa0, *pb0);
            if let Some((base, n)) = pattern::index_raw_pointer(self.func, pa0) {
                if base == pb0 && self.value_ty(n) == self.result_ty(id) {
                    self.replace_with_value(id, n);
                }
            }
        }
        None
    }

    /// Canonicalizes `smul_over(strideof(T), v)` so the stride is always the
    /// right operand; later pattern matches rely on this orientation.
    fn normalize_stride_multiply(&mut self, id: InstId, args: &[ValueId]) -> Option<InstId> {
        if args.len() != 3 {
            return None;
        }
        let is_stride = |c: &Combiner, v| {
            pattern::any_builtin_apply(c.func, v).is_some_and(|(k, _)| k.is_strideof())
        };
        // Fires only when the swap actually changes the orientation, so the
        // rewritten form can never match again.
        if !is_stride(self, args[0]) || is_stride(self, args[1]) {
            return None;
        }
        if pattern::int_literal(self.func, args[2]).is_none() {
            return None;
        }
        // Operand 0 is the callee; arguments start at slot 1.
        let (a0, a1) = (args[0], args[1]);
        self.redirect_operand(id, 1, a1);
        self.redirect_operand(id, 2, a0);
        self.note_rewrite();
        None
    }

    /// Unwraps `apply(convert_function f)` when `f` is a static reference
    /// and no archetypes remain: the call is reissued against `f`, casting
    /// each operand whose type differs between the signatures.
    fn fold_apply_of_convert_function(
        &mut self,
        id: InstId,
        cfi: InstId,
        args: &[ValueId],
    ) -> Option<InstId> {
        let converted = self.unary_operand(cfi);
        pattern::function_ref(self.func, converted)?;

        let callee = match self.func.inst(id).instr {
            Instr::Apply { callee, .. } => callee,
            _ => unreachable!(),
        };
        let outer_ty = self.value_ty(callee);
        let inner_ty = self.value_ty(converted);
        if outer_ty.has_archetype() || inner_ty.has_archetype() {
            return None;
        }
        let outer_sig = outer_ty.fn_sig()?.clone();
        let inner_sig = inner_ty.fn_sig()?.clone();
        assert_eq!(
            args.len(),
            outer_sig.params.len(),
            "apply argument count does not match its callee type"
        );
        if args.len() != inner_sig.params.len() {
            return None;
        }
        // The function types converted between must agree on the result, or
        // the reissued call could not stand in for the original.
        if inner_sig.result != outer_sig.result {
            return None;
        }

        let mut b = self.builder_before(id);
        let mut new_args = OperandList::new();
        for (i, &arg) in args.iter().enumerate() {
            let old_ty = &outer_sig.params[i].ty;
            let new_ty = inner_sig.params[i].ty.clone();
            if *old_ty == new_ty {
                new_args.push(arg);
            } else if old_ty.is_address() {
                assert!(
                    new_ty.is_address(),
                    "convert_function must map addresses to addresses"
                );
                let (_, cast) = b.create_unchecked_addr_cast(arg, new_ty);
                new_args.push(cast);
            } else {
                assert!(
                    old_ty.has_reference_semantics() && new_ty.has_reference_semantics(),
                    "convert_function may only differ on reference and address parameters"
                );
                let (_, cast) = b.create_unchecked_ref_cast(arg, new_ty);
                new_args.push(cast);
            }
        }
        let (new, _) = b.create_apply(converted, new_args, Vec::new(), false, inner_sig.result);
        Some(new)
    }

    /// A call to a callee without side effects whose transitive users are
    /// only reference counting, debug values and collectable extracts is
    /// deleted wholesale; consumed arguments get their balancing release at
    /// the call site.
    fn eliminate_dead_effectless_call(
        &mut self,
        id: InstId,
        callee: ValueId,
        args: &[ValueId],
    ) -> bool {
        let mut users: Vec<InstId> = Vec::new();
        if !self.collect_rc_users(id, &mut users) {
            return false;
        }

        let Some(sig) = self.value_ty(callee).fn_sig().cloned() else {
            return false;
        };
        if sig.params.len() != args.len() {
            return false;
        }
        let releases: Vec<ValueId> = sig
            .params
            .iter()
            .zip(args.iter().copied())
            .filter(|(p, a)| p.consumed && !self.value_ty(*a).is_address())
            .map(|(_, a)| a)
            .collect();

        let mut b = self.builder_before(id);
        for &arg in &releases {
            b.create_release_value(arg);
        }
        drop(b);

        // Erase depth-first: collected users precede their own users.
        for &u in users.iter().rev() {
            if self.func.try_inst(u).is_some() {
                self.erase(u);
            }
        }
        self.note_rewrite();
        true
    }

    /// Collects `inst` and its transitive users if they consist only of
    /// reference counting, debug values and recursively-collectable
    /// struct extracts. Returns false on any other user.
    fn collect_rc_users(&self, inst: InstId, out: &mut Vec<InstId>) -> bool {
        out.push(inst);
        let Some(result) = self.func.inst(inst).result else {
            return true;
        };
        let users: Vec<InstId> = self.func.uses_of(result).iter().map(|u| u.user).collect();
        for user in users {
            let instr = &self.func.inst(user).instr;
            if instr.is_ref_counting() || instr.is_debug_inst() {
                out.push(user);
                continue;
            }
            if matches!(instr, Instr::StructExtract { .. }) && self.collect_rc_users(user, out) {
                continue;
            }
            return false;
        }
        true
    }

    pub(super) fn visit_partial_apply(&mut self, id: InstId) -> Option<InstId> {
        let (callee, args, subs) = match &self.func.inst(id).instr {
            Instr::PartialApply { callee, args, substitutions } => {
                (*callee, args.clone(), substitutions.clone())
            }
            _ => unreachable!(),
        };

        // No captures, no substitutions: only the representation changes.
        if subs.is_empty() && args.is_empty() {
            let result_ty = self.result_ty(id);
            let mut b = self.builder_before(id);
            let (new, _) = b.create_thin_to_thick_function(callee, result_ty);
            return Some(new);
        }

        // Dead closure: built and then immediately released. Release the
        // consumed captures where the closure dies and delete both.
        let result = self.result_of(id);
        if !self.func.has_one_use(result) {
            return None;
        }
        let user = self.func.uses_of(result)[0].user;
        if !matches!(self.func.inst(user).instr, Instr::StrongRelease { .. }) {
            return None;
        }

        let sig = self.value_ty(callee).fn_sig()?.clone();
        if args.len() > sig.params.len() {
            return None;
        }
        let delta = sig.params.len() - args.len();
        let releases: Vec<ValueId> = args
            .iter()
            .copied()
            .enumerate()
            .filter_map(|(i, a)| {
                let p = &sig.params[i + delta];
                (!p.indirect && p.consumed && !self.value_ty(a).is_address()).then_some(a)
            })
            .collect();

        let mut b = self.builder_before(user);
        for &a in &releases {
            b.create_release_value(a);
        }
        drop(b);
        self.erase(user);
        self.erase_and_note(id);
        None
    }

    pub(super) fn visit_cond_fail(&mut self, id: InstId) -> Option<InstId> {
        let operand = self.unary_operand(id);
        if self.options.remove_runtime_asserts {
            self.erase_and_note(id);
            return None;
        }
        // (cond_fail 0) never fires.
        if pattern::int_literal(self.func, operand) == Some(0) {
            self.erase_and_note(id);
        }
        None
    }

    /// `cond_br(xor(x, 1), T, F)` -> `cond_br(x, F, T)`, swapping the
    /// branch argument lists along with the targets.
    pub(super) fn visit_cond_branch(&mut self, id: InstId) -> Option<InstId> {
        let cond = match self.func.inst(id).instr {
            Instr::CondBranch { cond, .. } => cond,
            _ => unreachable!(),
        };
        let xor_args = pattern::builtin_apply(self.func, cond, BuiltinKind::Xor)?;
        let &[x, one] = xor_args else {
            return None;
        };
        if !pattern::is_const_one(self.func, one) {
            return None;
        }

        self.func.rewrite_instr(id, |instr| {
            let Instr::CondBranch { cond, true_target, true_args, false_target, false_args } =
                instr
            else {
                unreachable!()
            };
            *cond = x;
            std::mem::swap(true_target, false_target);
            std::mem::swap(true_args, false_args);
        });
        self.enqueue(id);
        self.note_rewrite();
        None
    }

    /// `tuple_extract(overflow_arith(x, y), 1)` is the overflow bit; when
    /// the arithmetic provably cannot overflow it folds to zero.
    pub(super) fn visit_tuple_extract(&mut self, id: InstId) -> Option<InstId> {
        let (operand, index) = match self.func.inst(id).instr {
            Instr::TupleExtract { operand, index } => (operand, index),
            _ => unreachable!(),
        };
        if index != 1 {
            return None;
        }
        let (kind, args) = pattern::any_builtin_apply(self.func, operand)?;
        if !kind.is_overflow_arith() || args.len() < 2 {
            return None;
        }
        let (a, b2) = (args[0], args[1]);
        if self.can_overflow(kind, a, b2) {
            return None;
        }
        let result_ty = self.result_ty(id);
        let mut b = self.builder_before(id);
        let (new, _) = b.create_integer_literal(0, result_ty);
        Some(new)
    }

    /// Overflow is provably impossible only for literal operands whose
    /// exact result fits the operand width.
    fn can_overflow(&self, kind: BuiltinKind, a: ValueId, b: ValueId) -> bool {
        let (Some(x), Some(y)) = (
            pattern::int_literal(self.func, a),
            pattern::int_literal(self.func, b),
        ) else {
            return true;
        };
        let Type::Int { bits } = self.value_ty(a) else {
            return true;
        };
        if bits == 0 || bits > 64 {
            return true;
        }
        let min = -(1i128 << (bits - 1));
        let max = (1i128 << (bits - 1)) - 1;
        let exact = match kind {
            BuiltinKind::SAddOver => x.checked_add(y),
            BuiltinKind::SSubOver => x.checked_sub(y),
            BuiltinKind::SMulOver => x.checked_mul(y),
            _ => None,
        };
        match exact {
            Some(v) => v < min || v > max,
            None => true,
        }
    }
}
