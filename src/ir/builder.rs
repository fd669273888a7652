use crate::ir::block::BlockId;
use crate::ir::debug::{ScopeId, SourceLoc};
use crate::ir::function::{Function, InstNode};
use crate::ir::instr::{InstId, Instr, OperandList};
use crate::ir::types::{StringEncoding, Type, TypeDefs};
use crate::ir::value::ValueId;

/// An insertion point: instructions are inserted into `block` before the
/// instruction currently at `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub block: BlockId,
    pub index: usize,
}

/// Inserts new instructions into an existing function at a tracked cursor.
///
/// The builder is the sole creator of new use-edges: every factory registers
/// the operands of the instruction it creates. The cursor advances past each
/// inserted instruction. Code that temporarily relocates the cursor must use
/// [`Builder::with_cursor`], which restores the previous cursor on every
/// exit path.
pub struct Builder<'a> {
    func: &'a mut Function,
    defs: &'a TypeDefs,
    cursor: Cursor,
    loc: SourceLoc,
    scope: ScopeId,
}

impl<'a> Builder<'a> {
    /// A builder positioned immediately before `inst`, inheriting its source
    /// location and debug scope.
    pub fn before_inst(func: &'a mut Function, defs: &'a TypeDefs, inst: InstId) -> Self {
        let index = func.position_in_block(inst);
        let node = func.inst(inst);
        let (block, loc, scope) = (node.block, node.loc, node.scope);
        Self { func, defs, cursor: Cursor { block, index }, loc, scope }
    }

    /// A builder positioned at an explicit cursor.
    pub fn at(
        func: &'a mut Function,
        defs: &'a TypeDefs,
        cursor: Cursor,
        loc: SourceLoc,
        scope: ScopeId,
    ) -> Self {
        Self { func, defs, cursor, loc, scope }
    }

    pub fn func(&self) -> &Function {
        &*self.func
    }

    pub fn defs(&self) -> &TypeDefs {
        self.defs
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }

    /// Runs `f` with the cursor relocated to `cursor`, restoring the
    /// previous cursor afterwards regardless of how `f` exits.
    pub fn with_cursor<R>(&mut self, cursor: Cursor, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.cursor;
        self.cursor = cursor;
        let result = f(self);
        self.cursor = saved;
        result
    }

    /// Relocates the cursor to immediately before `inst`.
    pub fn cursor_before(&self, inst: InstId) -> Cursor {
        Cursor {
            block: self.func.inst(inst).block,
            index: self.func.position_in_block(inst),
        }
    }

    pub fn set_source(&mut self, loc: SourceLoc, scope: ScopeId) {
        self.loc = loc;
        self.scope = scope;
    }

    /// Inserts `instr` at the cursor and advances past it. `result_ty` must
    /// be `Some` iff the instruction produces a result.
    pub fn push(&mut self, instr: Instr, result_ty: Option<Type>) -> (InstId, Option<ValueId>) {
        debug_assert_eq!(instr.has_result(), result_ty.is_some());
        let result = result_ty.map(|ty| {
            let v = self.func.fresh_value();
            self.func.value_types.insert(v, ty);
            v
        });
        let node = InstNode {
            instr,
            result,
            block: self.cursor.block,
            loc: self.loc,
            scope: self.scope,
        };
        let id = self.func.insert_inst(node, self.cursor.index);
        self.cursor.index += 1;
        (id, result)
    }

    fn push_value(&mut self, instr: Instr, ty: Type) -> (InstId, ValueId) {
        let (id, v) = self.push(instr, Some(ty));
        (id, v.expect("instruction should produce a result"))
    }

    fn operand_type(&self, v: ValueId) -> &Type {
        self.func
            .value_type(v)
            .unwrap_or_else(|| panic!("operand {} has no recorded type", v))
    }

    // ---- Literals -------------------------------------------------------

    pub fn create_integer_literal(&mut self, value: i128, ty: Type) -> (InstId, ValueId) {
        self.push_value(Instr::IntegerLiteral { value }, ty)
    }

    pub fn create_string_literal(
        &mut self,
        value: impl Into<String>,
        encoding: StringEncoding,
    ) -> (InstId, ValueId) {
        self.push_value(
            Instr::StringLiteral { value: value.into(), encoding },
            Type::RawPointer,
        )
    }

    // ---- Memory ---------------------------------------------------------

    pub fn create_load(&mut self, addr: ValueId) -> (InstId, ValueId) {
        let ty = self.operand_type(addr);
        assert!(ty.is_address(), "load of a non-address value {}", addr);
        let result_ty = ty.object_type().clone();
        self.push_value(Instr::Load { operand: addr }, result_ty)
    }

    pub fn create_store(&mut self, value: ValueId, addr: ValueId) -> InstId {
        self.push(Instr::Store { value, addr }, None).0
    }

    pub fn create_alloc_stack(&mut self, ty: Type) -> (InstId, ValueId) {
        self.push_value(Instr::AllocStack, Type::address_of(ty))
    }

    pub fn create_dealloc_stack(&mut self, addr: ValueId) -> InstId {
        self.push(Instr::DeallocStack { operand: addr }, None).0
    }

    pub fn create_destroy_addr(&mut self, addr: ValueId) -> InstId {
        self.push(Instr::DestroyAddr { operand: addr }, None).0
    }

    pub fn create_index_addr(&mut self, base: ValueId, index: ValueId) -> (InstId, ValueId) {
        let ty = self.operand_type(base).clone();
        self.push_value(Instr::IndexAddr { base, index }, ty)
    }

    // ---- Aggregate and enum projections ---------------------------------

    pub fn create_struct_element_addr(
        &mut self,
        base: ValueId,
        field: usize,
        ty: Type,
    ) -> (InstId, ValueId) {
        self.push_value(Instr::StructElementAddr { operand: base, field }, ty)
    }

    pub fn create_tuple_element_addr(
        &mut self,
        base: ValueId,
        index: usize,
        ty: Type,
    ) -> (InstId, ValueId) {
        self.push_value(Instr::TupleElementAddr { operand: base, index }, ty)
    }

    pub fn create_enum(
        &mut self,
        enum_ty: Type,
        case: usize,
        payload: Option<ValueId>,
    ) -> (InstId, ValueId) {
        self.push_value(Instr::Enum { case, payload }, enum_ty)
    }

    pub fn create_unchecked_enum_data(
        &mut self,
        operand: ValueId,
        case: usize,
        ty: Type,
    ) -> (InstId, ValueId) {
        self.push_value(Instr::UncheckedEnumData { operand, case }, ty)
    }

    // ---- Casts ----------------------------------------------------------

    pub fn create_upcast(&mut self, operand: ValueId, ty: Type) -> (InstId, ValueId) {
        self.push_value(Instr::Upcast { operand }, ty)
    }

    pub fn create_unchecked_ref_cast(&mut self, operand: ValueId, ty: Type) -> (InstId, ValueId) {
        self.push_value(Instr::UncheckedRefCast { operand }, ty)
    }

    pub fn create_unchecked_addr_cast(&mut self, operand: ValueId, ty: Type) -> (InstId, ValueId) {
        self.push_value(Instr::UncheckedAddrCast { operand }, ty)
    }

    pub fn create_unchecked_ref_bit_cast(
        &mut self,
        operand: ValueId,
        ty: Type,
    ) -> (InstId, ValueId) {
        self.push_value(Instr::UncheckedRefBitCast { operand }, ty)
    }

    pub fn create_unchecked_trivial_bit_cast(
        &mut self,
        operand: ValueId,
        ty: Type,
    ) -> (InstId, ValueId) {
        self.push_value(Instr::UncheckedTrivialBitCast { operand }, ty)
    }

    pub fn create_pointer_to_address(&mut self, operand: ValueId, ty: Type) -> (InstId, ValueId) {
        self.push_value(Instr::PointerToAddress { operand }, ty)
    }

    pub fn create_thin_to_thick_function(
        &mut self,
        operand: ValueId,
        ty: Type,
    ) -> (InstId, ValueId) {
        self.push_value(Instr::ThinToThickFunction { operand }, ty)
    }

    // ---- Metatypes ------------------------------------------------------

    pub fn create_metatype(&mut self, ty: Type) -> (InstId, ValueId) {
        self.push_value(Instr::Metatype, ty)
    }

    pub fn create_value_metatype(&mut self, operand: ValueId, ty: Type) -> (InstId, ValueId) {
        self.push_value(Instr::ValueMetatype { operand }, ty)
    }

    pub fn create_existential_metatype(&mut self, operand: ValueId, ty: Type) -> (InstId, ValueId) {
        self.push_value(Instr::ExistentialMetatype { operand }, ty)
    }

    // ---- Calls ----------------------------------------------------------

    pub fn create_apply(
        &mut self,
        callee: ValueId,
        args: impl IntoIterator<Item = ValueId>,
        substitutions: Vec<Type>,
        transparent: bool,
        result_ty: Type,
    ) -> (InstId, ValueId) {
        let args: OperandList = args.into_iter().collect();
        self.push_value(
            Instr::Apply { callee, args, substitutions, transparent },
            result_ty,
        )
    }

    pub fn create_partial_apply(
        &mut self,
        callee: ValueId,
        args: impl IntoIterator<Item = ValueId>,
        substitutions: Vec<Type>,
        result_ty: Type,
    ) -> (InstId, ValueId) {
        let args: OperandList = args.into_iter().collect();
        self.push_value(Instr::PartialApply { callee, args, substitutions }, result_ty)
    }

    // ---- Reference counting ---------------------------------------------

    pub fn create_retain_value(&mut self, operand: ValueId) -> InstId {
        self.push(Instr::RetainValue { operand }, None).0
    }

    pub fn create_release_value(&mut self, operand: ValueId) -> InstId {
        self.push(Instr::ReleaseValue { operand }, None).0
    }

    pub fn create_strong_retain(&mut self, operand: ValueId) -> InstId {
        self.push(Instr::StrongRetain { operand }, None).0
    }

    pub fn create_strong_release(&mut self, operand: ValueId) -> InstId {
        self.push(Instr::StrongRelease { operand }, None).0
    }

    // ---- Terminators ----------------------------------------------------

    pub fn create_branch(
        &mut self,
        target: BlockId,
        args: impl IntoIterator<Item = ValueId>,
    ) -> InstId {
        let args: OperandList = args.into_iter().collect();
        self.push(Instr::Branch { target, args }, None).0
    }

    pub fn create_cond_branch(
        &mut self,
        cond: ValueId,
        true_target: BlockId,
        true_args: impl IntoIterator<Item = ValueId>,
        false_target: BlockId,
        false_args: impl IntoIterator<Item = ValueId>,
    ) -> InstId {
        let true_args: OperandList = true_args.into_iter().collect();
        let false_args: OperandList = false_args.into_iter().collect();
        self.push(
            Instr::CondBranch { cond, true_target, true_args, false_target, false_args },
            None,
        )
        .0
    }

    pub fn create_switch_enum(
        &mut self,
        operand: ValueId,
        cases: Vec<(usize, BlockId)>,
        default: Option<BlockId>,
    ) -> InstId {
        self.push(Instr::SwitchEnum { operand, cases, default }, None).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::function::Param;
    use crate::ir::module::{FunctionBuilder, Module};

    fn i64t() -> Type {
        Type::Int { bits: 64 }
    }

    #[test]
    fn with_cursor_restores_the_previous_cursor() {
        let mut module = Module::new("b");
        let mut fb = FunctionBuilder::new(
            &mut module,
            "f",
            vec![Param::new("x", i64t())],
            i64t(),
        );
        let entry = fb.create_block(Some("entry"));
        let tail = fb.create_block(Some("tail"));
        let x = fb.add_block_param(entry, Some("x"), i64t());
        let y = fb.add_block_param(tail, None, i64t());
        fb.set_current_block(entry);
        fb.push(Instr::Branch { target: tail, args: [x].into_iter().collect() }, None);
        fb.set_current_block(tail);
        let (ret, _) = fb.push(Instr::Return { operand: y }, None);
        let fid = fb.finish().unwrap();

        let (func, defs) = module.combine_parts(fid);
        let mut b = Builder::before_inst(func, defs, ret);
        let saved = b.cursor();

        // Relocate into the entry block, emit there, and come back.
        b.with_cursor(Cursor { block: entry, index: 0 }, |b| {
            b.create_integer_literal(7, i64t());
        });
        assert_eq!(b.cursor(), saved);

        // The relocated emission landed at the head of the entry block.
        let first = b.func().block(entry).insts[0];
        assert!(matches!(
            b.func().inst(first).instr,
            Instr::IntegerLiteral { value: 7 }
        ));
    }

    #[test]
    fn factories_infer_result_types() {
        let mut module = Module::new("b");
        let addr = Type::address_of(i64t());
        let mut fb = FunctionBuilder::new(
            &mut module,
            "g",
            vec![Param::new("p", addr.clone())],
            i64t(),
        );
        let entry = fb.create_block(Some("entry"));
        let p = fb.add_block_param(entry, Some("p"), addr);
        fb.set_current_block(entry);
        let (ret, _) = fb.push(Instr::Return { operand: p }, None);
        let fid = fb.finish().unwrap();

        let (func, defs) = module.combine_parts(fid);
        let mut b = Builder::before_inst(func, defs, ret);
        let (_, loaded) = b.create_load(p);
        assert_eq!(b.func().value_type(loaded), Some(&i64t()));
        let (_, slot) = b.create_alloc_stack(i64t());
        assert_eq!(b.func().value_type(slot), Some(&Type::address_of(i64t())));
    }
}
