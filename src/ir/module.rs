use rustc_hash::FxHashMap;

use crate::error::ModuleError;
use crate::ir::block::BlockId;
use crate::ir::debug::{ScopeData, ScopeId, SourceLoc};
use crate::ir::function::{Function, FunctionId, InstNode, Param};
use crate::ir::instr::{InstId, Instr};
use crate::ir::types::{CallingConv, EffectsKind, Type, TypeDefs};
use crate::ir::value::ValueId;

/// Counters read by external statistics collectors.
#[derive(Debug, Default, Clone, Copy)]
pub struct CombineStats {
    /// Successful peephole rewrites across all `run_combine` invocations.
    pub rewrites: u64,
}

/// The top-level IR container.
///
/// Invariants:
/// - Function names are unique within a module.
/// - `FunctionId(n)` always indexes `functions[n]`.
/// - Debug scopes of all functions live in one arena, because inlining links
///   scopes across function boundaries.
#[derive(Debug, Default)]
pub struct Module {
    pub name: String,
    pub(crate) functions: Vec<Function>,
    pub(crate) function_index: FxHashMap<String, FunctionId>,
    /// Nominal type shapes shared by all functions.
    pub types: TypeDefs,
    pub(crate) scopes: Vec<ScopeData>,
    pub stats: CombineStats,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.0 as usize]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id.0 as usize]
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        let id = self.function_index.get(name)?;
        self.functions.get(id.0 as usize)
    }

    pub fn function_id(&self, name: &str) -> Option<FunctionId> {
        self.function_index.get(name).copied()
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Registers a function built by `FunctionBuilder`.
    /// Returns `Err` if the name is already taken.
    pub fn add_function(&mut self, mut func: Function) -> Result<FunctionId, ModuleError> {
        if self.function_index.contains_key(&func.name) {
            return Err(ModuleError::DuplicateFunction { name: func.name });
        }
        let id = FunctionId(self.functions.len() as u32);
        func.id = id;
        self.scopes[func.scope.0 as usize].function = id;
        self.function_index.insert(func.name.clone(), id);
        self.functions.push(func);
        Ok(id)
    }

    pub fn scope(&self, id: ScopeId) -> &ScopeData {
        &self.scopes[id.0 as usize]
    }

    pub fn alloc_scope(&mut self, data: ScopeData) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(data);
        id
    }

    /// Bumps the live-inline reference count of `func`, so its abstract
    /// debug info outlives the removal of all direct calls.
    pub fn mark_function_inlined(&mut self, func: FunctionId) {
        self.functions[func.0 as usize].inlined_uses += 1;
    }

    /// Split borrow for the combiner: one mutable function plus the shared
    /// type table.
    pub(crate) fn combine_parts(&mut self, id: FunctionId) -> (&mut Function, &TypeDefs) {
        (&mut self.functions[id.0 as usize], &self.types)
    }

    /// Split borrow for the inliner: one mutable function, the type table,
    /// and the scope arena.
    pub(crate) fn inline_parts(
        &mut self,
        id: FunctionId,
    ) -> (&mut Function, &TypeDefs, &mut Vec<ScopeData>) {
        (&mut self.functions[id.0 as usize], &self.types, &mut self.scopes)
    }
}

/// Builder for constructing a `Function` incrementally.
///
/// Call order:
/// 1. `create_block()` — allocate one or more blocks
/// 2. `add_block_param()` — add typed params to each block
/// 3. `set_current_block()` — point the cursor at a block
/// 4. `push()` — emit instructions into the current block
/// 5. `finish()` — register the completed function with the module
///
/// `finish()` panics in debug builds if any block lacks a terminator.
pub struct FunctionBuilder<'m> {
    module: &'m mut Module,
    func: Function,
    current_block: Option<BlockId>,
    loc: SourceLoc,
}

impl<'m> FunctionBuilder<'m> {
    pub fn new(
        module: &'m mut Module,
        name: impl Into<String>,
        params: Vec<Param>,
        result_ty: Type,
    ) -> Self {
        // The root scope's function link is fixed up by add_function.
        let scope = module.alloc_scope(ScopeData {
            loc: SourceLoc::default(),
            parent: None,
            function: FunctionId(0),
            inlined_call_site: None,
        });
        let func = Function {
            id: FunctionId(0), // reassigned by Module::add_function
            name: name.into(),
            params,
            result_ty,
            transparent: false,
            effects: EffectsKind::Unknown,
            cc: CallingConv::Default,
            semantics: None,
            blocks: Vec::new(),
            layout: Vec::new(),
            insts: Vec::new(),
            value_types: Default::default(),
            value_defs: Default::default(),
            uses: Default::default(),
            next_value: 0,
            scope,
            inlined_uses: 0,
        };
        Self { module, func, current_block: None, loc: SourceLoc::default() }
    }

    pub fn set_transparent(&mut self, transparent: bool) {
        self.func.transparent = transparent;
    }

    pub fn set_effects(&mut self, effects: EffectsKind) {
        self.func.effects = effects;
    }

    pub fn set_calling_conv(&mut self, cc: CallingConv) {
        self.func.cc = cc;
    }

    pub fn set_semantics(&mut self, tag: impl Into<String>) {
        self.func.semantics = Some(tag.into());
    }

    /// Sets the source position attached to subsequently pushed instructions.
    pub fn set_loc(&mut self, span: u32) {
        self.loc = SourceLoc::new(span);
    }

    /// Creates a new block and returns its `BlockId`.
    pub fn create_block(&mut self, name: Option<&str>) -> BlockId {
        self.func.create_block(name)
    }

    /// Adds a typed parameter to a block. Returns the `ValueId` of the param.
    pub fn add_block_param(&mut self, block: BlockId, name: Option<&str>, ty: Type) -> ValueId {
        self.func.add_block_param(block, name, ty)
    }

    pub fn current_block(&self) -> BlockId {
        self.current_block.expect("FunctionBuilder: no current block set")
    }

    pub fn set_current_block(&mut self, block: BlockId) {
        self.current_block = Some(block);
    }

    /// Appends an instruction to the current block.
    ///
    /// `result_ty` must be `Some` iff the instruction produces a result.
    /// Returns the instruction id and its result value, if any.
    ///
    /// Panics in debug builds if the current block is already sealed.
    pub fn push(&mut self, instr: Instr, result_ty: Option<Type>) -> (InstId, Option<ValueId>) {
        let block = self
            .current_block
            .expect("FunctionBuilder: no current block set before push");
        debug_assert!(
            !self.func.is_sealed(block),
            "push called on already-sealed block {}",
            block
        );
        debug_assert_eq!(instr.has_result(), result_ty.is_some());

        let result = result_ty.map(|ty| {
            let v = self.func.fresh_value();
            self.func.value_types.insert(v, ty);
            v
        });
        let index = self.func.block(block).insts.len();
        let node = InstNode {
            instr,
            result,
            block,
            loc: self.loc,
            scope: self.func.scope,
        };
        let id = self.func.insert_inst(node, index);
        (id, result)
    }

    /// Returns true if the current block already ends with a terminator.
    pub fn is_current_block_terminated(&self) -> bool {
        self.current_block.is_some_and(|b| self.func.is_sealed(b))
    }

    /// Consumes the builder, registering the function with the module.
    ///
    /// Panics in debug builds if any block is not sealed (lacks a
    /// terminator).
    pub fn finish(self) -> Result<FunctionId, ModuleError> {
        #[cfg(debug_assertions)]
        for block in &self.func.blocks {
            assert!(
                self.func.is_sealed(block.id),
                "finish() called with unsealed block {}",
                block.label()
            );
        }
        self.module.add_function(self.func)
    }
}
