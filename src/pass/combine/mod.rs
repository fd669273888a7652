//! Peephole combiner.
//!
//! A worklist-driven local rewrite engine: instructions are visited to a
//! fixpoint, and each visit may replace the instruction with a simpler,
//! semantically equivalent form. The rule library lives in the submodules,
//! one file per instruction family:
//!
//! - `casts`    — cast folding and cast-pair collapsing
//! - `loads`    — load projection splitting, stack-allocation promotion
//! - `enums`    — enum address-form rewrites, tag folding
//! - `refcount` — retain/release peepholes
//! - `apply`    — call rewrites and builtin constant folding
//! - `strings`  — string-literal concatenation folding
//!
//! Rules are monotone in instruction complexity (fewer operands, simpler
//! opcodes, fewer casts), which guarantees termination of the fixpoint.

mod apply;
mod casts;
mod enums;
mod loads;
mod refcount;
mod strings;

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::PassError;
use crate::ir::builder::Builder;
use crate::ir::function::{Function, FunctionId};
use crate::ir::instr::{InstId, Opcode};
use crate::ir::module::Module;
use crate::ir::types::{EffectsKind, TypeDefs};
use crate::ir::value::ValueId;
use crate::pass::Pass;
use crate::pattern;

/// Knobs controlling the combiner.
#[derive(Debug, Default, Clone, Copy)]
pub struct CombineOptions {
    /// Strip runtime assertions: every `cond_fail` is erased and
    /// `unconditional_checked_cast` degrades to its unchecked form.
    pub remove_runtime_asserts: bool,
}

/// Attributes of a potential callee, snapshotted before the combiner takes
/// its mutable borrow of the function being rewritten.
#[derive(Debug, Clone)]
pub(crate) struct FnDecl {
    pub effects: EffectsKind,
    pub semantics: Option<String>,
}

/// Runs the peephole combiner on `func` until no rule fires.
/// Returns whether anything changed.
pub fn run_combine(module: &mut Module, func: FunctionId, options: &CombineOptions) -> bool {
    let decls = snapshot_decls(module);
    let (function, defs) = module.combine_parts(func);

    let mut any_change = false;
    let mut total_rewrites = 0u64;
    // Iterate whole passes until quiescence, like the driver contract asks:
    // a single worklist drain reaches a local fixpoint, and a clean
    // follow-up pass confirms it.
    loop {
        let mut combiner = Combiner::new(&mut *function, defs, &decls, options);
        let changed = combiner.run();
        total_rewrites += combiner.rewrites;
        if !changed {
            break;
        }
        any_change = true;
    }
    module.stats.rewrites += total_rewrites;
    any_change
}

fn snapshot_decls(module: &Module) -> FxHashMap<String, FnDecl> {
    module
        .functions()
        .iter()
        .map(|f| {
            (
                f.name.clone(),
                FnDecl { effects: f.effects, semantics: f.semantics.clone() },
            )
        })
        .collect()
}

/// The worklist driver. Owns non-owning references to candidate
/// instructions; erased instructions are dropped when popped.
pub(crate) struct Combiner<'a> {
    pub(crate) func: &'a mut Function,
    pub(crate) defs: &'a TypeDefs,
    pub(crate) decls: &'a FxHashMap<String, FnDecl>,
    pub(crate) options: &'a CombineOptions,
    worklist: VecDeque<InstId>,
    in_worklist: FxHashSet<InstId>,
    pub(crate) changed: bool,
    pub(crate) rewrites: u64,
}

impl<'a> Combiner<'a> {
    fn new(
        func: &'a mut Function,
        defs: &'a TypeDefs,
        decls: &'a FxHashMap<String, FnDecl>,
        options: &'a CombineOptions,
    ) -> Self {
        Self {
            func,
            defs,
            decls,
            options,
            worklist: VecDeque::new(),
            in_worklist: FxHashSet::default(),
            changed: false,
            rewrites: 0,
        }
    }

    fn run(&mut self) -> bool {
        // Seed in reverse post-order so producers are generally visited
        // before consumers.
        for block in self.func.reverse_post_order() {
            let insts: Vec<InstId> = self.func.block(block).insts.clone();
            for inst in insts {
                self.enqueue(inst);
            }
        }

        while let Some(id) = self.worklist.pop_front() {
            self.in_worklist.remove(&id);
            if self.func.try_inst(id).is_none() {
                continue;
            }
            if let Some(replacement) = self.combine(id) {
                self.replace_with(id, replacement);
            }
        }
        self.changed
    }

    fn combine(&mut self, id: InstId) -> Option<InstId> {
        match self.func.inst(id).instr.opcode() {
            Opcode::Upcast => self.visit_upcast(id),
            Opcode::UncheckedRefCast => self.visit_unchecked_ref_cast(id),
            Opcode::UncheckedAddrCast => self.visit_unchecked_addr_cast(id),
            Opcode::UncheckedRefBitCast => self.visit_unchecked_ref_bit_cast(id),
            Opcode::UncheckedTrivialBitCast => self.visit_unchecked_trivial_bit_cast(id),
            Opcode::RefToRawPointer => self.visit_ref_to_raw_pointer(id),
            Opcode::RawPointerToRef => self.visit_raw_pointer_to_ref(id),
            Opcode::PointerToAddress => self.visit_pointer_to_address(id),
            Opcode::UnconditionalCheckedCast => self.visit_unconditional_checked_cast(id),
            Opcode::ThickToObjCMetatype => self.visit_thick_to_objc_metatype(id),
            Opcode::ObjCToThickMetatype => self.visit_objc_to_thick_metatype(id),
            Opcode::StructExtract => self.visit_struct_extract(id),
            Opcode::TupleExtract => self.visit_tuple_extract(id),
            Opcode::Load => self.visit_load(id),
            Opcode::AllocStack => self.visit_alloc_stack(id),
            Opcode::UncheckedEnumData => self.visit_unchecked_enum_data(id),
            Opcode::InjectEnumAddr => self.visit_inject_enum_addr(id),
            Opcode::UncheckedTakeEnumDataAddr => self.visit_unchecked_take_enum_data_addr(id),
            Opcode::EnumIsTag => self.visit_enum_is_tag(id),
            Opcode::SwitchEnumAddr => self.visit_switch_enum_addr(id),
            Opcode::RetainValue => self.visit_retain_value(id),
            Opcode::ReleaseValue => self.visit_release_value(id),
            Opcode::StrongRetain => self.visit_strong_retain(id),
            Opcode::StrongRelease => self.visit_strong_release(id),
            Opcode::Apply => self.visit_apply(id),
            Opcode::PartialApply => self.visit_partial_apply(id),
            Opcode::CondFail => self.visit_cond_fail(id),
            Opcode::CondBranch => self.visit_cond_branch(id),
            _ => None,
        }
    }

    // ---- Worklist maintenance -------------------------------------------

    /// Adds an instruction to the worklist, deduplicated by identity.
    pub(crate) fn enqueue(&mut self, id: InstId) {
        if self.in_worklist.insert(id) {
            self.worklist.push_back(id);
        }
    }

    /// Enqueues every direct user of `v`.
    pub(crate) fn enqueue_users(&mut self, v: ValueId) {
        let users: Vec<InstId> = self.func.uses_of(v).iter().map(|u| u.user).collect();
        for user in users {
            self.enqueue(user);
        }
    }

    // ---- Rewrite plumbing -----------------------------------------------

    /// A builder positioned immediately before `id`, inheriting its source
    /// location and scope.
    pub(crate) fn builder_before(&mut self, id: InstId) -> Builder<'_> {
        Builder::before_inst(self.func, self.defs, id)
    }

    /// Replaces `old` with `new`: every use of `old`'s result moves to
    /// `new`'s result, then `old` is erased. Resultless instructions are
    /// simply superseded and erased.
    pub(crate) fn replace_with(&mut self, old: InstId, new: InstId) {
        let old_result = self.func.inst(old).result;
        let new_result = self.func.inst(new).result;
        log::debug!(
            "combine: {} -> {} in '{}'",
            self.func.inst(old).instr.name(),
            self.func.inst(new).instr.name(),
            self.func.name
        );
        match (old_result, new_result) {
            (Some(o), Some(n)) => {
                self.enqueue_users(o);
                self.func.replace_all_uses(o, n);
                self.enqueue_users(n);
            }
            (None, _) => {}
            (Some(_), None) => panic!(
                "replacement {} produces no value for {}",
                self.func.inst(new).instr.name(),
                self.func.inst(old).instr.name()
            ),
        }
        self.erase(old);
        self.enqueue(new);
        self.note_rewrite();
    }

    /// Replaces `old` with an existing value and erases `old`.
    pub(crate) fn replace_with_value(&mut self, old: InstId, value: ValueId) {
        let old_result = self
            .func
            .inst(old)
            .result
            .expect("replace_with_value on a resultless instruction");
        self.enqueue_users(old_result);
        self.func.replace_all_uses(old_result, value);
        self.enqueue_users(value);
        self.erase(old);
        self.note_rewrite();
    }

    /// Erases an instruction, re-enqueueing the producers of its operands:
    /// dropping a use may enable use-count-sensitive rules upstream.
    pub(crate) fn erase(&mut self, id: InstId) {
        let ops = self.func.inst(id).instr.operands();
        for op in ops {
            if let Some(def) = pattern::def_inst(self.func, op) {
                self.enqueue(def);
            }
        }
        self.func.erase_inst(id);
        self.changed = true;
    }

    /// Erases an instruction and counts it as a rewrite.
    pub(crate) fn erase_and_note(&mut self, id: InstId) {
        self.erase(id);
        self.note_rewrite();
    }

    pub(crate) fn note_rewrite(&mut self) {
        self.rewrites += 1;
        self.changed = true;
    }

    /// Rewrites one operand slot of `id`, keeping use-lists consistent, and
    /// requeues the instruction and its users.
    pub(crate) fn redirect_operand(&mut self, id: InstId, index: usize, value: ValueId) {
        self.func.set_inst_operand(id, index, value);
        self.enqueue(id);
        if let Some(result) = self.func.inst(id).result {
            self.enqueue_users(result);
        }
        self.changed = true;
    }

    // ---- Small accessors used throughout the rule library ---------------

    /// The result value of `id`. Panics for resultless instructions.
    pub(crate) fn result_of(&self, id: InstId) -> ValueId {
        self.func
            .inst(id)
            .result
            .unwrap_or_else(|| panic!("{} has no result", self.func.inst(id).instr.name()))
    }

    /// The type of `id`'s result.
    pub(crate) fn result_ty(&self, id: InstId) -> crate::ir::types::Type {
        self.value_ty(self.result_of(id))
    }

    /// The recorded type of a value.
    pub(crate) fn value_ty(&self, v: ValueId) -> crate::ir::types::Type {
        self.func
            .value_type(v)
            .unwrap_or_else(|| panic!("value {} has no recorded type", v))
            .clone()
    }
}

/// Pipeline adapter: runs the combiner over every function of the module.
pub struct CombinePass {
    pub options: CombineOptions,
}

impl CombinePass {
    pub fn new() -> Self {
        Self { options: CombineOptions::default() }
    }
}

impl Default for CombinePass {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for CombinePass {
    fn name(&self) -> &'static str {
        "combine"
    }

    fn run(&mut self, module: &mut Module) -> Result<(), PassError> {
        let count = module.functions().len();
        for i in 0..count {
            run_combine(module, FunctionId(i as u32), &self.options);
        }
        Ok(())
    }
}
