//! Function inliner.
//!
//! Splices a callee's body into a caller at a single call site, rewiring
//! values and blocks through the cloner and erasing the call. A callee
//! whose entry block already ends in a return is inlined without splitting
//! the caller block.

mod cloner;
pub mod cost;

pub use cost::{function_cost, CANNOT_INLINE_COST};

use crate::error::PassError;
use crate::ir::block::BlockId;
use crate::ir::builder::Cursor;
use crate::ir::debug::ScopeData;
use crate::ir::function::FunctionId;
use crate::ir::instr::{InstId, Instr};
use crate::ir::module::Module;
use crate::ir::value::ValueId;
use crate::pass::Pass;
use crate::pattern;

use cloner::InlineCloner;

/// Which inlining discipline is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineKind {
    /// Semantically required expansion (e.g. transparent functions). Drops
    /// debug values and reuses the call site's own scope.
    Mandatory,
    /// Heuristic expansion. Keeps debug values and builds a fresh
    /// call-site scope so the inlining chain stays attributable.
    Performance,
}

/// Inlines the callee of `call` (which must be an `apply` of a direct
/// function reference) into `caller`, passing `args` for the callee's entry
/// parameters. Performs one step of inlining only.
///
/// Returns false without touching the IR when the call cannot be inlined:
/// the callee is the caller itself, the callee has no static body, or a
/// mandatory pass is asked to expand a foreign-convention function.
pub fn inline_call(
    module: &mut Module,
    caller: FunctionId,
    call: InstId,
    args: &[ValueId],
    kind: InlineKind,
) -> bool {
    let callee_id = {
        let f = module.function(caller);
        let node = f.inst(call);
        let Instr::Apply { callee, .. } = &node.instr else {
            panic!("inline_call invoked on a non-apply instruction")
        };
        let Some(name) = pattern::function_ref(f, *callee) else {
            return false;
        };
        let Some(id) = module.function_id(name) else {
            return false;
        };
        id
    };

    // Never inline an apply into its own parent function.
    if callee_id == caller {
        return false;
    }
    if kind == InlineKind::Mandatory && module.function(callee_id).cc.is_foreign() {
        return false;
    }

    let (call_loc, call_scope, call_block, call_pos, call_result) = {
        let f = module.function(caller);
        let node = f.inst(call);
        (
            node.loc,
            node.scope,
            node.block,
            f.position_in_block(call),
            node.result.expect("apply without a result"),
        )
    };

    // Every cloned instruction adopts the call-site location, tagged with
    // the inlining discipline that put it there.
    let loc = match kind {
        InlineKind::Performance => call_loc.inlined(),
        InlineKind::Mandatory => call_loc.mandatory_inlined(),
    };

    // Mandatory inlining attributes clones to the call site's own scope.
    // Performance inlining builds a dedicated scope below it, inheriting
    // the call site's own inlined-call-site link.
    let call_site_scope = match kind {
        InlineKind::Mandatory => call_scope,
        InlineKind::Performance => {
            let inherited = module.scope(call_scope).inlined_call_site;
            module.alloc_scope(ScopeData {
                loc: call_loc,
                parent: Some(call_scope),
                function: caller,
                inlined_call_site: inherited,
            })
        }
    };

    module.mark_function_inlined(callee_id);
    log::debug!(
        "inlining '{}' into '{}' ({:?})",
        module.function(callee_id).name,
        module.function(caller).name,
        kind
    );

    // Snapshot the callee body; the caller is about to be rewritten and
    // both may live in the same arena.
    let callee = module.function(callee_id).clone();
    let (caller_fn, _defs, scopes) = module.inline_parts(caller);

    let entry = BlockId(0);
    let entry_params: Vec<ValueId> = callee.entry_block().params.iter().map(|p| p.id).collect();
    assert_eq!(
        entry_params.len(),
        args.len(),
        "inline argument count does not match the callee entry block"
    );

    let mut cloner = InlineCloner::new(
        caller_fn,
        &callee,
        scopes,
        kind,
        loc,
        call_site_scope,
        Cursor { block: call_block, index: call_pos + 1 },
    );
    for (&p, &a) in entry_params.iter().zip(args) {
        cloner.value_map.insert(p, a);
    }
    // The entry block is never cloned: its instructions inline directly
    // after the call site.
    cloner.block_map.insert(entry, None);

    let order = cloner.preorder();
    cloner.clone_blocks(&order);
    cloner.clone_body(&order);

    let entry_term = callee.terminator(entry).expect("unterminated callee entry block");

    // Fast path: a straight-line callee needs no block surgery at all.
    if let Instr::Return { operand } = callee.inst(entry_term).instr {
        let ret = cloner.remap(operand);
        cloner.caller.replace_all_uses(call_result, ret);
        cloner.caller.erase_inst(call);
        return true;
    }

    // General path: split the caller block after the inlined entry code;
    // the suffix becomes the return-to block, carrying the call result as
    // its parameter.
    let split_at = cloner.cursor.index;
    let return_to = cloner.caller.split_block(call_block, split_at);
    let result_ty = cloner
        .caller
        .value_type(call_result)
        .cloned()
        .expect("call result without a type");
    let ret_val = cloner.caller.add_block_param(return_to, None, result_ty);
    cloner.caller.replace_all_uses(call_result, ret_val);
    cloner.caller.erase_inst(call);

    // The entry terminator seals the caller-side prefix; every other block
    // gets its terminator now that all destinations exist. Returns become
    // branches into the return-to block.
    cloner.clone_terminator(entry, Some(return_to));
    for &b in &order {
        if b != entry {
            cloner.clone_terminator(b, Some(return_to));
        }
    }

    // Keep the return-to block after the whole inlined region in program
    // order.
    let last_inlined = order.iter().rev().find_map(|b| match cloner.block_map.get(b) {
        Some(Some(dest)) => Some(*dest),
        _ => None,
    });
    if let Some(after) = last_inlined {
        cloner.caller.move_block_after(return_to, after);
    }

    true
}

/// Pipeline adapter: expands every call site whose callee's cost fits the
/// threshold.
pub struct InlinePass {
    pub threshold: u64,
}

impl Default for InlinePass {
    fn default() -> Self {
        Self { threshold: 10 }
    }
}

impl Pass for InlinePass {
    fn name(&self) -> &'static str {
        "inline"
    }

    fn run(&mut self, module: &mut Module) -> Result<(), PassError> {
        // Collect candidate sites first; arena ids stay valid across
        // rewrites, and sites erased by earlier inlining are skipped.
        let mut candidates: Vec<(FunctionId, InstId, Vec<ValueId>)> = Vec::new();
        for (fi, f) in module.functions().iter().enumerate() {
            for block in f.blocks() {
                for &inst in &block.insts {
                    if let Instr::Apply { callee, args, .. } = &f.inst(inst).instr {
                        if pattern::function_ref(f, *callee).is_some() {
                            candidates.push((FunctionId(fi as u32), inst, args.to_vec()));
                        }
                    }
                }
            }
        }

        for (caller, call, args) in candidates {
            if module.function(caller).try_inst(call).is_none() {
                continue;
            }
            let Some(callee_id) = resolve_static_callee(module, caller, call) else {
                continue;
            };
            if callee_id == caller {
                continue;
            }
            let cost = cost::function_cost(module, callee_id, self.threshold);
            if cost > self.threshold {
                continue;
            }
            inline_call(module, caller, call, &args, InlineKind::Performance);
        }
        Ok(())
    }
}

fn resolve_static_callee(module: &Module, caller: FunctionId, call: InstId) -> Option<FunctionId> {
    let f = module.function(caller);
    let Instr::Apply { callee, .. } = &f.inst(call).instr else {
        return None;
    };
    module.function_id(pattern::function_ref(f, *callee)?)
}
