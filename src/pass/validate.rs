//! SSA validation pass.
//!
//! Checks structural correctness of a `Module` before and after
//! transformations. This pass is intentionally conservative: it rejects
//! anything it cannot prove correct.

use rustc_hash::FxHashSet;

use crate::error::PassError;
use crate::ir::function::Use;
use crate::ir::module::Module;
use crate::ir::value::ValueId;
use crate::pass::Pass;

/// Validates SSA invariants across the entire module.
///
/// Checks:
/// 1. Every value used in an instruction is defined before its first use
///    (linear scan in layout order — sufficient for the topologically
///    ordered blocks the builder and the inliner produce).
/// 2. Every value is defined exactly once.
/// 3. Every block ends with exactly one terminator as its last instruction.
/// 4. Use-lists agree with operand slots in both directions.
pub struct ValidatePass;

impl Pass for ValidatePass {
    fn name(&self) -> &'static str {
        "validate"
    }

    fn run(&mut self, module: &mut Module) -> Result<(), PassError> {
        for func in module.functions() {
            let func_name = &func.name;

            let mut defined: FxHashSet<ValueId> = FxHashSet::default();

            for &block_id in func.layout() {
                let block = func.block(block_id);
                let label = block.label();

                // Block params are defined at block entry.
                for param in &block.params {
                    if !defined.insert(param.id) {
                        return Err(PassError::MultipleDefinition {
                            func: func_name.clone(),
                            value: format!("{}", param.id),
                        });
                    }
                }

                let n = block.insts.len();
                for (i, &inst_id) in block.insts.iter().enumerate() {
                    let node = func.inst(inst_id);

                    // Terminator must be the last instruction.
                    if node.instr.is_terminator() && i != n - 1 {
                        return Err(PassError::MisplacedTerminator {
                            func: func_name.clone(),
                            block: label.clone(),
                        });
                    }

                    // All operands must be defined before this instruction,
                    // and each operand slot must appear in the producer's
                    // use-list.
                    for (index, operand) in node.instr.operands().into_iter().enumerate() {
                        if !defined.contains(&operand) {
                            return Err(PassError::UseBeforeDef {
                                func: func_name.clone(),
                                value: format!("{}", operand),
                            });
                        }
                        let expected = Use { user: inst_id, index };
                        if !func.uses_of(operand).contains(&expected) {
                            return Err(PassError::BrokenUseList {
                                func: func_name.clone(),
                                detail: format!(
                                    "operand {} of {} not recorded in use-list of {}",
                                    index, inst_id, operand
                                ),
                            });
                        }
                    }

                    if let Some(result) = node.result {
                        if !defined.insert(result) {
                            return Err(PassError::MultipleDefinition {
                                func: func_name.clone(),
                                value: format!("{}", result),
                            });
                        }
                    }
                }

                // Block must end with a terminator.
                if func.terminator(block_id).is_none() {
                    return Err(PassError::MissingTerminator {
                        func: func_name.clone(),
                        block: label,
                    });
                }
            }

            // Every recorded use must point at a live instruction that
            // actually has the value in that operand slot.
            for (&value, uses) in &func.uses {
                for u in uses {
                    let ok = func
                        .try_inst(u.user)
                        .is_some_and(|node| node.instr.operands().get(u.index) == Some(&value));
                    if !ok {
                        return Err(PassError::BrokenUseList {
                            func: func_name.clone(),
                            detail: format!("stale use of {} by {}", value, u.user),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
