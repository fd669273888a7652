//! OPAL: an optimizer core for a reference-counted, mid-level IR.
//!
//! The crate operates on typed SSA functions (block-parameter form) whose
//! instructions model value ownership, enums with payloads, address/value
//! distinctions and explicit reference counting. Two subsystems make up the
//! core:
//!
//! 1. The **peephole combiner** (`pass::combine`) — a worklist-driven local
//!    rewrite engine run to a fixpoint per function.
//! 2. The **function inliner** (`pass::inline`) — clones a callee body into
//!    a call site under a Free/Expensive cost model.
//!
//! IR is constructed through [`ir::module::FunctionBuilder`]:
//!
//! ```text
//! Module::new → FunctionBuilder → [blocks, params, instructions] → finish
//!   → run_combine / inline_call
//! ```
//!
//! Entry points:
//! - [`run_combine`] — rewrite one function to a fixpoint; returns whether
//!   anything changed.
//! - [`inline_call`] — expand one call site; returns success.
//! - [`function_cost`] — the inline cost model.

pub mod error;
pub mod ir;
pub mod pattern;
pub mod pass;

pub use error::Error;
pub use pass::combine::{run_combine, CombineOptions, CombinePass};
pub use pass::inline::{function_cost, inline_call, InlineKind, InlinePass, CANNOT_INLINE_COST};
pub use pass::{Pass, PassManager, ValidatePass};
