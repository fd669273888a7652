//! Source locations and debug scopes.
//!
//! Scopes form a tree before inlining and a DAG afterwards: inlining creates
//! scope nodes whose `inlined_call_site` points back at the scope of the
//! call that was expanded, so every cloned instruction stays attributable to
//! both its original source and the inlining chain.

use crate::ir::function::FunctionId;

/// How a location came to be attached to an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocKind {
    Regular,
    /// Cloned into place by the performance inliner.
    Inlined,
    /// Cloned into place by the mandatory inliner.
    MandatoryInlined,
}

/// A source position: a byte offset into the original source text, plus the
/// provenance of the instruction carrying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLoc {
    pub span: u32,
    pub kind: LocKind,
}

impl SourceLoc {
    pub fn new(span: u32) -> Self {
        Self { span, kind: LocKind::Regular }
    }

    /// This location re-tagged as produced by the performance inliner.
    pub fn inlined(self) -> Self {
        Self { kind: LocKind::Inlined, ..self }
    }

    /// This location re-tagged as produced by the mandatory inliner.
    pub fn mandatory_inlined(self) -> Self {
        Self { kind: LocKind::MandatoryInlined, ..self }
    }
}

impl Default for SourceLoc {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Index of a debug scope in the module's scope arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(pub u32);

/// A debug-scope node.
#[derive(Debug, Clone)]
pub struct ScopeData {
    pub loc: SourceLoc,
    pub parent: Option<ScopeId>,
    /// The function whose source this scope describes.
    pub function: FunctionId,
    /// Set precisely when this scope covers instructions inlined from
    /// elsewhere; points at the scope of the expanded call site.
    pub inlined_call_site: Option<ScopeId>,
}
