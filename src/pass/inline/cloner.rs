//! Body cloner used by the inliner.
//!
//! Maps callee values and blocks into the caller, rewriting every operand
//! through the value map as instructions are cloned. Blocks are visited in
//! depth-first preorder from the callee entry, which visits dominators
//! before the blocks they dominate, so every operand is mapped by the time
//! its users are cloned. Terminators are cloned last, after all destination
//! blocks exist.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ir::block::BlockId;
use crate::ir::builder::Cursor;
use crate::ir::debug::{ScopeData, ScopeId, SourceLoc};
use crate::ir::function::{Function, InstNode};
use crate::ir::instr::{InstId, Instr, OperandList};
use crate::ir::value::ValueId;

use super::InlineKind;

pub(super) struct InlineCloner<'a> {
    pub caller: &'a mut Function,
    pub callee: &'a Function,
    scopes: &'a mut Vec<ScopeData>,
    kind: InlineKind,
    /// The location adopted by every cloned instruction.
    loc: SourceLoc,
    call_site_scope: ScopeId,
    pub value_map: FxHashMap<ValueId, ValueId>,
    /// Maps callee blocks to caller blocks; `None` suppresses cloning (the
    /// entry block, whose instructions land at the cursor instead).
    pub block_map: FxHashMap<BlockId, Option<BlockId>>,
    /// Memoizes the inline scope derived from each callee scope.
    scope_cache: FxHashMap<ScopeId, ScopeId>,
    pub cursor: Cursor,
}

impl<'a> InlineCloner<'a> {
    pub fn new(
        caller: &'a mut Function,
        callee: &'a Function,
        scopes: &'a mut Vec<ScopeData>,
        kind: InlineKind,
        loc: SourceLoc,
        call_site_scope: ScopeId,
        cursor: Cursor,
    ) -> Self {
        Self {
            caller,
            callee,
            scopes,
            kind,
            loc,
            call_site_scope,
            value_map: FxHashMap::default(),
            block_map: FxHashMap::default(),
            scope_cache: FxHashMap::default(),
            cursor,
        }
    }

    pub fn remap(&self, v: ValueId) -> ValueId {
        *self
            .value_map
            .get(&v)
            .unwrap_or_else(|| panic!("callee value {} unmapped during inlining", v))
    }

    fn remapped_block(&self, b: BlockId) -> BlockId {
        match self.block_map.get(&b) {
            Some(Some(dest)) => *dest,
            _ => panic!("branch to unmapped callee block {}", b),
        }
    }

    /// The inline scope standing in for `callee_scope`: parented at the
    /// call-site scope, pointing back at it as the inlined call site.
    /// Memoized so every instruction of one callee scope shares one node.
    fn inline_scope_for(&mut self, callee_scope: ScopeId) -> ScopeId {
        if let Some(&cached) = self.scope_cache.get(&callee_scope) {
            return cached;
        }
        let src = &self.scopes[callee_scope.0 as usize];
        let data = ScopeData {
            loc: src.loc,
            parent: Some(self.call_site_scope),
            function: src.function,
            inlined_call_site: Some(self.call_site_scope),
        };
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(data);
        self.scope_cache.insert(callee_scope, id);
        id
    }

    /// Reachable callee blocks in depth-first preorder from the entry.
    pub fn preorder(&self) -> Vec<BlockId> {
        let entry = BlockId(0);
        let mut order = Vec::new();
        let mut seen = FxHashSet::default();
        let mut stack = vec![entry];
        seen.insert(entry);
        while let Some(b) = stack.pop() {
            order.push(b);
            let succs = self.callee.successors(b);
            for &s in succs.iter().rev() {
                if seen.insert(s) {
                    stack.push(s);
                }
            }
        }
        order
    }

    /// Creates a destination block (with remapped params) for every block
    /// in `order` not already present in the block map.
    pub fn clone_blocks(&mut self, order: &[BlockId]) {
        for &b in order {
            if self.block_map.contains_key(&b) {
                continue;
            }
            let dest = self.caller.create_block(None);
            for i in 0..self.callee.block(b).params.len() {
                let param = &self.callee.block(b).params[i];
                let (src_id, ty, name) = (param.id, param.ty.clone(), param.name.clone());
                let v = self.caller.add_block_param(dest, name.as_deref(), ty);
                self.value_map.insert(src_id, v);
            }
            self.block_map.insert(b, Some(dest));
        }
    }

    /// Clones the non-terminator instructions of every block in `order`.
    /// Entry instructions land at the cursor; others append to their
    /// destination blocks.
    pub fn clone_body(&mut self, order: &[BlockId]) {
        for &b in order {
            let dest = self.block_map[&b];
            let term = self.callee.terminator(b);
            let insts: Vec<InstId> = self.callee.block(b).insts.clone();
            for id in insts {
                if Some(id) == term {
                    continue;
                }
                self.clone_inst(id, dest);
            }
        }
    }

    fn clone_inst(&mut self, src: InstId, dest: Option<BlockId>) {
        let node = self.callee.inst(src);
        // Mandatory inlining drops debug values, as if the callee had been
        // compiled without debug info.
        if self.kind == InlineKind::Mandatory && node.instr.is_debug_inst() {
            return;
        }
        let mut instr = node.instr.clone();
        let src_scope = node.scope;
        let src_result = node.result;

        instr.for_each_operand_mut(|op| *op = self.remap(*op));
        let scope = self.inline_scope_for(src_scope);

        let result = src_result.map(|r| {
            let ty = self
                .callee
                .value_type(r)
                .expect("callee result without a type")
                .clone();
            let v = self.caller.fresh_value();
            self.caller.value_types.insert(v, ty);
            self.value_map.insert(r, v);
            v
        });

        match dest {
            None => {
                let n = InstNode {
                    instr,
                    result,
                    block: self.cursor.block,
                    loc: self.loc,
                    scope,
                };
                self.caller.insert_inst(n, self.cursor.index);
                self.cursor.index += 1;
            }
            Some(block) => {
                let index = self.caller.block(block).insts.len();
                let n = InstNode { instr, result, block, loc: self.loc, scope };
                self.caller.insert_inst(n, index);
            }
        }
    }

    /// Clones the terminator of `src_block`. Returns become branches to
    /// `return_to` carrying the remapped return value; other terminators
    /// are cloned with values and successors remapped.
    pub fn clone_terminator(&mut self, src_block: BlockId, return_to: Option<BlockId>) {
        let term = self
            .callee
            .terminator(src_block)
            .expect("callee block lacks a terminator");
        let node = self.callee.inst(term);
        let src_scope = node.scope;

        let instr = match node.instr.clone() {
            Instr::Return { operand } => {
                let target = return_to.expect("return cloned without a return-to block");
                let mut args = OperandList::new();
                args.push(self.remap(operand));
                Instr::Branch { target, args }
            }
            Instr::AutoreleaseReturn { .. } => {
                panic!("autorelease_return while inlining a non-foreign function")
            }
            mut other => {
                other.for_each_operand_mut(|op| *op = self.remap(*op));
                other.for_each_successor_mut(|b| *b = self.remapped_block(*b));
                other
            }
        };

        let dest = match self.block_map.get(&src_block) {
            Some(Some(block)) => *block,
            // The suppressed entry terminates the caller-side prefix.
            Some(None) => self.cursor.block,
            None => panic!("terminator of an unvisited callee block"),
        };
        let scope = self.inline_scope_for(src_scope);
        let index = self.caller.block(dest).insts.len();
        let n = InstNode { instr, result: None, block: dest, loc: self.loc, scope };
        self.caller.insert_inst(n, index);
    }
}
