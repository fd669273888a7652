use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::ir::block::{Block, BlockId};
use crate::ir::debug::{ScopeId, SourceLoc};
use crate::ir::instr::{InstId, Instr};
use crate::ir::types::{CallingConv, EffectsKind, Type};
use crate::ir::value::{BlockParam, ValueDef, ValueId};

/// Uniquely identifies a function within a `Module`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(pub u32);

/// A named, typed parameter of a function, with its ownership annotations.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    /// The function consumes ownership of this argument.
    pub consumed: bool,
    /// Passed indirectly (by address).
    pub indirect: bool,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty, consumed: false, indirect: false }
    }

    pub fn consumed(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty, consumed: true, indirect: false }
    }
}

/// One use of a value: an operand slot within a user instruction.
///
/// `index` is the slot in the canonical operand order of the user. All uses
/// of a value are discoverable through `Function::uses_of`; every operand
/// slot is recorded in exactly one use-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Use {
    pub user: InstId,
    pub index: usize,
}

/// An instruction together with its per-instruction bookkeeping: the parent
/// block, the result value (if any), source location and debug scope.
#[derive(Debug, Clone)]
pub struct InstNode {
    pub instr: Instr,
    pub result: Option<ValueId>,
    pub block: BlockId,
    pub loc: SourceLoc,
    pub scope: ScopeId,
}

/// A function body in SSA form.
///
/// Blocks and instructions are stored in flat arenas indexed by `BlockId`
/// and `InstId`. Erasing an instruction tombstones its arena slot; ids are
/// never reused within a function. The entry block is always `blocks[0]`;
/// its block params are the function arguments.
#[derive(Debug, Clone)]
pub struct Function {
    pub id: FunctionId,
    pub name: String,
    pub params: Vec<Param>,
    pub result_ty: Type,

    // Attributes read by the optimizer.
    /// Always inlined at every call site; costed as zero.
    pub transparent: bool,
    pub effects: EffectsKind,
    pub cc: CallingConv,
    /// Optimizer-recognized tag, e.g. `"string.concat"`.
    pub semantics: Option<String>,

    pub(crate) blocks: Vec<Block>,
    /// Block program order. Splitting and inlining reorder this without
    /// disturbing `BlockId` indexing.
    pub(crate) layout: Vec<BlockId>,
    pub(crate) insts: Vec<Option<InstNode>>,
    pub(crate) value_types: FxHashMap<ValueId, Type>,
    pub(crate) value_defs: FxHashMap<ValueId, ValueDef>,
    pub(crate) uses: FxHashMap<ValueId, Vec<Use>>,
    pub(crate) next_value: u32,
    /// The function's own (root) debug scope.
    pub scope: ScopeId,
    /// Number of call sites that inlined this function. Kept so abstract
    /// debug info can still be emitted for fully-inlined functions.
    pub(crate) inlined_uses: u32,
}

impl Function {
    /// Returns the entry block (always `BlockId(0)`).
    pub fn entry_block(&self) -> &Block {
        &self.blocks[0]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0 as usize]
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Block ids in program order.
    pub fn layout(&self) -> &[BlockId] {
        &self.layout
    }

    /// Looks up a live instruction. Panics if `id` was erased: touching an
    /// erased instruction is an invariant violation.
    pub fn inst(&self, id: InstId) -> &InstNode {
        self.insts[id.0 as usize]
            .as_ref()
            .unwrap_or_else(|| panic!("instruction {} accessed after erase", id))
    }

    pub(crate) fn inst_mut(&mut self, id: InstId) -> &mut InstNode {
        self.insts[id.0 as usize]
            .as_mut()
            .unwrap_or_else(|| panic!("instruction {} accessed after erase", id))
    }

    /// Like `inst`, but returns `None` for erased slots. The combiner
    /// worklist uses this to drop stale references.
    pub fn try_inst(&self, id: InstId) -> Option<&InstNode> {
        self.insts.get(id.0 as usize)?.as_ref()
    }

    pub fn value_type(&self, v: ValueId) -> Option<&Type> {
        self.value_types.get(&v)
    }

    pub fn value_def(&self, v: ValueId) -> Option<&ValueDef> {
        self.value_defs.get(&v)
    }

    /// All recorded uses of `v`, unordered.
    pub fn uses_of(&self, v: ValueId) -> &[Use] {
        self.uses.get(&v).map_or(&[], Vec::as_slice)
    }

    pub fn has_uses(&self, v: ValueId) -> bool {
        !self.uses_of(v).is_empty()
    }

    pub fn has_one_use(&self, v: ValueId) -> bool {
        self.uses_of(v).len() == 1
    }

    /// Number of call sites that inlined this function.
    pub fn inlined_use_count(&self) -> u32 {
        self.inlined_uses
    }

    pub(crate) fn fresh_value(&mut self) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        id
    }

    pub(crate) fn create_block(&mut self, name: Option<&str>) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::new(id, name.map(str::to_owned)));
        self.layout.push(id);
        id
    }

    pub(crate) fn add_block_param(
        &mut self,
        block: BlockId,
        name: Option<&str>,
        ty: Type,
    ) -> ValueId {
        let id = self.fresh_value();
        self.block_mut(block).params.push(BlockParam {
            id,
            ty: ty.clone(),
            name: name.map(str::to_owned),
        });
        self.value_defs.insert(id, ValueDef::BlockParam { block });
        self.value_types.insert(id, ty);
        id
    }

    /// Allocates an arena slot for `node` and inserts it into its block at
    /// `index`, registering result bookkeeping and operand uses.
    pub(crate) fn insert_inst(&mut self, node: InstNode, index: usize) -> InstId {
        let id = InstId(self.insts.len() as u32);
        let block = node.block;
        if let Some(result) = node.result {
            debug_assert!(node.instr.has_result());
            self.value_defs.insert(result, ValueDef::InstResult { inst: id });
        }
        self.insts.push(Some(node));
        let insts = &mut self.blocks[block.0 as usize].insts;
        assert!(index <= insts.len(), "insertion index out of range");
        insts.insert(index, id);
        self.record_operand_uses(id);
        id
    }

    pub(crate) fn record_operand_uses(&mut self, id: InstId) {
        let ops = self.inst(id).instr.operands();
        for (index, op) in ops.into_iter().enumerate() {
            self.uses.entry(op).or_default().push(Use { user: id, index });
        }
    }

    fn unrecord_operand_uses(&mut self, id: InstId) {
        let ops = self.inst(id).instr.operands();
        for op in ops {
            if let Some(list) = self.uses.get_mut(&op) {
                list.retain(|u| u.user != id);
            }
        }
    }

    /// Rewrites one operand slot, keeping use-lists consistent.
    pub(crate) fn set_inst_operand(&mut self, id: InstId, index: usize, value: ValueId) {
        let old = self.inst(id).instr.operand(index);
        if old == value {
            return;
        }
        if let Some(list) = self.uses.get_mut(&old) {
            list.retain(|u| !(u.user == id && u.index == index));
        }
        self.inst_mut(id).instr.set_operand(index, value);
        self.uses.entry(value).or_default().push(Use { user: id, index });
    }

    /// Rewrites an instruction wholesale, keeping use-lists consistent.
    /// The rewrite must not change whether the instruction has a result.
    pub(crate) fn rewrite_instr(&mut self, id: InstId, f: impl FnOnce(&mut Instr)) {
        self.unrecord_operand_uses(id);
        let node = self.inst_mut(id);
        let had_result = node.instr.has_result();
        f(&mut node.instr);
        debug_assert_eq!(had_result, node.instr.has_result());
        self.record_operand_uses(id);
    }

    /// Redirects every use of `old` to `new` in O(|uses(old)|).
    ///
    /// Panics if the two values' types differ: replacing a value with one of
    /// a different type breaks the IR.
    pub fn replace_all_uses(&mut self, old: ValueId, new: ValueId) {
        assert_ne!(old, new, "replacing a value with itself");
        assert_eq!(
            self.value_types.get(&old),
            self.value_types.get(&new),
            "replace_all_uses would change the type of {}",
            old
        );
        let moved = self.uses.remove(&old).unwrap_or_default();
        for u in &moved {
            self.inst_mut(u.user).instr.set_operand(u.index, new);
        }
        self.uses.entry(new).or_default().extend(moved);
    }

    /// Erases an instruction. Its result must have no remaining uses, and an
    /// instruction may be erased only once; both are hard invariants.
    pub fn erase_inst(&mut self, id: InstId) {
        let node = self.insts[id.0 as usize]
            .as_ref()
            .unwrap_or_else(|| panic!("instruction {} erased twice", id));
        if let Some(result) = node.result {
            assert!(
                !self.has_uses(result),
                "erasing {} ({}) whose result still has uses",
                id,
                node.instr.name()
            );
            self.value_types.remove(&result);
            self.value_defs.remove(&result);
            self.uses.remove(&result);
        }
        self.unrecord_operand_uses(id);
        let block = self.inst(id).block;
        let insts = &mut self.blocks[block.0 as usize].insts;
        let pos = insts
            .iter()
            .position(|&i| i == id)
            .expect("instruction missing from its block");
        insts.remove(pos);
        self.insts[id.0 as usize] = None;
    }

    /// Index of `id` within its block's instruction list.
    pub fn position_in_block(&self, id: InstId) -> usize {
        let block = self.inst(id).block;
        self.block(block)
            .insts
            .iter()
            .position(|&i| i == id)
            .expect("instruction missing from its block")
    }

    /// The instruction immediately preceding `id` in the same block.
    pub fn prev_in_block(&self, id: InstId) -> Option<InstId> {
        let pos = self.position_in_block(id);
        if pos == 0 {
            return None;
        }
        Some(self.block(self.inst(id).block).insts[pos - 1])
    }

    /// The terminator of `block`, if the block is sealed.
    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        let last = *self.block(block).insts.last()?;
        self.inst(last).instr.is_terminator().then_some(last)
    }

    pub fn is_sealed(&self, block: BlockId) -> bool {
        self.terminator(block).is_some()
    }

    /// Successor blocks of `block`.
    pub fn successors(&self, block: BlockId) -> SmallVec<[BlockId; 2]> {
        match self.terminator(block) {
            Some(t) => self.inst(t).instr.successors(),
            None => SmallVec::new(),
        }
    }

    /// Splits `block` at `index`: instructions from `index` on move to a new
    /// block, which is returned. No branch between the halves is created;
    /// the caller wires the prefix's new terminator. The new block is placed
    /// directly after `block` in the layout.
    pub(crate) fn split_block(&mut self, block: BlockId, index: usize) -> BlockId {
        let new = BlockId(self.blocks.len() as u32);
        let moved: Vec<InstId> = self.block_mut(block).insts.split_off(index);
        for &id in &moved {
            self.inst_mut(id).block = new;
        }
        let mut nb = Block::new(new, None);
        nb.insts = moved;
        self.blocks.push(nb);
        let at = self
            .layout
            .iter()
            .position(|&b| b == block)
            .expect("block missing from layout");
        self.layout.insert(at + 1, new);
        new
    }

    /// Moves `block` directly after `after` in the program order.
    pub(crate) fn move_block_after(&mut self, block: BlockId, after: BlockId) {
        let from = self
            .layout
            .iter()
            .position(|&b| b == block)
            .expect("block missing from layout");
        self.layout.remove(from);
        let to = self
            .layout
            .iter()
            .position(|&b| b == after)
            .expect("block missing from layout");
        self.layout.insert(to + 1, block);
    }

    /// Blocks in reverse post-order from the entry block. Unreachable
    /// blocks are not visited.
    pub fn reverse_post_order(&self) -> Vec<BlockId> {
        let mut post = Vec::with_capacity(self.blocks.len());
        let mut seen = FxHashSet::default();
        // Iterative DFS carrying a successor cursor per frame.
        let entry = BlockId(0);
        seen.insert(entry);
        let mut stack: Vec<(BlockId, usize)> = vec![(entry, 0)];
        while let Some(&(block, idx)) = stack.last() {
            let succs = self.successors(block);
            if idx < succs.len() {
                stack.last_mut().expect("stack is non-empty").1 += 1;
                let next = succs[idx];
                if seen.insert(next) {
                    stack.push((next, 0));
                }
            } else {
                post.push(block);
                stack.pop();
            }
        }
        post.reverse();
        post
    }
}
