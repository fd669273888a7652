use smallvec::SmallVec;

use crate::ir::block::BlockId;
use crate::ir::types::{StringEncoding, Type};
use crate::ir::value::ValueId;

/// Index of an instruction in a function's instruction arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstId(pub u32);

impl std::fmt::Display for InstId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// Inline-stored operand list. Most instructions have one or two operands.
pub type OperandList = SmallVec<[ValueId; 2]>;

/// Compiler-known primitive operations, referenced via `BuiltinRef` and
/// invoked through `Apply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    CanBeClass,
    ICmpEq,
    ICmpNe,
    Sub,
    Xor,
    PtrToInt,
    /// Overflow-reporting arithmetic: yields `(result, did_overflow)`.
    SMulOver,
    SAddOver,
    SSubOver,
    Strideof,
    StrideofNonZero,
}

impl BuiltinKind {
    pub fn is_overflow_arith(self) -> bool {
        matches!(
            self,
            BuiltinKind::SMulOver | BuiltinKind::SAddOver | BuiltinKind::SSubOver
        )
    }

    pub fn is_strideof(self) -> bool {
        matches!(self, BuiltinKind::Strideof | BuiltinKind::StrideofNonZero)
    }
}

/// A single IR instruction.
///
/// Invariants:
/// - Terminators are the last instruction of their block; no instruction
///   follows a terminator.
/// - Operand order is canonical: [`Instr::operands`] and
///   [`Instr::for_each_operand_mut`] visit the same slots in the same order,
///   and use-list entries are keyed by that order.
#[derive(Debug, Clone)]
pub enum Instr {
    // ---- Literals and references ----
    IntegerLiteral { value: i128 },
    FloatLiteral { bits: u64 },
    StringLiteral { value: String, encoding: StringEncoding },
    FunctionRef { name: String },
    BuiltinRef { kind: BuiltinKind },
    GlobalAddr { name: String },
    /// A statically-known metatype value; the produced type is the result type.
    Metatype,
    ValueMetatype { operand: ValueId },
    ExistentialMetatype { operand: ValueId },

    // ---- Aggregates ----
    Struct { fields: OperandList },
    Tuple { elements: OperandList },
    StructExtract { operand: ValueId, field: usize },
    TupleExtract { operand: ValueId, index: usize },
    StructElementAddr { operand: ValueId, field: usize },
    TupleElementAddr { operand: ValueId, index: usize },

    // ---- Enums ----
    /// Construct an enum value; `payload` is present iff the case has one.
    Enum { case: usize, payload: Option<ValueId> },
    /// Extract the payload of a known case from an enum value.
    UncheckedEnumData { operand: ValueId, case: usize },
    /// Project the payload storage of a case out of an enum address, prior
    /// to initialization.
    InitEnumDataAddr { operand: ValueId, case: usize },
    /// Tag an enum address with a case after its payload was initialized.
    InjectEnumAddr { operand: ValueId, case: usize },
    /// Project the payload storage of a case out of an initialized enum
    /// address, taking ownership.
    UncheckedTakeEnumDataAddr { operand: ValueId, case: usize },
    /// Test whether an enum value carries the given case. Yields `i1`.
    EnumIsTag { operand: ValueId, case: usize },

    // ---- Casts ----
    Upcast { operand: ValueId },
    UncheckedRefCast { operand: ValueId },
    UncheckedAddrCast { operand: ValueId },
    UncheckedRefBitCast { operand: ValueId },
    UncheckedTrivialBitCast { operand: ValueId },
    RefToRawPointer { operand: ValueId },
    RawPointerToRef { operand: ValueId },
    AddressToPointer { operand: ValueId },
    PointerToAddress { operand: ValueId },
    ThickToObjCMetatype { operand: ValueId },
    ObjCToThickMetatype { operand: ValueId },
    ObjCMetatypeToObject { operand: ValueId },
    ObjCExistentialMetatypeToObject { operand: ValueId },
    /// A dynamically-checked cast that traps on failure.
    UnconditionalCheckedCast { operand: ValueId },
    ConvertFunction { operand: ValueId },
    ThinToThickFunction { operand: ValueId },

    // ---- Memory ----
    AllocStack,
    DeallocStack { operand: ValueId },
    DestroyAddr { operand: ValueId },
    Load { operand: ValueId },
    Store { value: ValueId, addr: ValueId },
    /// Prepare an existential container at `operand` to hold a value of
    /// `concrete_ty`; yields the address of the concrete payload storage.
    InitExistential { operand: ValueId, concrete_ty: Type },
    DeinitExistential { operand: ValueId },
    IndexAddr { base: ValueId, index: ValueId },
    IndexRawPointer { base: ValueId, index: ValueId },

    // ---- Reference counting and debug info ----
    RetainValue { operand: ValueId },
    ReleaseValue { operand: ValueId },
    StrongRetain { operand: ValueId },
    StrongRelease { operand: ValueId },
    FixLifetime { operand: ValueId },
    DebugValue { operand: ValueId },
    DebugValueAddr { operand: ValueId },
    /// Trap when the operand (an `i1`) is nonzero.
    CondFail { operand: ValueId },

    // ---- Calls ----
    Apply {
        callee: ValueId,
        args: OperandList,
        substitutions: Vec<Type>,
        transparent: bool,
    },
    /// Closure formation: captures `args`, consuming ownership of the
    /// captured non-address arguments when the closure is destroyed.
    PartialApply {
        callee: ValueId,
        args: OperandList,
        substitutions: Vec<Type>,
    },

    // ---- Terminators ----
    Branch { target: BlockId, args: OperandList },
    CondBranch {
        cond: ValueId,
        true_target: BlockId,
        true_args: OperandList,
        false_target: BlockId,
        false_args: OperandList,
    },
    /// Dispatch on the tag of an enum value.
    SwitchEnum {
        operand: ValueId,
        cases: Vec<(usize, BlockId)>,
        default: Option<BlockId>,
    },
    /// Dispatch on the tag of an enum held in memory.
    SwitchEnumAddr {
        operand: ValueId,
        cases: Vec<(usize, BlockId)>,
        default: Option<BlockId>,
    },
    Return { operand: ValueId },
    /// Foreign-convention return that autoreleases its operand. Never
    /// produced for native functions.
    AutoreleaseReturn { operand: ValueId },
    Unreachable,
}

/// The opcode of an instruction, without its operands. Used for dispatch in
/// the combiner and classification in the inline cost model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    IntegerLiteral,
    FloatLiteral,
    StringLiteral,
    FunctionRef,
    BuiltinRef,
    GlobalAddr,
    Metatype,
    ValueMetatype,
    ExistentialMetatype,
    Struct,
    Tuple,
    StructExtract,
    TupleExtract,
    StructElementAddr,
    TupleElementAddr,
    Enum,
    UncheckedEnumData,
    InitEnumDataAddr,
    InjectEnumAddr,
    UncheckedTakeEnumDataAddr,
    EnumIsTag,
    Upcast,
    UncheckedRefCast,
    UncheckedAddrCast,
    UncheckedRefBitCast,
    UncheckedTrivialBitCast,
    RefToRawPointer,
    RawPointerToRef,
    AddressToPointer,
    PointerToAddress,
    ThickToObjCMetatype,
    ObjCToThickMetatype,
    ObjCMetatypeToObject,
    ObjCExistentialMetatypeToObject,
    UnconditionalCheckedCast,
    ConvertFunction,
    ThinToThickFunction,
    AllocStack,
    DeallocStack,
    DestroyAddr,
    Load,
    Store,
    InitExistential,
    DeinitExistential,
    IndexAddr,
    IndexRawPointer,
    RetainValue,
    ReleaseValue,
    StrongRetain,
    StrongRelease,
    FixLifetime,
    DebugValue,
    DebugValueAddr,
    CondFail,
    Apply,
    PartialApply,
    Branch,
    CondBranch,
    SwitchEnum,
    SwitchEnumAddr,
    Return,
    AutoreleaseReturn,
    Unreachable,
}

impl Instr {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instr::IntegerLiteral { .. } => Opcode::IntegerLiteral,
            Instr::FloatLiteral { .. } => Opcode::FloatLiteral,
            Instr::StringLiteral { .. } => Opcode::StringLiteral,
            Instr::FunctionRef { .. } => Opcode::FunctionRef,
            Instr::BuiltinRef { .. } => Opcode::BuiltinRef,
            Instr::GlobalAddr { .. } => Opcode::GlobalAddr,
            Instr::Metatype => Opcode::Metatype,
            Instr::ValueMetatype { .. } => Opcode::ValueMetatype,
            Instr::ExistentialMetatype { .. } => Opcode::ExistentialMetatype,
            Instr::Struct { .. } => Opcode::Struct,
            Instr::Tuple { .. } => Opcode::Tuple,
            Instr::StructExtract { .. } => Opcode::StructExtract,
            Instr::TupleExtract { .. } => Opcode::TupleExtract,
            Instr::StructElementAddr { .. } => Opcode::StructElementAddr,
            Instr::TupleElementAddr { .. } => Opcode::TupleElementAddr,
            Instr::Enum { .. } => Opcode::Enum,
            Instr::UncheckedEnumData { .. } => Opcode::UncheckedEnumData,
            Instr::InitEnumDataAddr { .. } => Opcode::InitEnumDataAddr,
            Instr::InjectEnumAddr { .. } => Opcode::InjectEnumAddr,
            Instr::UncheckedTakeEnumDataAddr { .. } => Opcode::UncheckedTakeEnumDataAddr,
            Instr::EnumIsTag { .. } => Opcode::EnumIsTag,
            Instr::Upcast { .. } => Opcode::Upcast,
            Instr::UncheckedRefCast { .. } => Opcode::UncheckedRefCast,
            Instr::UncheckedAddrCast { .. } => Opcode::UncheckedAddrCast,
            Instr::UncheckedRefBitCast { .. } => Opcode::UncheckedRefBitCast,
            Instr::UncheckedTrivialBitCast { .. } => Opcode::UncheckedTrivialBitCast,
            Instr::RefToRawPointer { .. } => Opcode::RefToRawPointer,
            Instr::RawPointerToRef { .. } => Opcode::RawPointerToRef,
            Instr::AddressToPointer { .. } => Opcode::AddressToPointer,
            Instr::PointerToAddress { .. } => Opcode::PointerToAddress,
            Instr::ThickToObjCMetatype { .. } => Opcode::ThickToObjCMetatype,
            Instr::ObjCToThickMetatype { .. } => Opcode::ObjCToThickMetatype,
            Instr::ObjCMetatypeToObject { .. } => Opcode::ObjCMetatypeToObject,
            Instr::ObjCExistentialMetatypeToObject { .. } => {
                Opcode::ObjCExistentialMetatypeToObject
            }
            Instr::UnconditionalCheckedCast { .. } => Opcode::UnconditionalCheckedCast,
            Instr::ConvertFunction { .. } => Opcode::ConvertFunction,
            Instr::ThinToThickFunction { .. } => Opcode::ThinToThickFunction,
            Instr::AllocStack => Opcode::AllocStack,
            Instr::DeallocStack { .. } => Opcode::DeallocStack,
            Instr::DestroyAddr { .. } => Opcode::DestroyAddr,
            Instr::Load { .. } => Opcode::Load,
            Instr::Store { .. } => Opcode::Store,
            Instr::InitExistential { .. } => Opcode::InitExistential,
            Instr::DeinitExistential { .. } => Opcode::DeinitExistential,
            Instr::IndexAddr { .. } => Opcode::IndexAddr,
            Instr::IndexRawPointer { .. } => Opcode::IndexRawPointer,
            Instr::RetainValue { .. } => Opcode::RetainValue,
            Instr::ReleaseValue { .. } => Opcode::ReleaseValue,
            Instr::StrongRetain { .. } => Opcode::StrongRetain,
            Instr::StrongRelease { .. } => Opcode::StrongRelease,
            Instr::FixLifetime { .. } => Opcode::FixLifetime,
            Instr::DebugValue { .. } => Opcode::DebugValue,
            Instr::DebugValueAddr { .. } => Opcode::DebugValueAddr,
            Instr::CondFail { .. } => Opcode::CondFail,
            Instr::Apply { .. } => Opcode::Apply,
            Instr::PartialApply { .. } => Opcode::PartialApply,
            Instr::Branch { .. } => Opcode::Branch,
            Instr::CondBranch { .. } => Opcode::CondBranch,
            Instr::SwitchEnum { .. } => Opcode::SwitchEnum,
            Instr::SwitchEnumAddr { .. } => Opcode::SwitchEnumAddr,
            Instr::Return { .. } => Opcode::Return,
            Instr::AutoreleaseReturn { .. } => Opcode::AutoreleaseReturn,
            Instr::Unreachable => Opcode::Unreachable,
        }
    }

    /// Visits every operand slot in canonical order.
    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut ValueId)) {
        match self {
            Instr::IntegerLiteral { .. }
            | Instr::FloatLiteral { .. }
            | Instr::StringLiteral { .. }
            | Instr::FunctionRef { .. }
            | Instr::BuiltinRef { .. }
            | Instr::GlobalAddr { .. }
            | Instr::Metatype
            | Instr::AllocStack
            | Instr::Unreachable => {}

            Instr::ValueMetatype { operand }
            | Instr::ExistentialMetatype { operand }
            | Instr::StructExtract { operand, .. }
            | Instr::TupleExtract { operand, .. }
            | Instr::StructElementAddr { operand, .. }
            | Instr::TupleElementAddr { operand, .. }
            | Instr::UncheckedEnumData { operand, .. }
            | Instr::InitEnumDataAddr { operand, .. }
            | Instr::InjectEnumAddr { operand, .. }
            | Instr::UncheckedTakeEnumDataAddr { operand, .. }
            | Instr::EnumIsTag { operand, .. }
            | Instr::Upcast { operand }
            | Instr::UncheckedRefCast { operand }
            | Instr::UncheckedAddrCast { operand }
            | Instr::UncheckedRefBitCast { operand }
            | Instr::UncheckedTrivialBitCast { operand }
            | Instr::RefToRawPointer { operand }
            | Instr::RawPointerToRef { operand }
            | Instr::AddressToPointer { operand }
            | Instr::PointerToAddress { operand }
            | Instr::ThickToObjCMetatype { operand }
            | Instr::ObjCToThickMetatype { operand }
            | Instr::ObjCMetatypeToObject { operand }
            | Instr::ObjCExistentialMetatypeToObject { operand }
            | Instr::UnconditionalCheckedCast { operand }
            | Instr::ConvertFunction { operand }
            | Instr::ThinToThickFunction { operand }
            | Instr::DeallocStack { operand }
            | Instr::DestroyAddr { operand }
            | Instr::Load { operand }
            | Instr::InitExistential { operand, .. }
            | Instr::DeinitExistential { operand }
            | Instr::RetainValue { operand }
            | Instr::ReleaseValue { operand }
            | Instr::StrongRetain { operand }
            | Instr::StrongRelease { operand }
            | Instr::FixLifetime { operand }
            | Instr::DebugValue { operand }
            | Instr::DebugValueAddr { operand }
            | Instr::CondFail { operand }
            | Instr::SwitchEnum { operand, .. }
            | Instr::SwitchEnumAddr { operand, .. }
            | Instr::Return { operand }
            | Instr::AutoreleaseReturn { operand } => f(operand),

            Instr::Struct { fields } => fields.iter_mut().for_each(f),
            Instr::Tuple { elements } => elements.iter_mut().for_each(f),
            Instr::Enum { payload, .. } => {
                if let Some(p) = payload {
                    f(p);
                }
            }
            Instr::Store { value, addr } => {
                f(value);
                f(addr);
            }
            Instr::IndexAddr { base, index } | Instr::IndexRawPointer { base, index } => {
                f(base);
                f(index);
            }
            Instr::Apply { callee, args, .. } | Instr::PartialApply { callee, args, .. } => {
                f(callee);
                args.iter_mut().for_each(f);
            }
            Instr::Branch { args, .. } => args.iter_mut().for_each(f),
            Instr::CondBranch { cond, true_args, false_args, .. } => {
                f(cond);
                true_args.iter_mut().for_each(&mut f);
                false_args.iter_mut().for_each(f);
            }
        }
    }

    /// All operands in canonical order.
    pub fn operands(&self) -> OperandList {
        let mut ops = OperandList::new();
        match self {
            Instr::IntegerLiteral { .. }
            | Instr::FloatLiteral { .. }
            | Instr::StringLiteral { .. }
            | Instr::FunctionRef { .. }
            | Instr::BuiltinRef { .. }
            | Instr::GlobalAddr { .. }
            | Instr::Metatype
            | Instr::AllocStack
            | Instr::Unreachable => {}

            Instr::ValueMetatype { operand }
            | Instr::ExistentialMetatype { operand }
            | Instr::StructExtract { operand, .. }
            | Instr::TupleExtract { operand, .. }
            | Instr::StructElementAddr { operand, .. }
            | Instr::TupleElementAddr { operand, .. }
            | Instr::UncheckedEnumData { operand, .. }
            | Instr::InitEnumDataAddr { operand, .. }
            | Instr::InjectEnumAddr { operand, .. }
            | Instr::UncheckedTakeEnumDataAddr { operand, .. }
            | Instr::EnumIsTag { operand, .. }
            | Instr::Upcast { operand }
            | Instr::UncheckedRefCast { operand }
            | Instr::UncheckedAddrCast { operand }
            | Instr::UncheckedRefBitCast { operand }
            | Instr::UncheckedTrivialBitCast { operand }
            | Instr::RefToRawPointer { operand }
            | Instr::RawPointerToRef { operand }
            | Instr::AddressToPointer { operand }
            | Instr::PointerToAddress { operand }
            | Instr::ThickToObjCMetatype { operand }
            | Instr::ObjCToThickMetatype { operand }
            | Instr::ObjCMetatypeToObject { operand }
            | Instr::ObjCExistentialMetatypeToObject { operand }
            | Instr::UnconditionalCheckedCast { operand }
            | Instr::ConvertFunction { operand }
            | Instr::ThinToThickFunction { operand }
            | Instr::DeallocStack { operand }
            | Instr::DestroyAddr { operand }
            | Instr::Load { operand }
            | Instr::InitExistential { operand, .. }
            | Instr::DeinitExistential { operand }
            | Instr::RetainValue { operand }
            | Instr::ReleaseValue { operand }
            | Instr::StrongRetain { operand }
            | Instr::StrongRelease { operand }
            | Instr::FixLifetime { operand }
            | Instr::DebugValue { operand }
            | Instr::DebugValueAddr { operand }
            | Instr::CondFail { operand }
            | Instr::SwitchEnum { operand, .. }
            | Instr::SwitchEnumAddr { operand, .. }
            | Instr::Return { operand }
            | Instr::AutoreleaseReturn { operand } => ops.push(*operand),

            Instr::Struct { fields } => ops.extend_from_slice(fields),
            Instr::Tuple { elements } => ops.extend_from_slice(elements),
            Instr::Enum { payload, .. } => ops.extend(payload.iter().copied()),
            Instr::Store { value, addr } => {
                ops.push(*value);
                ops.push(*addr);
            }
            Instr::IndexAddr { base, index } | Instr::IndexRawPointer { base, index } => {
                ops.push(*base);
                ops.push(*index);
            }
            Instr::Apply { callee, args, .. } | Instr::PartialApply { callee, args, .. } => {
                ops.push(*callee);
                ops.extend_from_slice(args);
            }
            Instr::Branch { args, .. } => ops.extend_from_slice(args),
            Instr::CondBranch { cond, true_args, false_args, .. } => {
                ops.push(*cond);
                ops.extend_from_slice(true_args);
                ops.extend_from_slice(false_args);
            }
        }
        ops
    }

    /// The operand in slot `index` of the canonical order.
    pub fn operand(&self, index: usize) -> ValueId {
        self.operands()[index]
    }

    /// Overwrites the operand in slot `index` of the canonical order.
    pub fn set_operand(&mut self, index: usize, value: ValueId) {
        let mut i = 0usize;
        self.for_each_operand_mut(|op| {
            if i == index {
                *op = value;
            }
            i += 1;
        });
        assert!(index < i, "operand index {} out of range", index);
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instr::Branch { .. }
                | Instr::CondBranch { .. }
                | Instr::SwitchEnum { .. }
                | Instr::SwitchEnumAddr { .. }
                | Instr::Return { .. }
                | Instr::AutoreleaseReturn { .. }
                | Instr::Unreachable
        )
    }

    /// True if the instruction produces a result value.
    pub fn has_result(&self) -> bool {
        match self {
            Instr::InjectEnumAddr { .. }
            | Instr::DeallocStack { .. }
            | Instr::DestroyAddr { .. }
            | Instr::DeinitExistential { .. }
            | Instr::Store { .. }
            | Instr::RetainValue { .. }
            | Instr::ReleaseValue { .. }
            | Instr::StrongRetain { .. }
            | Instr::StrongRelease { .. }
            | Instr::FixLifetime { .. }
            | Instr::DebugValue { .. }
            | Instr::DebugValueAddr { .. }
            | Instr::CondFail { .. } => false,
            _ => !self.is_terminator(),
        }
    }

    pub fn is_ref_counting(&self) -> bool {
        matches!(
            self,
            Instr::RetainValue { .. }
                | Instr::ReleaseValue { .. }
                | Instr::StrongRetain { .. }
                | Instr::StrongRelease { .. }
        )
    }

    pub fn is_debug_inst(&self) -> bool {
        matches!(self, Instr::DebugValue { .. } | Instr::DebugValueAddr { .. })
    }

    /// Successor blocks of a terminator, in case order.
    pub fn successors(&self) -> SmallVec<[BlockId; 2]> {
        let mut succs = SmallVec::new();
        match self {
            Instr::Branch { target, .. } => succs.push(*target),
            Instr::CondBranch { true_target, false_target, .. } => {
                succs.push(*true_target);
                succs.push(*false_target);
            }
            Instr::SwitchEnum { cases, default, .. }
            | Instr::SwitchEnumAddr { cases, default, .. } => {
                succs.extend(cases.iter().map(|(_, b)| *b));
                succs.extend(default.iter().copied());
            }
            _ => {}
        }
        succs
    }

    /// Visits every successor slot of a terminator.
    pub fn for_each_successor_mut(&mut self, mut f: impl FnMut(&mut BlockId)) {
        match self {
            Instr::Branch { target, .. } => f(target),
            Instr::CondBranch { true_target, false_target, .. } => {
                f(true_target);
                f(false_target);
            }
            Instr::SwitchEnum { cases, default, .. }
            | Instr::SwitchEnumAddr { cases, default, .. } => {
                for (_, b) in cases.iter_mut() {
                    f(b);
                }
                if let Some(b) = default {
                    f(b);
                }
            }
            _ => {}
        }
    }

    /// The opcode name, for diagnostics and logging.
    pub fn name(&self) -> &'static str {
        self.opcode().name()
    }
}

impl Opcode {
    pub fn name(self) -> &'static str {
        match self {
            Opcode::IntegerLiteral => "integer_literal",
            Opcode::FloatLiteral => "float_literal",
            Opcode::StringLiteral => "string_literal",
            Opcode::FunctionRef => "function_ref",
            Opcode::BuiltinRef => "builtin_ref",
            Opcode::GlobalAddr => "global_addr",
            Opcode::Metatype => "metatype",
            Opcode::ValueMetatype => "value_metatype",
            Opcode::ExistentialMetatype => "existential_metatype",
            Opcode::Struct => "struct",
            Opcode::Tuple => "tuple",
            Opcode::StructExtract => "struct_extract",
            Opcode::TupleExtract => "tuple_extract",
            Opcode::StructElementAddr => "struct_element_addr",
            Opcode::TupleElementAddr => "tuple_element_addr",
            Opcode::Enum => "enum",
            Opcode::UncheckedEnumData => "unchecked_enum_data",
            Opcode::InitEnumDataAddr => "init_enum_data_addr",
            Opcode::InjectEnumAddr => "inject_enum_addr",
            Opcode::UncheckedTakeEnumDataAddr => "unchecked_take_enum_data_addr",
            Opcode::EnumIsTag => "enum_is_tag",
            Opcode::Upcast => "upcast",
            Opcode::UncheckedRefCast => "unchecked_ref_cast",
            Opcode::UncheckedAddrCast => "unchecked_addr_cast",
            Opcode::UncheckedRefBitCast => "unchecked_ref_bit_cast",
            Opcode::UncheckedTrivialBitCast => "unchecked_trivial_bit_cast",
            Opcode::RefToRawPointer => "ref_to_raw_pointer",
            Opcode::RawPointerToRef => "raw_pointer_to_ref",
            Opcode::AddressToPointer => "address_to_pointer",
            Opcode::PointerToAddress => "pointer_to_address",
            Opcode::ThickToObjCMetatype => "thick_to_objc_metatype",
            Opcode::ObjCToThickMetatype => "objc_to_thick_metatype",
            Opcode::ObjCMetatypeToObject => "objc_metatype_to_object",
            Opcode::ObjCExistentialMetatypeToObject => "objc_existential_metatype_to_object",
            Opcode::UnconditionalCheckedCast => "unconditional_checked_cast",
            Opcode::ConvertFunction => "convert_function",
            Opcode::ThinToThickFunction => "thin_to_thick_function",
            Opcode::AllocStack => "alloc_stack",
            Opcode::DeallocStack => "dealloc_stack",
            Opcode::DestroyAddr => "destroy_addr",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::InitExistential => "init_existential",
            Opcode::DeinitExistential => "deinit_existential",
            Opcode::IndexAddr => "index_addr",
            Opcode::IndexRawPointer => "index_raw_pointer",
            Opcode::RetainValue => "retain_value",
            Opcode::ReleaseValue => "release_value",
            Opcode::StrongRetain => "strong_retain",
            Opcode::StrongRelease => "strong_release",
            Opcode::FixLifetime => "fix_lifetime",
            Opcode::DebugValue => "debug_value",
            Opcode::DebugValueAddr => "debug_value_addr",
            Opcode::CondFail => "cond_fail",
            Opcode::Apply => "apply",
            Opcode::PartialApply => "partial_apply",
            Opcode::Branch => "br",
            Opcode::CondBranch => "cond_br",
            Opcode::SwitchEnum => "switch_enum",
            Opcode::SwitchEnumAddr => "switch_enum_addr",
            Opcode::Return => "return",
            Opcode::AutoreleaseReturn => "autorelease_return",
            Opcode::Unreachable => "unreachable",
        }
    }
}
