use rustc_hash::FxHashMap;

use crate::error::ModuleError;

/// Representation of a metatype value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetatypeRepr {
    /// No runtime value; the type is statically known.
    Thin,
    /// A native type-descriptor pointer.
    Thick,
    /// A foreign-runtime class object.
    ObjC,
}

/// Encoding of a string literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    Utf8,
    Utf16,
}

/// Side-effect classification of a callee, read as a function attribute.
/// The ordering is significant: rules compare with `<` against `ReadWrite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EffectsKind {
    ReadNone,
    ReadOnly,
    ReadWrite,
    Unknown,
}

/// Calling convention of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallingConv {
    Default,
    Method,
    C,
    ObjC,
}

impl CallingConv {
    /// Foreign conventions may not be expanded by the mandatory inliner.
    pub fn is_foreign(self) -> bool {
        matches!(self, CallingConv::C | CallingConv::ObjC)
    }
}

/// One parameter of a function signature, with its ownership annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamInfo {
    pub ty: Type,
    /// The callee consumes ownership of this argument.
    pub consumed: bool,
    /// Passed indirectly (by address).
    pub indirect: bool,
}

impl ParamInfo {
    pub fn owned(ty: Type) -> Self {
        Self { ty, consumed: true, indirect: false }
    }

    pub fn guaranteed(ty: Type) -> Self {
        Self { ty, consumed: false, indirect: false }
    }
}

/// A function signature as carried by function-typed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnSig {
    pub params: Vec<ParamInfo>,
    pub result: Type,
    pub cc: CallingConv,
    /// A thin function carries no context and is trivial; a thick one owns
    /// its captured context and is reference counted.
    pub thin: bool,
}

impl FnSig {
    pub fn thin(params: Vec<ParamInfo>, result: Type) -> Self {
        Self { params, result, cc: CallingConv::Default, thin: true }
    }

    pub fn thick(params: Vec<ParamInfo>, result: Type) -> Self {
        Self { params, result, cc: CallingConv::Default, thin: false }
    }
}

/// Three-valued answer for `can_be_class` style type-trait queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTrait {
    Is,
    IsNot,
    CanBe,
}

/// An IR type.
///
/// Nominal types (structs, enums, classes) are referenced by name; their
/// shape lives in [`TypeDefs`]. `Address(T)` is the type of a pointer to
/// storage holding a `T`; all other cases are object types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Int { bits: u32 },
    Float { bits: u32 },
    /// An untyped pointer, as produced by `address_to_pointer`.
    RawPointer,
    Class(String),
    Struct(String),
    Enum(String),
    Tuple(Vec<Type>),
    Function(Box<FnSig>),
    Metatype { instance: Box<Type>, repr: MetatypeRepr },
    /// A protocol-constrained existential container. Always address-only.
    Existential(String),
    /// An unsubstituted generic parameter. Layout unknown.
    Archetype(String),
    Address(Box<Type>),
}

impl Type {
    pub const BOOL: Type = Type::Int { bits: 1 };

    pub fn address_of(ty: Type) -> Type {
        Type::Address(Box::new(ty))
    }

    pub fn metatype(instance: Type, repr: MetatypeRepr) -> Type {
        Type::Metatype { instance: Box::new(instance), repr }
    }

    pub fn function(sig: FnSig) -> Type {
        Type::Function(Box::new(sig))
    }

    pub fn is_address(&self) -> bool {
        matches!(self, Type::Address(_))
    }

    /// The pointed-to type of an address, or the type itself.
    pub fn object_type(&self) -> &Type {
        match self {
            Type::Address(inner) => inner,
            other => other,
        }
    }

    /// This type wrapped in `Address`, unless it already is one.
    pub fn address_type(&self) -> Type {
        match self {
            Type::Address(_) => self.clone(),
            other => Type::address_of(other.clone()),
        }
    }

    pub fn metatype_repr(&self) -> Option<MetatypeRepr> {
        match self {
            Type::Metatype { repr, .. } => Some(*repr),
            _ => None,
        }
    }

    pub fn metatype_instance(&self) -> Option<&Type> {
        match self {
            Type::Metatype { instance, .. } => Some(instance),
            _ => None,
        }
    }

    pub fn fn_sig(&self) -> Option<&FnSig> {
        match self {
            Type::Function(sig) => Some(sig),
            _ => None,
        }
    }

    /// True if any component of this type is an unsubstituted generic
    /// parameter, which makes its layout unknown.
    pub fn has_archetype(&self) -> bool {
        match self {
            Type::Archetype(_) => true,
            Type::Int { .. }
            | Type::Float { .. }
            | Type::RawPointer
            | Type::Class(_)
            | Type::Struct(_)
            | Type::Enum(_)
            | Type::Existential(_) => false,
            Type::Tuple(elems) => elems.iter().any(Type::has_archetype),
            Type::Function(sig) => {
                sig.result.has_archetype() || sig.params.iter().any(|p| p.ty.has_archetype())
            }
            Type::Metatype { instance, .. } => instance.has_archetype(),
            Type::Address(inner) => inner.has_archetype(),
        }
    }

    /// True for class references, which obey retain/release discipline.
    pub fn has_reference_semantics(&self) -> bool {
        matches!(self, Type::Class(_))
    }

    /// A trivial type carries no ownership obligations: copying and
    /// discarding it needs no reference-counting operations.
    pub fn is_trivial(&self, defs: &TypeDefs) -> bool {
        match self {
            Type::Int { .. } | Type::Float { .. } | Type::RawPointer => true,
            Type::Metatype { .. } => true,
            Type::Class(_) | Type::Existential(_) | Type::Archetype(_) => false,
            Type::Function(sig) => sig.thin,
            Type::Tuple(elems) => elems.iter().all(|t| t.is_trivial(defs)),
            Type::Struct(name) => match defs.struct_def(name) {
                Some(def) => def.fields.iter().all(|(_, t)| t.is_trivial(defs)),
                None => false,
            },
            Type::Enum(name) => match defs.enum_def(name) {
                Some(def) => def
                    .cases
                    .iter()
                    .all(|c| c.payload.as_ref().map_or(true, |t| t.is_trivial(defs))),
                None => false,
            },
            Type::Address(inner) => inner.is_trivial(defs),
        }
    }

    /// An address-only type cannot be materialized in registers; its values
    /// are manipulated exclusively through addresses. An aggregate is
    /// address-only if any component is.
    pub fn is_address_only(&self, defs: &TypeDefs) -> bool {
        match self {
            Type::Existential(_) | Type::Archetype(_) => true,
            Type::Int { .. }
            | Type::Float { .. }
            | Type::RawPointer
            | Type::Class(_)
            | Type::Function(_)
            | Type::Metatype { .. } => false,
            Type::Tuple(elems) => elems.iter().any(|t| t.is_address_only(defs)),
            Type::Struct(name) => match defs.struct_def(name) {
                Some(def) => def.fields.iter().any(|(_, t)| t.is_address_only(defs)),
                None => true,
            },
            Type::Enum(name) => match defs.enum_def(name) {
                Some(def) => def
                    .cases
                    .iter()
                    .any(|c| c.payload.as_ref().is_some_and(|t| t.is_address_only(defs))),
                None => true,
            },
            Type::Address(inner) => inner.is_address_only(defs),
        }
    }

    pub fn is_loadable(&self, defs: &TypeDefs) -> bool {
        !self.is_address_only(defs)
    }

    /// True if `other` is a class and `self` appears on its superclass chain.
    pub fn is_superclass_of(&self, other: &Type, defs: &TypeDefs) -> bool {
        let (Type::Class(sup), Type::Class(sub)) = (self, other) else {
            return false;
        };
        let mut cur = sub.as_str();
        while let Some(def) = defs.class_def(cur) {
            match &def.superclass {
                Some(parent) => {
                    if parent == sup {
                        return true;
                    }
                    cur = parent;
                }
                None => return false,
            }
        }
        false
    }

    /// Whether a value of this type can be a class instance at runtime.
    pub fn can_be_class(&self, defs: &TypeDefs) -> TypeTrait {
        match self {
            Type::Class(_) => TypeTrait::Is,
            Type::Archetype(_) | Type::Existential(_) => TypeTrait::CanBe,
            Type::Int { .. }
            | Type::Float { .. }
            | Type::RawPointer
            | Type::Struct(_)
            | Type::Enum(_)
            | Type::Tuple(_)
            | Type::Function(_)
            | Type::Metatype { .. } => TypeTrait::IsNot,
            Type::Address(inner) => inner.can_be_class(defs),
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int { bits } => write!(f, "i{}", bits),
            Type::Float { bits } => write!(f, "f{}", bits),
            Type::RawPointer => f.write_str("rawptr"),
            Type::Class(n) | Type::Struct(n) | Type::Enum(n) | Type::Existential(n) => {
                f.write_str(n)
            }
            Type::Archetype(n) => write!(f, "${}", n),
            Type::Tuple(elems) => {
                f.write_str("(")?;
                for (i, t) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                f.write_str(")")
            }
            Type::Function(sig) => {
                write!(f, "{}(", if sig.thin { "@thin " } else { "" })?;
                for (i, p) in sig.params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", p.ty)?;
                }
                write!(f, ") -> {}", sig.result)
            }
            Type::Metatype { instance, repr } => {
                let r = match repr {
                    MetatypeRepr::Thin => "thin",
                    MetatypeRepr::Thick => "thick",
                    MetatypeRepr::ObjC => "objc",
                };
                write!(f, "@{} {}.Type", r, instance)
            }
            Type::Address(inner) => write!(f, "*{}", inner),
        }
    }
}

// ---------------------------------------------------------------------------
// Nominal type definitions
// ---------------------------------------------------------------------------

/// A struct definition: ordered stored properties.
#[derive(Debug, Clone)]
pub struct StructDef {
    pub fields: Vec<(String, Type)>,
}

/// One case of an enum, with an optional payload type.
#[derive(Debug, Clone)]
pub struct EnumCase {
    pub name: String,
    pub payload: Option<Type>,
}

/// An enum definition: ordered cases.
#[derive(Debug, Clone)]
pub struct EnumDef {
    pub cases: Vec<EnumCase>,
}

/// A class definition. Only the superclass link matters to the optimizer.
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub superclass: Option<String>,
}

/// Registry of nominal type shapes, shared by all functions of a module.
///
/// All structural oracle queries (`is_trivial`, single-stored-property,
/// first-payloaded-case, subclass relations) resolve through this table.
#[derive(Debug, Default)]
pub struct TypeDefs {
    structs: FxHashMap<String, StructDef>,
    enums: FxHashMap<String, EnumDef>,
    classes: FxHashMap<String, ClassDef>,
}

impl TypeDefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_struct(
        &mut self,
        name: impl Into<String>,
        fields: Vec<(String, Type)>,
    ) -> Result<(), ModuleError> {
        let name = name.into();
        if self.structs.contains_key(&name) {
            return Err(ModuleError::DuplicateTypeDef { name });
        }
        self.structs.insert(name, StructDef { fields });
        Ok(())
    }

    pub fn add_enum(
        &mut self,
        name: impl Into<String>,
        cases: Vec<EnumCase>,
    ) -> Result<(), ModuleError> {
        let name = name.into();
        if self.enums.contains_key(&name) {
            return Err(ModuleError::DuplicateTypeDef { name });
        }
        self.enums.insert(name, EnumDef { cases });
        Ok(())
    }

    pub fn add_class(
        &mut self,
        name: impl Into<String>,
        superclass: Option<String>,
    ) -> Result<(), ModuleError> {
        let name = name.into();
        if self.classes.contains_key(&name) {
            return Err(ModuleError::DuplicateTypeDef { name });
        }
        self.classes.insert(name, ClassDef { superclass });
        Ok(())
    }

    pub fn struct_def(&self, name: &str) -> Option<&StructDef> {
        self.structs.get(name)
    }

    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.enums.get(name)
    }

    pub fn class_def(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    /// The single stored property of `name`, if the struct has exactly one.
    /// A single-property struct is layout compatible with that property.
    pub fn single_stored_field(&self, name: &str) -> Option<&(String, Type)> {
        let def = self.struct_def(name)?;
        match def.fields.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Index of the first case of `name` that carries a payload. The first
    /// payloaded case is layout compatible with the enum itself.
    pub fn first_payloaded_case(&self, name: &str) -> Option<usize> {
        self.enum_def(name)?
            .cases
            .iter()
            .position(|c| c.payload.is_some())
    }

    /// The payload type of `case` of enum `name`, or `None` for a unit case.
    pub fn case_payload(&self, name: &str, case: usize) -> Option<&Type> {
        self.enum_def(name)?.cases.get(case)?.payload.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs_with_shapes() -> TypeDefs {
        let mut defs = TypeDefs::new();
        defs.add_class("Base", None).unwrap();
        defs.add_class("Derived", Some("Base".into())).unwrap();
        defs.add_class("Leaf", Some("Derived".into())).unwrap();
        defs.add_struct("Wrapper", vec![("inner".into(), Type::Class("Base".into()))])
            .unwrap();
        defs.add_struct(
            "Pair",
            vec![
                ("a".into(), Type::Int { bits: 64 }),
                ("b".into(), Type::Int { bits: 64 }),
            ],
        )
        .unwrap();
        defs.add_enum(
            "Maybe",
            vec![
                EnumCase { name: "none".into(), payload: None },
                EnumCase {
                    name: "some".into(),
                    payload: Some(Type::Class("Base".into())),
                },
            ],
        )
        .unwrap();
        defs
    }

    #[test]
    fn trivial_classification() {
        let defs = defs_with_shapes();
        assert!(Type::Int { bits: 64 }.is_trivial(&defs));
        assert!(Type::Struct("Pair".into()).is_trivial(&defs));
        assert!(!Type::Class("Base".into()).is_trivial(&defs));
        assert!(!Type::Struct("Wrapper".into()).is_trivial(&defs));
        assert!(!Type::Enum("Maybe".into()).is_trivial(&defs));
    }

    #[test]
    fn superclass_chain() {
        let defs = defs_with_shapes();
        let base = Type::Class("Base".into());
        let leaf = Type::Class("Leaf".into());
        assert!(base.is_superclass_of(&leaf, &defs));
        assert!(!leaf.is_superclass_of(&base, &defs));
        assert!(!base.is_superclass_of(&base, &defs));
    }

    #[test]
    fn address_only_propagates_through_aggregates() {
        let mut defs = defs_with_shapes();
        defs.add_struct("Opaque", vec![("x".into(), Type::Archetype("T".into()))])
            .unwrap();
        assert!(Type::Struct("Opaque".into()).is_address_only(&defs));
        assert!(Type::Struct("Pair".into()).is_loadable(&defs));
        assert!(Type::Existential("Showable".into()).is_address_only(&defs));
    }

    #[test]
    fn layout_queries() {
        let defs = defs_with_shapes();
        assert!(defs.single_stored_field("Wrapper").is_some());
        assert!(defs.single_stored_field("Pair").is_none());
        assert_eq!(defs.first_payloaded_case("Maybe"), Some(1));
        assert!(defs.case_payload("Maybe", 0).is_none());
        assert!(defs.case_payload("Maybe", 1).is_some());
    }
}
