//! Symbol adapters: one narrow view over two very different readers.
//!
//! The walkers only ever talk to [`SymbolAdapter`]. [`binary`] implements
//! it over ECMA-335 metadata and IL, [`source`] over tree-sitter C# syntax.
//! [`Module`] is the tagged variant the orchestrator holds.

pub mod binary;
pub mod doc;
pub mod exports;
pub mod language;
pub mod source;

use std::path::PathBuf;

pub use exports::{ExportTable, ExportedMember, ExportedType, SymbolIndex, TypeExpr};
pub use language::InputKind;

use crate::graph::types::{MemberKind, SourceLocation};
use crate::names;

/// Handle of a type inside one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

/// Handle of a member inside one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(pub u32);

/// Failure to read one symbol. Logged and skipped by the walkers.
#[derive(Debug, thiserror::Error)]
pub enum SymbolError {
    #[error("metadata: {0}")]
    Metadata(#[from] binary::MetadataError),

    #[error("unknown handle {0:#x}")]
    UnknownHandle(u32),

    #[error("syntax: {0}")]
    Syntax(String),
}

// ─── Type References ────────────────────────────────────────────────

/// A named type as seen from a reference site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedType {
    /// Owning module. `None` when the reference could not be resolved at all.
    pub module: Option<String>,
    pub namespace: String,
    /// Raw names from the outermost declaring type down to this one.
    pub nesting: Vec<String>,
    pub generic_args: Vec<TypeRef>,
    /// Definition handle when the type lives in the module being read.
    pub local: Option<TypeId>,
}

impl NamedType {
    pub fn new(module: Option<String>, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module,
            namespace: namespace.into(),
            nesting: vec![name.into()],
            generic_args: Vec::new(),
            local: None,
        }
    }

    /// Lookup key used by export tables: `N.Outer.Inner`1`.
    pub fn key(&self) -> String {
        export_key(&self.namespace, &self.nesting)
    }

    pub fn name(&self) -> &str {
        self.nesting.last().map(String::as_str).unwrap_or_default()
    }

    pub fn is_compiler_generated(&self) -> bool {
        self.nesting.iter().any(|n| names::is_compiler_generated_name(n))
    }

    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.namespace == namespace && self.nesting.len() == 1 && self.nesting[0] == name
    }

    /// Name used inside member signatures.
    fn display(&self) -> String {
        let raw = self.name();
        if self.generic_args.is_empty() {
            return names::canonicalize(raw);
        }
        let base = raw.split('`').next().unwrap_or(raw);
        let args: Vec<String> = self.generic_args.iter().map(TypeRef::display).collect();
        format!("{base}<{}>", args.join(","))
    }
}

/// Export-table key for a namespace and nesting chain.
pub fn export_key(namespace: &str, nesting: &[String]) -> String {
    let chain = nesting.join(".");
    names::join(namespace, &chain)
}

/// A type as it appears in a signature, local, or expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Named(NamedType),
    Array(Box<TypeRef>),
    Pointer(Box<TypeRef>),
    ByRef(Box<TypeRef>),
    /// Generic parameter, already rendered (`T`, `T0`, `M1`).
    GenericParam(String),
}

impl TypeRef {
    pub fn named(module: Option<String>, namespace: &str, name: &str) -> Self {
        TypeRef::Named(NamedType::new(module, namespace, name))
    }

    /// Short display form used in canonical member signatures.
    pub fn display(&self) -> String {
        match self {
            TypeRef::Named(named) => named.display(),
            TypeRef::Array(inner) => format!("{}[]", inner.display()),
            TypeRef::Pointer(inner) => format!("{}*", inner.display()),
            TypeRef::ByRef(inner) => format!("{}&", inner.display()),
            TypeRef::GenericParam(name) => name.clone(),
        }
    }

    /// The named type under any array/pointer/by-ref wrappers.
    pub fn as_named(&self) -> Option<&NamedType> {
        match self {
            TypeRef::Named(named) => Some(named),
            TypeRef::Array(inner) | TypeRef::Pointer(inner) | TypeRef::ByRef(inner) => {
                inner.as_named()
            }
            TypeRef::GenericParam(_) => None,
        }
    }

    /// Every named type mentioned, with a flag set for generic arguments.
    pub fn named_types(&self) -> Vec<(&NamedType, bool)> {
        let mut out = Vec::new();
        let mut stack = vec![(self, false)];
        while let Some((ty, is_arg)) = stack.pop() {
            match ty {
                TypeRef::Named(named) => {
                    out.push((named, is_arg));
                    for arg in named.generic_args.iter().rev() {
                        stack.push((arg, true));
                    }
                }
                TypeRef::Array(inner) | TypeRef::Pointer(inner) | TypeRef::ByRef(inner) => {
                    stack.push((inner, is_arg));
                }
                TypeRef::GenericParam(_) => {}
            }
        }
        out
    }
}

// ─── Symbols ────────────────────────────────────────────────────────

/// A type definition as the walkers see it.
#[derive(Debug, Clone)]
pub struct TypeSymbol {
    pub id: TypeId,
    pub namespace: String,
    /// Raw names from the outermost declaring type down to this one.
    pub nesting: Vec<String>,
    pub declaring_type: Option<TypeId>,
    pub base_type: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    pub is_compiler_generated: bool,
    pub description: Option<String>,
    pub location: Option<SourceLocation>,
}

impl TypeSymbol {
    pub fn name(&self) -> &str {
        self.nesting.last().map(String::as_str).unwrap_or_default()
    }

    pub fn is_nested(&self) -> bool {
        self.declaring_type.is_some()
    }

    pub fn key(&self) -> String {
        export_key(&self.namespace, &self.nesting)
    }

    /// Implements `System.Runtime.CompilerServices.IAsyncStateMachine`.
    pub fn is_async_state_machine(&self) -> bool {
        self.interfaces.iter().any(|i| {
            i.as_named().is_some_and(|n| {
                n.is("System.Runtime.CompilerServices", "IAsyncStateMachine")
            })
        })
    }
}

/// A field, property, event or method.
#[derive(Debug, Clone)]
pub struct MemberSymbol {
    pub id: MemberId,
    pub declaring_type: TypeId,
    /// Raw name (`.ctor`, `get_X` never appear for properties; they carry `X`).
    pub name: String,
    pub kind: MemberKind,
    /// Parameter display forms that make up the canonical signature.
    pub signature: Vec<String>,
    pub parameters: Vec<TypeRef>,
    /// Return type for methods, declared type for fields, properties and events.
    pub value_type: Option<TypeRef>,
    pub is_constructor: bool,
    /// Compiler-supplied parameterless constructor. Gets no node.
    pub is_implicit_default_ctor: bool,
    pub is_private: bool,
    pub is_compiler_generated: bool,
    pub description: Option<String>,
    pub location: Option<SourceLocation>,
}

impl MemberSymbol {
    pub fn segment(&self) -> String {
        names::member_segment(&self.name, &self.signature, self.kind == MemberKind::Method)
    }
}

/// A member as seen from a reference site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub declaring: NamedType,
    pub name: String,
    pub kind: MemberKind,
    pub signature: Vec<String>,
    /// Method instantiation arguments at the call site.
    pub generic_args: Vec<TypeRef>,
    /// Definition handle when the member lives in the module being read.
    pub local: Option<MemberId>,
    pub is_constructor: bool,
    pub is_implicit_default_ctor: bool,
    pub is_local_function: bool,
}

impl MemberRef {
    pub fn new(declaring: NamedType, name: impl Into<String>, kind: MemberKind) -> Self {
        Self {
            declaring,
            name: name.into(),
            kind,
            signature: Vec::new(),
            generic_args: Vec::new(),
            local: None,
            is_constructor: false,
            is_implicit_default_ctor: false,
            is_local_function: false,
        }
    }

    pub fn segment(&self) -> String {
        names::member_segment(&self.name, &self.signature, self.kind == MemberKind::Method)
    }

    pub fn is_compiler_generated(&self) -> bool {
        names::is_compiler_generated_name(&self.name) || self.declaring.is_compiler_generated()
    }
}

/// How a body uses a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeUsage {
    LocalVariable,
    ForeachElement,
    Catch,
    GenericArgument,
}

/// How a body uses a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberUsage {
    Call,
    Creation,
    Access,
}

/// One reference found while reading a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyReference {
    Type { target: TypeRef, usage: TypeUsage },
    Member { target: MemberRef, usage: MemberUsage },
}

// ─── Adapter ────────────────────────────────────────────────────────

/// Capability set every backend implements.
///
/// Unresolvable references come back as placeholders (a `NamedType` with
/// a guessed or missing module), never as errors.
pub trait SymbolAdapter: Send + Sync {
    fn module_name(&self) -> &str;

    /// Names of the modules this one references.
    fn references(&self) -> &[String];

    /// Files this module was read from.
    fn files(&self) -> Vec<PathBuf>;

    /// Public surface used for cross-module resolution.
    fn exports(&self) -> ExportTable;

    fn top_level_types(&self) -> Vec<TypeId>;

    fn nested_types(&self, ty: TypeId) -> Vec<TypeId>;

    fn type_symbol(&self, ty: TypeId, index: &SymbolIndex) -> Result<TypeSymbol, SymbolError>;

    /// Fields, properties, events and methods. Accessor methods are folded
    /// into their property or event.
    fn members(&self, ty: TypeId) -> Vec<MemberId>;

    fn member_symbol(&self, member: MemberId, index: &SymbolIndex)
        -> Result<MemberSymbol, SymbolError>;

    fn has_body(&self, member: MemberId) -> bool;

    /// References found in the member's body, accessor bodies or initializer.
    fn body(&self, member: MemberId, index: &SymbolIndex) -> Result<Vec<BodyReference>, SymbolError>;

    fn find_method(&self, ty: TypeId, name: &str) -> Option<MemberId>;
}

/// The two backends behind one type.
pub enum Module {
    Binary(binary::BinaryModule),
    Source(source::SourceModule),
}

impl Module {
    fn adapter(&self) -> &dyn SymbolAdapter {
        match self {
            Module::Binary(module) => module,
            Module::Source(module) => module,
        }
    }
}

impl SymbolAdapter for Module {
    fn module_name(&self) -> &str {
        self.adapter().module_name()
    }

    fn references(&self) -> &[String] {
        self.adapter().references()
    }

    fn files(&self) -> Vec<PathBuf> {
        self.adapter().files()
    }

    fn exports(&self) -> ExportTable {
        self.adapter().exports()
    }

    fn top_level_types(&self) -> Vec<TypeId> {
        self.adapter().top_level_types()
    }

    fn nested_types(&self, ty: TypeId) -> Vec<TypeId> {
        self.adapter().nested_types(ty)
    }

    fn type_symbol(&self, ty: TypeId, index: &SymbolIndex) -> Result<TypeSymbol, SymbolError> {
        self.adapter().type_symbol(ty, index)
    }

    fn members(&self, ty: TypeId) -> Vec<MemberId> {
        self.adapter().members(ty)
    }

    fn member_symbol(
        &self,
        member: MemberId,
        index: &SymbolIndex,
    ) -> Result<MemberSymbol, SymbolError> {
        self.adapter().member_symbol(member, index)
    }

    fn has_body(&self, member: MemberId) -> bool {
        self.adapter().has_body(member)
    }

    fn body(&self, member: MemberId, index: &SymbolIndex) -> Result<Vec<BodyReference>, SymbolError> {
        self.adapter().body(member, index)
    }

    fn find_method(&self, ty: TypeId, name: &str) -> Option<MemberId> {
        self.adapter().find_method(ty, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(name: &str) -> TypeRef {
        TypeRef::named(Some("System.Runtime".into()), "System", name)
    }

    #[test]
    fn test_generic_display() {
        let mut list = NamedType::new(Some("System.Runtime".into()), "System.Collections.Generic", "List`1");
        list.generic_args.push(system("String"));
        let ty = TypeRef::Array(Box::new(TypeRef::Named(list)));
        assert_eq!(ty.display(), "List<String>[]");
        assert_eq!(system("Int32").display(), "Int32");
        assert_eq!(TypeRef::named(None, "", "Dictionary`2").display(), "Dictionary<T,T>");
    }

    #[test]
    fn test_named_types_flags_generic_arguments() {
        let mut dict = NamedType::new(Some("m".into()), "N", "Map`2");
        dict.generic_args = vec![system("String"), TypeRef::GenericParam("T0".into())];
        let ty = TypeRef::ByRef(Box::new(TypeRef::Named(dict)));
        let found: Vec<(String, bool)> = ty
            .named_types()
            .into_iter()
            .map(|(n, arg)| (n.name().to_string(), arg))
            .collect();
        assert_eq!(found, vec![("Map`2".to_string(), false), ("String".to_string(), true)]);
    }

    #[test]
    fn test_async_state_machine_detection() {
        let symbol = TypeSymbol {
            id: TypeId(1),
            namespace: "N".into(),
            nesting: vec!["Foo".into(), "<Run>d__3".into()],
            declaring_type: Some(TypeId(0)),
            base_type: None,
            interfaces: vec![TypeRef::named(
                Some("System.Runtime".into()),
                "System.Runtime.CompilerServices",
                "IAsyncStateMachine",
            )],
            is_compiler_generated: true,
            description: None,
            location: None,
        };
        assert!(symbol.is_async_state_machine());
        assert!(symbol.is_nested());
        assert_eq!(symbol.key(), "N.Foo.<Run>d__3");
    }

    #[test]
    fn test_member_ref_segment() {
        let owner = NamedType::new(Some("m".into()), "N", "Foo");
        let mut getter = MemberRef::new(owner.clone(), "get_Count", MemberKind::Method);
        assert_eq!(getter.segment(), "Count");
        getter.name = ".ctor".into();
        getter.signature = vec!["System.String".into()];
        assert_eq!(getter.segment(), "#ctor(String)");
        let field = MemberRef::new(owner, "count", MemberKind::Field);
        assert_eq!(field.segment(), "count");
    }
}
