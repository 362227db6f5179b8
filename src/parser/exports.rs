//! Module-name → exported-symbols lookup.
//!
//! Built once after all modules are opened and read-only afterwards.
//! Used to resolve references that cross module boundaries.

use std::collections::HashMap;
use std::sync::Arc;

use super::source::scope::Scope;
use super::{MemberId, TypeId, TypeRef};
use crate::graph::types::MemberKind;

/// A type reference that may still need resolving in its declaring scope.
#[derive(Debug, Clone)]
pub enum TypeExpr {
    Resolved(TypeRef),
    Scoped { text: String, scope: Arc<Scope> },
}

#[derive(Debug, Clone)]
pub struct ExportedMember {
    pub id: MemberId,
    pub name: String,
    pub kind: MemberKind,
    pub signature: Vec<String>,
    pub value_type: Option<TypeExpr>,
    pub is_constructor: bool,
    pub is_static: bool,
    /// Callable as an instance method of its first parameter's type.
    pub is_extension: bool,
}

#[derive(Debug, Clone)]
pub struct ExportedType {
    pub id: TypeId,
    pub namespace: String,
    pub nesting: Vec<String>,
    pub base: Option<TypeExpr>,
    pub members: Vec<ExportedMember>,
    /// A parameterless constructor is written out in code.
    pub has_explicit_default_ctor: bool,
    pub is_interface: bool,
}

impl ExportedType {
    pub fn members_named<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a ExportedMember> + use<'a, 'n> {
        self.members.iter().filter(move |m| m.name == name)
    }

    pub fn constructors(&self) -> impl Iterator<Item = &ExportedMember> {
        self.members.iter().filter(|m| m.is_constructor)
    }
}

/// Exported types of one module, keyed by `N.Outer.Inner`1`.
#[derive(Debug, Clone, Default)]
pub struct ExportTable {
    pub module: String,
    pub types: HashMap<String, ExportedType>,
}

impl ExportTable {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            types: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: String, ty: ExportedType) {
        self.types.insert(key, ty);
    }

    /// True if any exported type lives in `namespace` or below it.
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.types.values().any(|t| {
            t.namespace == namespace
                || t.namespace
                    .strip_prefix(namespace)
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

/// Export tables of every opened module.
#[derive(Debug, Default)]
pub struct SymbolIndex {
    tables: HashMap<String, ExportTable>,
    references: HashMap<String, Vec<String>>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module's exports and the module names it references.
    pub fn add(&mut self, table: ExportTable, references: Vec<String>) {
        self.references.insert(table.module.clone(), references);
        self.tables.insert(table.module.clone(), table);
    }

    pub fn table(&self, module: &str) -> Option<&ExportTable> {
        self.tables.get(module)
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Modules visible from `module`: itself first, then its references.
    pub fn visible_from<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a ExportTable> {
        let refs = self.references.get(module).map(Vec::as_slice).unwrap_or(&[]);
        std::iter::once(module)
            .chain(refs.iter().map(String::as_str))
            .filter_map(|name| self.tables.get(name))
    }

    /// Find a type by key in the modules visible from `module`.
    pub fn find_type<'a>(&'a self, module: &'a str, key: &str) -> Option<(&'a str, &'a ExportedType)> {
        self.visible_from(module)
            .find_map(|table| table.types.get(key).map(|t| (table.module.as_str(), t)))
    }

    /// Extension methods called `name` declared in `namespaces`, searched
    /// in the modules visible from `module`.
    pub fn extension_methods(
        &self,
        module: &str,
        namespaces: &[&str],
        name: &str,
    ) -> Vec<(&str, &ExportedType, &ExportedMember)> {
        let refs = self.references.get(module).map(Vec::as_slice).unwrap_or(&[]);
        let tables = std::iter::once(module)
            .chain(refs.iter().map(String::as_str))
            .filter_map(|m| self.tables.get(m));
        let mut out = Vec::new();
        for table in tables {
            let declaring = table
                .types
                .values()
                .filter(|t| t.nesting.len() == 1 && namespaces.contains(&t.namespace.as_str()));
            for ty in declaring {
                for member in ty.members_named(name).filter(|m| m.is_extension) {
                    out.push((table.module.as_str(), ty, member));
                }
            }
        }
        out
    }

    /// Find a type by key in one specific module.
    pub fn type_in(&self, module: &str, key: &str) -> Option<&ExportedType> {
        self.tables.get(module)?.types.get(key)
    }
}
