//! Type and member declarations of one C# compilation.
//!
//! Every file's tree is walked once. Partial declarations of the same type
//! merge into one arena entry; each part keeps the scope of its own file.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tree_sitter::Node;

use super::scope::Scope;
use super::SourceFile;
use crate::graph::types::{MemberKind, SourceLocation};
use crate::names;
use crate::parser::{doc, export_key, MemberId, TypeId};

const MODIFIER_WORDS: &[&str] = &[
    "public", "private", "protected", "internal", "static", "abstract", "sealed", "virtual",
    "override", "readonly", "partial", "extern", "unsafe", "new", "async", "const", "volatile",
    "required", "file",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeForm {
    Class,
    Struct,
    Interface,
    Enum,
    Record,
    Delegate,
}

/// Position of a syntax node, used to find it again in its file's tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntaxRef {
    pub file: usize,
    pub start: usize,
    pub end: usize,
    pub kind: u16,
}

impl SyntaxRef {
    fn of(file: usize, node: &Node) -> Self {
        Self {
            file,
            start: node.start_byte(),
            end: node.end_byte(),
            kind: node.kind_id(),
        }
    }
}

#[derive(Debug)]
pub struct TypeDecl {
    pub namespace: String,
    /// Raw names with generic arity: `Outer`1`, `Inner`.
    pub nesting: Vec<String>,
    pub declaring: Option<TypeId>,
    pub form: TypeForm,
    /// Base list entries with the scope of the part that wrote them.
    pub bases: Vec<(String, Arc<Scope>)>,
    /// Scope of the first part.
    pub scope: Arc<Scope>,
    pub nested: Vec<TypeId>,
    pub members: Vec<MemberId>,
    /// Some part is declared `static`.
    pub is_static: bool,
    pub description: Option<String>,
    pub location: Option<SourceLocation>,
}

impl TypeDecl {
    pub fn key(&self) -> String {
        export_key(&self.namespace, &self.nesting)
    }
}

#[derive(Debug)]
pub struct MemberDecl {
    pub declaring: TypeId,
    /// Metadata-style name: `.ctor`, `op_Addition`, `Item`, `IFoo.Bar`.
    pub name: String,
    pub kind: MemberKind,
    /// Parameter type texts; by-ref parameters carry a `ref ` prefix.
    pub params: Vec<String>,
    pub value_type: Option<String>,
    pub scope: Arc<Scope>,
    pub is_constructor: bool,
    pub is_static: bool,
    /// Static method of a top-level static class whose first parameter is `this T`.
    pub is_extension: bool,
    pub is_private: bool,
    pub syntax: Option<SyntaxRef>,
    pub description: Option<String>,
    pub location: Option<SourceLocation>,
    pub has_body: bool,
}

/// Arena of every declaration in a compilation.
#[derive(Debug, Default)]
pub struct Declarations {
    pub types: Vec<TypeDecl>,
    pub members: Vec<MemberDecl>,
    pub top_level: Vec<TypeId>,
    pub by_key: HashMap<String, TypeId>,
}

impl Declarations {
    pub fn ty(&self, id: TypeId) -> Option<&TypeDecl> {
        self.types.get(id.0 as usize)
    }

    pub fn member(&self, id: MemberId) -> Option<&MemberDecl> {
        self.members.get(id.0 as usize)
    }
}

/// Collect declarations from every file of a compilation.
pub fn collect(module: &str, files: &[SourceFile], include_locations: bool) -> Declarations {
    let mut base = Scope::new(module);
    for file in files {
        let root = file.tree.root_node();
        let source = file.text.as_bytes();
        for i in 0..root.child_count() {
            if let Some(child) = root.child(i) {
                if child.kind() == "using_directive" {
                    if let Some(using) = parse_using(&child, source).filter(|u| u.global) {
                        using.apply(&mut base);
                    }
                }
            }
        }
    }

    let base = Arc::new(base);
    let mut decls = Declarations::default();
    for (index, file) in files.iter().enumerate() {
        let mut reader = Reader {
            decls: &mut decls,
            file: index,
            path: &file.path,
            source: file.text.as_bytes(),
            include_locations,
        };
        reader.read(file.tree.root_node(), base.clone());
    }
    decls
}

// ─── Usings ─────────────────────────────────────────────────────────

struct Using {
    global: bool,
    kind: UsingKind,
}

enum UsingKind {
    Namespace(String),
    Static(String),
    Alias(String, String),
}

impl Using {
    fn apply(self, scope: &mut Scope) {
        match self.kind {
            UsingKind::Namespace(ns) => scope.usings.push(ns),
            UsingKind::Static(ty) => scope.static_usings.push(ty),
            UsingKind::Alias(alias, target) => scope.aliases.push((alias, target)),
        }
    }
}

fn parse_using(node: &Node, source: &[u8]) -> Option<Using> {
    let mut global = false;
    let mut is_static = false;
    let mut is_alias = false;
    let mut named = Vec::new();
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            match child.kind() {
                "global" => global = true,
                "static" => is_static = true,
                "=" => is_alias = true,
                "comment" => {}
                _ if child.is_named() => named.push(child),
                _ => {}
            }
        }
    }
    let target = text(named.last()?, source)?;
    let kind = if is_alias {
        let alias = node
            .child_by_field_name("name")
            .or_else(|| named.first().copied())
            .and_then(|n| text(&n, source))?;
        UsingKind::Alias(alias, target)
    } else if is_static {
        UsingKind::Static(target)
    } else {
        UsingKind::Namespace(target)
    };
    Some(Using { global, kind })
}

// ─── Reader ─────────────────────────────────────────────────────────

struct Pending<'t> {
    node: Node<'t>,
    scope: Arc<Scope>,
    declaring: Option<TypeId>,
}

struct Reader<'a> {
    decls: &'a mut Declarations,
    file: usize,
    path: &'a Path,
    source: &'a [u8],
    include_locations: bool,
}

impl<'a> Reader<'a> {
    fn read(&mut self, root: Node, scope: Arc<Scope>) {
        let mut stack = vec![Pending {
            node: root,
            scope,
            declaring: None,
        }];
        while let Some(Pending {
            node,
            mut scope,
            declaring,
        }) = stack.pop()
        {
            for i in 0..node.child_count() {
                let Some(child) = node.child(i) else {
                    continue;
                };
                match child.kind() {
                    "using_directive" => {
                        if let Some(using) = parse_using(&child, self.source).filter(|u| !u.global) {
                            using.apply(Arc::make_mut(&mut scope));
                        }
                    }
                    "namespace_declaration" => {
                        let name = field_text(&child, "name", self.source).unwrap_or_default();
                        if let Some(body) = child.child_by_field_name("body") {
                            stack.push(Pending {
                                node: body,
                                scope: Arc::new(scope.in_namespace(&name)),
                                declaring: None,
                            });
                        }
                    }
                    "file_scoped_namespace_declaration" => {
                        let name = field_text(&child, "name", self.source).unwrap_or_default();
                        scope = Arc::new(scope.in_namespace(&name));
                        stack.push(Pending {
                            node: child,
                            scope: scope.clone(),
                            declaring: None,
                        });
                    }
                    kind if type_form(&child, kind).is_some() => {
                        if let Some((id, inner)) = self.declare_type(&child, &scope, declaring) {
                            if let Some(body) = child.child_by_field_name("body") {
                                stack.push(Pending {
                                    node: body,
                                    scope: inner,
                                    declaring: Some(id),
                                });
                            }
                        }
                    }
                    _ => {
                        if let Some(owner) = declaring {
                            self.declare_member(&child, &scope, owner);
                        }
                    }
                }
            }
        }
    }

    fn declare_type(
        &mut self,
        node: &Node,
        scope: &Arc<Scope>,
        declaring: Option<TypeId>,
    ) -> Option<(TypeId, Arc<Scope>)> {
        let name = field_text(node, "name", self.source)?;
        let form = type_form(node, node.kind())?;
        let type_params = type_parameters(node, self.source);
        let (namespace, mut nesting) = match declaring.and_then(|id| self.decls.ty(id)) {
            Some(outer) => (outer.namespace.clone(), outer.nesting.clone()),
            None => (scope.namespace.clone(), Vec::new()),
        };
        nesting.push(arity_name(&name, type_params.len()));
        let key = export_key(&namespace, &nesting);
        let inner = Arc::new(scope.in_type(&key, &type_params));
        let bases: Vec<(String, Arc<Scope>)> = if form == TypeForm::Enum {
            Vec::new()
        } else {
            base_types(node, self.source)
                .into_iter()
                .map(|b| (b, inner.clone()))
                .collect()
        };
        let description = doc_comment(node, self.source);
        let location = self.location(node.child_by_field_name("name").as_ref().unwrap_or(node));
        let is_static = modifiers(node, self.source).iter().any(|m| m == "static");

        let id = match self.decls.by_key.get(&key).copied() {
            Some(id) => {
                let existing = &mut self.decls.types[id.0 as usize];
                for base in bases {
                    if !existing.bases.iter().any(|(text, _)| *text == base.0) {
                        existing.bases.push(base);
                    }
                }
                existing.description = existing.description.take().or(description);
                existing.location = existing.location.take().or(location);
                existing.is_static |= is_static;
                id
            }
            None => {
                let id = TypeId(self.decls.types.len() as u32);
                self.decls.types.push(TypeDecl {
                    namespace,
                    nesting,
                    declaring,
                    form,
                    bases,
                    scope: inner.clone(),
                    nested: Vec::new(),
                    members: Vec::new(),
                    is_static,
                    description,
                    location,
                });
                self.decls.by_key.insert(key, id);
                match declaring {
                    Some(outer) => self.decls.types[outer.0 as usize].nested.push(id),
                    None => self.decls.top_level.push(id),
                }
                id
            }
        };

        if let Some(params) = child_of_kind(node, "parameter_list") {
            self.declare_primary_constructor(node, &params, &inner, id, form);
        }
        Some((id, inner))
    }

    /// `record R(int X)` and `class C(int x)`. Records also get one
    /// property per parameter.
    fn declare_primary_constructor(
        &mut self,
        node: &Node,
        params: &Node,
        scope: &Arc<Scope>,
        owner: TypeId,
        form: TypeForm,
    ) {
        let list = parameters(Some(*params), self.source);
        if form == TypeForm::Record {
            for i in 0..params.child_count() {
                let Some(param) = params.child(i).filter(|p| p.kind() == "parameter") else {
                    continue;
                };
                let Some(name) = field_text(&param, "name", self.source) else {
                    continue;
                };
                let mut member = self.member(node, name, MemberKind::Property, scope, owner);
                member.value_type = field_text(&param, "type", self.source);
                member.location = self.location(&param);
                member.description = None;
                self.push_member(member);
            }
        }
        let mut ctor = self.member(node, ".ctor".to_string(), MemberKind::Method, scope, owner);
        ctor.params = list;
        ctor.is_constructor = true;
        ctor.description = None;
        self.push_member(ctor);
    }

    fn declare_member(&mut self, node: &Node, scope: &Arc<Scope>, owner: TypeId) {
        let owner_form = match self.decls.ty(owner) {
            Some(ty) => ty.form,
            None => return,
        };
        let modifiers = modifiers(node, self.source);
        let explicit = child_of_kind(node, "explicit_interface_specifier")
            .and_then(|n| text(&n, self.source))
            .map(|t| t.trim().trim_end_matches('.').trim().to_string());
        let is_private = is_private(&modifiers, owner_form, explicit.is_some());
        let is_static = modifiers.iter().any(|m| m == "static" || m == "const");
        let named = |name: String| match &explicit {
            Some(interface) => format!("{interface}.{name}"),
            None => name,
        };

        match node.kind() {
            "field_declaration" | "event_field_declaration" => {
                let kind = if node.kind() == "event_field_declaration" {
                    MemberKind::Event
                } else {
                    MemberKind::Field
                };
                let Some(declaration) = child_of_kind(node, "variable_declaration") else {
                    return;
                };
                let ty = field_text(&declaration, "type", self.source);
                for i in 0..declaration.child_count() {
                    let Some(declarator) = declaration
                        .child(i)
                        .filter(|d| d.kind() == "variable_declarator")
                    else {
                        continue;
                    };
                    let Some(name) = declarator_name(&declarator, self.source) else {
                        continue;
                    };
                    let mut member = self.member(node, name, kind, scope, owner);
                    member.value_type = ty.clone();
                    member.is_private = is_private;
                    member.is_static = is_static;
                    member.has_body = !body_roots(&declarator).is_empty();
                    member.syntax = Some(SyntaxRef::of(self.file, &declarator));
                    member.location = self.location(&declarator);
                    self.push_member(member);
                }
            }
            "property_declaration" | "event_declaration" | "indexer_declaration" => {
                let (kind, name) = match node.kind() {
                    "event_declaration" => (MemberKind::Event, field_text(node, "name", self.source)),
                    "indexer_declaration" => (MemberKind::Property, Some("Item".to_string())),
                    _ => (MemberKind::Property, field_text(node, "name", self.source)),
                };
                let Some(name) = name else {
                    return;
                };
                let mut member = self.member(node, named(name), kind, scope, owner);
                member.value_type = field_text(node, "type", self.source);
                member.params = parameters(node.child_by_field_name("parameters"), self.source);
                member.is_private = is_private;
                member.is_static = is_static;
                member.has_body = !body_roots(node).is_empty();
                self.push_member(member);
            }
            "method_declaration" => {
                let Some(name) = field_text(node, "name", self.source) else {
                    return;
                };
                let type_params = type_parameters(node, self.source);
                let scope = if type_params.is_empty() {
                    scope.clone()
                } else {
                    Arc::new(scope.with_type_params(&type_params))
                };
                let mut member = self.member(node, named(name), MemberKind::Method, &scope, owner);
                member.value_type = node
                    .child_by_field_name("returns")
                    .or_else(|| node.child_by_field_name("type"))
                    .and_then(|n| text(&n, self.source));
                let static_owner = self
                    .decls
                    .ty(owner)
                    .is_some_and(|ty| ty.is_static && ty.declaring.is_none());
                member.is_extension = is_static
                    && static_owner
                    && extends_first_parameter(node.child_by_field_name("parameters"), self.source);
                self.finish_method(member, node, is_private, is_static);
            }
            "constructor_declaration" => {
                let name = if is_static { ".cctor" } else { ".ctor" };
                let mut member = self.member(node, name.to_string(), MemberKind::Method, scope, owner);
                member.is_constructor = true;
                self.finish_method(member, node, is_private, is_static);
            }
            "destructor_declaration" => {
                let member = self.member(node, "Finalize".to_string(), MemberKind::Method, scope, owner);
                self.finish_method(member, node, false, false);
            }
            "operator_declaration" | "conversion_operator_declaration" => {
                let params = parameters(node.child_by_field_name("parameters"), self.source);
                let name = if node.kind() == "conversion_operator_declaration" {
                    let implicit = (0..node.child_count())
                        .filter_map(|i| node.child(i))
                        .any(|c| c.kind() == "implicit");
                    Some(if implicit { "op_Implicit" } else { "op_Explicit" })
                } else {
                    field_text(node, "operator", self.source)
                        .and_then(|symbol| names::operator_method_name(symbol.trim(), params.len()))
                };
                let Some(name) = name else {
                    return;
                };
                let mut member = self.member(node, name.to_string(), MemberKind::Method, scope, owner);
                member.value_type = field_text(node, "type", self.source);
                self.finish_method(member, node, false, true);
            }
            "enum_member_declaration" => {
                let Some(name) = field_text(node, "name", self.source) else {
                    return;
                };
                let mut member = self.member(node, name, MemberKind::Field, scope, owner);
                member.is_static = true;
                self.push_member(member);
            }
            _ => {}
        }
    }

    fn finish_method(&mut self, mut member: MemberDecl, node: &Node, is_private: bool, is_static: bool) {
        member.params = parameters(node.child_by_field_name("parameters"), self.source);
        member.is_private = is_private;
        member.is_static = is_static;
        member.has_body = !body_roots(node).is_empty();
        self.push_member(member);
    }

    /// A member with defaults taken from its declaration node.
    fn member(
        &self,
        node: &Node,
        name: String,
        kind: MemberKind,
        scope: &Arc<Scope>,
        owner: TypeId,
    ) -> MemberDecl {
        MemberDecl {
            declaring: owner,
            name,
            kind,
            params: Vec::new(),
            value_type: None,
            scope: scope.clone(),
            is_constructor: false,
            is_static: false,
            is_extension: false,
            is_private: false,
            syntax: Some(SyntaxRef::of(self.file, node)),
            description: doc_comment(node, self.source),
            location: self.location(node.child_by_field_name("name").as_ref().unwrap_or(node)),
            has_body: false,
        }
    }

    fn push_member(&mut self, member: MemberDecl) {
        let id = MemberId(self.decls.members.len() as u32);
        let owner = member.declaring.0 as usize;
        self.decls.members.push(member);
        if let Some(ty) = self.decls.types.get_mut(owner) {
            ty.members.push(id);
        }
    }

    fn location(&self, node: &Node) -> Option<SourceLocation> {
        self.include_locations.then(|| SourceLocation {
            path: self.path.to_path_buf(),
            line: node.start_position().row + 1,
        })
    }
}

// ─── Syntax Helpers ─────────────────────────────────────────────────

fn type_form(node: &Node, kind: &str) -> Option<TypeForm> {
    let form = match kind {
        "class_declaration" => TypeForm::Class,
        "struct_declaration" | "record_struct_declaration" => TypeForm::Struct,
        "interface_declaration" => TypeForm::Interface,
        "enum_declaration" => TypeForm::Enum,
        "delegate_declaration" => TypeForm::Delegate,
        "record_declaration" => {
            let is_struct = (0..node.child_count())
                .filter_map(|i| node.child(i))
                .any(|c| c.kind() == "struct");
            if is_struct {
                TypeForm::Struct
            } else {
                TypeForm::Record
            }
        }
        _ => return None,
    };
    Some(form)
}

/// Nodes whose contents make up a member's body: method blocks, arrow
/// bodies, constructor initializers, accessor bodies and initializers.
pub fn body_roots<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut roots: Vec<Node<'t>> = Vec::new();
    let mut push = |n: Node<'t>| {
        if !roots.iter().any(|r| r.id() == n.id()) {
            roots.push(n);
        }
    };
    match node.kind() {
        "variable_declarator" => {
            for i in 1..node.child_count() {
                if let Some(child) = node.child(i) {
                    if child.is_named() && !matches!(child.kind(), "bracketed_argument_list" | "comment") {
                        push(child);
                    }
                }
            }
        }
        "property_declaration" | "indexer_declaration" | "event_declaration" => {
            if let Some(accessors) = node
                .child_by_field_name("accessors")
                .or_else(|| child_of_kind(node, "accessor_list"))
            {
                for i in 0..accessors.child_count() {
                    let Some(accessor) = accessors.child(i).filter(|a| a.kind() == "accessor_declaration") else {
                        continue;
                    };
                    if let Some(body) = accessor.child_by_field_name("body") {
                        push(body);
                    }
                    if let Some(arrow) = child_of_kind(&accessor, "arrow_expression_clause") {
                        push(arrow);
                    }
                }
            }
            if let Some(arrow) = child_of_kind(node, "arrow_expression_clause") {
                push(arrow);
            }
            if let Some(value) = node.child_by_field_name("value") {
                push(value);
            }
        }
        "method_declaration"
        | "constructor_declaration"
        | "destructor_declaration"
        | "operator_declaration"
        | "conversion_operator_declaration"
        | "local_function_statement" => {
            if let Some(initializer) = child_of_kind(node, "constructor_initializer") {
                push(initializer);
            }
            if let Some(body) = node.child_by_field_name("body") {
                push(body);
            }
            if let Some(arrow) = child_of_kind(node, "arrow_expression_clause") {
                push(arrow);
            }
        }
        _ => {}
    }
    roots
}

pub fn text(node: &Node, source: &[u8]) -> Option<String> {
    node.utf8_text(source).ok().map(str::to_string)
}

pub fn field_text(node: &Node, field: &str, source: &[u8]) -> Option<String> {
    node.child_by_field_name(field).and_then(|n| text(&n, source))
}

pub fn child_of_kind<'t>(node: &Node<'t>, kind: &str) -> Option<Node<'t>> {
    (0..node.child_count())
        .filter_map(|i| node.child(i))
        .find(|c| c.kind() == kind)
}

fn declarator_name(declarator: &Node, source: &[u8]) -> Option<String> {
    declarator
        .child_by_field_name("name")
        .or_else(|| child_of_kind(declarator, "identifier"))
        .and_then(|n| text(&n, source))
}

fn modifiers(node: &Node, source: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            if child.kind() == "modifier" {
                out.extend(text(&child, source));
            } else if !child.is_named() && MODIFIER_WORDS.contains(&child.kind()) {
                out.push(child.kind().to_string());
            }
        }
    }
    out
}

/// Private for the graph: `private`, `private protected`, explicit
/// interface implementations, and members of classes and structs
/// written without an access modifier.
fn is_private(modifiers: &[String], owner: TypeForm, explicit: bool) -> bool {
    if explicit || modifiers.iter().any(|m| m == "private") {
        return true;
    }
    let has_access = modifiers
        .iter()
        .any(|m| matches!(m.as_str(), "public" | "protected" | "internal"));
    !has_access && matches!(owner, TypeForm::Class | TypeForm::Struct | TypeForm::Record)
}

fn type_parameters(node: &Node, source: &[u8]) -> Vec<String> {
    let Some(list) = node
        .child_by_field_name("type_parameters")
        .or_else(|| child_of_kind(node, "type_parameter_list"))
    else {
        return Vec::new();
    };
    (0..list.child_count())
        .filter_map(|i| list.child(i))
        .filter(|c| c.kind() == "type_parameter")
        .filter_map(|param| {
            param
                .child_by_field_name("name")
                .or_else(|| child_of_kind(&param, "identifier"))
                .and_then(|n| text(&n, source))
        })
        .collect()
}

fn parameters(list: Option<Node>, source: &[u8]) -> Vec<String> {
    let Some(list) = list else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for i in 0..list.child_count() {
        let Some(param) = list.child(i).filter(|p| p.kind() == "parameter") else {
            continue;
        };
        let Some(ty) = field_text(&param, "type", source) else {
            continue;
        };
        let by_ref = (0..param.child_count())
            .filter_map(|j| param.child(j))
            .any(|c| match c.kind() {
                "ref" | "out" | "in" => true,
                "parameter_modifier" | "modifier" => {
                    matches!(c.utf8_text(source).unwrap_or_default().trim(), "ref" | "out" | "in")
                }
                _ => false,
            });
        out.push(if by_ref { format!("ref {ty}") } else { ty });
    }
    out
}

/// The first parameter carries the `this` modifier.
fn extends_first_parameter(list: Option<Node>, source: &[u8]) -> bool {
    let Some(first) = list.and_then(|l| child_of_kind(&l, "parameter")) else {
        return false;
    };
    (0..first.child_count())
        .filter_map(|i| first.child(i))
        .any(|c| match c.kind() {
            "this" => true,
            "parameter_modifier" | "modifier" => c.utf8_text(source).unwrap_or_default().trim() == "this",
            _ => false,
        })
}

fn base_types(node: &Node, source: &[u8]) -> Vec<String> {
    let Some(list) = child_of_kind(node, "base_list") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for i in 0..list.child_count() {
        let Some(child) = list.child(i).filter(|c| c.is_named()) else {
            continue;
        };
        let base = match child.kind() {
            "comment" | "argument_list" => None,
            "primary_constructor_base_type" => child
                .child_by_field_name("type")
                .or_else(|| (0..child.child_count()).filter_map(|j| child.child(j)).find(|c| c.is_named()))
                .and_then(|n| text(&n, source)),
            _ => text(&child, source),
        };
        out.extend(base);
    }
    out
}

/// `///` comment lines directly above a declaration.
fn doc_comment(node: &Node, source: &[u8]) -> Option<String> {
    let mut lines = Vec::new();
    let mut current = node.prev_sibling();
    while let Some(sibling) = current {
        if sibling.kind() != "comment" {
            break;
        }
        let line = sibling.utf8_text(source).ok()?;
        if !line.trim_start().starts_with("///") {
            break;
        }
        lines.push(line);
        current = sibling.prev_sibling();
    }
    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    doc::summarize(&doc::strip_comment_markers(lines))
}

fn arity_name(name: &str, arity: usize) -> String {
    if arity == 0 {
        name.to_string()
    } else {
        format!("{name}`{arity}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::source::SourceFile;
    use std::path::PathBuf;

    fn read(sources: &[&str]) -> Declarations {
        let files: Vec<SourceFile> = sources
            .iter()
            .enumerate()
            .map(|(i, text)| SourceFile::parse(PathBuf::from(format!("f{i}.cs")), text.to_string()).unwrap())
            .collect();
        collect("App", &files, true)
    }

    fn member<'a>(decls: &'a Declarations, ty: &str, name: &str) -> &'a MemberDecl {
        let id = decls.by_key[ty];
        decls.types[id.0 as usize]
            .members
            .iter()
            .map(|m| &decls.members[m.0 as usize])
            .find(|m| m.name == name)
            .unwrap_or_else(|| panic!("no member {name} on {ty}"))
    }

    #[test]
    fn test_namespaces_nesting_and_arity() {
        let decls = read(&[
            "namespace A.B { class Outer<T> { class Inner { } } }",
            "namespace C;\nstruct S { }",
        ]);
        assert!(decls.by_key.contains_key("A.B.Outer`1"));
        assert!(decls.by_key.contains_key("A.B.Outer`1.Inner"));
        assert!(decls.by_key.contains_key("C.S"));
        assert_eq!(decls.top_level.len(), 2);
        let inner = &decls.types[decls.by_key["A.B.Outer`1.Inner"].0 as usize];
        assert_eq!(inner.scope.type_params, vec!["T".to_string()]);
        assert_eq!(inner.scope.enclosing[0], "A.B.Outer`1.Inner");
    }

    #[test]
    fn test_partial_types_merge() {
        let decls = read(&[
            "using X;\nnamespace N { partial class P : Base { void A() {} } }",
            "namespace N { /// <summary>Second part.</summary>\npartial class P : IThing { void B() {} } }",
        ]);
        assert_eq!(decls.types.len(), 1);
        let ty = &decls.types[0];
        assert_eq!(ty.members.len(), 2);
        let bases: Vec<&str> = ty.bases.iter().map(|(b, _)| b.as_str()).collect();
        assert_eq!(bases, vec!["Base", "IThing"]);
        assert_eq!(ty.bases[0].1.usings, vec!["X".to_string()]);
        assert!(ty.bases[1].1.usings.is_empty());
        assert_eq!(ty.description.as_deref(), Some("Second part."));
    }

    #[test]
    fn test_member_forms() {
        let decls = read(&[r#"
namespace N {
    public class Foo : IDisposable {
        /// <summary>The count.</summary>
        public int Count { get; set; }
        private string name = "x", other;
        public event EventHandler Changed;
        public Foo(int x) { }
        static Foo() { }
        public static Foo operator +(Foo a, Foo b) => a;
        public int this[int i] => i;
        void IDisposable.Dispose() { }
        protected abstract void Run();
        public void Swap<T>(ref T a, T[] b) { }
    }
}"#]);
        let count = member(&decls, "N.Foo", "Count");
        assert_eq!(count.kind, MemberKind::Property);
        assert_eq!(count.value_type.as_deref(), Some("int"));
        assert_eq!(count.description.as_deref(), Some("The count."));
        assert!(!count.is_private);

        let name = member(&decls, "N.Foo", "name");
        assert!(name.is_private);
        assert!(name.has_body);
        assert!(!member(&decls, "N.Foo", "other").has_body);
        assert_eq!(member(&decls, "N.Foo", "Changed").kind, MemberKind::Event);

        let ctor = member(&decls, "N.Foo", ".ctor");
        assert!(ctor.is_constructor);
        assert_eq!(ctor.params, vec!["int".to_string()]);
        assert!(member(&decls, "N.Foo", ".cctor").is_private);

        assert_eq!(member(&decls, "N.Foo", "op_Addition").params.len(), 2);
        assert_eq!(member(&decls, "N.Foo", "Item").params, vec!["int".to_string()]);
        assert!(member(&decls, "N.Foo", "IDisposable.Dispose").is_private);
        assert!(!member(&decls, "N.Foo", "Run").has_body);

        let swap = member(&decls, "N.Foo", "Swap");
        assert_eq!(swap.params, vec!["ref T".to_string(), "T[]".to_string()]);
        assert!(swap.scope.type_params.contains(&"T".to_string()));
        assert_eq!(swap.location.as_ref().map(|l| l.line), Some(14));
    }

    #[test]
    fn test_interface_and_enum_members_are_public() {
        let decls = read(&["interface I { void M(); } enum E { A, B } record R(int X);"]);
        assert!(!member(&decls, "I", "M").is_private);
        assert!(!member(&decls, "E", "B").is_private);
        assert_eq!(member(&decls, "R", "X").kind, MemberKind::Property);
        assert_eq!(member(&decls, "R", ".ctor").params, vec!["int".to_string()]);
    }

    #[test]
    fn test_global_and_alias_usings() {
        let decls = read(&[
            "global using Shared;\nusing M = N.Thing;\nclass A { }",
            "class B { }",
        ]);
        let b = &decls.types[decls.by_key["B"].0 as usize];
        assert_eq!(b.scope.usings, vec!["Shared".to_string()]);
        let a = &decls.types[decls.by_key["A"].0 as usize];
        assert_eq!(a.scope.aliases, vec![("M".to_string(), "N.Thing".to_string())]);
    }
}
