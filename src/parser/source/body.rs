//! References made by one member's body, read from syntax.
//!
//! Expressions are typed just far enough to pick the member a call or
//! access lands on: locals, parameters, members of the enclosing type and
//! its bases, static type names, and the results of those.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tree_sitter::Node;

use super::declarations::{body_roots, child_of_kind, field_text, text, MemberDecl};
use super::scope::{Resolver, Scope};
use crate::graph::types::MemberKind;
use crate::parser::{
    BodyReference, ExportedMember, MemberRef, MemberUsage, NamedType, TypeRef, TypeUsage,
};

/// What an expression denotes.
#[derive(Debug, Clone)]
enum Target {
    Value(TypeRef),
    /// A type name used for static access.
    Static(NamedType),
    Unknown,
}

impl Target {
    /// Type whose members `.Name` looks up. Arrays and pointers have none here.
    fn receiver(self) -> Option<NamedType> {
        match self {
            Target::Value(TypeRef::Named(named)) | Target::Static(named) => Some(named),
            _ => None,
        }
    }
}

pub(super) struct BodyReader<'a> {
    resolver: Resolver<'a>,
    source: &'a [u8],
    owner: NamedType,
    scope: Arc<Scope>,
    locals: HashMap<String, Option<TypeRef>>,
    local_functions: HashSet<String>,
    out: Vec<BodyReference>,
}

impl<'a> BodyReader<'a> {
    pub fn new(resolver: Resolver<'a>, source: &'a [u8], owner: NamedType, member: &MemberDecl) -> Self {
        let mut locals = HashMap::new();
        if matches!(member.kind, MemberKind::Property | MemberKind::Event) {
            let value = member
                .value_type
                .as_deref()
                .and_then(|t| resolver.resolve(t, &member.scope));
            locals.insert("value".to_string(), value);
        }
        Self {
            resolver,
            source,
            owner,
            scope: member.scope.clone(),
            locals,
            local_functions: HashSet::new(),
            out: Vec::new(),
        }
    }

    /// Read the body of the member declared at `node`.
    pub fn read(mut self, node: &Node) -> Vec<BodyReference> {
        self.declare_parameters(node.child_by_field_name("parameters"));
        let roots = body_roots(node);
        self.collect_local_functions(&roots);

        let mut stack: Vec<Node> = roots.into_iter().rev().collect();
        while let Some(current) = stack.pop() {
            let children = self.visit(&current);
            stack.extend(children.into_iter().rev());
        }
        self.out
    }

    fn collect_local_functions(&mut self, roots: &[Node]) {
        let mut stack: Vec<Node> = roots.to_vec();
        while let Some(node) = stack.pop() {
            if node.kind() == "local_function_statement" {
                self.local_functions.extend(field_text(&node, "name", self.source));
            }
            stack.extend(named_children(&node));
        }
    }

    fn declare_parameters(&mut self, list: Option<Node>) {
        let Some(list) = list else {
            return;
        };
        for param in named_children(&list) {
            match param.kind() {
                "parameter" => {
                    let Some(name) = field_text(&param, "name", self.source) else {
                        continue;
                    };
                    let ty = field_text(&param, "type", self.source).and_then(|t| self.resolve(&t));
                    self.locals.insert(name, ty);
                }
                "identifier" => {
                    self.locals.extend(text(&param, self.source).map(|n| (n, None)));
                }
                _ => {}
            }
        }
    }

    /// Handle one node; returns the children still to be visited.
    fn visit<'t>(&mut self, node: &Node<'t>) -> Vec<Node<'t>> {
        match node.kind() {
            "variable_declaration" => self.variable_declaration(node),
            "foreach_statement" => {
                let right = node.child_by_field_name("right");
                let declared = field_text(node, "type", self.source).and_then(|t| self.resolve(&t));
                let element = declared.or_else(|| {
                    right
                        .and_then(|r| self.value_type(&r))
                        .and_then(|collection| element_type(&collection))
                });
                if let Some(ty) = &element {
                    self.emit_type(ty.clone(), TypeUsage::ForeachElement);
                }
                if let Some(name) = node.child_by_field_name("left").and_then(|l| text(&l, self.source)) {
                    self.locals.insert(name, element);
                }
                right.into_iter().chain(node.child_by_field_name("body")).collect()
            }
            "catch_declaration" => {
                let ty = field_text(node, "type", self.source).and_then(|t| self.resolve(&t));
                if let Some(ty) = &ty {
                    self.emit_type(ty.clone(), TypeUsage::Catch);
                }
                if let Some(name) = field_text(node, "name", self.source) {
                    self.locals.insert(name, ty);
                }
                Vec::new()
            }
            "declaration_expression" | "declaration_pattern" => {
                let ty = field_text(node, "type", self.source).and_then(|t| self.resolve(&t));
                if let Some(ty) = &ty {
                    self.emit_type(ty.clone(), TypeUsage::LocalVariable);
                }
                let name = node
                    .child_by_field_name("name")
                    .or_else(|| descendant_of_kind(node, "identifier", "type"))
                    .and_then(|n| text(&n, self.source));
                self.locals.extend(name.map(|n| (n, ty)));
                Vec::new()
            }
            "local_function_statement" => {
                self.declare_parameters(node.child_by_field_name("parameters"));
                body_roots(node)
            }
            "lambda_expression" | "anonymous_method_expression" => {
                match node.child_by_field_name("parameters") {
                    Some(params) if params.kind() == "identifier" => {
                        self.locals.extend(text(&params, self.source).map(|n| (n, None)));
                    }
                    params => self.declare_parameters(params.or_else(|| child_of_kind(node, "parameter_list"))),
                }
                node.child_by_field_name("body").into_iter().collect()
            }
            "invocation_expression" => self.invocation(node),
            "object_creation_expression" => self.creation(node),
            "constructor_initializer" => self.constructor_initializer(node),
            "member_access_expression" => {
                if let Some(target) = self.member_access(node) {
                    self.emit_member(target, MemberUsage::Access);
                }
                node.child_by_field_name("expression").into_iter().collect()
            }
            "member_binding_expression" => {
                let receiver = self.binding_receiver(node);
                let name = field_text(node, "name", self.source);
                if let (Some(receiver), Some(name)) = (receiver, name) {
                    if let Some(target) = self.find_member(&receiver, simple_name(&name), None, None) {
                        self.emit_member(target, MemberUsage::Access);
                    }
                }
                Vec::new()
            }
            "identifier" => {
                if let Some(name) = text(node, self.source) {
                    if let Some(target) = self.implicit_member(&name, None, None) {
                        self.emit_member(target, MemberUsage::Access);
                    }
                }
                Vec::new()
            }
            "cast_expression" => node.child_by_field_name("value").into_iter().collect(),
            "as_expression" | "is_expression" => node.child_by_field_name("left").into_iter().collect(),
            "typeof_expression" | "sizeof_expression" | "default_expression" | "name_colon"
            | "name_equals" | "generic_name" | "qualified_name" | "predefined_type" | "array_type"
            | "nullable_type" | "pointer_type" | "tuple_type" | "parameter_list" | "type_argument_list"
            | "this_expression" | "base_expression" | "comment" => Vec::new(),
            _ => named_children(node),
        }
    }

    fn variable_declaration<'t>(&mut self, node: &Node<'t>) -> Vec<Node<'t>> {
        let declared = field_text(node, "type", self.source).and_then(|t| self.resolve(&t));
        let mut descend = Vec::new();
        for declarator in named_children(node).into_iter().filter(|d| d.kind() == "variable_declarator") {
            let initializers = body_roots(&declarator);
            let ty = declared.clone().or_else(|| {
                initializers
                    .iter()
                    .find_map(|init| self.value_type(&unwrap_clause(init)))
            });
            if let Some(ty) = &ty {
                self.emit_type(ty.clone(), TypeUsage::LocalVariable);
            }
            if let Some(name) = declarator
                .child_by_field_name("name")
                .or_else(|| child_of_kind(&declarator, "identifier"))
                .and_then(|n| text(&n, self.source))
            {
                self.locals.insert(name, ty);
            }
            descend.extend(initializers);
        }
        descend
    }

    // ─── Calls ──────────────────────────────────────────────────────

    fn invocation<'t>(&mut self, node: &Node<'t>) -> Vec<Node<'t>> {
        let arguments = node.child_by_field_name("arguments");
        let args = arguments.map(|a| self.argument_types(&a));
        let args = args.as_deref();
        let mut descend: Vec<Node<'t>> = Vec::new();
        let Some(function) = node.child_by_field_name("function") else {
            return arguments.into_iter().collect();
        };

        let found = match function.kind() {
            "identifier" | "generic_name" => {
                let (name, type_args) = self.name_and_args(&function);
                if self.local_functions.contains(&name) {
                    let mut target = MemberRef::new(self.owner.clone(), name, MemberKind::Method);
                    target.is_local_function = true;
                    Some(target)
                } else if self.locals.contains_key(&name) {
                    None
                } else {
                    self.implicit_member(&name, Some(MemberKind::Method), args)
                        .or_else(|| self.implicit_member(&name, None, None))
                        .map(|mut target| {
                            target.generic_args = type_args;
                            target
                        })
                }
            }
            "member_access_expression" => {
                let receiver = function.child_by_field_name("expression");
                let found = receiver.and_then(|receiver| {
                    let (name, type_args) = self.name_and_args(&function.child_by_field_name("name")?);
                    let target = self.target_of(&receiver);
                    let mut found = target
                        .clone()
                        .receiver()
                        .and_then(|owner| {
                            self.find_member(&owner, &name, Some(MemberKind::Method), args)
                                .or_else(|| self.find_member(&owner, &name, None, None))
                        })
                        .or_else(|| match &target {
                            Target::Value(value) => self.extension_call(value, &name, args),
                            _ => None,
                        })?;
                    found.generic_args = type_args;
                    Some(found)
                });
                descend.extend(receiver);
                found
            }
            "member_binding_expression" => {
                let receiver = self.binding_receiver(&function);
                let name = field_text(&function, "name", self.source);
                match (receiver, name) {
                    (Some(receiver), Some(name)) => {
                        let name = simple_name(&name);
                        self.find_member(&receiver, name, Some(MemberKind::Method), args)
                            .or_else(|| self.find_member(&receiver, name, None, None))
                            .or_else(|| self.extension_call(&TypeRef::Named(receiver.clone()), name, args))
                    }
                    _ => None,
                }
            }
            _ => {
                descend.push(function);
                None
            }
        };

        if let Some(target) = found {
            let usage = if target.kind == MemberKind::Method {
                MemberUsage::Call
            } else {
                MemberUsage::Access
            };
            self.emit_member(target, usage);
        }
        descend.extend(arguments);
        descend
    }

    fn creation<'t>(&mut self, node: &Node<'t>) -> Vec<Node<'t>> {
        let arguments = node.child_by_field_name("arguments");
        let initializer = node.child_by_field_name("initializer");
        let created = field_text(node, "type", self.source)
            .and_then(|t| self.resolve(&t))
            .and_then(|ty| match ty {
                TypeRef::Named(named) => Some(named),
                _ => None,
            });
        let mut descend: Vec<Node<'t>> = arguments.into_iter().collect();

        let Some(created) = created else {
            descend.extend(initializer);
            return descend;
        };
        let args = arguments.map(|a| self.argument_types(&a)).unwrap_or_default();
        if let Some(ctor) = self.constructor(&created, &args) {
            self.emit_member(ctor, MemberUsage::Creation);
        }

        // `new Foo { X = 1 }`: the left-hand names are members of Foo.
        if let Some(initializer) = initializer {
            for child in named_children(&initializer) {
                if child.kind() != "assignment_expression" {
                    descend.push(child);
                    continue;
                }
                let left = child.child_by_field_name("left");
                match left.filter(|l| l.kind() == "identifier") {
                    Some(left) => {
                        if let Some(name) = text(&left, self.source) {
                            if let Some(target) = self.find_member(&created, &name, None, None) {
                                self.emit_member(target, MemberUsage::Access);
                            }
                        }
                        descend.extend(child.child_by_field_name("right"));
                    }
                    None => descend.push(child),
                }
            }
        }
        descend
    }

    /// `: base(...)` and `: this(...)`.
    fn constructor_initializer<'t>(&mut self, node: &Node<'t>) -> Vec<Node<'t>> {
        let arguments = child_of_kind(node, "argument_list");
        let args = arguments.map(|a| self.argument_types(&a)).unwrap_or_default();
        let calls_base = (0..node.child_count())
            .filter_map(|i| node.child(i))
            .any(|c| c.kind() == "base");
        let target = if calls_base {
            self.base_of_owner()
        } else {
            Some(self.owner.clone())
        };
        if let Some(ctor) = target.and_then(|t| self.constructor(&t, &args)) {
            self.emit_member(ctor, MemberUsage::Call);
        }
        arguments.into_iter().collect()
    }

    /// Constructor picked by argument types. Types without an explicit
    /// parameterless constructor get an implicit one.
    fn constructor(&self, created: &NamedType, args: &[Option<String>]) -> Option<MemberRef> {
        let Some(definition) = self.resolver.definition(created) else {
            created.module.as_ref()?;
            let mut target = MemberRef::new(created.clone(), ".ctor", MemberKind::Method);
            target.is_constructor = true;
            return Some(target);
        };
        let ctors: Vec<&ExportedMember> = definition
            .constructors()
            .filter(|c| c.name == ".ctor")
            .collect();
        if let Some(ctor) = choose_overload(&ctors, Some(args)) {
            return Some(self.member_ref(created, ctor));
        }
        if !args.is_empty() {
            return None;
        }
        let mut target = MemberRef::new(created.clone(), ".ctor", MemberKind::Method);
        target.is_constructor = true;
        target.is_implicit_default_ctor = true;
        Some(target)
    }

    // ─── Expression Typing ──────────────────────────────────────────

    fn target_of(&self, node: &Node) -> Target {
        match node.kind() {
            "identifier" => {
                let Some(name) = text(node, self.source) else {
                    return Target::Unknown;
                };
                if let Some(local) = self.locals.get(&name) {
                    return local.clone().map_or(Target::Unknown, Target::Value);
                }
                if let Some(member) = self.implicit_member(&name, None, None) {
                    return self.member_value(&member).map_or(Target::Unknown, Target::Value);
                }
                self.static_type(&name)
            }
            "this_expression" => Target::Value(TypeRef::Named(self.owner.clone())),
            "base_expression" => self
                .base_of_owner()
                .map_or(Target::Unknown, |b| Target::Value(TypeRef::Named(b))),
            "parenthesized_expression" => named_children(node)
                .first()
                .map_or(Target::Unknown, |inner| self.target_of(inner)),
            "member_access_expression" => {
                if let Some(member) = self.member_access(node) {
                    return self.member_value(&member).map_or(Target::Unknown, Target::Value);
                }
                match text(node, self.source) {
                    Some(name) if is_dotted_name(&name) => self.static_type(&name),
                    _ => Target::Unknown,
                }
            }
            "generic_name" | "qualified_name" | "predefined_type" => {
                text(node, self.source).map_or(Target::Unknown, |name| self.static_type(&name))
            }
            "invocation_expression" => self
                .invocation_target(node)
                .and_then(|m| self.member_value(&m))
                .map_or(Target::Unknown, Target::Value),
            "object_creation_expression" | "cast_expression" | "as_expression" => {
                let ty = node
                    .child_by_field_name("type")
                    .or_else(|| node.child_by_field_name("right"))
                    .and_then(|t| text(&t, self.source))
                    .and_then(|t| self.resolve(&t));
                ty.map_or(Target::Unknown, Target::Value)
            }
            "await_expression" => named_children(node)
                .first()
                .and_then(|inner| self.value_type(inner))
                .and_then(|task| awaited_type(&task))
                .map_or(Target::Unknown, Target::Value),
            "element_access_expression" => node
                .child_by_field_name("expression")
                .and_then(|e| self.value_type(&e))
                .and_then(|collection| match collection {
                    TypeRef::Array(inner) => Some(*inner),
                    _ => None,
                })
                .map_or(Target::Unknown, Target::Value),
            "string_literal" | "interpolated_string_expression" | "verbatim_string_literal"
            | "raw_string_literal" => Target::Value(super::scope::predefined("String")),
            "integer_literal" | "real_literal" => text(node, self.source)
                .map_or(Target::Unknown, |t| Target::Value(super::scope::predefined(numeric_literal(&t)))),
            "boolean_literal" => Target::Value(super::scope::predefined("Boolean")),
            "character_literal" => Target::Value(super::scope::predefined("Char")),
            _ => Target::Unknown,
        }
    }

    fn value_type(&self, node: &Node) -> Option<TypeRef> {
        match self.target_of(node) {
            Target::Value(ty) => Some(ty),
            _ => None,
        }
    }

    /// Member named by `a.B`, when `a` can be typed.
    fn member_access(&self, node: &Node) -> Option<MemberRef> {
        let receiver = node.child_by_field_name("expression")?;
        let name = field_text(node, "name", self.source)?;
        let owner = self.target_of(&receiver).receiver()?;
        self.find_member(&owner, simple_name(&name), None, None)
    }

    /// The member an invocation lands on, without emitting anything.
    fn invocation_target(&self, node: &Node) -> Option<MemberRef> {
        let function = node.child_by_field_name("function")?;
        let args = node.child_by_field_name("arguments").map(|a| self.argument_types(&a));
        let args = args.as_deref();
        match function.kind() {
            "identifier" | "generic_name" => {
                let (name, _) = self.name_and_args(&function);
                self.implicit_member(&name, Some(MemberKind::Method), args)
            }
            "member_access_expression" => {
                let receiver = function.child_by_field_name("expression")?;
                let (name, _) = self.name_and_args(&function.child_by_field_name("name")?);
                match self.target_of(&receiver) {
                    Target::Value(value) => match &value {
                        TypeRef::Named(owner) => self.find_member(owner, &name, Some(MemberKind::Method), args),
                        _ => None,
                    }
                    .or_else(|| self.extension_call(&value, &name, args)),
                    Target::Static(owner) => self.find_member(&owner, &name, Some(MemberKind::Method), args),
                    Target::Unknown => None,
                }
            }
            _ => None,
        }
    }

    /// Receiver type of `?.B`: the condition of the enclosing conditional access.
    fn binding_receiver(&self, node: &Node) -> Option<NamedType> {
        let mut current = node.parent();
        while let Some(parent) = current {
            if parent.kind() == "conditional_access_expression" {
                let condition = parent
                    .child_by_field_name("condition")
                    .or_else(|| named_children(&parent).into_iter().next())?;
                return self.value_type(&condition)?.as_named().cloned();
            }
            current = parent.parent();
        }
        None
    }

    fn static_type(&self, name: &str) -> Target {
        match self.resolve(name) {
            Some(TypeRef::Named(named)) if named.module.is_some() => Target::Static(named),
            _ => Target::Unknown,
        }
    }

    fn member_value(&self, member: &MemberRef) -> Option<TypeRef> {
        if member.is_constructor {
            return Some(TypeRef::Named(member.declaring.clone()));
        }
        let definition = self.resolver.definition(&member.declaring)?;
        let exported = definition
            .members_named(&member.name)
            .find(|m| m.signature == member.signature)?;
        let value = self.resolver.resolve_expr(exported.value_type.as_ref()?)?;
        match value {
            TypeRef::GenericParam(_) => None,
            other => Some(other),
        }
    }

    // ─── Member Lookup ──────────────────────────────────────────────

    /// A name used without a receiver: a member of the enclosing type, its
    /// bases, its declaring types, or a statically imported type.
    fn implicit_member(
        &self,
        name: &str,
        kind: Option<MemberKind>,
        args: Option<&[Option<String>]>,
    ) -> Option<MemberRef> {
        if self.locals.contains_key(name) || self.local_functions.contains(name) {
            return None;
        }
        if let Some(found) = self.find_member(&self.owner, name, kind, args) {
            return Some(found);
        }
        for enclosing in self.scope.enclosing.iter().skip(1) {
            if let Some(found) = self
                .resolver
                .find(enclosing)
                .and_then(|outer| self.find_member(&outer, name, kind, args))
            {
                return Some(found);
            }
        }
        self.scope.static_usings.iter().find_map(|using| {
            let Some(TypeRef::Named(ty)) = self.resolve(using) else {
                return None;
            };
            self.find_member(&ty, name, kind, args)
        })
    }

    fn find_member(
        &self,
        owner: &NamedType,
        name: &str,
        kind: Option<MemberKind>,
        args: Option<&[Option<String>]>,
    ) -> Option<MemberRef> {
        for (position, (declaring, definition)) in self.resolver.base_chain(owner).into_iter().enumerate() {
            let candidates: Vec<&ExportedMember> = definition
                .members_named(name)
                .filter(|m| !m.is_constructor)
                .filter(|m| kind.map_or(true, |k| m.kind == k))
                .collect();
            if let Some(member) = choose_overload(&candidates, args) {
                let declaring = if position == 0 { owner.clone() } else { declaring };
                return Some(self.member_ref(&declaring, member));
            }
        }
        None
    }

    /// `x.Name(...)` bound to an extension method in scope. The receiver
    /// is matched against the `this` parameter.
    fn extension_call(&self, receiver: &TypeRef, name: &str, args: Option<&[Option<String>]>) -> Option<MemberRef> {
        let found = self.resolver.extension_methods(name, &self.scope);
        let candidates: Vec<&ExportedMember> = found.iter().map(|(_, m)| *m).collect();
        let this = receiver.display();
        let args: Option<Vec<Option<String>>> = args.map(|args| {
            std::iter::once(Some(this.clone()))
                .chain(args.iter().cloned())
                .collect()
        });
        let chosen = match args.as_deref() {
            Some(args) => choose_overload(&candidates, Some(args)),
            None => candidates
                .iter()
                .find(|m| m.signature.first().map(|p| p.trim_end_matches('&')) == Some(this.as_str()))
                .or_else(|| candidates.first())
                .copied(),
        }?;
        let (declaring, _) = found.iter().find(|(_, m)| std::ptr::eq(*m, chosen))?;
        Some(self.member_ref(declaring, chosen))
    }

    /// Signature display of each argument's type; `None` where it cannot be typed.
    fn argument_types(&self, list: &Node) -> Vec<Option<String>> {
        named_children(list)
            .iter()
            .filter(|a| a.kind() == "argument")
            .map(|argument| {
                named_children(argument)
                    .last()
                    .and_then(|expression| self.value_type(expression))
                    .map(|ty| ty.display())
            })
            .collect()
    }

    fn member_ref(&self, declaring: &NamedType, member: &ExportedMember) -> MemberRef {
        let mut target = MemberRef::new(declaring.clone(), member.name.clone(), member.kind);
        target.signature = member.signature.clone();
        target.is_constructor = member.is_constructor;
        target.local = declaring.local.map(|_| member.id);
        target
    }

    fn base_of_owner(&self) -> Option<NamedType> {
        self.resolver
            .base_chain(&self.owner)
            .into_iter()
            .nth(1)
            .map(|(named, _)| named)
    }

    // ─── Output ─────────────────────────────────────────────────────

    fn emit_type(&mut self, target: TypeRef, usage: TypeUsage) {
        self.out.push(BodyReference::Type { target, usage });
    }

    fn emit_member(&mut self, target: MemberRef, usage: MemberUsage) {
        self.out.push(BodyReference::Member { target, usage });
    }

    fn resolve(&self, text: &str) -> Option<TypeRef> {
        self.resolver.resolve(text, &self.scope)
    }

    /// `Foo` or `Foo<A, B>` → name and resolved type arguments.
    fn name_and_args(&self, node: &Node) -> (String, Vec<TypeRef>) {
        let name = text(node, self.source).unwrap_or_default();
        if node.kind() != "generic_name" {
            return (name, Vec::new());
        }
        let args = child_of_kind(node, "type_argument_list")
            .map(|list| {
                named_children(&list)
                    .iter()
                    .filter_map(|arg| text(arg, self.source))
                    .filter_map(|arg| self.resolve(&arg))
                    .collect()
            })
            .unwrap_or_default();
        (simple_name(&name).to_string(), args)
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn named_children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    (0..node.child_count())
        .filter_map(|i| node.child(i))
        .filter(|c| c.is_named() && c.kind() != "comment")
        .collect()
}

fn descendant_of_kind<'t>(node: &Node<'t>, kind: &str, skip_field: &str) -> Option<Node<'t>> {
    let skipped = node.child_by_field_name(skip_field).map(|n| n.id());
    let mut stack: Vec<Node<'t>> = named_children(node)
        .into_iter()
        .filter(|c| Some(c.id()) != skipped)
        .rev()
        .collect();
    while let Some(current) = stack.pop() {
        if current.kind() == kind {
            return Some(current);
        }
        stack.extend(named_children(&current).into_iter().rev());
    }
    None
}

/// Predefined type of a numeric literal from its suffix.
fn numeric_literal(text: &str) -> &'static str {
    let lower = text.to_ascii_lowercase();
    let hex = lower.starts_with("0x");
    if lower.ends_with("ul") || lower.ends_with("lu") {
        "UInt64"
    } else if lower.ends_with('l') {
        "Int64"
    } else if lower.ends_with('u') {
        "UInt32"
    } else if lower.ends_with('m') {
        "Decimal"
    } else if !hex && lower.ends_with('f') {
        "Single"
    } else if !hex && (lower.ends_with('d') || lower.contains('.') || lower.contains('e')) {
        "Double"
    } else {
        "Int32"
    }
}

/// `= expr` clauses carry the expression as their only named child.
fn unwrap_clause<'t>(node: &Node<'t>) -> Node<'t> {
    if node.kind() == "equals_value_clause" {
        if let Some(inner) = named_children(node).into_iter().next() {
            return inner;
        }
    }
    *node
}

/// `Foo<int>` → `Foo`.
fn simple_name(name: &str) -> &str {
    name.split('<').next().unwrap_or(name).trim()
}

fn is_dotted_name(text: &str) -> bool {
    !text.is_empty()
        && text
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_alphanumeric() || c == '_'))
}

/// Element type of an array or single-argument generic collection.
fn element_type(collection: &TypeRef) -> Option<TypeRef> {
    match collection {
        TypeRef::Array(inner) => Some((**inner).clone()),
        TypeRef::Named(named) if named.generic_args.len() == 1 => Some(named.generic_args[0].clone()),
        _ => None,
    }
}

/// `Task<T>` and `ValueTask<T>` → `T`.
fn awaited_type(task: &TypeRef) -> Option<TypeRef> {
    let named = task.as_named()?;
    matches!(named.name(), "Task`1" | "ValueTask`1")
        .then(|| named.generic_args.first().cloned())
        .flatten()
}

/// Overload for the given argument types. Candidates with the right
/// arity are ranked by how many known argument types match their
/// parameters exactly; the first best one wins. Without a match in
/// arity, the first candidate that can take the arguments is used.
fn choose_overload<'m>(
    candidates: &[&'m ExportedMember],
    args: Option<&[Option<String>]>,
) -> Option<&'m ExportedMember> {
    let Some(args) = args else {
        return candidates.first().copied();
    };
    let matching = |member: &ExportedMember| {
        member
            .signature
            .iter()
            .zip(args)
            .filter(|(param, arg)| arg.as_deref() == Some(param.trim_end_matches('&')))
            .count()
    };
    candidates
        .iter()
        .filter(|m| m.signature.len() == args.len())
        .min_by_key(|m| std::cmp::Reverse(matching(m)))
        .or_else(|| candidates.iter().find(|m| m.signature.len() > args.len()))
        .or_else(|| candidates.first())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MemberId;

    fn method(id: u32, signature: &[&str]) -> ExportedMember {
        ExportedMember {
            id: MemberId(id),
            name: "Write".into(),
            kind: MemberKind::Method,
            signature: signature.iter().map(|s| s.to_string()).collect(),
            value_type: None,
            is_constructor: false,
            is_static: true,
            is_extension: false,
        }
    }

    #[test]
    fn test_choose_overload_prefers_matching_types() {
        let (int, string, pair) = (method(0, &["Int32"]), method(1, &["String"]), method(2, &["Int32", "String"]));
        let candidates = [&int, &string, &pair];
        let pick = |args: &[Option<&str>]| {
            let args: Vec<Option<String>> = args.iter().map(|a| a.map(str::to_string)).collect();
            choose_overload(&candidates, Some(&args)).map(|m| m.id.0)
        };
        assert_eq!(pick(&[Some("String")]), Some(1));
        assert_eq!(pick(&[Some("Int32")]), Some(0));
        // unknown argument types fall back to the first of the right arity
        assert_eq!(pick(&[None]), Some(0));
        assert_eq!(pick(&[Some("Int64")]), Some(0));
        assert_eq!(pick(&[None, Some("String")]), Some(2));
        assert_eq!(choose_overload(&candidates, None).map(|m| m.id.0), Some(0));
    }

    #[test]
    fn test_numeric_literal_types() {
        assert_eq!(numeric_literal("1"), "Int32");
        assert_eq!(numeric_literal("0xFF"), "Int32");
        assert_eq!(numeric_literal("10L"), "Int64");
        assert_eq!(numeric_literal("3u"), "UInt32");
        assert_eq!(numeric_literal("3UL"), "UInt64");
        assert_eq!(numeric_literal("1.5"), "Double");
        assert_eq!(numeric_literal("1e3"), "Double");
        assert_eq!(numeric_literal("1.5f"), "Single");
        assert_eq!(numeric_literal("2m"), "Decimal");
    }
}
