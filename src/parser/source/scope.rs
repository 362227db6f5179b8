//! Type names in C# source: parsing, display and scope-based resolution.
//!
//! Declarations keep their type text plus the [`Scope`] they were written
//! in. Resolution happens later, once every module's export table is known.


use crate::names;
use crate::parser::{
    ExportTable, ExportedMember, ExportedType, NamedType, SymbolIndex, TypeExpr, TypeRef,
};

/// Module that owns the C# predefined types.
pub const CORE_LIBRARY: &str = "System.Runtime";

const PREDEFINED: &[(&str, &str)] = &[
    ("bool", "Boolean"),
    ("byte", "Byte"),
    ("sbyte", "SByte"),
    ("char", "Char"),
    ("decimal", "Decimal"),
    ("double", "Double"),
    ("float", "Single"),
    ("int", "Int32"),
    ("uint", "UInt32"),
    ("long", "Int64"),
    ("ulong", "UInt64"),
    ("short", "Int16"),
    ("ushort", "UInt16"),
    ("object", "Object"),
    ("string", "String"),
    ("void", "Void"),
    ("nint", "IntPtr"),
    ("nuint", "UIntPtr"),
    ("dynamic", "Object"),
];

const MAX_BASE_DEPTH: usize = 16;

// ─── Type Syntax ────────────────────────────────────────────────────

/// Parsed form of a type as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSyntax {
    /// Keyword type, carrying its `System` name.
    Predefined(&'static str),
    Name(Vec<NameSegment>),
    Array(Box<TypeSyntax>),
    Pointer(Box<TypeSyntax>),
    ByRef(Box<TypeSyntax>),
    Tuple(Vec<TypeSyntax>),
    /// `var`: the type comes from the initializer.
    Var,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameSegment {
    pub name: String,
    pub args: Vec<TypeSyntax>,
}

impl NameSegment {
    /// Metadata-style name: `List`1`.
    pub fn raw(&self) -> String {
        if self.args.is_empty() {
            self.name.clone()
        } else {
            format!("{}`{}", self.name, self.args.len())
        }
    }
}

impl TypeSyntax {
    /// Signature form; matches [`TypeRef::display`] of the resolved type.
    pub fn display(&self) -> String {
        match self {
            TypeSyntax::Predefined(name) => (*name).to_string(),
            TypeSyntax::Name(segments) => match segments.last() {
                Some(last) if last.args.is_empty() => names::canonicalize(&last.name),
                Some(last) => {
                    let args: Vec<String> = last.args.iter().map(TypeSyntax::display).collect();
                    format!("{}<{}>", last.name, args.join(","))
                }
                None => String::new(),
            },
            TypeSyntax::Array(inner) => format!("{}[]", inner.display()),
            TypeSyntax::Pointer(inner) => format!("{}*", inner.display()),
            TypeSyntax::ByRef(inner) => format!("{}&", inner.display()),
            TypeSyntax::Tuple(elements) => {
                let args: Vec<String> = elements.iter().map(TypeSyntax::display).collect();
                format!("ValueTuple<{}>", args.join(","))
            }
            TypeSyntax::Var => "var".to_string(),
        }
    }
}

/// Display form of a type text. `ref`, `out` and `in` parameters end in `&`,
/// also when the type itself cannot be parsed.
pub fn display_text(text: &str) -> String {
    if let Some(syntax) = parse_type(text) {
        return syntax.display();
    }
    let mut rest = text.trim();
    let mut by_ref = false;
    while let Some((word, tail)) = rest.split_once(char::is_whitespace) {
        match word {
            "ref" | "out" | "in" => by_ref = true,
            "readonly" | "scoped" | "params" | "this" => {}
            _ => break,
        }
        rest = tail.trim_start();
    }
    let display = names::simplify_type(rest);
    if by_ref {
        format!("{display}&")
    } else {
        display
    }
}

/// Parse a C# type as written (`List<int>[]`, `(int a, string b)`, `global::N.Foo?`).
pub fn parse_type(text: &str) -> Option<TypeSyntax> {
    let tokens = tokenize(text);
    let mut parser = TypeParser { tokens, pos: 0 };
    let ty = parser.parse()?;
    (parser.pos == parser.tokens.len()).then_some(ty)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Punct(char),
    DoubleColon,
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            continue;
        }
        if c.is_alphanumeric() || c == '_' || c == '@' {
            let mut ident = String::new();
            if c != '@' {
                ident.push(c);
            }
            while let Some(next) = chars.peek().copied().filter(|n| n.is_alphanumeric() || *n == '_') {
                ident.push(next);
                chars.next();
            }
            tokens.push(Token::Ident(ident));
        } else if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            tokens.push(Token::DoubleColon);
        } else {
            tokens.push(Token::Punct(c));
        }
    }
    tokens
}

struct TypeParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl TypeParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(&Token::Punct(c)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Option<String> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Some(name)
            }
            _ => None,
        }
    }

    fn parse(&mut self) -> Option<TypeSyntax> {
        let mut by_ref = false;
        while let Some(Token::Ident(word)) = self.peek() {
            match word.as_str() {
                "ref" | "out" | "in" => by_ref = true,
                "readonly" | "scoped" | "params" | "this" => {}
                _ => break,
            }
            self.pos += 1;
        }
        let mut ty = self.primary()?;
        loop {
            if self.eat('[') {
                while self.eat(',') {}
                if !self.eat(']') {
                    return None;
                }
                ty = TypeSyntax::Array(Box::new(ty));
            } else if self.eat('*') {
                ty = TypeSyntax::Pointer(Box::new(ty));
            } else if self.eat('?') {
                // nullable annotations do not change the referenced type
            } else {
                break;
            }
        }
        Some(if by_ref { TypeSyntax::ByRef(Box::new(ty)) } else { ty })
    }

    fn primary(&mut self) -> Option<TypeSyntax> {
        if self.eat('(') {
            let mut elements = Vec::new();
            loop {
                elements.push(self.parse()?);
                // optional element name
                if matches!(self.peek(), Some(Token::Ident(_))) {
                    self.pos += 1;
                }
                if self.eat(')') {
                    break;
                }
                if !self.eat(',') {
                    return None;
                }
            }
            return Some(TypeSyntax::Tuple(elements));
        }

        let first = self.ident()?;
        if first == "delegate" && self.eat('*') {
            self.skip_angle_group();
            return Some(TypeSyntax::Predefined("IntPtr"));
        }
        if first == "var" && self.at_end_of_type() {
            return Some(TypeSyntax::Var);
        }
        if let Some((_, clr)) = PREDEFINED.iter().find(|(keyword, _)| *keyword == first) {
            return Some(TypeSyntax::Predefined(clr));
        }

        let mut segments = Vec::new();
        let mut name = first;
        if self.peek() == Some(&Token::DoubleColon) {
            // `global::` and extern aliases are dropped
            self.pos += 1;
            name = self.ident()?;
        }
        loop {
            let args = if self.eat('<') { self.type_args()? } else { Vec::new() };
            segments.push(NameSegment { name, args });
            if !self.eat('.') {
                break;
            }
            name = self.ident()?;
        }
        Some(TypeSyntax::Name(segments))
    }

    fn type_args(&mut self) -> Option<Vec<TypeSyntax>> {
        let mut args = Vec::new();
        loop {
            args.push(self.parse()?);
            if self.eat('>') {
                return Some(args);
            }
            if !self.eat(',') {
                return None;
            }
        }
    }

    fn skip_angle_group(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.peek().cloned() {
            self.pos += 1;
            match token {
                Token::Punct('<') => depth += 1,
                Token::Punct('>') => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    fn at_end_of_type(&self) -> bool {
        matches!(self.peek(), None | Some(Token::Ident(_)) | Some(Token::Punct(',' | ')' | '>')))
    }
}

// ─── Scope ──────────────────────────────────────────────────────────

/// Everything that decides what a simple type name means at one point.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub module: String,
    pub namespace: String,
    pub usings: Vec<String>,
    pub static_usings: Vec<String>,
    /// `using Alias = Target;`
    pub aliases: Vec<(String, String)>,
    /// Export keys of the enclosing types, innermost first.
    pub enclosing: Vec<String>,
    pub type_params: Vec<String>,
}

impl Scope {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            ..Self::default()
        }
    }

    /// Scope inside a namespace declaration.
    pub fn in_namespace(&self, name: &str) -> Self {
        let mut scope = self.clone();
        scope.namespace = names::join(&self.namespace, name);
        scope
    }

    /// Scope inside a type body.
    pub fn in_type(&self, key: &str, type_params: &[String]) -> Self {
        let mut scope = self.clone();
        scope.enclosing.insert(0, key.to_string());
        scope.type_params.extend(type_params.iter().cloned());
        scope
    }

    pub fn with_type_params(&self, type_params: &[String]) -> Self {
        let mut scope = self.clone();
        scope.type_params.extend(type_params.iter().cloned());
        scope
    }

    /// Namespaces to search for a simple name: the current one and its parents.
    fn namespace_chain(&self) -> impl Iterator<Item = &str> {
        let mut current = Some(self.namespace.as_str());
        std::iter::from_fn(move || {
            let namespace = current?;
            current = if namespace.is_empty() {
                None
            } else {
                Some(namespace.rfind('.').map_or("", |i| &namespace[..i]))
            };
            Some(namespace)
        })
    }
}

// ─── Resolution ─────────────────────────────────────────────────────

/// Resolves type text against the module's own exports and the shared index.
pub struct Resolver<'a> {
    pub index: &'a SymbolIndex,
    pub own: &'a ExportTable,
    /// Referenced module names, used to place unresolved qualified names.
    pub references: &'a [String],
}

impl<'a> Resolver<'a> {
    pub fn new(index: &'a SymbolIndex, own: &'a ExportTable, references: &'a [String]) -> Self {
        Self {
            index,
            own,
            references,
        }
    }

    /// Resolve type text. `None` for `var` and text that is not a type.
    pub fn resolve(&self, text: &str, scope: &Scope) -> Option<TypeRef> {
        let syntax = parse_type(text)?;
        self.resolve_syntax(&syntax, scope)
    }

    pub fn resolve_expr(&self, expr: &TypeExpr) -> Option<TypeRef> {
        match expr {
            TypeExpr::Resolved(ty) => Some(ty.clone()),
            TypeExpr::Scoped { text, scope } => self.resolve(text, scope),
        }
    }

    pub fn resolve_syntax(&self, syntax: &TypeSyntax, scope: &Scope) -> Option<TypeRef> {
        let resolved = match syntax {
            TypeSyntax::Var => return None,
            TypeSyntax::Predefined(name) => predefined(name),
            TypeSyntax::Array(inner) => TypeRef::Array(Box::new(self.resolve_syntax(inner, scope)?)),
            TypeSyntax::Pointer(inner) => TypeRef::Pointer(Box::new(self.resolve_syntax(inner, scope)?)),
            TypeSyntax::ByRef(inner) => TypeRef::ByRef(Box::new(self.resolve_syntax(inner, scope)?)),
            TypeSyntax::Tuple(elements) => {
                let mut tuple = NamedType::new(
                    Some(CORE_LIBRARY.to_string()),
                    "System",
                    format!("ValueTuple`{}", elements.len()),
                );
                tuple.generic_args = elements
                    .iter()
                    .map(|e| self.resolve_syntax(e, scope))
                    .collect::<Option<Vec<_>>>()?;
                TypeRef::Named(tuple)
            }
            TypeSyntax::Name(segments) => self.resolve_name(segments, scope)?,
        };
        Some(resolved)
    }

    fn resolve_name(&self, segments: &[NameSegment], scope: &Scope) -> Option<TypeRef> {
        let last = segments.last()?;
        if segments.len() == 1 && last.args.is_empty() && scope.type_params.contains(&last.name) {
            return Some(TypeRef::GenericParam(last.name.clone()));
        }
        let args = last
            .args
            .iter()
            .map(|a| self.resolve_syntax(a, scope))
            .collect::<Option<Vec<_>>>()?;

        let mut named = match segments {
            [single] => self.lookup_simple(&single.raw(), scope),
            _ => self.lookup_qualified(segments, scope),
        }
        .unwrap_or_else(|| self.placeholder(segments));
        named.generic_args = args;
        Some(TypeRef::Named(named))
    }

    /// Export-key lookup, own module first.
    pub fn find(&self, key: &str) -> Option<NamedType> {
        if let Some(ty) = self.own.types.get(key) {
            return Some(self.named(&self.own.module, ty));
        }
        self.index
            .find_type(&self.own.module, key)
            .map(|(module, ty)| self.named(module, ty))
    }

    /// Exported definition behind a resolved name.
    pub fn definition(&self, named: &NamedType) -> Option<&'a ExportedType> {
        let module = named.module.as_deref()?;
        if module == self.own.module {
            return self.own.types.get(&named.key());
        }
        self.index.type_in(module, &named.key())
    }

    /// The type followed by its base types, as far as they resolve.
    pub fn base_chain(&self, named: &NamedType) -> Vec<(NamedType, &'a ExportedType)> {
        let mut chain = Vec::new();
        let mut current = Some(named.clone());
        while let Some(named) = current.take() {
            if chain.len() >= MAX_BASE_DEPTH {
                break;
            }
            let Some(definition) = self.definition(&named) else {
                break;
            };
            current = definition
                .base
                .as_ref()
                .and_then(|base| self.resolve_expr(base))
                .and_then(|base| base.as_named().cloned());
            chain.push((named, definition));
        }
        chain
    }

    /// Extension methods called `name` in the namespaces `scope` sees without
    /// qualification: its own namespace, the parents of it, and its usings.
    pub fn extension_methods(&self, name: &str, scope: &Scope) -> Vec<(NamedType, &'a ExportedMember)> {
        let namespaces: Vec<&str> = scope
            .namespace_chain()
            .chain(scope.usings.iter().map(String::as_str))
            .collect();
        let own = self
            .own
            .types
            .values()
            .filter(|t| t.nesting.len() == 1 && namespaces.contains(&t.namespace.as_str()))
            .flat_map(|t| {
                t.members_named(name)
                    .filter(|m| m.is_extension)
                    .map(move |m| (self.named(&self.own.module, t), m))
            });
        let imported = self
            .index
            .extension_methods(&self.own.module, &namespaces, name)
            .into_iter()
            .filter(|(module, _, _)| *module != self.own.module)
            .map(|(module, t, m)| (self.named(module, t), m));
        own.chain(imported).collect()
    }

    fn named(&self, module: &str, ty: &ExportedType) -> NamedType {
        NamedType {
            module: Some(module.to_string()),
            namespace: ty.namespace.clone(),
            nesting: ty.nesting.clone(),
            generic_args: Vec::new(),
            local: (module == self.own.module).then_some(ty.id),
        }
    }

    fn lookup_simple(&self, raw: &str, scope: &Scope) -> Option<NamedType> {
        for enclosing in &scope.enclosing {
            if let Some(found) = self.find(&format!("{enclosing}.{raw}")) {
                return Some(found);
            }
        }
        for namespace in scope.namespace_chain() {
            if let Some(found) = self.find(&names::join(namespace, raw)) {
                return Some(found);
            }
        }
        if let Some((_, target)) = scope.aliases.iter().find(|(alias, _)| alias == raw) {
            let global = Scope::new(scope.module.clone());
            return self
                .resolve(target, &global)
                .and_then(|ty| ty.as_named().cloned())
                .filter(|n| n.module.is_some());
        }
        scope
            .usings
            .iter()
            .find_map(|using| self.find(&names::join(using, raw)))
    }

    fn lookup_qualified(&self, segments: &[NameSegment], scope: &Scope) -> Option<NamedType> {
        let raws: Vec<String> = segments.iter().map(NameSegment::raw).collect();
        let mut text = raws.join(".");
        if let Some((_, target)) = scope.aliases.iter().find(|(alias, _)| *alias == raws[0]) {
            text = names::join(target, &raws[1..].join("."));
        }
        if let Some(found) = self.find(&text) {
            return Some(found);
        }
        for namespace in scope.namespace_chain() {
            if let Some(found) = self.find(&names::join(namespace, &text)) {
                return Some(found);
            }
        }
        // Outer type resolved through the scope, then nested lookups.
        let (outer, inner) = raws.split_first()?;
        let mut current = self.lookup_simple(outer, scope)?;
        for name in inner {
            current = self.find(&format!("{}.{name}", current.key()))?;
        }
        Some(current)
    }

    /// Unresolved name. Qualified names are placed in the referenced
    /// module whose name prefixes them, else in their first segment.
    fn placeholder(&self, segments: &[NameSegment]) -> NamedType {
        let raws: Vec<String> = segments.iter().map(NameSegment::raw).collect();
        let (name, namespace_parts) = match raws.split_last() {
            Some((name, parts)) => (name.clone(), parts),
            None => (String::new(), &[][..]),
        };
        let namespace = namespace_parts.join(".");
        let module = if namespace.is_empty() {
            None
        } else {
            self.references
                .iter()
                .filter(|r| namespace == **r || namespace.starts_with(&format!("{r}.")))
                .max_by_key(|r| r.len())
                .cloned()
                .or_else(|| namespace_parts.first().cloned())
        };
        NamedType::new(module, namespace, name)
    }
}

/// `System.{name}` in the core library.
pub fn predefined(name: &str) -> TypeRef {
    TypeRef::named(Some(CORE_LIBRARY.to_string()), "System", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ExportedType, TypeId};

    fn exported(namespace: &str, nesting: &[&str]) -> ExportedType {
        ExportedType {
            id: TypeId(0),
            namespace: namespace.to_string(),
            nesting: nesting.iter().map(|s| s.to_string()).collect(),
            base: None,
            members: Vec::new(),
            has_explicit_default_ctor: false,
            is_interface: false,
        }
    }

    fn table(module: &str, types: &[(&str, &[&str])]) -> ExportTable {
        let mut table = ExportTable::new(module);
        for (namespace, nesting) in types {
            let ty = exported(namespace, nesting);
            table.insert(crate::parser::export_key(&ty.namespace, &ty.nesting), ty);
        }
        table
    }

    #[test]
    fn test_parse_and_display() {
        let cases = [
            ("int", "Int32"),
            ("List<string>", "List<String>"),
            ("System.Collections.Generic.Dictionary<string, List<int>>", "Dictionary<String,List<Int32>>"),
            ("int[,]", "Int32[]"),
            ("Foo?", "Foo"),
            ("(int a, string b)", "ValueTuple<Int32,String>"),
            ("global::N.Foo", "Foo"),
            ("ref int", "Int32&"),
            ("out string", "String&"),
            ("in long", "Int64&"),
            ("scoped ref Span<int>", "Span<Int32>&"),
            ("ref delegate*<int, void>", "IntPtr&"),
            ("byte*", "Byte*"),
            ("Outer.Inner<T>", "Inner<T>"),
        ];
        for (text, display) in cases {
            assert_eq!(display_text(text), display, "display of {text}");
        }
        assert_eq!(parse_type("var"), Some(TypeSyntax::Var));
        assert!(parse_type("List<int").is_none());
    }

    #[test]
    fn test_simple_names_follow_namespace_chain_and_usings() {
        let own = table("App", &[("A.B", &["Local"]), ("A", &["Outer"])]);
        let mut index = SymbolIndex::new();
        index.add(table("Core", &[("Core.Models", &["Item"])]), vec![]);
        index.add(own.clone(), vec!["Core".to_string()]);
        let resolver = Resolver::new(&index, &own, &[]);

        let mut scope = Scope::new("App").in_namespace("A.B");
        scope.usings.push("Core.Models".into());

        let local = resolver.resolve("Local", &scope).unwrap();
        assert_eq!(local.as_named().unwrap().local, Some(TypeId(0)));
        let outer = resolver.resolve("Outer", &scope).unwrap();
        assert_eq!(outer.as_named().unwrap().key(), "A.Outer");
        let item = resolver.resolve("List<Item>", &scope).unwrap();
        let TypeRef::Named(list) = item else { panic!("expected a named type") };
        assert_eq!(list.module, None);
        assert_eq!(list.generic_args[0].as_named().unwrap().module.as_deref(), Some("Core"));
    }

    #[test]
    fn test_type_params_nested_types_and_aliases() {
        let own = table("App", &[("N", &["Outer"]), ("N", &["Outer", "Inner"])]);
        let index = SymbolIndex::new();
        let resolver = Resolver::new(&index, &own, &[]);

        let mut scope = Scope::new("App").in_namespace("N").in_type("N.Outer", &["T".to_string()]);
        scope.aliases.push(("O".into(), "N.Outer".into()));

        assert_eq!(resolver.resolve("T", &scope), Some(TypeRef::GenericParam("T".into())));
        let inner = resolver.resolve("Inner", &scope).unwrap();
        assert_eq!(inner.as_named().unwrap().nesting, vec!["Outer".to_string(), "Inner".to_string()]);
        let aliased = resolver.resolve("O", &scope).unwrap();
        assert_eq!(aliased.as_named().unwrap().key(), "N.Outer");
        let qualified = resolver.resolve("Outer.Inner", &Scope::new("App").in_namespace("N")).unwrap();
        assert_eq!(qualified.as_named().unwrap().key(), "N.Outer.Inner");
    }

    #[test]
    fn test_unresolved_names_become_placeholders() {
        let own = table("App", &[]);
        let index = SymbolIndex::new();
        let references = vec!["Newtonsoft.Json".to_string()];
        let resolver = Resolver::new(&index, &own, &references);
        let scope = Scope::new("App");

        let simple = resolver.resolve("Widget", &scope).unwrap();
        assert_eq!(simple.as_named().unwrap().module, None);
        let json = resolver.resolve("Newtonsoft.Json.Linq.JObject", &scope).unwrap();
        assert_eq!(json.as_named().unwrap().module.as_deref(), Some("Newtonsoft.Json"));
        let system = resolver.resolve("System.IO.Stream", &scope).unwrap();
        assert_eq!(system.as_named().unwrap().module.as_deref(), Some("System"));
        assert_eq!(
            resolver.resolve("string", &scope).unwrap().as_named().unwrap().module.as_deref(),
            Some(CORE_LIBRARY)
        );
    }

    #[test]
    fn test_namespace_chain_walks_to_global() {
        let scope = Scope::new("m").in_namespace("A.B.C");
        let chain: Vec<&str> = scope.namespace_chain().collect();
        assert_eq!(chain, vec!["A.B.C", "A.B", "A", ""]);
    }
}
