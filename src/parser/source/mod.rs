//! C# source backend.
//!
//! Files are parsed with tree-sitter once; declarations go into an arena and
//! bodies are re-read from the syntax trees on demand.

mod body;
pub mod declarations;
pub mod scope;

use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{debug, warn};
use tree_sitter::{Node, Tree};

use crate::error::{GraphError, Result};
use crate::graph::types::MemberKind;
use crate::parser::language;
use crate::parser::{
    BodyReference, ExportTable, ExportedMember, ExportedType, MemberId, MemberSymbol, NamedType,
    SymbolAdapter, SymbolError, SymbolIndex, TypeExpr, TypeId, TypeRef, TypeSymbol,
};

use body::BodyReader;
use declarations::{Declarations, MemberDecl, SyntaxRef, TypeForm};
use scope::Resolver;

/// One parsed source file.
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
    pub tree: Tree,
}

impl SourceFile {
    pub fn parse(path: PathBuf, text: String) -> std::result::Result<Self, SymbolError> {
        let mut parser = language::csharp_parser().map_err(SymbolError::Syntax)?;
        let tree = parser
            .parse(&text, None)
            .ok_or_else(|| SymbolError::Syntax(format!("no tree for {}", path.display())))?;
        Ok(Self { path, text, tree })
    }
}

/// A compilation read from source files.
pub struct SourceModule {
    name: String,
    references: Vec<String>,
    files: Vec<SourceFile>,
    decls: Declarations,
    exports: ExportTable,
}

impl SourceModule {
    /// Read and parse every file. An unreadable file fails the module.
    pub fn open(
        name: impl Into<String>,
        references: Vec<String>,
        paths: &[PathBuf],
        include_locations: bool,
    ) -> Result<Self> {
        let sources = paths
            .iter()
            .map(|path| {
                std::fs::read_to_string(path)
                    .map(|text| (path.clone(), text))
                    .map_err(|e| GraphError::open(path, e))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_sources(name, references, sources, include_locations))
    }

    /// Build from in-memory sources. Files the parser rejects are skipped.
    pub fn from_sources(
        name: impl Into<String>,
        references: Vec<String>,
        sources: Vec<(PathBuf, String)>,
        include_locations: bool,
    ) -> Self {
        let name = name.into();
        let files: Vec<SourceFile> = sources
            .into_par_iter()
            .filter_map(|(path, text)| match SourceFile::parse(path.clone(), text) {
                Ok(file) => Some(file),
                Err(e) => {
                    warn!(module = %name, path = %path.display(), error = %e, "skipping unparsable file");
                    None
                }
            })
            .collect();
        let decls = declarations::collect(&name, &files, include_locations);
        let exports = export_table(&name, &decls);
        debug!(
            module = %name,
            files = files.len(),
            types = decls.types.len(),
            members = decls.members.len(),
            "read source module"
        );
        Self {
            name,
            references,
            files,
            decls,
            exports,
        }
    }

    fn resolver<'a>(&'a self, index: &'a SymbolIndex) -> Resolver<'a> {
        Resolver::new(index, &self.exports, &self.references)
    }

    fn member_decl(&self, id: MemberId) -> std::result::Result<&MemberDecl, SymbolError> {
        self.decls.member(id).ok_or(SymbolError::UnknownHandle(id.0))
    }

    /// Find a declaration's node again in its file's tree.
    fn node(&self, syntax: &SyntaxRef) -> Option<(Node<'_>, &SourceFile)> {
        let file = self.files.get(syntax.file)?;
        let mut node = file
            .tree
            .root_node()
            .descendant_for_byte_range(syntax.start, syntax.end)?;
        loop {
            if node.kind_id() == syntax.kind && node.start_byte() == syntax.start && node.end_byte() == syntax.end {
                return Some((node, file));
            }
            node = node.parent()?;
        }
    }

    fn named(&self, ty: TypeId) -> Option<NamedType> {
        let decl = self.decls.ty(ty)?;
        Some(NamedType {
            module: Some(self.name.clone()),
            namespace: decl.namespace.clone(),
            nesting: decl.nesting.clone(),
            generic_args: Vec::new(),
            local: Some(ty),
        })
    }
}

fn export_table(module: &str, decls: &Declarations) -> ExportTable {
    let mut table = ExportTable::new(module);
    for (index, ty) in decls.types.iter().enumerate() {
        let members: Vec<ExportedMember> = ty
            .members
            .iter()
            .filter_map(|id| decls.member(*id).map(|m| (*id, m)))
            .map(|(id, m)| ExportedMember {
                id,
                name: m.name.clone(),
                kind: m.kind,
                signature: signature(m),
                value_type: m.value_type.as_ref().map(|text| TypeExpr::Scoped {
                    text: text.clone(),
                    scope: m.scope.clone(),
                }),
                is_constructor: m.is_constructor,
                is_static: m.is_static,
                is_extension: m.is_extension,
            })
            .collect();
        let has_explicit_default_ctor = members
            .iter()
            .any(|m| m.name == ".ctor" && m.signature.is_empty());
        table.insert(
            ty.key(),
            ExportedType {
                id: TypeId(index as u32),
                namespace: ty.namespace.clone(),
                nesting: ty.nesting.clone(),
                base: ty.bases.first().map(|(text, scope)| TypeExpr::Scoped {
                    text: text.clone(),
                    scope: scope.clone(),
                }),
                members,
                has_explicit_default_ctor,
                is_interface: ty.form == TypeForm::Interface,
            },
        );
    }
    table
}

fn signature(member: &MemberDecl) -> Vec<String> {
    member.params.iter().map(|p| scope::display_text(p)).collect()
}

/// `IFoo` naming convention, for bases that cannot be resolved.
fn looks_like_interface(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next() == Some('I') && chars.next().is_some_and(char::is_uppercase)
}

impl SymbolAdapter for SourceModule {
    fn module_name(&self) -> &str {
        &self.name
    }

    fn references(&self) -> &[String] {
        &self.references
    }

    fn files(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    fn exports(&self) -> ExportTable {
        self.exports.clone()
    }

    fn top_level_types(&self) -> Vec<TypeId> {
        self.decls.top_level.clone()
    }

    fn nested_types(&self, ty: TypeId) -> Vec<TypeId> {
        self.decls.ty(ty).map(|d| d.nested.clone()).unwrap_or_default()
    }

    fn type_symbol(&self, ty: TypeId, index: &SymbolIndex) -> std::result::Result<TypeSymbol, SymbolError> {
        let decl = self.decls.ty(ty).ok_or(SymbolError::UnknownHandle(ty.0))?;
        let resolver = self.resolver(index);
        let mut base_type = None;
        let mut interfaces = Vec::new();
        for (position, (text, scope)) in decl.bases.iter().enumerate() {
            let Some(resolved) = resolver.resolve(text, scope) else {
                continue;
            };
            let is_interface = match resolved.as_named() {
                Some(named) => resolver
                    .definition(named)
                    .map(|d| d.is_interface)
                    .unwrap_or_else(|| looks_like_interface(named.name())),
                None => true,
            };
            let may_have_base = matches!(decl.form, TypeForm::Class | TypeForm::Record);
            if position == 0 && may_have_base && !is_interface {
                base_type = Some(resolved);
            } else {
                interfaces.push(resolved);
            }
        }
        Ok(TypeSymbol {
            id: ty,
            namespace: decl.namespace.clone(),
            nesting: decl.nesting.clone(),
            declaring_type: decl.declaring,
            base_type,
            interfaces,
            is_compiler_generated: false,
            description: decl.description.clone(),
            location: decl.location.clone(),
        })
    }

    fn members(&self, ty: TypeId) -> Vec<MemberId> {
        self.decls.ty(ty).map(|d| d.members.clone()).unwrap_or_default()
    }

    fn member_symbol(
        &self,
        member: MemberId,
        index: &SymbolIndex,
    ) -> std::result::Result<MemberSymbol, SymbolError> {
        let decl = self.member_decl(member)?;
        let resolver = self.resolver(index);
        let parameters: Vec<TypeRef> = decl
            .params
            .iter()
            .filter_map(|p| resolver.resolve(p, &decl.scope))
            .collect();
        let value_type = decl
            .value_type
            .as_deref()
            .and_then(|t| resolver.resolve(t, &decl.scope));
        Ok(MemberSymbol {
            id: member,
            declaring_type: decl.declaring,
            name: decl.name.clone(),
            kind: decl.kind,
            signature: signature(decl),
            parameters,
            value_type,
            is_constructor: decl.is_constructor,
            is_implicit_default_ctor: false,
            is_private: decl.is_private,
            is_compiler_generated: false,
            description: decl.description.clone(),
            location: decl.location.clone(),
        })
    }

    fn has_body(&self, member: MemberId) -> bool {
        self.decls.member(member).is_some_and(|m| m.has_body)
    }

    fn body(&self, member: MemberId, index: &SymbolIndex) -> std::result::Result<Vec<BodyReference>, SymbolError> {
        let decl = self.member_decl(member)?;
        let Some(syntax) = decl.syntax.as_ref() else {
            return Ok(Vec::new());
        };
        let (node, file) = self
            .node(syntax)
            .ok_or_else(|| SymbolError::Syntax(format!("declaration of {} not found", decl.name)))?;
        let owner = self
            .named(decl.declaring)
            .ok_or(SymbolError::UnknownHandle(decl.declaring.0))?;
        let reader = BodyReader::new(self.resolver(index), file.text.as_bytes(), owner, decl);
        Ok(reader.read(&node))
    }

    fn find_method(&self, ty: TypeId, name: &str) -> Option<MemberId> {
        let decl = self.decls.ty(ty)?;
        decl.members.iter().copied().find(|id| {
            self.decls
                .member(*id)
                .is_some_and(|m| m.kind == MemberKind::Method && m.name == name)
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::parser::{MemberRef, MemberUsage, TypeUsage};

    pub(crate) const FOO_CALLS_BAZ: &str = r#"
namespace N
{
    public class Baz
    {
        public void Qux() { }
    }

    public class Foo
    {
        public void Bar()
        {
            var baz = new Baz();
            baz.Qux();
        }
    }
}
"#;

    fn module(sources: &[&str]) -> (SourceModule, SymbolIndex) {
        let sources = sources
            .iter()
            .enumerate()
            .map(|(i, text)| (PathBuf::from(format!("src/F{i}.cs")), text.to_string()))
            .collect();
        let module = SourceModule::from_sources("App", vec![], sources, true);
        let mut index = SymbolIndex::new();
        index.add(module.exports(), module.references().to_vec());
        (module, index)
    }

    fn member_id(module: &SourceModule, ty: &str, name: &str) -> MemberId {
        let ty = module.decls.by_key[ty];
        module
            .members(ty)
            .into_iter()
            .find(|m| module.decls.member(*m).is_some_and(|d| d.name == name))
            .unwrap_or_else(|| panic!("no member {name}"))
    }

    fn member_targets(refs: &[BodyReference]) -> Vec<(String, String, MemberUsage)> {
        refs.iter()
            .filter_map(|r| match r {
                BodyReference::Member { target, usage } => {
                    Some((target.declaring.key(), target.segment(), *usage))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_call_resolves_to_declared_member() {
        let (module, index) = module(&[FOO_CALLS_BAZ]);
        let bar = member_id(&module, "N.Foo", "Bar");
        assert!(module.has_body(bar));
        let refs = module.body(bar, &index).unwrap();

        assert!(refs.contains(&BodyReference::Type {
            target: TypeRef::Named(module.named(module.decls.by_key["N.Baz"]).unwrap()),
            usage: TypeUsage::LocalVariable,
        }));
        let targets = member_targets(&refs);
        assert!(targets.contains(&("N.Baz".into(), "#ctor()".into(), MemberUsage::Creation)));
        assert!(targets.contains(&("N.Baz".into(), "Qux()".into(), MemberUsage::Call)));

        let creation = refs.iter().find_map(|r| match r {
            BodyReference::Member { target, usage: MemberUsage::Creation } => Some(target.clone()),
            _ => None,
        });
        assert!(creation.is_some_and(|c: MemberRef| c.is_implicit_default_ctor));
    }

    #[test]
    fn test_type_symbol_bases_and_interfaces() {
        let (module, index) = module(&[
            "namespace N { interface IShape { } class Base { } class Circle : Base, IShape, IDisposable { } }",
        ]);
        let circle = module.decls.by_key["N.Circle"];
        let symbol = module.type_symbol(circle, &index).unwrap();
        assert_eq!(symbol.base_type.as_ref().and_then(|b| b.as_named()).map(|n| n.key()), Some("N.Base".into()));
        let interfaces: Vec<String> = symbol.interfaces.iter().filter_map(|i| i.as_named()).map(|n| n.name().to_string()).collect();
        assert_eq!(interfaces, vec!["IShape".to_string(), "IDisposable".to_string()]);
    }

    #[test]
    fn test_member_symbols_carry_signature_and_privacy() {
        let (module, index) = module(&[
            "namespace N { class Repo { /// <summary>Finds one.</summary>\npublic Item Find(int id, string name) => null; int hidden; } class Item { } }",
        ]);
        let find = module.member_symbol(member_id(&module, "N.Repo", "Find"), &index).unwrap();
        assert_eq!(find.signature, vec!["Int32".to_string(), "String".to_string()]);
        assert_eq!(find.segment(), "Find(Int32,String)");
        assert_eq!(find.value_type.as_ref().and_then(|t| t.as_named()).map(|n| n.key()), Some("N.Item".into()));
        assert_eq!(find.description.as_deref(), Some("Finds one."));
        assert!(!find.is_private);
        let hidden = module.member_symbol(member_id(&module, "N.Repo", "hidden"), &index).unwrap();
        assert!(hidden.is_private);
        assert_eq!(hidden.kind, MemberKind::Field);
    }

    #[test]
    fn test_by_ref_parameters_display_as_references() {
        let (module, index) = module(&[
            "namespace N { class Io { public void M(ref int a, out string b, in long c) { b = null; } } }",
        ]);
        let m = module.member_symbol(member_id(&module, "N.Io", "M"), &index).unwrap();
        assert_eq!(m.segment(), "M(Int32&,String&,Int64&)");
        assert!(matches!(m.parameters[0], TypeRef::ByRef(_)));
    }

    #[test]
    fn test_overload_picked_by_argument_types() {
        let (module, index) = module(&[r#"
namespace N {
    class Log { public static void Write(int v) { } public static void Write(string s) { } }
    class App {
        void Run(long wide) {
            Log.Write("x");
            int n = 1;
            Log.Write(n);
            Log.Write(wide);
            Log.Write('c' == 'd' ? 1 : 2);
        }
    }
}"#]);
        let run = member_id(&module, "N.App", "Run");
        let calls: Vec<String> = member_targets(&module.body(run, &index).unwrap())
            .into_iter()
            .map(|(_, segment, _)| segment)
            .collect();
        assert_eq!(
            calls,
            vec!["Write(String)", "Write(Int32)", "Write(Int32)", "Write(Int32)"]
        );
    }

    #[test]
    fn test_extension_method_calls() {
        let (module, index) = module(&[
            "namespace N { class W { } static class Ext { public static void Spin(this W w) { } public static void Spin(this string s, int times) { } } }",
            "using N; namespace M { class App { void Run(W w) { w.Spin(); \"x\".Spin(2); w.Missing(); } } }",
        ]);
        let spin = member_id(&module, "N.Ext", "Spin");
        assert!(module.decls.member(spin).unwrap().is_extension);
        let ext = &index.type_in("App", "N.Ext").unwrap().members;
        assert!(ext.iter().all(|m| m.is_extension));

        let run = member_id(&module, "M.App", "Run");
        let calls = member_targets(&module.body(run, &index).unwrap());
        assert_eq!(
            calls,
            vec![
                ("N.Ext".to_string(), "Spin(W)".to_string(), MemberUsage::Call),
                ("N.Ext".to_string(), "Spin(String,Int32)".to_string(), MemberUsage::Call),
            ]
        );
    }

    #[test]
    fn test_extension_methods_need_a_static_class_and_a_using() {
        let (module, index) = module(&[
            "namespace N { class W { } class NotStatic { public static void Spin(this W w) { } } }",
            "namespace M { static class Ext { public static void Turn(this N.W w) { } } }",
            "namespace O { class App { void Run(N.W w) { w.Spin(); w.Turn(); } } }",
        ]);
        assert!(!module.decls.member(member_id(&module, "N.NotStatic", "Spin")).unwrap().is_extension);
        let run = member_id(&module, "O.App", "Run");
        assert!(member_targets(&module.body(run, &index).unwrap()).is_empty());
    }

    #[test]
    fn test_body_reference_forms() {
        let (module, index) = module(&[r#"
namespace N {
    class Item { public int Size { get; set; } public Item(int size) { } }
    class Failure : System.Exception { }
    class Service {
        private List<Item> items;
        public int Count;
        public void Run(Item[] all) {
            foreach (var item in all) { Count = item.Size; }
            try { Helper(); } catch (Failure f) { }
            var made = new Item(3) { Size = 4 };
            int Helper() => 1;
        }
    }
}"#]);
        let run = member_id(&module, "N.Service", "Run");
        let refs = module.body(run, &index).unwrap();

        let usages: Vec<(String, TypeUsage)> = refs
            .iter()
            .filter_map(|r| match r {
                BodyReference::Type { target, usage } => Some((target.as_named()?.key(), *usage)),
                _ => None,
            })
            .collect();
        assert!(usages.contains(&("N.Item".into(), TypeUsage::ForeachElement)));
        assert!(usages.contains(&("N.Failure".into(), TypeUsage::Catch)));
        assert!(usages.contains(&("N.Item".into(), TypeUsage::LocalVariable)));

        let targets = member_targets(&refs);
        assert!(targets.contains(&("N.Service".into(), "Count".into(), MemberUsage::Access)));
        assert!(targets.contains(&("N.Item".into(), "Size".into(), MemberUsage::Access)));
        assert!(targets.contains(&("N.Item".into(), "#ctor(Int32)".into(), MemberUsage::Creation)));

        let local_call = refs.iter().any(|r| {
            matches!(r, BodyReference::Member { target, usage: MemberUsage::Call } if target.is_local_function && target.name == "Helper")
        });
        assert!(local_call);
    }

    #[test]
    fn test_base_members_and_constructor_initializers() {
        let (module, index) = module(&[r#"
namespace N {
    class Animal { protected void Breathe() { } public Animal(string name) { } }
    class Dog : Animal {
        public Dog() : base("dog") { Breathe(); }
    }
}"#]);
        let ctor = member_id(&module, "N.Dog", ".ctor");
        let targets = member_targets(&module.body(ctor, &index).unwrap());
        assert!(targets.contains(&("N.Animal".into(), "#ctor(String)".into(), MemberUsage::Call)));
        assert!(targets.contains(&("N.Animal".into(), "Breathe()".into(), MemberUsage::Call)));
    }

    #[test]
    fn test_cross_module_resolution_through_index() {
        let core = SourceModule::from_sources(
            "Core",
            vec![],
            vec![(PathBuf::from("Core.cs"), "namespace Core.Models { public class Widget { public void Spin() { } } }".into())],
            false,
        );
        let app = SourceModule::from_sources(
            "App",
            vec!["Core".into()],
            vec![(
                PathBuf::from("App.cs"),
                "using Core.Models; namespace App { class Runner { void Go(Widget w) { w.Spin(); } } }".into(),
            )],
            false,
        );
        let mut index = SymbolIndex::new();
        index.add(core.exports(), vec![]);
        index.add(app.exports(), vec!["Core".into()]);

        let go = member_id(&app, "App.Runner", "Go");
        let symbol = app.member_symbol(go, &index).unwrap();
        assert_eq!(symbol.parameters[0].as_named().and_then(|n| n.module.as_deref()), Some("Core"));
        let refs = app.body(go, &index).unwrap();
        let call = refs.iter().find_map(|r| match r {
            BodyReference::Member { target, .. } => Some(target.clone()),
            _ => None,
        });
        let call = call.unwrap();
        assert_eq!(call.declaring.module.as_deref(), Some("Core"));
        assert_eq!(call.local, None);
        assert_eq!(call.segment(), "Spin()");
    }

    #[test]
    fn test_open_missing_file_fails() {
        let missing = PathBuf::from("/nonexistent/dir/File.cs");
        assert!(matches!(
            SourceModule::open("App", vec![], &[missing], false),
            Err(GraphError::ModuleNotFound(_))
        ));
    }
}
