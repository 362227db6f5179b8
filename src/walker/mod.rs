//! Walkers over one module: types, then members and their bodies.
//!
//! Every walker talks only to [`SymbolAdapter`](crate::parser::SymbolAdapter)
//! through a [`WalkContext`] and writes to the item channel.

pub mod body;
pub mod context;
pub mod dedup;
pub mod members;
pub mod types;

pub use context::{ExternalNodes, ModuleEntry, ModuleIndex, WalkContext};
pub use dedup::LinkDedup;
pub use members::walk_members;
pub use types::{walk_types, TypeRecord, TypeWalk};

use crate::graph::types::{LinkKind, NodeKind};
use crate::parser::TypeRef;

/// Link `dedup`'s source to every named type in `ty`.
///
/// Generic arguments get `GenericArgument` links whatever `kind` is.
/// `skip` names a type that must not become a target.
pub(crate) fn link_type(
    ctx: &WalkContext,
    dedup: &mut LinkDedup,
    ty: &TypeRef,
    kind: LinkKind,
    skip: Option<&str>,
) {
    for (named, is_arg) in ty.named_types() {
        let Some(target) = ctx.type_target(named) else {
            continue;
        };
        if skip == Some(target.as_str()) || target == dedup.source() {
            continue;
        }
        let kind = if is_arg { LinkKind::GenericArgument } else { kind };
        dedup.link(target, NodeKind::Type, kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModuleFilter;
    use crate::graph::channel::item_channel;
    use crate::graph::types::{Item, Link, MemberKind, Node};
    use crate::names;
    use crate::parser::{
        BodyReference, ExportTable, MemberId, MemberRef, MemberSymbol, MemberUsage, NamedType,
        SymbolAdapter, SymbolError, SymbolIndex, TypeId, TypeSymbol, TypeUsage,
    };
    use std::path::PathBuf;

    const MODULE: &str = "mod";

    struct FakeMember {
        symbol: MemberSymbol,
        body: Option<Vec<BodyReference>>,
    }

    struct FakeType {
        symbol: TypeSymbol,
        nested: Vec<TypeId>,
        members: Vec<MemberId>,
    }

    #[derive(Default)]
    struct FakeModule {
        types: Vec<FakeType>,
        members: Vec<FakeMember>,
        top: Vec<TypeId>,
    }

    impl FakeModule {
        fn add_type(&mut self, namespace: &str, nesting: &[&str], declaring: Option<TypeId>) -> TypeId {
            let id = TypeId(self.types.len() as u32);
            self.types.push(FakeType {
                symbol: TypeSymbol {
                    id,
                    namespace: namespace.into(),
                    nesting: nesting.iter().map(|s| s.to_string()).collect(),
                    declaring_type: declaring,
                    base_type: None,
                    interfaces: Vec::new(),
                    is_compiler_generated: false,
                    description: None,
                    location: None,
                },
                nested: Vec::new(),
                members: Vec::new(),
            });
            match declaring {
                Some(parent) => self.types[parent.0 as usize].nested.push(id),
                None => self.top.push(id),
            }
            id
        }

        fn add_method(&mut self, ty: TypeId, name: &str, body: Option<Vec<BodyReference>>) -> MemberId {
            let id = MemberId(self.members.len() as u32);
            self.members.push(FakeMember {
                symbol: MemberSymbol {
                    id,
                    declaring_type: ty,
                    name: name.into(),
                    kind: MemberKind::Method,
                    signature: Vec::new(),
                    parameters: Vec::new(),
                    value_type: None,
                    is_constructor: false,
                    is_implicit_default_ctor: false,
                    is_private: false,
                    is_compiler_generated: false,
                    description: None,
                    location: None,
                },
                body,
            });
            self.types[ty.0 as usize].members.push(id);
            id
        }

        fn named(&self, ty: TypeId) -> NamedType {
            let symbol = &self.types[ty.0 as usize].symbol;
            NamedType {
                module: Some(MODULE.into()),
                namespace: symbol.namespace.clone(),
                nesting: symbol.nesting.clone(),
                generic_args: Vec::new(),
                local: Some(ty),
            }
        }

        fn call(&self, member: MemberId) -> BodyReference {
            let symbol = &self.members[member.0 as usize].symbol;
            let mut target = MemberRef::new(self.named(symbol.declaring_type), symbol.name.clone(), symbol.kind);
            target.local = Some(member);
            BodyReference::Member {
                target,
                usage: MemberUsage::Call,
            }
        }
    }

    impl SymbolAdapter for FakeModule {
        fn module_name(&self) -> &str {
            MODULE
        }

        fn references(&self) -> &[String] {
            &[]
        }

        fn files(&self) -> Vec<PathBuf> {
            Vec::new()
        }

        fn exports(&self) -> ExportTable {
            ExportTable::new(MODULE)
        }

        fn top_level_types(&self) -> Vec<TypeId> {
            self.top.clone()
        }

        fn nested_types(&self, ty: TypeId) -> Vec<TypeId> {
            self.types[ty.0 as usize].nested.clone()
        }

        fn type_symbol(&self, ty: TypeId, _: &SymbolIndex) -> Result<TypeSymbol, SymbolError> {
            self.types
                .get(ty.0 as usize)
                .map(|t| t.symbol.clone())
                .ok_or(SymbolError::UnknownHandle(ty.0))
        }

        fn members(&self, ty: TypeId) -> Vec<MemberId> {
            self.types[ty.0 as usize].members.clone()
        }

        fn member_symbol(&self, member: MemberId, _: &SymbolIndex) -> Result<MemberSymbol, SymbolError> {
            self.members
                .get(member.0 as usize)
                .map(|m| m.symbol.clone())
                .ok_or(SymbolError::UnknownHandle(member.0))
        }

        fn has_body(&self, member: MemberId) -> bool {
            self.members[member.0 as usize].body.is_some()
        }

        fn body(&self, member: MemberId, _: &SymbolIndex) -> Result<Vec<BodyReference>, SymbolError> {
            self.members[member.0 as usize]
                .body
                .clone()
                .ok_or(SymbolError::UnknownHandle(member.0))
        }

        fn find_method(&self, ty: TypeId, name: &str) -> Option<MemberId> {
            self.types[ty.0 as usize]
                .members
                .iter()
                .copied()
                .find(|m| self.members[m.0 as usize].symbol.name == name)
        }
    }

    fn walk(module: &FakeModule) -> Vec<Item> {
        let (tx, rx) = item_channel();
        let index = SymbolIndex::new();
        let mut modules = ModuleIndex::new(names::EXTERNALS, ModuleFilter::new(vec!["System*".into()]));
        modules.insert(MODULE, MODULE, true);
        let externals = ExternalNodes::new();
        let ctx = WalkContext {
            module,
            prefix: MODULE,
            index: &index,
            modules: &modules,
            externals: &externals,
            sender: &tx,
        };
        let types = walk_types(&ctx);
        walk_members(&ctx, &types);
        drop(tx);
        rx.collect_blocking()
    }

    fn nodes(items: &[Item]) -> Vec<&Node> {
        items.iter().filter_map(Item::as_node).collect()
    }

    fn links(items: &[Item]) -> Vec<&Link> {
        items.iter().filter_map(Item::as_link).collect()
    }

    #[test]
    fn test_foo_calls_baz() {
        let mut module = FakeModule::default();
        let foo = module.add_type("N", &["Foo"], None);
        let baz = module.add_type("N", &["Baz"], None);
        let qux = module.add_method(baz, "Qux", Some(Vec::new()));
        let call = module.call(qux);
        module.add_method(foo, "Bar", Some(vec![call]));

        let items = walk(&module);
        let nodes = nodes(&items);
        let find = |name: &str| nodes.iter().find(|n| n.name == name).copied();
        assert_eq!(find("mod.N.Foo").map(|n| n.parent.as_str()), Some("mod.N"));
        assert_eq!(find("mod.N.Foo.Bar()").map(|n| n.kind), Some(NodeKind::Member));
        assert!(find("mod.N.Baz").is_some());
        assert!(find("mod.N.Baz.Qux()").is_some());
        assert_eq!(find("mod.N").map(|n| n.kind), Some(NodeKind::Namespace));
        assert!(links(&items).contains(&&Link::new(
            "mod.N.Foo.Bar()",
            "mod.N.Baz.Qux()",
            NodeKind::Member,
            LinkKind::Call
        )));
    }

    #[test]
    fn test_dedup_is_scoped_per_member() {
        let mut module = FakeModule::default();
        let a = module.add_type("", &["A"], None);
        let b = module.add_type("", &["B"], None);
        let x = module.add_method(b, "X", None);
        let call = module.call(x);
        module.add_method(a, "M", Some(vec![call.clone(), call.clone()]));
        module.add_method(a, "N", Some(vec![call.clone(), call]));

        let items = walk(&module);
        let to_x: Vec<&Link> = links(&items).into_iter().filter(|l| l.target == "mod.B.X()").collect();
        assert_eq!(to_x.len(), 2);
        assert_eq!(to_x[0].source, "mod.A.M()");
        assert_eq!(to_x[1].source, "mod.A.N()");
    }

    #[test]
    fn test_async_body_is_attributed_to_owner() {
        let mut module = FakeModule::default();
        let foo = module.add_type("N", &["Foo"], None);
        let baz = module.add_type("N", &["Baz"], None);
        let qux = module.add_method(baz, "Qux", None);
        let machine = module.add_type("N", &["Foo", "<Run>d__3"], Some(foo));
        {
            let symbol = &mut module.types[machine.0 as usize].symbol;
            symbol.is_compiler_generated = true;
            symbol.interfaces.push(TypeRef::named(
                Some("System.Runtime".into()),
                "System.Runtime.CompilerServices",
                "IAsyncStateMachine",
            ));
        }
        let call = module.call(qux);
        module.add_method(machine, "MoveNext", Some(vec![call]));
        let local = BodyReference::Type {
            target: TypeRef::Named(module.named(machine)),
            usage: TypeUsage::LocalVariable,
        };
        module.add_method(foo, "Run", Some(vec![local.clone(), local]));

        let items = walk(&module);
        assert!(nodes(&items).iter().all(|n| !n.name.contains("<Run>")));
        let links = links(&items);
        assert!(links.iter().all(|l| !l.source.contains("<Run>") && !l.target.contains("<Run>")));
        let from_run: Vec<&&Link> = links.iter().filter(|l| l.source == "mod.N.Foo.Run()").collect();
        assert_eq!(from_run.len(), 1);
        assert_eq!(from_run[0].target, "mod.N.Baz.Qux()");
    }

    #[test]
    fn test_implicit_default_ctor_emits_nothing() {
        let mut module = FakeModule::default();
        let foo = module.add_type("N", &["Foo"], None);
        let plain = module.add_type("N", &["Plain"], None);
        let ctor = module.add_method(plain, ".ctor", Some(Vec::new()));
        module.members[ctor.0 as usize].symbol.is_implicit_default_ctor = true;
        let BodyReference::Member { mut target, .. } = module.call(ctor) else {
            unreachable!()
        };
        target.is_constructor = true;
        target.is_implicit_default_ctor = true;
        module.add_method(
            foo,
            "Make",
            Some(vec![BodyReference::Member {
                target,
                usage: MemberUsage::Creation,
            }]),
        );

        let items = walk(&module);
        assert!(links(&items).iter().all(|l| l.source != "mod.N.Foo.Make()"));
    }

    #[test]
    fn test_parents_are_strict_prefixes() {
        let mut module = FakeModule::default();
        let outer = module.add_type("A.B", &["Outer`1"], None);
        let inner = module.add_type("A.B", &["Outer`1", "Inner"], Some(outer));
        module.add_method(inner, "Go", None);
        module.add_type("", &["Global"], None);

        let items = walk(&module);
        let nodes = nodes(&items);
        assert!(nodes.iter().any(|n| n.name == "mod.A.B.Outer<T>.Inner.Go()"));
        assert!(nodes.iter().any(|n| n.name == "mod.A" && n.kind == NodeKind::Namespace));
        for node in &nodes {
            assert!(
                names::is_strict_prefix(&node.parent, &node.name),
                "{} under {}",
                node.name,
                node.parent
            );
        }
    }

    #[test]
    fn test_namespace_doc_describes_namespace() {
        let mut module = FakeModule::default();
        let doc = module.add_type("N", &["NamespaceDoc"], None);
        module.types[doc.0 as usize].symbol.description = Some("Core types.".into());
        module.add_type("N", &["Foo"], None);

        let items = walk(&module);
        let nodes = nodes(&items);
        let namespace: Vec<&&Node> = nodes.iter().filter(|n| n.name == "mod.N").collect();
        assert_eq!(namespace.len(), 1);
        assert_eq!(namespace[0].kind, NodeKind::Namespace);
        assert_eq!(namespace[0].description.as_deref(), Some("Core types."));
        assert!(nodes.iter().all(|n| !n.name.contains("NamespaceDoc")));
    }

    #[test]
    fn test_ignored_and_external_types() {
        let mut module = FakeModule::default();
        let foo = module.add_type("N", &["Foo"], None);
        let mut widgets = NamedType::new(Some("Vendor.Lib".into()), "V", "Widgets`1");
        widgets.generic_args.push(TypeRef::Named(module.named(foo)));
        let string = TypeRef::named(Some("System.Runtime".into()), "System", "String");
        module.add_method(
            foo,
            "Build",
            Some(vec![
                BodyReference::Type { target: string, usage: TypeUsage::LocalVariable },
                BodyReference::Type { target: TypeRef::Named(widgets), usage: TypeUsage::LocalVariable },
            ]),
        );

        let items = walk(&module);
        let links = links(&items);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].target, "$Externals.Vendor*Lib.V.Widgets<T>");
        assert_eq!(links[0].kind, LinkKind::VariableType);
        assert_eq!(links[1].target, "mod.N.Foo");
        assert_eq!(links[1].kind, LinkKind::GenericArgument);
        assert!(nodes(&items)
            .iter()
            .any(|n| n.name == "$Externals.Vendor*Lib" && n.kind == NodeKind::External));
    }
}
