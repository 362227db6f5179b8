//! Type walker: one pass over every type of a module.

use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace, warn};

use super::context::WalkContext;
use super::dedup::LinkDedup;
use super::link_type;
use crate::graph::types::{LinkKind, Node, NodeKind};
use crate::names;
use crate::parser::{TypeId, TypeSymbol};

/// Marker type whose doc comment describes its namespace.
const NAMESPACE_DOC: &str = "NamespaceDoc";

/// A walked type, kept for the member phase.
#[derive(Debug, Clone)]
pub struct TypeRecord {
    pub symbol: TypeSymbol,
    /// Emitted node name. `None` for async state machines.
    pub node: Option<String>,
    pub is_async: bool,
}

/// Result of the type phase for one module.
#[derive(Debug, Default)]
pub struct TypeWalk {
    pub records: Vec<TypeRecord>,
    /// Async state machine types by canonical name.
    pub async_types: HashMap<String, TypeId>,
}

impl TypeWalk {
    pub fn node_count(&self) -> usize {
        self.records.iter().filter(|r| r.node.is_some()).count()
    }
}

/// Emit namespace and type nodes plus base/interface links for every type.
pub fn walk_types(ctx: &WalkContext) -> TypeWalk {
    let mut walk = TypeWalk::default();
    // namespace node name → description
    let mut namespaces: BTreeMap<String, Option<String>> = BTreeMap::new();

    let mut pending: Vec<(TypeId, Option<String>)> = ctx
        .module
        .top_level_types()
        .into_iter()
        .rev()
        .map(|id| (id, None))
        .collect();

    while let Some((id, declaring)) = pending.pop() {
        let symbol = match ctx.module.type_symbol(id, ctx.index) {
            Ok(symbol) => symbol,
            Err(e) => {
                warn!(module = ctx.module.module_name(), ty = id.0, error = %e, "skipping type");
                continue;
            }
        };
        let name = ctx.own_type_name(&symbol.namespace, &symbol.nesting);

        if symbol.is_compiler_generated || names::is_compiler_generated_name(symbol.name()) {
            if symbol.is_async_state_machine() {
                walk.async_types.insert(name, id);
                walk.records.push(TypeRecord {
                    symbol,
                    node: None,
                    is_async: true,
                });
            } else {
                trace!(ty = %name, "skipping compiler-generated type");
            }
            continue;
        }

        if symbol.name() == NAMESPACE_DOC && !symbol.is_nested() {
            if !symbol.namespace.is_empty() {
                let namespace = names::join(ctx.prefix, &symbol.namespace);
                register_namespace(&mut namespaces, ctx.prefix, &symbol.namespace);
                namespaces.insert(namespace, symbol.description.clone());
            }
            continue;
        }

        let parent = match declaring {
            Some(parent) => parent,
            None => {
                register_namespace(&mut namespaces, ctx.prefix, &symbol.namespace);
                names::join(ctx.prefix, &symbol.namespace)
            }
        };
        ctx.emit_node(
            Node::new(name.clone(), parent, NodeKind::Type)
                .with_description(symbol.description.clone())
                .with_location(symbol.location.clone()),
        );
        emit_type_links(ctx, &name, &symbol);

        for nested in ctx.module.nested_types(id).into_iter().rev() {
            pending.push((nested, Some(name.clone())));
        }
        walk.records.push(TypeRecord {
            symbol,
            node: Some(name),
            is_async: false,
        });
    }

    for (name, description) in namespaces {
        let parent = names::parent_name(&name).to_string();
        ctx.emit_node(Node::new(name, parent, NodeKind::Namespace).with_description(description));
    }

    debug!(
        module = ctx.module.module_name(),
        types = walk.node_count(),
        async_types = walk.async_types.len(),
        "walked types"
    );
    walk
}

/// Add every level of `namespace` that is not known yet.
fn register_namespace(
    namespaces: &mut BTreeMap<String, Option<String>>,
    prefix: &str,
    namespace: &str,
) {
    let mut name = prefix.to_string();
    for part in namespace.split('.').filter(|p| !p.is_empty()) {
        name = names::join(&name, part);
        namespaces.entry(name.clone()).or_insert(None);
    }
}

fn emit_type_links(ctx: &WalkContext, name: &str, symbol: &TypeSymbol) {
    let mut dedup = LinkDedup::new(ctx.sender, name);
    if let Some(base) = &symbol.base_type {
        link_type(ctx, &mut dedup, base, LinkKind::BaseType, Some(name));
    }
    for interface in &symbol.interfaces {
        link_type(ctx, &mut dedup, interface, LinkKind::Interface, Some(name));
    }
}
