//! Member walker: member nodes and their signature links.

use tracing::{debug, trace, warn};

use super::body::BodyAnalyzer;
use super::context::WalkContext;
use super::dedup::LinkDedup;
use super::link_type;
use super::types::TypeWalk;
use crate::graph::types::{LinkKind, MemberKind, Node};
use crate::names;

/// Emit member nodes and their links for every user type of the walk.
pub fn walk_members(ctx: &WalkContext, walk: &TypeWalk) -> usize {
    let mut count = 0;
    for record in &walk.records {
        let Some(type_name) = record.node.as_deref() else {
            continue;
        };
        for id in ctx.module.members(record.symbol.id) {
            let symbol = match ctx.module.member_symbol(id, ctx.index) {
                Ok(symbol) => symbol,
                Err(e) => {
                    warn!(ty = %type_name, member = id.0, error = %e, "skipping member");
                    continue;
                }
            };
            if symbol.is_compiler_generated
                || symbol.is_implicit_default_ctor
                || names::is_compiler_generated_name(&symbol.name)
            {
                trace!(ty = %type_name, member = %symbol.name, "skipping generated member");
                continue;
            }

            let name = names::join(type_name, &symbol.segment());
            ctx.emit_node(
                Node::member(name.clone(), type_name, symbol.kind, symbol.is_private)
                    .with_description(symbol.description.clone())
                    .with_location(symbol.location.clone()),
            );
            count += 1;

            let mut dedup = LinkDedup::new(ctx.sender, name);
            match symbol.kind {
                MemberKind::Field | MemberKind::Property | MemberKind::Event => {
                    if let Some(ty) = &symbol.value_type {
                        link_type(ctx, &mut dedup, ty, LinkKind::VariableType, Some(type_name));
                    }
                }
                MemberKind::Method => {
                    if !symbol.is_constructor {
                        if let Some(ty) = &symbol.value_type {
                            link_type(ctx, &mut dedup, ty, LinkKind::ReturnType, None);
                        }
                    }
                    for parameter in &symbol.parameters {
                        link_type(ctx, &mut dedup, parameter, LinkKind::ParameterType, None);
                    }
                }
            }

            if ctx.module.has_body(id) {
                BodyAnalyzer::new(ctx, walk, &mut dedup).analyze(id);
            }
        }
    }
    debug!(module = ctx.module.module_name(), members = count, "walked members");
    count
}
