//! Method body analyzer.
//!
//! Turns the body references of one member into links. Bodies of
//! lambdas, closures, iterators and async state machines are read as
//! part of the member that owns them, so their links are attributed
//! to that member.

use std::collections::{HashMap, HashSet};
use tracing::{trace, warn};

use super::context::WalkContext;
use super::dedup::LinkDedup;
use super::link_type;
use super::types::TypeWalk;
use crate::graph::types::{LinkKind, MemberKind, NodeKind};
use crate::parser::{
    BodyReference, MemberId, MemberRef, MemberUsage, NamedType, TypeId, TypeRef, TypeUsage,
};

/// Async state machine entry point.
const MOVE_NEXT: &str = "MoveNext";

pub struct BodyAnalyzer<'a, 'b, 'c> {
    ctx: &'a WalkContext<'a>,
    walk: &'a TypeWalk,
    dedup: &'b mut LinkDedup<'c>,
    pending: Vec<MemberId>,
    visited: HashSet<MemberId>,
    unwrapped: HashSet<TypeId>,
    privacy: HashMap<MemberId, bool>,
}

impl<'a, 'b, 'c> BodyAnalyzer<'a, 'b, 'c> {
    pub fn new(ctx: &'a WalkContext<'a>, walk: &'a TypeWalk, dedup: &'b mut LinkDedup<'c>) -> Self {
        Self {
            ctx,
            walk,
            dedup,
            pending: Vec::new(),
            visited: HashSet::new(),
            unwrapped: HashSet::new(),
            privacy: HashMap::new(),
        }
    }

    /// Analyze `member` and every generated body it pulls in.
    pub fn analyze(mut self, member: MemberId) {
        self.pending.push(member);
        while let Some(current) = self.pending.pop() {
            if !self.visited.insert(current) {
                continue;
            }
            let references = match self.ctx.module.body(current, self.ctx.index) {
                Ok(references) => references,
                Err(e) => {
                    warn!(member = %self.dedup.source(), body = current.0, error = %e, "skipping body");
                    continue;
                }
            };
            for reference in references {
                match reference {
                    BodyReference::Type { target, usage } => self.type_reference(&target, usage),
                    BodyReference::Member { target, usage } => self.member_reference(&target, usage),
                }
            }
        }
    }

    fn type_reference(&mut self, target: &TypeRef, usage: TypeUsage) {
        if let Some(named) = target.as_named() {
            if named.is_compiler_generated() {
                if usage == TypeUsage::LocalVariable {
                    self.unwrap_generated(named);
                }
                return;
            }
        }
        let kind = match usage {
            TypeUsage::LocalVariable | TypeUsage::ForeachElement | TypeUsage::Catch => {
                LinkKind::VariableType
            }
            TypeUsage::GenericArgument => LinkKind::GenericArgument,
        };
        link_type(self.ctx, self.dedup, target, kind, None);
    }

    fn member_reference(&mut self, target: &MemberRef, usage: MemberUsage) {
        if target.is_local_function {
            return;
        }
        if target.is_compiler_generated() {
            if target.declaring.is_compiler_generated() && usage == MemberUsage::Creation {
                self.unwrap_generated(&target.declaring);
            } else if let (Some(local), MemberKind::Method) = (target.local, target.kind) {
                self.pending.push(local);
            }
            return;
        }

        for arg in target.generic_args.iter().chain(&target.declaring.generic_args) {
            link_type(self.ctx, self.dedup, arg, LinkKind::GenericArgument, None);
        }

        // nothing in source declares it, so nothing is linked
        if target.is_implicit_default_ctor {
            return;
        }

        let Some(name) = self
            .ctx
            .member_target(&target.declaring, &target.segment(), target.kind)
        else {
            return;
        };
        if name == self.dedup.source() {
            return;
        }
        let kind = match usage {
            MemberUsage::Call | MemberUsage::Creation => LinkKind::Call,
            MemberUsage::Access => LinkKind::MemberAccess,
        };
        let target_kind = match target.local {
            Some(local) if self.is_private(local) => NodeKind::Private,
            _ => NodeKind::Member,
        };
        self.dedup.link(name, target_kind, kind);
    }

    /// Read a generated type's code as part of the current member, once.
    fn unwrap_generated(&mut self, named: &NamedType) {
        let Some(ty) = named.local else {
            return;
        };
        if !self.unwrapped.insert(ty) {
            return;
        }
        let name = self.ctx.own_type_name(&named.namespace, &named.nesting);
        if self.walk.async_types.contains_key(&name) {
            if let Some(move_next) = self.ctx.module.find_method(ty, MOVE_NEXT) {
                trace!(member = %self.dedup.source(), state_machine = %name, "unwrapping async body");
                self.pending.push(move_next);
            }
            return;
        }
        for member in self.ctx.module.members(ty) {
            let is_method = self
                .ctx
                .module
                .member_symbol(member, self.ctx.index)
                .is_ok_and(|m| m.kind == MemberKind::Method);
            if is_method {
                self.pending.push(member);
            }
        }
    }

    fn is_private(&mut self, member: MemberId) -> bool {
        if let Some(private) = self.privacy.get(&member) {
            return *private;
        }
        let private = self
            .ctx
            .module
            .member_symbol(member, self.ctx.index)
            .is_ok_and(|m| m.is_private);
        self.privacy.insert(member, private);
        private
    }
}
