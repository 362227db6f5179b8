//! Shared state handed to every walker call.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::trace;

use crate::config::ModuleFilter;
use crate::graph::channel::ItemSender;
use crate::graph::types::{Link, LinkKind, MemberKind, Node, NodeKind};
use crate::names;
use crate::parser::{NamedType, SymbolAdapter, SymbolIndex};

// ─── Module Index ───────────────────────────────────────────────────

/// Where one opened module's names live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEntry {
    pub prefix: String,
    /// Part of the input rather than an opened external reference.
    pub internal: bool,
}

/// Module name → name prefix, frozen once the reference phase is done.
#[derive(Debug, Clone)]
pub struct ModuleIndex {
    modules: HashMap<String, ModuleEntry>,
    externals_root: String,
    filter: ModuleFilter,
}

impl ModuleIndex {
    pub fn new(externals_root: impl Into<String>, filter: ModuleFilter) -> Self {
        Self {
            modules: HashMap::new(),
            externals_root: externals_root.into(),
            filter,
        }
    }

    pub fn insert(&mut self, module: impl Into<String>, prefix: impl Into<String>, internal: bool) {
        self.modules.insert(
            module.into(),
            ModuleEntry {
                prefix: prefix.into(),
                internal,
            },
        );
    }

    pub fn get(&self, module: &str) -> Option<&ModuleEntry> {
        self.modules.get(module)
    }

    pub fn is_opened(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    pub fn is_internal(&self, module: &str) -> bool {
        self.modules.get(module).is_some_and(|m| m.internal)
    }

    /// Modules of the input never count as ignored, whatever their name.
    pub fn is_ignored(&self, module: &str) -> bool {
        !self.is_internal(module) && self.filter.is_ignored(module)
    }

    pub fn externals_root(&self) -> &str {
        &self.externals_root
    }

    /// Prefix for a module: its own when opened, else a slot under the externals group.
    pub fn module_prefix(&self, module: &str) -> String {
        match self.modules.get(module) {
            Some(entry) => entry.prefix.clone(),
            None => names::join(&self.externals_root, &names::module_segment(module)),
        }
    }

    /// Canonical name of a referenced type, or `None` when it must not be linked.
    pub fn type_name(&self, named: &NamedType) -> Option<String> {
        let module = named.module.as_deref()?;
        if self.is_ignored(module) {
            trace!(module, ty = %named.key(), "ignored system reference");
            return None;
        }
        let path = names::type_path(&named.namespace, &named.nesting);
        Some(names::join(&self.module_prefix(module), &path))
    }

    pub fn internal_modules(&self) -> Vec<&str> {
        let mut modules: Vec<&str> = self
            .modules
            .iter()
            .filter(|(_, entry)| entry.internal)
            .map(|(name, _)| name.as_str())
            .collect();
        modules.sort_unstable();
        modules
    }
}

// ─── External Nodes ─────────────────────────────────────────────────

/// Nodes for link targets in modules that were never opened.
///
/// Shared by all workers; each name is emitted once per parse.
#[derive(Debug, Default)]
pub struct ExternalNodes {
    emitted: Mutex<HashSet<String>>,
}

impl ExternalNodes {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit_once(&self, sender: &ItemSender, node: Node) {
        let fresh = match self.emitted.lock() {
            Ok(mut emitted) => emitted.insert(node.name.clone()),
            Err(poisoned) => poisoned.into_inner().insert(node.name.clone()),
        };
        if fresh {
            sender.node(node);
        }
    }

    /// The `$Externals` group node.
    pub fn ensure_group(&self, sender: &ItemSender, modules: &ModuleIndex) {
        let root = modules.externals_root();
        self.emit_once(sender, Node::new(root, names::parent_name(root), NodeKind::External));
    }

    /// An external module node and the group above it.
    pub fn ensure_module(&self, sender: &ItemSender, modules: &ModuleIndex, module: &str) -> String {
        self.ensure_group(sender, modules);
        let prefix = modules.module_prefix(module);
        self.emit_once(
            sender,
            Node::new(prefix.clone(), modules.externals_root(), NodeKind::External),
        );
        prefix
    }

    /// A type of an unopened module with its namespace and declaring-type chain.
    pub fn ensure_type(&self, sender: &ItemSender, modules: &ModuleIndex, named: &NamedType) {
        let Some(module) = named.module.as_deref() else {
            return;
        };
        let mut parent = self.ensure_module(sender, modules, module);
        for part in named.namespace.split('.').filter(|p| !p.is_empty()) {
            let name = names::join(&parent, part);
            self.emit_once(sender, Node::new(name.clone(), parent, NodeKind::Namespace));
            parent = name;
        }
        for raw in &named.nesting {
            let segment = names::canonicalize(raw).replace('.', "*");
            let name = names::join(&parent, &segment);
            self.emit_once(sender, Node::new(name.clone(), parent, NodeKind::Type));
            parent = name;
        }
    }

    pub fn ensure_member(
        &self,
        sender: &ItemSender,
        modules: &ModuleIndex,
        declaring: &NamedType,
        name: &str,
        kind: MemberKind,
    ) {
        self.ensure_type(sender, modules, declaring);
        self.emit_once(
            sender,
            Node::member(name, names::parent_name(name), kind, false),
        );
    }
}

// ─── Walk Context ───────────────────────────────────────────────────

/// Everything a walker needs for one module.
pub struct WalkContext<'a> {
    pub module: &'a dyn SymbolAdapter,
    /// Name prefix of the module being walked.
    pub prefix: &'a str,
    pub index: &'a SymbolIndex,
    pub modules: &'a ModuleIndex,
    pub externals: &'a ExternalNodes,
    pub sender: &'a ItemSender,
}

impl<'a> WalkContext<'a> {
    /// Name of a type defined in this module.
    pub fn own_type_name(&self, namespace: &str, nesting: &[String]) -> String {
        names::join(self.prefix, &names::type_path(namespace, nesting))
    }

    /// Link target name for a referenced type, emitting external nodes on demand.
    pub fn type_target(&self, named: &NamedType) -> Option<String> {
        if named.is_compiler_generated() {
            return None;
        }
        let name = self.modules.type_name(named)?;
        if let Some(module) = named.module.as_deref() {
            if !self.modules.is_opened(module) {
                self.externals.ensure_type(self.sender, self.modules, named);
            }
        }
        Some(name)
    }

    /// Link target name for a referenced member of `declaring`.
    pub fn member_target(
        &self,
        declaring: &NamedType,
        segment: &str,
        kind: MemberKind,
    ) -> Option<String> {
        let type_name = self.modules.type_name(declaring)?;
        let name = names::join(&type_name, segment);
        if let Some(module) = declaring.module.as_deref() {
            if !self.modules.is_opened(module) {
                self.externals
                    .ensure_member(self.sender, self.modules, declaring, &name, kind);
            }
        }
        Some(name)
    }

    pub fn emit_node(&self, node: Node) {
        self.sender.node(node);
    }

    pub fn emit_link(&self, link: Link) {
        self.sender.link(link);
    }

    /// Module-to-module edge.
    pub fn emit_reference(&self, target_prefix: &str) {
        self.emit_link(Link::new(
            self.prefix,
            target_prefix,
            NodeKind::Module,
            LinkKind::Reference,
        ));
    }
}
