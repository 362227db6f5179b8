//! Staged, parallel parse of every module in the input.
//!
//! Four phases, each finished for all modules before the next starts:
//! open, reference edges, types, members. Work inside a phase runs on a
//! rayon pool one task per module.

use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::resolver::{self, ModuleRefs, ModuleSource, PlannedModule};
use crate::config::ParseOptions;
use crate::error::{GraphError, Result};
use crate::graph::channel::ItemSender;
use crate::graph::types::{Node, NodeKind};
use crate::names;
use crate::parser::binary::BinaryModule;
use crate::parser::source::SourceModule;
use crate::parser::{ExportTable, InputKind, Module, SymbolAdapter, SymbolIndex};
use crate::walker::{self, ExternalNodes, ModuleIndex, TypeWalk, WalkContext};

/// Coarse cancellation for a whole parse.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a successful parse.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseSummary {
    pub input: PathBuf,
    /// Module names of the input.
    pub modules: Vec<String>,
    /// Referenced modules opened and walked as externals.
    pub externals: Vec<String>,
    /// Solution projects left out for lack of build output.
    pub skipped_projects: Vec<String>,
    pub nodes: usize,
    pub links: usize,
    pub elapsed_ms: u128,
}

impl fmt::Display for ParseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} modules, {} externals, {} nodes, {} links in {}ms",
            self.modules.len(),
            self.externals.len(),
            self.nodes,
            self.links,
            self.elapsed_ms
        )?;
        if !self.skipped_projects.is_empty() {
            write!(f, " (skipped: {})", self.skipped_projects.join(", "))?;
        }
        Ok(())
    }
}

/// An opened module and where it sits in the graph.
struct OpenedModule {
    module: Module,
    prefix: String,
    search_dir: Option<PathBuf>,
}

/// Frozen state shared by the walking phases.
struct ParseContext<'a> {
    index: &'a SymbolIndex,
    modules: &'a ModuleIndex,
    externals: &'a ExternalNodes,
    sender: &'a ItemSender,
    cancel: &'a CancelToken,
}

impl<'a> ParseContext<'a> {
    fn walk_context(&self, opened: &'a OpenedModule) -> WalkContext<'a> {
        WalkContext {
            module: &opened.module,
            prefix: &opened.prefix,
            index: self.index,
            modules: self.modules,
            externals: self.externals,
            sender: self.sender,
        }
    }
}

/// Runs the four phases over one input.
pub struct Orchestrator {
    options: ParseOptions,
    cancel: CancelToken,
}

impl Orchestrator {
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    fn check_cancel(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(GraphError::Cancelled);
        }
        Ok(())
    }

    /// Parse `input`, streaming items into `sender`. The sender is dropped on return,
    /// which completes the stream.
    pub fn run(&self, input: &Path, sender: ItemSender) -> Result<ParseSummary> {
        let started = Instant::now();
        let kind = InputKind::detect(input)?;
        let workers = self.options.worker_count();
        info!(input = %input.display(), kind = kind.name(), mode = ?self.options.mode, workers, "parse started");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("depgraph-worker-{i}"))
            .build()
            .map_err(|e| GraphError::Pool(e.to_string()))?;

        let plan = resolver::plan(input, kind, &self.options)?;
        self.check_cancel()?;

        // ─── Phase 1: open ───
        for node in &plan.hierarchy {
            sender.node(node.clone());
        }
        let opened = pool.install(|| {
            plan.modules
                .par_iter()
                .map(|planned| {
                    self.check_cancel()?;
                    self.open(planned)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let mut index = SymbolIndex::new();
        let mut modules = ModuleIndex::new(plan.externals_root.clone(), self.options.filter.clone());
        let mut internal: Vec<OpenedModule> = Vec::with_capacity(opened.len());
        for (planned, (module, exports)) in plan.modules.iter().zip(opened) {
            let name = module.module.module_name().to_string();
            if modules.is_opened(&name) {
                warn!(module = %name, "module appears twice in the input, keeping the first");
                continue;
            }
            sender.node(Node::new(module.prefix.clone(), planned.parent.clone(), NodeKind::Module));
            modules.insert(name.clone(), module.prefix.clone(), true);
            index.add(exports, module.module.references().to_vec());
            internal.push(module);
        }
        info!(modules = internal.len(), skipped = plan.skipped_projects.len(), "opened modules");
        self.check_cancel()?;

        // ─── Phase 2: reference edges ───
        let externals = ExternalNodes::new();
        let mut external: Vec<OpenedModule> = Vec::new();
        if self.options.include_external_references {
            let refs: Vec<ModuleRefs> = internal.iter().map(module_refs).collect();
            let located = resolver::locate_externals(&refs, &modules, &self.options.filter);
            let results = pool.install(|| {
                located
                    .par_iter()
                    .map(|(name, path)| (name, BinaryModule::open(path, self.options.include_debug_symbols)))
                    .collect::<Vec<_>>()
            });
            for (name, result) in results {
                match result {
                    Ok(module) => {
                        let module = Module::Binary(module);
                        let prefix = modules.module_prefix(module.module_name());
                        externals.ensure_module(&sender, &modules, module.module_name());
                        index.add(module.exports(), module.references().to_vec());
                        external.push(OpenedModule {
                            module,
                            prefix,
                            search_dir: None,
                        });
                    }
                    Err(e) => warn!(reference = %name, error = %e, "skipping external module"),
                }
            }
            for module in &external {
                modules.insert(module.module.module_name(), module.prefix.clone(), false);
            }
        }
        let mut reference_links = 0;
        for module in &internal {
            reference_links += resolver::emit_reference_links(&module_refs(module), &modules, &sender);
        }
        info!(externals = external.len(), links = reference_links, "resolved references");
        self.check_cancel()?;

        let all: Vec<&OpenedModule> = internal.iter().chain(&external).collect();
        let ctx = ParseContext {
            index: &index,
            modules: &modules,
            externals: &externals,
            sender: &sender,
            cancel: &self.cancel,
        };

        // ─── Phase 3: types ───
        let walks: Vec<Option<TypeWalk>> = pool.install(|| {
            all.par_iter()
                .map(|opened| {
                    if ctx.cancel.is_cancelled() {
                        return None;
                    }
                    Some(walker::walk_types(&ctx.walk_context(*opened)))
                })
                .collect()
        });
        self.check_cancel()?;
        info!(types = walks.iter().flatten().map(TypeWalk::node_count).sum::<usize>(), "walked types");

        // ─── Phase 4: members ───
        let members: usize = pool.install(|| {
            all.par_iter()
                .zip(walks.par_iter())
                .map(|(opened, walk)| match walk {
                    Some(walk) if !ctx.cancel.is_cancelled() => {
                        walker::walk_members(&ctx.walk_context(*opened), walk)
                    }
                    _ => 0,
                })
                .sum()
        });
        self.check_cancel()?;

        let summary = ParseSummary {
            input: input.to_path_buf(),
            modules: internal.iter().map(|m| m.module.module_name().to_string()).collect(),
            externals: external.iter().map(|m| m.module.module_name().to_string()).collect(),
            skipped_projects: plan.skipped_projects,
            nodes: sender.counters().nodes(),
            links: sender.counters().links(),
            elapsed_ms: started.elapsed().as_millis(),
        };
        info!(members, nodes = summary.nodes, links = summary.links, elapsed_ms = summary.elapsed_ms as u64, "parse finished");
        Ok(summary)
    }

    fn open(&self, planned: &PlannedModule) -> Result<(OpenedModule, ExportTable)> {
        let include_locations = self.options.include_debug_symbols;
        let module = match &planned.source {
            ModuleSource::Binary(path) => Module::Binary(BinaryModule::open(path, include_locations)?),
            ModuleSource::Source {
                name,
                references,
                files,
            } => Module::Source(SourceModule::open(
                name.clone(),
                references.clone(),
                files,
                include_locations,
            )?),
        };
        let exports = module.exports();
        let prefix = names::join(&planned.parent, &names::module_segment(module.module_name()));
        debug!(module = module.module_name(), prefix = %prefix, project = ?planned.project, "opened");
        Ok((
            OpenedModule {
                module,
                prefix,
                search_dir: planned.search_dir.clone(),
            },
            exports,
        ))
    }
}

fn module_refs(module: &OpenedModule) -> ModuleRefs<'_> {
    ModuleRefs {
        name: module.module.module_name(),
        prefix: &module.prefix,
        references: module.module.references(),
        search_dir: module.search_dir.as_deref(),
    }
}
