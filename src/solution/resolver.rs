//! Reference resolver: input planning, the parent hierarchy and
//! module-to-module edges.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::project::ProjectFile;
use super::sln::Solution;
use crate::config::{ModuleFilter, ParseMode, ParseOptions};
use crate::error::{GraphError, Result};
use crate::graph::channel::ItemSender;
use crate::graph::types::{LinkKind, Node, NodeKind};
use crate::names;
use crate::parser::InputKind;
use crate::walker::{LinkDedup, ModuleIndex};

/// How a module is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSource {
    Binary(PathBuf),
    Source {
        name: String,
        references: Vec<String>,
        files: Vec<PathBuf>,
    },
}

/// One module of the input, ready to open.
#[derive(Debug, Clone)]
pub struct PlannedModule {
    /// Parent node name: the solution, a folder chain, or empty.
    pub parent: String,
    pub source: ModuleSource,
    /// Where referenced modules are looked for.
    pub search_dir: Option<PathBuf>,
    pub project: Option<String>,
}

/// What the open phase works from.
#[derive(Debug, Default)]
pub struct InputPlan {
    /// Solution and folder nodes, parents first.
    pub hierarchy: Vec<Node>,
    pub modules: Vec<PlannedModule>,
    pub skipped_projects: Vec<String>,
    pub externals_root: String,
}

/// Turn an input path into the list of modules to open.
pub fn plan(input: &Path, kind: InputKind, options: &ParseOptions) -> Result<InputPlan> {
    match kind {
        InputKind::Module => {
            if !input.is_file() {
                return Err(GraphError::ModuleNotFound(input.to_path_buf()));
            }
            Ok(InputPlan {
                modules: vec![PlannedModule {
                    parent: String::new(),
                    source: ModuleSource::Binary(input.to_path_buf()),
                    search_dir: input.parent().map(Path::to_path_buf),
                    project: None,
                }],
                externals_root: names::EXTERNALS.to_string(),
                ..InputPlan::default()
            })
        }
        InputKind::Project => {
            let project = ProjectFile::read(input)?;
            let module = plan_project(&project, String::new(), options, &HashMap::new())
                .ok_or_else(|| GraphError::NoBuildOutput {
                    project: project.name().to_string(),
                })?;
            Ok(InputPlan {
                modules: vec![module],
                externals_root: names::EXTERNALS.to_string(),
                ..InputPlan::default()
            })
        }
        InputKind::Solution => plan_solution(&Solution::read(input)?, options),
    }
}

fn plan_solution(solution: &Solution, options: &ParseOptions) -> Result<InputPlan> {
    let root = names::module_segment(&solution.name);
    let mut plan = InputPlan {
        hierarchy: vec![Node::new(root.clone(), "", NodeKind::Solution)],
        externals_root: names::join(&root, names::EXTERNALS),
        ..InputPlan::default()
    };

    let projects = solution
        .projects
        .iter()
        .map(|p| ProjectFile::read(&p.path))
        .collect::<Result<Vec<_>>>()?;
    let assemblies: HashMap<PathBuf, String> = projects
        .iter()
        .map(|p| (p.path.clone(), p.assembly_name.clone()))
        .collect();

    let mut folders = FolderTree::default();
    for (entry, project) in solution.projects.iter().zip(&projects) {
        // the folder chain is only materialized for projects that are kept
        let parent = folder_name(&root, &entry.folders);
        match plan_project(project, parent, options, &assemblies) {
            Some(module) => {
                folders.ensure(&root, &entry.folders, &mut plan.hierarchy);
                plan.modules.push(module);
            }
            None => {
                warn!(project = %entry.name, path = %project.path.display(), "no build output, skipping project");
                plan.skipped_projects.push(entry.name.clone());
            }
        }
    }
    Ok(plan)
}

/// `None` when binary mode finds no build output.
fn plan_project(
    project: &ProjectFile,
    parent: String,
    options: &ParseOptions,
    assemblies: &HashMap<PathBuf, String>,
) -> Option<PlannedModule> {
    let output = project.build_output();
    let search_dir = output.as_deref().and_then(Path::parent).map(Path::to_path_buf);
    let source = match options.mode {
        ParseMode::Binary => ModuleSource::Binary(output?),
        ParseMode::Source => ModuleSource::Source {
            name: project.assembly_name.clone(),
            references: project_references(project, assemblies),
            files: project.source_files(),
        },
    };
    Some(PlannedModule {
        parent,
        source,
        search_dir,
        project: Some(project.name().to_string()),
    })
}

/// Assembly names a source project can see.
fn project_references(project: &ProjectFile, assemblies: &HashMap<PathBuf, String>) -> Vec<String> {
    let mut references: Vec<String> = project
        .project_references
        .iter()
        .map(|path| {
            assemblies.get(path).cloned().unwrap_or_else(|| {
                ProjectFile::read(path)
                    .map(|p| p.assembly_name)
                    .unwrap_or_else(|_| {
                        path.file_stem()
                            .and_then(|s| s.to_str())
                            .unwrap_or_default()
                            .to_string()
                    })
            })
        })
        .collect();
    references.extend(project.references.iter().cloned());
    references.extend(project.package_references.iter().cloned());
    references.retain(|r| !r.is_empty());
    let mut seen = HashSet::new();
    references.retain(|r| seen.insert(r.clone()));
    references
}

fn folder_name(root: &str, folders: &[String]) -> String {
    folders
        .iter()
        .fold(root.to_string(), |name, folder| {
            names::join(&name, &names::module_segment(folder))
        })
}

/// Solution folder nodes, created on first use.
#[derive(Default)]
struct FolderTree {
    seen: HashSet<String>,
}

impl FolderTree {
    fn ensure(&mut self, root: &str, folders: &[String], out: &mut Vec<Node>) {
        let mut parent = root.to_string();
        for folder in folders {
            let name = names::join(&parent, &names::module_segment(folder));
            if self.seen.insert(name.clone()) {
                out.push(Node::new(name.clone(), parent, NodeKind::SolutionFolder));
            }
            parent = name;
        }
    }
}

// ─── References ─────────────────────────────────────────────────────

/// A module as the reference phase sees it.
pub struct ModuleRefs<'a> {
    pub name: &'a str,
    pub prefix: &'a str,
    pub references: &'a [String],
    pub search_dir: Option<&'a Path>,
}

/// Referenced modules to open as externals: `{dir}/{name}.dll`, once per name.
pub fn locate_externals(
    internal: &[ModuleRefs],
    modules: &ModuleIndex,
    filter: &ModuleFilter,
) -> Vec<(String, PathBuf)> {
    let mut found = Vec::new();
    let mut seen = HashSet::new();
    for module in internal {
        for reference in module.references {
            if modules.is_opened(reference) || filter.is_ignored(reference) {
                continue;
            }
            if !seen.insert(reference.clone()) {
                continue;
            }
            let candidate = module
                .search_dir
                .map(|dir| dir.join(format!("{reference}.dll")))
                .filter(|path| path.is_file());
            match candidate {
                Some(path) => found.push((reference.clone(), path)),
                None => {
                    // another module may still find it
                    seen.remove(reference);
                    debug!(module = module.name, reference = %reference, "reference not found");
                }
            }
        }
    }
    found
}

/// Module-to-module `Reference` links toward internal and opened external modules.
pub fn emit_reference_links(module: &ModuleRefs, modules: &ModuleIndex, sender: &ItemSender) -> usize {
    let mut dedup = LinkDedup::new(sender, module.prefix);
    let mut emitted = 0;
    for reference in module.references {
        let Some(entry) = modules.get(reference) else {
            continue;
        };
        let kind = if entry.internal {
            NodeKind::Module
        } else {
            NodeKind::External
        };
        if entry.prefix != module.prefix && dedup.link(entry.prefix.clone(), kind, LinkKind::Reference) {
            emitted += 1;
        }
    }
    emitted
}
