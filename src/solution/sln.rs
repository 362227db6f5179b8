//! `.sln` reader: projects, solution folders and their nesting.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{GraphError, Result};

/// Project type of a solution folder.
const FOLDER_TYPE: &str = "2150E333-8FDC-42A3-9474-1A3956D46DE8";

const PROJECT_EXTENSIONS: &[&str] = &["csproj", "vbproj", "fsproj"];

/// A project listed in a solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionProject {
    pub name: String,
    pub path: PathBuf,
    pub guid: String,
    /// Solution folder names, outermost first.
    pub folders: Vec<String>,
}

/// A parsed solution file.
#[derive(Debug, Clone)]
pub struct Solution {
    pub path: PathBuf,
    pub name: String,
    pub projects: Vec<SolutionProject>,
}

struct Entry {
    name: String,
    path: String,
    guid: String,
    is_folder: bool,
}

impl Solution {
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| GraphError::open(path, e))?;
        Self::parse(path, &text)
    }

    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Solution")
            .to_string();

        let mut entries = Vec::new();
        // child guid → parent guid
        let mut nesting: HashMap<String, String> = HashMap::new();
        let mut in_nested = false;

        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.starts_with("Project(") {
                let entry = parse_project_line(line).ok_or_else(|| GraphError::BadSolution {
                    path: path.to_path_buf(),
                    reason: format!("line {}: malformed Project entry", number + 1),
                })?;
                entries.push(entry);
            } else if line.starts_with("GlobalSection(NestedProjects)") {
                in_nested = true;
            } else if line.starts_with("EndGlobalSection") {
                in_nested = false;
            } else if in_nested {
                if let Some((child, parent)) = line.split_once('=') {
                    nesting.insert(normalize_guid(child), normalize_guid(parent));
                }
            }
        }

        let folders: HashMap<&str, &str> = entries
            .iter()
            .filter(|e| e.is_folder)
            .map(|e| (e.guid.as_str(), e.name.as_str()))
            .collect();

        let projects: Vec<SolutionProject> = entries
            .iter()
            .filter(|e| !e.is_folder && is_project_file(&e.path))
            .map(|e| SolutionProject {
                name: e.name.clone(),
                path: dir.join(e.path.replace('\\', "/")),
                guid: e.guid.clone(),
                folders: folder_chain(&e.guid, &nesting, &folders),
            })
            .collect();

        debug!(solution = %name, projects = projects.len(), folders = folders.len(), "read solution");
        Ok(Self {
            path: path.to_path_buf(),
            name,
            projects,
        })
    }
}

/// `Project("{type}") = "Name", "rel\path.csproj", "{guid}"`
fn parse_project_line(line: &str) -> Option<Entry> {
    let (head, tail) = line.split_once('=')?;
    let kind = head.split('"').nth(1)?;
    let fields: Vec<&str> = tail
        .split(',')
        .map(|f| f.trim().trim_matches('"'))
        .collect();
    if fields.len() < 3 {
        return None;
    }
    Some(Entry {
        name: fields[0].to_string(),
        path: fields[1].to_string(),
        guid: normalize_guid(fields[2]),
        is_folder: normalize_guid(kind) == FOLDER_TYPE,
    })
}

fn normalize_guid(text: &str) -> String {
    text.trim()
        .trim_matches(|c| c == '{' || c == '}')
        .to_ascii_uppercase()
}

fn is_project_file(path: &str) -> bool {
    Path::new(&path.replace('\\', "/"))
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| PROJECT_EXTENSIONS.iter().any(|p| ext.eq_ignore_ascii_case(p)))
}

fn folder_chain(
    guid: &str,
    nesting: &HashMap<String, String>,
    folders: &HashMap<&str, &str>,
) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = guid;
    while let Some(parent) = nesting.get(current) {
        let Some(name) = folders.get(parent.as_str()) else {
            break;
        };
        // a cycle in NestedProjects would otherwise never end
        if chain.len() > folders.len() {
            break;
        }
        chain.push(name.to_string());
        current = parent;
    }
    chain.reverse();
    chain
}
