//! Change monitor: which files feed a parse, and when they last changed.
//!
//! The engine never watches anything itself. A caller polls
//! [`newest_data_time`] and re-parses when it moves.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{ParseMode, ParseOptions};
use crate::error::Result;
use crate::parser::binary::BinaryModule;
use crate::parser::{InputKind, SymbolAdapter};
use crate::solution::{ProjectFile, Solution};

/// Every file whose change should trigger a re-parse, sorted and unique.
pub fn relevant_files(input: &Path, options: &ParseOptions) -> Result<Vec<PathBuf>> {
    let mut files = BTreeSet::new();
    files.insert(input.to_path_buf());
    match InputKind::detect(input)? {
        InputKind::Module => add_module_files(input, &mut files),
        InputKind::Project => add_project_files(&ProjectFile::read(input)?, options, &mut files),
        InputKind::Solution => {
            let solution = Solution::read(input)?;
            for entry in &solution.projects {
                let project = ProjectFile::read(&entry.path)?;
                add_project_files(&project, options, &mut files);
            }
        }
    }
    debug!(input = %input.display(), files = files.len(), "collected relevant files");
    Ok(files.into_iter().collect())
}

/// Newest modification time among the relevant files that exist.
pub fn newest_data_time(input: &Path, options: &ParseOptions) -> Result<Option<DateTime<Utc>>> {
    let newest = relevant_files(input, options)?
        .iter()
        .filter_map(|path| std::fs::metadata(path).ok())
        .filter_map(|meta| meta.modified().ok())
        .max()
        .map(DateTime::<Utc>::from);
    Ok(newest)
}

fn add_project_files(project: &ProjectFile, options: &ParseOptions, files: &mut BTreeSet<PathBuf>) {
    files.insert(project.path.clone());
    match options.mode {
        ParseMode::Binary => {
            if let Some(output) = project.build_output() {
                add_module_files(&output, files);
            }
        }
        ParseMode::Source => files.extend(project.source_files()),
    }
}

/// The module, its `.pdb` and `.xml` siblings, and references found next to it.
fn add_module_files(module: &Path, files: &mut BTreeSet<PathBuf>) {
    files.insert(module.to_path_buf());
    for ext in ["pdb", "xml"] {
        let sibling = module.with_extension(ext);
        if sibling.is_file() {
            files.insert(sibling);
        }
    }
    let Some(dir) = module.parent() else {
        return;
    };
    match BinaryModule::open(module, false) {
        Ok(opened) => {
            for reference in opened.references() {
                let candidate = dir.join(format!("{reference}.dll"));
                if candidate.is_file() {
                    files.insert(candidate);
                }
            }
        }
        Err(e) => debug!(module = %module.display(), error = %e, "references not read"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;

    #[test]
    fn test_source_project_files() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("App.csproj");
        std::fs::write(&project, "<Project />").unwrap();
        std::fs::write(dir.path().join("B.cs"), "class B {}").unwrap();
        std::fs::write(dir.path().join("A.cs"), "class A {}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = relevant_files(&project, &ParseOptions::source()).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("A.cs"), project.clone(), dir.path().join("B.cs")]
        );
        assert!(newest_data_time(&project, &ParseOptions::source()).unwrap().is_some());
    }

    #[test]
    fn test_binary_project_includes_output_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("App.csproj");
        std::fs::write(&project, "<Project />").unwrap();
        let out = dir.path().join("bin").join("Debug");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("App.dll"), b"not a module").unwrap();
        std::fs::write(out.join("App.xml"), "<doc />").unwrap();

        let files = relevant_files(&project, &ParseOptions::default()).unwrap();
        assert!(files.contains(&out.join("App.dll")));
        assert!(files.contains(&out.join("App.xml")));
        assert!(!files.contains(&out.join("App.pdb")));
    }

    #[test]
    fn test_missing_inputs() {
        let options = ParseOptions::default();
        assert!(matches!(
            relevant_files(Path::new("a.txt"), &options),
            Err(GraphError::UnsupportedFileType(_))
        ));
        let files = relevant_files(Path::new("/nonexistent/App.dll"), &options).unwrap();
        assert_eq!(files, vec![PathBuf::from("/nonexistent/App.dll")]);
        assert_eq!(newest_data_time(Path::new("/nonexistent/App.dll"), &options).unwrap(), None);
    }
}
