//! Input detection and tree-sitter grammar loading.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tree_sitter::{Language, Parser};

use crate::error::{GraphError, Result};

/// Kinds of input the engine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputKind {
    /// A `.sln` solution file.
    Solution,
    /// A single `.csproj`/`.vbproj`/`.fsproj` project file.
    Project,
    /// A compiled `.dll` or `.exe`.
    Module,
}

impl InputKind {
    /// Detect input kind from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "sln" => Some(InputKind::Solution),
            "csproj" | "vbproj" | "fsproj" => Some(InputKind::Project),
            "dll" | "exe" => Some(InputKind::Module),
            _ => None,
        }
    }

    /// Like [`InputKind::from_path`], failing with `UnsupportedFileType`.
    pub fn detect(path: &Path) -> Result<Self> {
        Self::from_path(path).ok_or_else(|| GraphError::UnsupportedFileType(path.to_path_buf()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            InputKind::Solution => "solution",
            InputKind::Project => "project",
            InputKind::Module => "module",
        }
    }
}

/// True for C# source files.
pub fn is_csharp_source(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("cs"))
}

/// The C# grammar.
pub fn csharp_language() -> Language {
    tree_sitter_c_sharp::LANGUAGE.into()
}

/// A parser configured for C#.
pub fn csharp_parser() -> std::result::Result<Parser, String> {
    let mut parser = Parser::new();
    parser
        .set_language(&csharp_language())
        .map_err(|e| e.to_string())?;
    Ok(parser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_inputs() {
        assert_eq!(InputKind::from_path(Path::new("a/App.sln")), Some(InputKind::Solution));
        assert_eq!(InputKind::from_path(Path::new("App.csproj")), Some(InputKind::Project));
        assert_eq!(InputKind::from_path(Path::new("App.DLL")), Some(InputKind::Module));
        assert_eq!(InputKind::from_path(Path::new("app.exe")), Some(InputKind::Module));
        assert!(InputKind::from_path(Path::new("readme.md")).is_none());
        assert!(matches!(
            InputKind::detect(Path::new("noext")),
            Err(GraphError::UnsupportedFileType(_))
        ));
    }

    #[test]
    fn test_csharp_parser_loads() {
        let mut parser = csharp_parser().unwrap();
        let tree = parser.parse("class A {}", None).unwrap();
        assert_eq!(tree.root_node().kind(), "compilation_unit");
        assert!(is_csharp_source(Path::new("x/A.cs")));
    }
}
