//! Project file reader and build-output discovery.

use ignore::WalkBuilder;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::parser::language::is_csharp_source;

/// Directories that hold build products rather than sources.
const BUILD_DIRS: &[&str] = &["bin", "obj"];

/// The parts of a `.csproj` the engine needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectFile {
    pub path: PathBuf,
    pub assembly_name: String,
    pub root_namespace: Option<String>,
    pub output_type: Option<String>,
    /// Referenced project files, absolute.
    pub project_references: Vec<PathBuf>,
    /// `Reference` items, version and culture stripped.
    pub references: Vec<String>,
    pub package_references: Vec<String>,
}

impl ProjectFile {
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| GraphError::open(path, e))?;
        Self::parse(path, &text)
    }

    /// Parse project XML. Element names are matched without their namespace.
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(text).map_err(|e| GraphError::BadProject {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let property = |tag: &str| {
            doc.descendants()
                .filter(|n| n.has_tag_name(tag))
                .filter_map(|n| n.text())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .last()
                .map(str::to_string)
        };
        let includes = |tag: &str| -> Vec<String> {
            doc.descendants()
                .filter(|n| n.has_tag_name(tag))
                .filter_map(|n| n.attribute("Include"))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };

        let project = Self {
            path: path.to_path_buf(),
            assembly_name: property("AssemblyName").unwrap_or(stem),
            root_namespace: property("RootNamespace"),
            output_type: property("OutputType"),
            project_references: includes("ProjectReference")
                .into_iter()
                .map(|p| normalize(&dir.join(p.replace('\\', "/"))))
                .collect(),
            references: includes("Reference")
                .into_iter()
                .map(|r| r.split(',').next().unwrap_or_default().trim().to_string())
                .collect(),
            package_references: includes("PackageReference"),
        };
        debug!(
            project = %project.assembly_name,
            project_references = project.project_references.len(),
            references = project.references.len(),
            packages = project.package_references.len(),
            "read project"
        );
        Ok(project)
    }

    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// File name of the project without its extension.
    pub fn name(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.assembly_name)
    }

    /// Newest `{AssemblyName}.dll` or `.exe` under `bin/`.
    pub fn build_output(&self) -> Option<PathBuf> {
        let bin = self.dir().join("bin");
        if !bin.is_dir() {
            return None;
        }
        let wanted: Vec<String> = ["dll", "exe"]
            .iter()
            .map(|ext| format!("{}.{ext}", self.assembly_name).to_ascii_lowercase())
            .collect();

        WalkBuilder::new(&bin)
            .standard_filters(false)
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| wanted.contains(&name.to_ascii_lowercase()))
            })
            .map(|entry| {
                let modified = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, entry.into_path())
            })
            .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)))
            .map(|(_, path)| path)
    }

    /// Every `.cs` file below the project directory outside `bin/` and `obj/`.
    pub fn source_files(&self) -> Vec<PathBuf> {
        let root = self.dir().to_path_buf();
        let mut files: Vec<PathBuf> = WalkBuilder::new(&root)
            .standard_filters(false)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                !(is_dir
                    && entry.depth() > 0
                    && entry.file_name().to_str().is_some_and(|name| {
                        BUILD_DIRS.iter().any(|b| name.eq_ignore_ascii_case(b))
                    }))
            })
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .filter(|entry| is_csharp_source(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        files.sort();
        files
    }
}

/// Resolve `.` and `..` without touching the file system.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSPROJ: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <OutputType>Exe</OutputType>
    <AssemblyName>App.Cli</AssemblyName>
    <RootNamespace>App</RootNamespace>
  </PropertyGroup>
  <ItemGroup>
    <ProjectReference Include="..\Core\Core.csproj" />
    <Reference Include="Vendor.Lib, Version=1.0.0.0, Culture=neutral" />
    <PackageReference Include="Newtonsoft.Json" Version="13.0.1" />
  </ItemGroup>
</Project>"#;

    #[test]
    fn test_parse_project_properties() {
        let project = ProjectFile::parse(Path::new("/w/src/Cli/Cli.csproj"), CSPROJ).unwrap();
        assert_eq!(project.assembly_name, "App.Cli");
        assert_eq!(project.name(), "Cli");
        assert_eq!(project.root_namespace.as_deref(), Some("App"));
        assert_eq!(project.output_type.as_deref(), Some("Exe"));
        assert_eq!(project.project_references, vec![PathBuf::from("/w/src/Core/Core.csproj")]);
        assert_eq!(project.references, vec!["Vendor.Lib".to_string()]);
        assert_eq!(project.package_references, vec!["Newtonsoft.Json".to_string()]);
    }

    #[test]
    fn test_legacy_namespaced_project() {
        let text = r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="15.0" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <PropertyGroup><AssemblyName>Legacy</AssemblyName></PropertyGroup>
</Project>"#;
        let project = ProjectFile::parse(Path::new("Old.csproj"), text).unwrap();
        assert_eq!(project.assembly_name, "Legacy");
    }

    #[test]
    fn test_assembly_name_defaults_to_file_stem() {
        let project = ProjectFile::parse(Path::new("Core.csproj"), "<Project />").unwrap();
        assert_eq!(project.assembly_name, "Core");
        assert!(matches!(
            ProjectFile::parse(Path::new("Bad.csproj"), "<Project>"),
            Err(GraphError::BadProject { .. })
        ));
    }

    #[test]
    fn test_build_output_and_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Core.csproj");
        std::fs::write(&path, "<Project />").unwrap();
        std::fs::write(dir.path().join("A.cs"), "class A {}").unwrap();
        std::fs::create_dir_all(dir.path().join("Sub")).unwrap();
        std::fs::write(dir.path().join("Sub").join("B.cs"), "class B {}").unwrap();
        std::fs::create_dir_all(dir.path().join("obj").join("Debug")).unwrap();
        std::fs::write(dir.path().join("obj").join("Debug").join("Gen.cs"), "").unwrap();

        let project = ProjectFile::read(&path).unwrap();
        assert!(project.build_output().is_none());
        let files = project.source_files();
        assert_eq!(files, vec![dir.path().join("A.cs"), dir.path().join("Sub").join("B.cs")]);

        let out = dir.path().join("bin").join("Debug").join("net8.0");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("Core.dll"), b"MZ").unwrap();
        std::fs::write(out.join("Other.dll"), b"MZ").unwrap();
        assert_eq!(project.build_output(), Some(out.join("Core.dll")));
    }
}
