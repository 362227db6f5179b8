//! Configuration for a parse invocation.
//!
//! Loads/saves a TOML config at `<input dir>/.depgraph/config.toml`
//! and turns it into the [`ParseOptions`] the engine runs with.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{GraphError, Result};

/// Which backend reads a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// Read compiled build output (metadata + IL).
    #[default]
    Binary,
    /// Read C# source files of each project.
    Source,
}

/// Persistent engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepgraphConfig {
    /// Attach file/line locations to nodes.
    pub include_debug_symbols: bool,
    /// Also open and walk referenced modules that are not part of the input.
    pub include_external_references: bool,
    /// Backend used for project inputs.
    pub mode: ParseMode,
    /// Worker pool size override. Defaults to available parallelism minus one.
    pub workers: Option<usize>,
    /// Module name patterns whose types never become link targets.
    /// A trailing `*` matches any suffix.
    pub ignored_modules: Vec<String>,
}

impl Default for DepgraphConfig {
    fn default() -> Self {
        Self {
            include_debug_symbols: false,
            include_external_references: false,
            mode: ParseMode::Binary,
            workers: None,
            ignored_modules: default_ignored_modules(),
        }
    }
}

fn default_ignored_modules() -> Vec<String> {
    [
        "mscorlib",
        "netstandard",
        "System",
        "System.*",
        "Microsoft.*",
        "WindowsBase",
        "PresentationCore",
        "PresentationFramework",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl DepgraphConfig {
    /// Load configuration, falling back to defaults if the file is absent or broken.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load_strict(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                Self::default()
            }
        }
    }

    /// Load configuration, reporting any read or parse failure.
    pub fn load_strict(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| GraphError::Config(e.to_string()))
    }

    /// Save configuration to the given path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| GraphError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Config path that belongs to an input file: `<dir>/.depgraph/config.toml`.
    pub fn path_for_input(input: &Path) -> PathBuf {
        input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .join(".depgraph")
            .join("config.toml")
    }

    pub fn to_options(&self) -> ParseOptions {
        ParseOptions {
            include_debug_symbols: self.include_debug_symbols,
            include_external_references: self.include_external_references,
            mode: self.mode,
            workers: self.workers,
            filter: ModuleFilter::new(self.ignored_modules.clone()),
        }
    }
}

/// Effective options for one parse invocation.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub include_debug_symbols: bool,
    pub include_external_references: bool,
    pub mode: ParseMode,
    pub workers: Option<usize>,
    pub filter: ModuleFilter,
}

impl Default for ParseOptions {
    fn default() -> Self {
        DepgraphConfig::default().to_options()
    }
}

impl ParseOptions {
    pub fn source() -> Self {
        Self {
            mode: ParseMode::Source,
            ..Self::default()
        }
    }

    pub fn with_debug_symbols(mut self, on: bool) -> Self {
        self.include_debug_symbols = on;
        self
    }

    pub fn with_external_references(mut self, on: bool) -> Self {
        self.include_external_references = on;
        self
    }

    /// Pool size: explicit override, else available parallelism minus one (at least 1).
    pub fn worker_count(&self) -> usize {
        match self.workers {
            Some(n) => n.max(1),
            None => std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
                .max(1),
        }
    }
}

/// Name-based deny table for system modules.
#[derive(Debug, Clone, Default)]
pub struct ModuleFilter {
    patterns: Vec<String>,
}

impl ModuleFilter {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    pub fn is_ignored(&self, module: &str) -> bool {
        self.patterns.iter().any(|pattern| match pattern.strip_suffix('*') {
            Some(prefix) => module
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix)),
            None => module.eq_ignore_ascii_case(pattern),
        })
    }
}
