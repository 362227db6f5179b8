//! Error types for the extraction engine.
//!
//! Only fatal conditions surface here. Problems with a single type or
//! member are logged and skipped by the walkers instead.

use std::path::PathBuf;

/// Unified error type for a parse invocation.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("file type not supported: {}", .0.display())]
    UnsupportedFileType(PathBuf),

    #[error("module not found: {}", .0.display())]
    ModuleNotFound(PathBuf),

    #[error("project {project} has no build output")]
    NoBuildOutput { project: String },

    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed module {}: {reason}", path.display())]
    BadImage { path: PathBuf, reason: String },

    #[error("malformed solution {}: {reason}", path.display())]
    BadSolution { path: PathBuf, reason: String },

    #[error("malformed project {}: {reason}", path.display())]
    BadProject { path: PathBuf, reason: String },

    #[error("parse cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("worker pool error: {0}")]
    Pool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;

impl GraphError {
    /// Wrap an I/O failure on a specific input, keeping the path.
    pub fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            GraphError::ModuleNotFound(path)
        } else {
            GraphError::Open { path, source }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_maps_to_module_not_found() {
        let err = GraphError::open(
            "a/b.dll",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, GraphError::ModuleNotFound(_)));
        assert_eq!(err.to_string(), "module not found: a/b.dll");
    }

    #[test]
    fn test_no_build_output_names_project() {
        let err = GraphError::NoBuildOutput {
            project: "App.Core".to_string(),
        };
        assert_eq!(err.to_string(), "project App.Core has no build output");
    }

    #[test]
    fn test_locked_file_keeps_io_source() {
        let err = GraphError::open(
            "x.dll",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked"),
        );
        assert!(matches!(err, GraphError::Open { .. }));
    }
}
