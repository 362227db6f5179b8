//! Command-line surface for depgraph.
//!
//! Commands:
//! - Parse: parse (JSON lines), stats
//! - Source: source, node-for
//! - Monitor: files, newest
//! - Config: init

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{DepgraphConfig, ParseMode, ParseOptions};

#[derive(Parser)]
#[command(name = "depgraph")]
#[command(about = "Dependency graphs for .NET solutions, projects and modules")]
pub struct Cli {
    /// Config file (default: <input dir>/.depgraph/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Input and the switches every parsing command shares.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Solution (.sln), project (.csproj/.vbproj/.fsproj) or module (.dll/.exe)
    pub input: PathBuf,

    /// Read C# sources instead of build output
    #[arg(long)]
    pub source: bool,

    /// Attach file and line locations to nodes
    #[arg(long)]
    pub debug_symbols: bool,

    /// Also walk referenced modules found next to the build output
    #[arg(long)]
    pub external: bool,
}

impl InputArgs {
    /// Config file values, overridden by any switch given on the command line.
    pub fn options(&self, config: Option<&Path>) -> ParseOptions {
        let path = config
            .map(Path::to_path_buf)
            .unwrap_or_else(|| DepgraphConfig::path_for_input(&self.input));
        let mut options = DepgraphConfig::load(&path).to_options();
        if self.source {
            options.mode = ParseMode::Source;
        }
        options.include_debug_symbols |= self.debug_symbols;
        options.include_external_references |= self.external;
        options
    }
}

#[derive(Subcommand)]
pub enum Commands {
    // ─── Parse ────────────────────────────────────────────────────
    /// Stream graph items as JSON lines
    Parse {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Parse and print graph statistics
    Stats {
        #[command(flatten)]
        input: InputArgs,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    // ─── Source ───────────────────────────────────────────────────
    /// Show the source file of a node
    Source {
        #[command(flatten)]
        input: InputArgs,

        /// Full node name
        node: String,
    },

    /// Find the node declared at a file position
    NodeFor {
        #[command(flatten)]
        input: InputArgs,

        /// Source file path
        file: PathBuf,

        /// 1-based line number
        line: usize,
    },

    // ─── Monitor ──────────────────────────────────────────────────
    /// List the files whose change invalidates a parse
    Files {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Print the newest modification time among those files
    Newest {
        #[command(flatten)]
        input: InputArgs,
    },

    // ─── Config ───────────────────────────────────────────────────
    /// Write a default config file next to the input
    Init {
        /// Input whose config should be created
        input: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("App.sln");
        let config_path = DepgraphConfig::path_for_input(&input);
        DepgraphConfig {
            include_external_references: true,
            ..DepgraphConfig::default()
        }
        .save(&config_path)
        .unwrap();

        let cli = Cli::try_parse_from([
            "depgraph",
            "stats",
            input.to_str().unwrap(),
            "--source",
            "--debug-symbols",
        ])
        .unwrap();
        let Commands::Stats { input: args, json } = cli.command else {
            panic!("expected stats");
        };
        assert!(!json);
        let options = args.options(cli.config.as_deref());
        assert_eq!(options.mode, ParseMode::Source);
        assert!(options.include_debug_symbols);
        assert!(options.include_external_references);
    }

    #[test]
    fn test_explicit_config_path() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("custom.toml");
        std::fs::write(&config_path, "mode = \"source\"\n").unwrap();

        let cli = Cli::try_parse_from([
            "depgraph",
            "--config",
            config_path.to_str().unwrap(),
            "files",
            "App.sln",
        ])
        .unwrap();
        let Commands::Files { input } = cli.command else {
            panic!("expected files");
        };
        assert_eq!(input.options(cli.config.as_deref()).mode, ParseMode::Source);
    }

    #[test]
    fn test_node_for_arguments() {
        let cli = Cli::try_parse_from(["depgraph", "node-for", "App.sln", "src/A.cs", "12"]).unwrap();
        let Commands::NodeFor { file, line, .. } = cli.command else {
            panic!("expected node-for");
        };
        assert_eq!(file, PathBuf::from("src/A.cs"));
        assert_eq!(line, 12);
    }
}
