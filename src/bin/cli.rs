//! depgraph CLI - dependency graphs for .NET code.
//!
//! Usage:
//!   depgraph parse <input>               # Stream items as JSON lines
//!   depgraph stats <input>               # Node/link counts by kind
//!   depgraph source <input> <node>       # Source file of a node
//!   depgraph node-for <input> <file>     # Node at a file position
//!   depgraph files <input>               # Files a parse depends on
//!   depgraph newest <input>              # Newest change among them
//!   depgraph init <input>                # Write a default config

use anyhow::{bail, Context, Result};
use clap::Parser;
use depgraph::cli::{Cli, Commands, InputArgs};
use depgraph::{
    collect_items, join_parse, newest_data_time, relevant_files, spawn_parse, CancelToken,
    DepgraphConfig, ItemGraph, SourceLocator,
};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

fn main() {
    // stdout carries the item stream; logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Parse { input } => parse_command(&input, config)?,

        Commands::Stats { input, json } => {
            let options = input.options(config);
            let (items, summary) = collect_items(&input.input, &options)?;
            let stats = ItemGraph::from_items(items).stats();
            if json {
                let value = serde_json::json!({ "summary": summary, "graph": stats });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{}", summary);
                println!();
                print!("{}", stats);
                if !summary.skipped_projects.is_empty() {
                    println!();
                    println!("Skipped (no build output):");
                    for project in &summary.skipped_projects {
                        println!("  {}", project);
                    }
                }
            }
        }

        Commands::Source { input, node } => {
            let locator = locate(&input, config)?;
            let source = locator.get_source(&node)?;
            println!("{}:{}", source.path.display(), source.line);
            println!();
            print!("{}", source.text);
        }

        Commands::NodeFor { input, file, line } => {
            let locator = locate(&input, config)?;
            let file = file.canonicalize().unwrap_or(file);
            println!("{}", locator.node_for_file_path(&file, line)?);
        }

        Commands::Files { input } => {
            for file in relevant_files(&input.input, &input.options(config))? {
                println!("{}", file.display());
            }
        }

        Commands::Newest { input } => match newest_data_time(&input.input, &input.options(config))? {
            Some(time) => println!("{}", time.to_rfc3339()),
            None => println!("No relevant files exist"),
        },

        Commands::Init { input, force } => {
            let path = config
                .map(Path::to_path_buf)
                .unwrap_or_else(|| DepgraphConfig::path_for_input(&input));
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            DepgraphConfig::default().save(&path)?;
            println!("Wrote {}", path.display());
        }
    }

    Ok(())
}

/// Stream items to stdout while the parse runs.
fn parse_command(input: &InputArgs, config: Option<&Path>) -> Result<()> {
    let options = input.options(config);
    let (mut rx, handle) = spawn_parse(input.input.clone(), options, CancelToken::new())?;

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    while let Some(item) = rx.blocking_recv() {
        serde_json::to_writer(&mut out, &item)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    let summary = join_parse(handle)?;
    info!(
        modules = summary.modules.len(),
        nodes = summary.nodes,
        links = summary.links,
        elapsed_ms = summary.elapsed_ms,
        "parse complete"
    );
    Ok(())
}

/// Parse with locations on, for the source lookups.
fn locate(input: &InputArgs, config: Option<&Path>) -> Result<SourceLocator> {
    let options = input.options(config).with_debug_symbols(true);
    let (items, _) = collect_items(&input.input, &options)
        .with_context(|| format!("parsing {}", input.input.display()))?;
    let locator = SourceLocator::from_items(&items);
    if locator.is_empty() {
        bail!("no source locations found (missing .pdb files?)");
    }
    Ok(locator)
}
