//! Entry points: parse an input into an item stream.
//!
//! `parse` writes into a caller-owned channel, `spawn_parse` runs on a
//! background thread and hands back the receiving end, and
//! `collect_items` gathers everything for callers that want a batch.

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use super::channel::{item_channel, ItemReceiver, ItemSender};
use super::types::Item;
use crate::config::ParseOptions;
use crate::error::{GraphError, Result};
use crate::solution::{CancelToken, Orchestrator, ParseSummary};

/// Parse `input` and stream every item into `sender`.
///
/// The stream completes when this returns, successfully or not.
pub fn parse(input: &Path, options: &ParseOptions, sender: ItemSender) -> Result<ParseSummary> {
    Orchestrator::new(options.clone()).run(input, sender)
}

/// Like [`parse`], stopping between phases once `cancel` fires.
pub fn parse_with_cancel(
    input: &Path,
    options: &ParseOptions,
    sender: ItemSender,
    cancel: CancelToken,
) -> Result<ParseSummary> {
    Orchestrator::new(options.clone())
        .with_cancel(cancel)
        .run(input, sender)
}

/// Parse on a background thread. Items arrive on the receiver while the parse runs.
pub fn spawn_parse(
    input: PathBuf,
    options: ParseOptions,
    cancel: CancelToken,
) -> Result<(ItemReceiver, JoinHandle<Result<ParseSummary>>)> {
    let (tx, rx) = item_channel();
    let handle = std::thread::Builder::new()
        .name("depgraph-parse".to_string())
        .spawn(move || parse_with_cancel(&input, &options, tx, cancel))?;
    Ok((rx, handle))
}

/// Wait for a spawned parse.
pub fn join_parse(handle: JoinHandle<Result<ParseSummary>>) -> Result<ParseSummary> {
    handle
        .join()
        .map_err(|_| GraphError::Pool("parse thread panicked".to_string()))?
}

/// Parse and return every item. Not for use inside an async runtime.
pub fn collect_items(input: &Path, options: &ParseOptions) -> Result<(Vec<Item>, ParseSummary)> {
    let (tx, rx) = item_channel();
    let summary = parse(input, options, tx)?;
    Ok((rx.collect_blocking(), summary))
}
