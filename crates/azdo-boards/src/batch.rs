//! Batch fetching of work items by id.
//!
//! The items endpoint accepts at most [`MAX_BATCH_SIZE`] ids per request.
//! Larger id sets are split into contiguous chunks that are requested
//! concurrently and merged back in chunk order. A failing chunk is logged and
//! skipped; its items are simply missing from the result.

use crate::domain::WorkItem;
use crate::error::{Error, Result};
use crate::remote::{RawWorkItem, WorkItemService};
use futures::future::join_all;
use tracing::{debug, warn};

/// Maximum number of ids per items request.
pub const MAX_BATCH_SIZE: usize = 200;

/// A chunk request that failed.
#[derive(Debug)]
pub struct ChunkFailure {
    /// Position of the chunk in submission order.
    pub index: usize,
    /// Number of ids the chunk carried.
    pub size: usize,
    /// Why it failed.
    pub error: Error,
}

/// Outcome of a batched fetch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Resolved items, in chunk order.
    pub items: Vec<WorkItem>,
    /// Chunks that failed.
    pub failures: Vec<ChunkFailure>,
    /// Number of chunk requests issued.
    pub chunks: usize,
}

impl BatchReport {
    /// Whether every chunk succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Summarise failed chunks as an error, if there were any.
    #[must_use]
    pub fn partial_failure(&self) -> Option<Error> {
        (!self.is_complete()).then(|| Error::PartialBatchFailure {
            failed: self.failures.len(),
            total: self.chunks,
        })
    }
}

/// Fetch items by id, tolerating failed chunks.
///
/// See [`fetch_items_report`] for the exact semantics.
///
/// # Errors
///
/// Returns an error only when a single-request fetch (200 ids or fewer) fails.
pub async fn fetch_items(
    service: &dyn WorkItemService,
    ids: &[u32],
    project: Option<&str>,
) -> Result<Vec<WorkItem>> {
    let report = fetch_items_report(service, ids, project).await?;
    if let Some(summary) = report.partial_failure() {
        warn!(%summary, "Returning partial work item batch");
    }
    Ok(report.items)
}

/// Fetch items by id and report per-chunk failures.
///
/// - No ids: no request, empty report.
/// - Up to [`MAX_BATCH_SIZE`] ids: one request whose failure is returned.
/// - More: one concurrent request per chunk; failures land in
///   [`BatchReport::failures`] and never fail the call.
///
/// # Errors
///
/// Returns an error only when a single-request fetch fails.
pub async fn fetch_items_report(
    service: &dyn WorkItemService,
    ids: &[u32],
    project: Option<&str>,
) -> Result<BatchReport> {
    if ids.is_empty() {
        return Ok(BatchReport::default());
    }

    if ids.len() <= MAX_BATCH_SIZE {
        let raw = service.get_work_items_batch(ids, project).await?;
        return Ok(BatchReport {
            items: map_items(&raw),
            failures: Vec::new(),
            chunks: 1,
        });
    }

    let chunks: Vec<&[u32]> = ids.chunks(MAX_BATCH_SIZE).collect();
    debug!(ids = ids.len(), chunks = chunks.len(), "Fetching work items in chunks");

    let results = join_all(
        chunks
            .iter()
            .map(|chunk| service.get_work_items_batch(chunk, project)),
    )
    .await;

    let mut report = BatchReport {
        chunks: chunks.len(),
        ..BatchReport::default()
    };
    for (index, (chunk, result)) in chunks.iter().zip(results).enumerate() {
        match result {
            Ok(raw) => report.items.extend(map_items(&raw)),
            Err(error) => {
                warn!(chunk = index, size = chunk.len(), %error, "Work item chunk failed");
                report.failures.push(ChunkFailure {
                    index,
                    size: chunk.len(),
                    error,
                });
            }
        }
    }
    Ok(report)
}

fn map_items(raw: &[RawWorkItem]) -> Vec<WorkItem> {
    let items: Vec<WorkItem> = raw.iter().filter_map(WorkItem::from_raw).collect();
    if items.len() < raw.len() {
        debug!(dropped = raw.len() - items.len(), "Skipped records without an id");
    }
    items
}
