//! Parallel batch extraction: a bounded worker pool over page-range batches.
//!
//! ## Why spawn_blocking?
//!
//! Extraction engines are blocking, CPU-/IO-bound collaborators (a JVM
//! bridge, a native PDF library). `tokio::task::spawn_blocking` moves each
//! call onto the blocking thread pool so the async workers never stall the
//! runtime, while `buffer_unordered` caps how many run at once.
//!
//! ## Ordering
//!
//! Completion events reach the [`ProgressTracker`] in **completion order**
//! (first finished, first reported). The final result set is reassembled in
//! **batch-index order**, so downstream sheet numbering is stable across
//! runs regardless of worker-pool scheduling jitter.

use crate::config::ConversionConfig;
use crate::engines::TableExtractor;
use crate::error::StageError;
use crate::mem::MemoryGovernor;
use crate::output::Table;
use crate::pipeline::plan::Batch;
use crate::progress::{extraction_percent, ProgressTracker};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Outcome of one batch: its tables on success, an isolated error otherwise.
///
/// A failed batch still completes — with no tables and the error recorded —
/// so one bad page range never aborts the pool.
#[derive(Debug)]
pub struct ExtractionOutcome {
    pub batch: Batch,
    pub tables: Vec<Table>,
    pub error: Option<StageError>,
}

/// Aggregate result of the extraction stage.
#[derive(Debug, Default)]
pub struct ExtractionResult {
    /// All extracted tables in batch-index order (the ResultSet).
    pub tables: Vec<Table>,
    /// Total tables found, including empty ones.
    pub tables_found: usize,
    /// Isolated per-batch errors, in completion order.
    pub errors: Vec<StageError>,
    /// The token was signalled; `tables` is empty and must not be written.
    pub cancelled: bool,
}

/// Bounded extraction concurrency: reserve one unit of parallelism for the
/// host process, never exceed the configured cap, never drop below one.
pub fn worker_count(cap: usize) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cores.saturating_sub(1).clamp(1, cap.max(1))
}

/// Run the extraction engine over every batch with bounded concurrency.
///
/// The cancellation token is checked before each batch is dispatched and
/// again when each completion is consumed; batches finishing after the
/// token was signalled are discarded rather than aggregated.
pub async fn extract_batches(
    document: &Path,
    batches: &[Batch],
    extractor: Arc<dyn TableExtractor>,
    governor: MemoryGovernor,
    tracker: &ProgressTracker,
    cancel: &CancellationToken,
    config: &ConversionConfig,
) -> ExtractionResult {
    let total = batches.len();
    let workers = worker_count(config.max_extract_workers);
    let started = Instant::now();
    debug!(total_batches = total, workers, "extraction pool starting");

    let mut outcomes: Vec<Option<ExtractionOutcome>> = Vec::with_capacity(total);
    outcomes.resize_with(total, || None);
    let mut completed = 0usize;
    let mut tables_found = 0usize;
    let mut errors = Vec::new();

    let mut completions = stream::iter(batches.iter().copied().map(|batch| {
        let extractor = Arc::clone(&extractor);
        let document = document.to_path_buf();
        let cancel = cancel.clone();
        async move {
            // Dispatch-time check: once the token is set, batches that have
            // not started yet never will.
            if cancel.is_cancelled() {
                return None;
            }
            Some(run_one_batch(extractor, document, batch).await)
        }
    }))
    .buffer_unordered(workers);

    while let Some(completion) = completions.next().await {
        let Some(outcome) = completion else {
            continue;
        };
        if cancel.is_cancelled() {
            // In-flight work may finish, but its output is discarded.
            debug!(batch = outcome.batch.index, "discarding result after cancellation");
            continue;
        }

        completed += 1;
        tables_found += outcome.tables.len();

        if let Some(error) = &outcome.error {
            warn!("{error}");
            tracker.announce(
                extraction_percent(completed, total),
                error.to_string(),
                tables_found,
            );
            errors.push(error.clone());
        }
        tracker.on_batch_completed(completed, total, tables_found, started.elapsed());

        if completed % config.memory_check_interval == 0 {
            governor.check_and_reclaim(config.extract_memory_threshold);
        }

        let index = outcome.batch.index;
        outcomes[index] = Some(outcome);
    }

    if cancel.is_cancelled() {
        return ExtractionResult {
            tables: Vec::new(),
            tables_found: 0,
            errors,
            cancelled: true,
        };
    }

    // Reassemble in batch-index order, not completion order.
    let mut tables = Vec::with_capacity(tables_found);
    for outcome in outcomes.into_iter().flatten() {
        tables.extend(outcome.tables);
    }

    ExtractionResult {
        tables,
        tables_found,
        errors,
        cancelled: false,
    }
}

/// Invoke the engine for one batch, converting every failure mode — engine
/// error or panic — into an isolated outcome value.
async fn run_one_batch(
    extractor: Arc<dyn TableExtractor>,
    document: std::path::PathBuf,
    batch: Batch,
) -> ExtractionOutcome {
    let joined = tokio::task::spawn_blocking(move || {
        extractor.extract_tables(&document, batch.start_page, batch.end_page)
    })
    .await;

    match joined {
        Ok(Ok(tables)) => ExtractionOutcome {
            batch,
            tables,
            error: None,
        },
        Ok(Err(engine_error)) => ExtractionOutcome {
            batch,
            tables: Vec::new(),
            error: Some(StageError::ExtractionFailed {
                batch: batch.index,
                start_page: batch.start_page,
                end_page: batch.end_page,
                detail: engine_error.to_string(),
            }),
        },
        Err(join_error) => ExtractionOutcome {
            batch,
            tables: Vec::new(),
            error: Some(StageError::ExtractionFailed {
                batch: batch.index,
                start_page: batch.start_page,
                end_page: batch.end_page,
                detail: format!("extraction task panicked: {join_error}"),
            }),
        },
    }
}
