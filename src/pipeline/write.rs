//! Chunked persistence of the result set through the spreadsheet writer.
//!
//! ## Why chunks and windows?
//!
//! Persisting a sheet holds larger transient buffers than extracting it, so
//! the write stage runs with much lower concurrency than extraction and
//! submits only a small window of chunk tasks at a time
//! (submit / drain / submit-more). Queued memory stays bounded by one
//! window's worth of chunks instead of the whole document's worth.
//!
//! The persist step itself is serialised: workers may prepare sheets
//! concurrently, but two chunks never interleave their appends to the
//! output artifact.

use crate::config::ConversionConfig;
use crate::engines::SpreadsheetWriter;
use crate::error::{EngineError, StageError};
use crate::mem::MemoryGovernor;
use crate::output::Table;
use crate::progress::{write_percent, ProgressTracker};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A contiguous slice of the result set, persisted by one writer task.
#[derive(Debug)]
pub struct WriteChunk {
    /// 1-based ordinal of this chunk's first table within the result set.
    pub start_ordinal: usize,
    pub tables: Vec<Table>,
}

/// Aggregate result of the write stage.
#[derive(Debug, Default)]
pub struct WriteResult {
    /// Sheets actually written (empty tables and failed chunks excluded).
    pub tables_saved: usize,
    /// Isolated per-chunk errors, in completion order.
    pub errors: Vec<StageError>,
    /// The token was signalled before all chunks were persisted.
    pub cancelled: bool,
}

/// Tables per chunk: monotonic in the total, clamped to the configured band.
///
/// `total / chunk_count_target` bounds how many chunks a huge result set
/// produces; the clamp bounds each chunk's memory from both sides so a
/// small run never degenerates into thousands of tiny chunks or one giant
/// one.
pub fn chunk_size_for(total_tables: usize, config: &ConversionConfig) -> usize {
    total_tables
        .div_ceil(config.chunk_count_target)
        .clamp(config.min_chunk_tables, config.max_chunk_tables)
}

/// Deterministic sheet name for the table at `ordinal` (1-based).
///
/// Falls back to the short form when the long form would exceed the output
/// format's identifier limit. Pure function of the ordinal: two runs over
/// the same document always assign identical names, and two distinct
/// ordinals never collide.
pub fn sheet_name(ordinal: usize, max_len: usize) -> String {
    let name = format!("Table_{ordinal}");
    if name.len() > max_len {
        format!("T{ordinal}")
    } else {
        name
    }
}

/// Partition the result set into contiguous chunks, consuming it.
///
/// Tables move into the chunks without copying; after this call the result
/// set's backing storage is gone and peak memory is bounded per chunk.
pub fn partition_chunks(tables: Vec<Table>, chunk_size: usize) -> Vec<WriteChunk> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(tables.len().div_ceil(chunk_size));
    let mut current = Vec::with_capacity(chunk_size.min(tables.len()));
    let mut start_ordinal = 1;

    for (position, table) in tables.into_iter().enumerate() {
        current.push(table);
        if current.len() == chunk_size {
            chunks.push(WriteChunk {
                start_ordinal,
                tables: std::mem::replace(&mut current, Vec::with_capacity(chunk_size)),
            });
            start_ordinal = position + 2;
        }
    }
    if !current.is_empty() {
        chunks.push(WriteChunk {
            start_ordinal,
            tables: current,
        });
    }
    chunks
}

/// Persist the result set through the writer with bounded concurrency.
///
/// Ownership of `tables` transfers here; the vector is consumed into chunks
/// and a reclamation pass runs before the first persist.
#[allow(clippy::too_many_arguments)]
pub async fn write_chunks(
    output: &Path,
    tables: Vec<Table>,
    tables_found: usize,
    writer: Arc<dyn SpreadsheetWriter>,
    governor: MemoryGovernor,
    tracker: &ProgressTracker,
    cancel: &CancellationToken,
    config: &ConversionConfig,
) -> WriteResult {
    let chunk_size = chunk_size_for(tables.len(), config);
    let chunks = partition_chunks(tables, chunk_size);
    let total_chunks = chunks.len();
    // The result set has been consumed into the chunks; hand its freed
    // backing pages to the OS before the writers allocate their buffers.
    governor.reclaim();

    debug!(total_chunks, chunk_size, "chunk writer starting");
    let started = Instant::now();
    let persist_lock = Arc::new(Mutex::new(()));
    let mut written = 0usize;
    let mut tables_saved = 0usize;
    let mut errors = Vec::new();

    let mut pending = chunks.into_iter().enumerate();
    loop {
        if cancel.is_cancelled() {
            return WriteResult {
                tables_saved,
                errors,
                cancelled: true,
            };
        }
        let window: Vec<_> = pending.by_ref().take(config.write_submit_window).collect();
        if window.is_empty() {
            break;
        }

        let mut completions = stream::iter(window.into_iter().map(|(chunk_index, chunk)| {
            let writer = Arc::clone(&writer);
            let output = output.to_path_buf();
            let cancel = cancel.clone();
            let persist_lock = Arc::clone(&persist_lock);
            let max_name_len = config.max_sheet_name_len;
            async move {
                // The write step for this chunk begins here; a token set
                // before this point means its output is never written.
                if cancel.is_cancelled() {
                    return None;
                }
                let result = tokio::task::spawn_blocking(move || {
                    persist_chunk(&*writer, &output, &chunk, max_name_len, &persist_lock)
                })
                .await
                .unwrap_or_else(|join_error| {
                    Err(EngineError::new(format!("write task panicked: {join_error}")))
                });
                Some((chunk_index, result))
            }
        }))
        .buffer_unordered(config.max_write_workers);

        while let Some(completion) = completions.next().await {
            let Some((chunk_index, result)) = completion else {
                continue;
            };
            if cancel.is_cancelled() {
                continue;
            }
            written += 1;
            match result {
                Ok(saved) => {
                    tables_saved += saved;
                }
                Err(engine_error) => {
                    let error = StageError::WriteFailed {
                        chunk: chunk_index,
                        detail: engine_error.to_string(),
                    };
                    warn!("{error}");
                    tracker.announce(
                        write_percent(written, total_chunks),
                        error.to_string(),
                        tables_found,
                    );
                    errors.push(error);
                }
            }
            tracker.on_chunk_written(
                written,
                total_chunks,
                tables_saved,
                tables_found,
                started.elapsed(),
            );
        }

        // Writers hold bigger transient buffers than extractors, hence the
        // tighter threshold once per drained window.
        governor.check_and_reclaim(config.write_memory_threshold);
    }

    WriteResult {
        tables_saved,
        errors,
        cancelled: cancel.is_cancelled(),
    }
}

/// Persist one chunk: derive names and filter empties outside the critical
/// section, then append every sheet under the artifact lock.
fn persist_chunk(
    writer: &dyn SpreadsheetWriter,
    output: &Path,
    chunk: &WriteChunk,
    max_name_len: usize,
    persist_lock: &Mutex<()>,
) -> Result<usize, EngineError> {
    // An empty table is skipped but still consumes its ordinal, keeping
    // names a pure function of position in the result set.
    let sheets: Vec<(String, &Table)> = chunk
        .tables
        .iter()
        .enumerate()
        .filter(|(_, table)| !table.is_empty())
        .map(|(offset, table)| (sheet_name(chunk.start_ordinal + offset, max_name_len), table))
        .collect();

    let _guard = persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
    let mut saved = 0;
    for (name, table) in sheets {
        writer.append_sheet(output, &name, table)?;
        saved += 1;
    }
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn config() -> ConversionConfig {
        ConversionConfig::default()
    }

    #[test]
    fn chunk_size_is_monotonic_and_bounded() {
        let config = config();
        let mut previous = 0;
        for total in (0..30_000).step_by(97) {
            let size = chunk_size_for(total, &config);
            assert!(size >= config.min_chunk_tables);
            assert!(size <= config.max_chunk_tables);
            assert!(size >= previous, "chunk size shrank at total={total}");
            previous = size;
        }
    }

    #[test]
    fn chunk_size_hits_both_clamps() {
        let config = config();
        assert_eq!(chunk_size_for(5, &config), 50);
        assert_eq!(chunk_size_for(5_000, &config), 50);
        assert_eq!(chunk_size_for(1_000_000, &config), 100);
    }

    #[test]
    fn sheet_names_prefer_the_long_form() {
        assert_eq!(sheet_name(1, 31), "Table_1");
        assert_eq!(sheet_name(987, 31), "Table_987");
    }

    #[test]
    fn sheet_names_fall_back_when_too_long() {
        // A limit of 7 forces the fallback from Table_10 onwards.
        assert_eq!(sheet_name(9, 7), "Table_9");
        assert_eq!(sheet_name(10, 7), "T10");
    }

    #[test]
    fn sheet_names_never_collide_across_the_fallback_boundary() {
        let mut seen = HashSet::new();
        for ordinal in 1..=64 {
            assert!(
                seen.insert(sheet_name(ordinal, 7)),
                "duplicate name at ordinal {ordinal}"
            );
        }
        assert!(seen.contains("Table_9"));
        assert!(seen.contains("T10"));
    }

    #[test]
    fn partition_preserves_order_and_ordinals() {
        let tables: Vec<Table> = (0..7)
            .map(|i| Table::from(vec![vec![format!("t{i}")]]))
            .collect();
        let chunks = partition_chunks(tables, 3);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].start_ordinal, 1);
        assert_eq!(chunks[1].start_ordinal, 4);
        assert_eq!(chunks[2].start_ordinal, 7);
        assert_eq!(chunks[2].tables.len(), 1);
        assert_eq!(chunks[1].tables[0].rows[0][0], "t3");
    }

    #[test]
    fn partition_of_nothing_is_no_chunks() {
        assert!(partition_chunks(Vec::new(), 50).is_empty());
    }
}
