//! Conversion entry points and the job orchestrator.
//!
//! The orchestrator is a single async task driving the job state machine
//!
//! ```text
//! Planning → Extracting → Aggregating → Writing → Completed
//!                │             │            │
//!                └─(cancel)────┴─(cancel)───┴──▶ Cancelled
//! any stage ─(setup failure)─▶ Failed
//! ```
//!
//! and consuming completion events; all parallelism lives inside the stage
//! pools. Exactly one terminal state is reached per run, and the terminal
//! snapshot is always the last event the progress sink observes.

use crate::config::ConversionConfig;
use crate::engines::{PageCounter, SpreadsheetWriter, TableExtractor};
use crate::error::Pdf2TablesError;
use crate::mem::MemoryGovernor;
use crate::output::{ConversionStats, Document, JobResult};
use crate::pipeline::plan::{plan_batches, BatchPlan};
use crate::pipeline::{extract, write};
use crate::progress::{format_elapsed, ProgressSink, ProgressTracker};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Job lifecycle states. Transitions are logged; exactly one of the three
/// terminal states is reached per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Planning,
    Extracting,
    Aggregating,
    Writing,
    Completed,
    Cancelled,
    Failed,
}

fn transition(state: &mut JobState, next: JobState) {
    debug!("job state: {state:?} -> {next:?}");
    *state = next;
}

/// Convert the tables of a PDF document into a workbook.
///
/// This is the entire public surface of the core: everything around it
/// (argument parsing, progress display, menus) belongs to the caller.
///
/// # Arguments
/// * `document_path` — the source PDF
/// * `output_path`   — the workbook artifact to (re)create
/// * `config`        — tuning knobs and collaborator engines
/// * `sink`          — receives every progress snapshot
/// * `cancel`        — cooperative cancellation; setting it stops new work
///   at the next checkpoint and discards unconsumed results
///
/// # Returns
/// A [`JobResult`]: `Completed` (even when individual batches or chunks
/// failed, or when no tables were found), `Cancelled`, or `Failed` for
/// setup-phase errors. This function itself never returns `Err` — fatal
/// errors fold into `JobResult::Failed` after a terminal snapshot.
pub async fn run_conversion(
    document_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
) -> JobResult {
    let tracker = ProgressTracker::new(sink);
    match run_pipeline(
        document_path.as_ref(),
        output_path.as_ref(),
        config,
        &tracker,
        &cancel,
    )
    .await
    {
        Ok(result) => result,
        Err(error) => {
            let reason = error.to_string();
            tracker.announce(0, format!("Conversion failed: {reason}"), 0);
            JobResult::Failed { reason }
        }
    }
}

/// Synchronous wrapper around [`run_conversion`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_conversion_sync(
    document_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
) -> JobResult {
    match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime.block_on(run_conversion(
            document_path,
            output_path,
            config,
            sink,
            cancel,
        )),
        Err(error) => JobResult::Failed {
            reason: format!("Failed to create tokio runtime: {error}"),
        },
    }
}

async fn run_pipeline(
    document_path: &Path,
    output_path: &Path,
    config: &ConversionConfig,
    tracker: &ProgressTracker,
    cancel: &CancellationToken,
) -> Result<JobResult, Pdf2TablesError> {
    let total_start = Instant::now();
    let mut state = JobState::Planning;
    info!(
        "Starting conversion: {} -> {}",
        document_path.display(),
        output_path.display()
    );

    // ── Planning ─────────────────────────────────────────────────────────
    tracker.announce(0, "Analyzing PDF document...", 0);
    let document_path = resolve_document(document_path)?;
    let page_counter = resolve_page_counter(config)?;
    let extractor = resolve_extractor(config)?;
    let writer = resolve_writer(config);

    let counted_path = document_path.clone();
    let total_pages = tokio::task::spawn_blocking(move || page_counter.count_pages(&counted_path))
        .await
        .map_err(|e| Pdf2TablesError::Internal(format!("page count task panicked: {e}")))?
        .map_err(|e| Pdf2TablesError::DocumentUnreadable {
            path: document_path.clone(),
            detail: e.to_string(),
        })?;
    let document = Document {
        path: document_path,
        total_pages,
    };

    let plan = plan_batches(document.total_pages, config.batch_size)?;
    prepare_output(output_path)?;
    tracker.announce(
        1,
        format!(
            "Document has {total_pages} pages; extracting in {} batches of up to {} pages...",
            plan.batches.len(),
            plan.batch_size
        ),
        0,
    );

    if cancel.is_cancelled() {
        transition(&mut state, JobState::Cancelled);
        return Ok(finish_cancelled(tracker));
    }

    // ── Extracting ───────────────────────────────────────────────────────
    transition(&mut state, JobState::Extracting);
    let governor = MemoryGovernor::new();
    let extract_start = Instant::now();
    let extraction = extract::extract_batches(
        &document.path,
        &plan.batches,
        extractor,
        governor,
        tracker,
        cancel,
        config,
    )
    .await;
    let extract_duration = extract_start.elapsed();

    if extraction.cancelled {
        transition(&mut state, JobState::Cancelled);
        return Ok(finish_cancelled(tracker));
    }

    // ── Aggregating ──────────────────────────────────────────────────────
    transition(&mut state, JobState::Aggregating);
    let tables_found = extraction.tables_found;
    let failed_batches = extraction.errors.len();
    if cancel.is_cancelled() {
        transition(&mut state, JobState::Cancelled);
        return Ok(finish_cancelled(tracker));
    }
    if extraction.tables.is_empty() {
        // A successful run that found nothing, distinct from failure.
        transition(&mut state, JobState::Completed);
        tracker.announce(100, "No tables found in document", 0);
        return Ok(JobResult::Completed {
            tables_saved: 0,
            stats: ConversionStats {
                tables_found,
                failed_batches,
                extract_duration_ms: extract_duration.as_millis() as u64,
                total_duration_ms: total_start.elapsed().as_millis() as u64,
                ..stats_for(&plan, total_pages)
            },
            errors: extraction.errors,
        });
    }
    tracker.announce(
        80,
        format!("Saving {tables_found} tables to workbook..."),
        tables_found,
    );

    // ── Writing ──────────────────────────────────────────────────────────
    transition(&mut state, JobState::Writing);
    let write_start = Instant::now();
    let written = write::write_chunks(
        output_path,
        extraction.tables,
        tables_found,
        writer,
        governor,
        tracker,
        cancel,
        config,
    )
    .await;
    let write_duration = write_start.elapsed();

    if written.cancelled {
        transition(&mut state, JobState::Cancelled);
        return Ok(finish_cancelled(tracker));
    }

    // ── Report ───────────────────────────────────────────────────────────
    transition(&mut state, JobState::Completed);
    let mut errors = extraction.errors;
    let failed_chunks = written.errors.len();
    errors.extend(written.errors);

    let stats = ConversionStats {
        tables_found,
        tables_saved: written.tables_saved,
        failed_batches,
        failed_chunks,
        extract_duration_ms: extract_duration.as_millis() as u64,
        write_duration_ms: write_duration.as_millis() as u64,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        ..stats_for(&plan, total_pages)
    };
    info!(
        "Conversion complete: {}/{} tables saved, {}ms total",
        stats.tables_saved, stats.tables_found, stats.total_duration_ms
    );
    tracker.announce(
        100,
        format!(
            "Done: saved {} tables in {}",
            written.tables_saved,
            format_elapsed(total_start.elapsed())
        ),
        tables_found,
    );

    Ok(JobResult::Completed {
        tables_saved: written.tables_saved,
        stats,
        errors,
    })
}

fn stats_for(plan: &BatchPlan, total_pages: usize) -> ConversionStats {
    ConversionStats {
        total_pages,
        total_batches: plan.batches.len(),
        batch_size: plan.batch_size,
        ..ConversionStats::default()
    }
}

fn finish_cancelled(tracker: &ProgressTracker) -> JobResult {
    tracker.announce(0, "Conversion cancelled", 0);
    JobResult::Cancelled
}

/// Validate the document path: existence, read permission, PDF magic bytes.
fn resolve_document(path: &Path) -> Result<PathBuf, Pdf2TablesError> {
    let path = path.to_path_buf();
    if !path.exists() {
        return Err(Pdf2TablesError::FileNotFound { path });
    }
    match std::fs::File::open(&path) {
        Ok(mut file) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if file.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(Pdf2TablesError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2TablesError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Pdf2TablesError::FileNotFound { path });
        }
    }
    Ok(path)
}

/// Create the output's parent directory and drop any stale artifact, so the
/// writer's incremental appends start from a clean file.
fn prepare_output(output: &Path) -> Result<(), Pdf2TablesError> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| {
                Pdf2TablesError::OutputWriteFailed {
                    path: output.to_path_buf(),
                    source,
                }
            })?;
        }
    }
    if output.exists() {
        std::fs::remove_file(output).map_err(|source| Pdf2TablesError::OutputWriteFailed {
            path: output.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

// ── Collaborator resolution ──────────────────────────────────────────────
//
// Mirrors the usual most-specific-first chain: an engine injected through
// the config always wins; otherwise the compiled-in default adapter is
// used; otherwise the caller gets a configuration error with a hint.

fn resolve_page_counter(
    config: &ConversionConfig,
) -> Result<Arc<dyn PageCounter>, Pdf2TablesError> {
    if let Some(ref counter) = config.page_counter {
        return Ok(Arc::clone(counter));
    }
    default_page_counter()
}

#[cfg(feature = "pdfium")]
fn default_page_counter() -> Result<Arc<dyn PageCounter>, Pdf2TablesError> {
    Ok(Arc::new(crate::engines::pdfium::PdfiumPageCounter::new()))
}

#[cfg(not(feature = "pdfium"))]
fn default_page_counter() -> Result<Arc<dyn PageCounter>, Pdf2TablesError> {
    Err(Pdf2TablesError::EngineNotConfigured {
        role: "page counting",
        hint: "Provide ConversionConfig::page_counter, or rebuild with the `pdfium` feature."
            .into(),
    })
}

fn resolve_extractor(
    config: &ConversionConfig,
) -> Result<Arc<dyn TableExtractor>, Pdf2TablesError> {
    if let Some(ref extractor) = config.extractor {
        return Ok(Arc::clone(extractor));
    }
    default_extractor()
}

#[cfg(feature = "tabula")]
fn default_extractor() -> Result<Arc<dyn TableExtractor>, Pdf2TablesError> {
    let extractor = crate::engines::tabula::TabulaExtractor::from_env().map_err(|e| {
        Pdf2TablesError::EngineNotConfigured {
            role: "table extraction",
            hint: format!("Could not start the tabula engine: {e}"),
        }
    })?;
    Ok(Arc::new(extractor))
}

#[cfg(not(feature = "tabula"))]
fn default_extractor() -> Result<Arc<dyn TableExtractor>, Pdf2TablesError> {
    Err(Pdf2TablesError::EngineNotConfigured {
        role: "table extraction",
        hint: "Provide ConversionConfig::extractor, or rebuild with `--features tabula` \
               and set TABULA_JAR to the tabula-java jar."
            .into(),
    })
}

fn resolve_writer(config: &ConversionConfig) -> Arc<dyn SpreadsheetWriter> {
    match config.writer {
        Some(ref writer) => Arc::clone(writer),
        None => Arc::new(crate::engines::workbook::ZipWorkbookWriter::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_document_is_file_not_found() {
        let err = resolve_document(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, Pdf2TablesError::FileNotFound { .. }));
    }

    #[test]
    fn non_pdf_magic_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        file.write_all(b"PK\x03\x04 not a pdf").unwrap();
        let err = resolve_document(file.path()).unwrap_err();
        assert!(matches!(err, Pdf2TablesError::NotAPdf { .. }));
    }

    #[test]
    fn prepare_output_replaces_stale_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested/out.zip");
        prepare_output(&output).unwrap();
        assert!(output.parent().unwrap().is_dir());

        std::fs::write(&output, b"stale").unwrap();
        prepare_output(&output).unwrap();
        assert!(!output.exists());
    }
}
