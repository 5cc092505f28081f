//! Error types for the pdf2tables library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2TablesError`] — **Fatal**: the conversion cannot start or continue
//!   at all (unreadable document, no extraction engine configured, output
//!   directory cannot be created). Only setup-phase failures are fatal.
//!
//! * [`StageError`] — **Non-fatal**: a single batch failed extraction or a
//!   single chunk failed to persist. Recorded as an outcome value at the
//!   worker boundary and carried into the final error list; the pipeline
//!   keeps processing the remaining batches/chunks.
//!
//! Cancellation is deliberately absent from both: it is a first-class
//! [`crate::output::JobResult`] variant, not an error.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2tables library.
///
/// Per-batch and per-chunk failures use [`StageError`] and are stored in the
/// final [`crate::output::JobResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Pdf2TablesError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// Input validation failed (e.g. a document reporting zero pages).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The page-count reader could not open the document.
    #[error("Cannot read '{path}' as a PDF document: {detail}")]
    DocumentUnreadable { path: PathBuf, detail: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// No implementation is available for a required collaborator role.
    #[error("No {role} engine is configured.\n{hint}")]
    EngineNotConfigured { role: &'static str, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the output directory or replace the output artifact.
    #[error("Failed to prepare output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single batch or chunk.
///
/// Converted from an engine failure at the worker boundary and recorded in
/// the job's error list. The overall conversion continues; the affected
/// batch contributes no tables (or the affected chunk's remaining tables
/// are not written).
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum StageError {
    /// Extraction failed for one page-range batch.
    #[error("Batch {batch} (pages {start_page}-{end_page}): extraction failed: {detail}")]
    ExtractionFailed {
        batch: usize,
        start_page: usize,
        end_page: usize,
        detail: String,
    },

    /// Persisting one chunk of tables failed.
    #[error("Chunk {chunk}: write failed: {detail}")]
    WriteFailed { chunk: usize, detail: String },
}

/// The single error type collaborator engines report.
///
/// Engines are opaque to the pipeline; all it can do with their failures is
/// record the human-readable detail, so the contract keeps it to a string.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self(detail.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_failed_display() {
        let e = StageError::ExtractionFailed {
            batch: 3,
            start_page: 151,
            end_page: 200,
            detail: "engine timeout".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Batch 3"), "got: {msg}");
        assert!(msg.contains("151-200"), "got: {msg}");
        assert!(msg.contains("engine timeout"), "got: {msg}");
    }

    #[test]
    fn write_failed_display() {
        let e = StageError::WriteFailed {
            chunk: 7,
            detail: "disk full".into(),
        };
        assert!(e.to_string().contains("Chunk 7"));
        assert!(e.to_string().contains("disk full"));
    }

    #[test]
    fn engine_not_configured_display() {
        let e = Pdf2TablesError::EngineNotConfigured {
            role: "table extraction",
            hint: "rebuild with --features tabula".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("table extraction"));
        assert!(msg.contains("--features tabula"));
    }

    #[test]
    fn engine_error_passes_detail_through() {
        let e = EngineError::new("jvm not found");
        assert_eq!(e.to_string(), "jvm not found");
    }
}
