//! # pdf2tables
//!
//! Extract the tables of large PDF documents into a workbook.
//!
//! ## Why this crate?
//!
//! Running a table-extraction engine over a multi-thousand-page document in
//! one call either exhausts memory or blocks the caller for minutes with no
//! feedback. This crate wraps the engine in an adaptive parallel batch
//! pipeline: the document is split into page-range batches sized by
//! document tier, batches are extracted concurrently with bounded workers,
//! memory pressure triggers reclamation between batches, progress (with
//! ETA) streams to the caller, cancellation is honoured at every stage
//! boundary, and results are persisted in bounded, order-preserving chunks.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Plan     page-count tiers → ordered page-range batches
//!  ├─ 2. Extract  bounded worker pool, one engine call per batch
//!  │              (per-batch failures isolated, memory governed)
//!  ├─ 3. Aggregate completion-ordered outcomes → batch-index order
//!  └─ 4. Write    chunked, windowed persistence; serialised appends
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2tables::{run_conversion, CancellationToken, ConversionConfig, NoopProgressSink};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ConversionConfig::default();
//!     let result = run_conversion(
//!         "document.pdf",
//!         "document.tables.zip",
//!         &config,
//!         Arc::new(NoopProgressSink),
//!         CancellationToken::new(),
//!     )
//!     .await;
//!     println!("saved {} tables", result.tables_saved());
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `pdf2tables` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `pdfium` | on      | Page counting via a pdfium shared library bound at runtime |
//! | `tabula` | off     | Range extraction via tabula-java (needs a JVM and `TABULA_JAR`) |
//!
//! Library-only use without the default engines:
//! ```toml
//! pdf2tables = { version = "0.4", default-features = false }
//! ```
//! then inject your own [`PageCounter`] and [`TableExtractor`] through
//! [`ConversionConfig`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod engines;
pub mod error;
pub mod mem;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{run_conversion, run_conversion_sync, JobState};
pub use engines::{PageCounter, SpreadsheetWriter, TableExtractor};
pub use error::{EngineError, Pdf2TablesError, StageError};
pub use mem::MemoryGovernor;
pub use output::{ConversionStats, Document, JobResult, Table};
pub use progress::{NoopProgressSink, ProgressSink, ProgressSnapshot};

/// Cooperative cancellation signal, re-exported from `tokio-util`.
///
/// Cloning yields handles to the same token; `cancel()` is idempotent and
/// immediately visible to every `is_cancelled()` check in the pipeline.
pub use tokio_util::sync::CancellationToken;
