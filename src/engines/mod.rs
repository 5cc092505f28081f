//! Collaborator engine contracts and their default adapters.
//!
//! The pipeline never talks to a PDF library or a spreadsheet format
//! directly — it consumes three narrow capabilities, each behind a trait, so
//! engines can be swapped (or mocked in tests) without touching any stage:
//!
//! * [`PageCounter`] — how many pages does this document have?
//! * [`TableExtractor`] — the opaque extraction engine: document + page
//!   range in, zero or more tables out. Table-detection heuristics live
//!   entirely on the far side of this trait.
//! * [`SpreadsheetWriter`] — append one named sheet to the output artifact.
//!   The artifact's binary layout is the writer's business.
//!
//! All three are **blocking** contracts: real engines (pdfium, a JVM
//! bridge, a zip encoder) are CPU- and IO-bound, so the worker pools wrap
//! every call in `tokio::task::spawn_blocking` rather than forcing each
//! engine to fake being async.

use crate::error::EngineError;
use crate::output::Table;
use std::path::Path;

#[cfg(feature = "pdfium")]
pub mod pdfium;
#[cfg(feature = "tabula")]
pub mod tabula;
pub mod workbook;

/// Reads the total page count of a document.
pub trait PageCounter: Send + Sync {
    fn count_pages(&self, document: &Path) -> Result<usize, EngineError>;
}

/// Extracts tables from a contiguous, 1-based, inclusive page range.
///
/// Implementations must tolerate concurrent invocations for disjoint ranges
/// of the same document — the extraction pool issues several at once. An
/// implementation that cannot run concurrently may serialise internally.
pub trait TableExtractor: Send + Sync {
    fn extract_tables(
        &self,
        document: &Path,
        start_page: usize,
        end_page: usize,
    ) -> Result<Vec<Table>, EngineError>;
}

/// Appends one named sheet to the output artifact, creating it on first use.
///
/// Calls are serialised by the chunk writer: two `append_sheet` calls for
/// the same artifact never run at the same time, so implementations do not
/// need their own locking.
pub trait SpreadsheetWriter: Send + Sync {
    fn append_sheet(
        &self,
        output: &Path,
        sheet_name: &str,
        table: &Table,
    ) -> Result<(), EngineError>;
}
