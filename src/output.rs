//! Output value types: extracted tables, job results, and run statistics.

use crate::error::StageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The source document, immutable once the page count has been read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub path: PathBuf,
    pub total_pages: usize,
}

/// One extracted table: rows of cell text.
///
/// The payload is opaque to the pipeline — it never inspects cell contents,
/// only moves tables between stages and asks [`Table::is_empty`] to decide
/// whether a sheet should be written at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// A table with no rows (or only cell-less rows) never produces a sheet.
    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.is_empty())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl<C, R, S> From<C> for Table
where
    C: IntoIterator<Item = R>,
    R: IntoIterator<Item = S>,
    S: Into<String>,
{
    fn from(value: C) -> Self {
        Table {
            rows: value
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }
}

/// Terminal outcome of one conversion job.
///
/// Exactly one variant is produced per run. `Cancelled` is a first-class
/// outcome, distinct from `Failed`; a run that completed but found nothing
/// is `Completed` with `tables_saved == 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobResult {
    /// The pipeline ran to the end. Isolated per-batch/per-chunk failures,
    /// if any, are listed in `errors`; they reduce `tables_saved` but never
    /// fail the job.
    Completed {
        tables_saved: usize,
        stats: ConversionStats,
        errors: Vec<StageError>,
    },
    /// The cancellation token was signalled; no further work was started and
    /// unconsumed results were discarded.
    Cancelled,
    /// A setup-phase failure aborted the run before (or between) stages.
    Failed { reason: String },
}

impl JobResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobResult::Completed { .. })
    }

    /// Number of sheets actually written; zero for `Cancelled` and `Failed`.
    pub fn tables_saved(&self) -> usize {
        match self {
            JobResult::Completed { tables_saved, .. } => *tables_saved,
            _ => 0,
        }
    }
}

/// Statistics accumulated over one completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages in the source document.
    pub total_pages: usize,
    /// Batches the planner produced.
    pub total_batches: usize,
    /// Pages per batch chosen by the planner (or the operator override).
    pub batch_size: usize,
    /// Tables the extraction stage found, including empty ones.
    pub tables_found: usize,
    /// Sheets actually written (empty tables and failed chunks excluded).
    pub tables_saved: usize,
    /// Batches whose extraction failed and was isolated.
    pub failed_batches: usize,
    /// Chunks whose persist step failed and was isolated.
    pub failed_chunks: usize,
    pub extract_duration_ms: u64,
    pub write_duration_ms: u64,
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_variants() {
        assert!(Table::default().is_empty());
        assert!(Table::new(vec![vec![], vec![]]).is_empty());
        assert!(!Table::from(vec![vec!["a"]]).is_empty());
    }

    #[test]
    fn from_nested_str() {
        let t = Table::from(vec![vec!["h1", "h2"], vec!["1", "2"]]);
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.rows[0], vec!["h1".to_string(), "h2".to_string()]);
    }

    #[test]
    fn tables_saved_is_zero_for_non_completed() {
        assert_eq!(JobResult::Cancelled.tables_saved(), 0);
        let failed = JobResult::Failed {
            reason: "boom".into(),
        };
        assert_eq!(failed.tables_saved(), 0);
        assert!(!failed.is_completed());
    }
}
