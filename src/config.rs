//! Configuration for a PDF-to-workbook conversion.
//!
//! All pipeline behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Keeping every knob in one struct
//! makes it trivial to share configs across tasks and to diff two runs to
//! understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::engines::{PageCounter, SpreadsheetWriter, TableExtractor};
use crate::error::Pdf2TablesError;
use std::fmt;
use std::sync::Arc;

const MIB: u64 = 1024 * 1024;

/// Configuration for one conversion run.
///
/// Built via [`ConversionConfig::builder()`] or [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2tables::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .max_extract_workers(2)
///     .batch_size(50)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Fixed pages-per-batch, bypassing the planner's page-count tiers.
    /// Default: `None` (tiered sizing).
    pub batch_size: Option<usize>,

    /// Upper bound on concurrent extraction calls. Default: 4.
    ///
    /// The effective worker count is
    /// `max(1, min(available_parallelism − 1, max_extract_workers))` — one
    /// unit of parallelism always stays reserved for the host process.
    pub max_extract_workers: usize,

    /// Run a memory check-and-reclaim pass every this many completed
    /// batches. Default: 5.
    pub memory_check_interval: usize,

    /// Reclaim threshold during extraction, in bytes. Default: 800 MiB.
    pub extract_memory_threshold: u64,

    /// Reclaim threshold during writing, in bytes. Default: 500 MiB.
    ///
    /// Tighter than the extraction threshold: each writer holds a whole
    /// chunk's transient buffers while persisting.
    pub write_memory_threshold: u64,

    /// Concurrent chunk writers. Default: 2.
    ///
    /// Deliberately far below extraction concurrency — the persist step is
    /// serialised against a single artifact, so extra writers only add
    /// queued memory, not throughput.
    pub max_write_workers: usize,

    /// Chunk tasks submitted per window (submit / drain / submit-more).
    /// Default: 5. Bounds queued memory instead of enqueueing all chunks
    /// upfront.
    pub write_submit_window: usize,

    /// Lower bound on tables per write chunk. Default: 50.
    pub min_chunk_tables: usize,

    /// Upper bound on tables per write chunk. Default: 100.
    pub max_chunk_tables: usize,

    /// Target upper bound on the number of chunks; chunk size grows once
    /// `total_tables / chunk_count_target` exceeds `min_chunk_tables`.
    /// Default: 100.
    pub chunk_count_target: usize,

    /// Identifier-length limit of the output format; sheet names longer
    /// than this fall back to the short deterministic form. Default: 31
    /// (the classic spreadsheet sheet-name limit).
    pub max_sheet_name_len: usize,

    /// Page-count reader. `None` resolves to the pdfium adapter when the
    /// `pdfium` feature is enabled.
    pub page_counter: Option<Arc<dyn PageCounter>>,

    /// Extraction engine. `None` resolves to the tabula adapter when the
    /// `tabula` feature is enabled and `TABULA_JAR` is set.
    pub extractor: Option<Arc<dyn TableExtractor>>,

    /// Workbook serializer. `None` resolves to the built-in zip workbook
    /// adapter.
    pub writer: Option<Arc<dyn SpreadsheetWriter>>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            max_extract_workers: 4,
            memory_check_interval: 5,
            extract_memory_threshold: 800 * MIB,
            write_memory_threshold: 500 * MIB,
            max_write_workers: 2,
            write_submit_window: 5,
            min_chunk_tables: 50,
            max_chunk_tables: 100,
            chunk_count_target: 100,
            max_sheet_name_len: 31,
            page_counter: None,
            extractor: None,
            writer: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("batch_size", &self.batch_size)
            .field("max_extract_workers", &self.max_extract_workers)
            .field("memory_check_interval", &self.memory_check_interval)
            .field("extract_memory_threshold", &self.extract_memory_threshold)
            .field("write_memory_threshold", &self.write_memory_threshold)
            .field("max_write_workers", &self.max_write_workers)
            .field("write_submit_window", &self.write_submit_window)
            .field("min_chunk_tables", &self.min_chunk_tables)
            .field("max_chunk_tables", &self.max_chunk_tables)
            .field("chunk_count_target", &self.chunk_count_target)
            .field("max_sheet_name_len", &self.max_sheet_name_len)
            .field("page_counter", &self.page_counter.as_ref().map(|_| "<dyn PageCounter>"))
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn TableExtractor>"))
            .field("writer", &self.writer.as_ref().map(|_| "<dyn SpreadsheetWriter>"))
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn batch_size(mut self, pages: usize) -> Self {
        self.config.batch_size = Some(pages.max(1));
        self
    }

    pub fn max_extract_workers(mut self, n: usize) -> Self {
        self.config.max_extract_workers = n.max(1);
        self
    }

    pub fn memory_check_interval(mut self, batches: usize) -> Self {
        self.config.memory_check_interval = batches.max(1);
        self
    }

    pub fn extract_memory_threshold(mut self, bytes: u64) -> Self {
        self.config.extract_memory_threshold = bytes;
        self
    }

    pub fn write_memory_threshold(mut self, bytes: u64) -> Self {
        self.config.write_memory_threshold = bytes;
        self
    }

    pub fn max_write_workers(mut self, n: usize) -> Self {
        self.config.max_write_workers = n.max(1);
        self
    }

    pub fn write_submit_window(mut self, chunks: usize) -> Self {
        self.config.write_submit_window = chunks.max(1);
        self
    }

    pub fn min_chunk_tables(mut self, n: usize) -> Self {
        self.config.min_chunk_tables = n.max(1);
        self
    }

    pub fn max_chunk_tables(mut self, n: usize) -> Self {
        self.config.max_chunk_tables = n.max(1);
        self
    }

    pub fn chunk_count_target(mut self, n: usize) -> Self {
        self.config.chunk_count_target = n.max(1);
        self
    }

    pub fn max_sheet_name_len(mut self, chars: usize) -> Self {
        self.config.max_sheet_name_len = chars;
        self
    }

    pub fn page_counter(mut self, counter: Arc<dyn PageCounter>) -> Self {
        self.config.page_counter = Some(counter);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn TableExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn writer(mut self, writer: Arc<dyn SpreadsheetWriter>) -> Self {
        self.config.writer = Some(writer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2TablesError> {
        let c = &self.config;
        if c.min_chunk_tables > c.max_chunk_tables {
            return Err(Pdf2TablesError::InvalidConfig(format!(
                "min_chunk_tables ({}) must not exceed max_chunk_tables ({})",
                c.min_chunk_tables, c.max_chunk_tables
            )));
        }
        if c.max_write_workers > c.max_extract_workers {
            return Err(Pdf2TablesError::InvalidConfig(format!(
                "max_write_workers ({}) must not exceed max_extract_workers ({})",
                c.max_write_workers, c.max_extract_workers
            )));
        }
        if c.max_sheet_name_len < 2 {
            return Err(Pdf2TablesError::InvalidConfig(
                "max_sheet_name_len must be at least 2".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_builds() {
        let config = ConversionConfig::builder().build().unwrap();
        assert_eq!(config.max_extract_workers, 4);
        assert_eq!(config.max_write_workers, 2);
        assert_eq!(config.batch_size, None);
    }

    #[test]
    fn setters_clamp_to_one() {
        let config = ConversionConfig::builder()
            .max_extract_workers(0)
            .write_submit_window(0)
            .memory_check_interval(0)
            .build()
            .unwrap();
        assert_eq!(config.max_extract_workers, 1);
        assert_eq!(config.write_submit_window, 1);
        assert_eq!(config.memory_check_interval, 1);
    }

    #[test]
    fn rejects_inverted_chunk_band() {
        let err = ConversionConfig::builder()
            .min_chunk_tables(200)
            .max_chunk_tables(100)
            .build()
            .unwrap_err();
        assert!(matches!(err, Pdf2TablesError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_writers_above_extractors() {
        let err = ConversionConfig::builder()
            .max_extract_workers(1)
            .max_write_workers(3)
            .build()
            .unwrap_err();
        assert!(matches!(err, Pdf2TablesError::InvalidConfig(_)));
    }
}
