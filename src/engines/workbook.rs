//! The built-in workbook serializer: one CSV entry per sheet inside a zip
//! archive.
//!
//! ## Why CSV-in-zip?
//!
//! The pipeline only needs an *append-capable* sheet store; the workbook's
//! binary layout is the serializer's own business. A zip of CSV entries
//! gives incremental append (the zip format appends at the central
//! directory), streams without holding the whole workbook in memory, and
//! opens everywhere — and swapping in an XLSX-native serializer is a
//! [`SpreadsheetWriter`] impl away.

use crate::engines::SpreadsheetWriter;
use crate::error::EngineError;
use crate::output::Table;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use zip::{write::SimpleFileOptions, ZipWriter};

/// [`SpreadsheetWriter`] that appends `<sheet>.csv` entries to a `.zip`
/// workbook.
///
/// Appends must be serialised by the caller (the pipeline's chunk writer
/// already does this): each call reopens the artifact in append mode.
#[derive(Debug, Default)]
pub struct ZipWorkbookWriter;

impl ZipWorkbookWriter {
    pub fn new() -> Self {
        Self
    }
}

impl SpreadsheetWriter for ZipWorkbookWriter {
    fn append_sheet(
        &self,
        output: &Path,
        sheet_name: &str,
        table: &Table,
    ) -> Result<(), EngineError> {
        let mut buf = Vec::new();
        {
            let mut csv_writer = csv::WriterBuilder::new()
                .terminator(csv::Terminator::CRLF)
                .flexible(true)
                .from_writer(&mut buf);
            for row in &table.rows {
                csv_writer
                    .write_record(row)
                    .map_err(|e| EngineError::new(format!("encoding sheet '{sheet_name}': {e}")))?;
            }
            csv_writer
                .flush()
                .map_err(|e| EngineError::new(format!("encoding sheet '{sheet_name}': {e}")))?;
        }

        let mut zip = if output.exists() {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(output)
                .map_err(|e| {
                    EngineError::new(format!("opening workbook '{}': {e}", output.display()))
                })?;
            ZipWriter::new_append(file)
                .map_err(|e| EngineError::new(format!("appending to workbook: {e}")))?
        } else {
            let file = File::create(output).map_err(|e| {
                EngineError::new(format!("creating workbook '{}': {e}", output.display()))
            })?;
            ZipWriter::new(file)
        };

        zip.start_file(format!("{sheet_name}.csv"), SimpleFileOptions::default())
            .map_err(|e| EngineError::new(format!("starting sheet '{sheet_name}': {e}")))?;
        zip.write_all(&buf)
            .map_err(|e| EngineError::new(format!("writing sheet '{sheet_name}': {e}")))?;
        zip.finish()
            .map_err(|e| EngineError::new(format!("finishing workbook: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn appends_sheets_incrementally() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("book.zip");
        let writer = ZipWorkbookWriter::new();

        let first = Table::from(vec![vec!["h1", "h2"], vec!["a", "b"]]);
        let second = Table::from(vec![vec!["only"]]);
        writer.append_sheet(&output, "Table_1", &first).unwrap();
        writer.append_sheet(&output, "Table_2", &second).unwrap();

        let mut archive = ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let names: Vec<String> = archive.file_names().map(String::from).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"Table_1.csv".to_string()));
        assert!(names.contains(&"Table_2.csv".to_string()));

        let mut content = String::new();
        archive
            .by_name("Table_1.csv")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "h1,h2\r\na,b\r\n");
    }

    #[test]
    fn ragged_rows_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("ragged.zip");
        let table = Table::from(vec![vec!["a", "b", "c"], vec!["d"]]);
        ZipWorkbookWriter::new()
            .append_sheet(&output, "Table_1", &table)
            .unwrap();
        assert!(output.exists());
    }
}
