//! Range extraction via tabula-java.
//!
//! The same engine the GUI-era converter used, reached through the `tabula`
//! crate's JVM bridge. Table-detection heuristics live entirely inside
//! tabula; this adapter only maps a page range to a list of [`Table`]s.
//!
//! The JVM bridge is serialised behind a mutex: attaching several threads
//! concurrently has proven flaky, and extraction batches arrive at most a
//! handful at a time anyway.

use crate::engines::TableExtractor;
use crate::error::EngineError;
use crate::output::Table;
use serde::Deserialize;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Environment variable naming the tabula-java jar.
pub const TABULA_JAR_ENV: &str = "TABULA_JAR";

/// Tabula's JSON output shape, reduced to the fields we consume; serde
/// skips the geometry fields.
#[derive(Deserialize, Debug)]
#[serde(transparent)]
struct JsonTableSet(Vec<JsonTable>);

#[derive(Deserialize, Debug)]
struct JsonTable {
    data: Vec<JsonRow>,
}

#[derive(Deserialize, Debug)]
#[serde(transparent)]
struct JsonRow(Vec<JsonCell>);

#[derive(Deserialize, Debug)]
struct JsonCell {
    text: String,
}

impl From<JsonTable> for Table {
    fn from(value: JsonTable) -> Self {
        Table {
            rows: value
                .data
                .into_iter()
                .map(|row| row.0.into_iter().map(|cell| cell.text).collect())
                .collect(),
        }
    }
}

/// [`TableExtractor`] backed by tabula-java.
pub struct TabulaExtractor {
    vm: Mutex<tabula::TabulaVM>,
}

impl TabulaExtractor {
    /// Start a JVM against the given tabula-java jar.
    pub fn new(jar_path: &str) -> Result<Self, EngineError> {
        let vm = tabula::TabulaVM::new(jar_path, false)
            .map_err(|e| EngineError::new(format!("starting TabulaVM: {e}")))?;
        Ok(Self { vm: Mutex::new(vm) })
    }

    /// Start the engine from the `TABULA_JAR` environment variable.
    pub fn from_env() -> Result<Self, EngineError> {
        let jar = std::env::var(TABULA_JAR_ENV).map_err(|_| {
            EngineError::new(format!("{TABULA_JAR_ENV} is not set"))
        })?;
        Self::new(&jar)
    }
}

impl TableExtractor for TabulaExtractor {
    fn extract_tables(
        &self,
        document: &Path,
        start_page: usize,
        end_page: usize,
    ) -> Result<Vec<Table>, EngineError> {
        let pages: Vec<i32> = (start_page..=end_page).map(|p| p as i32).collect();

        let vm = self.vm.lock().unwrap_or_else(PoisonError::into_inner);
        let env = vm
            .attach()
            .map_err(|e| EngineError::new(format!("attaching to TabulaVM: {e}")))?;
        let tabula = env
            .configure_tabula(
                None,
                Some(&pages),
                tabula::OutputFormat::Json,
                false,
                tabula::ExtractionMethod::Decide,
                false,
                None,
            )
            .map_err(|e| EngineError::new(format!("configuring tabula: {e}")))?;

        let extracted = tempfile::NamedTempFile::new()
            .map_err(|e| EngineError::new(format!("creating temp output: {e}")))?;
        tabula
            .parse_document_into(document, extracted.path())
            .map_err(|e| EngineError::new(format!("extracting pages {start_page}-{end_page}: {e}")))?;

        let parsed: JsonTableSet = serde_json::from_reader(extracted)
            .map_err(|e| EngineError::new(format!("parsing tabula JSON output: {e}")))?;
        Ok(parsed.0.into_iter().map(Table::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_output_maps_to_tables() {
        let raw = r#"[{
            "extraction_method": "lattice",
            "page_number": 1,
            "top": 0.0, "left": 0.0, "width": 10.0, "height": 5.0,
            "right": 10.0, "bottom": 5.0,
            "data": [
                [{"top":0,"left":0,"width":1,"height":1,"text":"h1"},
                 {"top":0,"left":1,"width":1,"height":1,"text":"h2"}],
                [{"top":1,"left":0,"width":1,"height":1,"text":"a"},
                 {"top":1,"left":1,"width":1,"height":1,"text":"b"}]
            ]
        }]"#;
        let parsed: JsonTableSet = serde_json::from_str(raw).unwrap();
        let tables: Vec<Table> = parsed.0.into_iter().map(Table::from).collect();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows[0], vec!["h1".to_string(), "h2".to_string()]);
        assert_eq!(tables[0].rows[1], vec!["a".to_string(), "b".to_string()]);
    }
}
