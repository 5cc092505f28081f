//! Page counting via pdfium.
//!
//! pdfium is bound at runtime (`Pdfium::default()` searches the current
//! directory, then the system library path), so a missing shared library
//! surfaces as an [`EngineError`] on first use rather than a build failure.

use crate::engines::PageCounter;
use crate::error::EngineError;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::debug;

/// [`PageCounter`] backed by the pdfium library.
#[derive(Debug, Default)]
pub struct PdfiumPageCounter;

impl PdfiumPageCounter {
    pub fn new() -> Self {
        Self
    }
}

impl PageCounter for PdfiumPageCounter {
    fn count_pages(&self, document: &Path) -> Result<usize, EngineError> {
        let pdfium = Pdfium::default();
        let document = pdfium
            .load_pdf_from_file(document, None)
            .map_err(|e| EngineError::new(format!("{e:?}")))?;
        let pages = document.pages().len() as usize;
        debug!("PDF loaded: {} pages", pages);
        Ok(pages)
    }
}
