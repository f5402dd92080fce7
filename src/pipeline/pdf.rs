//! Built-in PDF engine: pdfium page text + [`layout`](super::layout) heuristics.
//!
//! The document is loaded straight from the uploaded bytes, so nothing is
//! ever written to disk. pdfium is bound when [`PdfiumExtractor::extract`]
//! runs rather than at construction, so a server without the native library
//! still starts and reports a clear extraction error per upload.

use crate::config::StreamConfig;
use crate::error::ExtractionError;
use crate::pipeline::extract::TableExtractor;
use crate::pipeline::layout;
use crate::table::{Document, RawTable};
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

const ENGINE: &str = "pdfium";

/// Table extractor backed by pdfium-render.
#[derive(Debug, Clone)]
pub struct PdfiumExtractor {
    library_path: Option<PathBuf>,
    min_rows: usize,
    min_cols: usize,
}

impl PdfiumExtractor {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            library_path: config.pdfium_library_path.clone(),
            min_rows: config.min_table_rows,
            min_cols: config.min_table_cols,
        }
    }

    fn bind(&self, filename: &str) -> Result<Pdfium, ExtractionError> {
        let bindings = match &self.library_path {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| {
            ExtractionError::new(ENGINE, filename, "PDF engine is unavailable on this server")
                .with_detail(format!("Failed to bind to pdfium library: {e:?}"))
        })?;
        Ok(Pdfium::new(bindings))
    }
}

impl TableExtractor for PdfiumExtractor {
    fn name(&self) -> &str {
        ENGINE
    }

    fn extract(&self, document: &Document) -> Result<Vec<RawTable>, ExtractionError> {
        let filename = document.filename.as_str();
        let pdfium = self.bind(filename)?;

        let pdf = pdfium
            .load_pdf_from_byte_slice(&document.bytes, None)
            .map_err(|e| {
                let detail = format!("{e:?}");
                let message = if detail.contains("Password") || detail.contains("password") {
                    "document is encrypted"
                } else {
                    "document is corrupt or not a PDF"
                };
                ExtractionError::new(ENGINE, filename, message).with_detail(detail)
            })?;

        let pages = pdf.pages();
        info!("PDF loaded: {} pages", pages.len());

        let mut tables = Vec::new();
        for (idx, page) in pages.iter().enumerate() {
            let page_number = idx as u32 + 1;
            let text = page.text().map_err(|e| {
                let message = format!("cannot read text of page {page_number}");
                ExtractionError::new(ENGINE, filename, message).with_detail(format!("{e:?}"))
            })?;

            let found =
                layout::detect_tables(page_number, &text.all(), self.min_rows, self.min_cols);
            debug!("Page {}: {} tables", page_number, found.len());
            tables.extend(found);
        }

        Ok(tables)
    }
}
