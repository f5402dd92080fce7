//! Table and document types flowing through the pipeline.
//!
//! A [`RawTable`] is whatever the engine produced: headers and rows of cell
//! strings, possibly ragged, possibly full of whitespace. The normalizer turns
//! it into a [`ProcessedTable`], which is rectangular and has unique column
//! names; every transform preserves that shape.

use serde::{Deserialize, Serialize};

/// An uploaded document, decoded and ready for extraction.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// Position of a table on its page, in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableArea {
    pub top: f32,
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
}

/// A table as produced by the extraction engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Header cells. May be blank, duplicated, or shorter than the rows.
    pub headers: Vec<String>,
    /// Data rows. May be ragged.
    pub rows: Vec<Vec<String>>,
    /// 1-indexed page the table was found on.
    pub page_number: Option<u32>,
    /// Bounding box on the page.
    pub area: Option<TableArea>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            headers,
            rows,
            page_number: None,
            area: None,
        }
    }

    pub fn with_page(mut self, page_number: u32) -> Self {
        self.page_number = Some(page_number);
        self
    }

    pub fn with_area(mut self, area: TableArea) -> Self {
        self.area = Some(area);
        self
    }
}

/// A normalized table: rectangular, with unique column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessedTable {
    pub columns: Vec<String>,
    /// Every row has exactly `columns.len()` cells.
    pub rows: Vec<Vec<String>>,
    pub page_number: Option<u32>,
    pub area: Option<TableArea>,
}

impl ProcessedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Cells of column `idx`, top to bottom.
    #[cfg(test)]
    pub(crate) fn column(&self, idx: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |row| row[idx].as_str())
    }
}

/// True when a cell holds nothing but whitespace.
pub(crate) fn is_blank(cell: &str) -> bool {
    cell.trim().is_empty()
}
