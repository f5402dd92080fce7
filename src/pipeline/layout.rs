//! Layout heuristics for the built-in engine: page text → raw tables.
//!
//! Text extracted from a PDF page keeps column alignment as runs of spaces
//! or tabs. A line that splits into several cells on those gaps is a table
//! row; a run of such lines is a table. The first line of a run is taken as
//! the header, which is what tabular PDFs put there in practice.
//!
//! The rules are cheap and deterministic, and operate on plain `&str` so they
//! can be tested without a PDF library.

use crate::table::RawTable;
use once_cell::sync::Lazy;
use regex::Regex;

/// A column gap: a tab, or two or more whitespace characters.
static RE_CELL_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\t|\s{2,}").unwrap());

/// Split one line of page text into cells on column gaps.
pub fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    RE_CELL_GAP
        .split(trimmed)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Find tables in the text of one page.
///
/// A table is at least `min_rows` consecutive lines of at least `min_cols`
/// cells each (header line included). Anything shorter is prose and is
/// skipped. Rows wider or narrower than the header are kept as-is; the
/// normalizer pads them.
pub fn detect_tables(
    page_number: u32,
    text: &str,
    min_rows: usize,
    min_cols: usize,
) -> Vec<RawTable> {
    let mut tables = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();

    let mut flush = |rows: &mut Vec<Vec<String>>| {
        if rows.len() >= min_rows.max(1) {
            let mut rows = std::mem::take(rows);
            let headers = rows.remove(0);
            tables.push(RawTable::new(headers, rows).with_page(page_number));
        } else {
            rows.clear();
        }
    };

    for line in text.lines() {
        let cells = split_cells(line);
        if cells.len() >= min_cols.max(1) {
            current.push(cells);
        } else {
            flush(&mut current);
        }
    }
    flush(&mut current);

    tables
}
