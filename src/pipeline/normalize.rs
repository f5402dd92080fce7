//! Normalization: deterministic cleanup of engine output.
//!
//! Engines hand back tables with ragged rows, whitespace padding, blank or
//! duplicated headers, and spacer rows/columns made of nothing. Every
//! transform downstream assumes a rectangular grid with unique column names,
//! so this stage establishes exactly that and nothing more.
//!
//! ## Rule Order
//!
//! 1. Pad ragged rows and drop rows/columns that are entirely blank
//! 2. Trim every cell and header (blank cells become `""`)
//! 3. Name blank headers `Column N` by 1-based position
//! 4. Suffix repeated headers (`name.1`, `name.2`, …) so all names are unique
//!
//! Dropping happens before naming so `Column N` reflects the final position.

use crate::table::{is_blank, ProcessedTable, RawTable};
use std::collections::HashSet;
use tracing::debug;

/// Normalize a raw engine table. Total: never fails.
pub fn normalize(raw: RawTable) -> ProcessedTable {
    let RawTable {
        mut headers,
        mut rows,
        page_number,
        area,
    } = raw;

    // ── Rule 1: rectangular grid, no empty rows or columns ──────────────
    let width = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(headers.len()))
        .max()
        .unwrap_or(0);
    headers.resize(width, String::new());
    for row in &mut rows {
        row.resize(width, String::new());
    }

    let before_rows = rows.len();
    rows.retain(|row| !row.iter().all(|c| is_blank(c)));

    let keep: Vec<usize> = (0..width)
        .filter(|&c| !is_blank(&headers[c]) || rows.iter().any(|row| !is_blank(&row[c])))
        .collect();

    if rows.len() != before_rows || keep.len() != width {
        debug!(
            "Dropped {} empty rows and {} empty columns",
            before_rows - rows.len(),
            width - keep.len()
        );
    }

    // ── Rule 2: trim ────────────────────────────────────────────────────
    let headers: Vec<String> = keep.iter().map(|&c| headers[c].trim().to_string()).collect();
    let rows: Vec<Vec<String>> = rows
        .into_iter()
        .map(|row| keep.iter().map(|&c| row[c].trim().to_string()).collect())
        .collect();

    // ── Rules 3 & 4: names ──────────────────────────────────────────────
    ProcessedTable {
        columns: assign_column_names(headers),
        rows,
        page_number,
        area,
    }
}

/// Give blank headers a positional name and make every name unique.
///
/// The first occurrence of a name keeps it; later ones get the lowest free
/// `.N` suffix. A suffix that another column already uses verbatim is
/// skipped, so `["a", "a", "a.1"]` becomes `["a", "a.2", "a.1"]`.
pub(crate) fn assign_column_names(headers: Vec<String>) -> Vec<String> {
    let named: Vec<String> = headers
        .into_iter()
        .enumerate()
        .map(|(i, h)| {
            let h = h.trim();
            if h.is_empty() {
                format!("Column {}", i + 1)
            } else {
                h.to_string()
            }
        })
        .collect();

    let original: HashSet<String> = named.iter().cloned().collect();
    let mut used: HashSet<String> = HashSet::with_capacity(named.len());
    let mut out = Vec::with_capacity(named.len());

    for name in named {
        if used.insert(name.clone()) {
            out.push(name);
            continue;
        }
        let mut n = 1;
        let unique = loop {
            let candidate = format!("{name}.{n}");
            if !used.contains(&candidate) && !original.contains(&candidate) {
                break candidate;
            }
            n += 1;
        };
        used.insert(unique.clone());
        out.push(unique);
    }

    out
}
