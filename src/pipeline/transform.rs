//! Transform dispatch: one named [`Operation`] applied to a normalized table.
//!
//! The set of operations is closed. Adding one means adding an enum variant,
//! and the exhaustive `match` in [`Operation::apply`] refuses to compile
//! until it is handled.
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | `basic` | identity |
//! | `merge_rows` | drop rows whose full cell tuple was already seen |
//! | `clean_headers` | trim + lowercase column names |
//! | `fill_empty` | forward-fill blank cells down each column |
//! | `remove_empty` | drop all-blank data columns, then all-blank rows |
//! | `transpose` | swap rows and columns; first output row is the new header |

use crate::error::TableStreamError;
use crate::pipeline::normalize::assign_column_names;
use crate::table::{is_blank, ProcessedTable};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// A table transform selected by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    #[default]
    Basic,
    MergeRows,
    CleanHeaders,
    FillEmpty,
    RemoveEmpty,
    Transpose,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Basic,
        Operation::MergeRows,
        Operation::CleanHeaders,
        Operation::FillEmpty,
        Operation::RemoveEmpty,
        Operation::Transpose,
    ];

    /// Wire name, e.g. `merge_rows`.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Basic => "basic",
            Operation::MergeRows => "merge_rows",
            Operation::CleanHeaders => "clean_headers",
            Operation::FillEmpty => "fill_empty",
            Operation::RemoveEmpty => "remove_empty",
            Operation::Transpose => "transpose",
        }
    }

    /// Apply the transform. Pure; the input is consumed.
    pub fn apply(self, table: ProcessedTable) -> ProcessedTable {
        match self {
            Operation::Basic => table,
            Operation::MergeRows => merge_rows(table),
            Operation::CleanHeaders => clean_headers(table),
            Operation::FillEmpty => fill_empty(table),
            Operation::RemoveEmpty => remove_empty(table),
            Operation::Transpose => transpose(table),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = TableStreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| TableStreamError::UnknownOperation {
                name: s.to_string(),
                expected: Operation::ALL.map(Operation::as_str).join(", "),
            })
    }
}

fn merge_rows(mut table: ProcessedTable) -> ProcessedTable {
    let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(table.rows.len());
    table.rows.retain(|row| seen.insert(row.clone()));
    table
}

fn clean_headers(mut table: ProcessedTable) -> ProcessedTable {
    let lowered = table
        .columns
        .iter()
        .map(|c| c.trim().to_lowercase())
        .collect();
    // "Name" and "name" collapse to the same key; re-suffix to stay unique.
    table.columns = assign_column_names(lowered);
    table
}

fn fill_empty(mut table: ProcessedTable) -> ProcessedTable {
    for c in 0..table.columns.len() {
        let mut last: Option<String> = None;
        for row in &mut table.rows {
            if is_blank(&row[c]) {
                row[c] = last.clone().unwrap_or_default();
            } else {
                last = Some(row[c].clone());
            }
        }
    }
    table
}

fn remove_empty(table: ProcessedTable) -> ProcessedTable {
    let ProcessedTable {
        columns,
        rows,
        page_number,
        area,
    } = table;

    let keep: Vec<usize> = (0..columns.len())
        .filter(|&c| rows.iter().any(|row| !is_blank(&row[c])))
        .collect();

    let rows = rows
        .into_iter()
        .map(|row| keep.iter().map(|&c| row[c].clone()).collect::<Vec<_>>())
        .filter(|row| !row.iter().all(|c| is_blank(c)))
        .collect();

    ProcessedTable {
        columns: keep.iter().map(|&c| columns[c].clone()).collect(),
        rows,
        page_number,
        area,
    }
}

/// Transpose the whole grid, header row included.
///
/// An R×C table is an (R+1)×C grid; its transpose is C×(R+1). The first
/// transposed row (the original first column, header first) becomes the new
/// header, leaving C−1 data rows of R+1 cells.
fn transpose(table: ProcessedTable) -> ProcessedTable {
    let ProcessedTable {
        columns,
        rows,
        page_number,
        area,
    } = table;

    let mut grid: Vec<Vec<String>> = columns
        .into_iter()
        .enumerate()
        .map(|(c, header)| {
            std::iter::once(header)
                .chain(rows.iter().map(|row| row[c].clone()))
                .collect()
        })
        .collect();

    if grid.is_empty() {
        return ProcessedTable {
            columns: Vec::new(),
            rows: Vec::new(),
            page_number,
            area,
        };
    }

    let header = grid.remove(0);
    ProcessedTable {
        columns: assign_column_names(header),
        rows: grid,
        page_number,
        area,
    }
}
