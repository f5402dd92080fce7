//! Serialization: processed table → CSV text plus table metadata.

use crate::error::TableStreamError;
use crate::protocol::TableEvent;
use crate::table::ProcessedTable;
use csv::{QuoteStyle, Terminator, WriterBuilder};

/// Write the table as CSV: header line first, `\n` line endings, fields
/// quoted only when they contain a comma, a quote, or a line break.
pub fn to_csv(table: &ProcessedTable) -> Result<String, csv::Error> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::<u8>::new());

    if !table.columns.is_empty() {
        writer.write_record(&table.columns)?;
    }
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    // Every field came in as a `String`, so the buffer is valid UTF-8.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Build the `table` event for table `table_number` (1-based) of `total_tables`.
pub fn serialize(
    table: &ProcessedTable,
    table_number: usize,
    total_tables: usize,
) -> Result<TableEvent, TableStreamError> {
    let content = to_csv(table).map_err(|e| TableStreamError::Serialization {
        table_number,
        detail: e.to_string(),
    })?;

    Ok(TableEvent {
        content,
        table_number,
        total_tables,
        columns: table.columns.clone(),
        row_count: table.row_count(),
        page_number: table.page_number,
        table_area: table.area,
    })
}
