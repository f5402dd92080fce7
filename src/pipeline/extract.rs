//! Extraction: hand the document to a table engine off the async executor.
//!
//! ## Why spawn_blocking?
//!
//! Table detection is CPU-bound and, for the pdfium engine, goes through a
//! C library that is not async-aware. Running it on tokio's blocking pool
//! keeps the worker threads free, so one slow document never stalls the
//! other connections. The result comes back to the session as an ordinary
//! future.

use crate::error::{ExtractionError, TableStreamError};
use crate::table::{Document, RawTable};
use std::sync::Arc;
use tracing::{debug, info};

/// A table-detection engine.
///
/// Implementations are synchronous and may take a long time; callers go
/// through [`extract_tables`], which moves the call onto a blocking thread.
/// Returning an empty `Vec` means "ran fine, found nothing" and is not an
/// error at this layer.
pub trait TableExtractor: Send + Sync {
    /// Short engine name used in logs and error messages.
    fn name(&self) -> &str;

    /// Extract tables in reading order.
    fn extract(&self, document: &Document) -> Result<Vec<RawTable>, ExtractionError>;
}

/// Run `extractor` on `document` inside `spawn_blocking`.
///
/// A panic inside the engine is reported as an [`ExtractionError`] whose
/// detail carries the panic message.
pub async fn extract_tables(
    extractor: Arc<dyn TableExtractor>,
    document: Document,
) -> Result<Vec<RawTable>, TableStreamError> {
    let engine = extractor.name().to_string();
    let filename = document.filename.clone();
    info!(
        "Extracting tables from '{}' ({} bytes) with {}",
        filename,
        document.bytes.len(),
        engine
    );

    let tables = tokio::task::spawn_blocking(move || extractor.extract(&document))
        .await
        .map_err(|e| {
            ExtractionError::new(&engine, &filename, "extraction engine crashed")
                .with_detail(format!("Extraction task failed: {e}"))
        })??;

    debug!("{} returned {} raw tables for '{}'", engine, tables.len(), filename);
    Ok(tables)
}
