//! Error types for the tablestream library.
//!
//! Each pipeline stage fails with its own type so the session can tell an
//! expected outcome (nothing found, bad operation name) from an engine crash:
//!
//! * [`DecodeError`]: the upload payload could not be turned into bytes.
//! * [`ExtractionError`]: the table engine failed on the document.
//! * [`TableStreamError`]: the union the session reports to the client.
//!   Every variant becomes exactly one `error` event; none of them closes
//!   the connection.

use thiserror::Error;

/// All errors surfaced to a connected client.
#[derive(Debug, Error)]
pub enum TableStreamError {
    // ── Upload errors ─────────────────────────────────────────────────────
    /// The upload request or its encoded content was malformed.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A second upload arrived while one was still running on the connection.
    #[error("An upload is already being processed on this connection; wait for it to finish")]
    UploadInProgress,

    /// The requested operation name is not one of the supported transforms.
    #[error("Unknown operation '{name}'. Expected one of: {expected}")]
    UnknownOperation { name: String, expected: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The extraction engine failed on the document.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The engine ran successfully but found no tables.
    #[error("No tables found in '{filename}'")]
    NoTablesFound { filename: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// A processed table could not be written as CSV.
    #[error("Failed to serialise table {table_number}: {detail}")]
    Serialization { table_number: usize, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TableStreamError {
    /// Stable snake_case tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TableStreamError::Decode(_) => "decode_error",
            TableStreamError::UploadInProgress => "upload_in_progress",
            TableStreamError::UnknownOperation { .. } => "unknown_operation",
            TableStreamError::Extraction(_) => "extraction_error",
            TableStreamError::NoTablesFound { .. } => "no_tables_found",
            TableStreamError::Serialization { .. } => "serialization_error",
            TableStreamError::InvalidConfig(_) => "invalid_config",
            TableStreamError::Internal(_) => "internal_error",
        }
    }

    /// Diagnostic detail for operator-side logging.
    ///
    /// Only unexpected failures carry one; user errors such as a bad
    /// operation name or an empty document return `None`.
    pub fn traceback(&self) -> Option<String> {
        match self {
            TableStreamError::Extraction(e) => Some(e.detail.clone()),
            TableStreamError::Internal(detail) => Some(detail.clone()),
            _ => None,
        }
    }
}

/// Failure to decode an upload request into document bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The upload frame is JSON with `type: "upload"` but its fields are wrong.
    #[error("Malformed upload request: {0}")]
    MalformedRequest(String),

    /// The content string has no `,` separator or nothing after it.
    #[error("Upload content is missing its base64 payload (expected '<prefix>,<base64>')")]
    MissingPayload,

    /// The payload segment is not valid base64.
    #[error("Upload content is not valid base64: {0}")]
    InvalidBase64(String),
}

/// The extraction engine could not read tables from a document.
#[derive(Debug, Clone, Error)]
#[error("Failed to extract tables from '{filename}' with {engine}: {message}")]
pub struct ExtractionError {
    /// Name of the engine that failed.
    pub engine: String,
    /// Name of the uploaded file.
    pub filename: String,
    /// Short human-readable reason.
    pub message: String,
    /// Full diagnostic detail (engine error chain, panic payload).
    pub detail: String,
}

impl ExtractionError {
    pub fn new(
        engine: impl Into<String>,
        filename: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        Self {
            engine: engine.into(),
            filename: filename.into(),
            detail: message.clone(),
            message,
        }
    }

    /// Attach diagnostic detail distinct from the user-facing message.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}
