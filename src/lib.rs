//! # tablestream
//!
//! Stream tables extracted from uploaded PDF documents to WebSocket clients,
//! with live progress.
//!
//! A client connects, receives a `progress` event at 0%, and sends one
//! `upload` frame carrying the document as a data-URI and the name of a
//! table operation. The server decodes it, extracts tables off the async
//! executor, then normalizes, transforms and CSV-encodes each table, sending
//! it as soon as it is ready. Failures become a single `error` event and the
//! connection stays open for the next upload.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload frame
//!  │
//!  ├─ 1. Decode     data-URI → bytes                           10%
//!  ├─ 2. Extract    engine on spawn_blocking                   30%
//!  ├─ 3. Normalize  trim, drop empties, unique headers
//!  ├─ 4. Transform  basic | merge_rows | clean_headers |
//!  │                fill_empty | remove_empty | transpose
//!  ├─ 5. Serialize  CSV + metadata → `table` event    30 + (i+1)·60/N
//!  └─ 6. Done                                                 100%
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tablestream::{server, AppState, ServerConfig, StreamConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StreamConfig::default();
//!     let extractor = Arc::new(tablestream::PdfiumExtractor::new(&config));
//!     let state = AppState::new(config, extractor);
//!     server::serve(&ServerConfig::default(), state).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `tablestream` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `pdfium` | on      | Built-in PDF engine via pdfium-render; bring your own [`TableExtractor`] without it |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod protocol;
pub mod server;
pub mod session;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServerConfig, StreamConfig, StreamConfigBuilder};
pub use error::{DecodeError, ExtractionError, TableStreamError};
pub use pipeline::extract::TableExtractor;
#[cfg(feature = "pdfium")]
pub use pipeline::pdf::PdfiumExtractor;
pub use pipeline::transform::Operation;
pub use progress::ProgressReporter;
pub use protocol::{ErrorEvent, ProgressEvent, ServerMessage, TableEvent, UploadRequest};
pub use server::AppState;
pub use session::{Session, SessionPhase};
pub use table::{Document, ProcessedTable, RawTable, TableArea};
