//! Configuration types for table streaming.
//!
//! Per-connection behaviour lives in [`StreamConfig`], built via its
//! [`StreamConfigBuilder`]; the listening socket lives in [`ServerConfig`].
//! Every session gets a clone of the same `StreamConfig`, so two connections
//! can never disagree about pacing or error detail.

use crate::error::TableStreamError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration shared by every session.
///
/// # Example
/// ```rust
/// use tablestream::StreamConfig;
///
/// let config = StreamConfig::builder()
///     .table_pause_ms(0)
///     .include_traceback(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.table_pause_ms, 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Pause after each table event, in milliseconds. Default: 100.
    ///
    /// Bounds the output rate so a document with hundreds of small tables
    /// does not flood the socket faster than the client can render them.
    pub table_pause_ms: u64,

    /// Capacity of the per-connection outbound message channel. Default: 64.
    pub outbound_buffer: usize,

    /// Include the diagnostic `traceback` field on error events. Default: true.
    pub include_traceback: bool,

    /// Minimum consecutive rows the built-in engine needs to call a block a table. Default: 2.
    pub min_table_rows: usize,

    /// Minimum cells per line for the built-in engine. Default: 2.
    pub min_table_cols: usize,

    /// Path to a libpdfium shared library. If None, the system library is used.
    pub pdfium_library_path: Option<PathBuf>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            table_pause_ms: 100,
            outbound_buffer: 64,
            include_traceback: true,
            min_table_rows: 2,
            min_table_cols: 2,
            pdfium_library_path: None,
        }
    }
}

impl StreamConfig {
    /// Create a new builder for `StreamConfig`.
    pub fn builder() -> StreamConfigBuilder {
        StreamConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`StreamConfig`].
#[derive(Debug)]
pub struct StreamConfigBuilder {
    config: StreamConfig,
}

impl StreamConfigBuilder {
    pub fn table_pause_ms(mut self, ms: u64) -> Self {
        self.config.table_pause_ms = ms;
        self
    }

    pub fn outbound_buffer(mut self, n: usize) -> Self {
        self.config.outbound_buffer = n;
        self
    }

    pub fn include_traceback(mut self, v: bool) -> Self {
        self.config.include_traceback = v;
        self
    }

    pub fn min_table_rows(mut self, n: usize) -> Self {
        self.config.min_table_rows = n;
        self
    }

    pub fn min_table_cols(mut self, n: usize) -> Self {
        self.config.min_table_cols = n;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<StreamConfig, TableStreamError> {
        let c = &self.config;
        if c.outbound_buffer == 0 {
            return Err(TableStreamError::InvalidConfig(
                "Outbound buffer must be ≥ 1".into(),
            ));
        }
        if c.min_table_rows == 0 || c.min_table_cols == 0 {
            return Err(TableStreamError::InvalidConfig(format!(
                "Table detection minimums must be ≥ 1, got {} rows × {} cols",
                c.min_table_rows, c.min_table_cols
            )));
        }
        Ok(self.config)
    }
}

/// Where the HTTP/WebSocket server listens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind. Default: `0.0.0.0:8000`.
    pub bind_addr: String,
    /// Route serving the WebSocket upgrade. Default: `/ws/pdf/`.
    pub ws_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            ws_path: "/ws/pdf/".to_string(),
        }
    }
}
