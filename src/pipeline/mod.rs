//! Pipeline stages for streaming table extraction.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the engine can be swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! decode ──▶ extract ──▶ normalize ──▶ transform ──▶ serialize
//! (base64)   (engine)    (cleanup)     (operation)   (CSV)
//! ```
//!
//! 1. [`decode`]   : data-URI upload content to raw bytes
//! 2. [`extract`]  : run a [`extract::TableExtractor`] on the blocking pool
//! 3. [`normalize`]: rectangular grid, trimmed cells, unique column names
//! 4. [`transform`]: apply the client's [`transform::Operation`]
//! 5. [`serialize`]: CSV text plus table metadata for the `table` event
//!
//! [`layout`] and, with the `pdfium` feature, [`pdf`] make up the built-in
//! engine.

pub mod decode;
pub mod extract;
pub mod layout;
pub mod normalize;
#[cfg(feature = "pdfium")]
pub mod pdf;
pub mod serialize;
pub mod transform;
