//! Upload decoding: data-URI style content → raw document bytes.
//!
//! Browsers produce `FileReader.readAsDataURL` strings such as
//! `data:application/pdf;base64,JVBERi0xLjQK...`. Only the segment after the
//! first comma carries the document; the prefix is informational and ignored.

use crate::error::DecodeError;
use crate::protocol::UploadRequest;
use crate::table::Document;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// Decode the base64 payload of a `<prefix>,<base64>` string.
pub fn decode_content(content: &str) -> Result<Vec<u8>, DecodeError> {
    let payload = match content.split_once(',') {
        Some((_, payload)) => payload.trim(),
        None => return Err(DecodeError::MissingPayload),
    };
    if payload.is_empty() {
        return Err(DecodeError::MissingPayload);
    }

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| DecodeError::InvalidBase64(e.to_string()))?;
    debug!("Decoded upload payload → {} bytes", bytes.len());
    Ok(bytes)
}

/// Turn an upload request into a [`Document`].
pub fn decode_upload(request: &UploadRequest) -> Result<Document, DecodeError> {
    let bytes = decode_content(&request.content)?;
    Ok(Document::new(request.filename.clone(), bytes))
}
