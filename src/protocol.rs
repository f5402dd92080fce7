//! Wire protocol: JSON text frames exchanged over the WebSocket.
//!
//! ```text
//! client → server   {"type":"upload","filename":..,"content":"<meta>,<b64>","operation":..}
//! server → client   {"type":"progress","message":..,"percentage":..}
//!                   {"type":"table","content":<csv>,"table_number":..,"total_tables":.., ...}
//!                   {"type":"error","message":..,"traceback"?:..}
//! ```
//!
//! Frames that are not JSON, or whose `type` is anything but `upload`, are
//! not errors: the client may send keep-alives or future message kinds.

use crate::error::DecodeError;
use crate::table::TableArea;
use serde::{Deserialize, Serialize};

/// A request to process one document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UploadRequest {
    pub filename: String,
    /// Data-URI style content: `<prefix>,<base64 payload>`.
    pub content: String,
    /// Operation name, validated later so an unknown name is reported as such.
    pub operation: String,
}

/// What an inbound frame turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Upload(UploadRequest),
    /// Anything the session does not act on.
    Ignored,
}

/// Classify an inbound text frame.
///
/// Only a frame that claims to be an upload can fail; everything else is
/// [`ClientMessage::Ignored`].
pub fn parse_client_message(text: &str) -> Result<ClientMessage, DecodeError> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return Ok(ClientMessage::Ignored),
    };

    if value.get("type").and_then(|t| t.as_str()) != Some("upload") {
        return Ok(ClientMessage::Ignored);
    }

    serde_json::from_value(value)
        .map(ClientMessage::Upload)
        .map_err(|e| DecodeError::MalformedRequest(e.to_string()))
}

/// A message sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Progress(ProgressEvent),
    Table(TableEvent),
    Error(ErrorEvent),
}

impl ServerMessage {
    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn percentage(&self) -> Option<u8> {
        match self {
            ServerMessage::Progress(p) => Some(p.percentage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub message: String,
    /// 0–100.
    pub percentage: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEvent {
    /// CSV text, header line first.
    pub content: String,
    /// 1-indexed position in extraction order.
    pub table_number: usize,
    pub total_tables: usize,
    pub columns: Vec<String>,
    pub row_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_area: Option<TableArea>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_upload() {
        let msg = parse_client_message(
            r#"{"type":"upload","filename":"a.pdf","content":"data:application/pdf;base64,JVBERg==","operation":"basic"}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::Upload(req) => {
                assert_eq!(req.filename, "a.pdf");
                assert_eq!(req.operation, "basic");
            }
            other => panic!("expected upload, got {other:?}"),
        }
    }

    #[test]
    fn other_types_and_garbage_are_ignored() {
        assert_eq!(
            parse_client_message(r#"{"type":"ping"}"#).unwrap(),
            ClientMessage::Ignored
        );
        assert_eq!(parse_client_message("{}").unwrap(), ClientMessage::Ignored);
        assert_eq!(
            parse_client_message("not json at all").unwrap(),
            ClientMessage::Ignored
        );
    }

    #[test]
    fn upload_missing_fields_is_malformed() {
        let err = parse_client_message(r#"{"type":"upload","filename":"a.pdf"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedRequest(_)));
    }

    #[test]
    fn progress_wire_shape() {
        let msg = ServerMessage::Progress(ProgressEvent {
            message: "Ready for upload".into(),
            percentage: 0,
        });
        let v: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(v["type"], "progress");
        assert_eq!(v["percentage"], 0);
        assert_eq!(v["message"], "Ready for upload");
    }

    #[test]
    fn optional_fields_are_omitted() {
        let table = ServerMessage::Table(TableEvent {
            content: "a,b\n1,2\n".into(),
            table_number: 1,
            total_tables: 1,
            columns: vec!["a".into(), "b".into()],
            row_count: 1,
            page_number: None,
            table_area: None,
        });
        let json = table.to_json().unwrap();
        assert!(!json.contains("page_number"), "got: {json}");
        assert!(!json.contains("table_area"), "got: {json}");

        let err = ServerMessage::Error(ErrorEvent {
            message: "boom".into(),
            traceback: None,
        });
        assert!(!err.to_json().unwrap().contains("traceback"));
    }

    #[test]
    fn table_provenance_is_serialised() {
        let table = ServerMessage::Table(TableEvent {
            content: String::new(),
            table_number: 2,
            total_tables: 3,
            columns: vec![],
            row_count: 0,
            page_number: Some(4),
            table_area: Some(TableArea {
                top: 10.0,
                left: 20.0,
                bottom: 300.0,
                right: 400.0,
            }),
        });
        let v: serde_json::Value = serde_json::from_str(&table.to_json().unwrap()).unwrap();
        assert_eq!(v["type"], "table");
        assert_eq!(v["page_number"], 4);
        assert_eq!(v["table_area"]["right"], 400.0);
        let back: ServerMessage = serde_json::from_value(v).unwrap();
        assert_eq!(back, table);
    }
}
