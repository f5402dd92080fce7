//! Progress accounting and the outbound event path.
//!
//! [`ProgressReporter`] is the only thing in a session that sends messages to
//! the client. It owns the schedule for one upload:
//!
//! ```text
//!   0%  connection ready (once per connection)
//!  10%  upload accepted
//!  30%  extraction finished
//!  30 + (i+1)·60/N   before table i (0-based) of N
//! 100%  after the last table
//! ```
//!
//! Percentages never move backwards within an upload; a regression is
//! logged and held at the last value instead of being sent.

use crate::protocol::{ErrorEvent, ProgressEvent, ServerMessage, TableEvent};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub const READY_PERCENT: u8 = 0;
pub const ACCEPTED_PERCENT: u8 = 10;
pub const EXTRACTED_PERCENT: u8 = 30;
pub const COMPLETE_PERCENT: u8 = 100;

/// Percentage to report with table `index` (0-based) of `total`.
///
/// Integer division, so the value for the last table is always 90 and the
/// sequence is non-decreasing for any `total`.
pub fn table_percentage(index: usize, total: usize) -> u8 {
    if total == 0 {
        return EXTRACTED_PERCENT;
    }
    let step = ((index + 1).min(total) * 60) / total;
    EXTRACTED_PERCENT + step as u8
}

/// Sends progress, table and error events for one connection.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::Sender<ServerMessage>,
    last: u8,
}

impl ProgressReporter {
    pub fn new(tx: mpsc::Sender<ServerMessage>) -> Self {
        Self { tx, last: 0 }
    }

    /// Start the schedule for a new upload.
    pub fn reset(&mut self) {
        self.last = 0;
    }

    /// Last percentage sent since the previous reset.
    pub fn last_percentage(&self) -> u8 {
        self.last
    }

    /// Send a progress event, clamped to 0–100 and never below the last one.
    ///
    /// Returns false once the client has gone away.
    pub async fn progress(&mut self, message: impl Into<String>, percentage: u8) -> bool {
        let mut percentage = percentage.min(COMPLETE_PERCENT);
        if percentage < self.last {
            warn!(
                "Progress would regress from {}% to {}%; holding",
                self.last, percentage
            );
            percentage = self.last;
        }
        self.last = percentage;

        let message = message.into();
        debug!("progress {}%: {}", percentage, message);
        self.send(ServerMessage::Progress(ProgressEvent {
            message,
            percentage,
        }))
        .await
    }

    pub async fn table(&self, event: TableEvent) -> bool {
        self.send(ServerMessage::Table(event)).await
    }

    pub async fn error(&self, message: impl Into<String>, traceback: Option<String>) -> bool {
        self.send(ServerMessage::Error(ErrorEvent {
            message: message.into(),
            traceback,
        }))
        .await
    }

    async fn send(&self, msg: ServerMessage) -> bool {
        if self.tx.send(msg).await.is_err() {
            debug!("Outbound channel closed; dropping event");
            return false;
        }
        true
    }
}
