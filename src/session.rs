//! Per-connection session: protocol state and the upload pipeline.
//!
//! A [`Session`] is created when a client connects and dropped when it goes
//! away. It tracks an explicit [`SessionPhase`]:
//!
//! ```text
//! Connected ──connect()──▶ AwaitingUpload ──upload──▶ Processing
//!                               ▲                        │
//!                               └──── done / failed ─────┘
//!            any phase ──disconnect()──▶ Closed
//! ```
//!
//! Each upload runs on its own spawned task so the connection keeps reading
//! frames while a long extraction is in flight. A second upload arriving in
//! that window is rejected with an error event; the running one is not
//! touched. Disconnecting aborts the running upload.

use crate::config::StreamConfig;
use crate::error::TableStreamError;
use crate::pipeline::extract::{extract_tables, TableExtractor};
use crate::pipeline::{decode, normalize, serialize, transform::Operation};
use crate::progress::{
    table_percentage, ProgressReporter, ACCEPTED_PERCENT, COMPLETE_PERCENT, EXTRACTED_PERCENT,
    READY_PERCENT,
};
use crate::protocol::{parse_client_message, ClientMessage, ServerMessage, UploadRequest};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connected,
    AwaitingUpload,
    Processing,
    Closed,
}

/// One connection's processing lifecycle.
pub struct Session {
    id: u64,
    config: Arc<StreamConfig>,
    extractor: Arc<dyn TableExtractor>,
    reporter: ProgressReporter,
    // Shared only with this session's own upload task.
    phase: Arc<Mutex<SessionPhase>>,
    in_flight: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(
        id: u64,
        config: Arc<StreamConfig>,
        extractor: Arc<dyn TableExtractor>,
        outbound: mpsc::Sender<ServerMessage>,
    ) -> Self {
        Self {
            id,
            config,
            extractor,
            reporter: ProgressReporter::new(outbound),
            phase: Arc::new(Mutex::new(SessionPhase::Connected)),
            in_flight: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        read_phase(&self.phase)
    }

    /// Mark the session ready and send the 0% progress event.
    pub async fn connect(&mut self) {
        if self.phase() != SessionPhase::Connected {
            warn!("Session {}: connect() called twice; ignoring", self.id);
            return;
        }
        write_phase(&self.phase, SessionPhase::AwaitingUpload);
        info!("Session {}: connected", self.id);
        self.reporter
            .progress("Ready for upload", READY_PERCENT)
            .await;
    }

    /// Handle one inbound text frame.
    ///
    /// Frames that are not upload requests are ignored. An upload is started
    /// in the background; this returns as soon as it has been accepted or
    /// rejected.
    pub async fn handle_message(&mut self, text: &str) {
        match parse_client_message(text) {
            Ok(ClientMessage::Upload(request)) => self.start_upload(request).await,
            Ok(ClientMessage::Ignored) => {
                debug!("Session {}: ignoring non-upload frame", self.id);
            }
            Err(e) => {
                let err = TableStreamError::from(e);
                report_failure(&self.reporter, &self.config, self.id, &err).await;
            }
        }
    }

    async fn start_upload(&mut self, request: UploadRequest) {
        // Decide under the lock, send after releasing it.
        let previous = {
            let mut phase = lock_phase(&self.phase);
            let previous = *phase;
            if previous == SessionPhase::AwaitingUpload {
                *phase = SessionPhase::Processing;
            }
            previous
        };

        match previous {
            SessionPhase::AwaitingUpload => {}
            SessionPhase::Processing => {
                warn!(
                    "Session {}: rejecting upload '{}' while another is processing",
                    self.id, request.filename
                );
                let err = TableStreamError::UploadInProgress;
                report_failure(&self.reporter, &self.config, self.id, &err).await;
                return;
            }
            SessionPhase::Connected | SessionPhase::Closed => {
                warn!(
                    "Session {}: upload '{}' received in phase {:?}; ignoring",
                    self.id, request.filename, previous
                );
                return;
            }
        }

        let id = self.id;
        let config = Arc::clone(&self.config);
        let extractor = Arc::clone(&self.extractor);
        let phase = Arc::clone(&self.phase);
        let mut reporter = self.reporter.clone();

        self.in_flight = Some(tokio::spawn(async move {
            reporter.reset();
            let outcome =
                catch_panic(run_upload(request, &config, extractor, &mut reporter)).await;

            // Free the session before the client can see the terminal event.
            finish_processing(&phase);
            match outcome {
                Ok(total) => {
                    reporter
                        .progress(format!("Completed {total} tables"), COMPLETE_PERCENT)
                        .await;
                }
                Err(e) => report_failure(&reporter, &config, id, &e).await,
            }
        }));
    }

    /// Wait for the in-flight upload, if any, to finish.
    pub async fn join(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!("Session {}: upload task failed: {}", self.id, e);
                }
            }
        }
    }

    /// Close the session and abort any running upload.
    pub fn disconnect(&mut self) {
        write_phase(&self.phase, SessionPhase::Closed);
        if let Some(handle) = self.in_flight.take() {
            if !handle.is_finished() {
                info!("Session {}: aborting in-flight upload", self.id);
            }
            handle.abort();
        }
        info!("Session {}: closed", self.id);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}

/// Run the pipeline for one upload, emitting progress and table events.
///
/// Returns the number of tables sent. The terminal event (100% or the
/// error) is left to the caller so the session can take the next upload
/// before the client sees it. Any error stops the pipeline before further
/// events.
pub async fn run_upload(
    request: UploadRequest,
    config: &StreamConfig,
    extractor: Arc<dyn TableExtractor>,
    reporter: &mut ProgressReporter,
) -> Result<usize, TableStreamError> {
    let started = Instant::now();
    info!(
        "Starting upload '{}' (operation: {})",
        request.filename, request.operation
    );

    reporter
        .progress(format!("Processing {}", request.filename), ACCEPTED_PERCENT)
        .await;

    let operation: Operation = request.operation.parse()?;
    let document = decode::decode_upload(&request)?;
    let filename = document.filename.clone();

    let raw_tables = extract_tables(extractor, document).await?;
    if raw_tables.is_empty() {
        return Err(TableStreamError::NoTablesFound { filename });
    }
    let total = raw_tables.len();

    reporter
        .progress(format!("Found {total} tables"), EXTRACTED_PERCENT)
        .await;

    for (idx, raw) in raw_tables.into_iter().enumerate() {
        let table_number = idx + 1;
        let table = operation.apply(normalize::normalize(raw));
        let event = serialize::serialize(&table, table_number, total)?;
        debug!(
            "Table {}/{}: {} columns × {} rows",
            table_number,
            total,
            table.column_count(),
            table.row_count()
        );

        reporter
            .progress(
                format!("Processing table {table_number} of {total}"),
                table_percentage(idx, total),
            )
            .await;
        if !reporter.table(event).await {
            info!("Client left during '{}' after {} tables", filename, idx);
            return Ok(idx);
        }

        if config.table_pause_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.table_pause_ms)).await;
        }
    }

    info!(
        "Upload '{}' complete: {} tables in {}ms",
        filename,
        total,
        started.elapsed().as_millis()
    );
    Ok(total)
}

/// Turn a panic inside `upload` into [`TableStreamError::Internal`].
async fn catch_panic<F, T>(upload: F) -> Result<T, TableStreamError>
where
    F: Future<Output = Result<T, TableStreamError>>,
{
    match AssertUnwindSafe(upload).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => Err(TableStreamError::Internal(format!(
            "Upload task panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Log a failure and send it to the client as exactly one error event.
async fn report_failure(
    reporter: &ProgressReporter,
    config: &StreamConfig,
    session_id: u64,
    err: &TableStreamError,
) {
    let traceback = err.traceback();
    let reached = reporter.last_percentage();
    match &traceback {
        Some(detail) => error!(
            "Session {}: {} at {}%: {}\n{}",
            session_id,
            err.kind(),
            reached,
            err,
            detail
        ),
        None => warn!("Session {}: {} at {}%: {}", session_id, err.kind(), reached, err),
    }

    let traceback = if config.include_traceback {
        traceback
    } else {
        None
    };
    reporter.error(err.to_string(), traceback).await;
}

fn lock_phase(phase: &Mutex<SessionPhase>) -> std::sync::MutexGuard<'_, SessionPhase> {
    // The guarded value is a plain enum; a poisoned lock still holds a valid phase.
    phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_phase(phase: &Mutex<SessionPhase>) -> SessionPhase {
    *lock_phase(phase)
}

fn write_phase(phase: &Mutex<SessionPhase>, value: SessionPhase) {
    *lock_phase(phase) = value;
}

/// Back to AwaitingUpload, unless the session was closed meanwhile.
fn finish_processing(phase: &Mutex<SessionPhase>) {
    let mut phase = lock_phase(phase);
    if *phase == SessionPhase::Processing {
        *phase = SessionPhase::AwaitingUpload;
    }
}
