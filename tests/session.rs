//! Session-level integration tests.
//!
//! These drive a [`Session`] through its public API with a scripted engine,
//! so the full event sequence a WebSocket client would see can be checked
//! without pdfium or a network socket.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use pretty_assertions::assert_eq;
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use tablestream::{
    Document, ExtractionError, RawTable, ServerMessage, Session, SessionPhase, StreamConfig,
    TableArea, TableExtractor,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

// ── Test engines ─────────────────────────────────────────────────────────────

/// Returns the same result for every document.
struct Scripted(Result<Vec<RawTable>, ExtractionError>);

impl TableExtractor for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn extract(&self, _document: &Document) -> Result<Vec<RawTable>, ExtractionError> {
        self.0.clone()
    }
}

/// Blocks inside `extract` until the test sends on (or drops) the gate.
struct Gated {
    gate: Mutex<std_mpsc::Receiver<()>>,
}

impl TableExtractor for Gated {
    fn name(&self) -> &str {
        "gated"
    }

    fn extract(&self, _document: &Document) -> Result<Vec<RawTable>, ExtractionError> {
        let _ = self.gate.lock().unwrap().recv();
        Ok(vec![table(&["k", "v"], &[&["a", "1"]])])
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
    RawTable::new(
        headers.iter().map(|h| h.to_string()).collect(),
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect(),
    )
}

fn upload_frame(filename: &str, operation: &str) -> String {
    let content = format!(
        "data:application/pdf;base64,{}",
        STANDARD.encode(b"%PDF-1.7 test")
    );
    upload_frame_with_content(filename, &content, operation)
}

fn upload_frame_with_content(filename: &str, content: &str, operation: &str) -> String {
    serde_json::json!({
        "type": "upload",
        "filename": filename,
        "content": content,
        "operation": operation,
    })
    .to_string()
}

/// Route library logs through the test harness; `RUST_LOG=debug` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fast_config() -> StreamConfig {
    StreamConfig::builder().table_pause_ms(0).build().unwrap()
}

/// Connect, send each frame and wait for its upload, then collect every event.
async fn run_session(
    config: StreamConfig,
    extractor: Arc<dyn TableExtractor>,
    frames: &[String],
) -> Vec<ServerMessage> {
    init_tracing();
    let (tx, mut rx) = mpsc::channel(256);
    let mut session = Session::new(7, Arc::new(config), extractor, tx);
    session.connect().await;
    for frame in frames {
        session.handle_message(frame).await;
        session.join().await;
    }
    session.disconnect();
    drop(session);

    let mut events = Vec::new();
    while let Some(msg) = rx.recv().await {
        events.push(msg);
    }
    events
}

/// Compact trace of an event stream: `P<pct>`, `T<n>/<total>` or `E`.
fn trace(events: &[ServerMessage]) -> Vec<String> {
    events
        .iter()
        .map(|e| match e {
            ServerMessage::Progress(p) => format!("P{}", p.percentage),
            ServerMessage::Table(t) => format!("T{}/{}", t.table_number, t.total_tables),
            ServerMessage::Error(_) => "E".to_string(),
        })
        .collect()
}

fn errors(events: &[ServerMessage]) -> Vec<&tablestream::ErrorEvent> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerMessage::Error(err) => Some(err),
            _ => None,
        })
        .collect()
}

fn tables(events: &[ServerMessage]) -> Vec<&tablestream::TableEvent> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerMessage::Table(t) => Some(t),
            _ => None,
        })
        .collect()
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_tables_with_clean_headers() {
    let engine = Scripted(Ok(vec![
        table(&[" Name ", "AGE"], &[&["Ann", "31"], &["Bob", "42"]]),
        table(&["City", " Country"], &[&["Oslo", "NO"]]),
    ]));
    let events = run_session(
        fast_config(),
        Arc::new(engine),
        &[upload_frame("people.pdf", "clean_headers")],
    )
    .await;

    assert_eq!(
        trace(&events),
        vec!["P0", "P10", "P30", "P60", "T1/2", "P90", "T2/2", "P100"]
    );

    let tables = tables(&events);
    assert_eq!(tables[0].columns, vec!["name", "age"]);
    assert_eq!(tables[0].content, "name,age\nAnn,31\nBob,42\n");
    assert_eq!(tables[0].row_count, 2);
    assert_eq!(tables[1].columns, vec!["city", "country"]);
    assert_eq!(tables[1].row_count, 1);

    match &events[1] {
        ServerMessage::Progress(p) => assert_eq!(p.message, "Processing people.pdf"),
        other => panic!("expected progress, got {other:?}"),
    }
    match events.last().unwrap() {
        ServerMessage::Progress(p) => assert_eq!(p.message, "Completed 2 tables"),
        other => panic!("expected progress, got {other:?}"),
    }
}

#[tokio::test]
async fn tables_are_numbered_in_order_with_monotonic_progress() {
    let raw: Vec<RawTable> = (0..7)
        .map(|i| {
            let cell = i.to_string();
            table(&["n"], &[&[cell.as_str()]])
        })
        .collect();
    let events = run_session(
        fast_config(),
        Arc::new(Scripted(Ok(raw))),
        &[upload_frame("many.pdf", "basic")],
    )
    .await;

    let numbers: Vec<usize> = tables(&events).iter().map(|t| t.table_number).collect();
    assert_eq!(numbers, (1..=7).collect::<Vec<_>>());
    assert!(tables(&events).iter().all(|t| t.total_tables == 7));

    let percentages: Vec<u8> = events.iter().filter_map(|e| e.percentage()).collect();
    assert!(percentages.windows(2).all(|w| w[0] <= w[1]), "{percentages:?}");
    assert_eq!(percentages.first(), Some(&0));
    assert_eq!(percentages.last(), Some(&100));
}

#[tokio::test]
async fn page_and_area_pass_through_to_table_events() {
    let area = TableArea {
        top: 72.0,
        left: 36.0,
        bottom: 300.5,
        right: 560.0,
    };
    let engine = Scripted(Ok(vec![
        table(&["a", "b"], &[&["1", "2"]]).with_page(3).with_area(area),
        table(&["c", "d"], &[&["3", "4"]]),
    ]));
    let events = run_session(
        fast_config(),
        Arc::new(engine),
        &[upload_frame("p.pdf", "basic")],
    )
    .await;

    let tables = tables(&events);
    assert_eq!(tables[0].page_number, Some(3));
    assert_eq!(tables[0].table_area, Some(area));
    assert_eq!(tables[1].page_number, None);
    assert_eq!(tables[1].table_area, None);

    let json = events
        .iter()
        .find(|e| matches!(e, ServerMessage::Table(t) if t.table_number == 2))
        .unwrap()
        .to_json()
        .unwrap();
    assert!(!json.contains("page_number"));
    assert!(!json.contains("table_area"));
}

#[tokio::test]
async fn transpose_swaps_rows_and_columns() {
    let engine = Scripted(Ok(vec![table(
        &["metric", "q1", "q2"],
        &[&["sales", "10", "20"], &["costs", "4", "5"]],
    )]));
    let events = run_session(
        fast_config(),
        Arc::new(engine),
        &[upload_frame("t.pdf", "transpose")],
    )
    .await;

    let t = tables(&events)[0];
    assert_eq!(t.columns, vec!["metric", "sales", "costs"]);
    assert_eq!(t.content, "metric,sales,costs\nq1,10,4\nq2,20,5\n");
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_operation_sends_one_error_and_no_tables() {
    let engine = Scripted(Ok(vec![table(&["a", "b"], &[&["1", "2"]])]));
    let events = run_session(
        fast_config(),
        Arc::new(engine),
        &[upload_frame("a.pdf", "pivot")],
    )
    .await;

    assert_eq!(trace(&events), vec!["P0", "P10", "E"]);
    let err = errors(&events)[0];
    assert!(err.message.contains("Unknown operation 'pivot'"), "{}", err.message);
    assert!(err.message.contains("clean_headers"));
    assert_eq!(err.traceback, None);
}

#[tokio::test]
async fn no_tables_is_an_error() {
    let events = run_session(
        fast_config(),
        Arc::new(Scripted(Ok(Vec::new()))),
        &[upload_frame("empty.pdf", "basic")],
    )
    .await;

    assert_eq!(trace(&events), vec!["P0", "P10", "E"]);
    assert_eq!(errors(&events)[0].message, "No tables found in 'empty.pdf'");
}

#[tokio::test]
async fn extraction_failure_carries_traceback() {
    let failure = ExtractionError::new("scripted", "bad.pdf", "corrupt or not a PDF")
        .with_detail("xref table missing at offset 0");
    let events = run_session(
        fast_config(),
        Arc::new(Scripted(Err(failure))),
        &[upload_frame("bad.pdf", "basic")],
    )
    .await;

    assert_eq!(trace(&events), vec!["P0", "P10", "E"]);
    let err = errors(&events)[0];
    assert!(err.message.contains("corrupt or not a PDF"));
    assert_eq!(
        err.traceback.as_deref(),
        Some("xref table missing at offset 0")
    );
}

#[tokio::test]
async fn traceback_can_be_disabled() {
    let failure =
        ExtractionError::new("scripted", "bad.pdf", "boom").with_detail("internal detail");
    let config = StreamConfig::builder()
        .table_pause_ms(0)
        .include_traceback(false)
        .build()
        .unwrap();
    let events = run_session(
        config,
        Arc::new(Scripted(Err(failure))),
        &[upload_frame("bad.pdf", "basic")],
    )
    .await;

    let err = errors(&events)[0];
    assert!(err.message.contains("boom"));
    assert_eq!(err.traceback, None);
    assert!(!err.message.contains("internal detail"));
}

#[tokio::test]
async fn invalid_base64_is_rejected_before_extraction() {
    let engine = Scripted(Err(ExtractionError::new("scripted", "x", "must not run")));
    let events = run_session(
        fast_config(),
        Arc::new(engine),
        &[upload_frame_with_content(
            "a.pdf",
            "data:application/pdf;base64,@@not base64@@",
            "basic",
        )],
    )
    .await;

    assert_eq!(trace(&events), vec!["P0", "P10", "E"]);
    let err = errors(&events)[0];
    assert!(err.message.contains("not valid base64"), "{}", err.message);
}

#[tokio::test]
async fn session_accepts_another_upload_after_a_failure() {
    let engine = Scripted(Ok(vec![table(&["a", "b"], &[&["1", "2"]])]));
    let events = run_session(
        fast_config(),
        Arc::new(engine),
        &[
            upload_frame("first.pdf", "nope"),
            upload_frame("second.pdf", "basic"),
        ],
    )
    .await;

    assert_eq!(
        trace(&events),
        vec!["P0", "P10", "E", "P10", "P30", "P90", "T1/1", "P100"]
    );
}

#[tokio::test]
async fn non_upload_frames_are_ignored() {
    let engine = Scripted(Ok(vec![table(&["a", "b"], &[&["1", "2"]])]));
    let events = run_session(
        fast_config(),
        Arc::new(engine),
        &[
            "not json at all".to_string(),
            r#"{"type":"ping"}"#.to_string(),
            upload_frame("ok.pdf", "basic"),
        ],
    )
    .await;

    assert_eq!(trace(&events), vec!["P0", "P10", "P30", "P90", "T1/1", "P100"]);
}

// ── Concurrency ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn second_upload_is_rejected_while_first_is_processing() {
    init_tracing();
    let (release, gate) = std_mpsc::channel();
    let engine = Gated {
        gate: Mutex::new(gate),
    };
    let (tx, mut rx) = mpsc::channel(64);
    let mut session = Session::new(1, Arc::new(fast_config()), Arc::new(engine), tx);
    session.connect().await;

    session.handle_message(&upload_frame("first.pdf", "basic")).await;
    assert_eq!(session.phase(), SessionPhase::Processing);
    session.handle_message(&upload_frame("second.pdf", "basic")).await;

    // The rejection arrives while the first upload is still blocked.
    let mut before_release = Vec::new();
    loop {
        let msg = rx.recv().await.unwrap();
        let is_error = matches!(msg, ServerMessage::Error(_));
        before_release.push(msg);
        if is_error {
            break;
        }
    }
    let err = errors(&before_release)[0];
    assert!(err.message.contains("already being processed"), "{}", err.message);
    assert!(tables(&before_release).is_empty());

    release.send(()).unwrap();
    session.join().await;
    assert_eq!(session.phase(), SessionPhase::AwaitingUpload);
    session.disconnect();
    drop(session);

    let mut rest = Vec::new();
    while let Some(msg) = rx.recv().await {
        rest.push(msg);
    }
    let all: Vec<ServerMessage> = before_release.into_iter().chain(rest).collect();
    assert_eq!(errors(&all).len(), 1);
    assert_eq!(tables(&all).len(), 1);
    assert_eq!(all.last().and_then(|m| m.percentage()), Some(100));
}

#[tokio::test]
async fn disconnect_abandons_the_running_upload() {
    init_tracing();
    let (release, gate) = std_mpsc::channel::<()>();
    let engine = Gated {
        gate: Mutex::new(gate),
    };
    let (tx, mut rx) = mpsc::channel(64);
    let mut session = Session::new(2, Arc::new(fast_config()), Arc::new(engine), tx);
    session.connect().await;
    session.handle_message(&upload_frame("slow.pdf", "basic")).await;

    // Ready, then accepted.
    assert_eq!(rx.recv().await.unwrap().percentage(), Some(0));
    assert_eq!(rx.recv().await.unwrap().percentage(), Some(10));

    session.disconnect();
    assert_eq!(session.phase(), SessionPhase::Closed);
    drop(session);

    // With the upload task aborted every sender is gone and nothing else arrives.
    let mut rest = Vec::new();
    while let Some(msg) = rx.recv().await {
        rest.push(msg);
    }
    assert!(tables(&rest).is_empty(), "{rest:?}");

    // Let the blocking engine call return so the runtime can shut down.
    drop(release);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn follow_up_upload_is_accepted_right_after_terminal_event() {
    init_tracing();
    let engine = Scripted(Ok(vec![table(&["a", "b"], &[&["1", "2"]])]));
    let (tx, mut rx) = mpsc::channel(64);
    let mut session = Session::new(3, Arc::new(fast_config()), Arc::new(engine), tx);
    session.connect().await;
    assert_eq!(rx.recv().await.unwrap().percentage(), Some(0));

    // Alternate good and failing uploads; each one is sent as soon as the
    // previous terminal event arrives, without waiting on the task.
    for round in 0..300 {
        let operation = if round % 3 == 2 { "pivot" } else { "basic" };
        session
            .handle_message(&upload_frame(&format!("r{round}.pdf"), operation))
            .await;

        loop {
            match rx.recv().await.unwrap() {
                ServerMessage::Error(e) => {
                    assert!(
                        !e.message.contains("already being processed"),
                        "round {round}: {}",
                        e.message
                    );
                    assert_eq!(operation, "pivot", "round {round}: {}", e.message);
                    break;
                }
                ServerMessage::Progress(p) if p.percentage == 100 => {
                    assert_eq!(operation, "basic", "round {round}");
                    break;
                }
                _ => {}
            }
        }
    }

    session.disconnect();
}
