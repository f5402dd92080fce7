//! HTTP/WebSocket transport.
//!
//! Two routes:
//! - `GET {ws_path}` upgrades to a WebSocket and runs one [`Session`] on it.
//! - `POST /process-pdf/` acknowledges legacy form submissions and points
//!   callers at the WebSocket.
//!
//! Each socket is split in two. A writer task drains the session's outbound
//! channel into JSON text frames, while the connection task reads frames and
//! hands text to the session. Closing either side ends both.

use crate::config::{ServerConfig, StreamConfig};
use crate::pipeline::extract::TableExtractor;
use crate::protocol::ServerMessage;
use crate::session::Session;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// State shared by every connection. Immutable apart from the id counter.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<StreamConfig>,
    pub extractor: Arc<dyn TableExtractor>,
    next_session: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(config: StreamConfig, extractor: Arc<dyn TableExtractor>) -> Self {
        Self {
            config: Arc::new(config),
            extractor,
            next_session: Arc::new(AtomicU64::new(1)),
        }
    }

    fn next_session_id(&self) -> u64 {
        self.next_session.fetch_add(1, Ordering::Relaxed)
    }
}

/// Body returned by the legacy acknowledgement route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyAck {
    pub status: String,
    pub message: String,
}

/// Build the router with the WebSocket and legacy routes.
pub fn build_router(state: AppState, ws_path: &str) -> Router {
    Router::new()
        .route(ws_path, get(ws_handler))
        .route("/process-pdf/", post(legacy_process))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(server: &ServerConfig, state: AppState) -> Result<(), std::io::Error> {
    let app = build_router(state, &server.ws_path);
    let listener = tokio::net::TcpListener::bind(&server.bind_addr).await?;
    info!(
        "Listening on {} (WebSocket at {})",
        listener.local_addr()?,
        server.ws_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

pub async fn legacy_process() -> Json<LegacyAck> {
    Json(LegacyAck {
        status: "success".to_string(),
        message: "PDF processing moved to WebSocket connection".to_string(),
    })
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one WebSocket connection to completion.
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sink, stream) = socket.split();
    run_connection(sink, stream, state).await;
}

/// Frame loop behind [`handle_socket`], over any frame sink and stream.
async fn run_connection<W, R, E>(mut sink: W, mut stream: R, state: AppState)
where
    W: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    let (tx, rx) = mpsc::channel::<ServerMessage>(state.config.outbound_buffer);
    let id = state.next_session_id();

    let writer = tokio::spawn(async move {
        let mut outbound = ReceiverStream::new(rx);
        while let Some(msg) = outbound.next().await {
            let text = match msg.to_json() {
                Ok(text) => text,
                Err(e) => {
                    error!("Session {}: failed to encode event: {}", id, e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                debug!("Session {}: socket closed while sending", id);
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut session = Session::new(
        id,
        Arc::clone(&state.config),
        Arc::clone(&state.extractor),
        tx,
    );
    session.connect().await;

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => session.handle_message(text.as_str()).await,
            Ok(Message::Close(_)) => break,
            // Binary frames carry nothing we understand; pings are answered by axum.
            Ok(_) => {}
            Err(e) => {
                debug!("Session {}: receive error: {}", id, e);
                break;
            }
        }
    }

    session.disconnect();
    drop(session);
    if let Err(e) = writer.await {
        error!("Session {}: writer task failed: {}", id, e);
    }
}
