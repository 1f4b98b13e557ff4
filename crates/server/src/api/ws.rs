//! WebSocket fan-out of ingest progress.
//!
//! Every event of every job is broadcast; clients filter by `job_id`.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use reelpipe_core::{ProgressEvent, ProgressObserver};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket message sent to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// A job progress event, as also streamed to the uploader.
    Progress { event: ProgressEvent },
    /// Server heartbeat (sent periodically to keep connection alive).
    Heartbeat { timestamp: i64 },
}

impl WsMessage {
    fn kind(&self) -> &'static str {
        match self {
            WsMessage::Progress { .. } => "progress",
            WsMessage::Heartbeat { .. } => "heartbeat",
        }
    }
}

/// Broadcaster for WebSocket messages using tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WsMessage>,
}

impl WsBroadcaster {
    /// Create a new broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast a message to all connected clients.
    pub fn broadcast(&self, msg: WsMessage) {
        // Ignore send errors - they just mean no one is listening
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.sender.subscribe()
    }

    pub fn progress(&self, event: &ProgressEvent) {
        self.broadcast(WsMessage::Progress {
            event: event.clone(),
        });
    }

    /// Observer for the ingest coordinator that forwards every event here.
    pub fn observer(&self) -> ProgressObserver {
        let broadcaster = self.clone();
        Arc::new(move |event: &ProgressEvent| broadcaster.progress(event))
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.ws_broadcaster().subscribe();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();
    info!("WebSocket client connected");

    let send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        loop {
            let msg = tokio::select! {
                result = rx.recv() => match result {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("WebSocket client lagged, skipped {} messages", n);
                        WS_LAG_EVENTS.inc();
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                },
                _ = heartbeat.tick() => WsMessage::Heartbeat {
                    timestamp: Utc::now().timestamp(),
                },
            };

            WS_MESSAGES_SENT.with_label_values(&[msg.kind()]).inc();
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Err(e) => error!("Failed to serialize WsMessage: {}", e),
            }
        }
    });

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}
