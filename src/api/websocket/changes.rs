//! Change feed WebSocket handler
//!
//! Streams signal and proxy change events to dashboard clients.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::WS_BUFFER_SIZE;
use crate::api::server::AppState;
use crate::models::ChangeEvent;

/// WebSocket handler for the change feed
pub async fn changes_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_changes_ws(socket, state))
}

async fn handle_changes_ws(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ChangeEvent>(WS_BUFFER_SIZE);
    let mut changes = state.changes.subscribe();

    info!("Change feed WebSocket connected");

    let mut forward_task = tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(event) => {
                    // A slow client loses events instead of stalling the feed.
                    if tx.try_send(event).is_err() {
                        debug!("Change feed buffer full, dropping event");
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!("Change feed lagged, missed {} events", n);
                }
                Err(RecvError::Closed) => {
                    debug!("Change broadcast channel closed");
                    break;
                }
            }
        }
    });

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("Failed to serialize change event: {}", e),
            }
        }
    });

    let mut receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    debug!("Change feed WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut forward_task => {}
        _ = &mut send_task => {}
        _ = &mut receive_task => {}
    }

    forward_task.abort();
    send_task.abort();
    receive_task.abort();

    info!("Change feed WebSocket disconnected");
}
