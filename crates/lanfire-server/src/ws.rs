use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};

use lanfire_core::net::protocol::decode_client_message;
use lanfire_core::player::PlayerId;

use crate::game_loop::GameCommand;
use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state))
        .into_response()
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (ws_sender, mut ws_receiver) = socket.split();

    let (tx, rx) = mpsc::channel::<Utf8Bytes>(state.config.limits.player_message_buffer);
    let (reply_tx, reply_rx) = oneshot::channel();
    if state
        .commands
        .send(GameCommand::Connect {
            sender: tx,
            reply: reply_tx,
        })
        .is_err()
    {
        tracing::warn!("Game loop is not running, closing socket");
        return;
    }
    let Ok(player_id) = reply_rx.await else {
        return;
    };

    let writer = spawn_writer(ws_sender, rx);

    read_loop(&mut ws_receiver, &state, player_id).await;

    // Removing the player drops its queue, which ends the writer.
    let _ = state.commands.send(GameCommand::Disconnect { player_id });
    let _ = writer.await;
}

fn spawn_writer(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Utf8Bytes>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    })
}

/// Inbound frame budget for one socket.
///
/// Holds up to `burst` frames and regains `per_sec` frames each second.
struct FrameBudget {
    available: f64,
    burst: f64,
    per_sec: f64,
    refilled_at: tokio::time::Instant,
}

impl FrameBudget {
    fn new(burst: f64, per_sec: f64) -> Self {
        Self {
            available: burst,
            burst,
            per_sec,
            refilled_at: tokio::time::Instant::now(),
        }
    }

    /// Spend one frame. False when the budget is exhausted.
    fn take(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let regained = now.duration_since(self.refilled_at).as_secs_f64() * self.per_sec;
        self.available = (self.available + regained).min(self.burst);
        self.refilled_at = now;

        if self.available < 1.0 {
            return false;
        }
        self.available -= 1.0;
        true
    }
}

async fn read_loop(ws_receiver: &mut SplitStream<WebSocket>, state: &AppState, player_id: PlayerId) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut budget = FrameBudget::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            Message::Binary(_) => {
                tracing::debug!(player_id = %player_id, "Binary frame ignored");
                continue;
            },
            _ => continue,
        };

        if !budget.take() {
            tracing::warn!(player_id = %player_id, "Frame budget exhausted, frame dropped");
            continue;
        }

        let msg = match decode_client_message(text.as_str()) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(player_id = %player_id, error = %e, "Dropped client frame");
                continue;
            },
        };

        if state
            .commands
            .send(GameCommand::Client { player_id, msg })
            .is_err()
        {
            break;
        }
    }
}
