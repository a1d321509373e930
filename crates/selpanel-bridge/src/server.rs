//! HTTP and WebSocket surface.
//!
//! | Path              | Description                                   |
//! |-------------------|-----------------------------------------------|
//! | `/ws`             | Consumer channel (JSON text messages)         |
//! | `/status`         | Bridge status as JSON                         |
//! | `/health`         | 200 when healthy, 503 when degraded           |
//! | `/test/play/{id}` | Simulate a button press                       |
//! | `/test/stop`      | Stop playback                                 |
//!
//! Handlers never touch the dispatcher. State changes go to the event loop
//! as [`BridgeCommand`]s.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bridge::BridgeCommand;
use crate::error::{BridgeError, Result};
use crate::hub::{ConsumerHub, ConsumerId};
use crate::message::ConsumerMessage;
use crate::status::StatusSource;

/// Shared state passed to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<ConsumerHub>,
    pub commands: mpsc::UnboundedSender<BridgeCommand>,
    pub status: StatusSource,
    pub cancel: CancellationToken,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(handle_websocket))
        .route("/status", get(handle_status))
        .route("/health", get(handle_health))
        .route("/test/play/{id}", get(handle_test_play))
        .route("/test/stop", get(handle_test_stop))
        .with_state(state)
}

/// Serve until `state.cancel` fires.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "http server listening");
    }
    let cancel = state.cancel.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(BridgeError::Serve)
}

async fn handle_websocket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| consumer_session(socket, state))
}

/// One consumer connection: forwards hub broadcasts out and consumer
/// messages in until either side closes.
async fn consumer_session(socket: WebSocket, state: AppState) {
    let (id, mut outbound) = state.hub.connect();
    let (mut sink, mut inbound) = socket.split();

    loop {
        tokio::select! {
            _ = state.cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            message = outbound.recv() => {
                let Some(text) = message else { break };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    debug!(consumer = %id, "consumer send failed");
                    break;
                }
            }
            frame = inbound.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_consumer_text(&state, id, text.as_str()),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(consumer = %id, error = %err, "consumer socket error");
                    break;
                }
            },
        }
    }

    state.hub.unregister(id);
}

fn handle_consumer_text(state: &AppState, id: ConsumerId, text: &str) {
    match ConsumerMessage::parse(text) {
        Ok(ConsumerMessage::Ended { id: ended }) => match u32::try_from(ended) {
            Ok(ended) => send_command(state, BridgeCommand::PlaybackEnded(ended)),
            Err(_) => debug!(consumer = %id, ended, "ignoring completion with invalid id"),
        },
        Ok(ConsumerMessage::Ping) => debug!(consumer = %id, "consumer ping"),
        Err(err) => warn!(consumer = %id, error = %err, "ignoring malformed consumer message"),
    }
}

async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.status.status())
}

async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.status.health();
    let code = if health.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(health))
}

async fn handle_test_play(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let catalog = state.status.catalog;
    let id = raw
        .parse::<u32>()
        .ok()
        .filter(|_| raw.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|raw| catalog.media_id(raw));

    match id {
        Some(id) => {
            send_command(&state, BridgeCommand::Press(u32::from(id.get())));
            (StatusCode::OK, format!("OK: play {}", id.get())).into_response()
        }
        None => (
            StatusCode::BAD_REQUEST,
            format!("ERROR: id must be 1-{}", catalog.size()),
        )
            .into_response(),
    }
}

async fn handle_test_stop(State(state): State<AppState>) -> Response {
    send_command(&state, BridgeCommand::Stop);
    (StatusCode::OK, "OK: stopped").into_response()
}

fn send_command(state: &AppState, command: BridgeCommand) {
    if state.commands.send(command).is_err() {
        warn!(?command, "event loop not running, command dropped");
    }
}
