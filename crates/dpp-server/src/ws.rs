//! Connection adapter (C9): accepts a WebSocket upgrade, wraps it as a
//! `dpp_ports::Channel`, and hands it to the verifier orchestrator (C8).

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use dpp_ports::{Channel, ChannelError};
use serde::Deserialize;
use tracing::{info, warn};

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    agent_id: Option<String>,
}

pub async fn verify_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.agent_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, agent_id: Option<String>) {
    let mut channel = WebSocketChannel::new(socket);

    let outcome = dpp_protocol::verify(
        &mut channel,
        &state.store,
        &state.oracle,
        &state.signer,
        &state.stage_config,
        agent_id,
    )
    .await;

    info!(
        agent_id = %outcome.agent_id,
        verdict = ?outcome.verdict,
        reject_reason = ?outcome.reject_reason,
        "verification session finished"
    );
}

/// Wraps one `axum` WebSocket as a `Channel`. Frames are strictly
/// serialized per §5: the connection task never reads ahead of what the
/// orchestrator has asked for.
struct WebSocketChannel {
    socket: WebSocket,
}

impl WebSocketChannel {
    fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl Channel for WebSocketChannel {
    async fn send(&mut self, frame: serde_json::Value) -> Result<(), ChannelError> {
        let text = serde_json::to_string(&frame).map_err(|e| ChannelError::Codec {
            message: e.to_string(),
        })?;
        self.socket
            .send(Message::Text(text))
            .await
            .map_err(|e| ChannelError::Transport {
                message: e.to_string(),
            })
    }

    async fn recv(&mut self) -> Result<serde_json::Value, ChannelError> {
        loop {
            return match self.socket.recv().await {
                Some(Ok(Message::Text(text))) => serde_json::from_str(&text).map_err(|e| {
                    ChannelError::Codec {
                        message: e.to_string(),
                    }
                }),
                Some(Ok(Message::Binary(bytes))) => {
                    serde_json::from_slice(&bytes).map_err(|e| ChannelError::Codec {
                        message: e.to_string(),
                    })
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => Err(ChannelError::Closed),
                Some(Err(e)) => {
                    warn!(error = %e, "websocket transport error");
                    Err(ChannelError::Transport {
                        message: e.to_string(),
                    })
                }
            };
        }
    }
}
