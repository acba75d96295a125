//! Chat WebSocket and REST endpoints.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::chat::CoachChat;
use super::state::SessionState;
use crate::error::SessionError;

/// Shared state for chat routes.
#[derive(Clone)]
pub struct ChatRouteState {
    pub chat: Arc<CoachChat>,
}

/// Messages a chat client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Message { content: String },
    Clear,
}

/// Full-state message sent on connect and after a lagged broadcast.
#[derive(Debug, Serialize)]
struct TranscriptSync {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
    state: SessionState,
}

impl TranscriptSync {
    fn of(chat: &CoachChat) -> Self {
        Self {
            kind: "transcript_sync",
            text: chat.transcript_text(),
            state: chat.state(),
        }
    }
}

/// Build the chat routes.
pub fn chat_routes(state: ChatRouteState) -> Router {
    Router::new()
        .route("/ws/chat", get(ws_handler))
        .route("/api/chat/transcript", get(get_transcript))
        .route("/api/chat/message", post(post_message))
        .route("/api/chat/clear", post(clear))
        .with_state(state)
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<ChatRouteState>,
) -> impl IntoResponse {
    info!("Chat client connecting");
    ws.on_upgrade(|socket| handle_socket(socket, state.chat))
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> bool {
    match serde_json::to_string(value) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to encode chat message");
            true
        }
    }
}

async fn handle_socket(mut socket: WebSocket, chat: Arc<CoachChat>) {
    // Subscribe before the sync so nothing between the two is lost.
    let mut rx = chat.subscribe();

    if !send_json(&mut socket, &TranscriptSync::of(&chat)).await {
        warn!("Failed to send initial sync, client disconnected");
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if !send_json(&mut socket, &event).await {
                            debug!("Client disconnected during send");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(missed = n, "Chat client lagged behind transcript");
                        if !send_json(&mut socket, &TranscriptSync::of(&chat)).await {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => {
                        debug!("Transcript channel closed");
                        break;
                    }
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_message(&text, &chat).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Chat client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("Chat connection closed");
}

async fn handle_client_message(text: &str, chat: &CoachChat) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Message { content }) => {
            if let Err(e) = chat.send_user_message(&content).await {
                warn!(error = %e, "Chat message rejected");
            }
        }
        Ok(ClientMessage::Clear) => chat.clear_transcript().await,
        Err(e) => {
            debug!(error = %e, text = text, "Unrecognized chat message from client");
        }
    }
}

// ── REST Endpoints ──────────────────────────────────────────────────────

async fn get_transcript(State(state): State<ChatRouteState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "text": state.chat.transcript_text(),
        "state": state.chat.state(),
    }))
}

#[derive(Deserialize)]
struct MessageRequest {
    content: String,
}

async fn post_message(
    State(state): State<ChatRouteState>,
    Json(body): Json<MessageRequest>,
) -> Response {
    match state.chat.send_user_message(&body.content).await {
        Ok(Some(_)) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({"status": "generating"})),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::OK,
            Json(serde_json::json!({"status": "ignored"})),
        )
            .into_response(),
        Err(e) => {
            let status = match e {
                SessionError::Busy => StatusCode::CONFLICT,
                SessionError::ModelLoad(_) | SessionError::NotReady { .. } => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
            };
            (status, Json(serde_json::json!({"error": e.to_string()}))).into_response()
        }
    }
}

async fn clear(State(state): State<ChatRouteState>) -> impl IntoResponse {
    state.chat.clear_transcript().await;
    Json(serde_json::json!({
        "status": "cleared",
        "state": state.chat.state(),
    }))
}
