//! WebSocket connection lifecycle.
//!
//! One task per connection. On connect the user is bound in the session
//! registry and marked online; a heartbeat refreshes the presence marker at
//! half its TTL for as long as the socket lives. The same loop forwards
//! fanout events from the bus and answers request frames, so outbound
//! delivery and inbound dispatch never race on the socket.
//!
//! On disconnect, however it happens, the session is unbound and the user
//! marked offline. If the process dies instead, the presence TTL expires
//! the marker without our help.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::backend::error::BackendError;
use crate::backend::middleware::{authenticate_token, AuthenticatedUser};
use crate::backend::server::state::AppState;
use crate::shared::{ClientFrame, ServerFrame};

/// Token handed over in the query string, since browser WebSocket clients
/// cannot set headers.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// `GET /ws?token=...` - authenticate, then upgrade.
pub async fn websocket_handler(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let token = match query.token {
        Some(token) => token,
        None => return BackendError::auth("Missing token").into_response(),
    };
    let user = match authenticate_token(&token, &state.config.jwt_secret) {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };
    ws.on_upgrade(move |socket| handle_socket(state, user, socket))
}

async fn send_frame(socket: &mut WebSocket, frame: &ServerFrame) -> Result<(), axum::Error> {
    let payload = match serde_json::to_string(frame) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!("[Realtime] Failed to serialize frame: {}", e);
            return Ok(());
        }
    };
    socket.send(Message::Text(payload.into())).await
}

async fn handle_socket(state: AppState, user: AuthenticatedUser, mut socket: WebSocket) {
    let user_id = user.user_id.clone();
    let connection_id = Uuid::new_v4().to_string();

    if let Err(e) = state.sessions.bind(&user_id, &connection_id).await {
        tracing::error!(user_id, "[Realtime] Failed to bind session: {}", e);
    }
    if let Err(e) = state.presence.mark_online(&user_id).await {
        tracing::error!(user_id, "[Realtime] Failed to mark online: {}", e);
    }
    tracing::info!(user_id, connection_id, "[Realtime] Connection established");

    let mut events = state.bus.subscribe_user(&user_id);
    let mut heartbeat = tokio::time::interval(state.presence.heartbeat_period());
    heartbeat.reset(); // skip immediate first tick

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if let Err(e) = state.presence.heartbeat(&user_id).await {
                    tracing::warn!(user_id, "[Realtime] Presence heartbeat failed: {}", e);
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if send_frame(&mut socket, &ServerFrame::from(event)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            user_id,
                            "[Realtime] Event stream lagged, {} events dropped",
                            skipped
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                let Some(message) = incoming else {
                    break;
                };
                match message {
                    Ok(Message::Text(raw)) => {
                        let reply = dispatch_frame(&state, &user_id, raw.as_str()).await;
                        if send_frame(&mut socket, &reply).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(user_id, "[Realtime] Socket error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    if let Err(e) = state.sessions.unbind(&user_id).await {
        tracing::warn!(user_id, "[Realtime] Failed to unbind session: {}", e);
    }
    if let Err(e) = state.presence.mark_offline(&user_id).await {
        tracing::warn!(user_id, "[Realtime] Failed to mark offline: {}", e);
    }
    tracing::info!(user_id, connection_id, "[Realtime] Connection closed");
}

/// Handle one request frame and produce its reply.
async fn dispatch_frame(state: &AppState, user_id: &str, raw: &str) -> ServerFrame {
    let frame: ClientFrame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(user_id, "[Realtime] Unparseable frame: {}", e);
            return ServerFrame::Error {
                error: "Unrecognized frame".to_string(),
            };
        }
    };

    match frame {
        ClientFrame::SubmitMessage { receiver_id, body } => {
            match state.gateway.submit(user_id, &receiver_id, &body).await {
                Ok(message) => ServerFrame::SubmitAck {
                    success: true,
                    data: Some(message),
                    error: None,
                },
                Err(e) => ServerFrame::SubmitAck {
                    success: false,
                    data: None,
                    error: Some(e.message()),
                },
            }
        }
        ClientFrame::GetOnlineFriends => {
            let friend_ids = match state.friends.list_friend_ids(user_id).await {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::error!(user_id, "[Realtime] Friend lookup failed: {}", e);
                    return ServerFrame::Error {
                        error: "Could not load friends".to_string(),
                    };
                }
            };
            match state.presence.bulk_is_online(&friend_ids).await {
                Ok(user_ids) => ServerFrame::OnlineFriends { user_ids },
                Err(e) => {
                    tracing::error!(user_id, "[Realtime] Presence lookup failed: {}", e);
                    ServerFrame::Error {
                        error: "Could not load presence".to_string(),
                    }
                }
            }
        }
        ClientFrame::GetUserStatus { user_id: target } => {
            match state.presence.is_online(&target).await {
                Ok(online) => ServerFrame::UserStatus {
                    user_id: target,
                    online,
                },
                Err(e) => {
                    tracing::error!(user_id, "[Realtime] Presence lookup failed: {}", e);
                    ServerFrame::Error {
                        error: "Could not load presence".to_string(),
                    }
                }
            }
        }
    }
}
