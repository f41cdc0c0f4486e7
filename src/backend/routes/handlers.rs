//! REST handlers: conversation history, health, readiness.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::Ordering;

use crate::backend::error::BackendError;
use crate::backend::middleware::authenticate_bearer;
use crate::backend::server::state::AppState;
use crate::backend::storage::DEFAULT_PAGE_LIMIT;
use crate::shared::messaging::ConversationKey;

/// Hard ceiling on requested page size.
const MAX_PAGE_LIMIT: usize = 100;

/// Query string for history pagination.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    /// Exclusive upper bound; pass the previous page's `cursor` to walk
    /// backward.
    pub before_time: Option<DateTime<Utc>>,
}

/// `GET /api/v1/messages/{friend_id}` - one page of the conversation
/// between the authenticated user and `friend_id`, most-recent-first.
pub async fn get_message_history(
    State(state): State<AppState>,
    Path(friend_id): Path<String>,
    Query(query): Query<HistoryQuery>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, BackendError> {
    let user = authenticate_bearer(&headers, &state.config.jwt_secret)?;

    if friend_id.is_empty() {
        return Err(BackendError::invalid_input("Friend ID is required"));
    }

    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(1, MAX_PAGE_LIMIT);

    let conversation_key = ConversationKey::new(&user.user_id, &friend_id);
    let page = state
        .store
        .query_messages(&conversation_key, query.before_time, limit)
        .await
        .map_err(|e| {
            tracing::error!(
                conversation_key = %conversation_key,
                "History query failed: {}",
                e
            );
            BackendError::transient("message history is temporarily unavailable")
        })?;

    Ok(Json(json!({ "success": true, "data": page })))
}

/// `GET /api/v1/health` - process liveness.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /api/v1/ready` - readiness; 503 once shutdown has begun so load
/// balancers drain the instance.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    if state.shutting_down.load(Ordering::SeqCst) {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "draining" })),
        )
    } else {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    }
}
