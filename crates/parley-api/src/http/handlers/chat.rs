//! Chat and turn HTTP handlers.
//!
//! Endpoints:
//! - POST   /api/v1/chats              - Create a chat
//! - GET    /api/v1/chats              - List chats for an owner
//! - GET    /api/v1/chats/{id}/turns   - Load a chat's history
//! - POST   /api/v1/chats/{id}/turns   - Send a turn and get the reply
//! - DELETE /api/v1/chats/{id}         - Delete a chat and its turns

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use parley_core::chat::recency::recency_label;
use parley_types::chat::{Chat, Turn, Utterance};

use crate::http::ApiState;
use crate::http::error::AppError;
use crate::http::response::{ApiMeta, ApiResponse};

/// Error code attached when a reply was produced but could not be stored.
pub const TURN_NOT_PERSISTED: &str = "TURN_NOT_PERSISTED";

#[derive(Debug, Default, Deserialize)]
pub struct CreateChatRequest {
    pub owner_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateChatData {
    pub chat_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ChatListQuery {
    pub owner_id: Option<String>,
}

/// A chat plus a human-friendly recency label.
#[derive(Debug, Serialize)]
pub struct ChatListItem {
    #[serde(flatten)]
    pub chat: Chat,
    pub recency: String,
}

#[derive(Debug, Deserialize)]
pub struct SendTurnRequest {
    /// The conversation as the client shows it, before `utterance`.
    #[serde(default)]
    pub prior_history: Vec<Utterance>,
    pub utterance: String,
}

#[derive(Debug, Serialize)]
pub struct SendTurnData {
    pub chat_id: Uuid,
    pub reply: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteChatData {
    pub deleted_chat_id: Uuid,
}

/// Parse a UUID from a path parameter, returning a 400 error on invalid format.
fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    s.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid chat id: {s}")))
}

/// POST /api/v1/chats - Create a chat.
pub async fn create_chat(
    State(state): State<ApiState>,
    body: Option<Json<CreateChatRequest>>,
) -> Result<ApiResponse<CreateChatData>, AppError> {
    let start = Instant::now();
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let owner_id = state.owner_or_default(body.owner_id.as_deref());
    let chat = state.chat_service.create_chat(owner_id).await?;

    let self_link = format!("/api/v1/chats/{}/turns", chat.id);
    Ok(
        ApiResponse::success(CreateChatData { chat_id: chat.id }, ApiMeta::since(start))
            .with_status(axum::http::StatusCode::CREATED)
            .with_link("turns", &self_link),
    )
}

/// GET /api/v1/chats?owner_id= - List chats, most recently active first.
pub async fn list_chats(
    State(state): State<ApiState>,
    Query(query): Query<ChatListQuery>,
) -> Result<ApiResponse<Vec<ChatListItem>>, AppError> {
    let start = Instant::now();
    let owner_id = state.owner_or_default(query.owner_id.as_deref());

    let now = chrono::Utc::now();
    let chats: Vec<ChatListItem> = state
        .chat_service
        .list_chats(owner_id)
        .await?
        .into_iter()
        .map(|chat| ChatListItem {
            recency: recency_label(chat.updated_at, now),
            chat,
        })
        .collect();

    Ok(ApiResponse::success(chats, ApiMeta::since(start)).with_link("self", "/api/v1/chats"))
}

/// GET /api/v1/chats/{id}/turns - Load a chat's stored turns in order.
pub async fn load_history(
    State(state): State<ApiState>,
    Path(chat_id): Path<String>,
) -> Result<ApiResponse<Vec<Turn>>, AppError> {
    let start = Instant::now();
    let chat_id = parse_uuid(&chat_id)?;

    if state.chat_service.get_chat(&chat_id).await?.is_none() {
        return Err(AppError::ChatNotFound);
    }
    let turns = state.chat_service.load_history(&chat_id).await?;

    Ok(ApiResponse::success(turns, ApiMeta::since(start))
        .with_link("self", &format!("/api/v1/chats/{chat_id}/turns")))
}

/// POST /api/v1/chats/{id}/turns - Send a turn.
///
/// A reply that could not be stored is still returned, with a
/// `TURN_NOT_PERSISTED` error entry next to it.
pub async fn send_turn(
    State(state): State<ApiState>,
    Path(chat_id): Path<String>,
    Json(body): Json<SendTurnRequest>,
) -> Result<ApiResponse<SendTurnData>, AppError> {
    let start = Instant::now();
    let chat_id = parse_uuid(&chat_id)?;

    let outcome = state
        .chat_service
        .send_turn(chat_id, &body.prior_history, &body.utterance)
        .await?;

    let persistence_error = outcome.persistence_error.as_ref().map(ToString::to_string);
    let data = SendTurnData {
        chat_id: outcome.chat_id,
        reply: outcome.reply,
        title: outcome.title,
    };

    let mut response = ApiResponse::success(data, ApiMeta::since(start))
        .with_link("turns", &format!("/api/v1/chats/{chat_id}/turns"));
    if let Some(message) = persistence_error {
        response = response.with_error(
            TURN_NOT_PERSISTED,
            &format!("The reply was produced but could not be stored: {message}"),
        );
    }
    Ok(response)
}

/// DELETE /api/v1/chats/{id} - Delete a chat and all of its turns.
pub async fn delete_chat(
    State(state): State<ApiState>,
    Path(chat_id): Path<String>,
) -> Result<ApiResponse<DeleteChatData>, AppError> {
    let start = Instant::now();
    let chat_id = parse_uuid(&chat_id)?;

    state.chat_service.delete_chat(&chat_id).await?;

    Ok(ApiResponse::success(
        DeleteChatData {
            deleted_chat_id: chat_id,
        },
        ApiMeta::since(start),
    ))
}
