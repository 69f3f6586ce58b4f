//! Deal chat endpoints.

use agrex_common::AppResult;
use agrex_core::{SendMessageInput, page_limit};
use agrex_db::entities::chat_message;
use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};

use super::deals::DealIdRequest;
use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, Count},
};

/// Chat message response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    pub deal_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub text: String,
    pub is_read: bool,
    pub created_at: String,
}

impl From<chat_message::Model> for MessageResponse {
    fn from(m: chat_message::Model) -> Self {
        Self {
            id: m.id,
            deal_id: m.deal_id,
            sender_id: m.sender_id,
            recipient_id: m.recipient_id,
            text: m.text,
            is_read: m.is_read,
            created_at: m.created_at.to_rfc3339(),
        }
    }
}

/// List messages request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesRequest {
    pub deal_id: String,
    pub limit: Option<u64>,
    pub until_id: Option<String>,
}

/// Messages of a deal, newest first.
async fn list_messages(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListMessagesRequest>,
) -> AppResult<ApiResponse<Vec<MessageResponse>>> {
    let messages = state
        .chat_service
        .list(
            &user,
            &req.deal_id,
            page_limit(req.limit),
            req.until_id.as_deref(),
        )
        .await?;
    Ok(ApiResponse::ok(messages.into_iter().map(Into::into).collect()))
}

/// Send a message to the other party.
async fn send_message(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SendMessageInput>,
) -> AppResult<ApiResponse<MessageResponse>> {
    let message = state.chat_service.send(&user, req).await?;
    Ok(ApiResponse::ok(message.into()))
}

/// Mark the caller's incoming messages in a deal as read.
async fn mark_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<DealIdRequest>,
) -> AppResult<ApiResponse<Count>> {
    let count = state.chat_service.mark_read(&user, &req.deal_id).await?;
    Ok(ApiResponse::ok(Count { count }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/list", post(list_messages))
        .route("/send", post(send_message))
        .route("/mark-read", post(mark_read))
}
