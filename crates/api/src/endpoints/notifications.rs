//! Notifications endpoints.

use agrex_common::AppResult;
use agrex_core::page_limit;
use agrex_db::entities::notification::{Model as NotificationModel, NotificationType};
use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{Ack, ApiResponse, Count},
};

/// List notifications request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotificationsRequest {
    pub limit: Option<u64>,
    /// Cursor: only notifications older than this ID.
    pub until_id: Option<String>,
    #[serde(default)]
    pub unread_only: bool,
}

/// Mark one notification request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub notification_id: String,
}

/// Notification response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

impl From<NotificationModel> for NotificationResponse {
    fn from(n: NotificationModel) -> Self {
        Self {
            id: n.id,
            notification_type: n.notification_type,
            title: n.title,
            message: n.message,
            post_id: n.post_id,
            deal_id: n.deal_id,
            is_read: n.is_read,
            created_at: n.created_at.to_rfc3339(),
        }
    }
}

/// The caller's notifications, newest first.
async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListNotificationsRequest>,
) -> AppResult<ApiResponse<Vec<NotificationResponse>>> {
    let notifications = state
        .notification_service
        .list(
            &user.id,
            page_limit(req.limit),
            req.until_id.as_deref(),
            req.unread_only,
        )
        .await?;
    Ok(ApiResponse::ok(
        notifications.into_iter().map(Into::into).collect(),
    ))
}

/// Mark one of the caller's notifications as read.
async fn mark_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<MarkReadRequest>,
) -> AppResult<ApiResponse<Ack>> {
    state
        .notification_service
        .mark_read(&user.id, &req.notification_id)
        .await?;
    Ok(ApiResponse::ack())
}

/// Mark everything as read. Returns how many changed.
async fn mark_all_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Count>> {
    let count = state.notification_service.mark_all_read(&user.id).await?;
    Ok(ApiResponse::ok(Count { count }))
}

/// Number of unread notifications.
async fn unread_count(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Count>> {
    let count = state.notification_service.count_unread(&user.id).await?;
    Ok(ApiResponse::ok(Count { count }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/list", post(list))
        .route("/mark-read", post(mark_read))
        .route("/mark-all-read", post(mark_all_read))
        .route("/unread-count", post(unread_count))
}
