//! Admin endpoints: the review queue, dashboard and account management.

use std::collections::BTreeMap;

use agrex_common::AppResult;
use agrex_core::{AdminStats, ReevaluateTarget, ScoreBreakdown, page_limit};
use agrex_db::entities::{crop_post::ReviewStatus, user::UserRole};
use axum::{Json, Router, extract::State, routing::post};
use sea_orm::Iterable;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{
    auth::UserResponse,
    farmer::{PostIdRequest, PostResponse},
};
use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// A post with its score recomputed signal by signal.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostReviewResponse {
    pub post: PostResponse,
    pub breakdown: ScoreBreakdown,
    pub computed_score: i32,
}

/// Review queue request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPostsRequest {
    pub status: Option<ReviewStatus>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: u64,
}

/// Approve or reject request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub post_id: String,
    #[validate(length(max = 2000))]
    pub admin_notes: Option<String>,
}

/// Re-evaluate request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReevaluateRequest {
    pub post_id: String,
    pub target: ReevaluateTarget,
    #[validate(length(max = 2000))]
    pub admin_notes: Option<String>,
}

/// List accounts request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersRequest {
    pub role: Option<UserRole>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: u64,
}

/// Verify account request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyUserRequest {
    pub user_id: String,
    pub verified: bool,
}

/// Change role request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRoleRequest {
    pub user_id: String,
    pub role: UserRole,
}

/// Posts awaiting or past review, newest first.
async fn list_posts(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListPostsRequest>,
) -> AppResult<ApiResponse<Vec<PostResponse>>> {
    let posts = state
        .review_service
        .list_posts(&user, req.status, page_limit(req.limit), req.offset)
        .await?;
    Ok(ApiResponse::ok(posts.into_iter().map(Into::into).collect()))
}

/// A post with its verification breakdown.
async fn show_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<PostIdRequest>,
) -> AppResult<ApiResponse<PostReviewResponse>> {
    let review = state.review_service.show(&user, &req.post_id).await?;
    Ok(ApiResponse::ok(PostReviewResponse {
        computed_score: review.breakdown.total(),
        breakdown: review.breakdown,
        post: review.post.into(),
    }))
}

/// Approve a pending post.
async fn approve_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ReviewRequest>,
) -> AppResult<ApiResponse<PostResponse>> {
    req.validate()?;
    let post = state
        .review_service
        .approve(&user, &req.post_id, req.admin_notes)
        .await?;
    Ok(ApiResponse::ok(post.into()))
}

/// Reject a pending post.
async fn reject_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ReviewRequest>,
) -> AppResult<ApiResponse<PostResponse>> {
    req.validate()?;
    let post = state
        .review_service
        .reject(&user, &req.post_id, req.admin_notes)
        .await?;
    Ok(ApiResponse::ok(post.into()))
}

/// Move a rejected post to approved or back to pending.
async fn reevaluate_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ReevaluateRequest>,
) -> AppResult<ApiResponse<PostResponse>> {
    req.validate()?;
    let post = state
        .review_service
        .reevaluate(&user, &req.post_id, req.target, req.admin_notes)
        .await?;
    Ok(ApiResponse::ok(post.into()))
}

/// Review queue sizes per status.
async fn post_counts(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<BTreeMap<&'static str, u64>>> {
    let counts = state.review_service.count_by_status(&user).await?;
    let mut map: BTreeMap<_, _> = ReviewStatus::iter().map(|s| (s.as_str(), 0)).collect();
    for (status, count) in counts {
        map.insert(status.as_str(), count);
    }
    Ok(ApiResponse::ok(map))
}

/// Platform dashboard numbers.
async fn stats(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<AdminStats>> {
    let stats = state.analytics_service.admin_stats(&user).await?;
    Ok(ApiResponse::ok(stats))
}

/// Accounts, newest first.
async fn list_users(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListUsersRequest>,
) -> AppResult<ApiResponse<Vec<UserResponse>>> {
    let users = state
        .user_service
        .list_users(&user, req.role, page_limit(req.limit), req.offset)
        .await?;
    Ok(ApiResponse::ok(users.into_iter().map(Into::into).collect()))
}

/// Mark an account as verified or unverified.
async fn verify_user(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<VerifyUserRequest>,
) -> AppResult<ApiResponse<UserResponse>> {
    let updated = state
        .user_service
        .set_verification(&user, &req.user_id, req.verified)
        .await?;
    Ok(ApiResponse::ok(updated.into()))
}

/// Change an account's role.
async fn set_role(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SetRoleRequest>,
) -> AppResult<ApiResponse<UserResponse>> {
    let updated = state
        .user_service
        .set_role(&user, &req.user_id, req.role)
        .await?;
    Ok(ApiResponse::ok(updated.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        // Review queue
        .route("/posts/list", post(list_posts))
        .route("/posts/show", post(show_post))
        .route("/posts/approve", post(approve_post))
        .route("/posts/reject", post(reject_post))
        .route("/posts/reevaluate", post(reevaluate_post))
        .route("/posts/counts", post(post_counts))
        // Dashboard
        .route("/stats", post(stats))
        // Accounts
        .route("/users/list", post(list_users))
        .route("/users/verify", post(verify_user))
        .route("/users/set-role", post(set_role))
}
