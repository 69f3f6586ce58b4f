//! Farmer endpoints: managing one's own crop posts.

use agrex_common::AppResult;
use agrex_core::{CreatePostInput, FarmerStats, UpdatePostInput, page_limit};
use agrex_db::entities::crop_post::{self, ReviewStatus};
use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{Ack, ApiResponse},
};

/// Crop post response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: String,
    pub farmer_id: String,
    pub crop_name: String,
    pub variety: Option<String>,
    pub quantity: f64,
    pub unit: String,
    pub price_per_unit: f64,
    pub description: Option<String>,
    pub contact_phone: Option<String>,
    pub village: Option<String>,
    pub district: Option<String>,
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub image_urls: Vec<String>,
    pub verification_score: i32,
    pub status: ReviewStatus,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<crop_post::Model> for PostResponse {
    fn from(p: crop_post::Model) -> Self {
        let image_urls = p.images();
        Self {
            id: p.id,
            farmer_id: p.farmer_id,
            crop_name: p.crop_name,
            variety: p.variety,
            quantity: p.quantity,
            unit: p.unit,
            price_per_unit: p.price_per_unit,
            description: p.description,
            contact_phone: p.contact_phone,
            village: p.village,
            district: p.district,
            state: p.state,
            latitude: p.latitude,
            longitude: p.longitude,
            image_urls,
            verification_score: p.verification_score,
            status: p.status,
            admin_notes: p.admin_notes,
            reviewed_by: p.reviewed_by,
            reviewed_at: p.reviewed_at.map(|t| t.to_rfc3339()),
            created_at: p.created_at.to_rfc3339(),
            updated_at: p.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Update post request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub post_id: String,
    #[serde(flatten)]
    pub changes: UpdatePostInput,
}

/// Request naming a single post.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostIdRequest {
    pub post_id: String,
}

/// List own posts request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMyPostsRequest {
    pub status: Option<ReviewStatus>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: u64,
}

/// List a new crop lot.
async fn create_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreatePostInput>,
) -> AppResult<ApiResponse<PostResponse>> {
    let post = state.crop_post_service.create(&user, req).await?;
    Ok(ApiResponse::ok(post.into()))
}

/// Edit a pending or rejected post.
async fn update_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdatePostRequest>,
) -> AppResult<ApiResponse<PostResponse>> {
    let post = state
        .crop_post_service
        .update(&user, &req.post_id, req.changes)
        .await?;
    Ok(ApiResponse::ok(post.into()))
}

/// Delete a post with no open deals.
async fn delete_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<PostIdRequest>,
) -> AppResult<ApiResponse<Ack>> {
    state.crop_post_service.delete(&user, &req.post_id).await?;
    Ok(ApiResponse::ack())
}

/// The caller's posts, newest first.
async fn list_posts(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListMyPostsRequest>,
) -> AppResult<ApiResponse<Vec<PostResponse>>> {
    let posts = state
        .crop_post_service
        .list_mine(&user, req.status, page_limit(req.limit), req.offset)
        .await?;
    Ok(ApiResponse::ok(posts.into_iter().map(Into::into).collect()))
}

/// Farmer dashboard numbers.
async fn stats(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<FarmerStats>> {
    let stats = state.analytics_service.farmer_stats(&user).await?;
    Ok(ApiResponse::ok(stats))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts/create", post(create_post))
        .route("/posts/update", post(update_post))
        .route("/posts/delete", post(delete_post))
        .route("/posts/list", post(list_posts))
        .route("/stats", post(stats))
}
