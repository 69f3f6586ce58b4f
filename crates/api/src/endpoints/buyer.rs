//! Buyer endpoints: the marketplace of approved posts.

use agrex_common::AppResult;
use agrex_core::{BuyerStats, page_limit};
use agrex_db::repositories::{MarketFilter, MarketSort};
use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;

use super::farmer::{PostIdRequest, PostResponse};
use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Marketplace ordering.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    Newest,
    Score,
}

impl From<SortBy> for MarketSort {
    fn from(sort: SortBy) -> Self {
        match sort {
            SortBy::Newest => Self::Newest,
            SortBy::Score => Self::Score,
        }
    }
}

/// Marketplace search request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPostsRequest {
    pub crop_name: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    #[serde(default)]
    pub sort: SortBy,
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: u64,
}

/// Search approved posts.
async fn search_posts(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SearchPostsRequest>,
) -> AppResult<ApiResponse<Vec<PostResponse>>> {
    let filter = MarketFilter {
        crop_name: req.crop_name,
        state: req.state,
        district: req.district,
        min_price: req.min_price,
        max_price: req.max_price,
    };

    let posts = state
        .crop_post_service
        .browse(&filter, req.sort.into(), page_limit(req.limit), req.offset)
        .await?;
    Ok(ApiResponse::ok(posts.into_iter().map(Into::into).collect()))
}

/// A single post as the caller may see it.
async fn show_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<PostIdRequest>,
) -> AppResult<ApiResponse<PostResponse>> {
    let post = state
        .crop_post_service
        .show_public(&user, &req.post_id)
        .await?;
    Ok(ApiResponse::ok(post.into()))
}

/// Buyer dashboard numbers.
async fn stats(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<BuyerStats>> {
    let stats = state.analytics_service.buyer_stats(&user).await?;
    Ok(ApiResponse::ok(stats))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts/search", post(search_posts))
        .route("/posts/show", post(show_post))
        .route("/stats", post(stats))
}
