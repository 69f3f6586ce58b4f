//! Deal endpoints shared by farmers, buyers and admins.

use agrex_common::AppResult;
use agrex_core::{CreateOfferInput, page_limit};
use agrex_db::entities::deal::{self, DealStatus};
use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Deal response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealResponse {
    pub id: String,
    pub post_id: String,
    pub farmer_id: String,
    pub buyer_id: String,
    pub offer_price: f64,
    pub offer_quantity: f64,
    pub total_value: f64,
    pub message: Option<String>,
    pub status: DealStatus,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<deal::Model> for DealResponse {
    fn from(d: deal::Model) -> Self {
        Self {
            total_value: d.total_value(),
            id: d.id,
            post_id: d.post_id,
            farmer_id: d.farmer_id,
            buyer_id: d.buyer_id,
            offer_price: d.offer_price,
            offer_quantity: d.offer_quantity,
            message: d.message,
            status: d.status,
            created_at: d.created_at.to_rfc3339(),
            updated_at: d.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// List deals request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDealsRequest {
    pub status: Option<DealStatus>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: u64,
}

/// Request naming a single deal.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealIdRequest {
    pub deal_id: String,
}

/// Status change request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub deal_id: String,
    pub status: DealStatus,
}

/// Make an offer on an approved post.
async fn create_deal(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateOfferInput>,
) -> AppResult<ApiResponse<DealResponse>> {
    let deal = state.deal_service.create_offer(&user, req).await?;
    Ok(ApiResponse::ok(deal.into()))
}

/// Deals the caller takes part in.
async fn list_deals(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListDealsRequest>,
) -> AppResult<ApiResponse<Vec<DealResponse>>> {
    let deals = state
        .deal_service
        .list_for_user(&user, req.status, page_limit(req.limit), req.offset)
        .await?;
    Ok(ApiResponse::ok(deals.into_iter().map(Into::into).collect()))
}

/// A single deal.
async fn show_deal(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<DealIdRequest>,
) -> AppResult<ApiResponse<DealResponse>> {
    let deal = state.deal_service.get_for_user(&user, &req.deal_id).await?;
    Ok(ApiResponse::ok(deal.into()))
}

/// Move a deal along its lifecycle.
async fn update_status(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateStatusRequest>,
) -> AppResult<ApiResponse<DealResponse>> {
    let deal = state
        .deal_service
        .update_status(&user, &req.deal_id, req.status)
        .await?;
    Ok(ApiResponse::ok(deal.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_deal))
        .route("/list", post(list_deals))
        .route("/show", post(show_deal))
        .route("/update-status", post(update_status))
}
