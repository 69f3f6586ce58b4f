//! Authentication and account endpoints.

use agrex_common::AppResult;
use agrex_core::{SignupInput, UpdateProfileInput};
use agrex_db::entities::{
    user::{self, UserRole, VerificationStatus},
    user_profile,
};
use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{Ack, ApiResponse},
};

/// Public view of an account.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub name: Option<String>,
    pub role: UserRole,
    pub verification_status: VerificationStatus,
    pub created_at: String,
}

impl From<user::Model> for UserResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            name: u.name,
            role: u.role,
            verification_status: u.verification_status,
            created_at: u.created_at.to_rfc3339(),
        }
    }
}

/// The caller's own account with contact details.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub village: Option<String>,
    pub district: Option<String>,
    pub state: Option<String>,
}

impl MeResponse {
    fn new(user: user::Model, profile: user_profile::Model) -> Self {
        Self {
            user: user.into(),
            phone: profile.phone,
            email: profile.email,
            village: profile.village,
            district: profile.district,
            state: profile.state,
        }
    }
}

/// Returned by signup and signin. The only place a token is exposed.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub token: String,
}

impl From<user::Model> for SessionResponse {
    fn from(mut u: user::Model) -> Self {
        let token = u.token.take().unwrap_or_default();
        Self {
            user: u.into(),
            token,
        }
    }
}

/// Signin request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninRequest {
    pub username: String,
    pub password: String,
}

/// Create a new farmer or buyer account.
async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupInput>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let (user, _profile) = state.user_service.signup(req).await?;
    Ok(ApiResponse::ok(user.into()))
}

/// Sign in to an existing account.
async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SigninRequest>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let user = state
        .user_service
        .signin(&req.username, &req.password)
        .await?;
    Ok(ApiResponse::ok(user.into()))
}

/// Sign out by rotating the current token.
async fn signout(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Ack>> {
    state.user_service.signout(&user).await?;
    Ok(ApiResponse::ack())
}

/// The caller's account.
async fn me(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<MeResponse>> {
    let profile = state.user_service.get_profile(&user.id).await?;
    Ok(ApiResponse::ok(MeResponse::new(user, profile)))
}

/// Update the caller's name and contact details.
async fn update_me(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateProfileInput>,
) -> AppResult<ApiResponse<MeResponse>> {
    let (user, profile) = state.user_service.update_profile(&user, req).await?;
    Ok(ApiResponse::ok(MeResponse::new(user, profile)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/signout", post(signout))
        .route("/i", post(me))
        .route("/i/update", post(update_me))
}
