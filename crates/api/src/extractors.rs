//! Request extractors.

use agrex_common::AppError;
use agrex_db::entities::user;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Authenticated user extractor.
///
/// The user is placed in the request extensions by
/// [`auth_middleware`](crate::middleware::auth_middleware); a missing user
/// is rejected with the JSON `UNAUTHORIZED` error.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<user::Model>()
            .cloned()
            .map(AuthUser)
            .ok_or(AppError::Unauthorized)
    }
}
