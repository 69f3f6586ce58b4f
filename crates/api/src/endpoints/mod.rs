//! API endpoints.

#![allow(missing_docs)]

mod admin;
mod auth;
mod buyer;
mod chat;
mod deals;
mod farmer;
mod notifications;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .nest("/farmer", farmer::router())
        .nest("/buyer", buyer::router())
        .nest("/admin", admin::router())
        .nest("/deals", deals::router())
        .nest("/notifications", notifications::router())
        .nest("/chat/messages", chat::router())
}
