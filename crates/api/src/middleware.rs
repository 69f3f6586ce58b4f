//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use agrex_core::{
    AnalyticsService, ChatService, CropPostService, DealService, NotificationService,
    ReviewService, UserService,
};
use agrex_db::repositories::{
    ChatMessageRepository, CropPostRepository, DealRepository, NotificationRepository,
    UserProfileRepository, UserRepository,
};
use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use sea_orm::DatabaseConnection;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub crop_post_service: CropPostService,
    pub review_service: ReviewService,
    pub deal_service: DealService,
    pub notification_service: NotificationService,
    pub analytics_service: AnalyticsService,
    pub chat_service: ChatService,
}

impl AppState {
    /// Wire every repository and service onto one connection pool.
    #[must_use]
    pub fn new(db: &Arc<DatabaseConnection>) -> Self {
        let user_repo = UserRepository::new(Arc::clone(db));
        let profile_repo = UserProfileRepository::new(Arc::clone(db));
        let post_repo = CropPostRepository::new(Arc::clone(db));
        let deal_repo = DealRepository::new(Arc::clone(db));
        let notification_repo = NotificationRepository::new(Arc::clone(db));
        let message_repo = ChatMessageRepository::new(Arc::clone(db));

        let notification_service = NotificationService::new(notification_repo);

        Self {
            user_service: UserService::new(
                user_repo.clone(),
                profile_repo.clone(),
                post_repo.clone(),
            ),
            crop_post_service: CropPostService::new(
                post_repo.clone(),
                deal_repo.clone(),
                profile_repo.clone(),
            ),
            review_service: ReviewService::new(
                post_repo.clone(),
                profile_repo,
                notification_service.clone(),
            ),
            deal_service: DealService::new(
                deal_repo.clone(),
                post_repo.clone(),
                notification_service.clone(),
            ),
            analytics_service: AnalyticsService::new(user_repo, post_repo, deal_repo.clone()),
            chat_service: ChatService::new(message_repo, deal_repo, notification_service.clone()),
            notification_service,
        }
    }
}

/// Authentication middleware.
///
/// A valid `Authorization: Bearer <token>` header puts the user into the
/// request extensions. Anything else passes through anonymously and is
/// rejected later by handlers that require [`AuthUser`](crate::extractors::AuthUser).
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(String::from);

    if let Some(token) = token {
        match state.user_service.authenticate_by_token(&token).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Bearer token rejected");
            }
        }
    }

    next.run(req).await
}
