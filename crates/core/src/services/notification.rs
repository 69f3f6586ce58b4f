//! Notification service.

use agrex_common::{AppError, AppResult, IdGenerator};
use agrex_db::{
    entities::notification::{self, NotificationType},
    repositories::NotificationRepository,
};
use sea_orm::Set;

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(notification_repo: NotificationRepository) -> Self {
        Self {
            notification_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Store a notification for a user.
    pub async fn notify(
        &self,
        user_id: &str,
        notification_type: NotificationType,
        title: &str,
        message: &str,
        post_id: Option<&str>,
        deal_id: Option<&str>,
    ) -> AppResult<notification::Model> {
        let model = notification::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            notification_type: Set(notification_type),
            title: Set(title.to_string()),
            message: Set(message.to_string()),
            post_id: Set(post_id.map(String::from)),
            deal_id: Set(deal_id.map(String::from)),
            is_read: Set(false),
            created_at: Set(chrono::Utc::now().into()),
        };

        let created = self.notification_repo.create(model).await?;

        tracing::debug!(
            user_id = %user_id,
            kind = notification_type.as_str(),
            "Notification created"
        );

        Ok(created)
    }

    /// Like [`Self::notify`], but a failure is logged instead of returned.
    ///
    /// Used after a state change has been committed.
    pub async fn notify_best_effort(
        &self,
        user_id: &str,
        notification_type: NotificationType,
        title: &str,
        message: &str,
        post_id: Option<&str>,
        deal_id: Option<&str>,
    ) {
        if let Err(e) = self
            .notify(user_id, notification_type, title, message, post_id, deal_id)
            .await
        {
            tracing::warn!(
                error = %e,
                user_id = %user_id,
                kind = notification_type.as_str(),
                "Failed to store notification"
            );
        }
    }

    /// Get notifications for a user.
    pub async fn list(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
        unread_only: bool,
    ) -> AppResult<Vec<notification::Model>> {
        self.notification_repo
            .find_by_user(user_id, limit, until_id, unread_only)
            .await
    }

    /// Mark one of the user's own notifications as read.
    pub async fn mark_read(&self, user_id: &str, notification_id: &str) -> AppResult<()> {
        let rows = self
            .notification_repo
            .mark_as_read(notification_id, user_id)
            .await?;

        if rows == 0 {
            return Err(AppError::NotFound(format!(
                "Notification {notification_id} not found"
            )));
        }
        Ok(())
    }

    /// Mark all of a user's notifications as read.
    pub async fn mark_all_read(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.mark_all_as_read(user_id).await
    }

    /// Count unread notifications.
    pub async fn count_unread(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.count_unread(user_id).await
    }
}
