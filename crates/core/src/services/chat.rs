//! Deal-scoped chat between a farmer and a buyer.

use crate::services::notification::NotificationService;
use agrex_common::{AppError, AppResult, IdGenerator};
use agrex_db::{
    entities::{
        chat_message,
        deal::{self, DealStatus},
        notification::NotificationType,
        user,
    },
    repositories::{ChatMessageRepository, DealRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

/// Characters of a message shown in the notification.
const PREVIEW_CHARS: usize = 80;

/// Input for sending a chat message.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageInput {
    #[validate(length(min = 1))]
    pub deal_id: String,

    #[validate(length(min = 1, max = 2000))]
    pub text: String,
}

/// Chat service for business logic.
#[derive(Clone)]
pub struct ChatService {
    message_repo: ChatMessageRepository,
    deal_repo: DealRepository,
    notification_service: NotificationService,
    id_gen: IdGenerator,
}

impl ChatService {
    /// Create a new chat service.
    #[must_use]
    pub const fn new(
        message_repo: ChatMessageRepository,
        deal_repo: DealRepository,
        notification_service: NotificationService,
    ) -> Self {
        Self {
            message_repo,
            deal_repo,
            notification_service,
            id_gen: IdGenerator::new(),
        }
    }

    async fn participant_deal(&self, user: &user::Model, deal_id: &str) -> AppResult<deal::Model> {
        let deal = self.deal_repo.get_by_id(deal_id).await?;
        if deal.is_participant(&user.id) {
            Ok(deal)
        } else {
            Err(AppError::DealNotFound(deal_id.to_string()))
        }
    }

    /// Send a message to the other party of a deal.
    pub async fn send(
        &self,
        sender: &user::Model,
        input: SendMessageInput,
    ) -> AppResult<chat_message::Model> {
        input.validate()?;
        if input.text.trim().is_empty() {
            return Err(AppError::Validation("message is blank".to_string()));
        }

        let deal = self.participant_deal(sender, &input.deal_id).await?;
        if deal.status == DealStatus::Cancelled {
            return Err(AppError::Conflict(
                "cannot message on a cancelled deal".to_string(),
            ));
        }

        let recipient_id = deal
            .counterparty_of(&sender.id)
            .map(String::from)
            .ok_or_else(|| AppError::DealNotFound(deal.id.clone()))?;

        let model = chat_message::ActiveModel {
            id: Set(self.id_gen.generate()),
            deal_id: Set(deal.id.clone()),
            sender_id: Set(sender.id.clone()),
            recipient_id: Set(recipient_id.clone()),
            text: Set(input.text),
            is_read: Set(false),
            created_at: Set(chrono::Utc::now().into()),
        };

        let message = self.message_repo.create(model).await?;

        tracing::debug!(deal_id = %deal.id, sender_id = %sender.id, "Chat message sent");

        let preview: String = message.text.chars().take(PREVIEW_CHARS).collect();
        self.notification_service
            .notify_best_effort(
                &recipient_id,
                NotificationType::ChatMessage,
                "New message",
                &preview,
                Some(&deal.post_id),
                Some(&deal.id),
            )
            .await;

        Ok(message)
    }

    /// Messages of a deal, newest first. Admins may read any conversation.
    pub async fn list(
        &self,
        user: &user::Model,
        deal_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<chat_message::Model>> {
        if user.is_admin() {
            self.deal_repo.get_by_id(deal_id).await?;
        } else {
            self.participant_deal(user, deal_id).await?;
        }
        self.message_repo.find_by_deal(deal_id, limit, until_id).await
    }

    /// Mark the messages addressed to the user in a deal as read.
    pub async fn mark_read(&self, user: &user::Model, deal_id: &str) -> AppResult<u64> {
        self.participant_deal(user, deal_id).await?;
        self.message_repo
            .mark_read_for_recipient(deal_id, &user.id)
            .await
    }
}
