//! Chat message repository.

use std::sync::Arc;

use crate::entities::{ChatMessage, chat_message};
use agrex_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

/// Chat message repository for database operations.
#[derive(Clone)]
pub struct ChatMessageRepository {
    db: Arc<DatabaseConnection>,
}

impl ChatMessageRepository {
    /// Create a new chat message repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create a new message.
    pub async fn create(&self, model: chat_message::ActiveModel) -> AppResult<chat_message::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Messages of a deal, newest first, older than `until_id` if given.
    pub async fn find_by_deal(
        &self,
        deal_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<chat_message::Model>> {
        let mut query = ChatMessage::find()
            .filter(chat_message::Column::DealId.eq(deal_id))
            .order_by_desc(chat_message::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(chat_message::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark every unread message addressed to `recipient_id` in a deal as read.
    pub async fn mark_read_for_recipient(&self, deal_id: &str, recipient_id: &str) -> AppResult<u64> {
        let result = ChatMessage::update_many()
            .filter(chat_message::Column::DealId.eq(deal_id))
            .filter(chat_message::Column::RecipientId.eq(recipient_id))
            .filter(chat_message::Column::IsRead.eq(false))
            .col_expr(chat_message::Column::IsRead, true.into())
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}
