//! Create chat message table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ChatMessage::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChatMessage::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ChatMessage::DealId).string_len(32).not_null())
                    .col(ColumnDef::new(ChatMessage::SenderId).string_len(32).not_null())
                    .col(ColumnDef::new(ChatMessage::RecipientId).string_len(32).not_null())
                    .col(ColumnDef::new(ChatMessage::Text).text().not_null())
                    .col(
                        ColumnDef::new(ChatMessage::IsRead)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ChatMessage::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chat_message_deal")
                            .from(ChatMessage::Table, ChatMessage::DealId)
                            .to(Deal::Table, Deal::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_chat_message_deal_id")
                    .table(ChatMessage::Table)
                    .col(ChatMessage::DealId)
                    .col(ChatMessage::Id)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ChatMessage::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ChatMessage {
    Table,
    Id,
    DealId,
    SenderId,
    RecipientId,
    Text,
    IsRead,
    CreatedAt,
}

#[derive(Iden)]
enum Deal {
    Table,
    Id,
}
