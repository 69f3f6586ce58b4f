//! Create deal table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Deal::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Deal::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Deal::PostId).string_len(32).not_null())
                    .col(ColumnDef::new(Deal::FarmerId).string_len(32).not_null())
                    .col(ColumnDef::new(Deal::BuyerId).string_len(32).not_null())
                    .col(ColumnDef::new(Deal::OfferPrice).double().not_null())
                    .col(ColumnDef::new(Deal::OfferQuantity).double().not_null())
                    .col(ColumnDef::new(Deal::Message).text())
                    .col(
                        ColumnDef::new(Deal::Status)
                            .string_len(16)
                            .not_null()
                            .default("initiated"),
                    )
                    .col(
                        ColumnDef::new(Deal::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Deal::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deal_post")
                            .from(Deal::Table, Deal::PostId)
                            .to(CropPost::Table, CropPost::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deal_farmer")
                            .from(Deal::Table, Deal::FarmerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deal_buyer")
                            .from(Deal::Table, Deal::BuyerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("idx_deal_post_id", Deal::PostId),
            ("idx_deal_farmer_id", Deal::FarmerId),
            ("idx_deal_buyer_id", Deal::BuyerId),
            ("idx_deal_status", Deal::Status),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(Deal::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Deal::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Deal {
    Table,
    Id,
    PostId,
    FarmerId,
    BuyerId,
    OfferPrice,
    OfferQuantity,
    Message,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum CropPost {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
