//! Create crop post table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CropPost::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CropPost::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CropPost::FarmerId).string_len(32).not_null())
                    .col(ColumnDef::new(CropPost::CropName).string_len(128).not_null())
                    .col(ColumnDef::new(CropPost::Variety).string_len(128))
                    .col(ColumnDef::new(CropPost::Quantity).double().not_null())
                    .col(
                        ColumnDef::new(CropPost::Unit)
                            .string_len(16)
                            .not_null()
                            .default("kg"),
                    )
                    .col(ColumnDef::new(CropPost::PricePerUnit).double().not_null())
                    .col(ColumnDef::new(CropPost::Description).text())
                    .col(ColumnDef::new(CropPost::ContactPhone).string_len(32))
                    .col(ColumnDef::new(CropPost::Village).string_len(128))
                    .col(ColumnDef::new(CropPost::District).string_len(128))
                    .col(ColumnDef::new(CropPost::State).string_len(128))
                    .col(ColumnDef::new(CropPost::Latitude).double())
                    .col(ColumnDef::new(CropPost::Longitude).double())
                    .col(
                        ColumnDef::new(CropPost::ImageUrls)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(CropPost::VerificationScore)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CropPost::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(CropPost::AdminNotes).text())
                    .col(ColumnDef::new(CropPost::ReviewedBy).string_len(32))
                    .col(ColumnDef::new(CropPost::ReviewedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(CropPost::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(CropPost::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_crop_post_farmer")
                            .from(CropPost::Table, CropPost::FarmerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_crop_post_reviewer")
                            .from(CropPost::Table, CropPost::ReviewedBy)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (status, created_at) for the review queue and marketplace
        manager
            .create_index(
                Index::create()
                    .name("idx_crop_post_status_created_at")
                    .table(CropPost::Table)
                    .col(CropPost::Status)
                    .col(CropPost::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Index: farmer_id (for "my posts")
        manager
            .create_index(
                Index::create()
                    .name("idx_crop_post_farmer_id")
                    .table(CropPost::Table)
                    .col(CropPost::FarmerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CropPost::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum CropPost {
    Table,
    Id,
    FarmerId,
    CropName,
    Variety,
    Quantity,
    Unit,
    PricePerUnit,
    Description,
    ContactPhone,
    Village,
    District,
    State,
    Latitude,
    Longitude,
    ImageUrls,
    VerificationScore,
    Status,
    AdminNotes,
    ReviewedBy,
    ReviewedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
