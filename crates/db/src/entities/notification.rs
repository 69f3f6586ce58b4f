//! Notification entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "camelCase")]
pub enum NotificationType {
    #[sea_orm(string_value = "postApproved")]
    PostApproved,
    #[sea_orm(string_value = "postRejected")]
    PostRejected,
    #[sea_orm(string_value = "postReevaluated")]
    PostReevaluated,
    #[sea_orm(string_value = "dealOffer")]
    DealOffer,
    #[sea_orm(string_value = "dealStatusChanged")]
    DealStatusChanged,
    #[sea_orm(string_value = "chatMessage")]
    ChatMessage,
    #[sea_orm(string_value = "system")]
    System,
}

impl NotificationType {
    /// Wire name of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PostApproved => "postApproved",
            Self::PostRejected => "postRejected",
            Self::PostReevaluated => "postReevaluated",
            Self::DealOffer => "dealOffer",
            Self::DealStatusChanged => "dealStatusChanged",
            Self::ChatMessage => "chatMessage",
            Self::System => "system",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The user receiving the notification
    pub user_id: String,

    pub notification_type: NotificationType,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub message: String,

    #[sea_orm(nullable)]
    pub post_id: Option<String>,

    #[sea_orm(nullable)]
    pub deal_id: Option<String>,

    #[sea_orm(default_value = false)]
    pub is_read: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
