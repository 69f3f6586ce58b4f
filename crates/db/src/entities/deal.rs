//! Deal entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a deal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumIter, DeriveActiveEnum, Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    #[sea_orm(string_value = "initiated")]
    #[default]
    Initiated,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "disputed")]
    Disputed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl DealStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Accepted => "accepted",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Disputed => "disputed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled deals never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// A negotiated transaction between a buyer and a farmer over a crop post.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "deal")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub post_id: String,

    pub farmer_id: String,

    pub buyer_id: String,

    /// Offered price per unit
    pub offer_price: f64,

    pub offer_quantity: f64,

    #[sea_orm(column_type = "Text", nullable)]
    pub message: Option<String>,

    pub status: DealStatus,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Total value of the deal (price × quantity).
    #[must_use]
    pub fn total_value(&self) -> f64 {
        self.offer_price * self.offer_quantity
    }

    /// Is the user the farmer or the buyer of this deal?
    #[must_use]
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.farmer_id == user_id || self.buyer_id == user_id
    }

    /// The other participant, if `user_id` is one of them.
    #[must_use]
    pub fn counterparty_of(&self, user_id: &str) -> Option<&str> {
        if self.farmer_id == user_id {
            Some(&self.buyer_id)
        } else if self.buyer_id == user_id {
            Some(&self.farmer_id)
        } else {
            None
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::crop_post::Entity",
        from = "Column::PostId",
        to = "super::crop_post::Column::Id",
        on_delete = "Restrict"
    )]
    CropPost,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::FarmerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Farmer,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::BuyerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Buyer,
}

impl Related<super::crop_post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CropPost.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
