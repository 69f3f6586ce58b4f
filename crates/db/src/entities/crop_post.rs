//! Crop post entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Admin review status of a crop post.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl ReviewStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// A farmer's listing of a crop lot.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "crop_post")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owning farmer
    pub farmer_id: String,

    pub crop_name: String,

    #[sea_orm(nullable)]
    pub variety: Option<String>,

    pub quantity: f64,

    /// Unit of `quantity` (kg, quintal, ton, ...)
    pub unit: String,

    pub price_per_unit: f64,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[sea_orm(nullable)]
    pub contact_phone: Option<String>,

    #[sea_orm(nullable)]
    pub village: Option<String>,

    #[sea_orm(nullable)]
    pub district: Option<String>,

    #[sea_orm(nullable)]
    pub state: Option<String>,

    #[sea_orm(nullable)]
    pub latitude: Option<f64>,

    #[sea_orm(nullable)]
    pub longitude: Option<f64>,

    /// Image URLs (JSON array of strings, first one is the primary image)
    #[sea_orm(column_type = "JsonBinary")]
    pub image_urls: Json,

    /// Presence score stored at write time
    pub verification_score: i32,

    pub status: ReviewStatus,

    #[sea_orm(column_type = "Text", nullable)]
    pub admin_notes: Option<String>,

    #[sea_orm(nullable)]
    pub reviewed_by: Option<String>,

    #[sea_orm(nullable)]
    pub reviewed_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Image URLs decoded from the JSON column. Non-string entries are skipped.
    #[must_use]
    pub fn images(&self) -> Vec<String> {
        self.image_urls
            .as_array()
            .map(|urls| {
                urls.iter()
                    .filter_map(|u| u.as_str().map(ToString::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::FarmerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Farmer,
    #[sea_orm(has_many = "super::deal::Entity")]
    Deal,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Farmer.def()
    }
}

impl Related<super::deal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Deal.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
