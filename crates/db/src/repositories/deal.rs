//! Deal repository.

use std::sync::Arc;

use crate::entities::{
    Deal,
    deal::{self, DealStatus},
};
use agrex_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, sea_query::Expr,
};

/// Which deals a query may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DealScope {
    /// Every deal (admin).
    All,
    /// Deals where the user is the selling farmer.
    Farmer(String),
    /// Deals where the user is the buyer.
    Buyer(String),
    /// Deals where the user is either party.
    Participant(String),
}

impl DealScope {
    fn apply(&self, query: Select<Deal>) -> Select<Deal> {
        match self {
            Self::All => query,
            Self::Farmer(id) => query.filter(deal::Column::FarmerId.eq(id.as_str())),
            Self::Buyer(id) => query.filter(deal::Column::BuyerId.eq(id.as_str())),
            Self::Participant(id) => query.filter(
                Condition::any()
                    .add(deal::Column::FarmerId.eq(id.as_str()))
                    .add(deal::Column::BuyerId.eq(id.as_str())),
            ),
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct StatusCount {
    status: DealStatus,
    count: i64,
}

#[derive(Debug, FromQueryResult)]
struct ValueTotal {
    total: Option<f64>,
}

/// Deal repository for database operations.
#[derive(Clone)]
pub struct DealRepository {
    db: Arc<DatabaseConnection>,
}

impl DealRepository {
    /// Create a new deal repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a deal by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<deal::Model>> {
        Deal::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a deal by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<deal::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::DealNotFound(id.to_string()))
    }

    /// Create a new deal.
    pub async fn create(&self, model: deal::ActiveModel) -> AppResult<deal::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Deals visible within a scope, newest first.
    pub async fn find_for_scope(
        &self,
        scope: &DealScope,
        status: Option<DealStatus>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<deal::Model>> {
        let mut query = scope.apply(Deal::find()).order_by_desc(deal::Column::CreatedAt);

        if let Some(s) = status {
            query = query.filter(deal::Column::Status.eq(s));
        }

        query
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Conditionally move a deal from `expected` to `target`.
    ///
    /// Returns the number of rows changed.
    pub async fn transition_status(
        &self,
        id: &str,
        expected: DealStatus,
        target: DealStatus,
    ) -> AppResult<u64> {
        let result = Deal::update_many()
            .col_expr(deal::Column::Status, Expr::value(target))
            .col_expr(
                deal::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().fixed_offset()),
            )
            .filter(deal::Column::Id.eq(id))
            .filter(deal::Column::Status.eq(expected))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Number of deals ever made on a post.
    pub async fn count_for_post(&self, post_id: &str) -> AppResult<u64> {
        Deal::find()
            .filter(deal::Column::PostId.eq(post_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Number of deals on a post that are neither completed nor cancelled.
    pub async fn count_open_for_post(&self, post_id: &str) -> AppResult<u64> {
        Deal::find()
            .filter(deal::Column::PostId.eq(post_id))
            .filter(deal::Column::Status.is_not_in([DealStatus::Completed, DealStatus::Cancelled]))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count deals grouped by status within a scope.
    pub async fn count_by_status(&self, scope: &DealScope) -> AppResult<Vec<(DealStatus, u64)>> {
        let rows = scope
            .apply(Deal::find())
            .select_only()
            .column(deal::Column::Status)
            .column_as(deal::Column::Id.count(), "count")
            .group_by(deal::Column::Status)
            .into_model::<StatusCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|r| (r.status, u64::try_from(r.count).unwrap_or(0)))
            .collect())
    }

    /// Sum of `offer_price * offer_quantity` over completed deals in a scope.
    pub async fn sum_completed_value(&self, scope: &DealScope) -> AppResult<f64> {
        let row = scope
            .apply(Deal::find())
            .select_only()
            .column_as(
                Expr::cust("COALESCE(SUM(offer_price * offer_quantity), 0)::float8"),
                "total",
            )
            .filter(deal::Column::Status.eq(DealStatus::Completed))
            .into_model::<ValueTotal>()
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(row.and_then(|r| r.total).unwrap_or(0.0))
    }
}
