//! Crop post repository.

use std::sync::Arc;

use crate::entities::{
    CropPost,
    crop_post::{self, ReviewStatus},
};
use agrex_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult,
    QueryFilter, QueryOrder, QuerySelect, SqlErr,
    prelude::DateTimeWithTimeZone,
    sea_query::{Expr, Func},
};

/// Marketplace filter for approved posts.
#[derive(Debug, Clone, Default)]
pub struct MarketFilter {
    /// Case-insensitive substring of the crop name.
    pub crop_name: Option<String>,
    /// Exact state, ignoring case.
    pub state: Option<String>,
    /// Exact district, ignoring case.
    pub district: Option<String>,
    /// Inclusive lower bound on the unit price.
    pub min_price: Option<f64>,
    /// Inclusive upper bound on the unit price.
    pub max_price: Option<f64>,
}

/// Marketplace ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarketSort {
    /// Most recently listed first.
    #[default]
    Newest,
    /// Highest verification score first.
    Score,
}

/// Values written by a review transition.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub struct ReviewUpdate {
    pub status: ReviewStatus,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTimeWithTimeZone>,
}

impl ReviewUpdate {
    /// A review decision recorded by an admin.
    #[must_use]
    pub fn reviewed(
        status: ReviewStatus,
        admin_id: &str,
        notes: Option<String>,
        at: DateTimeWithTimeZone,
    ) -> Self {
        Self {
            status,
            admin_notes: notes,
            reviewed_by: Some(admin_id.to_string()),
            reviewed_at: Some(at),
        }
    }

    /// Back to the review queue with review metadata cleared.
    #[must_use]
    pub const fn cleared(status: ReviewStatus) -> Self {
        Self {
            status,
            admin_notes: None,
            reviewed_by: None,
            reviewed_at: None,
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct StatusCount {
    status: ReviewStatus,
    count: i64,
}

#[derive(Debug, FromQueryResult)]
struct ScoreAverage {
    average: Option<f64>,
}

/// Escape `LIKE` wildcards in user input.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Crop post repository for database operations.
#[derive(Clone)]
pub struct CropPostRepository {
    db: Arc<DatabaseConnection>,
}

impl CropPostRepository {
    /// Create a new crop post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<crop_post::Model>> {
        CropPost::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a post by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<crop_post::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PostNotFound(id.to_string()))
    }

    /// Create a new post.
    pub async fn create(&self, model: crop_post::ActiveModel) -> AppResult<crop_post::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a post.
    pub async fn update(&self, model: crop_post::ActiveModel) -> AppResult<crop_post::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a post only while its status is one of `allowed`.
    ///
    /// Returns `None` when the post is missing or has moved to another status.
    pub async fn update_if_status(
        &self,
        model: crop_post::ActiveModel,
        allowed: &[ReviewStatus],
    ) -> AppResult<Option<crop_post::Model>> {
        match CropPost::update(model)
            .filter(crop_post::Column::Status.is_in(allowed.iter().copied()))
            .exec(self.db.as_ref())
            .await
        {
            Ok(post) => Ok(Some(post)),
            Err(DbErr::RecordNotUpdated) => Ok(None),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    /// Delete a post. Returns whether a row was removed.
    ///
    /// Posts referenced by a deal are kept by the foreign key and reported
    /// as a conflict.
    pub async fn delete(&self, id: &str) -> AppResult<bool> {
        let result = CropPost::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                    AppError::Conflict(format!("post {id} is referenced by a deal"))
                }
                _ => AppError::Database(e.to_string()),
            })?;

        Ok(result.rows_affected > 0)
    }

    /// Posts owned by a farmer, newest first.
    pub async fn find_by_farmer(
        &self,
        farmer_id: &str,
        status: Option<ReviewStatus>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<crop_post::Model>> {
        let mut query = CropPost::find()
            .filter(crop_post::Column::FarmerId.eq(farmer_id))
            .order_by_desc(crop_post::Column::CreatedAt);

        if let Some(s) = status {
            query = query.filter(crop_post::Column::Status.eq(s));
        }

        query
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Every post a farmer owns.
    pub async fn find_all_by_farmer(&self, farmer_id: &str) -> AppResult<Vec<crop_post::Model>> {
        CropPost::find()
            .filter(crop_post::Column::FarmerId.eq(farmer_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Overwrite the stored verification score of a post.
    pub async fn set_score(&self, id: &str, score: i32) -> AppResult<()> {
        CropPost::update_many()
            .col_expr(crop_post::Column::VerificationScore, Expr::value(score))
            .filter(crop_post::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Review queue, newest first.
    pub async fn find_by_status(
        &self,
        status: Option<ReviewStatus>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<crop_post::Model>> {
        let mut query = CropPost::find().order_by_desc(crop_post::Column::CreatedAt);

        if let Some(s) = status {
            query = query.filter(crop_post::Column::Status.eq(s));
        }

        query
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Approved posts matching a marketplace filter.
    pub async fn search_approved(
        &self,
        filter: &MarketFilter,
        sort: MarketSort,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<crop_post::Model>> {
        let mut query =
            CropPost::find().filter(crop_post::Column::Status.eq(ReviewStatus::Approved));

        if let Some(name) = filter.crop_name.as_deref().filter(|n| !n.trim().is_empty()) {
            query = query.filter(
                Expr::expr(Func::lower(Expr::col(crop_post::Column::CropName)))
                    .like(like_pattern(name.trim())),
            );
        }
        if let Some(state) = filter.state.as_deref().filter(|s| !s.trim().is_empty()) {
            query = query.filter(
                Expr::expr(Func::lower(Expr::col(crop_post::Column::State)))
                    .eq(state.trim().to_lowercase()),
            );
        }
        if let Some(district) = filter.district.as_deref().filter(|d| !d.trim().is_empty()) {
            query = query.filter(
                Expr::expr(Func::lower(Expr::col(crop_post::Column::District)))
                    .eq(district.trim().to_lowercase()),
            );
        }
        if let Some(min) = filter.min_price {
            query = query.filter(crop_post::Column::PricePerUnit.gte(min));
        }
        if let Some(max) = filter.max_price {
            query = query.filter(crop_post::Column::PricePerUnit.lte(max));
        }

        query = match sort {
            MarketSort::Newest => query.order_by_desc(crop_post::Column::CreatedAt),
            MarketSort::Score => query
                .order_by_desc(crop_post::Column::VerificationScore)
                .order_by_desc(crop_post::Column::CreatedAt),
        };

        query
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Conditionally move a post from `expected` to `update.status`.
    ///
    /// Returns the number of rows changed: `0` means the post is missing or
    /// no longer in `expected`.
    pub async fn transition_status(
        &self,
        id: &str,
        expected: ReviewStatus,
        update: ReviewUpdate,
    ) -> AppResult<u64> {
        let result = CropPost::update_many()
            .col_expr(crop_post::Column::Status, Expr::value(update.status))
            .col_expr(crop_post::Column::AdminNotes, Expr::value(update.admin_notes))
            .col_expr(crop_post::Column::ReviewedBy, Expr::value(update.reviewed_by))
            .col_expr(crop_post::Column::ReviewedAt, Expr::value(update.reviewed_at))
            .col_expr(
                crop_post::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().fixed_offset()),
            )
            .filter(crop_post::Column::Id.eq(id))
            .filter(crop_post::Column::Status.eq(expected))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Count posts grouped by status, optionally for a single farmer.
    pub async fn count_by_status(
        &self,
        farmer_id: Option<&str>,
    ) -> AppResult<Vec<(ReviewStatus, u64)>> {
        let mut query = CropPost::find()
            .select_only()
            .column(crop_post::Column::Status)
            .column_as(crop_post::Column::Id.count(), "count")
            .group_by(crop_post::Column::Status);

        if let Some(id) = farmer_id {
            query = query.filter(crop_post::Column::FarmerId.eq(id));
        }

        let rows = query
            .into_model::<StatusCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|r| (r.status, u64::try_from(r.count).unwrap_or(0)))
            .collect())
    }

    /// Average verification score of posts in a status.
    pub async fn average_score(&self, status: ReviewStatus) -> AppResult<Option<f64>> {
        let row = CropPost::find()
            .select_only()
            .column_as(Expr::cust("AVG(verification_score)::float8"), "average")
            .filter(crop_post::Column::Status.eq(status))
            .into_model::<ScoreAverage>()
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(row.and_then(|r| r.average))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_post(id: &str, farmer_id: &str, status: ReviewStatus) -> crop_post::Model {
        crop_post::Model {
            id: id.to_string(),
            farmer_id: farmer_id.to_string(),
            crop_name: "Basmati Rice".to_string(),
            variety: None,
            quantity: 500.0,
            unit: "kg".to_string(),
            price_per_unit: 42.0,
            description: None,
            contact_phone: None,
            village: None,
            district: None,
            state: None,
            latitude: None,
            longitude: None,
            image_urls: serde_json::json!([]),
            verification_score: 0,
            status,
            admin_notes: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Rice"), "%rice%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<crop_post::Model>::new()])
                .into_connection(),
        );

        let repo = CropPostRepository::new(db);
        let result = repo.get_by_id("missing").await;

        assert!(matches!(result, Err(AppError::PostNotFound(_))));
    }

    #[tokio::test]
    async fn test_search_approved() {
        let p1 = create_test_post("p1", "f1", ReviewStatus::Approved);
        let p2 = create_test_post("p2", "f2", ReviewStatus::Approved);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[p1, p2]])
                .into_connection(),
        );

        let repo = CropPostRepository::new(db);
        let filter = MarketFilter {
            crop_name: Some("rice".to_string()),
            min_price: Some(10.0),
            ..Default::default()
        };
        let result = repo
            .search_approved(&filter, MarketSort::Score, 20, 0)
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_update_if_status_rejects_moved_post() {
        let post = create_test_post("p1", "f1", ReviewStatus::Pending);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<crop_post::Model>::new()])
                .into_connection(),
        );

        let repo = CropPostRepository::new(db);
        let mut active: crop_post::ActiveModel = post.into();
        active.crop_name = sea_orm::Set("Durum Wheat".to_string());
        let result = repo
            .update_if_status(active, &[ReviewStatus::Pending, ReviewStatus::Rejected])
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_transition_status_reports_rows() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 0,
                    },
                ])
                .into_connection(),
        );

        let repo = CropPostRepository::new(db);
        let update = ReviewUpdate::reviewed(
            ReviewStatus::Approved,
            "admin1",
            Some("looks good".to_string()),
            Utc::now().into(),
        );

        let first = repo
            .transition_status("p1", ReviewStatus::Pending, update.clone())
            .await
            .unwrap();
        let second = repo
            .transition_status("p1", ReviewStatus::Pending, update)
            .await
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn test_count_by_status() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![
                    maplit::btreemap! {
                        "status" => sea_orm::Value::from("pending"),
                        "count" => sea_orm::Value::BigInt(Some(4)),
                    },
                    maplit::btreemap! {
                        "status" => sea_orm::Value::from("approved"),
                        "count" => sea_orm::Value::BigInt(Some(9)),
                    },
                ]])
                .into_connection(),
        );

        let repo = CropPostRepository::new(db);
        let counts = repo.count_by_status(Some("f1")).await.unwrap();

        assert_eq!(
            counts,
            vec![(ReviewStatus::Pending, 4), (ReviewStatus::Approved, 9)]
        );
    }

    #[tokio::test]
    async fn test_average_score() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "average" => sea_orm::Value::Double(Some(62.5)),
                }]])
                .into_connection(),
        );

        let repo = CropPostRepository::new(db);
        let average = repo.average_score(ReviewStatus::Pending).await.unwrap();

        assert_eq!(average, Some(62.5));
    }
}
