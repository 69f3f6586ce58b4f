//! User repository.

use std::sync::Arc;

use crate::entities::{
    User,
    user::{self, UserRole, VerificationStatus},
};
use agrex_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

#[derive(Debug, FromQueryResult)]
struct RoleCount {
    role: UserRole,
    count: i64,
}

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>> {
        User::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<user::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))
    }

    /// Find a user by username (case-insensitive).
    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::UsernameLower.eq(username.to_lowercase()))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by access token.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::Token.eq(token))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new user.
    pub async fn create(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a user.
    pub async fn update(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Replace a user's access token.
    pub async fn set_token(&self, user: user::Model, token: String) -> AppResult<user::Model> {
        let mut active: user::ActiveModel = user.into();
        active.token = Set(Some(token));
        active.updated_at = Set(Some(chrono::Utc::now().into()));
        self.update(active).await
    }

    /// Change a user's role.
    pub async fn set_role(&self, user: user::Model, role: UserRole) -> AppResult<user::Model> {
        let mut active: user::ActiveModel = user.into();
        active.role = Set(role);
        active.updated_at = Set(Some(chrono::Utc::now().into()));
        self.update(active).await
    }

    /// Change a user's verification status.
    pub async fn set_verification(
        &self,
        user: user::Model,
        status: VerificationStatus,
    ) -> AppResult<user::Model> {
        let mut active: user::ActiveModel = user.into();
        active.verification_status = Set(status);
        active.updated_at = Set(Some(chrono::Utc::now().into()));
        self.update(active).await
    }

    /// List users, newest first, optionally filtered by role.
    pub async fn list(
        &self,
        role: Option<UserRole>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<user::Model>> {
        let mut query = User::find().order_by_desc(user::Column::CreatedAt);

        if let Some(r) = role {
            query = query.filter(user::Column::Role.eq(r));
        }

        query
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count users grouped by role.
    pub async fn count_by_role(&self) -> AppResult<Vec<(UserRole, u64)>> {
        let rows = User::find()
            .select_only()
            .column(user::Column::Role)
            .column_as(user::Column::Id.count(), "count")
            .group_by(user::Column::Role)
            .into_model::<RoleCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|r| (r.role, u64::try_from(r.count).unwrap_or(0)))
            .collect())
    }
}
