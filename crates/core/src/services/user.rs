//! User service: accounts, authentication and profiles.

use agrex_common::{AppError, AppResult, IdGenerator};
use agrex_db::{
    entities::{
        user::{self, UserRole, VerificationStatus},
        user_profile,
    },
    repositories::{CropPostRepository, UserProfileRepository, UserRepository},
};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::Set;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::services::{ensure_role, verification};

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(())
    } else {
        Err(ValidationError::new("username_charset"))
    }
}

/// Input for creating an account.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupInput {
    #[validate(length(min = 1, max = 32), custom(function = "validate_username"))]
    pub username: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    #[validate(length(max = 64))]
    pub name: Option<String>,

    pub role: UserRole,

    #[validate(length(max = 32))]
    pub phone: Option<String>,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(length(max = 100))]
    pub village: Option<String>,

    #[validate(length(max = 100))]
    pub district: Option<String>,

    #[validate(length(max = 100))]
    pub state: Option<String>,
}

/// Input for editing the caller's profile. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileInput {
    #[validate(length(max = 64))]
    pub name: Option<String>,

    #[validate(length(max = 32))]
    pub phone: Option<String>,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(length(max = 100))]
    pub village: Option<String>,

    #[validate(length(max = 100))]
    pub district: Option<String>,

    #[validate(length(max = 100))]
    pub state: Option<String>,
}

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    profile_repo: UserProfileRepository,
    post_repo: CropPostRepository,
    id_gen: IdGenerator,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(
        user_repo: UserRepository,
        profile_repo: UserProfileRepository,
        post_repo: CropPostRepository,
    ) -> Self {
        Self {
            user_repo,
            profile_repo,
            post_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create an account. The returned user carries its access token.
    pub async fn signup(
        &self,
        input: SignupInput,
    ) -> AppResult<(user::Model, user_profile::Model)> {
        input.validate()?;

        if input.role == UserRole::Admin {
            return Err(AppError::Forbidden(
                "The admin role cannot be self-assigned".to_string(),
            ));
        }

        if self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }

        let password_hash = hash_password(&input.password)?;
        let user_id = self.id_gen.generate();

        let user = self
            .user_repo
            .create(user::ActiveModel {
                id: Set(user_id.clone()),
                username: Set(input.username.clone()),
                username_lower: Set(input.username.to_lowercase()),
                token: Set(Some(self.id_gen.generate_token())),
                name: Set(input.name),
                role: Set(input.role),
                verification_status: Set(VerificationStatus::Unverified),
                created_at: Set(chrono::Utc::now().into()),
                updated_at: Set(None),
            })
            .await?;

        let profile = self
            .profile_repo
            .create(user_profile::ActiveModel {
                user_id: Set(user_id),
                password: Set(password_hash),
                phone: Set(input.phone),
                email: Set(input.email),
                village: Set(input.village),
                district: Set(input.district),
                state: Set(input.state),
                updated_at: Set(None),
            })
            .await?;

        tracing::info!(user_id = %user.id, role = user.role.as_str(), "User signed up");

        Ok((user, profile))
    }

    /// Check credentials and return the user with a usable token.
    pub async fn signin(&self, username: &str, password: &str) -> AppResult<user::Model> {
        let user = self
            .user_repo
            .find_by_username(username)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let profile = self
            .profile_repo
            .find_by_user_id(&user.id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(password, &profile.password)? {
            tracing::debug!(user_id = %user.id, "Password mismatch");
            return Err(AppError::Unauthorized);
        }

        if user.token.is_some() {
            Ok(user)
        } else {
            let token = self.id_gen.generate_token();
            self.user_repo.set_token(user, token).await
        }
    }

    /// Invalidate the current token by replacing it.
    pub async fn signout(&self, user: &user::Model) -> AppResult<()> {
        let token = self.id_gen.generate_token();
        self.user_repo.set_token(user.clone(), token).await?;
        tracing::debug!(user_id = %user.id, "Token rotated on signout");
        Ok(())
    }

    /// Authenticate a user by token.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Get a user's profile.
    pub async fn get_profile(&self, user_id: &str) -> AppResult<user_profile::Model> {
        self.profile_repo.get_by_user_id(user_id).await
    }

    /// Update the caller's display name and contact details.
    pub async fn update_profile(
        &self,
        user: &user::Model,
        input: UpdateProfileInput,
    ) -> AppResult<(user::Model, user_profile::Model)> {
        input.validate()?;

        let user = if let Some(name) = input.name {
            let mut active: user::ActiveModel = user.clone().into();
            active.name = Set(Some(name));
            active.updated_at = Set(Some(chrono::Utc::now().into()));
            self.user_repo.update(active).await?
        } else {
            user.clone()
        };

        let profile = self.profile_repo.get_by_user_id(&user.id).await?;
        let old_phone = profile.phone.clone();
        let mut active: user_profile::ActiveModel = profile.into();
        if let Some(phone) = input.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(email) = input.email {
            active.email = Set(Some(email));
        }
        if let Some(village) = input.village {
            active.village = Set(Some(village));
        }
        if let Some(district) = input.district {
            active.district = Set(Some(district));
        }
        if let Some(state) = input.state {
            active.state = Set(Some(state));
        }
        active.updated_at = Set(Some(chrono::Utc::now().into()));

        let profile = self.profile_repo.update(active).await?;

        // The farmer's phone counts towards every post's verification score.
        if user.role == UserRole::Farmer && profile.phone != old_phone {
            self.rescore_posts(&user.id, profile.phone.as_deref()).await?;
        }

        Ok((user, profile))
    }

    async fn rescore_posts(&self, farmer_id: &str, farmer_phone: Option<&str>) -> AppResult<()> {
        let mut rescored = 0_usize;
        for post in self.post_repo.find_all_by_farmer(farmer_id).await? {
            let score = verification::score_post(&post, farmer_phone).total();
            if score != post.verification_score {
                self.post_repo.set_score(&post.id, score).await?;
                rescored += 1;
            }
        }
        tracing::debug!(farmer_id = %farmer_id, rescored, "Verification scores refreshed");
        Ok(())
    }

    /// List accounts (admin).
    pub async fn list_users(
        &self,
        admin: &user::Model,
        role: Option<UserRole>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<user::Model>> {
        ensure_role(admin, UserRole::Admin)?;
        self.user_repo.list(role, limit, offset).await
    }

    /// Mark an account as verified or not (admin).
    pub async fn set_verification(
        &self,
        admin: &user::Model,
        user_id: &str,
        verified: bool,
    ) -> AppResult<user::Model> {
        ensure_role(admin, UserRole::Admin)?;

        let target = self.user_repo.get_by_id(user_id).await?;
        let status = if verified {
            VerificationStatus::Verified
        } else {
            VerificationStatus::Unverified
        };
        if target.verification_status == status {
            return Ok(target);
        }

        let updated = self.user_repo.set_verification(target, status).await?;
        tracing::info!(user_id = %user_id, admin_id = %admin.id, verified, "Verification changed");
        Ok(updated)
    }

    /// Change an account's role (admin). Admins cannot demote themselves.
    pub async fn set_role(
        &self,
        admin: &user::Model,
        user_id: &str,
        role: UserRole,
    ) -> AppResult<user::Model> {
        ensure_role(admin, UserRole::Admin)?;

        if admin.id == user_id && role != UserRole::Admin {
            return Err(AppError::BadRequest(
                "Admins cannot demote themselves".to_string(),
            ));
        }

        let target = self.user_repo.get_by_id(user_id).await?;
        if target.role == role {
            return Ok(target);
        }

        let updated = self.user_repo.set_role(target, role).await?;
        tracing::info!(user_id = %user_id, admin_id = %admin.id, role = role.as_str(), "Role changed");
        Ok(updated)
    }

    /// Promote an existing account to admin at startup.
    ///
    /// Returns `None` when no such account exists yet.
    pub async fn bootstrap_admin(&self, username: &str) -> AppResult<Option<user::Model>> {
        let Some(user) = self.user_repo.find_by_username(username).await? else {
            tracing::warn!(username = %username, "Bootstrap admin account not found");
            return Ok(None);
        };

        if user.is_admin() {
            return Ok(Some(user));
        }

        let promoted = self.user_repo.set_role(user, UserRole::Admin).await?;
        tracing::info!(user_id = %promoted.id, "Bootstrap account promoted to admin");
        Ok(Some(promoted))
    }
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::fixtures;
    use agrex_db::entities::crop_post::ReviewStatus;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult, Value};
    use std::sync::Arc;

    fn empty_db() -> Arc<DatabaseConnection> {
        Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection())
    }

    fn signup_input(role: UserRole) -> SignupInput {
        SignupInput {
            username: "ramesh_k".to_string(),
            password: "harvest-2024".to_string(),
            name: Some("Ramesh".to_string()),
            role,
            phone: Some("9876543210".to_string()),
            email: None,
            village: None,
            district: None,
            state: None,
        }
    }

    fn profile(user_id: &str, password: &str) -> user_profile::Model {
        user_profile::Model {
            user_id: user_id.to_string(),
            password: hash_password(password).unwrap(),
            phone: None,
            email: None,
            village: None,
            district: None,
            state: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("anything", "not-a-hash").is_err());
    }

    #[test]
    fn test_signup_input_validation() {
        let mut input = signup_input(UserRole::Farmer);
        input.username = "bad name!".to_string();
        assert!(input.validate().is_err());

        let mut input = signup_input(UserRole::Farmer);
        input.password = "short".to_string();
        assert!(input.validate().is_err());

        let mut input = signup_input(UserRole::Farmer);
        input.email = Some("not-an-email".to_string());
        assert!(input.validate().is_err());

        assert!(signup_input(UserRole::Buyer).validate().is_ok());
    }

    #[tokio::test]
    async fn test_signup_as_admin_is_forbidden() {
        let service = UserService::new(
            UserRepository::new(empty_db()),
            UserProfileRepository::new(empty_db()),
            CropPostRepository::new(empty_db()),
        );

        let result = service.signup(signup_input(UserRole::Admin)).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_signup_duplicate_username() {
        let existing = fixtures::user("ramesh_k", UserRole::Farmer);
        let user_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .into_connection(),
        );

        let service = UserService::new(
            UserRepository::new(user_db),
            UserProfileRepository::new(empty_db()),
            CropPostRepository::new(empty_db()),
        );

        let result = service.signup(signup_input(UserRole::Farmer)).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_signin_wrong_password() {
        let user = fixtures::user("farmer1", UserRole::Farmer);
        let user_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user]])
                .into_connection(),
        );
        let profile_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[profile("farmer1", "right-password")]])
                .into_connection(),
        );

        let service = UserService::new(
            UserRepository::new(user_db),
            UserProfileRepository::new(profile_db),
            CropPostRepository::new(empty_db()),
        );

        let result = service.signin("farmer1", "wrong-password").await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_signin_returns_token() {
        let user = fixtures::user("farmer1", UserRole::Farmer);
        let user_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user]])
                .into_connection(),
        );
        let profile_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[profile("farmer1", "right-password")]])
                .into_connection(),
        );

        let service = UserService::new(
            UserRepository::new(user_db),
            UserProfileRepository::new(profile_db),
            CropPostRepository::new(empty_db()),
        );

        let signed_in = service.signin("FARMER1", "right-password").await.unwrap();
        assert_eq!(signed_in.token.as_deref(), Some("token-farmer1"));
    }

    #[tokio::test]
    async fn test_authenticate_by_token_not_found() {
        let user_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );

        let service = UserService::new(
            UserRepository::new(user_db),
            UserProfileRepository::new(empty_db()),
            CropPostRepository::new(empty_db()),
        );

        let result = service.authenticate_by_token("invalid").await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_admin_cannot_demote_self() {
        let admin = fixtures::user("admin1", UserRole::Admin);
        let service = UserService::new(
            UserRepository::new(empty_db()),
            UserProfileRepository::new(empty_db()),
            CropPostRepository::new(empty_db()),
        );

        let result = service.set_role(&admin, "admin1", UserRole::Buyer).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_set_verification() {
        let admin = fixtures::user("admin1", UserRole::Admin);
        let farmer = fixtures::user("farmer1", UserRole::Farmer);
        let mut verified = farmer.clone();
        verified.verification_status = VerificationStatus::Verified;

        let user_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[farmer], [verified]])
                .into_connection(),
        );

        let service = UserService::new(
            UserRepository::new(user_db),
            UserProfileRepository::new(empty_db()),
            CropPostRepository::new(empty_db()),
        );

        let result = service
            .set_verification(&admin, "farmer1", true)
            .await
            .unwrap();
        assert_eq!(result.verification_status, VerificationStatus::Verified);
    }

    #[tokio::test]
    async fn test_phone_change_rescores_farmer_posts() {
        let farmer = fixtures::user("farmer1", UserRole::Farmer);
        let before = profile("farmer1", "right-password");
        let mut after = before.clone();
        after.phone = Some("9876543210".to_string());

        let stale = fixtures::post("post1", "farmer1", ReviewStatus::Approved);
        let mut current = fixtures::post("post2", "farmer1", ReviewStatus::Pending);
        current.verification_score = verification::FARMER_PHONE_POINTS;

        let profile_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[before], [after]])
                .into_connection(),
        );
        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[stale, current]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let service = UserService::new(
            UserRepository::new(empty_db()),
            UserProfileRepository::new(profile_db),
            CropPostRepository::new(Arc::clone(&post_db)),
        );
        let input = UpdateProfileInput {
            phone: Some("9876543210".to_string()),
            ..Default::default()
        };
        let (_, updated) = service.update_profile(&farmer, input).await.unwrap();
        assert_eq!(updated.phone.as_deref(), Some("9876543210"));
        drop(service);

        let log = Arc::try_unwrap(post_db).ok().unwrap().into_transaction_log();
        let updates: Vec<_> = log
            .iter()
            .flat_map(|txn| txn.statements())
            .filter(|stmt| stmt.sql.starts_with("UPDATE"))
            .collect();
        assert_eq!(updates.len(), 1);
        let values = &updates[0].values.as_ref().unwrap().0;
        assert!(values.contains(&Value::Int(Some(verification::FARMER_PHONE_POINTS))));
        assert!(values.contains(&Value::from("post1")));
    }

    #[tokio::test]
    async fn test_profile_update_without_phone_change_leaves_posts() {
        let farmer = fixtures::user("farmer1", UserRole::Farmer);
        let before = profile("farmer1", "right-password");
        let mut after = before.clone();
        after.email = Some("ramesh@example.com".to_string());

        let profile_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[before], [after]])
                .into_connection(),
        );

        // Any post query would fail against the empty mock.
        let service = UserService::new(
            UserRepository::new(empty_db()),
            UserProfileRepository::new(profile_db),
            CropPostRepository::new(empty_db()),
        );
        let input = UpdateProfileInput {
            email: Some("ramesh@example.com".to_string()),
            ..Default::default()
        };

        assert!(service.update_profile(&farmer, input).await.is_ok());
    }

    #[tokio::test]
    async fn test_bootstrap_admin_missing_account() {
        let user_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );

        let service = UserService::new(
            UserRepository::new(user_db),
            UserProfileRepository::new(empty_db()),
            CropPostRepository::new(empty_db()),
        );

        assert!(service.bootstrap_admin("root").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bootstrap_admin_promotes() {
        let farmer = fixtures::user("root", UserRole::Farmer);
        let mut promoted = farmer.clone();
        promoted.role = UserRole::Admin;

        let user_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[farmer], [promoted]])
                .into_connection(),
        );

        let service = UserService::new(
            UserRepository::new(user_db),
            UserProfileRepository::new(empty_db()),
            CropPostRepository::new(empty_db()),
        );

        let user = service.bootstrap_admin("root").await.unwrap().unwrap();
        assert!(user.is_admin());
    }
}
