//! Crop post service.

use crate::services::{ensure_role, verification};
use agrex_common::{AppError, AppResult, IdGenerator};
use agrex_db::{
    entities::{
        crop_post::{self, ReviewStatus},
        user::{self, UserRole},
    },
    repositories::{
        CropPostRepository, DealRepository, MarketFilter, MarketSort, UserProfileRepository,
    },
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

/// Statuses in which the owner may still edit a post.
const EDITABLE: [ReviewStatus; 2] = [ReviewStatus::Pending, ReviewStatus::Rejected];

/// Input for listing a crop lot.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostInput {
    #[validate(length(min = 1, max = 100))]
    pub crop_name: String,

    #[validate(length(max = 100))]
    pub variety: Option<String>,

    #[validate(range(exclusive_min = 0.0))]
    pub quantity: f64,

    #[validate(length(min = 1, max = 16))]
    pub unit: Option<String>,

    #[validate(range(exclusive_min = 0.0))]
    pub price_per_unit: f64,

    #[validate(length(max = 5000))]
    pub description: Option<String>,

    #[validate(length(max = 32))]
    pub contact_phone: Option<String>,

    #[validate(length(max = 100))]
    pub village: Option<String>,

    #[validate(length(max = 100))]
    pub district: Option<String>,

    #[validate(length(max = 100))]
    pub state: Option<String>,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,

    #[serde(default)]
    #[validate(length(max = 10))]
    pub image_urls: Vec<String>,
}

/// Input for editing a post. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostInput {
    #[validate(length(min = 1, max = 100))]
    pub crop_name: Option<String>,

    #[validate(length(max = 100))]
    pub variety: Option<String>,

    #[validate(range(exclusive_min = 0.0))]
    pub quantity: Option<f64>,

    #[validate(length(min = 1, max = 16))]
    pub unit: Option<String>,

    #[validate(range(exclusive_min = 0.0))]
    pub price_per_unit: Option<f64>,

    #[validate(length(max = 5000))]
    pub description: Option<String>,

    #[validate(length(max = 32))]
    pub contact_phone: Option<String>,

    #[validate(length(max = 100))]
    pub village: Option<String>,

    #[validate(length(max = 100))]
    pub district: Option<String>,

    #[validate(length(max = 100))]
    pub state: Option<String>,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,

    #[validate(length(max = 10))]
    pub image_urls: Option<Vec<String>>,
}

/// Crop post service for business logic.
#[derive(Clone)]
pub struct CropPostService {
    post_repo: CropPostRepository,
    deal_repo: DealRepository,
    profile_repo: UserProfileRepository,
    id_gen: IdGenerator,
}

impl CropPostService {
    /// Create a new crop post service.
    #[must_use]
    pub const fn new(
        post_repo: CropPostRepository,
        deal_repo: DealRepository,
        profile_repo: UserProfileRepository,
    ) -> Self {
        Self {
            post_repo,
            deal_repo,
            profile_repo,
            id_gen: IdGenerator::new(),
        }
    }

    async fn farmer_phone(&self, farmer_id: &str) -> AppResult<Option<String>> {
        Ok(self
            .profile_repo
            .find_by_user_id(farmer_id)
            .await?
            .and_then(|p| p.phone))
    }

    /// List a new crop lot. The post starts out pending review.
    pub async fn create(
        &self,
        farmer: &user::Model,
        input: CreatePostInput,
    ) -> AppResult<crop_post::Model> {
        ensure_role(farmer, UserRole::Farmer)?;
        input.validate()?;

        let crop_name = input.crop_name.trim().to_string();
        if crop_name.is_empty() {
            return Err(AppError::Validation("crop name is blank".to_string()));
        }

        let farmer_phone = self.farmer_phone(&farmer.id).await?;
        let breakdown = verification::compute(&verification::PostSignals {
            image_urls: &input.image_urls,
            latitude: input.latitude,
            longitude: input.longitude,
            village: input.village.as_deref(),
            district: input.district.as_deref(),
            state: input.state.as_deref(),
            contact_phone: input.contact_phone.as_deref(),
            farmer_phone: farmer_phone.as_deref(),
            description: input.description.as_deref(),
        });

        let model = crop_post::ActiveModel {
            id: Set(self.id_gen.generate()),
            farmer_id: Set(farmer.id.clone()),
            crop_name: Set(crop_name),
            variety: Set(input.variety),
            quantity: Set(input.quantity),
            unit: Set(input.unit.unwrap_or_else(|| "kg".to_string())),
            price_per_unit: Set(input.price_per_unit),
            description: Set(input.description),
            contact_phone: Set(input.contact_phone),
            village: Set(input.village),
            district: Set(input.district),
            state: Set(input.state),
            latitude: Set(input.latitude),
            longitude: Set(input.longitude),
            image_urls: Set(serde_json::json!(input.image_urls)),
            verification_score: Set(breakdown.total()),
            status: Set(ReviewStatus::Pending),
            admin_notes: Set(None),
            reviewed_by: Set(None),
            reviewed_at: Set(None),
            created_at: Set(chrono::Utc::now().into()),
            updated_at: Set(None),
        };

        let post = self.post_repo.create(model).await?;

        tracing::info!(
            post_id = %post.id,
            farmer_id = %farmer.id,
            score = post.verification_score,
            "Crop post created"
        );

        Ok(post)
    }

    /// Edit a post while it is pending or rejected. The status is unchanged.
    pub async fn update(
        &self,
        farmer: &user::Model,
        post_id: &str,
        input: UpdatePostInput,
    ) -> AppResult<crop_post::Model> {
        ensure_role(farmer, UserRole::Farmer)?;
        input.validate()?;

        let post = self.owned_post(farmer, post_id).await?;
        if !EDITABLE.contains(&post.status) {
            return Err(AppError::Conflict(format!(
                "{} posts cannot be edited",
                post.status.as_str()
            )));
        }

        let mut merged = post.clone();
        if let Some(name) = input.crop_name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::Validation("crop name is blank".to_string()));
            }
            merged.crop_name = name;
        }
        if let Some(v) = input.variety {
            merged.variety = Some(v);
        }
        if let Some(q) = input.quantity {
            merged.quantity = q;
        }
        if let Some(u) = input.unit {
            merged.unit = u;
        }
        if let Some(p) = input.price_per_unit {
            merged.price_per_unit = p;
        }
        if let Some(d) = input.description {
            merged.description = Some(d);
        }
        if let Some(c) = input.contact_phone {
            merged.contact_phone = Some(c);
        }
        if let Some(v) = input.village {
            merged.village = Some(v);
        }
        if let Some(d) = input.district {
            merged.district = Some(d);
        }
        if let Some(s) = input.state {
            merged.state = Some(s);
        }
        if let Some(lat) = input.latitude {
            merged.latitude = Some(lat);
        }
        if let Some(lng) = input.longitude {
            merged.longitude = Some(lng);
        }
        if let Some(urls) = input.image_urls {
            merged.image_urls = serde_json::json!(urls);
        }

        let farmer_phone = self.farmer_phone(&farmer.id).await?;
        let score = verification::score_post(&merged, farmer_phone.as_deref()).total();

        let mut active: crop_post::ActiveModel = post.into();
        active.crop_name = Set(merged.crop_name);
        active.variety = Set(merged.variety);
        active.quantity = Set(merged.quantity);
        active.unit = Set(merged.unit);
        active.price_per_unit = Set(merged.price_per_unit);
        active.description = Set(merged.description);
        active.contact_phone = Set(merged.contact_phone);
        active.village = Set(merged.village);
        active.district = Set(merged.district);
        active.state = Set(merged.state);
        active.latitude = Set(merged.latitude);
        active.longitude = Set(merged.longitude);
        active.image_urls = Set(merged.image_urls);
        active.verification_score = Set(score);
        active.updated_at = Set(Some(chrono::Utc::now().into()));

        match self.post_repo.update_if_status(active, &EDITABLE).await? {
            Some(updated) => {
                tracing::info!(post_id = %post_id, score = score, "Crop post updated");
                Ok(updated)
            }
            None => Err(AppError::Conflict(format!(
                "post {post_id} was reviewed while being edited"
            ))),
        }
    }

    /// Delete a post nobody has made an offer on.
    ///
    /// Posts with deals are kept so that deal history and the totals
    /// derived from it survive.
    pub async fn delete(&self, farmer: &user::Model, post_id: &str) -> AppResult<()> {
        ensure_role(farmer, UserRole::Farmer)?;
        self.owned_post(farmer, post_id).await?;

        if self.deal_repo.count_for_post(post_id).await? > 0 {
            let open = self.deal_repo.count_open_for_post(post_id).await?;
            return Err(AppError::Conflict(if open > 0 {
                format!("post {post_id} has {open} open deal(s)")
            } else {
                format!("post {post_id} has closed deals and is kept as their record")
            }));
        }

        self.post_repo.delete(post_id).await?;
        tracing::info!(post_id = %post_id, farmer_id = %farmer.id, "Crop post deleted");
        Ok(())
    }

    /// The farmer's own posts.
    pub async fn list_mine(
        &self,
        farmer: &user::Model,
        status: Option<ReviewStatus>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<crop_post::Model>> {
        ensure_role(farmer, UserRole::Farmer)?;
        self.post_repo.find_by_farmer(&farmer.id, status, limit, offset).await
    }

    /// Marketplace search over approved posts.
    pub async fn browse(
        &self,
        filter: &MarketFilter,
        sort: MarketSort,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<crop_post::Model>> {
        if let (Some(min), Some(max)) = (filter.min_price, filter.max_price) {
            if min > max {
                return Err(AppError::Validation(
                    "minPrice must not exceed maxPrice".to_string(),
                ));
            }
        }
        self.post_repo.search_approved(filter, sort, limit, offset).await
    }

    /// A single post. Unapproved posts are visible only to their owner and admins.
    pub async fn show_public(
        &self,
        viewer: &user::Model,
        post_id: &str,
    ) -> AppResult<crop_post::Model> {
        let post = self.post_repo.get_by_id(post_id).await?;

        if post.status == ReviewStatus::Approved || post.farmer_id == viewer.id || viewer.is_admin()
        {
            Ok(post)
        } else {
            Err(AppError::PostNotFound(post_id.to_string()))
        }
    }

    async fn owned_post(&self, farmer: &user::Model, post_id: &str) -> AppResult<crop_post::Model> {
        let post = self.post_repo.get_by_id(post_id).await?;
        if post.farmer_id != farmer.id {
            return Err(AppError::Forbidden(
                "You can only manage your own posts".to_string(),
            ));
        }
        Ok(post)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::fixtures;
    use agrex_db::entities::user_profile;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn empty_db() -> Arc<DatabaseConnection> {
        Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection())
    }

    fn no_profile_db() -> Arc<DatabaseConnection> {
        Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user_profile::Model>::new()])
                .into_connection(),
        )
    }

    fn create_input() -> CreatePostInput {
        CreatePostInput {
            crop_name: "Wheat".to_string(),
            variety: None,
            quantity: 1000.0,
            unit: None,
            price_per_unit: 25.0,
            description: None,
            contact_phone: None,
            village: None,
            district: None,
            state: None,
            latitude: None,
            longitude: None,
            image_urls: vec![],
        }
    }

    #[test]
    fn test_create_input_validation() {
        let mut input = create_input();
        input.quantity = 0.0;
        assert!(input.validate().is_err());

        let mut input = create_input();
        input.latitude = Some(91.0);
        assert!(input.validate().is_err());

        let mut input = create_input();
        input.image_urls = (0..11).map(|i| format!("https://img/{i}")).collect();
        assert!(input.validate().is_err());

        let mut input = create_input();
        input.crop_name = "a".repeat(101);
        assert!(input.validate().is_err());

        assert!(create_input().validate().is_ok());
    }

    #[tokio::test]
    async fn test_create_requires_farmer() {
        let buyer = fixtures::user("buyer1", UserRole::Buyer);
        let service = CropPostService::new(
            CropPostRepository::new(empty_db()),
            DealRepository::new(empty_db()),
            UserProfileRepository::new(empty_db()),
        );

        let result = service.create(&buyer, create_input()).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_create_starts_pending() {
        let farmer = fixtures::user("farmer1", UserRole::Farmer);
        let stored = fixtures::post("post1", "farmer1", ReviewStatus::Pending);

        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[stored]])
                .into_connection(),
        );

        let service = CropPostService::new(
            CropPostRepository::new(post_db),
            DealRepository::new(empty_db()),
            UserProfileRepository::new(no_profile_db()),
        );

        let post = service.create(&farmer, create_input()).await.unwrap();
        assert_eq!(post.status, ReviewStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_approved_post_is_conflict() {
        let farmer = fixtures::user("farmer1", UserRole::Farmer);
        let approved = fixtures::post("post1", "farmer1", ReviewStatus::Approved);

        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[approved]])
                .into_connection(),
        );

        let service = CropPostService::new(
            CropPostRepository::new(post_db),
            DealRepository::new(empty_db()),
            UserProfileRepository::new(empty_db()),
        );

        let result = service
            .update(&farmer, "post1", UpdatePostInput::default())
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_rejected_post_keeps_status() {
        let farmer = fixtures::user("farmer1", UserRole::Farmer);
        let rejected = fixtures::post("post1", "farmer1", ReviewStatus::Rejected);
        let mut edited = rejected.clone();
        edited.contact_phone = Some("9876543210".to_string());
        edited.verification_score = 15;

        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[rejected], [edited]])
                .into_connection(),
        );

        let service = CropPostService::new(
            CropPostRepository::new(post_db),
            DealRepository::new(empty_db()),
            UserProfileRepository::new(no_profile_db()),
        );

        let input = UpdatePostInput {
            contact_phone: Some("9876543210".to_string()),
            ..Default::default()
        };
        let post = service.update(&farmer, "post1", input).await.unwrap();

        assert_eq!(post.status, ReviewStatus::Rejected);
        assert_eq!(post.verification_score, 15);
    }

    #[tokio::test]
    async fn test_update_other_farmers_post_is_forbidden() {
        let farmer = fixtures::user("farmer2", UserRole::Farmer);
        let post = fixtures::post("post1", "farmer1", ReviewStatus::Pending);

        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[post]])
                .into_connection(),
        );

        let service = CropPostService::new(
            CropPostRepository::new(post_db),
            DealRepository::new(empty_db()),
            UserProfileRepository::new(empty_db()),
        );

        let result = service
            .update(&farmer, "post1", UpdatePostInput::default())
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_delete_with_open_deal_is_conflict() {
        let farmer = fixtures::user("farmer1", UserRole::Farmer);
        let post = fixtures::post("post1", "farmer1", ReviewStatus::Approved);

        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[post]])
                .into_connection(),
        );
        let deal_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([
                    [maplit::btreemap! { "num_items" => sea_orm::Value::BigInt(Some(2)) }],
                    [maplit::btreemap! { "num_items" => sea_orm::Value::BigInt(Some(1)) }],
                ])
                .into_connection(),
        );

        let service = CropPostService::new(
            CropPostRepository::new(post_db),
            DealRepository::new(deal_db),
            UserProfileRepository::new(empty_db()),
        );

        let result = service.delete(&farmer, "post1").await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_delete_with_closed_deals_keeps_post() {
        let farmer = fixtures::user("farmer1", UserRole::Farmer);
        let post = fixtures::post("post1", "farmer1", ReviewStatus::Approved);

        // No exec results: a delete statement would fail as a database error.
        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[post]])
                .into_connection(),
        );
        let deal_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([
                    [maplit::btreemap! { "num_items" => sea_orm::Value::BigInt(Some(1)) }],
                    [maplit::btreemap! { "num_items" => sea_orm::Value::BigInt(Some(0)) }],
                ])
                .into_connection(),
        );

        let service = CropPostService::new(
            CropPostRepository::new(post_db),
            DealRepository::new(deal_db),
            UserProfileRepository::new(empty_db()),
        );

        let result = service.delete(&farmer, "post1").await;
        assert!(matches!(result, Err(AppError::Conflict(msg)) if msg.contains("closed deals")));
    }

    #[tokio::test]
    async fn test_delete_without_deals() {
        let farmer = fixtures::user("farmer1", UserRole::Farmer);
        let post = fixtures::post("post1", "farmer1", ReviewStatus::Rejected);

        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[post]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );
        let deal_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(0))
                }]])
                .into_connection(),
        );

        let service = CropPostService::new(
            CropPostRepository::new(post_db),
            DealRepository::new(deal_db),
            UserProfileRepository::new(empty_db()),
        );

        assert!(service.delete(&farmer, "post1").await.is_ok());
    }

    #[tokio::test]
    async fn test_show_pending_post_hidden_from_buyer() {
        let buyer = fixtures::user("buyer1", UserRole::Buyer);
        let pending = fixtures::post("post1", "farmer1", ReviewStatus::Pending);

        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[pending]])
                .into_connection(),
        );

        let service = CropPostService::new(
            CropPostRepository::new(post_db),
            DealRepository::new(empty_db()),
            UserProfileRepository::new(empty_db()),
        );

        let result = service.show_public(&buyer, "post1").await;
        assert!(matches!(result, Err(AppError::PostNotFound(_))));
    }

    #[tokio::test]
    async fn test_show_pending_post_visible_to_owner() {
        let farmer = fixtures::user("farmer1", UserRole::Farmer);
        let pending = fixtures::post("post1", "farmer1", ReviewStatus::Pending);

        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[pending]])
                .into_connection(),
        );

        let service = CropPostService::new(
            CropPostRepository::new(post_db),
            DealRepository::new(empty_db()),
            UserProfileRepository::new(empty_db()),
        );

        assert!(service.show_public(&farmer, "post1").await.is_ok());
    }

    #[tokio::test]
    async fn test_browse_rejects_inverted_price_range() {
        let service = CropPostService::new(
            CropPostRepository::new(empty_db()),
            DealRepository::new(empty_db()),
            UserProfileRepository::new(empty_db()),
        );

        let filter = MarketFilter {
            min_price: Some(50.0),
            max_price: Some(10.0),
            ..Default::default()
        };
        let result = service.browse(&filter, MarketSort::Newest, 20, 0).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
