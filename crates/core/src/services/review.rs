//! Admin review workflow for crop posts.
//!
//! A post starts `pending` and an admin moves it to `approved` or
//! `rejected`. Rejected posts can be re-evaluated back to `approved` or to
//! `pending`. Every write is conditional on the status the decision was
//! based on, so two admins acting at once cannot both win.

use crate::services::{
    ensure_role,
    notification::NotificationService,
    verification::{self, ScoreBreakdown},
};
use agrex_common::{AppError, AppResult};
use agrex_db::{
    entities::{
        crop_post::{self, ReviewStatus},
        notification::NotificationType,
        user::{self, UserRole},
    },
    repositories::{CropPostRepository, ReviewUpdate, UserProfileRepository},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Where a re-evaluation sends a rejected post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReevaluateTarget {
    Approved,
    Pending,
}

/// An admin decision on a crop post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Approve,
    Reject,
    Reevaluate(ReevaluateTarget),
}

impl ReviewAction {
    /// Status the post ends up in.
    #[must_use]
    pub const fn target(self) -> ReviewStatus {
        match self {
            Self::Approve | Self::Reevaluate(ReevaluateTarget::Approved) => ReviewStatus::Approved,
            Self::Reject => ReviewStatus::Rejected,
            Self::Reevaluate(ReevaluateTarget::Pending) => ReviewStatus::Pending,
        }
    }

    /// Status the action may start from.
    #[must_use]
    pub const fn source(self) -> ReviewStatus {
        match self {
            Self::Approve | Self::Reject => ReviewStatus::Pending,
            Self::Reevaluate(_) => ReviewStatus::Rejected,
        }
    }

    const fn notification_type(self) -> NotificationType {
        match self {
            Self::Approve => NotificationType::PostApproved,
            Self::Reject => NotificationType::PostRejected,
            Self::Reevaluate(_) => NotificationType::PostReevaluated,
        }
    }

    const fn verb(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Reevaluate(_) => "re-evaluate",
        }
    }
}

/// What applying an action to a post in `current` status means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewPlan {
    /// The post already has the target status.
    Unchanged,
    /// Move `from` → `to`.
    Transition {
        from: ReviewStatus,
        to: ReviewStatus,
    },
}

/// Decide what an action does to a post in `current` status.
pub fn plan(action: ReviewAction, current: ReviewStatus) -> AppResult<ReviewPlan> {
    let target = action.target();

    if current == target {
        return Ok(ReviewPlan::Unchanged);
    }
    if current != action.source() {
        return Err(AppError::Conflict(format!(
            "cannot {} a {} post",
            action.verb(),
            current.as_str()
        )));
    }

    Ok(ReviewPlan::Transition {
        from: current,
        to: target,
    })
}

/// A post as seen by a reviewer.
#[derive(Debug, Clone)]
pub struct PostReview {
    pub post: crop_post::Model,
    pub breakdown: ScoreBreakdown,
}

/// Admin review service.
#[derive(Clone)]
pub struct ReviewService {
    post_repo: CropPostRepository,
    profile_repo: UserProfileRepository,
    notification_service: NotificationService,
}

impl ReviewService {
    /// Create a new review service.
    #[must_use]
    pub const fn new(
        post_repo: CropPostRepository,
        profile_repo: UserProfileRepository,
        notification_service: NotificationService,
    ) -> Self {
        Self {
            post_repo,
            profile_repo,
            notification_service,
        }
    }

    /// Review queue, newest first.
    pub async fn list_posts(
        &self,
        admin: &user::Model,
        status: Option<ReviewStatus>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<crop_post::Model>> {
        ensure_role(admin, UserRole::Admin)?;
        self.post_repo.find_by_status(status, limit, offset).await
    }

    /// Get a post by ID.
    pub async fn get_post(&self, post_id: &str) -> AppResult<crop_post::Model> {
        self.post_repo.get_by_id(post_id).await
    }

    /// A post with its verification breakdown recomputed from current data.
    pub async fn show(&self, admin: &user::Model, post_id: &str) -> AppResult<PostReview> {
        ensure_role(admin, UserRole::Admin)?;

        let post = self.get_post(post_id).await?;
        let profile = self.profile_repo.find_by_user_id(&post.farmer_id).await?;
        let farmer_phone = profile.as_ref().and_then(|p| p.phone.as_deref());
        let breakdown = verification::score_post(&post, farmer_phone);

        Ok(PostReview { post, breakdown })
    }

    /// Approve a pending post.
    pub async fn approve(
        &self,
        admin: &user::Model,
        post_id: &str,
        notes: Option<String>,
    ) -> AppResult<crop_post::Model> {
        self.apply(admin, post_id, ReviewAction::Approve, notes).await
    }

    /// Reject a pending post.
    pub async fn reject(
        &self,
        admin: &user::Model,
        post_id: &str,
        notes: Option<String>,
    ) -> AppResult<crop_post::Model> {
        self.apply(admin, post_id, ReviewAction::Reject, notes).await
    }

    /// Move a rejected post to approved, or back into the queue.
    pub async fn reevaluate(
        &self,
        admin: &user::Model,
        post_id: &str,
        target: ReevaluateTarget,
        notes: Option<String>,
    ) -> AppResult<crop_post::Model> {
        self.apply(admin, post_id, ReviewAction::Reevaluate(target), notes).await
    }

    /// Queue sizes per review status (admin).
    pub async fn count_by_status(
        &self,
        admin: &user::Model,
    ) -> AppResult<Vec<(ReviewStatus, u64)>> {
        ensure_role(admin, UserRole::Admin)?;
        self.post_repo.count_by_status(None).await
    }

    async fn apply(
        &self,
        admin: &user::Model,
        post_id: &str,
        action: ReviewAction,
        notes: Option<String>,
    ) -> AppResult<crop_post::Model> {
        ensure_role(admin, UserRole::Admin)?;

        let post = self.post_repo.get_by_id(post_id).await?;

        let (from, to) = match plan(action, post.status)? {
            ReviewPlan::Unchanged => {
                debug!(post_id = %post_id, status = post.status.as_str(), "Review is a no-op");
                return Ok(post);
            }
            ReviewPlan::Transition { from, to } => (from, to),
        };

        let notes = notes.filter(|n| !n.trim().is_empty());
        let update = if to == ReviewStatus::Pending {
            ReviewUpdate::cleared(to)
        } else {
            ReviewUpdate::reviewed(to, &admin.id, notes.clone(), chrono::Utc::now().into())
        };

        let rows = self.post_repo.transition_status(post_id, from, update).await?;
        if rows == 0 {
            // Someone else moved the post after we read it.
            let current = self.post_repo.get_by_id(post_id).await?;
            if current.status == to {
                debug!(post_id = %post_id, "Concurrent review reached the same status");
                return Ok(current);
            }
            return Err(AppError::Conflict(format!(
                "post {post_id} is now {}",
                current.status.as_str()
            )));
        }

        let updated = self.post_repo.get_by_id(post_id).await?;

        info!(
            post_id = %post_id,
            admin_id = %admin.id,
            from = from.as_str(),
            to = to.as_str(),
            "Crop post reviewed"
        );

        let (title, mut message) = match action {
            ReviewAction::Approve => (
                "Crop post approved",
                format!("Your {} listing is now visible to buyers.", updated.crop_name),
            ),
            ReviewAction::Reject => (
                "Crop post rejected",
                format!("Your {} listing was not approved.", updated.crop_name),
            ),
            ReviewAction::Reevaluate(_) => (
                "Crop post re-evaluated",
                format!(
                    "Your {} listing was re-evaluated and is now {}.",
                    updated.crop_name,
                    to.as_str()
                ),
            ),
        };
        if let Some(n) = notes.as_deref() {
            message.push_str(" Note: ");
            message.push_str(n);
        }

        self.notification_service
            .notify_best_effort(
                &updated.farmer_id,
                action.notification_type(),
                title,
                &message,
                Some(&updated.id),
                None,
            )
            .await;

        Ok(updated)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::fixtures;
    use agrex_db::repositories::NotificationRepository;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult, Value};
    use std::sync::Arc;

    fn exec(rows: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: rows,
        }
    }

    fn empty_db() -> Arc<DatabaseConnection> {
        Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection())
    }

    fn notification_db() -> Arc<DatabaseConnection> {
        Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[fixtures::notification(
                    "farmer1",
                    NotificationType::PostApproved,
                )]])
                .into_connection(),
        )
    }

    fn service(
        post_db: Arc<DatabaseConnection>,
        notification_db: Arc<DatabaseConnection>,
    ) -> ReviewService {
        ReviewService::new(
            CropPostRepository::new(post_db),
            UserProfileRepository::new(empty_db()),
            NotificationService::new(NotificationRepository::new(notification_db)),
        )
    }

    fn admin() -> user::Model {
        fixtures::user("admin1", UserRole::Admin)
    }

    /// Values bound to the status `UPDATE` issued against `db`.
    fn update_values(db: Arc<DatabaseConnection>) -> Vec<Value> {
        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        log.iter()
            .flat_map(|txn| txn.statements())
            .find(|stmt| stmt.sql.starts_with("UPDATE"))
            .and_then(|stmt| stmt.values.clone())
            .unwrap()
            .0
    }

    fn null_strings(values: &[Value]) -> usize {
        values
            .iter()
            .filter(|v| matches!(v, Value::String(None)))
            .count()
    }

    #[test]
    fn test_plan_table() {
        use ReviewStatus::{Approved, Pending, Rejected};

        assert_eq!(
            plan(ReviewAction::Approve, Pending).unwrap(),
            ReviewPlan::Transition {
                from: Pending,
                to: Approved
            }
        );
        assert_eq!(
            plan(ReviewAction::Reject, Pending).unwrap(),
            ReviewPlan::Transition {
                from: Pending,
                to: Rejected
            }
        );
        assert_eq!(
            plan(ReviewAction::Reevaluate(ReevaluateTarget::Pending), Rejected).unwrap(),
            ReviewPlan::Transition {
                from: Rejected,
                to: Pending
            }
        );
        assert_eq!(
            plan(ReviewAction::Approve, Approved).unwrap(),
            ReviewPlan::Unchanged
        );
        assert_eq!(
            plan(ReviewAction::Reevaluate(ReevaluateTarget::Pending), Pending).unwrap(),
            ReviewPlan::Unchanged
        );
    }

    #[test]
    fn test_plan_rejects_invalid_transitions() {
        use ReviewStatus::{Approved, Pending, Rejected};

        assert!(matches!(
            plan(ReviewAction::Approve, Rejected),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            plan(ReviewAction::Reject, Approved),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            plan(ReviewAction::Reevaluate(ReevaluateTarget::Approved), Pending),
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_approve_pending_post() {
        let pending = fixtures::post("post1", "farmer1", ReviewStatus::Pending);
        let mut approved = pending.clone();
        approved.status = ReviewStatus::Approved;
        approved.reviewed_by = Some("admin1".to_string());
        approved.admin_notes = Some("checked photos".to_string());

        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[pending], [approved]])
                .append_exec_results([exec(1)])
                .into_connection(),
        );

        let result = service(Arc::clone(&post_db), notification_db())
            .approve(&admin(), "post1", Some("checked photos".to_string()))
            .await
            .unwrap();

        assert_eq!(result.status, ReviewStatus::Approved);
        assert_eq!(result.reviewed_by.as_deref(), Some("admin1"));
        assert_eq!(result.admin_notes.as_deref(), Some("checked photos"));

        let values = update_values(post_db);
        assert!(values.contains(&Value::from("approved")));
        assert!(values.contains(&Value::from("admin1")));
        assert!(values.contains(&Value::from("checked photos")));
        assert!(!values.contains(&Value::ChronoDateTimeWithTimeZone(None)));
    }

    #[tokio::test]
    async fn test_reject_stores_notes() {
        let pending = fixtures::post("post1", "farmer1", ReviewStatus::Pending);
        let mut rejected = pending.clone();
        rejected.status = ReviewStatus::Rejected;
        rejected.reviewed_by = Some("admin1".to_string());
        rejected.admin_notes = Some("photos do not match crop".to_string());

        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[pending], [rejected]])
                .append_exec_results([exec(1)])
                .into_connection(),
        );

        let result = service(Arc::clone(&post_db), notification_db())
            .reject(
                &admin(),
                "post1",
                Some("photos do not match crop".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(result.status, ReviewStatus::Rejected);

        let values = update_values(post_db);
        assert!(values.contains(&Value::from("rejected")));
        assert!(values.contains(&Value::from("admin1")));
        assert!(values.contains(&Value::from("photos do not match crop")));
        assert_eq!(null_strings(&values), 0);
    }

    #[tokio::test]
    async fn test_blank_notes_are_not_stored() {
        let pending = fixtures::post("post1", "farmer1", ReviewStatus::Pending);
        let mut rejected = pending.clone();
        rejected.status = ReviewStatus::Rejected;

        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[pending], [rejected]])
                .append_exec_results([exec(1)])
                .into_connection(),
        );

        service(Arc::clone(&post_db), notification_db())
            .reject(&admin(), "post1", Some("   ".to_string()))
            .await
            .unwrap();

        let values = update_values(post_db);
        assert!(!values.contains(&Value::from("   ")));
        assert_eq!(null_strings(&values), 1);
    }

    #[tokio::test]
    async fn test_approve_already_approved_is_noop() {
        let approved = fixtures::post("post1", "farmer1", ReviewStatus::Approved);

        // No exec results and no notification rows: any write would fail.
        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[approved]])
                .into_connection(),
        );

        let result = service(post_db, empty_db())
            .approve(&admin(), "post1", None)
            .await
            .unwrap();

        assert_eq!(result.status, ReviewStatus::Approved);
    }

    #[tokio::test]
    async fn test_approve_rejected_is_conflict() {
        let rejected = fixtures::post("post1", "farmer1", ReviewStatus::Rejected);

        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[rejected]])
                .into_connection(),
        );

        let result = service(post_db, empty_db())
            .approve(&admin(), "post1", None)
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_lost_race_to_same_status_is_idempotent() {
        let pending = fixtures::post("post1", "farmer1", ReviewStatus::Pending);
        let mut rejected = pending.clone();
        rejected.status = ReviewStatus::Rejected;

        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[pending], [rejected]])
                .append_exec_results([exec(0)])
                .into_connection(),
        );

        let result = service(post_db, empty_db())
            .reject(&admin(), "post1", Some("blurry photos".to_string()))
            .await
            .unwrap();

        assert_eq!(result.status, ReviewStatus::Rejected);
    }

    #[tokio::test]
    async fn test_lost_race_to_other_status_is_conflict() {
        let pending = fixtures::post("post1", "farmer1", ReviewStatus::Pending);
        let mut approved = pending.clone();
        approved.status = ReviewStatus::Approved;

        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[pending], [approved]])
                .append_exec_results([exec(0)])
                .into_connection(),
        );

        let result = service(post_db, empty_db())
            .reject(&admin(), "post1", None)
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_reevaluate_to_pending() {
        let mut rejected = fixtures::post("post1", "farmer1", ReviewStatus::Rejected);
        rejected.reviewed_by = Some("admin1".to_string());
        rejected.admin_notes = Some("missing location".to_string());
        let requeued = fixtures::post("post1", "farmer1", ReviewStatus::Pending);

        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[rejected], [requeued]])
                .append_exec_results([exec(1)])
                .into_connection(),
        );

        let result = service(Arc::clone(&post_db), notification_db())
            .reevaluate(
                &admin(),
                "post1",
                ReevaluateTarget::Pending,
                Some("please add photos".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(result.status, ReviewStatus::Pending);
        assert!(result.reviewed_by.is_none());
        assert!(result.admin_notes.is_none());

        // Notes, reviewer and review time are all written as NULL.
        let values = update_values(post_db);
        assert!(values.contains(&Value::from("pending")));
        assert!(!values.contains(&Value::from("admin1")));
        assert!(!values.contains(&Value::from("please add photos")));
        assert_eq!(null_strings(&values), 2);
        assert!(values.contains(&Value::ChronoDateTimeWithTimeZone(None)));
    }

    #[tokio::test]
    async fn test_reevaluate_rejected_to_approved() {
        let mut rejected = fixtures::post("post1", "farmer1", ReviewStatus::Rejected);
        rejected.reviewed_by = Some("admin2".to_string());
        rejected.admin_notes = Some("missing location".to_string());
        let mut approved = rejected.clone();
        approved.status = ReviewStatus::Approved;
        approved.reviewed_by = Some("admin1".to_string());
        approved.admin_notes = Some("location confirmed".to_string());

        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[rejected], [approved]])
                .append_exec_results([exec(1)])
                .into_connection(),
        );

        let result = service(Arc::clone(&post_db), notification_db())
            .reevaluate(
                &admin(),
                "post1",
                ReevaluateTarget::Approved,
                Some("location confirmed".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(result.status, ReviewStatus::Approved);

        let values = update_values(post_db);
        assert!(values.contains(&Value::from("approved")));
        assert!(values.contains(&Value::from("rejected")));
        assert!(values.contains(&Value::from("admin1")));
        assert!(values.contains(&Value::from("location confirmed")));
        assert!(!values.contains(&Value::ChronoDateTimeWithTimeZone(None)));
    }

    #[tokio::test]
    async fn test_non_admin_cannot_review() {
        let farmer = fixtures::user("farmer1", UserRole::Farmer);

        let result = service(empty_db(), empty_db())
            .approve(&farmer, "post1", None)
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_show_includes_breakdown() {
        let mut post = fixtures::post("post1", "farmer1", ReviewStatus::Pending);
        post.latitude = Some(18.5);
        post.longitude = Some(73.8);

        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[post]])
                .into_connection(),
        );
        let profile_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<agrex_db::entities::user_profile::Model>::new()])
                .into_connection(),
        );

        let service = ReviewService::new(
            CropPostRepository::new(post_db),
            UserProfileRepository::new(profile_db),
            NotificationService::new(NotificationRepository::new(empty_db())),
        );
        let review = service.show(&admin(), "post1").await.unwrap();

        assert_eq!(review.breakdown.geolocation, verification::GEOLOCATION_POINTS);
        assert_eq!(review.breakdown.total(), 25);
    }

    #[tokio::test]
    async fn test_queue_sizes() {
        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![
                    maplit::btreemap! {
                        "status" => sea_orm::Value::from("pending"),
                        "count" => sea_orm::Value::BigInt(Some(7)),
                    },
                    maplit::btreemap! {
                        "status" => sea_orm::Value::from("rejected"),
                        "count" => sea_orm::Value::BigInt(Some(2)),
                    },
                ]])
                .into_connection(),
        );

        let counts = service(post_db, empty_db())
            .count_by_status(&admin())
            .await
            .unwrap();

        assert_eq!(
            counts,
            vec![(ReviewStatus::Pending, 7), (ReviewStatus::Rejected, 2)]
        );
    }
}
