//! Deal service.
//!
//! Deals move through `initiated → accepted → in_progress → completed`,
//! with `cancelled` and `disputed` side exits. Disputes are settled by an
//! admin. Completed and cancelled deals are final.

use crate::services::{ensure_role, notification::NotificationService};
use agrex_common::{AppError, AppResult, IdGenerator};
use agrex_db::{
    entities::{
        crop_post::ReviewStatus,
        deal::{self, DealStatus},
        notification::NotificationType,
        user::{self, UserRole},
    },
    repositories::{CropPostRepository, DealRepository, DealScope},
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

/// Who may perform a deal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealActor {
    /// Only the selling farmer.
    Farmer,
    /// Either the farmer or the buyer.
    Participant,
    /// Only an admin.
    Admin,
}

/// Who may move a deal from `from` to `to`, or `None` if the move is invalid.
#[must_use]
pub const fn allowed_actor(from: DealStatus, to: DealStatus) -> Option<DealActor> {
    use DealStatus::{Accepted, Cancelled, Completed, Disputed, InProgress, Initiated};

    match (from, to) {
        (Initiated, Accepted) => Some(DealActor::Farmer),
        (Initiated, Cancelled)
        | (Accepted, InProgress | Cancelled | Disputed)
        | (InProgress, Completed | Disputed) => Some(DealActor::Participant),
        (Disputed, Completed | Cancelled) => Some(DealActor::Admin),
        _ => None,
    }
}

/// Input for making an offer on a post.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOfferInput {
    #[validate(length(min = 1))]
    pub post_id: String,

    #[validate(range(exclusive_min = 0.0))]
    pub offer_price: f64,

    #[validate(range(exclusive_min = 0.0))]
    pub offer_quantity: f64,

    #[validate(length(max = 1000))]
    pub message: Option<String>,
}

/// Deal service for business logic.
#[derive(Clone)]
pub struct DealService {
    deal_repo: DealRepository,
    post_repo: CropPostRepository,
    notification_service: NotificationService,
    id_gen: IdGenerator,
}

impl DealService {
    /// Create a new deal service.
    #[must_use]
    pub const fn new(
        deal_repo: DealRepository,
        post_repo: CropPostRepository,
        notification_service: NotificationService,
    ) -> Self {
        Self {
            deal_repo,
            post_repo,
            notification_service,
            id_gen: IdGenerator::new(),
        }
    }

    /// A buyer makes an offer on an approved post.
    pub async fn create_offer(
        &self,
        buyer: &user::Model,
        input: CreateOfferInput,
    ) -> AppResult<deal::Model> {
        ensure_role(buyer, UserRole::Buyer)?;
        input.validate()?;

        let post = self.post_repo.get_by_id(&input.post_id).await?;
        if post.status != ReviewStatus::Approved {
            return Err(AppError::PostNotFound(input.post_id));
        }
        if post.farmer_id == buyer.id {
            return Err(AppError::BadRequest(
                "You cannot make an offer on your own post".to_string(),
            ));
        }
        if input.offer_quantity > post.quantity {
            return Err(AppError::Validation(format!(
                "offer quantity exceeds the {} {} available",
                post.quantity, post.unit
            )));
        }

        let model = deal::ActiveModel {
            id: Set(self.id_gen.generate()),
            post_id: Set(post.id.clone()),
            farmer_id: Set(post.farmer_id.clone()),
            buyer_id: Set(buyer.id.clone()),
            offer_price: Set(input.offer_price),
            offer_quantity: Set(input.offer_quantity),
            message: Set(input.message.filter(|m| !m.trim().is_empty())),
            status: Set(DealStatus::Initiated),
            created_at: Set(chrono::Utc::now().into()),
            updated_at: Set(None),
        };

        let deal = self.deal_repo.create(model).await?;

        tracing::info!(
            deal_id = %deal.id,
            post_id = %post.id,
            buyer_id = %buyer.id,
            "Deal offer created"
        );

        self.notification_service
            .notify_best_effort(
                &deal.farmer_id,
                NotificationType::DealOffer,
                "New offer",
                &format!(
                    "A buyer offered {} per {} for {} {} of {}.",
                    deal.offer_price, post.unit, deal.offer_quantity, post.unit, post.crop_name
                ),
                Some(&post.id),
                Some(&deal.id),
            )
            .await;

        Ok(deal)
    }

    /// Move a deal to `target`.
    pub async fn update_status(
        &self,
        actor: &user::Model,
        deal_id: &str,
        target: DealStatus,
    ) -> AppResult<deal::Model> {
        let deal = self.get_for_user(actor, deal_id).await?;

        if deal.status == target {
            return Ok(deal);
        }
        if deal.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "deal {deal_id} is already {}",
                deal.status.as_str()
            )));
        }

        let required = allowed_actor(deal.status, target).ok_or_else(|| {
            AppError::Conflict(format!(
                "cannot move a {} deal to {}",
                deal.status.as_str(),
                target.as_str()
            ))
        })?;

        let permitted = match required {
            DealActor::Farmer => actor.id == deal.farmer_id,
            DealActor::Participant => deal.is_participant(&actor.id),
            DealActor::Admin => actor.is_admin(),
        };
        if !permitted {
            return Err(AppError::Forbidden(format!(
                "not allowed to move this deal to {}",
                target.as_str()
            )));
        }

        let from = deal.status;
        let rows = self.deal_repo.transition_status(deal_id, from, target).await?;
        if rows == 0 {
            let current = self.deal_repo.get_by_id(deal_id).await?;
            if current.status == target {
                return Ok(current);
            }
            return Err(AppError::Conflict(format!(
                "deal {deal_id} is now {}",
                current.status.as_str()
            )));
        }

        let updated = self.deal_repo.get_by_id(deal_id).await?;

        tracing::info!(
            deal_id = %deal_id,
            actor_id = %actor.id,
            from = from.as_str(),
            to = target.as_str(),
            "Deal status changed"
        );

        let message = format!("Deal {} is now {}.", updated.id, target.as_str());
        let recipients: Vec<&str> = match updated.counterparty_of(&actor.id) {
            Some(other) => vec![other],
            None => vec![updated.farmer_id.as_str(), updated.buyer_id.as_str()],
        };
        for recipient in recipients {
            self.notification_service
                .notify_best_effort(
                    recipient,
                    NotificationType::DealStatusChanged,
                    "Deal updated",
                    &message,
                    Some(&updated.post_id),
                    Some(&updated.id),
                )
                .await;
        }

        Ok(updated)
    }

    /// Deals the user takes part in; admins see every deal.
    pub async fn list_for_user(
        &self,
        user: &user::Model,
        status: Option<DealStatus>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<deal::Model>> {
        self.deal_repo
            .find_for_scope(&scope_for(user), status, limit, offset)
            .await
    }

    /// A deal visible to its participants and admins.
    pub async fn get_for_user(&self, user: &user::Model, deal_id: &str) -> AppResult<deal::Model> {
        let deal = self.deal_repo.get_by_id(deal_id).await?;
        if user.is_admin() || deal.is_participant(&user.id) {
            Ok(deal)
        } else {
            Err(AppError::DealNotFound(deal_id.to_string()))
        }
    }
}

/// The deals a user may see.
#[must_use]
pub fn scope_for(user: &user::Model) -> DealScope {
    match user.role {
        UserRole::Admin => DealScope::All,
        UserRole::Farmer => DealScope::Farmer(user.id.clone()),
        UserRole::Buyer => DealScope::Buyer(user.id.clone()),
    }
}
