//! Dashboard statistics computed with SQL aggregates.

use std::collections::BTreeMap;

use crate::services::ensure_role;
use agrex_common::AppResult;
use agrex_db::{
    entities::{
        crop_post::ReviewStatus,
        deal::DealStatus,
        user::{self, UserRole},
    },
    repositories::{CropPostRepository, DealRepository, DealScope, UserRepository},
};
use sea_orm::Iterable;
use serde::Serialize;

/// Platform-wide numbers for admins.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub users_by_role: BTreeMap<&'static str, u64>,
    pub posts_by_status: BTreeMap<&'static str, u64>,
    pub deals_by_status: BTreeMap<&'static str, u64>,
    pub completed_deal_value: f64,
    pub average_pending_score: Option<f64>,
}

/// A farmer's own numbers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerStats {
    pub posts_by_status: BTreeMap<&'static str, u64>,
    pub deals_by_status: BTreeMap<&'static str, u64>,
    pub revenue: f64,
}

/// A buyer's own numbers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerStats {
    pub deals_by_status: BTreeMap<&'static str, u64>,
    pub total_spend: f64,
}

fn post_counts(rows: Vec<(ReviewStatus, u64)>) -> BTreeMap<&'static str, u64> {
    let mut map: BTreeMap<_, _> = ReviewStatus::iter().map(|s| (s.as_str(), 0)).collect();
    for (status, count) in rows {
        map.insert(status.as_str(), count);
    }
    map
}

fn deal_counts(rows: Vec<(DealStatus, u64)>) -> BTreeMap<&'static str, u64> {
    let mut map: BTreeMap<_, _> = DealStatus::iter().map(|s| (s.as_str(), 0)).collect();
    for (status, count) in rows {
        map.insert(status.as_str(), count);
    }
    map
}

fn role_counts(rows: Vec<(UserRole, u64)>) -> BTreeMap<&'static str, u64> {
    let mut map: BTreeMap<_, _> = UserRole::iter().map(|r| (r.as_str(), 0)).collect();
    for (role, count) in rows {
        map.insert(role.as_str(), count);
    }
    map
}

/// Analytics service.
#[derive(Clone)]
pub struct AnalyticsService {
    user_repo: UserRepository,
    post_repo: CropPostRepository,
    deal_repo: DealRepository,
}

impl AnalyticsService {
    /// Create a new analytics service.
    #[must_use]
    pub const fn new(
        user_repo: UserRepository,
        post_repo: CropPostRepository,
        deal_repo: DealRepository,
    ) -> Self {
        Self {
            user_repo,
            post_repo,
            deal_repo,
        }
    }

    /// Admin dashboard.
    pub async fn admin_stats(&self, admin: &user::Model) -> AppResult<AdminStats> {
        ensure_role(admin, UserRole::Admin)?;

        Ok(AdminStats {
            users_by_role: role_counts(self.user_repo.count_by_role().await?),
            posts_by_status: post_counts(self.post_repo.count_by_status(None).await?),
            deals_by_status: deal_counts(self.deal_repo.count_by_status(&DealScope::All).await?),
            completed_deal_value: self.deal_repo.sum_completed_value(&DealScope::All).await?,
            average_pending_score: self.post_repo.average_score(ReviewStatus::Pending).await?,
        })
    }

    /// Farmer dashboard.
    pub async fn farmer_stats(&self, farmer: &user::Model) -> AppResult<FarmerStats> {
        ensure_role(farmer, UserRole::Farmer)?;
        let scope = DealScope::Farmer(farmer.id.clone());

        Ok(FarmerStats {
            posts_by_status: post_counts(self.post_repo.count_by_status(Some(&farmer.id)).await?),
            deals_by_status: deal_counts(self.deal_repo.count_by_status(&scope).await?),
            revenue: self.deal_repo.sum_completed_value(&scope).await?,
        })
    }

    /// Buyer dashboard.
    pub async fn buyer_stats(&self, buyer: &user::Model) -> AppResult<BuyerStats> {
        ensure_role(buyer, UserRole::Buyer)?;
        let scope = DealScope::Buyer(buyer.id.clone());

        Ok(BuyerStats {
            deals_by_status: deal_counts(self.deal_repo.count_by_status(&scope).await?),
            total_spend: self.deal_repo.sum_completed_value(&scope).await?,
        })
    }
}
