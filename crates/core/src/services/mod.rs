//! Business logic services.

#![allow(missing_docs)]

pub mod analytics;
pub mod chat;
pub mod crop_post;
pub mod deal;
pub mod notification;
pub mod review;
pub mod user;
pub mod verification;

pub use analytics::{AdminStats, AnalyticsService, BuyerStats, FarmerStats};
pub use chat::{ChatService, SendMessageInput};
pub use crop_post::{CreatePostInput, CropPostService, UpdatePostInput};
pub use deal::{CreateOfferInput, DealActor, DealService};
pub use notification::NotificationService;
pub use review::{PostReview, ReevaluateTarget, ReviewAction, ReviewService};
pub use user::{SignupInput, UpdateProfileInput, UserService};
pub use verification::ScoreBreakdown;

use agrex_common::{AppError, AppResult};
use agrex_db::entities::user::{Model as UserModel, UserRole};

/// Fail with `403` unless the user has `role`.
pub(crate) fn ensure_role(user: &UserModel, role: UserRole) -> AppResult<()> {
    if user.role == role {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "{} access required",
            role.as_str()
        )))
    }
}

/// Clamp a client-supplied page size.
#[must_use]
pub fn page_limit(limit: Option<u64>) -> u64 {
    limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT)
}

/// Page size used when the client does not ask for one.
pub const DEFAULT_PAGE_LIMIT: u64 = 20;
/// Largest page size a client may ask for.
pub const MAX_PAGE_LIMIT: u64 = 100;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_limit_bounds() {
        assert_eq!(page_limit(None), DEFAULT_PAGE_LIMIT);
        assert_eq!(page_limit(Some(0)), 1);
        assert_eq!(page_limit(Some(500)), MAX_PAGE_LIMIT);
    }

    #[test]
    fn test_ensure_role() {
        let farmer = fixtures::user("f1", UserRole::Farmer);
        assert!(ensure_role(&farmer, UserRole::Farmer).is_ok());
        assert!(matches!(
            ensure_role(&farmer, UserRole::Admin),
            Err(AppError::Forbidden(_))
        ));
    }
}
