//! Repositories wrapping `SeaORM` queries.

mod chat_message;
mod crop_post;
mod deal;
mod notification;
mod user;
mod user_profile;

pub use chat_message::ChatMessageRepository;
pub use crop_post::{CropPostRepository, MarketFilter, MarketSort, ReviewUpdate};
pub use deal::{DealRepository, DealScope};
pub use notification::NotificationRepository;
pub use user::UserRepository;
pub use user_profile::UserProfileRepository;
