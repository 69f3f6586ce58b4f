//! `SeaORM` entities.

#![allow(missing_docs)]

pub mod chat_message;
pub mod crop_post;
pub mod deal;
pub mod notification;
pub mod user;
pub mod user_profile;

pub use chat_message::Entity as ChatMessage;
pub use crop_post::Entity as CropPost;
pub use deal::Entity as Deal;
pub use notification::Entity as Notification;
pub use user::Entity as User;
pub use user_profile::Entity as UserProfile;
