//! HTTP API layer for the Smart Agriculture Exchange.
//!
//! This crate provides the JSON API used by farmers, buyers and admins:
//!
//! - **Endpoints**: POST routes with JSON bodies, grouped by role
//! - **Extractors**: The authenticated caller
//! - **Middleware**: Bearer-token authentication and rate limiting
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod rate_limit;
pub mod response;

pub use endpoints::router;
pub use middleware::{AppState, auth_middleware};
pub use rate_limit::{ApiRateLimiter, RateLimitConfig, RateLimiterState, rate_limit_middleware};
