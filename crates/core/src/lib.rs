//! Core business logic for the Smart Agriculture Exchange.

pub mod services;

pub use services::*;
