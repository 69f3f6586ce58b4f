//! ID generation utilities.

use std::sync::{Mutex, PoisonError};

use ulid::{Generator, Ulid};
use uuid::Uuid;

/// Process-wide generator so IDs made within one millisecond still increase.
static MONOTONIC: Mutex<Generator> = Mutex::new(Generator::new());

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new lowercase ULID.
    ///
    /// IDs from this process strictly increase, so `ORDER BY id` doubles as
    /// a chronological cursor for notifications and chat messages.
    #[must_use]
    pub fn generate(&self) -> String {
        let ulid = MONOTONIC
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()
            .unwrap_or_else(|_| Ulid::new());
        ulid.to_string().to_lowercase()
    }

    /// Generate an opaque access token.
    #[must_use]
    pub fn generate_token(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}
