//! Member records and the store the login flow resolves identities against.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

pub mod models;
mod repo;

#[cfg(test)]
pub(crate) mod memory;

pub use models::{Subscription, SubscriptionStatus, User};
pub use repo::PgUserStore;

/// Outcome when attempting to create a user for a new email address.
#[derive(Debug)]
pub enum CreateUserOutcome {
    Created(User),
    /// The unique index on `users.email` rejected the insert; another request
    /// created the same user first.
    Conflict,
}

/// Lookup and creation of users. Emails are expected to be normalized.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch a user, with subscriptions, by id.
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;

    /// Fetch a user, with subscriptions, by email.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Insert a user without subscriptions.
    async fn create_user_by_email(&self, email: &str) -> Result<CreateUserOutcome>;
}
