//! Collaborator interfaces consumed by request authentication.
//!
//! Storage crates implement these; the authenticator only sees the traits.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::tenant::TenantApplication;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view over the registered tenant pool.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Active tenants in registration order.
    async fn list_active(&self) -> Result<Vec<TenantApplication>, StoreError>;
}

/// Counter store used for flood protection.
///
/// `allowed` answers whether fewer than `limit` events were registered for
/// `key` within the trailing `window`; `register` records one event that
/// stays countable for `window`.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn allowed(&self, key: &str, limit: u32, window: Duration) -> Result<bool, StoreError>;
    async fn register(&self, key: &str, window: Duration) -> Result<(), StoreError>;
}
