use async_trait::async_trait;
use thiserror::Error;

use slashgate_core::domain::tenant::{TenantApplication, TenantId, TenantValidationError};
use slashgate_core::ports::{CredentialStore, StoreError};

pub mod flood;
pub mod memory;
pub mod tenant;

pub use flood::SqlRateLimiter;
pub use memory::{InMemoryRateLimiter, InMemoryTenantRepository};
pub use tenant::SqlTenantRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("invalid tenant record: {0}")]
    Validation(#[from] TenantValidationError),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        StoreError::Unavailable(value.to_string())
    }
}

/// Full CRUD surface over registered tenant applications. Request
/// authentication only needs the read side, exposed as [`CredentialStore`].
#[async_trait]
pub trait TenantRepository: CredentialStore {
    async fn load(&self, id: &TenantId) -> Result<Option<TenantApplication>, RepositoryError>;
    /// Validates, then inserts or replaces the record with the same id.
    async fn save(&self, tenant: TenantApplication) -> Result<(), RepositoryError>;
    /// Returns whether a record was removed.
    async fn delete(&self, id: &TenantId) -> Result<bool, RepositoryError>;
    /// Every record, active or not, in registration order.
    async fn list_all(&self) -> Result<Vec<TenantApplication>, RepositoryError>;
}
