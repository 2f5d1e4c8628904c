pub mod config;
pub mod domain;
pub mod errors;
pub mod ports;

pub use domain::tenant::{TenantApplication, TenantId, TenantValidationError};
pub use errors::{ApplicationError, InterfaceError};
pub use ports::{CredentialStore, RateLimiter, StoreError};
