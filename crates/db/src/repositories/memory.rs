use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use slashgate_core::domain::tenant::{TenantApplication, TenantId};
use slashgate_core::ports::{CredentialStore, RateLimiter, StoreError};

use super::{RepositoryError, TenantRepository};

/// Vec-backed so registration order survives upserts, matching the SQL
/// repository's rowid ordering.
#[derive(Default)]
pub struct InMemoryTenantRepository {
    tenants: RwLock<Vec<TenantApplication>>,
}

impl InMemoryTenantRepository {
    pub fn with_tenants(tenants: impl IntoIterator<Item = TenantApplication>) -> Self {
        Self { tenants: RwLock::new(tenants.into_iter().collect()) }
    }
}

#[async_trait::async_trait]
impl CredentialStore for InMemoryTenantRepository {
    async fn list_active(&self) -> Result<Vec<TenantApplication>, StoreError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.iter().filter(|tenant| tenant.active).cloned().collect())
    }
}

#[async_trait::async_trait]
impl TenantRepository for InMemoryTenantRepository {
    async fn load(&self, id: &TenantId) -> Result<Option<TenantApplication>, RepositoryError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.iter().find(|tenant| &tenant.id == id).cloned())
    }

    async fn save(&self, tenant: TenantApplication) -> Result<(), RepositoryError> {
        tenant.validate()?;
        let mut tenants = self.tenants.write().await;
        match tenants.iter_mut().find(|existing| existing.id == tenant.id) {
            Some(existing) => *existing = tenant,
            None => tenants.push(tenant),
        }
        Ok(())
    }

    async fn delete(&self, id: &TenantId) -> Result<bool, RepositoryError> {
        let mut tenants = self.tenants.write().await;
        let before = tenants.len();
        tenants.retain(|tenant| &tenant.id != id);
        Ok(tenants.len() != before)
    }

    async fn list_all(&self) -> Result<Vec<TenantApplication>, RepositoryError> {
        Ok(self.tenants.read().await.clone())
    }
}

#[derive(Default)]
pub struct InMemoryRateLimiter {
    events: RwLock<HashMap<String, Vec<Instant>>>,
}

impl InMemoryRateLimiter {
    /// Registered events for `key`, including ones outside any window.
    pub async fn registered(&self, key: &str) -> usize {
        self.events.read().await.get(key).map_or(0, Vec::len)
    }
}

#[async_trait::async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn allowed(&self, key: &str, limit: u32, window: Duration) -> Result<bool, StoreError> {
        let events = self.events.read().await;
        let recent = events.get(key).map_or(0, |stamps| {
            stamps.iter().filter(|stamp| stamp.elapsed() < window).count()
        });
        Ok(recent < limit as usize)
    }

    async fn register(&self, key: &str, window: Duration) -> Result<(), StoreError> {
        let mut events = self.events.write().await;
        let stamps = events.entry(key.to_owned()).or_default();
        stamps.retain(|stamp| stamp.elapsed() < window);
        stamps.push(Instant::now());
        Ok(())
    }
}
