use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use sqlx::{sqlite::SqliteRow, Row};

use slashgate_core::domain::tenant::{TenantApplication, TenantId};
use slashgate_core::ports::{CredentialStore, StoreError};

use super::{RepositoryError, TenantRepository};
use crate::DbPool;

pub struct SqlTenantRepository {
    pool: DbPool,
}

impl SqlTenantRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, active_only: bool) -> Result<Vec<TenantApplication>, RepositoryError> {
        let sql = if active_only {
            "SELECT id, label, secret, active FROM tenant_application WHERE active = 1 ORDER BY rowid"
        } else {
            "SELECT id, label, secret, active FROM tenant_application ORDER BY rowid"
        };

        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(tenant_from_row).collect()
    }
}

#[async_trait::async_trait]
impl CredentialStore for SqlTenantRepository {
    async fn list_active(&self) -> Result<Vec<TenantApplication>, StoreError> {
        Ok(self.fetch(true).await?)
    }
}

#[async_trait::async_trait]
impl TenantRepository for SqlTenantRepository {
    async fn load(&self, id: &TenantId) -> Result<Option<TenantApplication>, RepositoryError> {
        let row = sqlx::query("SELECT id, label, secret, active FROM tenant_application WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(tenant_from_row).transpose()
    }

    async fn save(&self, tenant: TenantApplication) -> Result<(), RepositoryError> {
        tenant.validate()?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO tenant_application (id, label, secret, active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                label = excluded.label,
                secret = excluded.secret,
                active = excluded.active,
                updated_at = excluded.updated_at",
        )
        .bind(&tenant.id.0)
        .bind(tenant.label.trim())
        .bind(tenant.secret.expose_secret())
        .bind(tenant.active)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &TenantId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM tenant_application WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_all(&self) -> Result<Vec<TenantApplication>, RepositoryError> {
        self.fetch(false).await
    }
}

fn tenant_from_row(row: &SqliteRow) -> Result<TenantApplication, RepositoryError> {
    let id: String = row.try_get("id")?;
    let label: String = row.try_get("label")?;
    let secret: String = row.try_get("secret")?;
    let active: i64 = row.try_get("active")?;

    let active = match active {
        0 => false,
        1 => true,
        other => {
            return Err(RepositoryError::Decode(format!(
                "tenant `{id}` has unsupported active flag {other}"
            )))
        }
    };

    Ok(TenantApplication { id: TenantId(id), label, secret: SecretString::from(secret), active })
}
