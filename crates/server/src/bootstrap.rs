use std::sync::Arc;

use slashgate_core::config::AppConfig;
use slashgate_db::repositories::{
    RepositoryError, SqlRateLimiter, SqlTenantRepository, TenantRepository,
};
use slashgate_db::{connection::connect_with_config, migrations, DbPool};
use slashgate_slack::{
    AuthSettings, CommandDispatcher, MarkupError, RepeatCommandHandler, RequestAuthenticator,
    ResponseEncoder,
};
use thiserror::Error;
use tracing::info;

use crate::slash::GatewayState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub gateway: GatewayState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("tenant `{tenant}` could not be synced: {source}")]
    TenantSync {
        tenant: String,
        #[source]
        source: RepositoryError,
    },
    #[error(transparent)]
    Markup(#[from] MarkupError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let tenants = Arc::new(SqlTenantRepository::new(db_pool.clone()));
    for tenant in &config.tenants {
        tenants
            .save(tenant.to_application())
            .await
            .map_err(|source| BootstrapError::TenantSync { tenant: tenant.id.clone(), source })?;
    }
    info!(
        event_name = "system.bootstrap.tenants_synced",
        correlation_id = "bootstrap",
        configured = config.tenants.len(),
        "configured tenant applications synced"
    );

    let gateway = build_gateway(&config, tenants, Arc::new(SqlRateLimiter::new(db_pool.clone())))?;
    if !config.auth.enabled {
        tracing::warn!(
            event_name = "system.bootstrap.auth_disabled",
            correlation_id = "bootstrap",
            "request authentication is disabled; every fresh request is accepted"
        );
    }

    Ok(Application { config, db_pool, gateway })
}

pub fn build_gateway(
    config: &AppConfig,
    tenants: Arc<SqlTenantRepository>,
    limiter: Arc<SqlRateLimiter>,
) -> Result<GatewayState, BootstrapError> {
    let authenticator =
        RequestAuthenticator::new(AuthSettings::from(&config.auth), tenants, limiter);
    let dispatcher = CommandDispatcher::new().with_handler(Arc::new(RepeatCommandHandler));

    Ok(GatewayState {
        authenticator: Arc::new(authenticator),
        dispatcher: Arc::new(dispatcher),
        encoder: Arc::new(ResponseEncoder::new()?),
    })
}
