use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use slashgate_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect_with_config(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

/// Opens a pool, creating the database file on first use.
///
/// In-memory databases are private per connection, so callers pass
/// `max_connections = 1` for `sqlite::memory:` to keep one shared schema.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(5000));
    let options = if is_memory_url(database_url) {
        options
    } else {
        options.journal_mode(SqliteJournalMode::Wal)
    };

    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .connect_with(options)
        .await
}

/// Round-trips a trivial query; used by readiness checks.
pub async fn ping(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::{connect_with_settings, is_memory_url, ping};

    #[test]
    fn detects_memory_urls() {
        assert!(is_memory_url("sqlite::memory:"));
        assert!(is_memory_url("sqlite://file:gate?mode=memory&cache=shared"));
        assert!(!is_memory_url("sqlite://slashgate.db"));
    }

    #[tokio::test]
    async fn memory_pool_answers_ping() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        ping(&pool).await.expect("ping");
    }

    #[tokio::test]
    async fn creates_missing_database_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("created.db");

        let url = format!("sqlite://{}", path.display());
        let pool = connect_with_settings(&url, 1, 30).await.expect("connect");
        ping(&pool).await.expect("ping");
        pool.close().await;

        assert!(path.exists());
    }
}
