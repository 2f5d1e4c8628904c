use std::time::Duration;

use chrono::Utc;

use slashgate_core::ports::{RateLimiter, StoreError};

use super::RepositoryError;
use crate::DbPool;

/// Flood table backed limiter. Each registered event is one row that stays
/// countable until its expiration; expired rows are purged on write.
pub struct SqlRateLimiter {
    pool: DbPool,
}

impl SqlRateLimiter {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn count_since(&self, key: &str, since: i64) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM flood WHERE event = ? AND timestamp > ?",
        )
        .bind(key)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn insert(&self, key: &str, now: i64, window: Duration) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM flood WHERE expiration < ?").bind(now).execute(&mut *tx).await?;
        sqlx::query("INSERT INTO flood (event, timestamp, expiration) VALUES (?, ?, ?)")
            .bind(key)
            .bind(now)
            .bind(now.saturating_add(window_secs(window)))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RateLimiter for SqlRateLimiter {
    async fn allowed(&self, key: &str, limit: u32, window: Duration) -> Result<bool, StoreError> {
        let since = Utc::now().timestamp().saturating_sub(window_secs(window));
        let count = self.count_since(key, since).await?;
        Ok(count < i64::from(limit))
    }

    async fn register(&self, key: &str, window: Duration) -> Result<(), StoreError> {
        Ok(self.insert(key, Utc::now().timestamp(), window).await?)
    }
}

fn window_secs(window: Duration) -> i64 {
    i64::try_from(window.as_secs()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use slashgate_core::ports::RateLimiter;

    use super::SqlRateLimiter;
    use crate::{connect_with_settings, migrations, DbPool};

    const WINDOW: Duration = Duration::from_secs(3600);

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn allows_until_limit_is_reached() {
        let limiter = SqlRateLimiter::new(setup().await);
        let key = "auth:failed_ip:203.0.113.7";

        for _ in 0..3 {
            assert!(limiter.allowed(key, 3, WINDOW).await.expect("allowed"));
            limiter.register(key, WINDOW).await.expect("register");
        }

        assert!(!limiter.allowed(key, 3, WINDOW).await.expect("allowed after limit"));
    }

    #[tokio::test]
    async fn keys_are_counted_independently() {
        let limiter = SqlRateLimiter::new(setup().await);

        limiter.register("auth:failed_ip:10.0.0.1", WINDOW).await.expect("register");

        assert!(!limiter.allowed("auth:failed_ip:10.0.0.1", 1, WINDOW).await.expect("first ip"));
        assert!(limiter.allowed("auth:failed_ip:10.0.0.2", 1, WINDOW).await.expect("second ip"));
    }

    #[tokio::test]
    async fn events_outside_window_are_not_counted() {
        let pool = setup().await;
        let limiter = SqlRateLimiter::new(pool.clone());
        let stale = Utc::now().timestamp() - 7200;

        sqlx::query("INSERT INTO flood (event, timestamp, expiration) VALUES (?, ?, ?)")
            .bind("auth:failed_ip:unknown")
            .bind(stale)
            .bind(stale + 3600)
            .execute(&pool)
            .await
            .expect("seed stale event");

        assert!(limiter.allowed("auth:failed_ip:unknown", 1, WINDOW).await.expect("allowed"));
    }

    #[tokio::test]
    async fn register_purges_expired_rows() {
        let pool = setup().await;
        let limiter = SqlRateLimiter::new(pool.clone());
        let stale = Utc::now().timestamp() - 7200;

        sqlx::query("INSERT INTO flood (event, timestamp, expiration) VALUES (?, ?, ?)")
            .bind("auth:failed_ip:old")
            .bind(stale)
            .bind(stale + 60)
            .execute(&pool)
            .await
            .expect("seed expired event");

        limiter.register("auth:failed_ip:new", WINDOW).await.expect("register");

        let remaining: Vec<String> = sqlx::query_scalar("SELECT event FROM flood ORDER BY id")
            .fetch_all(&pool)
            .await
            .expect("remaining rows");
        assert_eq!(remaining, vec!["auth:failed_ip:new".to_owned()]);
    }
}
