use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use docent_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Open the handled-post store described by the configuration. The pool
/// stays small: the dispatcher is the only writer.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    open_pool(&config.url, config.max_connections, config.timeout_secs).await
}

pub async fn open_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(acquire_timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // WAL keeps concurrent reads cheap while the loop appends.
                let pragmas = [
                    "PRAGMA journal_mode = WAL",
                    "PRAGMA foreign_keys = ON",
                    "PRAGMA busy_timeout = 5000",
                ];
                for pragma in pragmas {
                    sqlx::query(pragma).execute(&mut *conn).await?;
                }
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::open_pool;

    #[tokio::test]
    async fn pragmas_are_applied_on_every_connection() {
        let pool = open_pool("sqlite::memory:", 1, 30).await.expect("connect");

        let foreign_keys = sqlx::query("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("read foreign_keys pragma")
            .get::<i64, _>(0);
        assert_eq!(foreign_keys, 1);

        let busy_timeout = sqlx::query("PRAGMA busy_timeout")
            .fetch_one(&pool)
            .await
            .expect("read busy_timeout pragma")
            .get::<i64, _>(0);
        assert_eq!(busy_timeout, 5000);
    }

    #[tokio::test]
    async fn zero_settings_are_clamped_to_usable_minimums() {
        let pool = open_pool("sqlite::memory:", 0, 0).await.expect("connect");
        sqlx::query("SELECT 1").execute(&pool).await.expect("pool is usable");
    }
}
