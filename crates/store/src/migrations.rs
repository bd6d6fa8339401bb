use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::open_pool;

    #[tokio::test]
    async fn migrations_create_handled_posts_table() {
        let pool = open_pool("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let table_count = sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master \
             WHERE type = 'table' AND name = 'handled_posts'",
        )
        .fetch_one(&pool)
        .await
        .expect("check handled_posts table")
        .get::<i64, _>("count");

        assert_eq!(table_count, 1);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = open_pool("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");
    }
}
