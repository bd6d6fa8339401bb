use sqlx::Row;

use docent_core::{HandledPost, PostId};

use super::{HandledPostRepository, RepositoryError};
use crate::DbPool;

pub struct SqlHandledPostRepository {
    pool: DbPool,
}

impl SqlHandledPostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl HandledPostRepository for SqlHandledPostRepository {
    async fn load_all(&self) -> Result<Vec<PostId>, RepositoryError> {
        let rows = sqlx::query("SELECT post_id FROM handled_posts ORDER BY recorded_at ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|row| PostId(row.get::<String, _>("post_id"))).collect())
    }

    async fn record(&self, record: HandledPost) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO handled_posts (post_id, conversation_id, recorded_at)
             VALUES (?, ?, ?)
             ON CONFLICT(post_id) DO NOTHING",
        )
        .bind(&record.post_id.0)
        .bind(&record.conversation_id.0)
        .bind(record.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
