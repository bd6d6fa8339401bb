use std::collections::HashMap;

use tokio::sync::RwLock;

use docent_core::{HandledPost, PostId};

use super::{HandledPostRepository, RepositoryError};

/// Test-oriented stand-in for the SQLite repository. First write for a post
/// id wins, matching the durable store's conflict behavior.
#[derive(Default)]
pub struct InMemoryHandledPostRepository {
    records: RwLock<HashMap<String, HandledPost>>,
}

#[async_trait::async_trait]
impl HandledPostRepository for InMemoryHandledPostRepository {
    async fn load_all(&self) -> Result<Vec<PostId>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.values().map(|record| record.post_id.clone()).collect())
    }

    async fn record(&self, record: HandledPost) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.entry(record.post_id.0.clone()).or_insert(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use docent_core::{ConversationId, HandledPost, PostId};

    use super::InMemoryHandledPostRepository;
    use crate::repositories::HandledPostRepository;

    #[tokio::test]
    async fn in_memory_repo_matches_durable_semantics() {
        let repo = InMemoryHandledPostRepository::default();
        let record = HandledPost {
            post_id: PostId("p-1".to_string()),
            conversation_id: ConversationId("t-1".to_string()),
            recorded_at: Utc::now(),
        };

        repo.record(record.clone()).await.expect("record");
        repo.record(record).await.expect("repeat record");

        assert_eq!(repo.load_all().await.expect("load_all").len(), 1);
    }
}
