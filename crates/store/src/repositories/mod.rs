use async_trait::async_trait;
use thiserror::Error;

use docent_core::{HandledPost, PostId};

pub mod handled;
pub mod memory;

pub use handled::SqlHandledPostRepository;
pub use memory::InMemoryHandledPostRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Durable handled-post log. `record` must be idempotent (repeat inserts for
/// the same post id are a no-op), and `load_all` replays the full log so the
/// engine can rebuild its in-memory set at startup. There is no delete.
#[async_trait]
pub trait HandledPostRepository: Send + Sync {
    async fn load_all(&self) -> Result<Vec<PostId>, RepositoryError>;
    async fn record(&self, record: HandledPost) -> Result<(), RepositoryError>;
}
