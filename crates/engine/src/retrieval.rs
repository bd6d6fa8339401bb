use anyhow::Result;
use async_trait::async_trait;

use docent_core::RetrievedDocument;

/// Top-K similarity search over the support knowledge base. Results come
/// ranked best-first with 1-based `rank` values. An absent index or no match
/// above threshold is an empty list, never an error; callers treat empty as
/// a normal outcome.
#[async_trait]
pub trait RetrievalGateway: Send + Sync {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedDocument>>;
}

/// Gateway for deployments without a knowledge base: every query resolves to
/// the knowledge-gap path.
#[derive(Default)]
pub struct NoopRetrievalGateway;

#[async_trait]
impl RetrievalGateway for NoopRetrievalGateway {
    async fn similarity_search(&self, _query: &str, _k: usize) -> Result<Vec<RetrievedDocument>> {
        Ok(Vec::new())
    }
}
