//! HTTP retrieval gateway against the knowledge-base search service.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use docent_core::config::RetrievalConfig;
use docent_core::RetrievedDocument;
use docent_engine::retrieval::RetrievalGateway;

pub struct HttpRetrievalGateway {
    http: Client,
    base_url: String,
}

impl HttpRetrievalGateway {
    pub fn new(config: &RetrievalConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self { http, base_url: config.base_url.trim_end_matches('/').to_string() })
    }
}

#[async_trait]
impl RetrievalGateway for HttpRetrievalGateway {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedDocument>> {
        let payload = serde_json::json!({ "query": query, "k": k });
        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .json(&payload)
            .send()
            .await
            .context("retrieval request failed")?;

        // A service without an index yet answers 404; that is the empty
        // result, not an error.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let status = response.status();
        if !status.is_success() {
            bail!("retrieval service returned status {status}");
        }

        let body: SearchResponse =
            response.json().await.context("retrieval response decode failed")?;
        Ok(documents_from(body))
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: String,
}

/// Hits arrive ranked best-first; ranks are assigned 1-based from that
/// order, which is what the generator cites by.
fn documents_from(body: SearchResponse) -> Vec<RetrievedDocument> {
    body.results
        .into_iter()
        .enumerate()
        .map(|(index, hit)| RetrievedDocument {
            title: hit.title,
            url: hit.url.unwrap_or_default(),
            content: hit.content,
            rank: index + 1,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{documents_from, SearchResponse};

    #[test]
    fn hits_become_rank_ordered_documents() {
        let body: SearchResponse = serde_json::from_str(
            r#"{
                "results": [
                    {"title": "Export guide", "url": "https://docs.example.com/export", "content": "how to export"},
                    {"title": "Billing FAQ", "content": "billing answers"}
                ]
            }"#,
        )
        .expect("decode");

        let documents = documents_from(body);
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].rank, 1);
        assert_eq!(documents[0].title, "Export guide");
        assert_eq!(documents[1].rank, 2);
        assert_eq!(documents[1].url, "");
    }

    #[test]
    fn empty_and_missing_results_decode_to_nothing() {
        let body: SearchResponse = serde_json::from_str(r#"{"results": []}"#).expect("decode");
        assert!(documents_from(body).is_empty());

        let body: SearchResponse = serde_json::from_str("{}").expect("decode");
        assert!(documents_from(body).is_empty());
    }
}
