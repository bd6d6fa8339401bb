use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use docent_core::config::PlatformConfig;
use docent_core::{Conversation, ConversationId, Post, PostId};

use crate::client::{ConversationClient, CreatedReply};
use crate::retry::{ApiError, CallPolicy, ResilientCaller};
use crate::types::{
    CreatedPostResponse, LatestPostsResponse, RateLimitBody, TopicResponse, WirePost,
};

/// HTTP client against a Discourse-style forum API. Every request goes
/// through the `ResilientCaller`, carries the API credentials, and is bounded
/// by the configured per-request timeout.
pub struct ForumHttpClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    api_username: String,
    caller: ResilientCaller,
}

impl ForumHttpClient {
    pub fn new(config: &PlatformConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_username: config.api_username.clone(),
            caller: ResilientCaller::new(CallPolicy::from_config(&config.calls)),
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .header("Api-Key", self.api_key.expose_secret())
            .header("Api-Username", &self.api_username)
            .send()
            .await
            .map_err(|error| ApiError::Transient(error.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited {
                retry_after_secs: rate_limit_hint(response).await,
            });
        }
        if status.is_server_error() {
            return Err(ApiError::Transient(format!("server returned status {status}")));
        }

        let message = response.text().await.unwrap_or_default();
        Err(ApiError::Permanent { status: status.as_u16(), message: truncate(&message, 200) })
    }

    async fn latest_posts_once(&self) -> Result<LatestPostsResponse, ApiError> {
        let request = self.http.get(format!("{}/posts.json", self.base_url));
        decode_json(self.send(request).await?).await
    }

    async fn topic_once(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<TopicResponse, ApiError> {
        let request = self.http.get(format!("{}/t/{}.json", self.base_url, conversation_id.0));
        decode_json(self.send(request).await?).await
    }

    async fn create_reply_once(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<CreatedPostResponse, ApiError> {
        let body = serde_json::json!({ "topic_id": conversation_id.0, "raw": text });
        let request = self.http.post(format!("{}/posts.json", self.base_url)).json(&body);
        decode_json(self.send(request).await?).await
    }

    async fn edit_post_once(&self, post_id: &PostId, text: &str) -> Result<(), ApiError> {
        let body = serde_json::json!({ "post": { "raw": text } });
        let request = self.http.put(format!("{}/posts/{}.json", self.base_url, post_id.0)).json(&body);
        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl ConversationClient for ForumHttpClient {
    async fn fetch_latest_posts(&self) -> Result<Vec<Post>, ApiError> {
        let response = self.caller.call("fetch_latest_posts", || self.latest_posts_once()).await?;
        Ok(response.latest_posts.into_iter().map(WirePost::into_post).collect())
    }

    async fn fetch_conversation_history(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Conversation, ApiError> {
        let response = self
            .caller
            .call("fetch_conversation_history", || self.topic_once(conversation_id))
            .await?;
        Ok(response.into_conversation())
    }

    async fn create_reply(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<CreatedReply, ApiError> {
        let response = self
            .caller
            .call("create_reply", || self.create_reply_once(conversation_id, text))
            .await?;
        Ok(CreatedReply { id: PostId(response.id.to_string()) })
    }

    async fn edit_post(&self, post_id: &PostId, text: &str) -> Result<(), ApiError> {
        self.caller.call("edit_post", || self.edit_post_once(post_id, text)).await
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response.json::<T>().await.map_err(|error| ApiError::MalformedResponse(error.to_string()))
}

async fn rate_limit_hint(response: Response) -> Option<u64> {
    let header = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let body = response.text().await.unwrap_or_default();
    wait_hint(header.as_deref(), &body)
}

/// Header hint wins; the JSON error body is the fallback source.
fn wait_hint(retry_after_header: Option<&str>, body: &str) -> Option<u64> {
    if let Some(parsed) = retry_after_header.and_then(|value| value.trim().parse::<u64>().ok()) {
        return Some(parsed);
    }

    serde_json::from_str::<RateLimitBody>(body)
        .ok()
        .and_then(|decoded| decoded.extras)
        .and_then(|extras| extras.wait_seconds)
}

fn truncate(message: &str, limit: usize) -> String {
    if message.len() <= limit {
        return message.to_string();
    }
    let mut cut = limit;
    while !message.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &message[..cut])
}

#[cfg(test)]
mod tests {
    use super::{truncate, wait_hint};

    #[test]
    fn wait_hint_prefers_retry_after_header() {
        let hint = wait_hint(Some("7"), r#"{"extras": {"wait_seconds": 30}}"#);
        assert_eq!(hint, Some(7));
    }

    #[test]
    fn wait_hint_falls_back_to_body_extras() {
        let hint = wait_hint(None, r#"{"extras": {"wait_seconds": 30}}"#);
        assert_eq!(hint, Some(30));
    }

    #[test]
    fn wait_hint_absent_when_neither_source_parses() {
        assert_eq!(wait_hint(Some("soon"), "not json"), None);
        assert_eq!(wait_hint(None, "{}"), None);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "répétition".repeat(40);
        let cut = truncate(&text, 200);
        assert!(cut.len() <= 204);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate("short", 200), "short");
    }
}
