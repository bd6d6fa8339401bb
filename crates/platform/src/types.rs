//! Wire payloads for the Discourse-style forum REST API.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use docent_core::{Conversation, ConversationId, Post, PostId};

use crate::sanitize;

#[derive(Debug, Deserialize)]
pub struct LatestPostsResponse {
    pub latest_posts: Vec<WirePost>,
}

#[derive(Debug, Deserialize)]
pub struct WirePost {
    pub id: u64,
    pub topic_id: u64,
    pub username: String,
    /// Rendered HTML body; stripped to plain text at this boundary so the
    /// engine never sees markup.
    #[serde(default)]
    pub cooked: String,
    pub created_at: DateTime<Utc>,
}

impl WirePost {
    pub fn into_post(self) -> Post {
        Post {
            id: PostId(self.id.to_string()),
            conversation_id: ConversationId(self.topic_id.to_string()),
            author: self.username,
            raw_text: sanitize::html_to_text(&self.cooked),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TopicResponse {
    pub id: u64,
    pub title: String,
    pub post_stream: PostStream,
}

#[derive(Debug, Deserialize)]
pub struct PostStream {
    pub posts: Vec<WirePost>,
}

impl TopicResponse {
    pub fn into_conversation(self) -> Conversation {
        Conversation {
            id: ConversationId(self.id.to_string()),
            title: self.title,
            posts: self.post_stream.posts.into_iter().map(WirePost::into_post).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatedPostResponse {
    pub id: u64,
}

/// Rate-limit error body. Discourse reports the wait both in the
/// `Retry-After` header and under `extras.wait_seconds`.
#[derive(Debug, Default, Deserialize)]
pub struct RateLimitBody {
    #[serde(default)]
    pub extras: Option<RateLimitExtras>,
}

#[derive(Debug, Deserialize)]
pub struct RateLimitExtras {
    pub wait_seconds: Option<u64>,
}
