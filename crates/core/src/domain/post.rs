use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl std::fmt::Display for PostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single inbound post as fetched from the discussion platform feed.
/// Immutable once fetched; the engine never constructs posts of its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub conversation_id: ConversationId,
    pub author: String,
    pub raw_text: String,
    pub created_at: DateTime<Utc>,
}

/// A conversation thread with its ordered post history. Always refetched on
/// demand so the latest-context window stays correct across cycles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub posts: Vec<Post>,
}

impl Conversation {
    /// The trailing window of posts used as generation context, oldest first.
    pub fn trailing_window(&self, window: usize) -> &[Post] {
        let start = self.posts.len().saturating_sub(window);
        &self.posts[start..]
    }
}

/// Durable record of a post the engine has finished with. Append-only: the
/// handled set only ever grows, and re-recording the same id is a no-op.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandledPost {
    pub post_id: PostId,
    pub conversation_id: ConversationId,
    pub recorded_at: DateTime<Utc>,
}
