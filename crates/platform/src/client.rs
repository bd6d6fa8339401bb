use async_trait::async_trait;

use docent_core::{Conversation, ConversationId, Post, PostId};

use crate::retry::ApiError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedReply {
    pub id: PostId,
}

/// The outbound contract against the discussion platform. Every method goes
/// through the resilient call wrapper; callers see only the final outcome.
#[async_trait]
pub trait ConversationClient: Send + Sync {
    async fn fetch_latest_posts(&self) -> Result<Vec<Post>, ApiError>;

    async fn fetch_conversation_history(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Conversation, ApiError>;

    async fn create_reply(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<CreatedReply, ApiError>;

    async fn edit_post(&self, post_id: &PostId, text: &str) -> Result<(), ApiError>;
}
