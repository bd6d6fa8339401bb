pub mod config;
pub mod domain;
pub mod errors;
pub mod feedback;
pub mod intent;

pub use domain::post::{Conversation, ConversationId, HandledPost, Post, PostId};
pub use domain::reply::{ReplyDraft, RetrievedDocument};
pub use errors::ApplicationError;
pub use feedback::{
    FeedbackJudgement, FeedbackReply, FeedbackRules, FeedbackState, FeedbackTransition,
    HELPFULNESS_PROMPT,
};
pub use intent::{ClassifiedIntent, IntentCatalog, IntentDisposition, IntentSpec};
