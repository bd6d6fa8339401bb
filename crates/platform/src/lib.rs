//! Discussion-platform integration: the outbound call contract, the
//! resilient retry wrapper every call goes through, and the HTTP client
//! against a Discourse-style REST API.

pub mod client;
pub mod http;
pub mod retry;
pub mod sanitize;
pub mod types;

pub use client::{ConversationClient, CreatedReply};
pub use http::ForumHttpClient;
pub use retry::{ApiError, CallPolicy, ResilientCaller};
