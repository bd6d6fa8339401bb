//! Conversation engine - classification, grounded reply generation, and the
//! feedback/escalation dialogue.
//!
//! The engine watches the platform feed and drives each inbound post through
//! a constrained pipeline:
//!
//! 1. **Filtering** (`dispatcher`) - own posts, bot authors, pre-start
//!    history, and already-handled ids are dropped before any side effect
//! 2. **Intent triage** (`classifier`) - one bounded zero-temperature LLM
//!    call mapped into the configured catalog, with an explicit fallback
//! 3. **Grounded replies** (`generator`) - retrieval-augmented answers with
//!    citation post-processing and deterministic fallbacks
//! 4. **Feedback dialogue** (`dispatcher` + `docent_core::feedback`) - the
//!    per-conversation helpfulness/escalation state machine
//!
//! # Key Types
//!
//! - `Dispatcher` - the single-worker poll loop owning all engine state
//! - `EngineState` - handled-id set and open feedback sessions, passed
//!   explicitly into every handler; the engine keeps no ambient state
//! - `LlmClient` / `RetrievalGateway` - pluggable seams for the model and
//!   the similarity-search service
//!
//! # Delivery discipline
//!
//! A post classified as a question always yields exactly one visible reply:
//! a grounded answer, a knowledge-gap notice, or a failure notice. Replies
//! are sent before the post is recorded as handled, so a crash between the
//! two duplicates a reply rather than losing one (at-least-once).

pub mod classifier;
pub mod dispatcher;
pub mod generator;
pub mod llm;
pub mod retrieval;

pub use classifier::IntentClassifier;
pub use dispatcher::{Dispatcher, EngineState};
pub use generator::{GeneratedReply, ReplyGenerator, ReplyGrounding};
pub use llm::{ChatMessage, ChatRole, CompletionRequest, LlmClient};
pub use retrieval::{NoopRetrievalGateway, RetrievalGateway};
