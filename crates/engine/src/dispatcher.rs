use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use docent_core::feedback::{self, FeedbackRules, FeedbackState, FeedbackTransition};
use docent_core::{
    ApplicationError, ConversationId, HandledPost, IntentDisposition, Post, PostId,
    HELPFULNESS_PROMPT,
};
use docent_platform::{ApiError, ConversationClient};
use docent_store::repositories::{HandledPostRepository, RepositoryError};

use crate::classifier::IntentClassifier;
use crate::generator::{ReplyGenerator, ReplyGrounding};

/// Fixed acknowledgement for posts classified as explicit escalation
/// requests.
pub const ESCALATION_ACK: &str = "Understood. I've flagged this conversation so a human support \
                                  agent can take over, and someone will follow up here.";

/// All mutable engine state, owned by the dispatcher and passed explicitly
/// into every handler. Only the single loop task touches it; parallel
/// handling would require per-conversation serialization first.
pub struct EngineState {
    handled: HashSet<PostId>,
    sessions: HashMap<ConversationId, FeedbackState>,
    started_at: DateTime<Utc>,
}

impl EngineState {
    pub fn new(handled: impl IntoIterator<Item = PostId>, started_at: DateTime<Utc>) -> Self {
        Self { handled: handled.into_iter().collect(), sessions: HashMap::new(), started_at }
    }

    pub fn is_handled(&self, post_id: &PostId) -> bool {
        self.handled.contains(post_id)
    }

    pub fn handled_count(&self) -> usize {
        self.handled.len()
    }

    pub fn session(&self, conversation_id: &ConversationId) -> Option<FeedbackState> {
        self.sessions.get(conversation_id).copied()
    }

    pub fn open_session_count(&self) -> usize {
        self.sessions.len()
    }

    fn insert_handled(&mut self, post_id: PostId) {
        self.handled.insert(post_id);
    }

    /// At most one session per conversation: insertion overwrites.
    fn open_session(&mut self, conversation_id: ConversationId, state: FeedbackState) {
        self.sessions.insert(conversation_id, state);
    }

    fn close_session(&mut self, conversation_id: &ConversationId) {
        self.sessions.remove(conversation_id);
    }
}

pub struct Dispatcher {
    platform: Arc<dyn ConversationClient>,
    repository: Arc<dyn HandledPostRepository>,
    classifier: IntentClassifier,
    generator: ReplyGenerator,
    feedback_rules: FeedbackRules,
    own_identity: String,
    poll_interval: Duration,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        platform: Arc<dyn ConversationClient>,
        repository: Arc<dyn HandledPostRepository>,
        classifier: IntentClassifier,
        generator: ReplyGenerator,
        feedback_rules: FeedbackRules,
        own_identity: String,
        poll_interval: Duration,
    ) -> Self {
        Self {
            platform,
            repository,
            classifier,
            generator,
            feedback_rules,
            own_identity,
            poll_interval,
        }
    }

    /// Replay the durable handled-post log into a fresh in-memory state.
    /// Posts predating this moment are never handled, so a restart does not
    /// replay old history.
    pub async fn load_state(&self) -> Result<EngineState, ApplicationError> {
        let handled = self.repository.load_all().await.map_err(persistence)?;
        let state = EngineState::new(handled, Utc::now());
        info!(
            event_name = "engine.state.loaded",
            handled_count = state.handled_count(),
            "replayed handled-post log into memory"
        );
        Ok(state)
    }

    /// The unbounded poll loop. Cycles run sequentially on the configured
    /// interval; a slow cycle delays the next tick rather than overlapping
    /// it.
    pub async fn run(&self, state: &mut EngineState) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.run_cycle(state).await;
        }
    }

    /// One fetch-filter-handle pass. Every per-post failure is contained
    /// here; the loop always reaches the next post and the next cycle.
    pub async fn run_cycle(&self, state: &mut EngineState) {
        let posts = match self.platform.fetch_latest_posts().await {
            Ok(posts) => posts,
            Err(error) => {
                warn!(
                    event_name = "engine.cycle.fetch_failed",
                    error = %error,
                    "could not fetch the latest-posts snapshot; skipping cycle"
                );
                return;
            }
        };

        for post in posts {
            if !self.should_handle(&post, state) {
                continue;
            }
            if let Err(error) = self.handle_post(&post, state).await {
                warn!(
                    event_name = "engine.post.failed",
                    post_id = %post.id,
                    conversation_id = %post.conversation_id,
                    error = %error,
                    "post handling failed; continuing with the next post"
                );
            }
        }
    }

    fn should_handle(&self, post: &Post, state: &EngineState) -> bool {
        if post.author == self.own_identity || is_bot_author(&post.author) {
            return false;
        }
        if post.created_at < state.started_at {
            return false;
        }
        !state.is_handled(&post.id)
    }

    async fn handle_post(
        &self,
        post: &Post,
        state: &mut EngineState,
    ) -> Result<(), ApplicationError> {
        match state.session(&post.conversation_id) {
            Some(session_state) => self.handle_feedback(post, session_state, state).await,
            None => self.handle_fresh(post, state).await,
        }
    }

    async fn handle_feedback(
        &self,
        post: &Post,
        session_state: FeedbackState,
        state: &mut EngineState,
    ) -> Result<(), ApplicationError> {
        let judgement = self.feedback_rules.judge(&post.raw_text);

        match feedback::transition(session_state, judgement) {
            FeedbackTransition::Resolve { reply } => {
                let created = self
                    .platform
                    .create_reply(&post.conversation_id, reply.text())
                    .await
                    .map_err(platform_call)?;
                state.close_session(&post.conversation_id);
                info!(
                    event_name = "engine.feedback.resolved",
                    conversation_id = %post.conversation_id,
                    reply = ?reply,
                    "feedback session resolved"
                );
                self.mark_handled(post, Some(&created.id), state).await
            }
            FeedbackTransition::OfferEscalation { reply } => {
                let created = self
                    .platform
                    .create_reply(&post.conversation_id, reply.text())
                    .await
                    .map_err(platform_call)?;
                state.open_session(
                    post.conversation_id.clone(),
                    FeedbackState::AwaitingEscalationConfirmation,
                );
                info!(
                    event_name = "engine.feedback.escalation_offered",
                    conversation_id = %post.conversation_id,
                    "negative feedback; asked whether to escalate"
                );
                self.mark_handled(post, Some(&created.id), state).await
            }
            FeedbackTransition::Reroute => {
                // The ambiguous reply is a fresh question, not feedback.
                state.close_session(&post.conversation_id);
                info!(
                    event_name = "engine.feedback.rerouted",
                    conversation_id = %post.conversation_id,
                    "ambiguous feedback; re-routing through classification"
                );
                self.handle_fresh(post, state).await
            }
        }
    }

    async fn handle_fresh(
        &self,
        post: &Post,
        state: &mut EngineState,
    ) -> Result<(), ApplicationError> {
        let intent = self.classifier.classify(&post.raw_text).await;
        info!(
            event_name = "engine.post.classified",
            post_id = %post.id,
            conversation_id = %post.conversation_id,
            intent = intent.label(),
            "classified inbound post"
        );

        match intent.disposition() {
            IntentDisposition::Answer => self.answer(post, state).await,
            IntentDisposition::Escalate => {
                let created = self
                    .platform
                    .create_reply(&post.conversation_id, ESCALATION_ACK)
                    .await
                    .map_err(platform_call)?;
                self.mark_handled(post, Some(&created.id), state).await
            }
            IntentDisposition::Feedback | IntentDisposition::Ignore => {
                self.mark_handled(post, None, state).await
            }
        }
    }

    async fn answer(&self, post: &Post, state: &mut EngineState) -> Result<(), ApplicationError> {
        let conversation = self
            .platform
            .fetch_conversation_history(&post.conversation_id)
            .await
            .map_err(platform_call)?;

        let generated = self.generator.generate(&conversation, post, &self.own_identity).await;
        let (text, opens_session) = match &generated.grounding {
            ReplyGrounding::Grounded { .. } => {
                (format!("{}{}", generated.text, HELPFULNESS_PROMPT), true)
            }
            ReplyGrounding::KnowledgeGap | ReplyGrounding::GenerationFallback => {
                (generated.text, false)
            }
        };

        // Reply first, record second: a crash between the two duplicates a
        // reply after restart instead of losing one (at-least-once).
        let created = self
            .platform
            .create_reply(&post.conversation_id, &text)
            .await
            .map_err(platform_call)?;

        if opens_session {
            state.open_session(post.conversation_id.clone(), FeedbackState::AwaitingInitialFeedback);
        }

        info!(
            event_name = "engine.post.answered",
            post_id = %post.id,
            conversation_id = %post.conversation_id,
            reply_id = %created.id,
            grounding = ?generated.grounding,
            "posted reply"
        );
        self.mark_handled(post, Some(&created.id), state).await
    }

    /// Record the inbound post, and any reply we created for it, durably and
    /// in memory. Runs after the visible side effect.
    async fn mark_handled(
        &self,
        post: &Post,
        reply_id: Option<&PostId>,
        state: &mut EngineState,
    ) -> Result<(), ApplicationError> {
        let recorded_at = Utc::now();
        self.repository
            .record(HandledPost {
                post_id: post.id.clone(),
                conversation_id: post.conversation_id.clone(),
                recorded_at,
            })
            .await
            .map_err(persistence)?;
        state.insert_handled(post.id.clone());

        if let Some(reply_id) = reply_id {
            self.repository
                .record(HandledPost {
                    post_id: reply_id.clone(),
                    conversation_id: post.conversation_id.clone(),
                    recorded_at,
                })
                .await
                .map_err(persistence)?;
            state.insert_handled(reply_id.clone());
        }

        Ok(())
    }
}

fn is_bot_author(author: &str) -> bool {
    let normalized = author.to_ascii_lowercase();
    normalized.ends_with("bot") || normalized == "system"
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

fn platform_call(error: ApiError) -> ApplicationError {
    ApplicationError::PlatformCall(error.to_string())
}
