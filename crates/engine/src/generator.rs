use std::sync::Arc;

use tracing::warn;

use docent_core::{Conversation, Post, ReplyDraft, RetrievedDocument};

use crate::llm::{ChatMessage, CompletionRequest, LlmClient};
use crate::retrieval::RetrievalGateway;

/// Deterministic reply when retrieval produced nothing to ground on. No
/// model call happens on this path, so the text is reproducible byte for
/// byte.
pub const KNOWLEDGE_GAP_REPLY: &str = "I couldn't find anything in the knowledge base that \
                                       covers this, so I'd rather not guess. Would you like me \
                                       to bring in a human support agent?";

/// Fixed reply when the completion came back empty or the call failed. A
/// question never goes unanswered.
pub const GENERATION_FAILURE_REPLY: &str = "I wasn't able to put together a proper answer this \
                                            time. I've noted this conversation so a human \
                                            support agent can follow up.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyGrounding {
    /// A model-written answer; `cited` lists the 1-based document indexes
    /// whose markers appeared in the text.
    Grounded { cited: Vec<usize> },
    KnowledgeGap,
    GenerationFallback,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedReply {
    pub text: String,
    pub grounding: ReplyGrounding,
}

#[derive(Clone, Debug)]
pub struct GeneratorSettings {
    pub retrieval_k: usize,
    pub history_window: usize,
    pub max_reply_tokens: u32,
}

pub struct ReplyGenerator {
    llm: Arc<dyn LlmClient>,
    retrieval: Arc<dyn RetrievalGateway>,
    settings: GeneratorSettings,
}

impl ReplyGenerator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        retrieval: Arc<dyn RetrievalGateway>,
        settings: GeneratorSettings,
    ) -> Self {
        Self { llm, retrieval, settings }
    }

    /// Produce exactly one reply for `query`, the latest post in
    /// `conversation`. Falls back deterministically when retrieval comes up
    /// empty and to the failure notice when the model does not deliver.
    pub async fn generate(
        &self,
        conversation: &Conversation,
        query: &Post,
        own_identity: &str,
    ) -> GeneratedReply {
        let documents = match self
            .retrieval
            .similarity_search(&query.raw_text, self.settings.retrieval_k)
            .await
        {
            Ok(documents) => documents,
            Err(error) => {
                // Gateway failure reads the same as an empty result: answer
                // from the knowledge-gap path, no retry.
                warn!(
                    event_name = "engine.retrieval.unavailable",
                    conversation_id = %conversation.id,
                    error = %error,
                    "retrieval gateway failed; using knowledge-gap reply"
                );
                Vec::new()
            }
        };

        if documents.is_empty() {
            return GeneratedReply {
                text: KNOWLEDGE_GAP_REPLY.to_string(),
                grounding: ReplyGrounding::KnowledgeGap,
            };
        }

        let request = self.build_request(conversation, query, own_identity, &documents);
        let completion = match self.llm.complete(request).await {
            Ok(completion) => completion,
            Err(error) => {
                warn!(
                    event_name = "engine.generator.call_failed",
                    conversation_id = %conversation.id,
                    error = %error,
                    "generation call failed; using failure notice"
                );
                return generation_fallback();
            }
        };

        if completion.trim().is_empty() {
            warn!(
                event_name = "engine.generator.empty_completion",
                conversation_id = %conversation.id,
                "model returned an empty completion; using failure notice"
            );
            return generation_fallback();
        }

        let draft = append_sources(completion, &documents);
        GeneratedReply { text: draft.text, grounding: ReplyGrounding::Grounded { cited: draft.cited } }
    }

    fn build_request(
        &self,
        conversation: &Conversation,
        query: &Post,
        own_identity: &str,
        documents: &[RetrievedDocument],
    ) -> CompletionRequest {
        let mut messages =
            vec![ChatMessage::system(grounding_preamble(&conversation.title, documents))];

        for post in conversation.trailing_window(self.settings.history_window) {
            if post.id == query.id {
                continue;
            }
            if post.author == own_identity {
                messages.push(ChatMessage::assistant(post.raw_text.clone()));
            } else {
                messages.push(ChatMessage::user(post.raw_text.clone()));
            }
        }

        messages.push(ChatMessage::user(query.raw_text.clone()));

        CompletionRequest {
            messages,
            max_tokens: self.settings.max_reply_tokens,
            temperature: 0.2,
        }
    }
}

fn generation_fallback() -> GeneratedReply {
    GeneratedReply {
        text: GENERATION_FAILURE_REPLY.to_string(),
        grounding: ReplyGrounding::GenerationFallback,
    }
}

fn grounding_preamble(title: &str, documents: &[RetrievedDocument]) -> String {
    let mut lines = vec![
        "You are docent, a support assistant on a discussion forum. Answer the latest user post \
         using only the reference documents below. Where a document supports a statement, cite \
         it with its bracketed number, for example [1]. If the documents do not cover the \
         question, say so plainly."
            .to_string(),
        String::new(),
        format!("Conversation: {title}"),
        String::new(),
        "Reference documents:".to_string(),
    ];

    for document in documents {
        lines.push(format!("[{}] {}\n{}", document.rank, document.title, document.content));
    }

    lines.join("\n")
}

/// Scan the completion for literal `[i]` markers and append one source line
/// per cited document, ascending. Unreferenced documents are not listed, and
/// the block is omitted entirely when nothing was cited.
fn append_sources(completion: String, documents: &[RetrievedDocument]) -> ReplyDraft {
    let mut cited: Vec<usize> = documents
        .iter()
        .filter(|document| completion.contains(&format!("[{}]", document.rank)))
        .map(|document| document.rank)
        .collect();
    cited.sort_unstable();

    if cited.is_empty() {
        return ReplyDraft { text: completion, cited };
    }

    let mut text = completion.trim_end().to_string();
    text.push_str("\n\nSources:");
    for rank in &cited {
        let Some(document) = documents.iter().find(|document| document.rank == *rank) else {
            continue;
        };
        if document.is_web_url() {
            text.push_str(&format!("\n[{}] [{}]({})", rank, document.title, document.url));
        } else {
            text.push_str(&format!("\n[{}] {}", rank, document.title));
        }
    }

    ReplyDraft { text, cited }
}
