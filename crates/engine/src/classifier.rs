use std::sync::Arc;

use tracing::{debug, warn};

use docent_core::{ClassifiedIntent, IntentCatalog};

use crate::llm::{ChatMessage, CompletionRequest, LlmClient};

/// Best-effort intent triage: one bounded zero-temperature completion whose
/// output either resolves into the configured catalog or falls back. A
/// classifier failure never blocks a post; it only downgrades the routing.
pub struct IntentClassifier {
    llm: Arc<dyn LlmClient>,
    catalog: IntentCatalog,
    max_intent_tokens: u32,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>, catalog: IntentCatalog, max_intent_tokens: u32) -> Self {
        Self { llm, catalog, max_intent_tokens }
    }

    pub fn catalog(&self) -> &IntentCatalog {
        &self.catalog
    }

    pub async fn classify(&self, post_text: &str) -> ClassifiedIntent {
        let request = CompletionRequest {
            messages: vec![
                ChatMessage::system(self.instruction()),
                ChatMessage::user(post_text.to_string()),
            ],
            max_tokens: self.max_intent_tokens,
            temperature: 0.0,
        };

        match self.llm.complete(request).await {
            Ok(raw) => self.validate(&raw),
            Err(error) => {
                warn!(
                    event_name = "engine.classifier.call_failed",
                    error = %error,
                    "classifier call failed; falling back to the ignore route"
                );
                ClassifiedIntent::Fallback
            }
        }
    }

    fn instruction(&self) -> String {
        let mut lines = vec![
            "You label posts arriving on a support forum. Reply with exactly one label from the \
             list below and nothing else."
                .to_string(),
            String::new(),
            "Labels:".to_string(),
        ];
        for spec in self.catalog.specs() {
            lines.push(format!("- {}: {}", spec.label, spec.guidance));
        }
        lines.push(String::new());
        lines.push(
            "When several labels could apply, a question outranks politeness or thanks in the \
             same message."
                .to_string(),
        );
        lines.join("\n")
    }

    fn validate(&self, raw: &str) -> ClassifiedIntent {
        let Some(label) = normalize_label(raw) else {
            debug!(
                event_name = "engine.classifier.empty_output",
                "classifier returned no usable token; falling back"
            );
            return ClassifiedIntent::Fallback;
        };

        match self.catalog.resolve(&label) {
            Some(spec) => ClassifiedIntent::Valid(spec.clone()),
            None => {
                debug!(
                    event_name = "engine.classifier.unknown_label",
                    label = %label,
                    "classifier output is outside the catalog; falling back"
                );
                ClassifiedIntent::Fallback
            }
        }
    }
}

/// Lowercase the first whitespace token and strip surrounding quoting and
/// punctuation. Returns `None` when nothing usable remains.
fn normalize_label(raw: &str) -> Option<String> {
    let first_token = raw.trim().split_whitespace().next()?;
    let cleaned = first_token
        .trim_matches(|ch: char| !ch.is_ascii_alphanumeric() && ch != '_')
        .to_ascii_lowercase();
    (!cleaned.is_empty()).then_some(cleaned)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use docent_core::{ClassifiedIntent, IntentCatalog, IntentDisposition};

    use super::{normalize_label, IntentClassifier};
    use crate::llm::{CompletionRequest, LlmClient};

    struct ScriptedLlm {
        completions: Mutex<VecDeque<Result<String>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        fn new(completions: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                completions: Mutex::new(completions.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            self.requests.lock().expect("requests lock").push(request);
            self.completions
                .lock()
                .expect("completions lock")
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("script exhausted")))
        }
    }

    fn classifier(llm: Arc<ScriptedLlm>) -> IntentClassifier {
        IntentClassifier::new(llm, IntentCatalog::default(), 8)
    }

    #[tokio::test]
    async fn clean_label_resolves_into_catalog() {
        let llm = ScriptedLlm::new(vec![Ok("question".to_string())]);
        let intent = classifier(llm.clone()).classify("How do I reset my password?").await;

        assert_eq!(intent.disposition(), IntentDisposition::Answer);
        assert_eq!(intent.label(), "question");
    }

    #[tokio::test]
    async fn noisy_output_is_normalized_before_validation() {
        let llm = ScriptedLlm::new(vec![Ok("  \"Escalation_Request\".\n".to_string())]);
        let intent = classifier(llm).classify("get me a human").await;

        assert_eq!(intent.disposition(), IntentDisposition::Escalate);
    }

    #[tokio::test]
    async fn multi_word_output_keeps_only_the_first_token() {
        let llm = ScriptedLlm::new(vec![Ok("follow_up because the user said thanks".to_string())]);
        let intent = classifier(llm).classify("thanks!").await;

        assert_eq!(intent.disposition(), IntentDisposition::Feedback);
    }

    #[tokio::test]
    async fn unknown_label_falls_back() {
        let llm = ScriptedLlm::new(vec![Ok("maybe-ish".to_string())]);
        let intent = classifier(llm).classify("hmm").await;

        assert_eq!(intent, ClassifiedIntent::Fallback);
    }

    #[tokio::test]
    async fn empty_output_falls_back() {
        let llm = ScriptedLlm::new(vec![Ok("   ".to_string())]);
        let intent = classifier(llm).classify("hello").await;

        assert_eq!(intent, ClassifiedIntent::Fallback);
    }

    #[tokio::test]
    async fn transport_failure_falls_back_instead_of_propagating() {
        let llm = ScriptedLlm::new(vec![Err(anyhow!("model unavailable"))]);
        let intent = classifier(llm).classify("hello").await;

        assert_eq!(intent, ClassifiedIntent::Fallback);
    }

    #[tokio::test]
    async fn request_is_bounded_and_zero_temperature() {
        let llm = ScriptedLlm::new(vec![Ok("other".to_string())]);
        classifier(llm.clone()).classify("announcement").await;

        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].max_tokens, 8);
        assert_eq!(requests[0].temperature, 0.0);

        let instruction = &requests[0].messages[0].content;
        for label in ["question", "escalation_request", "follow_up", "other"] {
            assert!(instruction.contains(label), "instruction missing label {label}");
        }
    }

    #[test]
    fn label_normalization_edge_cases() {
        assert_eq!(normalize_label("question"), Some("question".to_string()));
        assert_eq!(normalize_label("`question`"), Some("question".to_string()));
        assert_eq!(normalize_label("QUESTION!"), Some("question".to_string()));
        assert_eq!(normalize_label("\"follow_up\""), Some("follow_up".to_string()));
        assert_eq!(normalize_label(""), None);
        assert_eq!(normalize_label("?!,"), None);
    }
}
