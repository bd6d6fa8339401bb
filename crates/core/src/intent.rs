use serde::{Deserialize, Serialize};

/// How the dispatcher routes a post once its intent is known. The label set
/// is configuration; dispositions are the fixed routing outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentDisposition {
    /// Synthesize and post a grounded reply.
    Answer,
    /// Post a fixed escalation acknowledgement.
    Escalate,
    /// Reaction to an earlier answer; no visible action outside a session.
    Feedback,
    /// No visible action.
    Ignore,
}

/// One configured intent label with its routing disposition and the one-line
/// decision rule the classifier prompt lists for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentSpec {
    pub label: String,
    pub disposition: IntentDisposition,
    pub guidance: String,
}

/// The enumerated intent set the classifier validates against. Labels are
/// configuration, not constants: deployments may rename or extend them as
/// long as every entry carries a disposition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntentCatalog {
    specs: Vec<IntentSpec>,
}

impl IntentCatalog {
    pub fn new(specs: Vec<IntentSpec>) -> Self {
        Self { specs }
    }

    pub fn specs(&self) -> &[IntentSpec] {
        &self.specs
    }

    /// Exact-label lookup. Callers normalize model output before resolving.
    pub fn resolve(&self, label: &str) -> Option<&IntentSpec> {
        self.specs.iter().find(|spec| spec.label == label)
    }
}

impl Default for IntentCatalog {
    fn default() -> Self {
        Self::new(vec![
            IntentSpec {
                label: "question".to_string(),
                disposition: IntentDisposition::Answer,
                guidance: "the post asks for help, instructions, or information; a question wins \
                           over politeness even when both appear in the same message"
                    .to_string(),
            },
            IntentSpec {
                label: "escalation_request".to_string(),
                disposition: IntentDisposition::Escalate,
                guidance: "the post explicitly asks for a human, a support agent, a ticket, or to \
                           escalate"
                    .to_string(),
            },
            IntentSpec {
                label: "follow_up".to_string(),
                disposition: IntentDisposition::Feedback,
                guidance: "the post is a short reaction to an earlier answer, such as thanks, \
                           confirmation, or a brief complaint"
                    .to_string(),
            },
            IntentSpec {
                label: "other".to_string(),
                disposition: IntentDisposition::Ignore,
                guidance: "anything else: announcements, chatter, or posts that need no reply"
                    .to_string(),
            },
        ])
    }
}

/// Classifier output. Free-text model output never leaks past this boundary:
/// it is either a validated catalog entry or the explicit fallback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClassifiedIntent {
    Valid(IntentSpec),
    Fallback,
}

impl ClassifiedIntent {
    pub fn disposition(&self) -> IntentDisposition {
        match self {
            Self::Valid(spec) => spec.disposition,
            Self::Fallback => IntentDisposition::Ignore,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Valid(spec) => &spec.label,
            Self::Fallback => "fallback",
        }
    }
}
