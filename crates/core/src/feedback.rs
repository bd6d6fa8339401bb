//! Helpfulness-confirmation dialogue after a grounded reply.
//!
//! The states below track a single open session per conversation. A resolved
//! session is represented by absence from the session map, never by a stored
//! state, so every terminal transition deletes the entry.

/// Invitation appended to every grounded answer before its session opens.
pub const HELPFULNESS_PROMPT: &str = "\n\nDid this answer help? A quick \"yes\" or \"no\" lets me \
                                      know whether to bring in a human.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedbackState {
    AwaitingInitialFeedback,
    AwaitingEscalationConfirmation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedbackJudgement {
    Positive,
    Negative,
    Ambiguous,
}

/// Keyword rules for reading a post as session feedback. A keyword only
/// counts when it is anchored at the start of the message AND the whole
/// message is short; long replies that merely open with "yes" are feedback
/// for nobody.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedbackRules {
    pub positive_keywords: Vec<String>,
    pub negative_keywords: Vec<String>,
    pub max_feedback_chars: usize,
}

impl Default for FeedbackRules {
    fn default() -> Self {
        Self {
            positive_keywords: ["yes", "yep", "yeah", "thanks", "thank", "solved", "perfect"]
                .map(str::to_string)
                .to_vec(),
            negative_keywords: ["no", "nope", "nah", "not", "didn't", "doesn't", "wrong", "still"]
                .map(str::to_string)
                .to_vec(),
            max_feedback_chars: 30,
        }
    }
}

impl FeedbackRules {
    pub fn judge(&self, text: &str) -> FeedbackJudgement {
        let normalized = text.trim().to_lowercase();
        if normalized.is_empty() || normalized.chars().count() > self.max_feedback_chars {
            return FeedbackJudgement::Ambiguous;
        }

        if leads_with_keyword(&normalized, &self.positive_keywords) {
            FeedbackJudgement::Positive
        } else if leads_with_keyword(&normalized, &self.negative_keywords) {
            FeedbackJudgement::Negative
        } else {
            FeedbackJudgement::Ambiguous
        }
    }
}

fn leads_with_keyword(normalized: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|keyword| {
        let Some(rest) = normalized.strip_prefix(keyword.as_str()) else {
            return false;
        };
        // Word boundary: "yes" must not match "yesterday".
        rest.chars().next().map_or(true, |next| !next.is_alphanumeric())
    })
}

/// Fixed session replies. Text is deterministic; no model call is involved
/// anywhere in the feedback dialogue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedbackReply {
    HelpedAck,
    EscalationOffer,
    TicketCreatedAck,
    NotEscalatingAck,
}

impl FeedbackReply {
    pub fn text(&self) -> &'static str {
        match self {
            Self::HelpedAck => "Great to hear that helped! I'll mark this one as resolved.",
            Self::EscalationOffer => {
                "Sorry that didn't solve it. Would you like me to bring in a human support agent? \
                 (yes/no)"
            }
            Self::TicketCreatedAck => {
                "Done. I've flagged this conversation for a human support agent, and someone will \
                 follow up here shortly."
            }
            Self::NotEscalatingAck => {
                "Understood, I won't escalate this for now. Feel free to ask a follow-up question \
                 any time."
            }
        }
    }
}

/// What the dispatcher must do with the session and the triggering post.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedbackTransition {
    /// Delete the session and post the fixed reply.
    Resolve { reply: FeedbackReply },
    /// Post the escalation offer and move to `AwaitingEscalationConfirmation`.
    OfferEscalation { reply: FeedbackReply },
    /// Delete the session and re-route the post through the full
    /// classification + reply pipeline as a fresh question.
    Reroute,
}

/// The full transition table. Ambiguous input while awaiting escalation
/// confirmation resolves as declining rather than re-routing; an unclear
/// answer to "should I escalate?" must not spawn a second reply thread.
pub fn transition(state: FeedbackState, judgement: FeedbackJudgement) -> FeedbackTransition {
    match (state, judgement) {
        (FeedbackState::AwaitingInitialFeedback, FeedbackJudgement::Positive) => {
            FeedbackTransition::Resolve { reply: FeedbackReply::HelpedAck }
        }
        (FeedbackState::AwaitingInitialFeedback, FeedbackJudgement::Negative) => {
            FeedbackTransition::OfferEscalation { reply: FeedbackReply::EscalationOffer }
        }
        (FeedbackState::AwaitingInitialFeedback, FeedbackJudgement::Ambiguous) => {
            FeedbackTransition::Reroute
        }
        (FeedbackState::AwaitingEscalationConfirmation, FeedbackJudgement::Positive) => {
            FeedbackTransition::Resolve { reply: FeedbackReply::TicketCreatedAck }
        }
        (
            FeedbackState::AwaitingEscalationConfirmation,
            FeedbackJudgement::Negative | FeedbackJudgement::Ambiguous,
        ) => FeedbackTransition::Resolve { reply: FeedbackReply::NotEscalatingAck },
    }
}
