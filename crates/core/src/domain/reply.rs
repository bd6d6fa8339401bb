use serde::{Deserialize, Serialize};

/// A grounding document returned by the retrieval service, ordered by
/// descending relevance. Ephemeral: never persisted by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub title: String,
    pub url: String,
    pub content: String,
    /// 1-based rank, which is also the citation index the generator uses.
    pub rank: usize,
}

impl RetrievedDocument {
    pub fn is_web_url(&self) -> bool {
        self.url.starts_with("https://") || self.url.starts_with("http://")
    }
}

/// A reply assembled by the generator before it is sent. `cited` holds the
/// ascending 1-based indexes of documents whose markers appeared in the text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyDraft {
    pub text: String,
    pub cited: Vec<usize>,
}
