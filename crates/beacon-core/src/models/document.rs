use serde::{Deserialize, Serialize};

/// A retrieved document. Ephemeral: never persisted standalone, only
/// referenced as a citation on an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub url: String,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Document {
    pub fn new(title: impl Into<String>, url: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
            image_url: None,
        }
    }
}

/// Ranker output. `score` is `None` when ranking was skipped (speed mode or
/// embedding failure) and the document passed through in retrieval order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedDocument {
    pub document: Document,
    pub score: Option<f32>,
}

impl RankedDocument {
    /// Wrap a document without a score (unranked pass-through).
    pub fn unranked(document: Document) -> Self {
        Self {
            document,
            score: None,
        }
    }

    pub fn scored(document: Document, score: f32) -> Self {
        Self {
            document,
            score: Some(score),
        }
    }
}
