//! Stream frame vocabulary.
//!
//! The wire shape is newline-delimited JSON, one frame per line:
//! `{"type": "message" | "sources" | "suggestions" | "messageEnd" | "error",
//!   "data": ..., "messageId": ...}`.
//! Exactly one terminal frame (`messageEnd` or `error`) closes a turn.

use serde::{Deserialize, Serialize};

use super::Document;

/// One frame of a turn's output stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamFrame {
    /// A token delta, appended to the answer in arrival order.
    #[serde(rename = "message")]
    Message {
        data: String,
        #[serde(rename = "messageId")]
        message_id: String,
    },

    /// The citation set: the documents actually offered to the model,
    /// in rank order. Emitted once, before the terminal frame.
    #[serde(rename = "sources")]
    Sources {
        data: Vec<Document>,
        #[serde(rename = "messageId")]
        message_id: String,
    },

    /// Follow-up question suggestions. Emitted at most once, near stream end.
    #[serde(rename = "suggestions")]
    Suggestions {
        data: Vec<String>,
        #[serde(rename = "messageId")]
        message_id: String,
    },

    /// Terminal frame: the answer completed normally.
    #[serde(rename = "messageEnd")]
    MessageEnd {
        #[serde(rename = "messageId")]
        message_id: String,
    },

    /// Terminal frame: the turn failed after streaming began.
    #[serde(rename = "error")]
    Error {
        data: String,
        #[serde(rename = "messageId")]
        message_id: String,
    },
}

impl StreamFrame {
    /// Whether this frame closes the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::MessageEnd { .. } | Self::Error { .. })
    }

    /// The assistant message id this frame correlates to.
    pub fn message_id(&self) -> &str {
        match self {
            Self::Message { message_id, .. }
            | Self::Sources { message_id, .. }
            | Self::Suggestions { message_id, .. }
            | Self::MessageEnd { message_id }
            | Self::Error { message_id, .. } => message_id,
        }
    }

    /// Encode as one NDJSON line (trailing newline included).
    pub fn to_ndjson(&self) -> String {
        // StreamFrame contains only serializable leaves; this cannot fail.
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }
}
