use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Document;

/// Who authored a message. Persisted messages only ever use `User` and
/// `Assistant`; `System` appears in prompt assembly for generation calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// A chat session. Created on the first turn of a new id; the title is the
/// first user message and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub focus_mode: String,
    pub attached_files: Vec<String>,
}

/// A persisted message. `sequence` is assigned by the store and strictly
/// increases in insertion order within a chat. An assistant message's
/// content is finalized only at stream end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub sequence: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Document>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips() {
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("assistant"), Some(Role::Assistant));
        assert_eq!(Role::parse("system"), Some(Role::System));
        assert_eq!(Role::parse("tool"), None);
        assert_eq!(Role::User.as_str(), "user");
    }
}
