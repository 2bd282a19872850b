//! Inbound turn payload.

use serde::{Deserialize, Serialize};

use super::Role;

/// Controls which optional stages run for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationMode {
    /// Skip reranking (and suggestions): fastest path.
    Speed,
    /// Rerank, no suggestions.
    #[default]
    Balanced,
    /// Rerank and generate follow-up suggestions.
    Quality,
}

impl OptimizationMode {
    /// Whether the relevance ranker runs for this mode.
    pub fn rerank(&self) -> bool {
        !matches!(self, Self::Speed)
    }

    /// Whether the follow-up suggestion pass runs for this mode.
    pub fn suggestions(&self) -> bool {
        matches!(self, Self::Quality)
    }
}

/// A (provider, model-name) selector resolved through the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRef {
    pub provider: String,
    pub name: String,
}

impl ModelRef {
    pub fn new(provider: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            name: name.into(),
        }
    }

    /// Registry key: `provider/name`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.provider, self.name)
    }
}

/// One prior conversation turn, as (role, content).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The user message of an inbound turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "messageId")]
    pub message_id: String,
    #[serde(rename = "chatId")]
    pub chat_id: String,
    pub content: String,
}

/// Everything the orchestrator needs for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    pub message: InboundMessage,
    #[serde(rename = "optimizationMode", default)]
    pub optimization_mode: OptimizationMode,
    #[serde(rename = "focusMode", default)]
    pub focus_mode: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(rename = "chatModel")]
    pub chat_model: ModelRef,
    #[serde(rename = "embeddingModel")]
    pub embedding_model: ModelRef,
    #[serde(rename = "systemInstructions", default)]
    pub system_instructions: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimization_mode_gates_stages() {
        assert!(!OptimizationMode::Speed.rerank());
        assert!(OptimizationMode::Balanced.rerank());
        assert!(!OptimizationMode::Balanced.suggestions());
        assert!(OptimizationMode::Quality.suggestions());
    }

    #[test]
    fn mode_parses_from_wire() {
        let mode: OptimizationMode = serde_json::from_str("\"quality\"").unwrap();
        assert_eq!(mode, OptimizationMode::Quality);
    }

    #[test]
    fn turn_request_accepts_minimal_payload() {
        let json = serde_json::json!({
            "message": {"messageId": "m1", "chatId": "c1", "content": "hi"},
            "chatModel": {"provider": "openai", "name": "gpt-4o-mini"},
            "embeddingModel": {"provider": "openai", "name": "text-embedding-3-small"}
        });
        let req: TurnRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.optimization_mode, OptimizationMode::Balanced);
        assert!(req.history.is_empty());
        assert_eq!(req.chat_model.key(), "openai/gpt-4o-mini");
    }
}
