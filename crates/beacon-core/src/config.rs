//! Configuration for the whole workspace, loadable from TOML.
//!
//! Every tunable the orchestrator relies on (turn deadline, per-query search
//! timeout, rerank threshold, source cap) lives here with a serde default
//! rather than as a literal at the call site.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{BeaconError, BeaconResult};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeaconConfig {
    #[serde(default)]
    pub turn: TurnConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    /// Focus-mode table: mode key -> prompt templates + enabled engines.
    #[serde(default)]
    pub focus_modes: HashMap<String, FocusModeConfig>,
}

impl BeaconConfig {
    /// Parse from a TOML string.
    pub fn from_toml(raw: &str) -> BeaconResult<Self> {
        toml::from_str(raw).map_err(|e| BeaconError::Configuration(e.to_string()))
    }

    /// Load from a TOML file on disk.
    pub fn load(path: &Path) -> BeaconResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BeaconError::Configuration(format!("{}: {e}", path.display())))?;
        Self::from_toml(&raw)
    }

    /// Look up a focus mode. Unknown keys get an empty default: no special
    /// prompts, no engine restriction. Never an error.
    pub fn focus_mode(&self, key: &str) -> FocusModeConfig {
        self.focus_modes.get(key).cloned().unwrap_or_default()
    }
}

/// Per-turn budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Wall-clock budget for a whole turn, in seconds.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    /// How many ranked documents are offered to the answer generator.
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
            max_sources: default_max_sources(),
        }
    }
}

/// External search engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// SearXNG-compatible endpoint base URL.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    /// Per-query timeout, in seconds. Independent across queries.
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

/// Relevance ranking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Minimum cosine similarity a document must reach to be kept.
    #[serde(default = "default_rerank_threshold")]
    pub threshold: f32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            threshold: default_rerank_threshold(),
        }
    }
}

/// One configured model provider: an OpenAI-compatible endpoint with the
/// chat and embedding models it serves. A provider with no API key where
/// one is required is simply not registered (availability is derived from
/// valid configuration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider key used in model selectors, e.g. "openai" or "custom-openai".
    pub id: String,
    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub chat_models: Vec<ModelEntry>,
    #[serde(default)]
    pub embedding_models: Vec<ModelEntry>,
}

/// One model served by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Embedding dimensionality; only meaningful for embedding models.
    #[serde(default)]
    pub dimensions: Option<usize>,
}

/// Prompt templates and engine selection for one focus mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FocusModeConfig {
    /// Query-planning prompt template. Empty means "no special instructions".
    #[serde(default)]
    pub retriever_prompt: String,
    /// Answer-generation prompt template.
    #[serde(default)]
    pub response_prompt: String,
    /// Search engines enabled for this mode. Empty means engine default.
    #[serde(default)]
    pub engines: Vec<String>,
}

fn default_deadline_secs() -> u64 {
    30
}

fn default_max_sources() -> usize {
    8
}

fn default_search_endpoint() -> String {
    "http://localhost:8080".to_string()
}

fn default_search_timeout_secs() -> u64 {
    10
}

fn default_rerank_threshold() -> f32 {
    0.7
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_budgets() {
        let config = BeaconConfig::default();
        assert_eq!(config.turn.deadline_secs, 30);
        assert_eq!(config.search.timeout_secs, 10);
        assert!((config.ranking.threshold - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn unknown_focus_mode_is_empty_not_error() {
        let config = BeaconConfig::default();
        let mode = config.focus_mode("nonexistent");
        assert!(mode.retriever_prompt.is_empty());
        assert!(mode.engines.is_empty());
    }

    #[test]
    fn parses_partial_toml() {
        let config = BeaconConfig::from_toml(
            r#"
            [turn]
            deadline_secs = 10

            [[providers]]
            id = "openai"
            api_key = "sk-test"
            chat_models = [{ name = "gpt-4o-mini" }]

            [focus_modes.web]
            retriever_prompt = "rephrase"
            engines = ["google", "bing"]
            "#,
        )
        .unwrap();
        assert_eq!(config.turn.deadline_secs, 10);
        assert_eq!(config.turn.max_sources, 8);
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.focus_mode("web").engines.len(), 2);
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            BeaconConfig::from_toml("turn = \"nope\""),
            Err(BeaconError::Configuration(_))
        ));
    }
}
