//! ModelRegistry resolves (provider, model-name) selectors to callable
//! capabilities. Populated once per process from configuration; read-mostly
//! afterwards, shared across turns.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tracing::{info, warn};

use beacon_core::config::BeaconConfig;
use beacon_core::errors::ProviderError;
use beacon_core::models::ModelRef;
use beacon_core::traits::{ChatModel, EmbeddingModel};

use crate::openai::{OpenAiChatModel, OpenAiClient, OpenAiEmbeddingModel};

/// Fallback dimensionality when an embedding model entry omits it.
const DEFAULT_EMBEDDING_DIMS: usize = 1536;

/// One entry of the availability listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub provider: String,
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

/// Currently available chat and embedding models, derived from which
/// providers had valid configuration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelListing {
    pub chat: Vec<ModelInfo>,
    pub embedding: Vec<ModelInfo>,
}

/// Thread-safe registry keyed by `provider/name`.
#[derive(Default)]
pub struct ModelRegistry {
    chat: DashMap<String, Arc<dyn ChatModel>>,
    embedding: DashMap<String, Arc<dyn EmbeddingModel>>,
    chat_listing: Vec<ModelInfo>,
    embedding_listing: Vec<ModelInfo>,
}

impl ModelRegistry {
    /// An empty registry. Models are added with the `register_*` methods.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configuration. Providers with invalid
    /// configuration (a hosted endpoint without an API key) are skipped and
    /// logged, not errors: availability is defined by what loads.
    pub fn from_config(config: &BeaconConfig) -> Self {
        let mut registry = Self::new();

        for provider in &config.providers {
            let hosted = provider.base_url.contains("api.openai.com");
            if hosted && provider.api_key.is_none() {
                warn!(provider = %provider.id, "skipping provider without api key");
                continue;
            }
            if provider.chat_models.is_empty() && provider.embedding_models.is_empty() {
                warn!(provider = %provider.id, "skipping provider with no models");
                continue;
            }

            let client = Arc::new(OpenAiClient::new(
                provider.base_url.clone(),
                provider.api_key.clone(),
            ));

            for entry in &provider.chat_models {
                let model = OpenAiChatModel::new(Arc::clone(&client), entry.name.clone());
                registry.register_chat(
                    &provider.id,
                    &entry.name,
                    entry.display_name.as_deref(),
                    Arc::new(model),
                );
            }
            for entry in &provider.embedding_models {
                let dims = entry.dimensions.unwrap_or(DEFAULT_EMBEDDING_DIMS);
                let model =
                    OpenAiEmbeddingModel::new(Arc::clone(&client), entry.name.clone(), dims);
                registry.register_embedding(
                    &provider.id,
                    &entry.name,
                    entry.display_name.as_deref(),
                    Arc::new(model),
                );
            }
        }

        info!(
            chat_models = registry.chat_listing.len(),
            embedding_models = registry.embedding_listing.len(),
            "model registry initialized"
        );
        registry
    }

    /// Register a chat capability under (provider, name).
    pub fn register_chat(
        &mut self,
        provider: &str,
        name: &str,
        display_name: Option<&str>,
        model: Arc<dyn ChatModel>,
    ) {
        let key = ModelRef::new(provider, name).key();
        self.chat.insert(key, model);
        self.chat_listing.push(ModelInfo {
            provider: provider.to_string(),
            name: name.to_string(),
            display_name: display_name.unwrap_or(name).to_string(),
        });
    }

    /// Register an embedding capability under (provider, name).
    pub fn register_embedding(
        &mut self,
        provider: &str,
        name: &str,
        display_name: Option<&str>,
        model: Arc<dyn EmbeddingModel>,
    ) {
        let key = ModelRef::new(provider, name).key();
        self.embedding.insert(key, model);
        self.embedding_listing.push(ModelInfo {
            provider: provider.to_string(),
            name: name.to_string(),
            display_name: display_name.unwrap_or(name).to_string(),
        });
    }

    /// Resolve a chat model. A typed miss, never a panic.
    pub fn resolve_chat(&self, selector: &ModelRef) -> Result<Arc<dyn ChatModel>, ProviderError> {
        self.chat
            .get(&selector.key())
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ProviderError::NotFound {
                provider: selector.provider.clone(),
                name: selector.name.clone(),
            })
    }

    /// Resolve an embedding model.
    pub fn resolve_embedding(
        &self,
        selector: &ModelRef,
    ) -> Result<Arc<dyn EmbeddingModel>, ProviderError> {
        self.embedding
            .get(&selector.key())
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ProviderError::NotFound {
                provider: selector.provider.clone(),
                name: selector.name.clone(),
            })
    }

    /// The availability listing.
    pub fn available(&self) -> ModelListing {
        ModelListing {
            chat: self.chat_listing.clone(),
            embedding: self.embedding_listing.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use beacon_core::errors::BeaconResult;
    use beacon_core::models::ChatTurn;
    use beacon_core::traits::TokenStream;

    struct EchoChat;

    #[async_trait]
    impl ChatModel for EchoChat {
        async fn generate(&self, turns: &[ChatTurn]) -> BeaconResult<String> {
            Ok(turns.last().map(|t| t.content.clone()).unwrap_or_default())
        }

        async fn generate_stream(&self, _turns: &[ChatTurn]) -> BeaconResult<TokenStream> {
            Ok(Box::pin(futures::stream::empty()))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[test]
    fn resolves_registered_model() {
        let mut registry = ModelRegistry::new();
        registry.register_chat("test", "echo", Some("Echo"), Arc::new(EchoChat));
        assert!(registry.resolve_chat(&ModelRef::new("test", "echo")).is_ok());
    }

    #[test]
    fn unknown_key_is_typed_not_found() {
        let registry = ModelRegistry::new();
        let err = registry
            .resolve_chat(&ModelRef::new("nope", "missing"))
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound { .. }));
    }

    #[test]
    fn listing_reflects_registration() {
        let mut registry = ModelRegistry::new();
        registry.register_chat("test", "echo", None, Arc::new(EchoChat));
        let listing = registry.available();
        assert_eq!(listing.chat.len(), 1);
        assert_eq!(listing.chat[0].display_name, "echo");
        assert!(listing.embedding.is_empty());
    }

    #[test]
    fn from_config_skips_hosted_provider_without_key() {
        let config = BeaconConfig::from_toml(
            r#"
            [[providers]]
            id = "openai"
            base_url = "https://api.openai.com/v1"
            chat_models = [{ name = "gpt-4o-mini" }]

            [[providers]]
            id = "local"
            base_url = "http://localhost:11434/v1"
            chat_models = [{ name = "llama3" }]
            embedding_models = [{ name = "nomic-embed-text", dimensions = 768 }]
            "#,
        )
        .unwrap();

        let registry = ModelRegistry::from_config(&config);
        let listing = registry.available();
        assert_eq!(listing.chat.len(), 1);
        assert_eq!(listing.chat[0].provider, "local");
        assert_eq!(listing.embedding.len(), 1);
        assert!(registry
            .resolve_chat(&ModelRef::new("openai", "gpt-4o-mini"))
            .is_err());
    }
}
