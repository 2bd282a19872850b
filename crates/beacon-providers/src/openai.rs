//! OpenAI-compatible HTTP client.
//!
//! One client covers every configured provider: the official API, local
//! inference servers, and custom deployments all speak the same
//! `/chat/completions` + `/embeddings` surface, differing only in base URL
//! and API key.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use beacon_core::errors::{BeaconResult, ProviderError};
use beacon_core::models::ChatTurn;
use beacon_core::traits::{ChatModel, EmbeddingModel, TokenStream};

use crate::sse::SseBuffer;

/// Shared connection to one OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, path: &str, body: &impl Serialize) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        req
    }

    async fn send(&self, path: &str, body: &impl Serialize) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .request(path, body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed {
                reason: format!("{status}: {detail}"),
            });
        }
        Ok(response)
    }
}

// --- Wire shapes ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

fn wire_messages(turns: &[ChatTurn]) -> Vec<WireMessage<'_>> {
    turns
        .iter()
        .map(|t| WireMessage {
            role: t.role.as_str(),
            content: &t.content,
        })
        .collect()
}

/// Extract the content delta from one SSE payload. `None` for chunks with
/// no text (role headers, tool-call noise, unparseable lines).
fn delta_from_payload(payload: &str) -> Option<String> {
    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content),
        Err(e) => {
            debug!(error = %e, "skipping unparseable stream chunk");
            None
        }
    }
}

// --- Chat ---

/// One chat model served by an OpenAI-compatible endpoint.
pub struct OpenAiChatModel {
    client: Arc<OpenAiClient>,
    model: String,
}

impl OpenAiChatModel {
    pub fn new(client: Arc<OpenAiClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn generate(&self, turns: &[ChatTurn]) -> BeaconResult<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: wire_messages(turns),
            stream: false,
        };
        let response = self.client.send("/chat/completions", &body).await?;
        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    reason: e.to_string(),
                })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                ProviderError::MalformedResponse {
                    reason: "response carried no choices".to_string(),
                }
                .into()
            })
    }

    async fn generate_stream(&self, turns: &[ChatTurn]) -> BeaconResult<TokenStream> {
        let body = ChatRequest {
            model: &self.model,
            messages: wire_messages(turns),
            stream: true,
        };
        let response = self.client.send("/chat/completions", &body).await?;

        let (tx, rx) = mpsc::channel::<BeaconResult<String>>(64);
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = SseBuffer::new();

            while let Some(chunk) = stream.next().await {
                let bytes = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        warn!(error = %e, "token stream interrupted");
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted {
                                reason: e.to_string(),
                            }
                            .into()))
                            .await;
                        return;
                    }
                };

                for payload in buffer.push(&String::from_utf8_lossy(&bytes)) {
                    if payload == "[DONE]" {
                        return;
                    }
                    if let Some(delta) = delta_from_payload(&payload) {
                        if tx.send(Ok(delta)).await.is_err() {
                            // Consumer went away (cancellation); stop reading.
                            return;
                        }
                    }
                }
            }

            // Stream ended without [DONE]: flush a trailing payload the
            // server never terminated with a blank line.
            if let Some(payload) = buffer.finish() {
                if payload != "[DONE]" {
                    if let Some(delta) = delta_from_payload(&payload) {
                        let _ = tx.send(Ok(delta)).await;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// --- Embeddings ---

/// One embedding model served by an OpenAI-compatible endpoint.
pub struct OpenAiEmbeddingModel {
    client: Arc<OpenAiClient>,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbeddingModel {
    pub fn new(client: Arc<OpenAiClient>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            client,
            model: model.into(),
            dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingModel for OpenAiEmbeddingModel {
    async fn embed(&self, texts: &[String]) -> BeaconResult<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let response = self.client.send("/embeddings", &body).await?;
        let parsed: EmbeddingResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    reason: e.to_string(),
                })?;

        if parsed.data.len() != texts.len() {
            return Err(ProviderError::MalformedResponse {
                reason: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    parsed.data.len()
                ),
            }
            .into());
        }

        // The API may return entries out of order; restore input order.
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_extraction_from_stream_chunk() {
        let payload = r#"{"choices":[{"delta":{"content":"Par"}}]}"#;
        assert_eq!(delta_from_payload(payload).as_deref(), Some("Par"));
    }

    #[test]
    fn role_only_chunk_yields_no_delta() {
        let payload = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(delta_from_payload(payload), None);
    }

    #[test]
    fn garbage_chunk_is_skipped_not_fatal() {
        assert_eq!(delta_from_payload("not json"), None);
    }

    #[test]
    fn wire_messages_keep_order_and_roles() {
        let turns = vec![
            ChatTurn::system("be brief"),
            ChatTurn::user("hi"),
            ChatTurn::assistant("hello"),
        ];
        let wire = wire_messages(&turns);
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0].role, "system");
        assert_eq!(wire[2].role, "assistant");
    }

    #[test]
    fn base_url_trailing_slash_normalized() {
        let client = OpenAiClient::new("https://api.example.com/v1/", None);
        assert_eq!(client.base_url, "https://api.example.com/v1");
    }
}
