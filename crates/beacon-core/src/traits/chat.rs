use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::errors::BeaconResult;
use crate::models::ChatTurn;

/// A stream of token deltas from a generation call. Each item is one delta
/// in arrival order; an `Err` item terminates the stream.
pub type TokenStream = BoxStream<'static, BeaconResult<String>>;

/// Text generation capability: "generate text given messages".
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a complete response, non-streaming.
    async fn generate(&self, turns: &[ChatTurn]) -> BeaconResult<String>;

    /// Generate a response as a stream of token deltas.
    async fn generate_stream(&self, turns: &[ChatTurn]) -> BeaconResult<TokenStream>;

    /// Model name as registered.
    fn name(&self) -> &str;
}

impl std::fmt::Debug for dyn ChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatModel").field("name", &self.name()).finish()
    }
}
