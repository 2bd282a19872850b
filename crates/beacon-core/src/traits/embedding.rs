use async_trait::async_trait;

use crate::errors::BeaconResult;

/// Embedding capability: "embed text to a vector". Batched where the
/// underlying provider allows it.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> BeaconResult<Vec<Vec<f32>>>;

    /// Dimensionality of the produced vectors.
    fn dimensions(&self) -> usize;

    /// Model name as registered.
    fn name(&self) -> &str;
}
