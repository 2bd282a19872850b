//! Error taxonomy: per-subsystem enums plus the `BeaconError` umbrella.
//!
//! Subsystem errors stay local to their crate's boundary; the umbrella is
//! what crosses crate seams and what a turn ultimately fails with.

mod provider_error;
mod retrieval_error;
mod storage_error;

pub use provider_error::ProviderError;
pub use retrieval_error::RetrievalError;
pub use storage_error::StorageError;

/// Workspace-wide result alias.
pub type BeaconResult<T> = Result<T, BeaconError>;

/// Umbrella error for the whole system.
#[derive(Debug, thiserror::Error)]
pub enum BeaconError {
    /// Malformed or empty turn payload. Rejected before any work starts.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Requested chat/embedding model not resolvable from configuration.
    /// Rejected before any work starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The answer-generation capability failed mid-stream.
    #[error("generation failed: {0}")]
    Generation(String),

    /// The turn exceeded its wall-clock budget.
    #[error("deadline exceeded after {0}s")]
    DeadlineExceeded(u64),
}

impl BeaconError {
    /// The message carried into a terminal `error` frame.
    pub fn frame_message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsystem_errors_convert() {
        let err: BeaconError = RetrievalError::SearchFailed {
            reason: "engine down".into(),
        }
        .into();
        assert!(matches!(err, BeaconError::Retrieval(_)));
    }

    #[test]
    fn deadline_message_names_budget() {
        let err = BeaconError::DeadlineExceeded(30);
        assert!(err.frame_message().contains("30"));
    }
}
