/// Retrieval subsystem errors.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("search failed: {reason}")]
    SearchFailed { reason: String },

    #[error("search timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}
