/// Model provider subsystem errors.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// No model registered under (provider, name). A typed lookup miss,
    /// never a panic.
    #[error("model not found: {provider}/{name}")]
    NotFound { provider: String, name: String },

    #[error("provider request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("provider returned malformed payload: {reason}")]
    MalformedResponse { reason: String },

    #[error("provider stream interrupted: {reason}")]
    StreamInterrupted { reason: String },
}
