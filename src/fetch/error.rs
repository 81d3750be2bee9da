use thiserror::Error;

use super::engine::EngineError;

/// Failure taxonomy for a whole fetch. Everything that escapes the retry
/// policy surfaces verbatim as one human-readable message.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Rejected before any engine call.
    #[error("invalid request: {0}")]
    InvalidInput(String),

    /// The source refused access even after the network-family retry.
    #[error("access denied by the source: {0}")]
    AccessDenied(String),

    /// Connectivity failure the engine's own retries could not absorb.
    #[error("network failure: {0}")]
    TransientNetwork(String),

    /// The engine could not resolve the URL to a media stream.
    #[error("could not extract media: {0}")]
    Extraction(String),

    /// Temporary file or directory handling failed.
    #[error("filesystem failure: {0}")]
    Filesystem(#[from] std::io::Error),

    /// Any other engine-side failure.
    #[error("download failed: {0}")]
    Engine(String),
}

impl From<EngineError> for FetchError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::AccessDenied(msg) => FetchError::AccessDenied(msg),
            EngineError::Extraction(msg) => FetchError::Extraction(msg),
            EngineError::TransientNetwork(msg) => FetchError::TransientNetwork(msg),
            EngineError::Spawn(err) => FetchError::Engine(format!("failed to run engine: {err}")),
            EngineError::Other(msg) => FetchError::Engine(msg),
        }
    }
}
