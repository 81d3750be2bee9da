use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use super::options::EngineOptions;
use super::progress::ProgressObserver;

/// Structured classification of an engine failure. The orchestrator's retry
/// decision matches on these variants, never on message text.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The source answered 403/Forbidden.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The URL could not be resolved to a media stream.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Connectivity failure that survived the engine's own retries.
    #[error("network failure: {0}")]
    TransientNetwork(String),

    /// The engine binary could not be started.
    #[error("failed to run engine: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait Engine: Send + Sync {
    /// Human-readable name of the engine
    fn name(&self) -> &'static str;

    /// Run one extract-and-download call and return the produced file's path.
    async fn download(
        &self,
        options: &EngineOptions,
        observer: &dyn ProgressObserver,
    ) -> Result<PathBuf, EngineError>;
}
