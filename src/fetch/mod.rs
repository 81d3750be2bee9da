mod engine;
mod error;
mod options;
mod progress;
mod request;
mod ytdlp;

pub use engine::{Engine, EngineError};
pub use error::FetchError;
pub use options::{EngineOptions, EngineTuning};
pub use progress::{NullObserver, ProgressEvent, ProgressObserver};
pub use request::{FetchRequest, FormatChoice, NetworkFamily};
pub use ytdlp::YtDlpEngine;

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{info, warn};

/// A downloaded file together with the scope keeping it alive. Dropping this
/// removes the temporary directory and the file with it.
pub struct FetchedFile {
    _dir: TempDir,
    path: PathBuf,
    display_name: String,
}

impl FetchedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// Runs one external download call per request, with at most one retry on the
/// opposite network family when the source denies access.
pub struct FetchOrchestrator {
    engine: Box<dyn Engine>,
    tuning: EngineTuning,
}

impl FetchOrchestrator {
    pub fn new(engine: Box<dyn Engine>, tuning: EngineTuning) -> Self {
        Self { engine, tuning }
    }

    pub async fn fetch(
        &self,
        request: &FetchRequest,
        observer: &dyn ProgressObserver,
    ) -> Result<FetchedFile, FetchError> {
        if request.url.trim().is_empty() {
            return Err(FetchError::InvalidInput("no URL provided".to_string()));
        }

        info!("Starting fetch for URL: {}", request.url);

        // Everything this attempt writes lives in one directory that is
        // removed on every exit path, credentials included.
        let dir = TempDir::new()?;
        let cookies_file = match &request.cookies {
            Some(text) => {
                let path = dir.path().join("cookies.txt");
                tokio::fs::write(&path, text).await?;
                Some(path)
            }
            None => None,
        };

        let first = EngineOptions::build(
            request,
            request.preferred_family,
            &self.tuning,
            dir.path(),
            cookies_file.clone(),
        );

        let path = match self.engine.download(&first, observer).await {
            Ok(path) => path,
            Err(EngineError::AccessDenied(reason)) => {
                let alternate = request.preferred_family.flipped();
                warn!(
                    "{} reported access denial ({}), retrying once with {:?}",
                    self.engine.name(),
                    reason,
                    alternate
                );
                let second =
                    EngineOptions::build(request, alternate, &self.tuning, dir.path(), cookies_file);
                self.engine.download(&second, observer).await?
            }
            Err(err) => return Err(err.into()),
        };

        let display_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("download.bin")
            .to_string();
        info!("Fetch finished: {}", display_name);

        Ok(FetchedFile {
            _dir: dir,
            path,
            display_name,
        })
    }
}
