use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;
use tracing::{error, info};

use super::AppState;
use crate::fetch::{FetchError, FetchRequest, FormatChoice, ProgressEvent, ProgressObserver};

/// Last known fetch status, polled by the page while `POST /api/fetch` runs.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub phase: &'static str,
    pub percent: u8,
    pub eta: Option<String>,
    pub speed: Option<String>,
    pub message: Option<String>,
}

impl ProgressSnapshot {
    pub fn idle() -> Self {
        Self {
            phase: "idle",
            percent: 0,
            eta: None,
            speed: None,
            message: None,
        }
    }

    fn downloading(percent: u8, eta: Option<String>, speed: Option<String>) -> Self {
        Self {
            phase: "downloading",
            percent,
            eta,
            speed,
            message: None,
        }
    }

    fn done(name: &str) -> Self {
        Self {
            phase: "done",
            percent: 100,
            eta: None,
            speed: None,
            message: Some(format!("Ready: {name}")),
        }
    }

    fn failed(message: String) -> Self {
        Self {
            phase: "error",
            percent: 0,
            eta: None,
            speed: None,
            message: Some(message),
        }
    }
}

/// Bridges orchestrator progress callbacks onto the watch channel the
/// progress endpoint reads from.
struct WatchObserver {
    tx: watch::Sender<ProgressSnapshot>,
}

impl ProgressObserver for WatchObserver {
    fn on_progress(&self, event: ProgressEvent) {
        let _ = self.tx.send(ProgressSnapshot::downloading(
            event.percent,
            event.eta,
            event.speed,
        ));
    }
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn busy() -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: "another fetch is already running".to_string(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        let status = match &err {
            FetchError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            FetchError::AccessDenied(_) => StatusCode::FORBIDDEN,
            FetchError::Filesystem(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FetchError::TransientNetwork(_) | FetchError::Extraction(_) | FetchError::Engine(_) => {
                StatusCode::BAD_GATEWAY
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub async fn index() -> Html<&'static str> {
    Html(include_str!("index.html"))
}

pub async fn progress(State(state): State<Arc<AppState>>) -> Json<ProgressSnapshot> {
    Json(state.progress_rx.borrow().clone())
}

pub async fn fetch(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let Ok(_guard) = state.fetch_guard.try_lock() else {
        return Err(AppError::busy());
    };

    let request = read_request(multipart, state.preferred_family).await?;
    let _ = state
        .progress_tx
        .send(ProgressSnapshot::downloading(0, None, None));

    let observer = WatchObserver {
        tx: state.progress_tx.clone(),
    };
    let fetched = match state.orchestrator.fetch(&request, &observer).await {
        Ok(fetched) => fetched,
        Err(err) => {
            error!("Fetch failed for {}: {}", request.url, err);
            let _ = state.progress_tx.send(ProgressSnapshot::failed(err.to_string()));
            return Err(err.into());
        }
    };

    // Read the payload while the temporary scope is still alive; the
    // directory disappears when `fetched` drops at the end of this handler.
    let bytes = tokio::fs::read(fetched.path())
        .await
        .map_err(|e| AppError::internal(format!("failed to read downloaded file: {e}")))?;

    let name = sanitize_filename(fetched.display_name());
    info!("Serving {} ({} bytes)", name, bytes.len());
    let _ = state.progress_tx.send(ProgressSnapshot::done(&name));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{name}\""),
        )
        .body(bytes.into())
        .map_err(|e| AppError::internal(format!("failed to build response: {e}")))
}

async fn read_request(
    mut multipart: Multipart,
    preferred_family: crate::fetch::NetworkFamily,
) -> Result<FetchRequest, AppError> {
    let mut url = String::new();
    let mut format = None;
    let mut cookies = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("malformed form data: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let text = field
            .text()
            .await
            .map_err(|e| AppError::bad_request(format!("malformed form data: {e}")))?;
        match name.as_str() {
            "url" => url = text.trim().to_string(),
            "format" => format = Some(parse_format(&text)?),
            "cookies" => {
                if !text.trim().is_empty() {
                    cookies = Some(text);
                }
            }
            _ => {}
        }
    }

    Ok(FetchRequest {
        url,
        format: format.ok_or_else(|| AppError::bad_request("missing format choice"))?,
        cookies,
        preferred_family,
    })
}

fn parse_format(value: &str) -> Result<FormatChoice, AppError> {
    match value.trim() {
        "video" => Ok(FormatChoice::Mp4Video720p),
        "audio" => Ok(FormatChoice::M4aAudio),
        other => Err(AppError::bad_request(format!("unknown format: {other}"))),
    }
}

/// Keeps the suggested filename safe to put inside a quoted header value.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches([' ', '.']).to_string();
    if trimmed.is_empty() {
        "download.bin".to_string()
    } else {
        trimmed
    }
}
