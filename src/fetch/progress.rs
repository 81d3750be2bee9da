/// Incremental status emitted by the engine during its downloading phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Always within [0, 100].
    pub percent: u8,
    pub eta: Option<String>,
    pub speed: Option<String>,
}

/// Receives progress events during a fetch. Implementations decide how to
/// display them; the orchestrator only clamps the percentage.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
}

/// Observer that discards everything.
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn on_progress(&self, _event: ProgressEvent) {}
}

/// Parses a percentage string like ` 42.3%` into a clamped value.
/// Malformed input yields `None` and must not abort the fetch.
pub(crate) fn clamp_percent(raw: &str) -> Option<u8> {
    let trimmed = raw.trim().trim_end_matches('%').trim();
    let value: f64 = trimmed.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(value.clamp(0.0, 100.0).round() as u8)
}
