use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::engine::{Engine, EngineError};
use super::options::EngineOptions;
use super::progress::{self, ProgressEvent, ProgressObserver};

/// Tag prepended to every progress line so it can be told apart from the
/// `--print` filename output on the same stream.
const PROGRESS_TAG: &str = "vf|";

pub struct YtDlpEngine {
    binary: String,
}

impl YtDlpEngine {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Test if the engine binary is available on the system
    pub async fn test_availability(&self) -> bool {
        match Command::new(&self.binary).arg("--version").output().await {
            Ok(output) => {
                if output.status.success() {
                    let version = String::from_utf8_lossy(&output.stdout);
                    info!("✅ {} is available, version: {}", self.binary, version.trim());
                    true
                } else {
                    warn!("❌ {} command failed", self.binary);
                    false
                }
            }
            Err(e) => {
                warn!("❌ {} not found: {}", self.binary, e);
                false
            }
        }
    }
}

#[async_trait]
impl Engine for YtDlpEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn download(
        &self,
        options: &EngineOptions,
        observer: &dyn ProgressObserver,
    ) -> Result<PathBuf, EngineError> {
        let args = build_args(options);
        debug!("Invoking {} with args: {:?}", self.binary, args);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(EngineError::Spawn)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Other("failed to capture engine stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::Other("failed to capture engine stderr".to_string()))?;

        // Drain stderr concurrently so a chatty engine cannot stall on a
        // full pipe while we read stdout.
        let stderr_task = tokio::spawn(async move {
            let mut buffer = Vec::new();
            let mut reader = BufReader::new(stderr);
            let _ = reader.read_to_end(&mut buffer).await;
            String::from_utf8_lossy(&buffer).into_owned()
        });

        let mut resolved: Option<PathBuf> = None;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| EngineError::Other(format!("failed to read engine output: {e}")))?
        {
            if let Some(payload) = line.strip_prefix(PROGRESS_TAG) {
                if let Some(event) = parse_progress_payload(payload) {
                    observer.on_progress(event);
                }
            } else if !line.trim().is_empty() {
                // `--print after_move:filepath` emits the final path once the
                // download (and any merge) is done.
                resolved = Some(PathBuf::from(line.trim()));
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| EngineError::Other(format!("failed to wait for engine: {e}")))?;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if !status.success() {
            debug!("{} failed with status {}: {}", self.binary, status, stderr_text);
            return Err(classify_failure(&stderr_text));
        }

        resolved.ok_or_else(|| {
            EngineError::Other("engine did not report an output file".to_string())
        })
    }
}

fn build_args(options: &EngineOptions) -> Vec<String> {
    let mut args = vec![
        options.url.clone(),
        "--output".to_string(),
        options.output_template().to_string_lossy().into_owned(),
        "--format".to_string(),
        options.format_selector.to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--newline".to_string(),
        "--progress".to_string(),
        "--progress-template".to_string(),
        format!(
            "download:{PROGRESS_TAG}%(progress._percent_str)s|%(progress._eta_str)s|%(progress._speed_str)s"
        ),
        "--no-simulate".to_string(),
        "--print".to_string(),
        "after_move:filepath".to_string(),
        "--retries".to_string(),
        options.retries.to_string(),
        "--fragment-retries".to_string(),
        options.fragment_retries.to_string(),
        "--retry-sleep".to_string(),
        format!("linear={}", options.retry_sleep_step_secs),
        "--throttled-rate".to_string(),
        options.throttled_rate.clone(),
    ];

    args.push(
        match options.family {
            super::request::NetworkFamily::Ipv4 => "--force-ipv4",
            super::request::NetworkFamily::Ipv6 => "--force-ipv6",
        }
        .to_string(),
    );

    for (name, value) in &options.headers {
        args.push("--add-header".to_string());
        args.push(format!("{name}:{value}"));
    }
    if let Some(referer) = &options.referer {
        args.push("--referer".to_string());
        args.push(referer.clone());
    }
    if let Some(profile) = &options.impersonate {
        args.push("--impersonate".to_string());
        args.push(profile.clone());
    }
    if let Some(cookies) = &options.cookies_file {
        args.push("--cookies".to_string());
        args.push(cookies.to_string_lossy().into_owned());
    }

    args
}

fn parse_progress_payload(payload: &str) -> Option<ProgressEvent> {
    let mut parts = payload.splitn(3, '|');
    let percent = progress::clamp_percent(parts.next()?)?;
    let eta = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "N/A")
        .map(String::from);
    let speed = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "N/A")
        .map(String::from);
    Some(ProgressEvent { percent, eta, speed })
}

/// Classifies the engine's stderr into a structured error. This is the only
/// place that looks at message text; callers match on the variant.
fn classify_failure(stderr: &str) -> EngineError {
    let detail = stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("engine failed without diagnostics")
        .trim()
        .to_string();

    if stderr.contains("HTTP Error 403") || stderr.contains("403") || stderr.contains("Forbidden") {
        EngineError::AccessDenied(detail)
    } else if stderr.contains("Unsupported URL")
        || stderr.contains("Unable to extract")
        || stderr.contains("is not a valid URL")
    {
        EngineError::Extraction(detail)
    } else if stderr.contains("Unable to download")
        || stderr.contains("timed out")
        || stderr.contains("Connection")
        || stderr.contains("Temporary failure")
    {
        EngineError::TransientNetwork(detail)
    } else {
        EngineError::Other(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::options::EngineTuning;
    use crate::fetch::request::{FetchRequest, FormatChoice, NetworkFamily};
    use std::path::Path;

    fn options(family: NetworkFamily) -> EngineOptions {
        let request = FetchRequest {
            url: "https://example.com/v1".to_string(),
            format: FormatChoice::Mp4Video720p,
            cookies: None,
            preferred_family: family,
        };
        EngineOptions::build(&request, family, &EngineTuning::default(), Path::new("/tmp/w"), None)
    }

    #[test]
    fn test_args_pin_network_family() {
        let v4 = build_args(&options(NetworkFamily::Ipv4));
        assert!(v4.contains(&"--force-ipv4".to_string()));
        assert!(!v4.contains(&"--force-ipv6".to_string()));

        let v6 = build_args(&options(NetworkFamily::Ipv6));
        assert!(v6.contains(&"--force-ipv6".to_string()));
        assert!(!v6.contains(&"--force-ipv4".to_string()));
    }

    #[test]
    fn test_args_carry_request_configuration() {
        let args = build_args(&options(NetworkFamily::Ipv4));
        assert_eq!(args[0], "https://example.com/v1");
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(!args.contains(&"--cookies".to_string()));

        let format_pos = args.iter().position(|a| a == "--format").unwrap();
        assert_eq!(args[format_pos + 1], FormatChoice::Mp4Video720p.selector());

        let referer_pos = args.iter().position(|a| a == "--referer").unwrap();
        assert_eq!(args[referer_pos + 1], "https://example.com/");
    }

    #[test]
    fn test_args_include_cookies_file_when_present() {
        let mut opts = options(NetworkFamily::Ipv4);
        opts.cookies_file = Some("/tmp/w/cookies.txt".into());
        let args = build_args(&opts);

        let pos = args.iter().position(|a| a == "--cookies").unwrap();
        assert_eq!(args[pos + 1], "/tmp/w/cookies.txt");
    }

    #[test]
    fn test_parse_progress_payload() {
        let event = parse_progress_payload(" 42.3%| 00:12| 1.20MiB/s").unwrap();
        assert_eq!(event.percent, 42);
        assert_eq!(event.eta.as_deref(), Some("00:12"));
        assert_eq!(event.speed.as_deref(), Some("1.20MiB/s"));
    }

    #[test]
    fn test_parse_progress_payload_clamps_and_skips_unknowns() {
        let event = parse_progress_payload("150.0%|N/A|N/A").unwrap();
        assert_eq!(event.percent, 100);
        assert_eq!(event.eta, None);
        assert_eq!(event.speed, None);

        assert!(parse_progress_payload("N/A|00:01|1KiB/s").is_none());
        assert!(parse_progress_payload("").is_none());
    }

    #[test]
    fn test_classify_access_denial() {
        let err = classify_failure("ERROR: unable to download video data: HTTP Error 403: Forbidden");
        assert!(matches!(err, EngineError::AccessDenied(_)));

        let err = classify_failure("ERROR: Forbidden");
        assert!(matches!(err, EngineError::AccessDenied(_)));
    }

    #[test]
    fn test_classify_extraction_failure() {
        let err = classify_failure("ERROR: Unsupported URL: https://example.com/page");
        assert!(matches!(err, EngineError::Extraction(_)));

        let err = classify_failure("ERROR: Unable to extract video data");
        assert!(matches!(err, EngineError::Extraction(_)));
    }

    #[test]
    fn test_classify_network_failure() {
        let err = classify_failure("ERROR: Unable to download webpage: The read operation timed out");
        assert!(matches!(err, EngineError::TransientNetwork(_)));
    }

    #[test]
    fn test_classify_keeps_last_diagnostic_line() {
        let err = classify_failure("WARNING: something\nERROR: Unsupported URL: x\n");
        match err {
            EngineError::Extraction(detail) => assert_eq!(detail, "ERROR: Unsupported URL: x"),
            other => panic!("unexpected classification: {other:?}"),
        }
    }
}
