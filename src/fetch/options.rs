use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use super::request::{FetchRequest, NetworkFamily};

/// Filename template handed to the engine, relative to the working directory.
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Engine knobs that do not vary per request; loaded from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineTuning {
    pub retries: u32,
    pub fragment_retries: u32,
    /// Step in seconds for the engine's linear backoff between retries.
    pub retry_sleep_step_secs: u32,
    /// Re-extract when the source throttles below this rate, e.g. "100K".
    pub throttled_rate: String,
    /// Impersonation profile name, e.g. "chrome". `None` disables it.
    pub impersonate: Option<String>,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            retries: 10,
            fragment_retries: 10,
            retry_sleep_step_secs: 1,
            throttled_rate: "100K".to_string(),
            impersonate: Some("chrome".to_string()),
        }
    }
}

/// Everything one engine attempt needs. Recomputed per attempt; between
/// attempt one and two only `family` differs.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub url: String,
    pub output_dir: PathBuf,
    pub format_selector: &'static str,
    pub headers: Vec<(String, String)>,
    pub referer: Option<String>,
    pub impersonate: Option<String>,
    pub retries: u32,
    pub fragment_retries: u32,
    pub retry_sleep_step_secs: u32,
    pub throttled_rate: String,
    pub family: NetworkFamily,
    pub cookies_file: Option<PathBuf>,
}

impl EngineOptions {
    pub fn build(
        request: &FetchRequest,
        family: NetworkFamily,
        tuning: &EngineTuning,
        output_dir: &Path,
        cookies_file: Option<PathBuf>,
    ) -> Self {
        Self {
            url: request.url.clone(),
            output_dir: output_dir.to_path_buf(),
            format_selector: request.format.selector(),
            headers: browser_headers(),
            referer: referer_for(&request.url),
            impersonate: tuning.impersonate.clone(),
            retries: tuning.retries,
            fragment_retries: tuning.fragment_retries,
            retry_sleep_step_secs: tuning.retry_sleep_step_secs,
            throttled_rate: tuning.throttled_rate.clone(),
            family,
            cookies_file,
        }
    }

    pub fn output_template(&self) -> PathBuf {
        self.output_dir.join(OUTPUT_TEMPLATE)
    }
}

fn browser_headers() -> Vec<(String, String)> {
    vec![
        ("User-Agent".to_string(), USER_AGENT.to_string()),
        ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
        ("Sec-Fetch-Mode".to_string(), "navigate".to_string()),
    ]
}

/// Referer derived from the target URL's origin, to look like an on-site
/// navigation. Non-http(s) and unparsable URLs get none.
fn referer_for(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    Some(format!("{}/", parsed.origin().ascii_serialization()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::request::FormatChoice;

    fn request(url: &str) -> FetchRequest {
        FetchRequest {
            url: url.to_string(),
            format: FormatChoice::Mp4Video720p,
            cookies: None,
            preferred_family: NetworkFamily::Ipv4,
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let req = request("https://example.com/watch?v=1");
        let tuning = EngineTuning::default();
        let dir = Path::new("/tmp/work");

        let a = EngineOptions::build(&req, NetworkFamily::Ipv4, &tuning, dir, None);
        let b = EngineOptions::build(&req, NetworkFamily::Ipv4, &tuning, dir, None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_retry_rebuild_differs_only_in_family() {
        let req = request("https://example.com/watch?v=1");
        let tuning = EngineTuning::default();
        let dir = Path::new("/tmp/work");

        let first = EngineOptions::build(&req, NetworkFamily::Ipv4, &tuning, dir, None);
        let mut second = EngineOptions::build(&req, NetworkFamily::Ipv6, &tuning, dir, None);
        assert_eq!(second.family, NetworkFamily::Ipv6);

        second.family = NetworkFamily::Ipv4;
        assert_eq!(first, second);
    }

    #[test]
    fn test_referer_is_target_origin() {
        let req = request("https://video.example.com/clips/42?t=3");
        let tuning = EngineTuning::default();
        let options = EngineOptions::build(&req, NetworkFamily::Ipv4, &tuning, Path::new("/tmp"), None);
        assert_eq!(options.referer.as_deref(), Some("https://video.example.com/"));
    }

    #[test]
    fn test_referer_absent_for_unparsable_url() {
        assert_eq!(referer_for("not a url"), None);
        assert_eq!(referer_for("ftp://example.com/file"), None);
    }

    #[test]
    fn test_headers_identify_a_browser() {
        let headers = browser_headers();
        let user_agent = headers
            .iter()
            .find(|(name, _)| name == "User-Agent")
            .map(|(_, value)| value.as_str());
        assert!(user_agent.is_some_and(|ua| ua.contains("Mozilla/5.0")));
    }

    #[test]
    fn test_output_template_inside_working_dir() {
        let req = request("https://example.com/v");
        let tuning = EngineTuning::default();
        let options = EngineOptions::build(&req, NetworkFamily::Ipv4, &tuning, Path::new("/tmp/work"), None);
        assert_eq!(
            options.output_template(),
            PathBuf::from("/tmp/work/%(title)s.%(ext)s")
        );
    }
}
