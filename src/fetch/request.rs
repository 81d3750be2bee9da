use serde::{Deserialize, Serialize};

/// What the user asked for. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub format: FormatChoice,
    /// Raw cookies-file text uploaded by the user, if any.
    pub cookies: Option<String>,
    pub preferred_family: NetworkFamily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatChoice {
    Mp4Video720p,
    M4aAudio,
}

impl FormatChoice {
    /// Format selector for the engine, most preferred alternative first.
    pub fn selector(self) -> &'static str {
        match self {
            // Prefer combinations that often avoid a merge step on small hosts
            FormatChoice::Mp4Video720p => {
                "bestvideo[height<=720][ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best"
            }
            FormatChoice::M4aAudio => "bestaudio[ext=m4a]/bestaudio",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkFamily {
    Ipv4,
    Ipv6,
}

impl NetworkFamily {
    pub fn flipped(self) -> Self {
        match self {
            NetworkFamily::Ipv4 => NetworkFamily::Ipv6,
            NetworkFamily::Ipv6 => NetworkFamily::Ipv4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_selector_priority_order() {
        let selector = FormatChoice::Mp4Video720p.selector();
        assert!(!selector.is_empty());

        let alternatives: Vec<&str> = selector.split('/').collect();
        assert_eq!(alternatives.len(), 3);
        assert!(alternatives[0].contains("height<=720"));
        assert!(alternatives[0].contains("ext=mp4"));
        assert!(alternatives[0].contains("ext=m4a"));
        assert_eq!(alternatives[1], "best[ext=mp4]");
        assert_eq!(alternatives[2], "best");
    }

    #[test]
    fn test_audio_selector_prefers_m4a() {
        let selector = FormatChoice::M4aAudio.selector();
        assert!(!selector.is_empty());

        let alternatives: Vec<&str> = selector.split('/').collect();
        assert_eq!(alternatives, vec!["bestaudio[ext=m4a]", "bestaudio"]);
    }

    #[test]
    fn test_network_family_flipped() {
        assert_eq!(NetworkFamily::Ipv4.flipped(), NetworkFamily::Ipv6);
        assert_eq!(NetworkFamily::Ipv6.flipped(), NetworkFamily::Ipv4);
        assert_eq!(NetworkFamily::Ipv4.flipped().flipped(), NetworkFamily::Ipv4);
    }
}
