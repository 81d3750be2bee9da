use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::fetch::{EngineTuning, NetworkFamily};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Address the web UI listens on.
    pub bind: String,
    /// Engine binary to invoke; may be a bare name resolved via PATH.
    pub engine_binary: String,
    /// Network family used for the first attempt of every fetch.
    pub preferred_family: NetworkFamily,
    /// "json" or "pretty".
    pub logging_format: String,
    pub engine: EngineTuning,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            engine_binary: "yt-dlp".to_string(),
            preferred_family: NetworkFamily::Ipv4,
            logging_format: "json".to_string(),
            engine: EngineTuning::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let config =
            toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path))?;
        Ok(config)
    }

    pub fn get_logging_format(&self) -> &str {
        &self.logging_format
    }
}
