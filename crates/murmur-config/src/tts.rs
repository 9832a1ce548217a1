use std::time::Duration;

use serde::Deserialize;

/// Keyword configuration handed to the backend plugin
pub type EngineOptions = serde_json::Map<String, serde_json::Value>;

/// Synthesis engine configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TtsConfig {
    /// Registered plugin key used to build every language engine
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Languages constructed eagerly at startup
    #[serde(default = "default_preload")]
    pub preload: Vec<String>,
    /// Voice used when a request omits `voice`
    #[serde(default = "default_voice")]
    pub default_voice: String,
    /// Language used when a request omits `lang`
    #[serde(default = "default_lang")]
    pub default_lang: String,
    /// Bounded wait between checks of the completion signal (e.g. "100ms")
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
    /// Maximum silence from a session before it is cancelled (e.g. "30s")
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: String,
    /// Backend plugin options
    #[serde(default)]
    pub options: EngineOptions,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            preload: default_preload(),
            default_voice: default_voice(),
            default_lang: default_lang(),
            poll_interval: default_poll_interval(),
            idle_timeout: default_idle_timeout(),
            options: EngineOptions::new(),
        }
    }
}

impl TtsConfig {
    /// Parsed `poll_interval`
    pub fn poll_interval(&self) -> anyhow::Result<Duration> {
        parse_duration("tts.poll_interval", &self.poll_interval)
    }

    /// Parsed `idle_timeout`
    pub fn idle_timeout(&self) -> anyhow::Result<Duration> {
        parse_duration("tts.idle_timeout", &self.idle_timeout)
    }
}

fn parse_duration(field: &str, value: &str) -> anyhow::Result<Duration> {
    let duration =
        duration_str::parse(value).map_err(|e| anyhow::anyhow!("invalid duration for {field} '{value}': {e}"))?;

    if duration.is_zero() {
        anyhow::bail!("{field} must be greater than zero");
    }

    Ok(duration)
}

fn default_backend() -> String {
    "tone".to_string()
}

fn default_preload() -> Vec<String> {
    vec!["a".to_string(), "b".to_string()]
}

fn default_voice() -> String {
    "af_heart".to_string()
}

fn default_lang() -> String {
    "a".to_string()
}

fn default_poll_interval() -> String {
    "100ms".to_string()
}

fn default_idle_timeout() -> String {
    "30s".to_string()
}
