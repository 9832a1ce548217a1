//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use murmur_config::{Config, EngineOptions, HealthConfig, ServerConfig, TtsConfig};

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with minimal defaults
    ///
    /// Nothing is preloaded, so engines are built on first request.
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    health: HealthConfig::default(),
                },
                tts: TtsConfig {
                    preload: Vec::new(),
                    ..TtsConfig::default()
                },
                telemetry: None,
            },
        }
    }

    /// Languages to construct at startup
    pub fn with_preload(mut self, langs: &[&str]) -> Self {
        self.config.tts.preload = langs.iter().map(|lang| (*lang).to_owned()).collect();
        self
    }

    /// Select the backend plugin and its options
    pub fn with_backend(mut self, backend: &str, options: serde_json::Value) -> Self {
        self.config.tts.backend = backend.to_owned();
        self.config.tts.options = match options {
            serde_json::Value::Object(map) => map,
            _ => EngineOptions::new(),
        };
        self
    }

    /// Shorten the bridge timings
    pub fn with_timings(mut self, poll_interval: &str, idle_timeout: &str) -> Self {
        self.config.tts.poll_interval = poll_interval.to_owned();
        self.config.tts.idle_timeout = idle_timeout.to_owned();
        self
    }

    /// Disable health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config.validate().expect("test config is valid");
        self.config
    }
}
