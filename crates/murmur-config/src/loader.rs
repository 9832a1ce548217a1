use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// A missing file yields the default configuration, any other read
    /// failure is an error. The result is validated before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, TOML parsing fails,
    /// or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(raw) => Self::parse(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                Self::default()
            }
            Err(e) => anyhow::bail!("failed to read config file {}: {e}", path.display()),
        };

        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from a TOML string without validating it
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or contains unknown fields
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        toml::from_str(raw).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error describing the first inconsistency found
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_server_config()?;
        self.validate_tts_config()?;
        Ok(())
    }

    fn validate_server_config(&self) -> anyhow::Result<()> {
        let health = &self.server.health;

        if health.enabled && !health.path.starts_with('/') {
            anyhow::bail!("server.health.path must start with '/': '{}'", health.path);
        }

        Ok(())
    }

    fn validate_tts_config(&self) -> anyhow::Result<()> {
        let tts = &self.tts;

        if tts.backend.trim().is_empty() {
            anyhow::bail!("tts.backend must not be empty");
        }

        if tts.default_lang.trim().is_empty() {
            anyhow::bail!("tts.default_lang must not be empty");
        }

        if tts.preload.iter().any(|lang| lang.trim().is_empty()) {
            anyhow::bail!("tts.preload must not contain empty language codes");
        }

        let poll_interval = tts.poll_interval()?;
        let idle_timeout = tts.idle_timeout()?;

        if poll_interval >= idle_timeout {
            anyhow::bail!(
                "tts.poll_interval ({}) must be shorter than tts.idle_timeout ({})",
                tts.poll_interval,
                tts.idle_timeout
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.tts.backend, "tone");
        assert!(config.server.health.enabled);
        assert!(config.telemetry.is_none());
    }

    #[test]
    fn load_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [server]
            listen_address = "127.0.0.1:8080"

            [server.health]
            path = "/healthz"

            [tts]
            preload = ["a", "b", "j"]
            default_voice = "bf_emma"
            default_lang = "b"

            [telemetry]
            service_name = "murmur-test"
            "#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.listen_address().port(), 8080);
        assert_eq!(config.server.health.path, "/healthz");
        assert_eq!(config.tts.preload.len(), 3);
        assert_eq!(config.tts.default_voice, "bf_emma");
        assert_eq!(config.telemetry.unwrap().service_name, "murmur-test");
    }

    #[test]
    fn unknown_section_rejected() {
        let err = Config::parse("[llm]\nproviders = []").unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn empty_backend_rejected() {
        let config = Config::parse("[tts]\nbackend = \"  \"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_preload_entry_rejected() {
        let config = Config::parse("[tts]\npreload = [\"a\", \"\"]").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tts.preload"));
    }

    #[test]
    fn poll_interval_must_be_shorter_than_idle_timeout() {
        let config = Config::parse("[tts]\npoll_interval = \"5s\"\nidle_timeout = \"1s\"").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must be shorter"));
    }

    #[test]
    fn relative_health_path_rejected() {
        let config = Config::parse("[server.health]\npath = \"health\"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_listen_address() {
        let config = Config::default();
        assert_eq!(config.server.listen_address(), crate::DEFAULT_LISTEN_ADDRESS);
    }
}
