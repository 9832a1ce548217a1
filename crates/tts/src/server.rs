use std::sync::Arc;

use murmur_config::TtsConfig;

use crate::{
    bridge::{AudioStream, BridgeOptions, StreamingBridge},
    engine::Utterance,
    error::{Result, TtsError},
    pool::EnginePool,
    registry::{PluginEngineFactory, PluginRegistry},
    types::{EnginesResponse, SpeechDefaults},
};

/// TTS server owning the plugin registry, the engine pool and the bridge
pub struct Server {
    registry: Arc<PluginRegistry>,
    pool: Arc<EnginePool>,
    bridge: StreamingBridge,
    backend: String,
    preload: Vec<String>,
    defaults: SpeechDefaults,
}

impl Server {
    /// Synthesize an utterance as a stream of PCM chunks
    pub async fn synthesize_stream(&self, utterance: Utterance) -> Result<AudioStream> {
        self.bridge.synthesize_stream(utterance).await
    }

    /// Construct the engines for the configured preload languages
    pub async fn preload(&self) -> Result<()> {
        if self.preload.is_empty() {
            return Ok(());
        }

        tracing::info!("Preloading engines for languages: {}", self.preload.join(", "));
        self.pool.preload(&self.preload).await
    }

    /// Release every loaded engine
    pub async fn shutdown(&self) {
        let released = self.pool.clear().await;
        tracing::info!("Released {released} TTS engine(s)");
    }

    /// Registry contents and loaded languages
    pub fn engines(&self) -> EnginesResponse {
        EnginesResponse {
            backend: self.backend.clone(),
            plugins: self.registry.engines(),
            loaded_languages: self.pool.languages(),
        }
    }

    pub fn pool(&self) -> &EnginePool {
        &self.pool
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub const fn defaults(&self) -> &SpeechDefaults {
        &self.defaults
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("backend", &self.backend)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

/// Builder for constructing the TTS server from configuration
pub struct TtsServerBuilder<'a> {
    config: &'a TtsConfig,
    registry: Option<PluginRegistry>,
}

impl<'a> TtsServerBuilder<'a> {
    pub const fn new(config: &'a TtsConfig) -> Self {
        Self { config, registry: None }
    }

    /// Use `registry` instead of the built-in plugins
    #[must_use]
    pub fn with_registry(mut self, registry: PluginRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<Server> {
        let config = self.config;
        let registry = Arc::new(self.registry.unwrap_or_else(PluginRegistry::builtin));

        if !registry.contains(&config.backend) {
            return Err(TtsError::PluginNotFound {
                name: config.backend.clone(),
                available: registry.engines().into_iter().map(str::to_string).collect(),
            });
        }

        let options = BridgeOptions {
            poll_interval: config.poll_interval().map_err(|e| TtsError::Config(e.to_string()))?,
            idle_timeout: config.idle_timeout().map_err(|e| TtsError::Config(e.to_string()))?,
        };

        let factory = PluginEngineFactory::new(Arc::clone(&registry), config.backend.clone(), config.options.clone());
        let pool = Arc::new(EnginePool::new(Arc::new(factory)));
        let bridge = StreamingBridge::new(Arc::clone(&pool), options);

        tracing::debug!(
            "TTS server initialized with backend '{}' ({} plugin(s) registered)",
            config.backend,
            registry.engines().len()
        );

        Ok(Server {
            registry,
            pool,
            bridge,
            backend: config.backend.clone(),
            preload: config.preload.clone(),
            defaults: SpeechDefaults {
                voice: config.default_voice.clone(),
                lang: config.default_lang.clone(),
            },
        })
    }
}
