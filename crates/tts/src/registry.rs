//! Named synthesis backends
//!
//! A plugin turns keyword options into a language-bound engine. Plugins are
//! registered explicitly at startup; the configured backend name selects the
//! one used to build every language in the pool.

use std::sync::Arc;

use indexmap::IndexMap;
use murmur_config::EngineOptions;

use crate::engine::SynthesisEngine;
use crate::error::{Result, TtsError};
use crate::plugin::{command::CommandPlugin, tone::TonePlugin};
use crate::pool::EngineFactory;

/// Option key carrying the language an engine is built for
pub const LANG_CODE_OPTION: &str = "lang_code";

/// A synthesis backend that can build engines
pub trait TtsPlugin: Send + Sync {
    /// Registry key, e.g. "tone"
    fn key(&self) -> &'static str;

    /// Build an engine from keyword options
    ///
    /// The options always contain [`LANG_CODE_OPTION`] when called through
    /// [`PluginEngineFactory`].
    fn build_engine(&self, options: &EngineOptions) -> Result<Arc<dyn SynthesisEngine>>;
}

/// Plugins by key, in registration order
#[derive(Default)]
pub struct PluginRegistry {
    plugins: IndexMap<&'static str, Box<dyn TtsPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in plugin
    pub fn builtin() -> Self {
        let plugins: [Box<dyn TtsPlugin>; 2] = [Box::new(TonePlugin), Box::new(CommandPlugin)];

        Self {
            plugins: plugins.into_iter().map(|plugin| (plugin.key(), plugin)).collect(),
        }
    }

    /// Add a plugin under its key
    pub fn register(&mut self, plugin: impl TtsPlugin + 'static) -> Result<()> {
        let key = plugin.key();

        if self.plugins.contains_key(key) {
            return Err(TtsError::DuplicatePlugin(key.to_string()));
        }

        tracing::debug!("Registered TTS engine plugin: {key}");
        self.plugins.insert(key, Box::new(plugin));

        Ok(())
    }

    /// Registered keys in registration order
    pub fn engines(&self) -> Vec<&'static str> {
        self.plugins.keys().copied().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Build an engine with the plugin registered as `name`
    pub fn create(&self, name: &str, options: &EngineOptions) -> Result<Arc<dyn SynthesisEngine>> {
        let plugin = self.plugins.get(name).ok_or_else(|| TtsError::PluginNotFound {
            name: name.to_string(),
            available: self.engines().into_iter().map(str::to_string).collect(),
        })?;

        plugin.build_engine(options)
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("engines", &self.engines())
            .finish()
    }
}

/// Pool factory building every language with one configured plugin
pub struct PluginEngineFactory {
    registry: Arc<PluginRegistry>,
    backend: String,
    options: EngineOptions,
}

impl PluginEngineFactory {
    pub fn new(registry: Arc<PluginRegistry>, backend: impl Into<String>, options: EngineOptions) -> Self {
        Self {
            registry,
            backend: backend.into(),
            options,
        }
    }
}

impl EngineFactory for PluginEngineFactory {
    fn build(&self, lang: &str) -> Result<Arc<dyn SynthesisEngine>> {
        let mut options = self.options.clone();
        options.insert(LANG_CODE_OPTION.to_string(), lang.into());

        self.registry.create(&self.backend, &options)
    }
}
