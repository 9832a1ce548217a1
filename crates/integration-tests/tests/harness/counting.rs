//! Plugin wrapper that counts engine constructions

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use murmur_config::EngineOptions;
use tts::plugin::tone::TonePlugin;
use tts::{PluginRegistry, SynthesisEngine, TtsPlugin};

/// Builds tone engines under the key `counting`, optionally slowly
#[derive(Clone, Default)]
pub struct CountingPlugin {
    builds: Arc<AtomicUsize>,
    delay: Duration,
}

impl CountingPlugin {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Number of engines built so far
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Built-in registry plus this plugin
    pub fn registry(&self) -> PluginRegistry {
        let mut registry = PluginRegistry::builtin();
        registry.register(self.clone()).expect("counting plugin registers once");
        registry
    }
}

impl TtsPlugin for CountingPlugin {
    fn key(&self) -> &'static str {
        "counting"
    }

    fn build_engine(&self, options: &EngineOptions) -> tts::Result<Arc<dyn SynthesisEngine>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        TonePlugin.build_engine(options)
    }
}
