//! Process-wide cache of language engines
//!
//! Engines are expensive to build (model load), so each language is
//! constructed at most once and then shared. Lookups of warm languages take a
//! short read lock only; the construction lock is contended on first use of a
//! language alone.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use murmur_telemetry::{Counter, Histogram, KeyValue, metrics};
use tokio::sync::Mutex;

use crate::engine::SynthesisEngine;
use crate::error::{Result, TtsError};

/// Builds the engine for a language
///
/// Called on the blocking thread pool, so implementations may block.
pub trait EngineFactory: Send + Sync {
    fn build(&self, lang: &str) -> Result<Arc<dyn SynthesisEngine>>;
}

impl<F> EngineFactory for F
where
    F: Fn(&str) -> Result<Arc<dyn SynthesisEngine>> + Send + Sync,
{
    fn build(&self, lang: &str) -> Result<Arc<dyn SynthesisEngine>> {
        self(lang)
    }
}

type EngineMap = HashMap<String, Arc<dyn SynthesisEngine>>;

/// Language code to engine mapping with lazy, single construction
pub struct EnginePool {
    state: Arc<PoolState>,
}

struct PoolState {
    engines: RwLock<EngineMap>,
    construction: Mutex<()>,
    factory: Arc<dyn EngineFactory>,
    construction_duration: Histogram<f64>,
    construction_count: Counter<u64>,
}

impl EnginePool {
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        let meter = metrics::meter();

        Self {
            state: Arc::new(PoolState {
                engines: RwLock::new(HashMap::new()),
                construction: Mutex::new(()),
                factory,
                construction_duration: meter
                    .f64_histogram(metrics::TTS_ENGINE_CONSTRUCTION_DURATION)
                    .with_unit("s")
                    .build(),
                construction_count: meter.u64_counter(metrics::TTS_ENGINE_CONSTRUCTION_COUNT).build(),
            }),
        }
    }

    /// Return the engine for `lang`, constructing it on first use
    ///
    /// Concurrent callers racing on the same cold language wait for a single
    /// construction. A failed construction is not cached.
    pub async fn get_or_create(&self, lang: &str) -> Result<Arc<dyn SynthesisEngine>> {
        if let Some(engine) = self.state.cached(lang) {
            return Ok(engine);
        }

        self.load(lang, "engine loaded on first use").await
    }

    /// Eagerly construct engines for `langs`
    ///
    /// Languages already loaded are skipped. Stops at the first failure.
    pub async fn preload<I, S>(&self, langs: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for lang in langs {
            self.load(lang.as_ref(), "engine preloaded").await?;
        }

        Ok(())
    }

    /// Drop every engine, returning how many were loaded
    pub async fn clear(&self) -> usize {
        let _guard = self.state.construction.lock().await;

        let mut engines = self.state.write();
        let count = engines.len();
        engines.clear();
        count
    }

    /// Loaded language codes, sorted
    pub fn languages(&self) -> Vec<String> {
        let mut langs: Vec<String> = self.state.read().keys().cloned().collect();
        langs.sort_unstable();
        langs
    }

    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().is_empty()
    }

    /// Construct and insert `lang` on a detached task
    ///
    /// The task outlives a dropped caller, so a construction that has started
    /// always lands in the pool.
    async fn load(&self, lang: &str, loaded: &'static str) -> Result<Arc<dyn SynthesisEngine>> {
        let state = Arc::clone(&self.state);
        let owned_lang = lang.to_owned();

        tokio::spawn(async move { state.load(&owned_lang, loaded).await })
            .await
            .map_err(|e| TtsError::EngineConstruction {
                lang: lang.to_owned(),
                message: format!("construction task failed: {e}"),
            })?
    }
}

impl PoolState {
    async fn load(&self, lang: &str, loaded: &'static str) -> Result<Arc<dyn SynthesisEngine>> {
        let _guard = self.construction.lock().await;

        // Another caller may have finished constructing while we waited
        if let Some(engine) = self.cached(lang) {
            return Ok(engine);
        }

        let engine = self.construct(lang).await?;
        self.write().insert(lang.to_owned(), Arc::clone(&engine));

        tracing::info!(lang, "{loaded}");

        Ok(engine)
    }

    fn cached(&self, lang: &str) -> Option<Arc<dyn SynthesisEngine>> {
        self.read().get(lang).cloned()
    }

    async fn construct(&self, lang: &str) -> Result<Arc<dyn SynthesisEngine>> {
        tracing::debug!(lang, "constructing engine");

        let factory = Arc::clone(&self.factory);
        let owned_lang = lang.to_owned();
        let start = Instant::now();

        let result = tokio::task::spawn_blocking(move || factory.build(&owned_lang))
            .await
            .map_err(|e| TtsError::EngineConstruction {
                lang: lang.to_owned(),
                message: format!("construction task failed: {e}"),
            })
            .and_then(|built| built.map_err(|e| as_construction_error(lang, e)));

        let outcome = if result.is_ok() { "success" } else { "failure" };
        let attributes = [KeyValue::new("lang", lang.to_owned()), KeyValue::new("outcome", outcome)];
        metrics::record_duration(&self.construction_duration, start, &attributes);
        self.construction_count.add(1, &attributes);

        if let Err(ref e) = result {
            tracing::warn!(lang, "engine construction failed: {e}");
        }

        result
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, EngineMap> {
        self.engines.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, EngineMap> {
        self.engines.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn as_construction_error(lang: &str, error: TtsError) -> TtsError {
    match error {
        TtsError::EngineConstruction { .. } => error,
        other => TtsError::EngineConstruction {
            lang: lang.to_owned(),
            message: other.to_string(),
        },
    }
}

impl std::fmt::Debug for EnginePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnginePool")
            .field("languages", &self.languages())
            .finish_non_exhaustive()
    }
}
