//! Contract between the streaming bridge and synthesis backends
//!
//! An engine is bound to one language at construction and is shared by every
//! request for that language. Each request starts its own session: the engine
//! produces audio on a thread of its own and reports back through
//! [`SessionCallbacks`].

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TtsError};

/// Output sample rate every built-in engine defaults to
pub const SAMPLE_RATE: u32 = 24_000;
/// Signed 16-bit little-endian PCM
pub const AUDIO_CODEC: &str = "s16le";
pub const AUDIO_CHANNELS: u16 = 1;
/// Size of one mono s16le frame
pub const BYTES_PER_FRAME: usize = 2;

/// One synthesis request after validation
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// Engine-specific voice identifier; must suit `lang`
    pub voice: String,
    pub lang: String,
    /// Playback rate multiplier
    pub speed: f32,
}

/// Why a session stopped producing audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// All audio for the utterance was produced
    Finished,
    /// The session observed its cancellation token
    Cancelled,
    /// The session gave up; the message is reported to the client
    Failed(String),
}

type ChunkCallback = Box<dyn FnMut(Bytes) + Send>;
type StopCallback = Box<dyn FnOnce(StopReason) + Send>;

/// Callbacks a session reports through
///
/// `stop` consumes the callbacks, so a session can signal completion at most
/// once and can no longer produce chunks afterwards. Dropping the callbacks
/// without calling `stop` is observed by the bridge as an aborted session.
pub struct SessionCallbacks {
    on_chunk: ChunkCallback,
    on_stop: StopCallback,
}

impl SessionCallbacks {
    pub fn new(
        on_chunk: impl FnMut(Bytes) + Send + 'static,
        on_stop: impl FnOnce(StopReason) + Send + 'static,
    ) -> Self {
        Self {
            on_chunk: Box::new(on_chunk),
            on_stop: Box::new(on_stop),
        }
    }

    /// Hand a chunk of PCM to the consumer
    pub fn chunk(&mut self, audio: Bytes) {
        if !audio.is_empty() {
            (self.on_chunk)(audio);
        }
    }

    /// Signal that the session will produce nothing more
    pub fn stop(self, reason: StopReason) {
        let Self { on_chunk, on_stop } = self;
        on_stop(reason);
        drop(on_chunk);
    }
}

impl std::fmt::Debug for SessionCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCallbacks").finish_non_exhaustive()
    }
}

/// A constructed, language-bound synthesis engine
///
/// Implementations are shared across requests and must tolerate concurrent
/// sessions. `start` must return quickly: synthesis happens on a worker the
/// engine owns, which reports through `callbacks` and checks `cancel`
/// between chunks.
pub trait SynthesisEngine: Send + Sync {
    /// Language code this engine was built for
    fn language(&self) -> &str;

    /// Sample rate of the PCM this engine emits
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    /// Begin synthesizing `utterance`
    ///
    /// # Errors
    ///
    /// Returns an error if the session could not be started. Failures after
    /// a successful start are reported with [`StopReason::Failed`].
    fn start(&self, utterance: Utterance, callbacks: SessionCallbacks, cancel: CancellationToken) -> Result<()>;
}

/// Run a session body on a named worker thread
///
/// # Errors
///
/// Returns [`TtsError::SessionStart`] if the thread cannot be spawned
pub fn spawn_session<F>(name: String, body: F) -> Result<()>
where
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new()
        .name(name)
        .spawn(body)
        .map(drop)
        .map_err(|e| TtsError::SessionStart(format!("failed to spawn synthesis worker: {e}")))
}
