//! Callback-driven sessions exposed as async audio streams
//!
//! Engines push chunks from their own worker thread through
//! [`SessionCallbacks`]. The bridge feeds those into a request-scoped
//! unbounded channel and a completion latch, and the consumer side drains the
//! channel with a bounded wait so a missed wakeup can never stall it.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use async_stream::stream;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use murmur_telemetry::{Counter, Histogram, KeyValue, metrics};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::engine::{SessionCallbacks, StopReason, Utterance};
use crate::error::{Result, TtsError};
use crate::pool::EnginePool;

/// Timing knobs for draining a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Longest single wait for a chunk before re-checking the latch
    pub poll_interval: Duration,
    /// Silence after which the session is cancelled
    pub idle_timeout: Duration,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

/// PCM produced for one utterance
pub struct AudioStream {
    /// Sample rate of the engine producing the chunks
    pub sample_rate: u32,
    /// Chunks in production order; an `Err` is always the final item
    pub chunks: BoxStream<'static, Result<Bytes>>,
}

impl std::fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioStream")
            .field("sample_rate", &self.sample_rate)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
struct StreamMetrics {
    time_to_first_chunk: Histogram<f64>,
    duration: Histogram<f64>,
    bytes: Counter<u64>,
    count: Counter<u64>,
}

impl StreamMetrics {
    fn new() -> Self {
        let meter = metrics::meter();

        Self {
            time_to_first_chunk: meter
                .f64_histogram(metrics::TTS_TIME_TO_FIRST_CHUNK)
                .with_unit("s")
                .build(),
            duration: meter.f64_histogram(metrics::TTS_STREAM_DURATION).with_unit("s").build(),
            bytes: meter.u64_counter(metrics::TTS_STREAM_BYTES).with_unit("By").build(),
            count: meter.u64_counter(metrics::TTS_STREAM_COUNT).build(),
        }
    }
}

/// Turns engine sessions into [`AudioStream`]s
pub struct StreamingBridge {
    pool: Arc<EnginePool>,
    options: BridgeOptions,
    metrics: StreamMetrics,
}

impl StreamingBridge {
    pub fn new(pool: Arc<EnginePool>, options: BridgeOptions) -> Self {
        Self {
            pool,
            options,
            metrics: StreamMetrics::new(),
        }
    }

    pub fn options(&self) -> BridgeOptions {
        self.options
    }

    /// Start synthesizing `utterance` and return its audio as a stream
    ///
    /// Engine lookup and session start happen before this returns, so their
    /// failures surface here rather than inside the stream. Dropping the
    /// returned stream cancels the session.
    pub async fn synthesize_stream(&self, utterance: Utterance) -> Result<AudioStream> {
        let engine = self.pool.get_or_create(&utterance.lang).await?;
        let sample_rate = engine.sample_rate();
        let lang = utterance.lang.clone();

        let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
        let completion = Arc::new(OnceLock::<StopReason>::new());
        let cancel = CancellationToken::new();

        let latch = Arc::clone(&completion);
        let callbacks = SessionCallbacks::new(
            move |chunk| {
                // Receiver gone means the client went away; the session sees the token
                let _ = tx.send(chunk);
            },
            move |reason| {
                let _ = latch.set(reason);
            },
        );

        engine.start(utterance, callbacks, cancel.clone())?;

        tracing::debug!(lang = %lang, "synthesis session started");

        let options = self.options;
        let instruments = self.metrics.clone();

        // Armed before the first poll so an unpolled stream still cancels
        let cancel_on_drop = cancel.clone().drop_guard();

        let chunks = stream! {
            let _cancel_on_drop = cancel_on_drop;

            let started = Instant::now();
            let mut last_activity = started;
            let mut first_chunk = true;
            let mut streamed: u64 = 0;
            let mut outcome = "finished";

            loop {
                // Chunks are enqueued before the latch is set, so an empty
                // queue after the latch means everything was delivered
                let finished = completion.get().cloned().filter(|_| rx.is_empty());
                if let Some(reason) = finished {
                    match reason {
                        StopReason::Finished => {}
                        StopReason::Cancelled => outcome = "cancelled",
                        StopReason::Failed(message) => {
                            outcome = "failed";
                            tracing::warn!(lang = %lang, "synthesis session failed: {message}");
                            yield Err(TtsError::Synthesis(message));
                        }
                    }
                    break;
                }

                match tokio::time::timeout(options.poll_interval, rx.recv()).await {
                    Ok(Some(chunk)) => {
                        if first_chunk {
                            first_chunk = false;
                            metrics::record_duration(
                                &instruments.time_to_first_chunk,
                                started,
                                &[KeyValue::new("lang", lang.clone())],
                            );
                        }
                        streamed += chunk.len() as u64;
                        last_activity = Instant::now();
                        yield Ok(chunk);
                    }
                    Ok(None) => {
                        if completion.get().is_some() {
                            continue;
                        }
                        outcome = "aborted";
                        tracing::warn!(lang = %lang, "synthesis session dropped its callbacks without stopping");
                        yield Err(TtsError::Synthesis(
                            "session ended without signalling completion".to_string(),
                        ));
                        break;
                    }
                    Err(_) => {
                        if last_activity.elapsed() >= options.idle_timeout {
                            outcome = "timeout";
                            cancel.cancel();
                            tracing::warn!(lang = %lang, "synthesis session idle for {:?}, cancelling", options.idle_timeout);
                            yield Err(TtsError::SessionTimeout(options.idle_timeout));
                            break;
                        }
                    }
                }
            }

            let attributes = [KeyValue::new("lang", lang.clone()), KeyValue::new("outcome", outcome)];
            metrics::record_duration(&instruments.duration, started, &attributes);
            instruments.bytes.add(streamed, &attributes);
            instruments.count.add(1, &attributes);

            tracing::debug!(lang = %lang, bytes = streamed, outcome, "synthesis stream ended");
        };

        Ok(AudioStream {
            sample_rate,
            chunks: Box::pin(chunks),
        })
    }
}

impl std::fmt::Debug for StreamingBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingBridge")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
