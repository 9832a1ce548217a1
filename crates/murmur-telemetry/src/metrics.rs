//! Metric names and instrument helpers
//!
//! Instruments come from the global meter provider, which is a no-op until
//! [`crate::init`] installs an exporter.

use std::time::Instant;

use opentelemetry::metrics::{Histogram, Meter};

/// Instrumentation scope for every murmur instrument
pub const METER_NAME: &str = "murmur";

// Streaming synthesis
pub const TTS_TIME_TO_FIRST_CHUNK: &str = "tts.stream.time_to_first_chunk";
pub const TTS_STREAM_DURATION: &str = "tts.stream.duration";
pub const TTS_STREAM_BYTES: &str = "tts.stream.bytes";
pub const TTS_STREAM_COUNT: &str = "tts.stream.count";

// Engine pool
pub const TTS_ENGINE_CONSTRUCTION_DURATION: &str = "tts.engine.construction.duration";
pub const TTS_ENGINE_CONSTRUCTION_COUNT: &str = "tts.engine.construction.count";

/// Meter used for all murmur instruments
pub fn meter() -> Meter {
    opentelemetry::global::meter(METER_NAME)
}

/// Record seconds elapsed since `start` on a histogram
pub fn record_duration(histogram: &Histogram<f64>, start: Instant, attributes: &[opentelemetry::KeyValue]) {
    histogram.record(start.elapsed().as_secs_f64(), attributes);
}
