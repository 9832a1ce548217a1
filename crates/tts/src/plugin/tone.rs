//! Reference engine rendering each word as a short tone burst
//!
//! Produces real s16le PCM without any model, which makes it useful for
//! wiring up clients and for exercising the streaming path end to end.

use std::f32::consts::PI;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use murmur_config::EngineOptions;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::parse_options;
use crate::engine::{SAMPLE_RATE, SessionCallbacks, StopReason, SynthesisEngine, Utterance, spawn_session};
use crate::error::{Result, TtsError};
use crate::registry::TtsPlugin;

const PLUGIN_KEY: &str = "tone";

/// Peak amplitude as a fraction of full scale
const AMPLITUDE: f32 = 0.3;
/// Linear fade at both ends of a burst, in milliseconds
const FADE_MS: u32 = 5;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToneOptions {
    lang_code: String,
    #[serde(default = "default_sample_rate")]
    sample_rate: u32,
    /// Tone length for one word at speed 1.0
    #[serde(default = "default_word_ms")]
    word_ms: u32,
    /// Silence after each word at speed 1.0
    #[serde(default = "default_gap_ms")]
    gap_ms: u32,
    /// Pause between chunks, to mimic a realtime engine
    #[serde(default)]
    chunk_delay_ms: u64,
}

fn default_sample_rate() -> u32 {
    SAMPLE_RATE
}

fn default_word_ms() -> u32 {
    180
}

fn default_gap_ms() -> u32 {
    40
}

/// Registers the tone engine under `tone`
#[derive(Debug, Clone, Copy, Default)]
pub struct TonePlugin;

impl TtsPlugin for TonePlugin {
    fn key(&self) -> &'static str {
        PLUGIN_KEY
    }

    fn build_engine(&self, options: &EngineOptions) -> Result<Arc<dyn SynthesisEngine>> {
        let options: ToneOptions = parse_options(PLUGIN_KEY, options)?;

        if options.sample_rate == 0 || options.word_ms == 0 {
            return Err(TtsError::InvalidOptions {
                plugin: PLUGIN_KEY.to_string(),
                message: "sample_rate and word_ms must be greater than zero".to_string(),
            });
        }

        tracing::debug!(lang = %options.lang_code, sample_rate = options.sample_rate, "tone engine ready");

        Ok(Arc::new(ToneEngine { options }))
    }
}

/// Language-bound tone engine
#[derive(Debug)]
pub struct ToneEngine {
    options: ToneOptions,
}

impl SynthesisEngine for ToneEngine {
    fn language(&self) -> &str {
        &self.options.lang_code
    }

    fn sample_rate(&self) -> u32 {
        self.options.sample_rate
    }

    fn start(&self, utterance: Utterance, mut callbacks: SessionCallbacks, cancel: CancellationToken) -> Result<()> {
        let options = self.options.clone();
        let base_hz = voice_pitch(&utterance.voice);
        let chunk_delay = Duration::from_millis(options.chunk_delay_ms);

        spawn_session(format!("tone-{}", options.lang_code), move || {
            for word in utterance.text.split_whitespace() {
                if cancel.is_cancelled() {
                    callbacks.stop(StopReason::Cancelled);
                    return;
                }

                let samples = render_word(&options, word, base_hz, utterance.speed);
                callbacks.chunk(encode_pcm(&samples));

                if !chunk_delay.is_zero() {
                    std::thread::sleep(chunk_delay);
                }
            }

            callbacks.stop(StopReason::Finished);
        })
    }
}

/// Base pitch for a voice, stable across runs (FNV-1a over the name)
fn voice_pitch(voice: &str) -> f32 {
    let hash = voice
        .bytes()
        .fold(0x811c_9dc5_u32, |hash, byte| (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193));

    // 110 Hz to 329 Hz
    110.0 + f32::from(u16::try_from(hash % 220).unwrap_or_default())
}

/// Samples for one word followed by its trailing gap
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn render_word(options: &ToneOptions, word: &str, base_hz: f32, speed: f32) -> Vec<i16> {
    let rate = options.sample_rate as f32;
    let samples_for = |ms: u32| ((rate * ms as f32 / 1000.0) / speed).round() as usize;

    let tone_len = samples_for(options.word_ms).max(1);
    let gap_len = samples_for(options.gap_ms);
    let fade_len = ((rate * FADE_MS as f32 / 1000.0) as usize).min(tone_len / 2).max(1);

    // Longer words sit a little higher
    let freq = base_hz * (1.0 + (word.chars().count() % 8) as f32 / 16.0);

    let mut samples = Vec::with_capacity(tone_len + gap_len);
    for i in 0..tone_len {
        let t = i as f32 / rate;
        let envelope = (i.min(tone_len - 1 - i) as f32 / fade_len as f32).min(1.0);
        let amplitude = (2.0 * PI * freq * t).sin() * AMPLITUDE * envelope;
        samples.push((amplitude * f32::from(i16::MAX)) as i16);
    }
    samples.resize(tone_len + gap_len, 0);

    samples
}

fn encode_pcm(samples: &[i16]) -> Bytes {
    samples
        .iter()
        .flat_map(|sample| sample.to_le_bytes())
        .collect::<Vec<u8>>()
        .into()
}
