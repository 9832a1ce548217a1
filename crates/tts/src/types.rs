use axum::{
    body::Body,
    response::{IntoResponse, Response},
};
use http::{HeaderName, HeaderValue, header};
use serde::Serialize;

use crate::bridge::AudioStream;
use crate::engine::{AUDIO_CHANNELS, AUDIO_CODEC};

pub const AUDIO_PCM: &str = "audio/pcm";

pub static X_AUDIO_SAMPLE_RATE: HeaderName = HeaderName::from_static("x-audio-sample-rate");
pub static X_AUDIO_CODEC: HeaderName = HeaderName::from_static("x-audio-codec");
pub static X_AUDIO_CHANNELS: HeaderName = HeaderName::from_static("x-audio-channels");

/// Values applied when a request omits `voice` or `lang`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechDefaults {
    pub voice: String,
    pub lang: String,
}

/// Body of `GET /tts/engines`
#[derive(Debug, Serialize)]
pub struct EnginesResponse {
    /// Plugin used to build language engines
    pub backend: String,
    /// Every registered plugin, in registration order
    pub plugins: Vec<&'static str>,
    /// Languages with a constructed engine
    pub loaded_languages: Vec<String>,
}

/// Streams the audio as a chunked `audio/pcm` response
///
/// An error from the stream aborts the body; the status line has already been
/// sent by then.
impl IntoResponse for AudioStream {
    fn into_response(self) -> Response {
        let headers = [
            (header::CONTENT_TYPE, HeaderValue::from_static(AUDIO_PCM)),
            (X_AUDIO_SAMPLE_RATE.clone(), HeaderValue::from(self.sample_rate)),
            (X_AUDIO_CODEC.clone(), HeaderValue::from_static(AUDIO_CODEC)),
            (X_AUDIO_CHANNELS.clone(), HeaderValue::from(AUDIO_CHANNELS)),
        ];

        (headers, Body::from_stream(self.chunks)).into_response()
    }
}
