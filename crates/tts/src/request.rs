use axum::extract::{FromRequestParts, Query};
use serde::Deserialize;

use crate::engine::Utterance;
use crate::error::TtsError;
use crate::types::SpeechDefaults;

/// Accepted range for the `speed` multiplier
pub const SPEED_RANGE: std::ops::RangeInclusive<f32> = 0.5..=2.0;

/// Query parameters of `GET /tts`
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechParams {
    /// Text to synthesize
    pub text: String,
    /// Voice identifier (e.g. "af_heart"); falls back to the configured default
    pub voice: Option<String>,
    /// Language code (e.g. "a" for American English); falls back to the configured default
    pub lang: Option<String>,
    /// Speech speed multiplier (0.5 to 2.0)
    pub speed: Option<f32>,
}

impl SpeechParams {
    /// Validate the parameters and fill in defaults
    pub fn into_utterance(self, defaults: &SpeechDefaults) -> Result<Utterance, TtsError> {
        if self.text.is_empty() {
            return Err(TtsError::InvalidParameter("text must not be empty".to_string()));
        }

        let voice = self.voice.unwrap_or_else(|| defaults.voice.clone());
        if voice.is_empty() {
            return Err(TtsError::InvalidParameter("voice must not be empty".to_string()));
        }

        let lang = self.lang.unwrap_or_else(|| defaults.lang.clone());
        if lang.is_empty() {
            return Err(TtsError::InvalidParameter("lang must not be empty".to_string()));
        }

        let speed = self.speed.unwrap_or(1.0);
        // NaN falls outside every range
        if !SPEED_RANGE.contains(&speed) {
            return Err(TtsError::InvalidParameter(format!(
                "speed must be between {} and {}, got {speed}",
                SPEED_RANGE.start(),
                SPEED_RANGE.end()
            )));
        }

        Ok(Utterance {
            text: self.text,
            voice,
            lang,
            speed,
        })
    }
}

/// Extractor for speech query parameters
///
/// Rejections are reported as [`TtsError::InvalidParameter`] so every client
/// error shares the JSON error shape.
pub struct ExtractSpeech(pub SpeechParams);

impl<S> FromRequestParts<S> for ExtractSpeech
where
    S: Send + Sync,
{
    type Rejection = TtsError;

    async fn from_request_parts(parts: &mut http::request::Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<SpeechParams>::try_from_uri(&parts.uri)
            .map_err(|rejection| TtsError::InvalidParameter(rejection.body_text()))?;

        Ok(Self(params))
    }
}
