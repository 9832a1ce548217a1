#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod bridge;
pub mod engine;
mod error;
pub mod plugin;
pub mod pool;
pub mod registry;
mod request;
mod server;
mod types;

use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};

pub use bridge::{AudioStream, BridgeOptions, StreamingBridge};
pub use engine::{SessionCallbacks, StopReason, SynthesisEngine, Utterance};
pub use error::{Result, TtsError};
pub use pool::{EngineFactory, EnginePool};
pub use registry::{PluginEngineFactory, PluginRegistry, TtsPlugin};
pub use request::{SPEED_RANGE, SpeechParams};
pub use server::{Server, TtsServerBuilder};
pub use types::{EnginesResponse, SpeechDefaults};
use request::ExtractSpeech;

/// Build the TTS server with the built-in plugins
pub fn build_server(config: &murmur_config::Config) -> anyhow::Result<Arc<Server>> {
    build_server_with_registry(config, PluginRegistry::builtin())
}

/// Build the TTS server with a caller-supplied plugin registry
pub fn build_server_with_registry(
    config: &murmur_config::Config,
    registry: PluginRegistry,
) -> anyhow::Result<Arc<Server>> {
    let server = Arc::new(
        TtsServerBuilder::new(&config.tts)
            .with_registry(registry)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to initialize TTS server: {e}"))?,
    );
    Ok(server)
}

/// Create the endpoint router for TTS
pub fn endpoint_router() -> Router<Arc<Server>> {
    Router::new()
        .route("/tts", get(synthesize))
        .route("/tts/engines", get(engines))
}

/// Handle streaming speech synthesis requests
async fn synthesize(
    State(server): State<Arc<Server>>,
    ExtractSpeech(params): ExtractSpeech,
) -> Result<axum::response::Response> {
    let utterance = params.into_utterance(server.defaults())?;

    tracing::debug!(
        "TTS stream handler called: lang={}, voice={}, speed={}, {} char(s)",
        utterance.lang,
        utterance.voice,
        utterance.speed,
        utterance.text.chars().count()
    );

    let audio = server.synthesize_stream(utterance).await?;

    Ok(audio.into_response())
}

/// List registered plugins and loaded languages
async fn engines(State(server): State<Arc<Server>>) -> Json<EnginesResponse> {
    Json(server.engines())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        let server = build_server(&murmur_config::Config::default()).unwrap();
        endpoint_router().with_state(server)
    }

    async fn get_uri(uri: &str) -> axum::response::Response {
        app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn streams_pcm() {
        let response = get_uri("/tts?text=hello&lang=a&voice=af_heart&speed=1.0").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-audio-sample-rate"], "24000");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(!body.is_empty());
        assert_eq!(body.len() % 2, 0);
    }

    #[tokio::test]
    async fn out_of_range_speed_is_unprocessable() {
        let response = get_uri("/tts?text=hello&speed=2.01").await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["type"], "invalid_request_error");
        assert_eq!(json["error"]["code"], 422);
    }

    #[tokio::test]
    async fn missing_text_is_unprocessable() {
        let response = get_uri("/tts").await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn engines_endpoint() {
        let response = get_uri("/tts/engines").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["backend"], "tone");
        assert_eq!(json["plugins"], serde_json::json!(["tone", "command"]));
    }
}
