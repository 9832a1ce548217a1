use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use http::StatusCode;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: String,
    loaded_languages: Vec<String>,
}

/// Health check handler
pub async fn health_handler(State(tts): State<Arc<tts::Server>>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok",
        backend: tts.backend().to_string(),
        loaded_languages: tts.pool().languages(),
    };

    (StatusCode::OK, Json(response))
}
