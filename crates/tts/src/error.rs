use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TtsError>;

/// Synthesis service errors with appropriate HTTP status codes
#[derive(Debug, Error)]
pub enum TtsError {
    /// Missing, malformed or out-of-range request parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// No plugin registered under the requested name
    #[error("Engine '{name}' not found, available engines: [{}]", .available.join(", "))]
    PluginNotFound { name: String, available: Vec<String> },

    /// A plugin with the same key is already registered
    #[error("Engine '{0}' is already registered")]
    DuplicatePlugin(String),

    /// Plugin options could not be interpreted
    #[error("Invalid options for engine '{plugin}': {message}")]
    InvalidOptions { plugin: String, message: String },

    /// Service configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A language engine could not be built
    #[error("Failed to construct engine for language '{lang}': {message}")]
    EngineConstruction { lang: String, message: String },

    /// The engine refused to start a synthesis session
    #[error("Failed to start synthesis session: {0}")]
    SessionStart(String),

    /// The session failed while producing audio
    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    /// The session produced nothing for longer than the idle timeout
    #[error("Synthesis session produced no audio for {0:?}")]
    SessionTimeout(Duration),
}

impl TtsError {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidParameter(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PluginNotFound { .. } => StatusCode::NOT_FOUND,
            Self::DuplicatePlugin(_)
            | Self::InvalidOptions { .. }
            | Self::Config(_)
            | Self::EngineConstruction { .. }
            | Self::SessionStart(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Synthesis(_) => StatusCode::BAD_GATEWAY,
            Self::SessionTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Get the error type string for the response
    pub fn error_type(&self) -> &str {
        match self {
            Self::InvalidParameter(_) => "invalid_request_error",
            Self::PluginNotFound { .. } => "not_found_error",
            Self::DuplicatePlugin(_) | Self::InvalidOptions { .. } | Self::Config(_) => "internal_error",
            Self::EngineConstruction { .. } | Self::SessionStart(_) | Self::Synthesis(_) | Self::SessionTimeout(_) => {
                "engine_error"
            }
        }
    }

    /// Message that is safe to expose to API consumers
    pub fn client_message(&self) -> String {
        match self {
            Self::DuplicatePlugin(_) | Self::Config(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetails,
}

#[derive(Debug, Serialize)]
struct ErrorDetails {
    message: String,
    r#type: String,
    code: u16,
}

impl IntoResponse for TtsError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("TTS request failed: {self}");
        } else {
            tracing::debug!("TTS request rejected: {self}");
        }

        let error_response = ErrorResponse {
            error: ErrorDetails {
                message: self.client_message(),
                r#type: self.error_type().to_string(),
                code: status.as_u16(),
            },
        };

        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_not_found_lists_available_engines() {
        let err = TtsError::PluginNotFound {
            name: "doesnotexist".to_string(),
            available: vec!["tone".to_string(), "command".to_string()],
        };

        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            err.to_string(),
            "Engine 'doesnotexist' not found, available engines: [tone, command]"
        );
    }

    #[test]
    fn invalid_parameter_is_unprocessable() {
        let err = TtsError::InvalidParameter("speed out of range".to_string());
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.error_type(), "invalid_request_error");
    }

    #[test]
    fn config_errors_do_not_leak() {
        let err = TtsError::Config("secret path /etc/murmur".to_string());
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn construction_failure_is_server_error() {
        let err = TtsError::EngineConstruction {
            lang: "z".to_string(),
            message: "model weights missing".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.client_message().contains("model weights missing"));
    }
}
