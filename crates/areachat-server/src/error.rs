use areachat::errors::ChatError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

const ENV_PREFIX: &str = "AREACHAT";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Map a dotted configuration key to the environment variable that sets it
pub fn to_env_var(field_path: &str) -> String {
    let path = field_path
        .split('.')
        .filter(|part| !part.is_empty())
        .map(|part| part.to_uppercase())
        .collect::<Vec<_>>()
        .join("__");
    format!("{}_{}", ENV_PREFIX, path)
}

/// Error returned to HTTP callers as `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        if err.is_client_error() {
            return ApiError::bad_request(match err {
                ChatError::InvalidRequest(reason) => reason,
                other => other.to_string(),
            });
        }
        match &err {
            ChatError::Provider(provider) if provider.is_authentication() => {
                tracing::error!("model API rejected credentials: {}", err);
                ApiError {
                    status: StatusCode::UNAUTHORIZED,
                    message: "No autorizado: revisa la clave de la API del modelo".to_string(),
                }
            }
            _ => {
                tracing::error!("chat request failed: {}", err);
                ApiError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "Error procesando la solicitud del chat".to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
