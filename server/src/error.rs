use std::{error::Error, fmt, path::PathBuf};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use machine_learning::MlErr;
use serde_json::json;

/// Reasons the service refuses to start.
#[derive(Debug)]
pub enum StartupError {
    /// An environment variable holds an unusable value.
    InvalidConfig(String),
    /// Nothing exists at the configured artifact path.
    ArtifactNotFound(PathBuf),
    /// The artifact exists but cannot be read, decoded or validated.
    Artifact { path: PathBuf, source: MlErr },
    /// The artifact was trained on a feature the request schema lacks.
    UnknownFeature(String),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::ArtifactNotFound(path) => write!(
                f,
                "model artifact not found at {}, run the trainer first",
                path.display()
            ),
            Self::Artifact { path, source } => {
                write!(f, "invalid model artifact at {}: {source}", path.display())
            }
            Self::UnknownFeature(name) => {
                write!(f, "the artifact expects unknown feature '{name}'")
            }
        }
    }
}

impl Error for StartupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Artifact { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Per-request failures, rendered as `{"error": true, "message": ...}`.
#[derive(Debug)]
pub enum ApiError {
    /// The body is not JSON.
    BadRequest(String),
    /// The body is JSON but does not match the feature schema.
    Validation(String),
    /// The model could not produce predictions.
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest(msg) => write!(f, "bad request: {msg}"),
            Self::Validation(msg) => write!(f, "validation error: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::BadRequest(msg) | Self::Validation(msg) => msg,
            Self::Internal(msg) => {
                error!("prediction failed: {msg}");
                "prediction failed, check the server logs".to_string()
            }
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}
