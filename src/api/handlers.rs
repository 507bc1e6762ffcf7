pub mod game;
pub mod matchmaking;
pub mod ws;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::domain::error::{GameError, PersistenceError};

/// Error side of the HTTP handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<PersistenceError> for ApiError {
    fn from(e: PersistenceError) -> Self {
        let status = match e {
            PersistenceError::NotFound => StatusCode::NOT_FOUND,
            PersistenceError::Conflict(_) => StatusCode::CONFLICT,
            PersistenceError::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PersistenceError::Unavailable(_) | PersistenceError::Timeout => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<GameError> for ApiError {
    fn from(e: GameError) -> Self {
        match e {
            GameError::Persistence(inner) => inner.into(),
            GameError::GameNotFound(_) | GameError::SessionNotFound(_) => Self::not_found(e.to_string()),
            other => Self::bad_request(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
