//! Errors surfaced at the controller boundary and their HTTP mapping

use crate::store::StoreError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;

pub type GameResult<T> = Result<T, GameError>;

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("{0}")]
    Validation(String),

    #[error("No players have joined yet")]
    NoPlayers,

    #[error("A round is already in progress")]
    RoundInProgress,

    #[error("Player not found")]
    PlayerNotFound,

    #[error(
        "Store operation timed out after {0:?}. Check the database URL and its access rules."
    )]
    StoreTimeout(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GameError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::NoPlayers => StatusCode::BAD_REQUEST,
            Self::PlayerNotFound => StatusCode::NOT_FOUND,
            Self::RoundInProgress => StatusCode::CONFLICT,
            Self::StoreTimeout(_) | Self::Store(StoreError::Timeout) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Store internals stay in the log
        let message = match self {
            Self::Store(StoreError::Backend(_)) | Self::Store(StoreError::Serialization(_)) => {
                "Internal store error".to_string()
            }
            ref other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Malformed request bodies get the same `{"error": ...}` shape as
/// every other failure
pub fn json_rejection(rejection: JsonRejection) -> Response {
    tracing::warn!("Rejected request body: {}", rejection.body_text());
    (
        rejection.status(),
        Json(json!({ "error": rejection.body_text() })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GameError::Validation("x".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(GameError::NoPlayers.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(GameError::PlayerNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(GameError::RoundInProgress.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            GameError::StoreTimeout(Duration::from_secs(10)).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            GameError::Store(StoreError::Backend("boom".to_string())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_timeout_message_hints_at_configuration() {
        let msg = GameError::StoreTimeout(Duration::from_secs(10)).to_string();
        assert!(msg.contains("timed out"));
        assert!(msg.contains("database URL"));
    }
}
