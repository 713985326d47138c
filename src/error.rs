use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Central error type for the hub
///
/// Unknown series are not errors: queries for them return empty results.
#[derive(Debug, Error)]
pub enum HubError {
    /// missing or malformed submission fields, nothing was mutated
    #[error("validation error: {0}")]
    Validation(String),

    /// the reading log could not be read or written
    #[error("storage error: {0}")]
    Storage(String),
}

impl HubError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            HubError::Validation(_) => StatusCode::BAD_REQUEST,
            HubError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for HubError {
    fn from(err: rusqlite::Error) -> Self {
        HubError::Storage(err.to_string())
    }
}

impl From<tokio::task::JoinError> for HubError {
    fn from(err: tokio::task::JoinError) -> Self {
        HubError::Storage(format!("storage task failed: {}", err))
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "status": "error",
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub type HubResult<T> = Result<T, HubError>;
