//! Errors surfaced at the REST and request-parsing boundary.
//!
//! Store services use `anyhow` internally and report "soft" failures as absent
//! values; only this boundary turns outcomes into status-coded errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::reference::ReferenceError;

/// Status-coded failure returned to REST callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct DiscussionServerError {
    pub status: u16,
    pub message: String,
}

impl DiscussionServerError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST.as_u16(), message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND.as_u16(), message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR.as_u16(), message)
    }

    pub fn discussion_not_found(reference: impl std::fmt::Display) -> Self {
        Self::not_found(format!("Discussion with reference=[{}] not found.", reference))
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<ReferenceError> for DiscussionServerError {
    fn from(err: ReferenceError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl IntoResponse for DiscussionServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, axum::Json(self)).into_response()
    }
}

pub type ServerResult<T> = std::result::Result<T, DiscussionServerError>;
