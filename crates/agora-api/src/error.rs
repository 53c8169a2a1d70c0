//! API error type and [`axum::response::IntoResponse`] implementation.

use agora_core::VoteError;
use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("user not authenticated")]
  Unauthorized,

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<VoteError> for ApiError {
  fn from(e: VoteError) -> Self {
    match e {
      VoteError::InvalidVoteValue(_) => {
        ApiError::BadRequest("invalid vote_type, must be 1, 0, or -1".into())
      }
      VoteError::TargetNotFound { kind, .. } => {
        ApiError::NotFound(format!("{kind} not found"))
      }
      VoteError::StorageFailure(e) => ApiError::Store(e),
    }
  }
}

/// Any body that does not decode to a `vote_type` integer is reported the
/// same way as an out-of-range one.
impl From<JsonRejection> for ApiError {
  fn from(e: JsonRejection) -> Self {
    tracing::debug!(error = %e.body_text(), "rejected vote body");
    ApiError::BadRequest("invalid vote_type, must be 1, 0, or -1".into())
  }
}

impl From<PathRejection> for ApiError {
  fn from(e: PathRejection) -> Self {
    tracing::debug!(error = %e.body_text(), "rejected target id");
    ApiError::BadRequest("invalid target id".into())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".into())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
