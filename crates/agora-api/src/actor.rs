//! The authenticated actor, as handed to the API by the embedding server.
//!
//! Credential validation happens upstream; the server inserts an [`ActorId`]
//! into the request extensions once it has identified the caller.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

/// Opaque identity of the user casting a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorId(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for ActorId {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<ActorId>()
      .copied()
      .ok_or(ApiError::Unauthorized)
  }
}
