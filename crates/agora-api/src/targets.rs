//! Read-only views of voteable targets.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/threads/:thread_id` | 404 if not found |
//! | `GET`  | `/posts/:post_id` | 404 if not found |

use std::sync::Arc;

use agora_core::{
  store::VoteBackend,
  vote::{TargetKind, VoteableAggregate},
};
use axum::{
  Json,
  extract::{Path, State, rejection::PathRejection},
};
use uuid::Uuid;

use crate::{VoteEngines, error::ApiError};

async fn get_one<B: VoteBackend>(
  engines: &VoteEngines<B>,
  kind: TargetKind,
  id: Uuid,
) -> Result<Json<VoteableAggregate>, ApiError> {
  Ok(Json(engines.get(kind).target(id).await?))
}

/// `GET /threads/:thread_id`
pub async fn get_thread<B: VoteBackend>(
  State(engines): State<Arc<VoteEngines<B>>>,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<VoteableAggregate>, ApiError> {
  let Path(id) = path?;
  get_one(&engines, TargetKind::Thread, id).await
}

/// `GET /posts/:post_id`
pub async fn get_post<B: VoteBackend>(
  State(engines): State<Arc<VoteEngines<B>>>,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<VoteableAggregate>, ApiError> {
  let Path(id) = path?;
  get_one(&engines, TargetKind::Post, id).await
}
