//! Handlers for the vote endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/threads/:thread_id/vote` | Body: `{"vote_type":1}` (`-1`, `0` or `1`) |
//! | `GET`  | `/threads/:thread_id/vote` | The caller's current vote |
//! | `POST` | `/posts/:post_id/vote` | As for threads |
//! | `GET`  | `/posts/:post_id/vote` | As for threads |

use std::sync::Arc;

use agora_core::{
  store::VoteBackend,
  vote::{TargetKind, VoteOutcome, VoteValue},
};
use axum::{
  Json,
  extract::{
    Path, State,
    rejection::{JsonRejection, PathRejection},
  },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ActorId, VoteEngines, error::ApiError};

// ─── Cast ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VoteBody {
  pub vote_type: i64,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
  pub message: &'static str,
  #[serde(flatten)]
  pub outcome: VoteOutcome,
}

async fn cast<B: VoteBackend>(
  engines: &VoteEngines<B>,
  kind: TargetKind,
  actor: ActorId,
  target_id: Uuid,
  body: VoteBody,
) -> Result<Json<VoteResponse>, ApiError> {
  // Out-of-range values never reach the engine.
  let requested = VoteValue::try_from(body.vote_type).map_err(|_| {
    ApiError::BadRequest("invalid vote_type, must be 1, 0, or -1".into())
  })?;

  let outcome = engines.get(kind).cast(actor.0, target_id, requested).await?;
  Ok(Json(VoteResponse { message: "vote recorded", outcome }))
}

/// `POST /threads/:thread_id/vote`
pub async fn cast_thread<B: VoteBackend>(
  State(engines): State<Arc<VoteEngines<B>>>,
  actor: ActorId,
  path: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<VoteBody>, JsonRejection>,
) -> Result<Json<VoteResponse>, ApiError> {
  let (Path(id), Json(body)) = (path?, body?);
  cast(&engines, TargetKind::Thread, actor, id, body).await
}

/// `POST /posts/:post_id/vote`
pub async fn cast_post<B: VoteBackend>(
  State(engines): State<Arc<VoteEngines<B>>>,
  actor: ActorId,
  path: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<VoteBody>, JsonRejection>,
) -> Result<Json<VoteResponse>, ApiError> {
  let (Path(id), Json(body)) = (path?, body?);
  cast(&engines, TargetKind::Post, actor, id, body).await
}

// ─── Current vote ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CurrentVote {
  pub target_id: Uuid,
  pub kind:      TargetKind,
  pub vote_type: VoteValue,
}

async fn current<B: VoteBackend>(
  engines: &VoteEngines<B>,
  kind: TargetKind,
  actor: ActorId,
  target_id: Uuid,
) -> Result<Json<CurrentVote>, ApiError> {
  let engine = engines.get(kind);
  engine.target(target_id).await?;
  let vote_type = engine.current_vote(actor.0, target_id).await?;
  Ok(Json(CurrentVote { target_id, kind, vote_type }))
}

/// `GET /threads/:thread_id/vote`
pub async fn current_thread<B: VoteBackend>(
  State(engines): State<Arc<VoteEngines<B>>>,
  actor: ActorId,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<CurrentVote>, ApiError> {
  let Path(id) = path?;
  current(&engines, TargetKind::Thread, actor, id).await
}

/// `GET /posts/:post_id/vote`
pub async fn current_post<B: VoteBackend>(
  State(engines): State<Arc<VoteEngines<B>>>,
  actor: ActorId,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<CurrentVote>, ApiError> {
  let Path(id) = path?;
  current(&engines, TargetKind::Post, actor, id).await
}
