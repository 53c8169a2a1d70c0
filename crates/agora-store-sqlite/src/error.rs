//! Error type for `agora-store-sqlite`.

use agora_core::vote::TargetKind;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] agora_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// The target row disappeared between the existence check and commit.
  #[error("{kind} not found: {id}")]
  TargetNotFound { kind: TargetKind, id: Uuid },

  /// The actor's live vote no longer matches the value the caller read.
  #[error("vote by {actor_id} on {target_id} changed concurrently")]
  StaleVote { actor_id: Uuid, target_id: Uuid },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
