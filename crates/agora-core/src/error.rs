//! Error types for `agora-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid vote value: {0} (expected -1, 0 or 1)")]
  InvalidVoteValue(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
