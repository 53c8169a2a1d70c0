//! Vote ledger and aggregate types.
//!
//! A [`VoteRecord`] is one actor's current opinion on one target. Only
//! non-neutral values are ever persisted: the absence of a record *is* a
//! neutral vote. A [`VoteableAggregate`] carries the denormalised running
//! `vote_count`, which must always equal the sum of the live records for that
//! target.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

// ─── VoteValue ───────────────────────────────────────────────────────────────

/// A requested or stored vote. Serialises as the bare integer `-1`, `0` or `1`.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub enum VoteValue {
  Down,
  #[default]
  Neutral,
  Up,
}

impl VoteValue {
  pub fn as_i64(self) -> i64 {
    match self {
      Self::Down => -1,
      Self::Neutral => 0,
      Self::Up => 1,
    }
  }

  pub fn is_neutral(self) -> bool { matches!(self, Self::Neutral) }

  /// The signed change in a target's `vote_count` when an actor moves from
  /// `self` to `requested`.
  pub fn delta_to(self, requested: VoteValue) -> i64 {
    requested.as_i64() - self.as_i64()
  }
}

impl TryFrom<i64> for VoteValue {
  type Error = Error;

  fn try_from(raw: i64) -> Result<Self, Self::Error> {
    match raw {
      -1 => Ok(Self::Down),
      0 => Ok(Self::Neutral),
      1 => Ok(Self::Up),
      other => Err(Error::InvalidVoteValue(other)),
    }
  }
}

impl From<VoteValue> for i64 {
  fn from(v: VoteValue) -> Self { v.as_i64() }
}

impl fmt::Display for VoteValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_i64())
  }
}

// ─── TargetKind ──────────────────────────────────────────────────────────────

/// The kind of entity a vote is cast on. The ledger is partitioned by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
  Thread,
  Post,
}

impl TargetKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Thread => "thread",
      Self::Post => "post",
    }
  }
}

impl fmt::Display for TargetKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// One actor's current vote on one target.
///
/// At most one record exists per `(actor_id, target_id, target_kind)`; the
/// store enforces this with upsert semantics. A persisted record's `value` is
/// never [`VoteValue::Neutral`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
  pub actor_id:    Uuid,
  pub target_id:   Uuid,
  pub target_kind: TargetKind,
  pub value:       VoteValue,
  /// Timestamp of the last mutation to this record.
  pub recorded_at: DateTime<Utc>,
}

/// The voteable side of a thread or post.
///
/// Identity and content belong to the thread/post subsystem; vote accounting
/// only ever mutates `vote_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteableAggregate {
  pub id:         Uuid,
  pub kind:       TargetKind,
  /// Always `false` for posts. Not enforced by the vote path.
  pub is_locked:  bool,
  pub vote_count: i64,
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// What happened to the ledger row during a successful cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerChange {
  /// Requested value equalled the current one; nothing was written.
  Unchanged,
  Created,
  Updated,
  Retracted,
}

/// The result of a successful vote cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOutcome {
  pub change: LedgerChange,
  /// Signed adjustment applied to the target's `vote_count`.
  pub delta:  i64,
  /// The actor's vote after the cast.
  pub value:  VoteValue,
}
