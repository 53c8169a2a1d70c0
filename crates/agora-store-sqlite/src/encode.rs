//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings. Vote values are stored as `-1` or `1`.

use agora_core::vote::{TargetKind, VoteRecord, VoteValue, VoteableAggregate};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── VoteValue ───────────────────────────────────────────────────────────────

pub fn decode_vote_value(v: i64) -> Result<VoteValue> {
  Ok(VoteValue::try_from(v)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `*_votes` row.
pub struct RawVote {
  pub actor_id:    String,
  pub target_id:   String,
  pub value:       i64,
  pub recorded_at: String,
}

impl RawVote {
  pub fn into_record(self, kind: TargetKind) -> Result<VoteRecord> {
    Ok(VoteRecord {
      actor_id:    decode_uuid(&self.actor_id)?,
      target_id:   decode_uuid(&self.target_id)?,
      target_kind: kind,
      value:       decode_vote_value(self.value)?,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

/// Raw values read from a `threads` or `posts` row.
pub struct RawAggregate {
  pub id:         String,
  pub is_locked:  bool,
  pub vote_count: i64,
}

impl RawAggregate {
  pub fn into_aggregate(self, kind: TargetKind) -> Result<VoteableAggregate> {
    Ok(VoteableAggregate {
      id: decode_uuid(&self.id)?,
      kind,
      is_locked: self.is_locked,
      vote_count: self.vote_count,
    })
  }
}
