//! SQL schema for the Agora SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

use agora_core::vote::TargetKind;

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS threads (
    thread_id   TEXT PRIMARY KEY,
    author_id   TEXT NOT NULL,
    title       TEXT NOT NULL,
    is_locked   INTEGER NOT NULL DEFAULT 0,
    vote_count  INTEGER NOT NULL DEFAULT 0,   -- denormalised SUM(thread_votes.value)
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS posts (
    post_id         TEXT PRIMARY KEY,
    thread_id       TEXT NOT NULL REFERENCES threads(thread_id) ON DELETE CASCADE,
    parent_post_id  TEXT,                     -- not checked for existence
    author_id       TEXT NOT NULL,
    content         TEXT NOT NULL,
    vote_count      INTEGER NOT NULL DEFAULT 0,   -- denormalised SUM(post_votes.value)
    created_at      TEXT NOT NULL
);

-- One live vote per (actor, target). A neutral vote is the absence of a row.
CREATE TABLE IF NOT EXISTS thread_votes (
    actor_id     TEXT NOT NULL,
    thread_id    TEXT NOT NULL REFERENCES threads(thread_id) ON DELETE CASCADE,
    value        INTEGER NOT NULL CHECK (value IN (-1, 1)),
    recorded_at  TEXT NOT NULL,
    PRIMARY KEY (actor_id, thread_id)
);

CREATE TABLE IF NOT EXISTS post_votes (
    actor_id     TEXT NOT NULL,
    post_id      TEXT NOT NULL REFERENCES posts(post_id) ON DELETE CASCADE,
    value        INTEGER NOT NULL CHECK (value IN (-1, 1)),
    recorded_at  TEXT NOT NULL,
    PRIMARY KEY (actor_id, post_id)
);

CREATE INDEX IF NOT EXISTS posts_thread_idx        ON posts(thread_id);
CREATE INDEX IF NOT EXISTS thread_votes_target_idx ON thread_votes(thread_id);
CREATE INDEX IF NOT EXISTS post_votes_target_idx   ON post_votes(post_id);

PRAGMA user_version = 1;
";

/// Table and column names for one ledger partition and its aggregates.
#[derive(Debug, Clone, Copy)]
pub struct Partition {
  pub aggregates: &'static str,
  pub id:         &'static str,
  /// Column (or constant) projected as `is_locked`; posts cannot be locked.
  pub locked:     &'static str,
  pub votes:      &'static str,
}

pub fn partition(kind: TargetKind) -> Partition {
  match kind {
    TargetKind::Thread => Partition {
      aggregates: "threads",
      id:         "thread_id",
      locked:     "is_locked",
      votes:      "thread_votes",
    },
    TargetKind::Post => Partition {
      aggregates: "posts",
      id:         "post_id",
      locked:     "0",
      votes:      "post_votes",
    },
  }
}
