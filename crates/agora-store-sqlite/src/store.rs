//! [`SqliteStore`] — connection handling, collaborator fixtures and the
//! vote-count audit.

use std::{path::Path, time::Duration};

use agora_core::{
  store::{Transactional, VoteBackend},
  vote::TargetKind,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{decode_uuid, encode_dt, encode_uuid},
  schema::{SCHEMA, partition},
  work::{SqliteAggregates, SqliteLedger, SqliteWork},
};

// ─── Options ─────────────────────────────────────────────────────────────────

/// Connection tuning applied at open.
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
  /// How long a writer waits on a locked database before failing. Bounds the
  /// time a unit of work can block.
  pub busy_timeout: Duration,
}

impl Default for StoreOptions {
  fn default() -> Self { Self { busy_timeout: Duration::from_secs(5) } }
}

// ─── Collaborator inputs ─────────────────────────────────────────────────────

/// Input for [`SqliteStore::insert_thread`].
#[derive(Debug, Clone)]
pub struct NewThread {
  pub author_id: Uuid,
  pub title:     String,
  pub is_locked: bool,
}

/// Input for [`SqliteStore::insert_post`].
#[derive(Debug, Clone)]
pub struct NewPost {
  pub thread_id:      Uuid,
  /// Stored as given; existence is not checked.
  pub parent_post_id: Option<Uuid>,
  pub author_id:      Uuid,
  pub content:        String,
}

/// A target whose stored `vote_count` disagrees with its ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteDrift {
  pub id:     Uuid,
  pub stored: i64,
  pub actual: i64,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// An Agora vote store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` with default options.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, StoreOptions::default()).await
  }

  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open_with(
    path: impl AsRef<Path>,
    options: StoreOptions,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init(options).await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init(StoreOptions::default()).await?;
    Ok(store)
  }

  async fn init(&self, options: StoreOptions) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(options.busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Collaborator fixtures ─────────────────────────────────────────────────

  /// Persist a thread with a zero vote count and return its id.
  pub async fn insert_thread(&self, input: NewThread) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let id_str = encode_uuid(id);
    let author_str = encode_uuid(input.author_id);
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO threads (thread_id, author_id, title, is_locked, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, author_str, input.title, input.is_locked, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(id)
  }

  /// Persist a post with a zero vote count and return its id.
  pub async fn insert_post(&self, input: NewPost) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let id_str = encode_uuid(id);
    let thread_str = encode_uuid(input.thread_id);
    let parent_str = input.parent_post_id.map(encode_uuid);
    let author_str = encode_uuid(input.author_id);
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO posts (post_id, thread_id, parent_post_id, author_id, content, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            id_str,
            thread_str,
            parent_str,
            author_str,
            input.content,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(id)
  }

  /// Lock or unlock a thread. Returns `false` if the thread does not exist.
  pub async fn set_thread_locked(&self, id: Uuid, locked: bool) -> Result<bool> {
    let id_str = encode_uuid(id);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE threads SET is_locked = ?1 WHERE thread_id = ?2",
          rusqlite::params![locked, id_str],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  // ── Audit ─────────────────────────────────────────────────────────────────

  /// List every target of `kind` whose `vote_count` differs from the sum of
  /// its ledger rows. Empty when the store is consistent.
  pub async fn vote_count_drift(&self, kind: TargetKind) -> Result<Vec<VoteDrift>> {
    let p = partition(kind);
    let sql = format!(
      "SELECT a.{id}, a.vote_count, COALESCE(SUM(v.value), 0)
       FROM {aggregates} a
       LEFT JOIN {votes} v ON v.{id} = a.{id}
       GROUP BY a.{id}, a.vote_count
       HAVING a.vote_count != COALESCE(SUM(v.value), 0)",
      id = p.id,
      aggregates = p.aggregates,
      votes = p.votes,
    );

    let rows: Vec<(String, i64, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(id, stored, actual)| {
        Ok(VoteDrift { id: decode_uuid(&id)?, stored, actual })
      })
      .collect()
  }
}

// ─── Backend impls ───────────────────────────────────────────────────────────

impl Transactional for SqliteStore {
  type Work = SqliteWork;

  async fn begin(&self) -> Result<SqliteWork, Error> {
    Ok(SqliteWork::new(self.conn.clone()))
  }
}

impl VoteBackend for SqliteStore {
  type Ledger = SqliteLedger;
  type Aggregates = SqliteAggregates;

  fn ledger(&self, kind: TargetKind) -> SqliteLedger {
    SqliteLedger::new(self.conn.clone(), kind)
  }

  fn aggregates(&self, kind: TargetKind) -> SqliteAggregates {
    SqliteAggregates::new(self.conn.clone(), kind)
  }
}
