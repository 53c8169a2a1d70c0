//! The SQLite unit of work and the per-kind ledger and aggregate adapters.
//!
//! `tokio_rusqlite` funnels every call through one connection thread, so a
//! transaction cannot stay open across separate calls without other requests'
//! statements landing inside it. Mutations are therefore staged on
//! [`SqliteWork`] and replayed inside one `BEGIN IMMEDIATE` transaction on
//! commit. A failing statement, a stale prior value or a missing target
//! drops the transaction, which rolls it back. An uncommitted `SqliteWork`
//! that is dropped never touches the database.

use agora_core::{
  store::{AggregateStore, LedgerStore, UnitOfWork},
  vote::{TargetKind, VoteRecord, VoteValue, VoteableAggregate},
};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tracing::trace;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{RawAggregate, RawVote, encode_dt, encode_uuid},
  schema::partition,
};

// ─── Staged operations ───────────────────────────────────────────────────────

#[derive(Debug)]
enum StagedOp {
  Upsert {
    kind:        TargetKind,
    actor_id:    Uuid,
    target_id:   Uuid,
    value:       i64,
    recorded_at: String,
    prior:       i64,
  },
  Delete {
    kind:      TargetKind,
    actor_id:  Uuid,
    target_id: Uuid,
    prior:     i64,
  },
  Delta {
    kind:  TargetKind,
    id:    Uuid,
    delta: i64,
  },
}

/// Confirm the actor's live vote still equals `prior`.
fn check_prior(
  tx: &rusqlite::Transaction<'_>,
  kind: TargetKind,
  actor_id: Uuid,
  target_id: Uuid,
  prior: i64,
) -> rusqlite::Result<Option<Error>> {
  let p = partition(kind);
  let live: Option<i64> = tx
    .query_row(
      &format!(
        "SELECT value FROM {votes} WHERE actor_id = ?1 AND {id} = ?2",
        votes = p.votes,
        id = p.id,
      ),
      rusqlite::params![encode_uuid(actor_id), encode_uuid(target_id)],
      |r| r.get(0),
    )
    .optional()?;

  if live.unwrap_or(0) != prior {
    return Ok(Some(Error::StaleVote { actor_id, target_id }));
  }
  Ok(None)
}

/// Apply one staged operation. `Ok(Some(_))` aborts the transaction.
fn apply(
  tx: &rusqlite::Transaction<'_>,
  op: &StagedOp,
) -> rusqlite::Result<Option<Error>> {
  match *op {
    StagedOp::Upsert {
      kind,
      actor_id,
      target_id,
      value,
      ref recorded_at,
      prior,
    } => {
      if let Some(stale) = check_prior(tx, kind, actor_id, target_id, prior)? {
        return Ok(Some(stale));
      }
      let p = partition(kind);
      tx.execute(
        &format!(
          "INSERT INTO {votes} (actor_id, {id}, value, recorded_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (actor_id, {id})
           DO UPDATE SET value = excluded.value, recorded_at = excluded.recorded_at",
          votes = p.votes,
          id = p.id,
        ),
        rusqlite::params![
          encode_uuid(actor_id),
          encode_uuid(target_id),
          value,
          recorded_at,
        ],
      )?;
    }
    StagedOp::Delete { kind, actor_id, target_id, prior } => {
      if let Some(stale) = check_prior(tx, kind, actor_id, target_id, prior)? {
        return Ok(Some(stale));
      }
      let p = partition(kind);
      tx.execute(
        &format!(
          "DELETE FROM {votes} WHERE actor_id = ?1 AND {id} = ?2",
          votes = p.votes,
          id = p.id,
        ),
        rusqlite::params![encode_uuid(actor_id), encode_uuid(target_id)],
      )?;
    }
    StagedOp::Delta { kind, id, delta } => {
      let p = partition(kind);
      let changed = tx.execute(
        &format!(
          "UPDATE {aggregates} SET vote_count = vote_count + ?1 WHERE {id_col} = ?2",
          aggregates = p.aggregates,
          id_col = p.id,
        ),
        rusqlite::params![delta, encode_uuid(id)],
      )?;
      if changed == 0 {
        return Ok(Some(Error::TargetNotFound { kind, id }));
      }
    }
  }
  Ok(None)
}

// ─── Unit of work ────────────────────────────────────────────────────────────

/// Mutations staged for one atomic commit.
pub struct SqliteWork {
  conn: tokio_rusqlite::Connection,
  ops:  Vec<StagedOp>,
}

impl SqliteWork {
  pub(crate) fn new(conn: tokio_rusqlite::Connection) -> Self {
    Self { conn, ops: Vec::new() }
  }
}

impl Drop for SqliteWork {
  fn drop(&mut self) {
    if !self.ops.is_empty() {
      trace!(ops = self.ops.len(), "discarding uncommitted unit of work");
    }
  }
}

impl UnitOfWork for SqliteWork {
  type Error = Error;

  async fn commit(mut self) -> Result<()> {
    let ops = std::mem::take(&mut self.ops);
    if ops.is_empty() {
      return Ok(());
    }
    let staged = ops.len();

    let rejected: Option<Error> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for op in &ops {
          if let Some(rejected) = apply(&tx, op)? {
            // Dropping `tx` rolls back.
            return Ok(Some(rejected));
          }
        }
        tx.commit()?;
        Ok(None)
      })
      .await?;

    match rejected {
      Some(e) => Err(e),
      None => {
        trace!(ops = staged, "unit of work committed");
        Ok(())
      }
    }
  }

  async fn rollback(mut self) -> Result<()> {
    self.ops.clear();
    Ok(())
  }
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// The `thread_votes` or `post_votes` partition.
#[derive(Clone)]
pub struct SqliteLedger {
  conn: tokio_rusqlite::Connection,
  kind: TargetKind,
}

impl SqliteLedger {
  pub(crate) fn new(conn: tokio_rusqlite::Connection, kind: TargetKind) -> Self {
    Self { conn, kind }
  }
}

impl LedgerStore for SqliteLedger {
  type Work = SqliteWork;
  type Error = Error;

  async fn get_vote(
    &self,
    actor_id: Uuid,
    target_id: Uuid,
  ) -> Result<Option<VoteRecord>> {
    let p = partition(self.kind);
    let sql = format!(
      "SELECT actor_id, {id}, value, recorded_at FROM {votes}
       WHERE actor_id = ?1 AND {id} = ?2",
      id = p.id,
      votes = p.votes,
    );
    let actor_str = encode_uuid(actor_id);
    let target_str = encode_uuid(target_id);

    let raw: Option<RawVote> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(&sql, rusqlite::params![actor_str, target_str], |row| {
            Ok(RawVote {
              actor_id:    row.get(0)?,
              target_id:   row.get(1)?,
              value:       row.get(2)?,
              recorded_at: row.get(3)?,
            })
          })
          .optional()?)
      })
      .await?;

    let kind = self.kind;
    raw.map(|r| r.into_record(kind)).transpose()
  }

  async fn upsert_vote(
    &self,
    work: &mut SqliteWork,
    record: &VoteRecord,
    prior: VoteValue,
  ) -> Result<()> {
    work.ops.push(StagedOp::Upsert {
      kind:        self.kind,
      actor_id:    record.actor_id,
      target_id:   record.target_id,
      value:       record.value.as_i64(),
      recorded_at: encode_dt(record.recorded_at),
      prior:       prior.as_i64(),
    });
    Ok(())
  }

  async fn delete_vote(
    &self,
    work: &mut SqliteWork,
    actor_id: Uuid,
    target_id: Uuid,
    prior: VoteValue,
  ) -> Result<()> {
    work.ops.push(StagedOp::Delete {
      kind: self.kind,
      actor_id,
      target_id,
      prior: prior.as_i64(),
    });
    Ok(())
  }
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

/// The `threads` or `posts` table, seen through its vote count.
#[derive(Clone)]
pub struct SqliteAggregates {
  conn: tokio_rusqlite::Connection,
  kind: TargetKind,
}

impl SqliteAggregates {
  pub(crate) fn new(conn: tokio_rusqlite::Connection, kind: TargetKind) -> Self {
    Self { conn, kind }
  }
}

impl AggregateStore for SqliteAggregates {
  type Work = SqliteWork;
  type Error = Error;

  async fn get_aggregate(&self, id: Uuid) -> Result<Option<VoteableAggregate>> {
    let p = partition(self.kind);
    let sql = format!(
      "SELECT {id}, {locked}, vote_count FROM {aggregates} WHERE {id} = ?1",
      id = p.id,
      locked = p.locked,
      aggregates = p.aggregates,
    );
    let id_str = encode_uuid(id);

    let raw: Option<RawAggregate> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(&sql, rusqlite::params![id_str], |row| {
            Ok(RawAggregate {
              id:         row.get(0)?,
              is_locked:  row.get(1)?,
              vote_count: row.get(2)?,
            })
          })
          .optional()?)
      })
      .await?;

    let kind = self.kind;
    raw.map(|r| r.into_aggregate(kind)).transpose()
  }

  async fn apply_delta(
    &self,
    work: &mut SqliteWork,
    id: Uuid,
    delta: i64,
  ) -> Result<()> {
    work.ops.push(StagedOp::Delta { kind: self.kind, id, delta });
    Ok(())
  }
}
