//! In-memory implementation of the storage contracts.
//!
//! Mutations are staged on a [`MemoryWork`] and applied under a single lock
//! acquisition at commit, against copies of the maps that only replace the
//! live state once every staged operation has succeeded. Intended for tests
//! and embedding; [`MemoryStore::fail_next_delta`] injects a storage fault
//! into the aggregate step.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, MutexGuard},
};

use thiserror::Error;
use uuid::Uuid;

use crate::{
  store::{AggregateStore, LedgerStore, Transactional, UnitOfWork, VoteBackend},
  vote::{TargetKind, VoteRecord, VoteValue, VoteableAggregate},
};

#[derive(Debug, Error)]
pub enum MemoryError {
  #[error("{kind} not found: {id}")]
  TargetNotFound { kind: TargetKind, id: Uuid },

  #[error("vote by {actor_id} on {target_id} changed concurrently")]
  StaleVote { actor_id: Uuid, target_id: Uuid },

  #[error("injected storage fault")]
  InjectedFault,

  #[error("store lock poisoned")]
  Poisoned,
}

type VoteKey = (TargetKind, Uuid, Uuid);

#[derive(Debug, Default)]
struct State {
  aggregates:      HashMap<(TargetKind, Uuid), VoteableAggregate>,
  votes:           HashMap<VoteKey, VoteRecord>,
  fail_next_delta: bool,
  reads:           usize,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A vote backend held entirely in memory.
///
/// Cloning is cheap — clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  state: Arc<Mutex<State>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> Result<MutexGuard<'_, State>, MemoryError> {
    self.state.lock().map_err(|_| MemoryError::Poisoned)
  }

  /// Seed a voteable target with a zero count.
  pub fn insert_target(
    &self,
    kind: TargetKind,
    is_locked: bool,
  ) -> Result<VoteableAggregate, MemoryError> {
    let aggregate = VoteableAggregate {
      id: Uuid::new_v4(),
      kind,
      is_locked,
      vote_count: 0,
    };
    self
      .lock()?
      .aggregates
      .insert((kind, aggregate.id), aggregate.clone());
    Ok(aggregate)
  }

  /// Make the next staged `apply_delta` fail.
  pub fn fail_next_delta(&self) -> Result<(), MemoryError> {
    self.lock()?.fail_next_delta = true;
    Ok(())
  }

  /// Number of reads served so far.
  pub fn reads(&self) -> Result<usize, MemoryError> { Ok(self.lock()?.reads) }

  /// Snapshot of a target without counting as a read.
  pub fn target(
    &self,
    kind: TargetKind,
    id: Uuid,
  ) -> Result<Option<VoteableAggregate>, MemoryError> {
    Ok(self.lock()?.aggregates.get(&(kind, id)).cloned())
  }

  /// Snapshot of one ledger row without counting as a read.
  pub fn vote(
    &self,
    kind: TargetKind,
    actor_id: Uuid,
    target_id: Uuid,
  ) -> Result<Option<VoteRecord>, MemoryError> {
    Ok(self.lock()?.votes.get(&(kind, actor_id, target_id)).cloned())
  }

  /// Sum of live ledger values for a target.
  pub fn vote_sum(
    &self,
    kind: TargetKind,
    target_id: Uuid,
  ) -> Result<i64, MemoryError> {
    Ok(
      self
        .lock()?
        .votes
        .values()
        .filter(|r| r.target_kind == kind && r.target_id == target_id)
        .map(|r| r.value.as_i64())
        .sum(),
    )
  }

  /// Number of ledger rows across all kinds.
  pub fn vote_rows(&self) -> Result<usize, MemoryError> {
    Ok(self.lock()?.votes.len())
  }
}

// ─── Unit of work ────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Op {
  Upsert { record: VoteRecord, prior: VoteValue },
  Delete { key: VoteKey, prior: VoteValue },
  Delta { kind: TargetKind, id: Uuid, delta: i64 },
}

/// Staged mutations against a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryWork {
  store: MemoryStore,
  ops:   Vec<Op>,
}

fn check_prior(
  votes: &HashMap<VoteKey, VoteRecord>,
  key: &VoteKey,
  prior: VoteValue,
) -> Result<(), MemoryError> {
  let live = votes.get(key).map_or(VoteValue::Neutral, |r| r.value);
  if live != prior {
    return Err(MemoryError::StaleVote { actor_id: key.1, target_id: key.2 });
  }
  Ok(())
}

impl UnitOfWork for MemoryWork {
  type Error = MemoryError;

  async fn commit(self) -> Result<(), MemoryError> {
    let mut state = self.store.lock()?;
    let mut votes = state.votes.clone();
    let mut aggregates = state.aggregates.clone();

    for op in self.ops {
      match op {
        Op::Upsert { record, prior } => {
          let key = (record.target_kind, record.actor_id, record.target_id);
          check_prior(&votes, &key, prior)?;
          votes.insert(key, record);
        }
        Op::Delete { key, prior } => {
          check_prior(&votes, &key, prior)?;
          votes.remove(&key);
        }
        Op::Delta { kind, id, delta } => {
          let aggregate = aggregates
            .get_mut(&(kind, id))
            .ok_or(MemoryError::TargetNotFound { kind, id })?;
          aggregate.vote_count += delta;
        }
      }
    }

    state.votes = votes;
    state.aggregates = aggregates;
    Ok(())
  }

  async fn rollback(self) -> Result<(), MemoryError> { Ok(()) }
}

impl Transactional for MemoryStore {
  type Work = MemoryWork;

  async fn begin(&self) -> Result<MemoryWork, MemoryError> {
    Ok(MemoryWork { store: self.clone(), ops: Vec::new() })
  }
}

// ─── Adapters ────────────────────────────────────────────────────────────────

/// The ledger partition for one kind.
#[derive(Debug, Clone)]
pub struct MemoryLedger {
  store: MemoryStore,
  kind:  TargetKind,
}

/// The aggregates of one kind.
#[derive(Debug, Clone)]
pub struct MemoryAggregates {
  store: MemoryStore,
  kind:  TargetKind,
}

impl LedgerStore for MemoryLedger {
  type Work = MemoryWork;
  type Error = MemoryError;

  async fn get_vote(
    &self,
    actor_id: Uuid,
    target_id: Uuid,
  ) -> Result<Option<VoteRecord>, MemoryError> {
    let mut state = self.store.lock()?;
    state.reads += 1;
    Ok(state.votes.get(&(self.kind, actor_id, target_id)).cloned())
  }

  async fn upsert_vote(
    &self,
    work: &mut MemoryWork,
    record: &VoteRecord,
    prior: VoteValue,
  ) -> Result<(), MemoryError> {
    work.ops.push(Op::Upsert { record: record.clone(), prior });
    Ok(())
  }

  async fn delete_vote(
    &self,
    work: &mut MemoryWork,
    actor_id: Uuid,
    target_id: Uuid,
    prior: VoteValue,
  ) -> Result<(), MemoryError> {
    work.ops.push(Op::Delete { key: (self.kind, actor_id, target_id), prior });
    Ok(())
  }
}

impl AggregateStore for MemoryAggregates {
  type Work = MemoryWork;
  type Error = MemoryError;

  async fn get_aggregate(
    &self,
    id: Uuid,
  ) -> Result<Option<VoteableAggregate>, MemoryError> {
    let mut state = self.store.lock()?;
    state.reads += 1;
    Ok(state.aggregates.get(&(self.kind, id)).cloned())
  }

  async fn apply_delta(
    &self,
    work: &mut MemoryWork,
    id: Uuid,
    delta: i64,
  ) -> Result<(), MemoryError> {
    {
      let mut state = self.store.lock()?;
      if state.fail_next_delta {
        state.fail_next_delta = false;
        return Err(MemoryError::InjectedFault);
      }
    }
    work.ops.push(Op::Delta { kind: self.kind, id, delta });
    Ok(())
  }
}

impl VoteBackend for MemoryStore {
  type Ledger = MemoryLedger;
  type Aggregates = MemoryAggregates;

  fn ledger(&self, kind: TargetKind) -> MemoryLedger {
    MemoryLedger { store: self.clone(), kind }
  }

  fn aggregates(&self, kind: TargetKind) -> MemoryAggregates {
    MemoryAggregates { store: self.clone(), kind }
  }
}
