//! The vote engine.
//!
//! One generic engine serves every [`TargetKind`]: it is parameterised by a
//! unit-of-work source, a ledger partition and an aggregate store that share
//! a `Work` type. A cast moves the ledger row and the target's `vote_count`
//! together, exactly once:
//!
//! | current | requested | ledger      | `vote_count` |
//! |---------|-----------|-------------|--------------|
//! | `v`     | `v`       | untouched   | untouched    |
//! | `0`     | `±1`      | created     | `± 1`        |
//! | `±1`    | `∓1`      | updated     | `∓ 2`        |
//! | `±1`    | `0`       | deleted     | `∓ 1`        |
//!
//! Lock state of a thread is not consulted here; that policy belongs to the
//! caller.

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
  store::{AggregateStore, LedgerStore, Transactional, UnitOfWork, VoteBackend},
  vote::{
    LedgerChange, TargetKind, VoteOutcome, VoteRecord, VoteValue,
    VoteableAggregate,
  },
};

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum VoteError {
  /// The requested value was not one of `-1`, `0`, `1`. Never retried.
  #[error("invalid vote value: {0} (expected -1, 0 or 1)")]
  InvalidVoteValue(i64),

  #[error("{kind} not found: {id}")]
  TargetNotFound { kind: TargetKind, id: Uuid },

  /// Any lower-layer failure. The unit of work has already been rolled back,
  /// so retrying the whole cast is safe.
  #[error("storage failure: {0}")]
  StorageFailure(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl VoteError {
  fn storage(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::StorageFailure(Box::new(e))
  }

  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::StorageFailure(_))
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Casts votes on targets of a single [`TargetKind`].
///
/// Holds no locks and no shared mutable state; all serialisation is left to
/// the store's own transactions.
#[derive(Debug, Clone)]
pub struct VoteEngine<T, L, A> {
  kind:       TargetKind,
  tx:         T,
  ledger:     L,
  aggregates: A,
}

impl<B: VoteBackend> VoteEngine<B, B::Ledger, B::Aggregates> {
  /// Assemble an engine for `kind` from a backend serving every kind.
  pub fn for_kind(backend: B, kind: TargetKind) -> Self {
    let ledger = backend.ledger(kind);
    let aggregates = backend.aggregates(kind);
    Self::new(kind, backend, ledger, aggregates)
  }
}

impl<T, L, A> VoteEngine<T, L, A>
where
  T: Transactional,
  L: LedgerStore<Work = T::Work>,
  A: AggregateStore<Work = T::Work>,
{
  pub fn new(kind: TargetKind, tx: T, ledger: L, aggregates: A) -> Self {
    Self { kind, tx, ledger, aggregates }
  }

  /// Cast a vote from a raw integer, rejecting anything outside
  /// `{-1, 0, 1}` before storage is touched.
  pub async fn cast_vote(
    &self,
    actor_id: Uuid,
    target_id: Uuid,
    requested: i64,
  ) -> Result<VoteOutcome, VoteError> {
    let requested = VoteValue::try_from(requested)
      .map_err(|_| VoteError::InvalidVoteValue(requested))?;
    self.cast(actor_id, target_id, requested).await
  }

  /// Move the actor's vote on `target_id` to `requested`.
  ///
  /// Idempotent: repeating a cast with the same value is a successful no-op.
  pub async fn cast(
    &self,
    actor_id: Uuid,
    target_id: Uuid,
    requested: VoteValue,
  ) -> Result<VoteOutcome, VoteError> {
    self.target(target_id).await?;
    let current = self.current_vote(actor_id, target_id).await?;

    let delta = current.delta_to(requested);
    if delta == 0 {
      debug!(%actor_id, %target_id, kind = %self.kind, value = %requested, "vote unchanged");
      return Ok(VoteOutcome {
        change: LedgerChange::Unchanged,
        delta,
        value: requested,
      });
    }

    let change = if requested.is_neutral() {
      LedgerChange::Retracted
    } else if current.is_neutral() {
      LedgerChange::Created
    } else {
      LedgerChange::Updated
    };

    let mut work = self.tx.begin().await.map_err(VoteError::storage)?;

    if let Err(e) = self
      .stage(&mut work, actor_id, target_id, current, requested, delta)
      .await
    {
      if let Err(rollback_err) = work.rollback().await {
        warn!(%target_id, kind = %self.kind, error = %rollback_err, "rollback failed");
      }
      return Err(e);
    }

    work.commit().await.map_err(VoteError::storage)?;

    debug!(
      %actor_id, %target_id, kind = %self.kind,
      from = %current, to = %requested, delta,
      "vote cast"
    );

    Ok(VoteOutcome { change, delta, value: requested })
  }

  /// Resolve the target, failing with [`VoteError::TargetNotFound`].
  pub async fn target(
    &self,
    target_id: Uuid,
  ) -> Result<VoteableAggregate, VoteError> {
    self
      .aggregates
      .get_aggregate(target_id)
      .await
      .map_err(VoteError::storage)?
      .ok_or(VoteError::TargetNotFound { kind: self.kind, id: target_id })
  }

  /// The actor's live vote on `target_id`; neutral when none is recorded.
  pub async fn current_vote(
    &self,
    actor_id: Uuid,
    target_id: Uuid,
  ) -> Result<VoteValue, VoteError> {
    Ok(
      self
        .ledger
        .get_vote(actor_id, target_id)
        .await
        .map_err(VoteError::storage)?
        .map_or(VoteValue::Neutral, |record| record.value),
    )
  }

  async fn stage(
    &self,
    work: &mut T::Work,
    actor_id: Uuid,
    target_id: Uuid,
    current: VoteValue,
    requested: VoteValue,
    delta: i64,
  ) -> Result<(), VoteError> {
    if requested.is_neutral() {
      self
        .ledger
        .delete_vote(work, actor_id, target_id, current)
        .await
        .map_err(VoteError::storage)?;
    } else {
      let record = VoteRecord {
        actor_id,
        target_id,
        target_kind: self.kind,
        value: requested,
        recorded_at: Utc::now(),
      };
      self
        .ledger
        .upsert_vote(work, &record, current)
        .await
        .map_err(VoteError::storage)?;
    }

    self
      .aggregates
      .apply_delta(work, target_id, delta)
      .await
      .map_err(VoteError::storage)
  }
}
