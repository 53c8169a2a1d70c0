//! Storage contracts consumed by the vote engine.
//!
//! Implemented by storage backends (e.g. `agora-store-sqlite`, or the
//! in-memory [`MemoryStore`](crate::memory::MemoryStore)). The engine depends
//! on these abstractions only.
//!
//! Every mutation takes a `&mut Work` handle: nothing is written outside an
//! open unit of work, and nothing becomes visible until
//! [`UnitOfWork::commit`] succeeds. A unit of work that is dropped without
//! being committed must leave no trace.

use std::future::Future;

use uuid::Uuid;

use crate::vote::{TargetKind, VoteRecord, VoteValue, VoteableAggregate};

// ─── Unit of work ────────────────────────────────────────────────────────────

/// An atomic transactional boundary spanning one ledger mutation and one
/// aggregate mutation.
pub trait UnitOfWork: Send {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Make every mutation recorded against this unit of work visible at once,
  /// or none of them.
  fn commit(self) -> impl Future<Output = Result<(), Self::Error>> + Send;

  /// Discard every mutation recorded against this unit of work.
  fn rollback(self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Source of units of work.
pub trait Transactional: Send + Sync {
  type Work: UnitOfWork;

  fn begin(
    &self,
  ) -> impl Future<Output = Result<Self::Work, <Self::Work as UnitOfWork>::Error>>
  + Send
  + '_;
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// Current per-actor votes for one [`TargetKind`] partition.
pub trait LedgerStore: Send + Sync {
  type Work: UnitOfWork;
  type Error: std::error::Error + Send + Sync + 'static;

  /// Read the actor's live vote on `target_id`. `None` means neutral.
  fn get_vote(
    &self,
    actor_id: Uuid,
    target_id: Uuid,
  ) -> impl Future<Output = Result<Option<VoteRecord>, Self::Error>> + Send + '_;

  /// Create or replace the actor's vote, keyed by `(actor_id, target_id)`.
  ///
  /// `prior` is the value the caller read before opening `work`. The store
  /// must fail the unit of work if the live value differs at commit time, so
  /// that two racing casts from the same actor cannot both apply a delta.
  fn upsert_vote<'a>(
    &'a self,
    work: &'a mut Self::Work,
    record: &'a VoteRecord,
    prior: VoteValue,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Remove the actor's vote. An already-absent row is not an error.
  ///
  /// `prior` has the same meaning as for [`LedgerStore::upsert_vote`].
  fn delete_vote<'a>(
    &'a self,
    work: &'a mut Self::Work,
    actor_id: Uuid,
    target_id: Uuid,
    prior: VoteValue,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

/// The voteable entities of one [`TargetKind`].
pub trait AggregateStore: Send + Sync {
  type Work: UnitOfWork;
  type Error: std::error::Error + Send + Sync + 'static;

  /// Retrieve a target by id. Returns `None` if not found.
  fn get_aggregate(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<VoteableAggregate>, Self::Error>>
  + Send
  + '_;

  /// Apply `vote_count += delta` against the live row.
  ///
  /// Must be a relative update, never an absolute set computed from an
  /// earlier read, so that concurrent voters commute.
  fn apply_delta<'a>(
    &'a self,
    work: &'a mut Self::Work,
    id: Uuid,
    delta: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── Backend bundle ──────────────────────────────────────────────────────────

/// A storage backend able to serve every [`TargetKind`].
///
/// Used by [`VoteEngine::for_kind`](crate::engine::VoteEngine::for_kind) to
/// assemble the `(ledger, aggregates)` pair for one kind.
pub trait VoteBackend: Transactional + Clone {
  type Ledger: LedgerStore<Work = Self::Work>;
  type Aggregates: AggregateStore<Work = Self::Work>;

  fn ledger(&self, kind: TargetKind) -> Self::Ledger;

  fn aggregates(&self, kind: TargetKind) -> Self::Aggregates;
}
