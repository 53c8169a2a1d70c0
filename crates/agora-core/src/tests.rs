//! Vote engine tests against the in-memory backend.

use std::sync::Arc;

use tokio::task::JoinSet;
use uuid::Uuid;

use crate::{
  VoteEngine, VoteError,
  memory::{MemoryAggregates, MemoryLedger, MemoryStore},
  store::{AggregateStore, LedgerStore, Transactional, VoteBackend},
  vote::{LedgerChange, TargetKind, VoteRecord, VoteValue},
};

type Engine = VoteEngine<MemoryStore, MemoryLedger, MemoryAggregates>;

fn setup(kind: TargetKind) -> (MemoryStore, Engine, Uuid) {
  let store = MemoryStore::new();
  let target = store.insert_target(kind, false).unwrap();
  let engine = VoteEngine::for_kind(store.clone(), kind);
  (store, engine, target.id)
}

fn count(store: &MemoryStore, kind: TargetKind, id: Uuid) -> i64 {
  store.target(kind, id).unwrap().unwrap().vote_count
}

// ─── Vote values ─────────────────────────────────────────────────────────────

#[test]
fn vote_value_accepts_only_unit_range() {
  assert_eq!(VoteValue::try_from(-1).unwrap(), VoteValue::Down);
  assert_eq!(VoteValue::try_from(0).unwrap(), VoteValue::Neutral);
  assert_eq!(VoteValue::try_from(1).unwrap(), VoteValue::Up);
  assert!(VoteValue::try_from(2).is_err());
  assert!(VoteValue::try_from(-5).is_err());
}

#[test]
fn vote_value_serialises_as_integer() {
  assert_eq!(serde_json::to_string(&VoteValue::Down).unwrap(), "-1");
  let v: VoteValue = serde_json::from_str("1").unwrap();
  assert_eq!(v, VoteValue::Up);
  assert!(serde_json::from_str::<VoteValue>("3").is_err());
}

#[test]
fn delta_table() {
  use VoteValue::*;
  assert_eq!(Neutral.delta_to(Up), 1);
  assert_eq!(Up.delta_to(Down), -2);
  assert_eq!(Down.delta_to(Neutral), 1);
  assert_eq!(Up.delta_to(Up), 0);
}

// ─── Casting ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_vote_creates_record_and_counts() {
  let (store, engine, target) = setup(TargetKind::Thread);
  let actor = Uuid::new_v4();

  let outcome = engine.cast_vote(actor, target, 1).await.unwrap();
  assert_eq!(outcome.change, LedgerChange::Created);
  assert_eq!(outcome.delta, 1);

  let record = store.vote(TargetKind::Thread, actor, target).unwrap().unwrap();
  assert_eq!(record.value, VoteValue::Up);
  assert_eq!(count(&store, TargetKind::Thread, target), 1);
}

#[tokio::test]
async fn repeated_vote_is_a_no_op() {
  let (store, engine, target) = setup(TargetKind::Post);
  let actor = Uuid::new_v4();

  engine.cast_vote(actor, target, 1).await.unwrap();
  let second = engine.cast_vote(actor, target, 1).await.unwrap();

  assert_eq!(second.change, LedgerChange::Unchanged);
  assert_eq!(second.delta, 0);
  assert_eq!(store.vote_rows().unwrap(), 1);
  assert_eq!(count(&store, TargetKind::Post, target), 1);
}

#[tokio::test]
async fn retraction_restores_count() {
  let (store, engine, target) = setup(TargetKind::Post);
  let actor = Uuid::new_v4();

  engine.cast_vote(actor, target, 1).await.unwrap();
  let outcome = engine.cast_vote(actor, target, 0).await.unwrap();

  assert_eq!(outcome.change, LedgerChange::Retracted);
  assert!(store.vote(TargetKind::Post, actor, target).unwrap().is_none());
  assert_eq!(count(&store, TargetKind::Post, target), 0);
}

#[tokio::test]
async fn retracting_without_a_vote_succeeds() {
  let (store, engine, target) = setup(TargetKind::Thread);
  let outcome = engine.cast_vote(Uuid::new_v4(), target, 0).await.unwrap();
  assert_eq!(outcome.change, LedgerChange::Unchanged);
  assert_eq!(count(&store, TargetKind::Thread, target), 0);
}

#[tokio::test]
async fn switching_moves_count_by_two() {
  let (store, engine, target) = setup(TargetKind::Thread);
  let actor = Uuid::new_v4();

  engine.cast_vote(actor, target, 1).await.unwrap();
  let outcome = engine.cast_vote(actor, target, -1).await.unwrap();

  assert_eq!(outcome.change, LedgerChange::Updated);
  assert_eq!(outcome.delta, -2);
  assert_eq!(store.vote_rows().unwrap(), 1);
  assert_eq!(
    store.vote(TargetKind::Thread, actor, target).unwrap().unwrap().value,
    VoteValue::Down
  );
  assert_eq!(count(&store, TargetKind::Thread, target), -1);
}

#[tokio::test]
async fn kinds_are_partitioned() {
  let store = MemoryStore::new();
  let thread = store.insert_target(TargetKind::Thread, false).unwrap();
  let posts = VoteEngine::for_kind(store.clone(), TargetKind::Post);

  // A thread id is not a post.
  let err = posts.cast_vote(Uuid::new_v4(), thread.id, 1).await.unwrap_err();
  assert!(matches!(err, VoteError::TargetNotFound { kind: TargetKind::Post, .. }));
}

#[tokio::test]
async fn locked_thread_still_accepts_votes() {
  let store = MemoryStore::new();
  let thread = store.insert_target(TargetKind::Thread, true).unwrap();
  let engine = VoteEngine::for_kind(store.clone(), TargetKind::Thread);

  engine.cast_vote(Uuid::new_v4(), thread.id, 1).await.unwrap();
  assert_eq!(count(&store, TargetKind::Thread, thread.id), 1);
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_value_rejected_before_storage() {
  let (store, engine, target) = setup(TargetKind::Post);

  let err = engine.cast_vote(Uuid::new_v4(), target, 2).await.unwrap_err();
  assert!(matches!(err, VoteError::InvalidVoteValue(2)));
  assert!(!err.is_retryable());
  assert_eq!(store.reads().unwrap(), 0);
}

#[tokio::test]
async fn unknown_target_leaves_no_trace() {
  let (store, engine, target) = setup(TargetKind::Post);
  let missing = Uuid::new_v4();

  let err = engine.cast_vote(Uuid::new_v4(), missing, 1).await.unwrap_err();
  assert!(matches!(err, VoteError::TargetNotFound { id, .. } if id == missing));
  assert_eq!(store.vote_rows().unwrap(), 0);
  assert_eq!(count(&store, TargetKind::Post, target), 0);
}

#[tokio::test]
async fn aggregate_fault_rolls_back_ledger() {
  let (store, engine, target) = setup(TargetKind::Thread);
  let actor = Uuid::new_v4();

  store.fail_next_delta().unwrap();
  let err = engine.cast_vote(actor, target, 1).await.unwrap_err();
  assert!(err.is_retryable());

  assert!(store.vote(TargetKind::Thread, actor, target).unwrap().is_none());
  assert_eq!(count(&store, TargetKind::Thread, target), 0);

  // The fault was one-shot; a blind retry succeeds.
  engine.cast_vote(actor, target, 1).await.unwrap();
  assert_eq!(count(&store, TargetKind::Thread, target), 1);
}

#[tokio::test]
async fn fault_during_switch_keeps_previous_vote() {
  let (store, engine, target) = setup(TargetKind::Post);
  let actor = Uuid::new_v4();

  engine.cast_vote(actor, target, 1).await.unwrap();
  store.fail_next_delta().unwrap();
  engine.cast_vote(actor, target, -1).await.unwrap_err();

  assert_eq!(
    store.vote(TargetKind::Post, actor, target).unwrap().unwrap().value,
    VoteValue::Up
  );
  assert_eq!(count(&store, TargetKind::Post, target), 1);
}

#[tokio::test]
async fn dropped_work_is_discarded() {
  let (store, _engine, target) = setup(TargetKind::Post);
  let actor = Uuid::new_v4();
  let ledger = store.ledger(TargetKind::Post);
  let aggregates = store.aggregates(TargetKind::Post);

  let mut work = store.begin().await.unwrap();
  let record = VoteRecord {
    actor_id:    actor,
    target_id:   target,
    target_kind: TargetKind::Post,
    value:       VoteValue::Up,
    recorded_at: chrono::Utc::now(),
  };
  ledger.upsert_vote(&mut work, &record, VoteValue::Neutral).await.unwrap();
  aggregates.apply_delta(&mut work, target, 1).await.unwrap();
  drop(work);

  assert_eq!(store.vote_rows().unwrap(), 0);
  assert_eq!(count(&store, TargetKind::Post, target), 0);
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_actors_do_not_lose_updates() {
  let (store, engine, target) = setup(TargetKind::Thread);
  let engine = Arc::new(engine);

  let a = tokio::spawn({
    let engine = engine.clone();
    async move { engine.cast_vote(Uuid::new_v4(), target, 1).await }
  });
  let b = tokio::spawn({
    let engine = engine.clone();
    async move { engine.cast_vote(Uuid::new_v4(), target, 1).await }
  });
  a.await.unwrap().unwrap();
  b.await.unwrap().unwrap();

  assert_eq!(count(&store, TargetKind::Thread, target), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sum_invariant_holds_for_many_actors() {
  let (store, engine, target) = setup(TargetKind::Post);
  let engine = Arc::new(engine);

  let values: Vec<i64> = (0..32).map(|i| if i % 3 == 0 { -1 } else { 1 }).collect();
  let expected: i64 = values.iter().sum();

  let mut set = JoinSet::new();
  for value in values {
    let engine = engine.clone();
    set.spawn(async move { engine.cast_vote(Uuid::new_v4(), target, value).await });
  }
  while let Some(res) = set.join_next().await {
    res.unwrap().unwrap();
  }

  assert_eq!(count(&store, TargetKind::Post, target), expected);
  assert_eq!(store.vote_sum(TargetKind::Post, target).unwrap(), expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_actor_race_never_drifts() {
  let (store, engine, target) = setup(TargetKind::Thread);
  let engine = Arc::new(engine);
  let actor = Uuid::new_v4();

  let mut set = JoinSet::new();
  for value in [1, -1, 1, 1, -1, 0, 1, -1] {
    let engine = engine.clone();
    set.spawn(async move { engine.cast_vote(actor, target, value).await });
  }
  while let Some(res) = set.join_next().await {
    // Losing racers fail the prior-value guard and are safe to retry.
    if let Err(e) = res.unwrap() {
      assert!(e.is_retryable(), "{e}");
    }
  }

  assert_eq!(
    count(&store, TargetKind::Thread, target),
    store.vote_sum(TargetKind::Thread, target).unwrap()
  );
}
