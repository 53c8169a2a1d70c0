//! JSON REST API for Agora vote accounting.
//!
//! Exposes an axum [`Router`] backed by any [`agora_core::store::VoteBackend`].
//! Authentication, TLS, and transport concerns are the caller's
//! responsibility: the vote routes expect an [`ActorId`] in the request
//! extensions.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api/v1", agora_api::api_router(Arc::new(VoteEngines::new(store))))
//! ```

pub mod actor;
pub mod error;
pub mod targets;
pub mod votes;

use std::sync::Arc;

use agora_core::{VoteEngine, store::VoteBackend, vote::TargetKind};
use axum::{Router, routing::get};

pub use actor::ActorId;
pub use error::ApiError;

/// The engine type assembled for one kind from backend `B`.
pub type EngineFor<B> =
  VoteEngine<B, <B as VoteBackend>::Ledger, <B as VoteBackend>::Aggregates>;

/// One vote engine per [`TargetKind`], sharing a backend.
pub struct VoteEngines<B: VoteBackend> {
  pub threads: EngineFor<B>,
  pub posts:   EngineFor<B>,
}

impl<B: VoteBackend> VoteEngines<B> {
  pub fn new(backend: B) -> Self {
    Self {
      threads: VoteEngine::for_kind(backend.clone(), TargetKind::Thread),
      posts:   VoteEngine::for_kind(backend, TargetKind::Post),
    }
  }

  pub fn get(&self, kind: TargetKind) -> &EngineFor<B> {
    match kind {
      TargetKind::Thread => &self.threads,
      TargetKind::Post => &self.posts,
    }
  }
}

/// Build a fully-materialised API router for `engines`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<B>(engines: Arc<VoteEngines<B>>) -> Router<()>
where
  B: VoteBackend + Send + Sync + 'static,
{
  Router::new()
    // Threads
    .route("/threads/{thread_id}", get(targets::get_thread::<B>))
    .route(
      "/threads/{thread_id}/vote",
      get(votes::current_thread::<B>).post(votes::cast_thread::<B>),
    )
    // Posts
    .route("/posts/{post_id}", get(targets::get_post::<B>))
    .route(
      "/posts/{post_id}/vote",
      get(votes::current_post::<B>).post(votes::cast_post::<B>),
    )
    .with_state(engines)
}
