//! HTTP server assembly for Agora vote accounting.
//!
//! Mounts the [`agora_api`] router under `/api/v1`, resolves Basic
//! credentials to actors, and traces every request.

pub mod auth;
pub mod error;

pub use error::Error;

use std::{path::PathBuf, sync::Arc, time::Duration};

use agora_api::VoteEngines;
use agora_core::store::VoteBackend;
use axum::{Router, middleware};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{Account, AuthConfig};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `AGORA_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  pub store_path:      PathBuf,
  /// Upper bound on how long a vote transaction waits for the database lock.
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms: u64,
  #[serde(default)]
  pub accounts:        Vec<Account>,
}

fn default_busy_timeout_ms() -> u64 { 5_000 }

impl ServerConfig {
  pub fn busy_timeout(&self) -> Duration {
    Duration::from_millis(self.busy_timeout_ms)
  }

  pub fn auth(&self) -> AuthConfig {
    AuthConfig { accounts: self.accounts.clone() }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Everything the router needs, injected at construction.
#[derive(Clone)]
pub struct AppState<B: VoteBackend> {
  pub engines: Arc<VoteEngines<B>>,
  pub auth:    Arc<AuthConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the server.
pub fn router<B>(state: AppState<B>) -> Router
where
  B: VoteBackend + Send + Sync + 'static,
{
  Router::new()
    .nest("/api/v1", agora_api::api_router(state.engines))
    .layer(middleware::from_fn_with_state(state.auth, auth::authenticate))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use super::*;

  use agora_core::vote::TargetKind;
  use agora_store_sqlite::{NewPost, NewThread, SqliteStore};
  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use rand_core::OsRng;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  struct Fixture {
    store:  SqliteStore,
    state:  AppState<SqliteStore>,
    thread: Uuid,
    post:   Uuid,
  }

  async fn fixture(password: &str) -> Fixture {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let thread = store
      .insert_thread(NewThread {
        author_id: Uuid::new_v4(),
        title:     "Release notes".into(),
        is_locked: false,
      })
      .await
      .unwrap();
    let post = store
      .insert_post(NewPost {
        thread_id:      thread,
        parent_post_id: None,
        author_id:      Uuid::new_v4(),
        content:        "Looks good".into(),
      })
      .await
      .unwrap();

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();

    let state = AppState {
      engines: Arc::new(VoteEngines::new(store.clone())),
      auth:    Arc::new(AuthConfig {
        accounts: vec![Account {
          username:      "user".to_string(),
          password_hash: hash,
          actor_id:      Uuid::new_v4(),
        }],
      }),
    };

    Fixture { store, state, thread, post }
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn oneshot_raw(
    state:   AppState<SqliteStore>,
    method:  &str,
    uri:     &str,
    headers: Vec<(header::HeaderName, String)>,
    body:    &str,
  ) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    router(state).oneshot(req).await.unwrap()
  }

  fn json_with_auth(user: &str, pass: &str) -> Vec<(header::HeaderName, String)> {
    vec![
      (header::AUTHORIZATION, auth_header(user, pass)),
      (header::CONTENT_TYPE, "application/json".to_string()),
    ]
  }

  #[tokio::test]
  async fn authenticated_vote_is_recorded() {
    let f = fixture("secret").await;
    let resp = oneshot_raw(
      f.state.clone(),
      "POST",
      &format!("/api/v1/threads/{}/vote", f.thread),
      json_with_auth("user", "secret"),
      r#"{"vote_type":1}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = oneshot_raw(
      f.state,
      "GET",
      &format!("/api/v1/threads/{}", f.thread),
      vec![],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["vote_count"], 1);
    assert!(f.store.vote_count_drift(TargetKind::Thread).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn anonymous_vote_is_401() {
    let f = fixture("secret").await;
    let resp = oneshot_raw(
      f.state,
      "POST",
      &format!("/api/v1/posts/{}/vote", f.post),
      vec![(header::CONTENT_TYPE, "application/json".to_string())],
      r#"{"vote_type":1}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn wrong_password_is_401_with_challenge() {
    let f = fixture("secret").await;
    let resp = oneshot_raw(
      f.state,
      "POST",
      &format!("/api/v1/posts/{}/vote", f.post),
      json_with_auth("user", "nope"),
      r#"{"vote_type":1}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
  }

  #[tokio::test]
  async fn anonymous_read_is_allowed() {
    let f = fixture("secret").await;
    let resp = oneshot_raw(
      f.state,
      "GET",
      &format!("/api/v1/posts/{}", f.post),
      vec![],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn vote_on_missing_post_is_404() {
    let f = fixture("secret").await;
    let resp = oneshot_raw(
      f.state,
      "POST",
      &format!("/api/v1/posts/{}/vote", Uuid::new_v4()),
      json_with_auth("user", "secret"),
      r#"{"vote_type":-1}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
