//! HTTP Basic-auth middleware resolving credentials to an [`ActorId`].
//!
//! Requests without an `Authorization` header pass through anonymously; the
//! API's vote routes then reject them. A header that is present but wrong is
//! rejected here.

use agora_api::ActorId;
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::{HeaderMap, header},
  middleware::Next,
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Error;

/// One user allowed to vote through this server instance.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub actor_id:      Uuid,
}

/// Credentials accepted as valid for this server instance.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
  pub accounts: Vec<Account>,
}

/// Verify Basic credentials from headers.
///
/// Returns `Ok(None)` when no `Authorization` header is present.
pub fn verify_auth(
  headers: &HeaderMap,
  config: &AuthConfig,
) -> Result<Option<ActorId>, Error> {
  let Some(header_val) = headers.get(header::AUTHORIZATION) else {
    return Ok(None);
  };
  let header_val = header_val.to_str().map_err(|_| Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;

  let account = config
    .accounts
    .iter()
    .find(|a| a.username == username)
    .ok_or(Error::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&account.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(Some(ActorId(account.actor_id)))
}

/// Middleware: attach the authenticated [`ActorId`] to the request.
pub async fn authenticate(
  State(auth): State<Arc<AuthConfig>>,
  mut req: Request,
  next: Next,
) -> Result<Response, Error> {
  if let Some(actor) = verify_auth(req.headers(), &auth)? {
    tracing::debug!(actor_id = %actor.0, "authenticated");
    req.extensions_mut().insert(actor);
  }
  Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
  use super::*;
  use argon2::{PasswordHasher, password_hash::SaltString};
  use axum::http::HeaderValue;
  use rand_core::OsRng;

  fn make_config(password: &str, actor_id: Uuid) -> AuthConfig {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();

    AuthConfig {
      accounts: vec![Account {
        username: "user".to_string(),
        password_hash: hash,
        actor_id,
      }],
    }
  }

  fn basic(user: &str, pass: &str) -> HeaderMap {
    let encoded = B64.encode(format!("{user}:{pass}"));
    let mut headers = HeaderMap::new();
    headers.insert(
      header::AUTHORIZATION,
      HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
    );
    headers
  }

  #[test]
  fn correct_credentials_resolve_actor() {
    let actor = Uuid::new_v4();
    let config = make_config("secret", actor);
    let resolved = verify_auth(&basic("user", "secret"), &config).unwrap();
    assert_eq!(resolved, Some(ActorId(actor)));
  }

  #[test]
  fn wrong_password() {
    let config = make_config("secret", Uuid::new_v4());
    let result = verify_auth(&basic("user", "wrong"), &config);
    assert!(matches!(result, Err(Error::Unauthorized)));
  }

  #[test]
  fn unknown_user() {
    let config = make_config("secret", Uuid::new_v4());
    let result = verify_auth(&basic("mallory", "secret"), &config);
    assert!(matches!(result, Err(Error::Unauthorized)));
  }

  #[test]
  fn missing_header_is_anonymous() {
    let config = make_config("secret", Uuid::new_v4());
    assert_eq!(verify_auth(&HeaderMap::new(), &config).unwrap(), None);
  }

  #[test]
  fn invalid_base64() {
    let config = make_config("secret", Uuid::new_v4());
    let mut headers = HeaderMap::new();
    headers.insert(
      header::AUTHORIZATION,
      HeaderValue::from_static("Basic !!!not-base64!!!"),
    );
    assert!(matches!(verify_auth(&headers, &config), Err(Error::Unauthorized)));
  }
}
