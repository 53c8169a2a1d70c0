//! agora-server binary.
//!
//! Loads settings from a TOML file and `AGORA_*` environment variables, opens
//! the SQLite vote store, and serves the vote API.
//!
//! Account entries carry an argon2 PHC string, which the binary can produce:
//!
//! ```text
//! agora-server --hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use agora_api::VoteEngines;
use agora_server::{AppState, ServerConfig};
use agora_store_sqlite::{SqliteStore, StoreOptions};
use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Agora vote accounting server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  init_tracing();
  let cli = Cli::parse();

  if cli.hash_password {
    println!("{}", hash_password(&prompt_password()?)?);
    return Ok(());
  }

  let server_cfg = load_config(cli.config)?;
  if server_cfg.accounts.is_empty() {
    tracing::warn!("no accounts configured; every vote request will be rejected");
  }

  let store_path = expand_tilde(&server_cfg.store_path);
  let options = StoreOptions { busy_timeout: server_cfg.busy_timeout() };
  let store = SqliteStore::open_with(&store_path, options)
    .await
    .with_context(|| format!("cannot open vote store {}", store_path.display()))?;

  let app = agora_server::router(AppState {
    engines: Arc::new(VoteEngines::new(store)),
    auth:    Arc::new(server_cfg.auth()),
  });

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("cannot bind {address}"))?;
  tracing::info!(%address, "serving vote api");

  axum::serve(listener, app).await.context("server terminated")
}

fn init_tracing() {
  let filter = EnvFilter::builder()
    .with_default_directive(LevelFilter::INFO.into())
    .from_env_lossy();
  tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Layer defaults, the optional config file and `AGORA_*` variables.
fn load_config(path: PathBuf) -> anyhow::Result<ServerConfig> {
  config::Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080)?
    .set_default("store_path", "agora.db")?
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("AGORA"))
    .build()
    .context("cannot assemble configuration")?
    .try_deserialize()
    .context("invalid server configuration")
}

fn hash_password(password: &str) -> anyhow::Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| anyhow::anyhow!("cannot hash password: {e}"))
}

fn prompt_password() -> anyhow::Result<String> {
  use std::io::{BufRead, Write};
  print!("Password: ");
  std::io::stdout().flush()?;
  let mut line = String::new();
  std::io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

/// Resolve a leading `~` component against `$HOME`.
fn expand_tilde(path: &Path) -> PathBuf {
  match (path.strip_prefix("~"), std::env::var_os("HOME")) {
    (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
    _ => path.to_path_buf(),
  }
}
