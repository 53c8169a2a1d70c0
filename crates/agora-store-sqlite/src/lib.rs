//! SQLite backend for Agora vote accounting.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Mutations are staged on a
//! [`SqliteWork`] and applied in a single `IMMEDIATE` transaction at commit.

mod encode;
mod schema;
mod store;
mod work;

pub mod error;

pub use error::{Error, Result};
pub use store::{NewPost, NewThread, SqliteStore, StoreOptions, VoteDrift};
pub use work::{SqliteAggregates, SqliteLedger, SqliteWork};
