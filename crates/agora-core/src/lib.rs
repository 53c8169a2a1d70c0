//! Core types, storage contracts and the vote engine for Agora.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends (e.g. `agora-store-sqlite`) implement the contracts in
//! [`store`]; the HTTP layer drives [`engine::VoteEngine`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod engine;
pub mod error;
pub mod memory;
pub mod store;
pub mod vote;

pub use engine::{VoteEngine, VoteError};
pub use error::{Error, Result};

#[cfg(test)]
mod tests;
