//! Core types and trait definitions for tabletalk.
//!
//! This crate is deliberately free of HTTP, spreadsheet and database
//! dependencies. Every other crate depends on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod conversation;
pub mod error;
pub mod query;
pub mod schema;
pub mod store;

pub use error::{Error, Result};
