//! The `ConversationStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `tabletalk-store-sqlite`). The agent orchestrator and the HTTP layer depend
//! on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::conversation::{NewTurn, PopularQuestion, Thread, ThreadSummary, Turn};

/// Durable, append-only log of conversation turns keyed by thread id.
///
/// Every write is committed before the returned future resolves; nothing is
/// buffered across calls.
pub trait ConversationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Threads ───────────────────────────────────────────────────────────

  /// Ensure a thread exists, binding it to `store_id` on first open.
  ///
  /// Idempotent. Returns an error if the thread already exists and is bound
  /// to a different store.
  fn open_thread<'a>(
    &'a self,
    thread_id: &'a str,
    store_id: &'a str,
  ) -> impl Future<Output = Result<Thread, Self::Error>> + Send + 'a;

  /// Retrieve a thread by id. Returns `None` if it was never opened.
  fn get_thread<'a>(
    &'a self,
    thread_id: &'a str,
  ) -> impl Future<Output = Result<Option<Thread>, Self::Error>> + Send + 'a;

  /// Every thread with its message count, most recently active first.
  fn list_threads(
    &self,
  ) -> impl Future<Output = Result<Vec<ThreadSummary>, Self::Error>> + Send + '_;

  // ── Turns — append-only writes ────────────────────────────────────────

  /// Append one turn. Fails if the thread was never opened.
  fn append<'a>(
    &'a self,
    thread_id: &'a str,
    turn: NewTurn,
  ) -> impl Future<Output = Result<Turn, Self::Error>> + Send + 'a;

  /// Append several turns atomically: either all are written or none.
  fn append_all<'a>(
    &'a self,
    thread_id: &'a str,
    turns: Vec<NewTurn>,
  ) -> impl Future<Output = Result<Vec<Turn>, Self::Error>> + Send + 'a;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Turns of a thread in creation order.
  ///
  /// With `limit`, only the most recent `limit` turns are returned (still
  /// oldest first). An unknown thread yields an empty list.
  fn history<'a>(
    &'a self,
    thread_id: &'a str,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<Turn>, Self::Error>> + Send + 'a;

  /// The most frequently asked user questions across all threads.
  fn popular_questions(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<PopularQuestion>, Self::Error>> + Send + '_;
}
