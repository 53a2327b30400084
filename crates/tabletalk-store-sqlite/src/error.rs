//! Error type for `tabletalk-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] tabletalk_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// Attempted to append to a thread that was never opened.
  #[error("thread not found: {0}")]
  ThreadNotFound(String),

  /// The thread exists but is bound to another report store.
  #[error("thread {thread_id} is bound to store {bound:?}, not {requested:?}")]
  StoreMismatch {
    thread_id: String,
    bound:     String,
    requested: String,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
