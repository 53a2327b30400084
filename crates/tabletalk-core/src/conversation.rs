//! Threads and turns — the durable conversation log.
//!
//! A thread is bound to exactly one report store for its whole life. Turns
//! are immutable and only ever appended; their order is the order in which
//! they were written.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

// ─── Role ────────────────────────────────────────────────────────────────────

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  System,
  User,
  Assistant,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Role::System => "system",
      Role::User => "user",
      Role::Assistant => "assistant",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Role {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "system" => Ok(Role::System),
      "user" => Ok(Role::User),
      "assistant" => Ok(Role::Assistant),
      other => Err(Error::UnknownRole(other.to_owned())),
    }
  }
}

// ─── Turns ───────────────────────────────────────────────────────────────────

/// A persisted, immutable conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
  /// Store-assigned, strictly increasing within a store.
  pub turn_id:    i64,
  pub thread_id:  String,
  pub role:       Role,
  pub content:    String,
  /// Server-assigned at append time.
  pub created_at: DateTime<Utc>,
  pub metadata:   Option<serde_json::Value>,
}

/// Input to [`ConversationStore::append`](crate::store::ConversationStore::append).
/// The timestamp and id are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTurn {
  pub role:     Role,
  pub content:  String,
  #[serde(default)]
  pub metadata: Option<serde_json::Value>,
}

impl NewTurn {
  pub fn new(role: Role, content: impl Into<String>) -> Self {
    Self { role, content: content.into(), metadata: None }
  }

  pub fn system(content: impl Into<String>) -> Self {
    Self::new(Role::System, content)
  }

  pub fn user(content: impl Into<String>) -> Self {
    Self::new(Role::User, content)
  }

  pub fn assistant(content: impl Into<String>) -> Self {
    Self::new(Role::Assistant, content)
  }

  pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
    self.metadata = Some(metadata);
    self
  }
}

// ─── Threads ─────────────────────────────────────────────────────────────────

/// A conversation and the report store it is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
  pub thread_id:  String,
  pub store_id:   String,
  pub created_at: DateTime<Utc>,
}

/// A thread with its activity counters, as returned by
/// [`ConversationStore::list_threads`](crate::store::ConversationStore::list_threads).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
  pub thread_id:     String,
  pub store_id:      String,
  pub created_at:    DateTime<Utc>,
  pub message_count: u64,
  /// Timestamp of the newest turn; `None` for a thread with no turns.
  pub last_activity: Option<DateTime<Utc>>,
}

/// A user question and how many times it has been asked across all threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularQuestion {
  pub question: String,
  pub count:    u64,
}
