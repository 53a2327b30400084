//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed microsecond width
//! and a `Z` suffix so that they sort lexicographically. Metadata is stored
//! as compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use tabletalk_core::conversation::{Role, Thread, ThreadSummary, Turn};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Metadata ────────────────────────────────────────────────────────────────

pub fn encode_metadata(m: Option<&serde_json::Value>) -> Result<Option<String>> {
  Ok(m.map(serde_json::to_string).transpose()?)
}

pub fn decode_metadata(s: Option<&str>) -> Result<Option<serde_json::Value>> {
  Ok(s.map(serde_json::from_str).transpose()?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read from a `messages` row joined with its conversation.
pub struct RawTurn {
  pub turn_id:    i64,
  pub thread_id:  String,
  pub role:       String,
  pub content:    String,
  pub created_at: String,
  pub metadata:   Option<String>,
}

impl RawTurn {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      turn_id:    row.get(0)?,
      thread_id:  row.get(1)?,
      role:       row.get(2)?,
      content:    row.get(3)?,
      created_at: row.get(4)?,
      metadata:   row.get(5)?,
    })
  }

  pub fn into_turn(self) -> Result<Turn> {
    Ok(Turn {
      turn_id:    self.turn_id,
      thread_id:  self.thread_id,
      role:       self.role.parse::<Role>()?,
      content:    self.content,
      created_at: decode_dt(&self.created_at)?,
      metadata:   decode_metadata(self.metadata.as_deref())?,
    })
  }
}

/// Raw strings read from a `conversations` row.
pub struct RawThread {
  pub thread_id:  String,
  pub store_id:   String,
  pub created_at: String,
}

impl RawThread {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      thread_id:  row.get(0)?,
      store_id:   row.get(1)?,
      created_at: row.get(2)?,
    })
  }

  pub fn into_thread(self) -> Result<Thread> {
    Ok(Thread {
      thread_id:  self.thread_id,
      store_id:   self.store_id,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// A `conversations` row with its aggregated message stats.
pub struct RawSummary {
  pub thread:        RawThread,
  pub message_count: i64,
  pub last_activity: Option<String>,
}

impl RawSummary {
  pub fn into_summary(self) -> Result<ThreadSummary> {
    let thread = self.thread.into_thread()?;
    Ok(ThreadSummary {
      thread_id:     thread.thread_id,
      store_id:      thread.store_id,
      created_at:    thread.created_at,
      message_count: self.message_count.max(0) as u64,
      last_activity: self.last_activity.as_deref().map(decode_dt).transpose()?,
    })
  }
}
