//! Results of executing a SQL statement against a report store.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// A single SQLite value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
  Null,
  Integer(i64),
  Real(f64),
  Text(String),
  Blob(Vec<u8>),
}

/// Ordered rows returned by a successful statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRows {
  pub columns: Vec<String>,
  pub rows:    Vec<Vec<Cell>>,
}

/// What executing a statement produced.
///
/// Failures are data, not errors: the reasoning loop reads the message and
/// may retry with a corrected statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryOutcome {
  Rows(QueryRows),
  Error { message: String },
}

impl QueryOutcome {
  pub fn error(message: impl Into<String>) -> Self {
    QueryOutcome::Error { message: message.into() }
  }

  pub fn is_error(&self) -> bool { matches!(self, QueryOutcome::Error { .. }) }

  pub fn rows(&self) -> Option<&QueryRows> {
    match self {
      QueryOutcome::Rows(rows) => Some(rows),
      QueryOutcome::Error { .. } => None,
    }
  }

  /// The text handed back to the model as the tool observation: compact
  /// JSON for rows, the bare message for errors.
  pub fn observation(&self) -> String {
    match self {
      QueryOutcome::Rows(r) => json!({ "columns": r.columns, "rows": r.rows }).to_string(),
      QueryOutcome::Error { message } => message.clone(),
    }
  }
}
