//! The read-only query executor.
//!
//! [`execute`] never returns an error: every failure becomes a
//! [`QueryOutcome::Error`] whose message starts with [`ERROR_PREFIX`], so the
//! reasoning loop can read it and try again.

use std::path::Path;

use rusqlite::types::ValueRef;
use tabletalk_core::query::{Cell, QueryOutcome, QueryRows};

use crate::introspect::open_read_only;

pub const ERROR_PREFIX: &str = "Error executing query: ";

/// Run one read-only statement against the store at `path`.
pub async fn execute(path: &Path, sql: &str) -> QueryOutcome {
  match try_execute(path, sql).await {
    Ok(rows) => QueryOutcome::Rows(rows),
    Err(message) => {
      tracing::debug!(error = %message, "query rejected");
      QueryOutcome::error(format!("{ERROR_PREFIX}{message}"))
    }
  }
}

async fn try_execute(path: &Path, sql: &str) -> Result<QueryRows, String> {
  let sql = check_statement(sql)?.to_owned();
  let conn = open_read_only(path).await.map_err(|e| e.to_string())?;

  conn
    .call(move |conn| {
      let mut stmt = conn.prepare(&sql)?;
      if !stmt.readonly() {
        return Ok(Err("statement would modify the database".to_owned()));
      }

      let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_owned).collect();
      let width = columns.len();
      let mut rows = Vec::new();
      let mut cursor = stmt.query([])?;
      while let Some(row) = cursor.next()? {
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
          cells.push(value_to_cell(row.get_ref(i)?));
        }
        rows.push(cells);
      }
      Ok(Ok(QueryRows { columns, rows }))
    })
    .await
    .map_err(|e| e.to_string())?
}

fn value_to_cell(value: ValueRef<'_>) -> Cell {
  match value {
    ValueRef::Null => Cell::Null,
    ValueRef::Integer(i) => Cell::Integer(i),
    ValueRef::Real(f) => Cell::Real(f),
    ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
    ValueRef::Blob(b) => Cell::Blob(b.to_vec()),
  }
}

// ─── Statement check ─────────────────────────────────────────────────────────

/// Lexical gate run before SQLite sees the text.
///
/// The statement ends at the first `;` outside string literals, quoted
/// identifiers and comments; only whitespace, comments and further `;` may
/// follow it. The statement must start (after comments) with `SELECT` or
/// `WITH`. Returns the statement without its terminator.
pub fn check_statement(sql: &str) -> Result<&str, String> {
  let mut end = None;
  let mut first_word = String::new();
  let mut in_first_word = false;
  let mut chars = sql.char_indices().peekable();

  while let Some((i, c)) = chars.next() {
    match c {
      '-' if matches!(chars.peek(), Some((_, '-'))) => {
        for (_, n) in chars.by_ref() {
          if n == '\n' {
            break;
          }
        }
        in_first_word = false;
        continue;
      }
      '/' if matches!(chars.peek(), Some((_, '*'))) => {
        chars.next();
        let mut prev = '\0';
        for (_, n) in chars.by_ref() {
          if prev == '*' && n == '/' {
            break;
          }
          prev = n;
        }
        in_first_word = false;
        continue;
      }
      ';' => {
        end.get_or_insert(i);
        in_first_word = false;
        continue;
      }
      c if c.is_whitespace() => {
        in_first_word = false;
        continue;
      }
      _ => {}
    }

    if end.is_some() {
      return Err("only a single statement is allowed".to_owned());
    }

    match c {
      '\'' | '"' | '`' | '[' => {
        let close = if c == '[' { ']' } else { c };
        for (_, n) in chars.by_ref() {
          if n == close {
            break;
          }
        }
        in_first_word = false;
      }
      c if c.is_ascii_alphabetic() && (first_word.is_empty() || in_first_word) => {
        first_word.push(c);
        in_first_word = true;
      }
      _ => in_first_word = false,
    }
  }

  let statement = sql[..end.unwrap_or(sql.len())].trim();
  match first_word.to_ascii_uppercase().as_str() {
    "SELECT" | "WITH" => Ok(statement),
    "" => Err("empty statement".to_owned()),
    other => Err(format!("only SELECT or WITH statements are allowed, got {other}")),
  }
}
