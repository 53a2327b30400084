//! [`SqliteStore`] — the SQLite implementation of [`ConversationStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use tabletalk_core::{
  conversation::{NewTurn, PopularQuestion, Thread, ThreadSummary, Turn},
  store::ConversationStore,
};

use crate::{
  encode::{decode_dt, encode_dt, encode_metadata, RawSummary, RawThread, RawTurn},
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A conversation log backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── ConversationStore impl ──────────────────────────────────────────────────

impl ConversationStore for SqliteStore {
  type Error = Error;

  // ── Threads ───────────────────────────────────────────────────────────────

  async fn open_thread(&self, thread_id: &str, store_id: &str) -> Result<Thread> {
    let id_str = thread_id.to_owned();
    let store_str = store_id.to_owned();
    let at_str = encode_dt(Utc::now());

    let raw: RawThread = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO conversations (thread_id, db_path, created_at)
           VALUES (?1, ?2, ?3)
           ON CONFLICT(thread_id) DO NOTHING",
          rusqlite::params![id_str, store_str, at_str],
        )?;
        let raw = tx.query_row(
          "SELECT thread_id, db_path, created_at FROM conversations WHERE thread_id = ?1",
          rusqlite::params![id_str],
          RawThread::from_row,
        )?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    let thread = raw.into_thread()?;
    if thread.store_id != store_id {
      return Err(Error::StoreMismatch {
        thread_id: thread.thread_id,
        bound:     thread.store_id,
        requested: store_id.to_owned(),
      });
    }
    tracing::debug!(thread_id, store_id, "thread opened");
    Ok(thread)
  }

  async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
    let id_str = thread_id.to_owned();

    let raw: Option<RawThread> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT thread_id, db_path, created_at FROM conversations WHERE thread_id = ?1",
              rusqlite::params![id_str],
              RawThread::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawThread::into_thread).transpose()
  }

  async fn list_threads(&self) -> Result<Vec<ThreadSummary>> {
    let raws: Vec<RawSummary> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT c.thread_id, c.db_path, c.created_at,
                  COUNT(m.id)      AS message_count,
                  MAX(m.timestamp) AS last_activity
           FROM conversations c
           LEFT JOIN messages m ON m.conversation_id = c.id
           GROUP BY c.id
           ORDER BY COALESCE(MAX(m.timestamp), c.created_at) DESC,
                    COALESCE(MAX(m.id), 0) DESC,
                    c.id DESC",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawSummary {
              thread:        RawThread::from_row(row)?,
              message_count: row.get(3)?,
              last_activity: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSummary::into_summary).collect()
  }

  // ── Turns — append-only writes ────────────────────────────────────────────

  async fn append(&self, thread_id: &str, turn: NewTurn) -> Result<Turn> {
    let mut turns = self.append_all(thread_id, vec![turn]).await?;
    // append_all returns exactly one turn per input.
    turns.pop().ok_or_else(|| Error::ThreadNotFound(thread_id.to_owned()))
  }

  async fn append_all(&self, thread_id: &str, turns: Vec<NewTurn>) -> Result<Vec<Turn>> {
    // Round-trip through the stored form so returned turns compare equal
    // to what `history` reads back.
    let at_str = encode_dt(Utc::now());
    let created_at = decode_dt(&at_str)?;
    let id_str = thread_id.to_owned();

    let rows: Vec<(String, String, Option<String>)> = turns
      .iter()
      .map(|t| {
        Ok((
          t.role.as_str().to_owned(),
          t.content.clone(),
          encode_metadata(t.metadata.as_ref())?,
        ))
      })
      .collect::<Result<_>>()?;

    let ids: Option<Vec<i64>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let conversation_id: Option<i64> = tx
          .query_row(
            "SELECT id FROM conversations WHERE thread_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;

        let Some(conversation_id) = conversation_id else {
          return Ok(None);
        };

        let mut ids = Vec::with_capacity(rows.len());
        {
          let mut stmt = tx.prepare(
            "INSERT INTO messages (conversation_id, role, content, timestamp, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)",
          )?;
          for (role, content, metadata) in &rows {
            stmt.execute(rusqlite::params![conversation_id, role, content, at_str, metadata])?;
            ids.push(tx.last_insert_rowid());
          }
        }
        tx.commit()?;
        Ok(Some(ids))
      })
      .await?;

    let ids = ids.ok_or_else(|| Error::ThreadNotFound(thread_id.to_owned()))?;
    tracing::debug!(thread_id, count = ids.len(), "appended turns");

    Ok(
      turns
        .into_iter()
        .zip(ids)
        .map(|(t, turn_id)| Turn {
          turn_id,
          thread_id: thread_id.to_owned(),
          role: t.role,
          content: t.content,
          created_at,
          metadata: t.metadata,
        })
        .collect(),
    )
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn history(&self, thread_id: &str, limit: Option<usize>) -> Result<Vec<Turn>> {
    let id_str = thread_id.to_owned();
    // SQLite treats a negative LIMIT as "no limit".
    let limit_val = limit.map(|l| l as i64).unwrap_or(-1);

    let raws: Vec<RawTurn> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT m.id, c.thread_id, m.role, m.content, m.timestamp, m.metadata
           FROM messages m
           JOIN conversations c ON c.id = m.conversation_id
           WHERE c.thread_id = ?1
           ORDER BY m.id DESC
           LIMIT ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str, limit_val], RawTurn::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    // Newest-first from SQL so LIMIT keeps the tail; flip back to
    // creation order.
    raws.into_iter().rev().map(RawTurn::into_turn).collect()
  }

  async fn popular_questions(&self, limit: usize) -> Result<Vec<PopularQuestion>> {
    let limit_val = limit as i64;

    let rows: Vec<(String, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT content, COUNT(*) AS asked
           FROM messages
           WHERE role = 'user'
           GROUP BY content
           ORDER BY asked DESC, MAX(id) DESC
           LIMIT ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit_val], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      rows
        .into_iter()
        .map(|(question, count)| PopularQuestion { question, count: count.max(0) as u64 })
        .collect(),
    )
  }
}
