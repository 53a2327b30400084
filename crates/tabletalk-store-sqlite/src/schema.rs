//! SQL schema for the conversation log.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per thread. `db_path` holds the report store id the thread is
-- bound to and never changes after insert.
CREATE TABLE IF NOT EXISTS conversations (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id   TEXT NOT NULL UNIQUE,
    db_path     TEXT NOT NULL,
    created_at  TEXT NOT NULL      -- RFC 3339 UTC, fixed-width micros
);

-- Strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS messages (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id  INTEGER NOT NULL REFERENCES conversations(id),
    role             TEXT NOT NULL,   -- 'system' | 'user' | 'assistant'
    content          TEXT NOT NULL,
    timestamp        TEXT NOT NULL,   -- server-assigned
    metadata         TEXT             -- JSON object or NULL
);

CREATE INDEX IF NOT EXISTS messages_conversation_idx ON messages(conversation_id, id);
CREATE INDEX IF NOT EXISTS messages_role_idx         ON messages(role);

PRAGMA user_version = 1;
";
