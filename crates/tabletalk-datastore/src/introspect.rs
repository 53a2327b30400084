//! Reading a store's catalog.

use std::path::Path;

use rusqlite::OpenFlags;
use tabletalk_core::schema::{Column, ColumnType, Schema, TableSchema};

use crate::{Error, Result};

/// Open an existing store without write access.
pub(crate) async fn open_read_only(path: &Path) -> Result<tokio_rusqlite::Connection> {
  if !path.is_file() {
    return Err(Error::StoreNotFound(path.to_path_buf()));
  }
  let conn = tokio_rusqlite::Connection::open_with_flags(
    path,
    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI,
  )
  .await?;
  Ok(conn)
}

/// Every user table in the store with its columns in declaration order.
///
/// Reads the live catalog, so tables created outside ingestion are listed
/// too. SQLite's internal `sqlite_%` tables are not.
pub async fn read_schema(path: &Path) -> Result<Schema> {
  let conn = open_read_only(path).await?;

  let tables = conn
    .call(|conn| {
      let names: Vec<String> = conn
        .prepare(
          "SELECT name FROM sqlite_master
           WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?
        .query_map([], |r| r.get(0))?
        .collect::<rusqlite::Result<_>>()?;

      let mut columns = conn.prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
      let mut tables = Vec::with_capacity(names.len());
      for name in names {
        let cols: Vec<(String, String)> = columns
          .query_map([&name], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<_>>()?;
        tables.push((name, cols));
      }
      Ok(tables)
    })
    .await?;

  Ok(Schema {
    tables: tables
      .into_iter()
      .map(|(name, cols)| TableSchema {
        name,
        columns: cols
          .into_iter()
          .map(|(name, ty)| Column { name, ty: ColumnType::from(ty.as_str()) })
          .collect(),
      })
      .collect(),
  })
}
