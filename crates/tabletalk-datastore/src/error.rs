//! Error types for `tabletalk-datastore`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The source workbook could not be opened at all.
  #[error("could not open workbook: {0}")]
  Workbook(#[from] calamine::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("report store not found: {0}")]
  StoreNotFound(PathBuf),

  #[error("invalid store id {0:?}: expected 1-64 characters of [A-Za-z0-9_-]")]
  InvalidStoreId(String),

  #[error("ingestion task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why a single sheet could not be imported. Never fatal to an ingestion.
#[derive(Debug, Error)]
pub enum SheetError {
  #[error("could not read sheet: {0}")]
  Read(String),

  #[error("sheet has {found} rows, header layout needs at least {needed}")]
  NotEnoughRows { needed: usize, found: usize },

  #[error("sheet has no columns")]
  NoColumns,

  #[error("sheet has a cell at row {row}, column {column}, outside the worksheet limits")]
  OutOfBounds { row: usize, column: usize },

  #[error("sheet needs more than {limit} cells")]
  TooLarge { limit: usize },

  #[error("could not write table: {0}")]
  Write(#[from] rusqlite::Error),
}
