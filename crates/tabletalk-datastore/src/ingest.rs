//! Workbook → SQLite ingestion.
//!
//! The target store is replaced wholesale: the database file and its WAL
//! siblings are removed, then each sheet the plan selects is written as one
//! table inside its own transaction. A sheet that fails is logged, rolled
//! back and listed in the report; it never aborts the other sheets.

use std::{
  collections::HashSet,
  io::{Cursor, Read, Seek},
  path::{Path, PathBuf},
};

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Reader, Sheets};
use chrono::{Duration, NaiveDate};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use tabletalk_core::query::Cell;

use crate::{
  error::SheetError,
  normalize::{self, Table, HYPERLINK_COLUMNS, MAX_CELLS},
  plan::{IngestPlan, SheetRule},
  sanitize::{self, quote_ident},
  Result,
};

/// Where the workbook comes from.
#[derive(Debug, Clone)]
pub enum Source {
  Path(PathBuf),
  Bytes(Vec<u8>),
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
  pub store_path: PathBuf,
  pub tables:     Vec<TableReport>,
  pub skipped:    Vec<SkippedSheet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableReport {
  pub sheet_name: String,
  pub table_name: String,
  pub rows:       usize,
  pub columns:    Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSheet {
  pub sheet_name: String,
  pub index:      usize,
  pub reason:     SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
  /// No rule in the plan selects this sheet.
  Unmatched,
  /// The sheet was selected but could not be imported.
  Failed(String),
}

// ─── Entry point ─────────────────────────────────────────────────────────────

/// Build the store at `target` from `source`. Blocking.
///
/// The source is opened before the target is touched, so an unreadable
/// workbook leaves an existing store in place.
pub fn ingest_workbook(source: Source, target: &Path, plan: &IngestPlan) -> Result<IngestReport> {
  match source {
    Source::Path(path) => {
      let workbook = open_workbook_auto(&path)?;
      ingest_sheets(workbook, target, plan)
    }
    Source::Bytes(bytes) => {
      let workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
      ingest_sheets(workbook, target, plan)
    }
  }
}

fn ingest_sheets<RS: Read + Seek>(
  mut workbook: Sheets<RS>,
  target: &Path,
  plan: &IngestPlan,
) -> Result<IngestReport> {
  remove_store(target)?;
  if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)?;
  }
  let mut conn = rusqlite::Connection::open(target)?;

  let mut report = IngestReport {
    store_path: target.to_path_buf(),
    tables:     Vec::new(),
    skipped:    Vec::new(),
  };
  let mut used_names = HashSet::new();

  let sheet_names = workbook.sheet_names().to_vec();
  for (index, sheet_name) in sheet_names.iter().enumerate() {
    let Some(rule) = plan.rule_for(index, sheet_name) else {
      tracing::debug!(sheet = %sheet_name, index, "sheet not selected by plan");
      report.skipped.push(SkippedSheet {
        sheet_name: sheet_name.clone(),
        index,
        reason: SkipReason::Unmatched,
      });
      continue;
    };

    let table_name = unused_table_name(sanitize::table_name(sheet_name, index), index, &used_names);

    let imported = read_grid(&mut workbook, sheet_name, rule)
      .and_then(|grid| normalize::normalize(&grid, rule))
      .and_then(|table| write_table(&mut conn, &table_name, &table).map(|()| table));

    match imported {
      Ok(table) => {
        tracing::info!(
          sheet = %sheet_name,
          table = %table_name,
          rows = table.rows.len(),
          columns = table.columns.len(),
          "sheet imported"
        );
        used_names.insert(table_name.to_lowercase());
        report.tables.push(TableReport {
          sheet_name: sheet_name.clone(),
          table_name,
          rows: table.rows.len(),
          columns: table.columns,
        });
      }
      Err(e) => {
        tracing::warn!(sheet = %sheet_name, index, error = %e, "could not import sheet");
        report.skipped.push(SkippedSheet {
          sheet_name: sheet_name.clone(),
          index,
          reason: SkipReason::Failed(e.to_string()),
        });
      }
    }
  }

  Ok(report)
}

/// A name already taken earlier in this ingestion gets `_{index}`, then a
/// counter on top of that until it is free.
fn unused_table_name(name: String, index: usize, used: &HashSet<String>) -> String {
  if !used.contains(&name.to_lowercase()) {
    return name;
  }
  let base = format!("{name}_{index}");
  let mut candidate = base.clone();
  let mut n = 1;
  while used.contains(&candidate.to_lowercase()) {
    candidate = format!("{base}_{n}");
    n += 1;
  }
  candidate
}

/// Delete a store file and its WAL/shared-memory siblings.
fn remove_store(target: &Path) -> Result<()> {
  for suffix in ["", "-wal", "-shm"] {
    let mut path = target.as_os_str().to_owned();
    path.push(suffix);
    match std::fs::remove_file(&path) {
      Ok(()) => {}
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => return Err(e.into()),
    }
  }
  Ok(())
}

// ─── Reading ─────────────────────────────────────────────────────────────────

/// Last row index a worksheet can address.
const MAX_ROW: usize = 1_048_575;
/// Last column index a worksheet can address (`XFD`).
const MAX_COLUMN: usize = 16_383;

/// The sheet as a grid anchored at A1.
///
/// Xlsx and xlsb sheets are streamed cell by cell, so empty cells between
/// far-apart values are never materialised. A cell with a formula but no
/// cached value takes the formula text. In the link columns of a
/// hyperlink-unwrap rule, a `HYPERLINK` formula wins over its cached value,
/// since exporters that never calculate cache a `0` there.
fn read_grid<RS: Read + Seek>(
  workbook: &mut Sheets<RS>,
  sheet_name: &str,
  rule: &SheetRule,
) -> Result<Vec<Vec<Cell>>, SheetError> {
  let mut grid = GridBuilder::new(rule);
  match workbook {
    Sheets::Xlsx(xlsx) => {
      {
        let mut cells = xlsx.worksheet_cells_reader(sheet_name).map_err(read_error)?;
        while let Some(cell) = cells.next_cell().map_err(read_error)? {
          let (row, col) = cell.get_position();
          grid.put(row as usize, col as usize, data_to_cell(&Data::from(cell.get_value().clone())))?;
        }
      }
      let mut formulas = xlsx.worksheet_cells_reader(sheet_name).map_err(read_error)?;
      while let Some(cell) = formulas.next_formula().map_err(read_error)? {
        let (row, col) = cell.get_position();
        grid.formula(row as usize, col as usize, cell.get_value())?;
      }
    }
    Sheets::Xlsb(xlsb) => {
      {
        let mut cells = xlsb.worksheet_cells_reader(sheet_name).map_err(read_error)?;
        while let Some(cell) = cells.next_cell().map_err(read_error)? {
          let (row, col) = cell.get_position();
          grid.put(row as usize, col as usize, data_to_cell(&Data::from(cell.get_value().clone())))?;
        }
      }
      let mut formulas = xlsb.worksheet_cells_reader(sheet_name).map_err(read_error)?;
      while let Some(cell) = formulas.next_formula().map_err(read_error)? {
        let (row, col) = cell.get_position();
        grid.formula(row as usize, col as usize, cell.get_value())?;
      }
    }
    other => {
      let range = other.worksheet_range(sheet_name).map_err(read_error)?;
      let (r0, c0) = range.start().unwrap_or((0, 0));
      for (r, c, value) in range.used_cells() {
        grid.put(r0 as usize + r, c0 as usize + c, data_to_cell(value))?;
      }
      if let Ok(formulas) = other.worksheet_formula(sheet_name) {
        let (r0, c0) = formulas.start().unwrap_or((0, 0));
        for (r, c, formula) in formulas.used_cells() {
          grid.formula(r0 as usize + r, c0 as usize + c, formula)?;
        }
      }
    }
  }
  Ok(grid.finish())
}

fn read_error(e: impl std::fmt::Display) -> SheetError { SheetError::Read(e.to_string()) }

/// Places cells by position, growing each row only as far as its last value.
struct GridBuilder {
  rows:      Vec<Vec<Cell>>,
  allocated: usize,
  limit:     usize,
  link_from: Option<usize>,
}

impl GridBuilder {
  fn new(rule: &SheetRule) -> Self {
    Self {
      rows:      Vec::new(),
      allocated: 0,
      limit:     MAX_CELLS,
      link_from: rule.unwrap_hyperlinks.then(|| rule.header.data_start()),
    }
  }

  fn put(&mut self, row: usize, col: usize, cell: Cell) -> Result<(), SheetError> {
    if cell == Cell::Null {
      return Ok(());
    }
    if row > MAX_ROW || col > MAX_COLUMN {
      return Err(SheetError::OutOfBounds { row, column: col });
    }

    let grow = (col + 1).saturating_sub(self.rows.get(row).map_or(0, Vec::len));
    self.allocated += grow;
    if self.allocated > self.limit {
      return Err(SheetError::TooLarge { limit: self.limit });
    }

    if row >= self.rows.len() {
      self.rows.resize_with(row + 1, Vec::new);
    }
    let cells = &mut self.rows[row];
    if col >= cells.len() {
      cells.resize(col + 1, Cell::Null);
    }
    cells[col] = cell;
    Ok(())
  }

  fn formula(&mut self, row: usize, col: usize, formula: &str) -> Result<(), SheetError> {
    if formula.is_empty() {
      return Ok(());
    }
    let text = format!("={formula}");
    let uncached = self.rows.get(row).and_then(|r| r.get(col)).is_none_or(|c| *c == Cell::Null);
    let in_link_column = self.link_from.is_some_and(|from| row >= from) && col < HYPERLINK_COLUMNS;

    if uncached || (in_link_column && normalize::is_hyperlink(&text)) {
      self.put(row, col, Cell::Text(text))?;
    }
    Ok(())
  }

  fn finish(self) -> Vec<Vec<Cell>> { self.rows }
}

/// Map one workbook value onto a storage cell.
pub fn data_to_cell(value: &Data) -> Cell {
  match value {
    Data::Empty | Data::Error(_) => Cell::Null,
    Data::Int(i) => Cell::Integer(*i),
    Data::Float(f) => {
      if f.fract() == 0.0 && f.abs() < 1e15 {
        Cell::Integer(*f as i64)
      } else {
        Cell::Real(*f)
      }
    }
    Data::Bool(b) => Cell::Integer(i64::from(*b)),
    Data::String(s) if s.trim().is_empty() => Cell::Null,
    Data::String(s) => Cell::Text(s.clone()),
    Data::DateTime(dt) => serial_to_text(dt.as_f64()).map_or(Cell::Real(dt.as_f64()), Cell::Text),
    Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
  }
}

/// Render a 1900-system date serial as `YYYY-MM-DD HH:MM:SS`.
pub fn serial_to_text(serial: f64) -> Option<String> {
  let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
  let millis = (serial * 86_400_000.0).round();
  if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
    return None;
  }
  let at = epoch.checked_add_signed(Duration::try_milliseconds(millis as i64)?)?;
  Some(at.format("%Y-%m-%d %H:%M:%S").to_string())
}

// ─── Writing ─────────────────────────────────────────────────────────────────

fn write_table(conn: &mut rusqlite::Connection, name: &str, table: &Table) -> Result<(), SheetError> {
  let tx = conn.transaction()?;
  let quoted = quote_ident(name);

  tx.execute_batch(&format!("DROP TABLE IF EXISTS {quoted};"))?;

  let column_defs: Vec<String> = table
    .columns
    .iter()
    .zip(&table.types)
    .map(|(c, ty)| format!("{} {}", quote_ident(c), ty.as_sql()))
    .collect();
  tx.execute_batch(&format!("CREATE TABLE {quoted} ({});", column_defs.join(", ")))?;

  {
    let placeholders = vec!["?"; table.columns.len()].join(", ");
    let mut stmt = tx.prepare(&format!("INSERT INTO {quoted} VALUES ({placeholders})"))?;
    for row in &table.rows {
      stmt.execute(rusqlite::params_from_iter(row.iter().map(cell_to_value)))?;
    }
  }

  tx.commit()?;
  Ok(())
}

fn cell_to_value(cell: &Cell) -> Value {
  match cell {
    Cell::Null => Value::Null,
    Cell::Integer(i) => Value::Integer(*i),
    Cell::Real(f) => Value::Real(*f),
    Cell::Text(s) => Value::Text(s.clone()),
    Cell::Blob(b) => Value::Blob(b.clone()),
  }
}
