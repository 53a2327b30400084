//! Turning a raw cell grid into a typed table.
//!
//! Input is the sheet as a dense grid anchored at A1; output is a list of
//! sanitised column names, an inferred type per column and the data rows.

use std::sync::LazyLock;

use regex::Regex;
use tabletalk_core::{query::Cell, schema::ColumnType};

use crate::{
  error::SheetError,
  plan::{HeaderStrategy, SheetRule},
  sanitize,
};

static HYPERLINK: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"=HYPERLINK\s*\(\s*"[^"]*"\s*,\s*"([^"]*)"\s*\)"#).expect("valid hyperlink pattern")
});

/// Number of leading columns subject to hyperlink unwrapping.
pub const HYPERLINK_COLUMNS: usize = 2;

/// Cells one sheet may occupy, empty padding included.
pub const MAX_CELLS: usize = 5_000_000;

/// A sheet ready to be written as one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
  pub columns: Vec<String>,
  pub types:   Vec<ColumnType>,
  pub rows:    Vec<Vec<Cell>>,
}

/// Apply a sheet rule to a grid.
pub fn normalize(grid: &[Vec<Cell>], rule: &SheetRule) -> Result<Table, SheetError> {
  let width = grid.iter().map(Vec::len).max().unwrap_or(0);
  if width == 0 {
    return Err(SheetError::NoColumns);
  }

  let needed = rule.header.data_start();
  if grid.len() < needed {
    return Err(SheetError::NotEnoughRows { needed, found: grid.len() });
  }

  let raw_headers = match &rule.header {
    HeaderStrategy::FirstRow => single_row_headers(&grid[0], width),
    HeaderStrategy::SkipRows { rows } => single_row_headers(&grid[*rows], width),
    HeaderStrategy::DualRow { category_row, name_row } => {
      dual_row_headers(&grid[*category_row], &grid[*name_row], width)
    }
  };
  let columns = sanitize::column_names(&raw_headers);

  let data: Vec<&Vec<Cell>> = grid[needed..]
    .iter()
    .filter(|row| row.iter().any(|c| !is_blank(c)))
    .collect();
  if data.len().saturating_mul(width) > MAX_CELLS {
    return Err(SheetError::TooLarge { limit: MAX_CELLS });
  }

  let mut rows: Vec<Vec<Cell>> = data
    .into_iter()
    .map(|row| {
      let mut row: Vec<Cell> = row.iter().take(width).cloned().collect();
      row.resize(width, Cell::Null);
      row
    })
    .collect();

  if rule.unwrap_hyperlinks {
    for row in &mut rows {
      for cell in row.iter_mut().take(HYPERLINK_COLUMNS) {
        *cell = unwrap_hyperlink(std::mem::replace(cell, Cell::Null));
      }
    }
  }

  let types: Vec<ColumnType> = (0..width).map(|i| infer_type(rows.iter().map(|r| &r[i]))).collect();
  for row in &mut rows {
    for (cell, ty) in row.iter_mut().zip(&types) {
      coerce(cell, ty);
    }
  }

  Ok(Table { columns, types, rows })
}

// ─── Headers ─────────────────────────────────────────────────────────────────

fn single_row_headers(row: &[Cell], width: usize) -> Vec<String> {
  (0..width).map(|i| row.get(i).map(header_text).unwrap_or_default()).collect()
}

/// Combine a sparse category row with a base-name row.
///
/// A category carries forward to the right until replaced. A missing base
/// name becomes `col_{i}`.
fn dual_row_headers(categories: &[Cell], names: &[Cell], width: usize) -> Vec<String> {
  let mut current: Option<String> = None;
  (0..width)
    .map(|i| {
      if let Some(cat) = categories.get(i).map(header_text).filter(|s| !s.is_empty()) {
        current = Some(cat);
      }
      let base = names
        .get(i)
        .map(header_text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("col_{i}"));
      match &current {
        Some(cat) => format!("{base}_{cat}"),
        None => base,
      }
    })
    .collect()
}

/// Header text of a cell; whole numbers print without a fraction.
pub fn header_text(cell: &Cell) -> String {
  match cell {
    Cell::Null | Cell::Blob(_) => String::new(),
    Cell::Integer(i) => i.to_string(),
    Cell::Real(f) => f.to_string(),
    Cell::Text(s) => s.trim().to_owned(),
  }
}

// ─── Cells ───────────────────────────────────────────────────────────────────

fn is_blank(cell: &Cell) -> bool {
  match cell {
    Cell::Null => true,
    Cell::Text(s) => s.trim().is_empty(),
    _ => false,
  }
}

/// Whether `text` holds a `=HYPERLINK("url","Label")` formula.
pub fn is_hyperlink(text: &str) -> bool { HYPERLINK.is_match(text) }

/// Replace `=HYPERLINK("url","Label")` with `Label`. Other values in the
/// link columns are coerced to text; empty cells stay empty.
pub fn unwrap_hyperlink(cell: Cell) -> Cell {
  match cell {
    Cell::Text(s) => match HYPERLINK.captures(&s).and_then(|c| c.get(1)) {
      Some(label) => Cell::Text(label.as_str().to_owned()),
      None => Cell::Text(s),
    },
    Cell::Null => Cell::Null,
    other => Cell::Text(stringify(&other)),
  }
}

/// The narrowest storage type holding every non-null value.
pub fn infer_type<'a>(values: impl Iterator<Item = &'a Cell>) -> ColumnType {
  let mut seen_any = false;
  let mut all_int = true;
  let mut all_num = true;
  for v in values {
    match v {
      Cell::Null => continue,
      Cell::Integer(_) => {}
      Cell::Real(_) => all_int = false,
      Cell::Text(_) | Cell::Blob(_) => {
        all_int = false;
        all_num = false;
      }
    }
    seen_any = true;
  }

  match (seen_any, all_int, all_num) {
    (false, ..) => ColumnType::Text,
    (true, true, _) => ColumnType::Integer,
    (true, false, true) => ColumnType::Real,
    _ => ColumnType::Text,
  }
}

fn coerce(cell: &mut Cell, ty: &ColumnType) {
  let next = match (&*cell, ty) {
    (Cell::Null, _) => return,
    (Cell::Integer(i), ColumnType::Real) => Cell::Real(*i as f64),
    (Cell::Integer(_) | Cell::Real(_) | Cell::Blob(_), ColumnType::Text) => Cell::Text(stringify(cell)),
    _ => return,
  };
  *cell = next;
}

fn stringify(cell: &Cell) -> String {
  match cell {
    Cell::Null => String::new(),
    Cell::Integer(i) => i.to_string(),
    Cell::Real(f) => f.to_string(),
    Cell::Text(s) => s.clone(),
    Cell::Blob(b) => String::from_utf8_lossy(b).into_owned(),
  }
}
