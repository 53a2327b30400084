//! Relational schema of a report store, as seen through the store's own
//! catalog.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared storage type of a column.
///
/// Tables written by the ingestion engine only use the first three; tables
/// created by other means may declare anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnType {
  Text,
  Integer,
  Real,
  Other(String),
}

impl ColumnType {
  pub fn as_sql(&self) -> &str {
    match self {
      ColumnType::Text => "TEXT",
      ColumnType::Integer => "INTEGER",
      ColumnType::Real => "REAL",
      ColumnType::Other(s) => s,
    }
  }
}

impl From<&str> for ColumnType {
  fn from(s: &str) -> Self {
    match s.to_ascii_uppercase().as_str() {
      "TEXT" => ColumnType::Text,
      "INTEGER" => ColumnType::Integer,
      "REAL" => ColumnType::Real,
      _ => ColumnType::Other(s.to_owned()),
    }
  }
}

impl From<String> for ColumnType {
  fn from(s: String) -> Self { ColumnType::from(s.as_str()) }
}

impl From<ColumnType> for String {
  fn from(t: ColumnType) -> Self { t.as_sql().to_owned() }
}

impl fmt::Display for ColumnType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_sql())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
  pub name: String,
  #[serde(rename = "type")]
  pub ty:   ColumnType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
  pub name:    String,
  /// In declaration order.
  pub columns: Vec<Column>,
}

impl TableSchema {
  pub fn column_names(&self) -> impl Iterator<Item = &str> {
    self.columns.iter().map(|c| c.name.as_str())
  }
}

/// Every table in a store, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
  pub tables: Vec<TableSchema>,
}

impl Schema {
  pub fn table(&self, name: &str) -> Option<&TableSchema> {
    self.tables.iter().find(|t| t.name == name)
  }

  pub fn table_names(&self) -> impl Iterator<Item = &str> {
    self.tables.iter().map(|t| t.name.as_str())
  }

  pub fn is_empty(&self) -> bool { self.tables.is_empty() }

  /// Render the schema as prompt text, two lines per table:
  ///
  /// ```text
  /// Table: Summary
  /// Columns: SKU (TEXT), Sales (REAL)
  /// ```
  pub fn describe(&self) -> String {
    self
      .tables
      .iter()
      .map(|t| {
        let columns = t
          .columns
          .iter()
          .map(|c| format!("{} ({})", c.name, c.ty))
          .collect::<Vec<_>>()
          .join(", ");
        format!("Table: {}\nColumns: {columns}", t.name)
      })
      .collect::<Vec<_>>()
      .join("\n")
  }
}
