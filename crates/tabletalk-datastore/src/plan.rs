//! Declarative mapping from workbook sheets to header layouts.
//!
//! A plan is an ordered list of rules; the first rule whose selector matches
//! a sheet decides how that sheet is read. Sheets no rule selects are not
//! imported.

use serde::{Deserialize, Serialize};

/// Which sheet a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetSelector {
  /// Zero-based position in the workbook.
  Index(usize),
  /// Exact sheet name as declared in the workbook.
  Name(String),
}

impl SheetSelector {
  pub fn matches(&self, index: usize, name: &str) -> bool {
    match self {
      SheetSelector::Index(i) => *i == index,
      SheetSelector::Name(n) => n == name,
    }
  }
}

/// Where a sheet's column names come from and where its data starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HeaderStrategy {
  /// Row 0 is the header; data follows.
  FirstRow,
  /// The first `rows` rows are banners; row `rows` is the header.
  SkipRows { rows: usize },
  /// A sparse category row combined with a base-name row. A category
  /// applies to its own column and every column to its right until the next
  /// category. Data starts after the lower of the two rows.
  DualRow {
    #[serde(default)]
    category_row: usize,
    #[serde(default = "default_name_row")]
    name_row:     usize,
  },
}

fn default_name_row() -> usize { 2 }

impl HeaderStrategy {
  /// First row holding data rather than header material.
  pub fn data_start(&self) -> usize {
    match self {
      HeaderStrategy::FirstRow => 1,
      HeaderStrategy::SkipRows { rows } => rows + 1,
      HeaderStrategy::DualRow { category_row, name_row } => category_row.max(name_row) + 1,
    }
  }
}

/// How one selected sheet is imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRule {
  pub select:            SheetSelector,
  pub header:            HeaderStrategy,
  /// Replace `=HYPERLINK("url","Label")` cells in the first two columns with
  /// their label.
  #[serde(default)]
  pub unwrap_hyperlinks: bool,
}

impl SheetRule {
  pub fn new(select: SheetSelector, header: HeaderStrategy) -> Self {
    Self { select, header, unwrap_hyperlinks: false }
  }

  pub fn unwrapping_hyperlinks(mut self) -> Self {
    self.unwrap_hyperlinks = true;
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestPlan {
  pub sheets: Vec<SheetRule>,
}

impl IngestPlan {
  /// The first rule selecting this sheet, if any.
  pub fn rule_for(&self, index: usize, name: &str) -> Option<&SheetRule> {
    self.sheets.iter().find(|r| r.select.matches(index, name))
  }
}

impl Default for IngestPlan {
  /// The layout of the advertising report export: a summary sheet first, an
  /// item sheet with two banner rows and linked item names third, a second
  /// summary sixth and a keyword sheet with grouped period headers ninth.
  fn default() -> Self {
    Self {
      sheets: vec![
        SheetRule::new(SheetSelector::Index(0), HeaderStrategy::FirstRow),
        SheetRule::new(SheetSelector::Index(2), HeaderStrategy::SkipRows { rows: 2 })
          .unwrapping_hyperlinks(),
        SheetRule::new(SheetSelector::Index(5), HeaderStrategy::FirstRow),
        SheetRule::new(
          SheetSelector::Index(8),
          HeaderStrategy::DualRow { category_row: 0, name_row: 2 },
        ),
      ],
    }
  }
}
