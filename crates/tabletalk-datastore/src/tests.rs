//! End-to-end tests: workbooks written with `rust_xlsxwriter`, ingested into a
//! temporary data directory and read back through [`Reports`].

use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use tabletalk_core::query::{Cell, QueryOutcome};

use crate::{
  Error, HeaderStrategy, IngestPlan, Reports, SheetRule, SheetSelector, SkipReason, Source,
};

#[derive(Clone, Copy)]
enum V<'a> {
  S(&'a str),
  N(f64),
  /// A formula, stored without a calculated value.
  F(&'a str),
  Blank,
}

use V::{Blank, F, N, S};

fn write_workbook(path: &Path, sheets: &[(&str, Vec<Vec<V<'_>>>)]) {
  let mut workbook = Workbook::new();
  for (name, rows) in sheets {
    let sheet = workbook.add_worksheet();
    sheet.set_name(*name).unwrap();
    for (r, row) in rows.iter().enumerate() {
      for (c, value) in row.iter().enumerate() {
        match value {
          S(s) => {
            sheet.write_string(r as u32, c as u16, *s).unwrap();
          }
          N(n) => {
            sheet.write_number(r as u32, c as u16, *n).unwrap();
          }
          F(f) => {
            sheet.write_formula(r as u32, c as u16, *f).unwrap();
          }
          Blank => {}
        }
      }
    }
  }
  workbook.save(path).unwrap();
}

fn summary_rows(n: usize) -> Vec<Vec<V<'static>>> {
  let mut rows = vec![vec![S("Campaign Name"), S("Spend (USD)"), S("Orders")]];
  for i in 0..n {
    rows.push(vec![S("Always On"), N(10.5 + i as f64), N(i as f64)]);
  }
  rows
}

fn trend_rows() -> Vec<Vec<V<'static>>> {
  vec![
    vec![Blank, S("2023"), Blank, S("2024")],
    vec![Blank, Blank, Blank, Blank],
    vec![S("SKU"), S("Sales"), S("Units"), S("Sales")],
    vec![S("A-1"), N(100.0), N(4.0), N(120.0)],
    vec![S("A-2"), N(80.0), N(2.0), N(95.0)],
  ]
}

fn scenario_plan() -> IngestPlan {
  IngestPlan {
    sheets: vec![
      SheetRule::new(SheetSelector::Index(0), HeaderStrategy::FirstRow),
      SheetRule::new(SheetSelector::Index(2), HeaderStrategy::DualRow { category_row: 0, name_row: 2 }),
    ],
  }
}

fn scenario_workbook(dir: &Path) -> PathBuf {
  let path = dir.join("report.xlsx");
  write_workbook(
    &path,
    &[
      ("Summary", summary_rows(50)),
      ("Read Me", vec![vec![S("notes only")]]),
      ("Trend - Period", trend_rows()),
    ],
  );
  path
}

fn rows_of(outcome: QueryOutcome) -> Vec<Vec<Cell>> {
  match outcome {
    QueryOutcome::Rows(r) => r.rows,
    QueryOutcome::Error { message } => panic!("query failed: {message}"),
  }
}

fn error_of(outcome: QueryOutcome) -> String {
  match outcome {
    QueryOutcome::Error { message } => message,
    QueryOutcome::Rows(r) => panic!("expected an error, got {r:?}"),
  }
}

// ─── Ingestion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_sheet_workbook_yields_two_tables() {
  let dir = tempfile::tempdir().unwrap();
  let source = scenario_workbook(dir.path());
  let reports = Reports::new(dir.path().join("stores"), scenario_plan());

  let report = reports.ingest("ads", Source::Path(source)).await.unwrap();
  assert_eq!(report.tables.len(), 2);
  assert_eq!(report.skipped.len(), 1);
  assert_eq!(report.skipped[0].sheet_name, "Read Me");
  assert_eq!(report.skipped[0].reason, SkipReason::Unmatched);

  let schema = reports.schema("ads").await.unwrap();
  let names: Vec<&str> = schema.table_names().collect();
  assert_eq!(names, vec!["Summary", "TrendPeriod"]);
  for table in &schema.tables {
    for col in table.column_names() {
      assert!(col.chars().all(|c| c.is_alphanumeric() || c == '_'), "{col}");
    }
  }

  let summary = schema.table("Summary").unwrap();
  assert_eq!(summary.column_names().collect::<Vec<_>>(), vec![
    "Campaign_Name",
    "Spend__USD_",
    "Orders"
  ]);

  let trend = schema.table("TrendPeriod").unwrap();
  assert_eq!(trend.column_names().collect::<Vec<_>>(), vec![
    "SKU",
    "Sales_2023",
    "Units_2023",
    "Sales_2024"
  ]);

  let rows = rows_of(reports.execute("ads", "SELECT COUNT(*) FROM Summary").await);
  assert_eq!(rows, vec![vec![Cell::Integer(50)]]);
}

#[tokio::test]
async fn reingesting_same_source_gives_same_schema() {
  let dir = tempfile::tempdir().unwrap();
  let source = scenario_workbook(dir.path());
  let reports = Reports::new(dir.path(), scenario_plan());

  reports.ingest("ads", Source::Path(source.clone())).await.unwrap();
  let first = reports.schema("ads").await.unwrap();
  reports.ingest("ads", Source::Path(source)).await.unwrap();
  let second = reports.schema("ads").await.unwrap();

  assert_eq!(first, second);
  let rows = rows_of(reports.execute("ads", "SELECT COUNT(*) FROM Summary").await);
  assert_eq!(rows, vec![vec![Cell::Integer(50)]]);
}

#[tokio::test]
async fn default_plan_unwraps_item_links() {
  let dir = tempfile::tempdir().unwrap();
  let source = dir.path().join("items.xlsx");
  write_workbook(
    &source,
    &[
      ("Overview", vec![vec![S("Metric"), S("Value")], vec![S("ROAS"), N(3.5)]]),
      ("Unused", vec![vec![S("x")]]),
      ("By Item", vec![
        vec![S("Item performance")],
        vec![],
        vec![S("Item"), S("Item ID"), S("Clicks")],
        vec![S(r#"=HYPERLINK("https://shop.example/i/1","Blue Mug")"#), N(1001.0), N(5.0)],
        vec![S("Plain Plate"), S("A-2"), N(7.0)],
      ]),
    ],
  );

  let reports = Reports::new(dir.path(), IngestPlan::default());
  let bytes = std::fs::read(&source).unwrap();
  let report = reports.ingest("items", Source::Bytes(bytes)).await.unwrap();
  let tables: Vec<&str> = report.tables.iter().map(|t| t.table_name.as_str()).collect();
  assert_eq!(tables, vec!["Overview", "ByItem"]);

  let rows = rows_of(
    reports
      .execute("items", "SELECT Item, Item_ID, Clicks FROM ByItem ORDER BY Clicks")
      .await,
  );
  assert_eq!(rows, vec![
    vec![Cell::Text("Blue Mug".into()), Cell::Text("1001".into()), Cell::Integer(5)],
    vec![Cell::Text("Plain Plate".into()), Cell::Text("A-2".into()), Cell::Integer(7)],
  ]);
}

#[tokio::test]
async fn failing_sheet_is_skipped_and_others_survive() {
  let dir = tempfile::tempdir().unwrap();
  let source = dir.path().join("short.xlsx");
  write_workbook(
    &source,
    &[
      ("Summary", summary_rows(3)),
      ("Filler", vec![vec![S("x")]]),
      ("Keywords", vec![vec![S("2024")], vec![S("only two rows")]]),
    ],
  );

  let reports = Reports::new(dir.path(), scenario_plan());
  let report = reports.ingest("short", Source::Path(source)).await.unwrap();

  assert_eq!(report.tables.len(), 1);
  let failed = report.skipped.iter().find(|s| s.sheet_name == "Keywords").unwrap();
  assert!(matches!(failed.reason, SkipReason::Failed(_)));
  assert!(reports.schema("short").await.unwrap().table("Keywords").is_none());
}

#[tokio::test]
async fn colliding_table_names_are_suffixed() {
  let dir = tempfile::tempdir().unwrap();
  let source = dir.path().join("dupes.xlsx");
  let rows = || vec![vec![S("a")], vec![N(1.0)]];
  write_workbook(&source, &[("Q1 Sales", rows()), ("Q1-Sales", rows())]);

  let plan = IngestPlan {
    sheets: vec![
      SheetRule::new(SheetSelector::Index(0), HeaderStrategy::FirstRow),
      SheetRule::new(SheetSelector::Name("Q1-Sales".into()), HeaderStrategy::FirstRow),
    ],
  };
  let reports = Reports::new(dir.path(), plan);
  reports.ingest("dupes", Source::Path(source)).await.unwrap();

  let schema = reports.schema("dupes").await.unwrap();
  assert_eq!(schema.table_names().collect::<Vec<_>>(), vec!["Q1Sales", "Q1Sales_1"]);
}

#[tokio::test]
async fn suffixed_table_name_never_replaces_an_earlier_table() {
  let dir = tempfile::tempdir().unwrap();
  let source = dir.path().join("quarters.xlsx");
  write_workbook(&source, &[
    ("Q1_2", vec![vec![S("a")], vec![N(1.0)]]),
    ("Q1", vec![vec![S("a")], vec![N(2.0)]]),
    ("Q1-", vec![vec![S("a")], vec![N(3.0)]]),
  ]);

  let plan = IngestPlan {
    sheets: (0..3).map(|i| SheetRule::new(SheetSelector::Index(i), HeaderStrategy::FirstRow)).collect(),
  };
  let reports = Reports::new(dir.path(), plan);
  let report = reports.ingest("quarters", Source::Path(source)).await.unwrap();

  let reported: Vec<&str> = report.tables.iter().map(|t| t.table_name.as_str()).collect();
  assert_eq!(reported, vec!["Q1_2", "Q1", "Q1_2_1"]);

  let schema = reports.schema("quarters").await.unwrap();
  let mut stored: Vec<&str> = schema.table_names().collect();
  stored.sort_unstable();
  assert_eq!(stored, vec!["Q1", "Q1_2", "Q1_2_1"]);

  for (table, value) in [("Q1_2", 1), ("Q1", 2), ("Q1_2_1", 3)] {
    let rows = rows_of(reports.execute("quarters", &format!("SELECT a FROM {table}")).await);
    assert_eq!(rows, vec![vec![Cell::Integer(value)]], "{table}");
  }
}

#[tokio::test]
async fn far_apart_cells_ingest_without_filling_the_gap() {
  let dir = tempfile::tempdir().unwrap();
  let source = dir.path().join("sparse.xlsx");
  let mut workbook = Workbook::new();
  let sheet = workbook.add_worksheet();
  sheet.set_name("Sparse").unwrap();
  sheet.write_string(0, 0, "Id").unwrap();
  sheet.write_number(1, 0, 1).unwrap();
  sheet.write_number(40_000, 600, 2).unwrap();
  workbook.save(&source).unwrap();

  let plan = IngestPlan { sheets: vec![SheetRule::new(SheetSelector::Index(0), HeaderStrategy::FirstRow)] };
  let reports = Reports::new(dir.path(), plan);
  let report = reports.ingest("sparse", Source::Path(source)).await.unwrap();

  assert_eq!(report.tables.len(), 1, "{:?}", report.skipped);
  assert_eq!(report.tables[0].rows, 2);
  assert_eq!(report.tables[0].columns.len(), 601);
  let rows = rows_of(reports.execute("sparse", "SELECT Id, col_600 FROM Sparse ORDER BY Id").await);
  assert_eq!(rows, vec![vec![Cell::Null, Cell::Integer(2)], vec![Cell::Integer(1), Cell::Null]]);
}

#[tokio::test]
async fn uncalculated_hyperlink_formulas_unwrap_to_their_label() {
  let dir = tempfile::tempdir().unwrap();
  let source = dir.path().join("links.xlsx");
  write_workbook(&source, &[(
    "Items",
    vec![
      vec![S("Item"), S("Clicks"), S("Total")],
      vec![F(r#"=HYPERLINK("https://x.example/1","Blue Mug")"#), N(5.0), F("=1+1")],
    ],
  )]);

  let plan = IngestPlan {
    sheets: vec![SheetRule::new(SheetSelector::Index(0), HeaderStrategy::FirstRow).unwrapping_hyperlinks()],
  };
  let reports = Reports::new(dir.path(), plan);
  reports.ingest("links", Source::Path(source)).await.unwrap();

  let rows = rows_of(reports.execute("links", "SELECT Item, Clicks, Total FROM Items").await);
  assert_eq!(rows, vec![vec![Cell::Text("Blue Mug".into()), Cell::Text("5".into()), Cell::Integer(0)]]);
}

#[tokio::test]
async fn unreadable_source_keeps_existing_store() {
  let dir = tempfile::tempdir().unwrap();
  let source = scenario_workbook(dir.path());
  let reports = Reports::new(dir.path(), scenario_plan());
  reports.ingest("ads", Source::Path(source)).await.unwrap();

  let err = reports
    .ingest("ads", Source::Bytes(b"definitely not a workbook".to_vec()))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Workbook(_)), "{err}");
  assert_eq!(reports.schema("ads").await.unwrap().tables.len(), 2);
}

// ─── Introspection ───────────────────────────────────────────────────────────

#[tokio::test]
async fn schema_lists_tables_created_outside_ingestion() {
  let dir = tempfile::tempdir().unwrap();
  let source = scenario_workbook(dir.path());
  let reports = Reports::new(dir.path(), scenario_plan());
  reports.ingest("ads", Source::Path(source)).await.unwrap();

  let path = reports.store_path("ads").unwrap();
  rusqlite::Connection::open(&path)
    .unwrap()
    .execute_batch("CREATE TABLE manual_notes (note TEXT, weight REAL);")
    .unwrap();

  let schema = reports.schema("ads").await.unwrap();
  let notes = schema.table("manual_notes").unwrap();
  assert_eq!(notes.columns[1].ty.as_sql(), "REAL");
  assert!(schema.describe().contains("Table: manual_notes\nColumns: note (TEXT), weight (REAL)"));
}

#[tokio::test]
async fn schema_of_missing_store_is_not_found() {
  let dir = tempfile::tempdir().unwrap();
  let reports = Reports::new(dir.path(), IngestPlan::default());
  assert!(matches!(reports.schema("nothing").await, Err(Error::StoreNotFound(_))));
  assert!(!reports.exists("nothing"));
}

// ─── Query executor ──────────────────────────────────────────────────────────

#[tokio::test]
async fn executor_returns_errors_as_text() {
  let dir = tempfile::tempdir().unwrap();
  let source = scenario_workbook(dir.path());
  let reports = Reports::new(dir.path(), scenario_plan());
  reports.ingest("ads", Source::Path(source)).await.unwrap();

  for sql in [
    "",
    "DROP TABLE Summary",
    "SELECT * FROM no_such_table",
    "WITH doomed AS (SELECT 1) DELETE FROM Summary",
    "SELECT 1; SELECT 2",
  ] {
    let message = error_of(reports.execute("ads", sql).await);
    assert!(message.starts_with("Error executing query: "), "{sql:?}: {message}");
  }

  let missing = error_of(reports.execute("ads", "SELECT * FROM no_such_table").await);
  assert!(missing.contains("no_such_table"), "{missing}");

  // Nothing was modified.
  let rows = rows_of(reports.execute("ads", "SELECT COUNT(*) FROM Summary;").await);
  assert_eq!(rows, vec![vec![Cell::Integer(50)]]);
}

#[tokio::test]
async fn executor_handles_missing_store_and_bad_ids() {
  let dir = tempfile::tempdir().unwrap();
  let reports = Reports::new(dir.path(), IngestPlan::default());

  let message = error_of(reports.execute("ghost", "SELECT 1").await);
  assert!(message.contains("not found"), "{message}");
  let message = error_of(reports.execute("../escape", "SELECT 1").await);
  assert!(message.contains("invalid store id"), "{message}");
}

#[tokio::test]
async fn concurrent_readers_share_a_store() {
  let dir = tempfile::tempdir().unwrap();
  let source = scenario_workbook(dir.path());
  let reports = Reports::new(dir.path(), scenario_plan());
  reports.ingest("ads", Source::Path(source)).await.unwrap();

  let (a, b) = tokio::join!(
    reports.execute("ads", "SELECT SUM(Orders) FROM Summary"),
    reports.execute("ads", "SELECT SKU FROM TrendPeriod ORDER BY SKU"),
  );
  assert_eq!(rows_of(a), vec![vec![Cell::Integer((0..50).sum())]]);
  assert_eq!(rows_of(b).len(), 2);
}
