//! Identifier sanitisation for table and column names.

use std::collections::HashSet;

/// Characters in header text that become `_` in column names.
const COLUMN_SEPARATORS: &[char] = &[' ', '(', ')', '.', '-', '/', '\\'];

/// Sanitise one header cell into a column name.
///
/// Whitespace and punctuation become `_`; an empty header becomes
/// `col_{index}`.
pub fn column_name(raw: &str, index: usize) -> String {
  let name: String = raw
    .chars()
    .map(|c| {
      if COLUMN_SEPARATORS.contains(&c) || !(c.is_alphanumeric() || c == '_') {
        '_'
      } else {
        c
      }
    })
    .collect();

  if raw.trim().is_empty() { format!("col_{index}") } else { name }
}

/// Sanitise a full header row and make every name unique.
///
/// Comparison is case-insensitive, as SQLite's is; later duplicates get
/// `_1`, `_2`, … suffixes.
pub fn column_names<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
  let mut seen = HashSet::new();
  raw
    .iter()
    .enumerate()
    .map(|(i, h)| unique(column_name(h.as_ref(), i), &mut seen))
    .collect()
}

/// Sanitise a sheet name into a table name: only alphanumerics and `_`
/// survive. An empty result becomes `table_{index}`.
pub fn table_name(sheet_name: &str, index: usize) -> String {
  let name: String = sheet_name
    .chars()
    .filter(|c| c.is_alphanumeric() || *c == '_')
    .collect();
  if name.is_empty() { format!("table_{index}") } else { name }
}

/// Quote an identifier for use in generated SQL.
pub fn quote_ident(name: &str) -> String {
  format!("\"{}\"", name.replace('"', "\"\""))
}

fn unique(name: String, seen: &mut HashSet<String>) -> String {
  if seen.insert(name.to_lowercase()) {
    return name;
  }
  let mut n = 1;
  loop {
    let candidate = format!("{name}_{n}");
    if seen.insert(candidate.to_lowercase()) {
      return candidate;
    }
    n += 1;
  }
}
