//! System instructions built around a schema snapshot.

use serde::{Deserialize, Serialize};
use tabletalk_core::schema::Schema;

use crate::PromptError;

/// The placeholder replaced by [`Schema::describe`].
pub const SCHEMA_SLOT: &str = "{schema}";

/// What the assistant says when asked about anything but the report.
pub const REFUSAL: &str = "I'm sorry, but I can only assist with questions related to the database \
                           and e-commerce metrics. Please ask a question related to sales, customer \
                           behavior, product performance, or inventory.";

const DEFAULT_BODY: &str = "\
You are an e-commerce data analyst. You answer questions about a seller's advertising and sales \
report, which has been loaded into a SQLite database.

Metrics you know how to compute:
- TACOS = (total ad spend / total net sales) * 100
- ROAS = ad sales / ad spend
- CTR = ad clicks / ad impressions
- Organic conversion = organic units sold / organic views

How to answer:
1. Work out which tables and columns the question needs from the schema below. Use only those \
tables and columns.
2. Write one valid SQLite SELECT statement and run it with database_query_tool. If it returns \
an error, read the message, fix the statement and try again.
3. Answer concisely from the results. Lead with the key figures, give data as a markdown \
table, and ask a clarifying question when the request is ambiguous.

If a user asks a follow-up question, keep presenting data in the same table shape as the \
previous answer where possible.

If a question is not about the database or e-commerce metrics, reply with exactly:
{refusal}

Database schema:
{schema}";

/// A fixed instruction body with one schema slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
  pub body:            String,
  /// Tables the body names explicitly; rendering fails if the schema lacks
  /// any of them.
  #[serde(default)]
  pub required_tables: Vec<String>,
}

impl Default for PromptTemplate {
  fn default() -> Self {
    Self { body: DEFAULT_BODY.replace("{refusal}", REFUSAL), required_tables: Vec::new() }
  }
}

impl PromptTemplate {
  pub fn new(body: impl Into<String>) -> Self {
    Self { body: body.into(), required_tables: Vec::new() }
  }

  pub fn requiring_tables<I, S>(mut self, tables: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.required_tables = tables.into_iter().map(Into::into).collect();
    self
  }

  /// Check the body on its own, before any schema is known.
  pub fn validate(&self) -> Result<(), PromptError> {
    match self.body.matches(SCHEMA_SLOT).count() {
      0 => Err(PromptError::MissingSlot),
      1 => Ok(()),
      n => Err(PromptError::DuplicateSlot(n)),
    }
  }

  pub fn render(&self, schema: &Schema) -> Result<String, PromptError> {
    self.validate()?;

    let missing: Vec<String> = self
      .required_tables
      .iter()
      .filter(|t| schema.table(t).is_none())
      .cloned()
      .collect();
    if !missing.is_empty() {
      return Err(PromptError::MissingTables(missing));
    }

    Ok(self.body.replace(SCHEMA_SLOT, &schema.describe()))
  }
}
