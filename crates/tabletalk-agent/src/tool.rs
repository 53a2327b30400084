//! The single tool exposed to the reasoning loop.

use serde::Deserialize;
use serde_json::json;

use crate::{
  model::{ToolCall, ToolSpec},
  Error, Result,
};

pub const QUERY_TOOL_NAME: &str = "database_query_tool";

pub fn query_tool_spec() -> ToolSpec {
  ToolSpec {
    name:        QUERY_TOOL_NAME.to_owned(),
    description: "Executes a SQLite SELECT statement against the uploaded report and returns \
                  the columns and rows as JSON, or an error message."
      .to_owned(),
    parameters:  json!({
      "type": "object",
      "properties": {
        "query": {
          "type": "string",
          "description": "A single valid SQLite SELECT statement."
        }
      },
      "required": ["query"],
      "additionalProperties": false
    }),
  }
}

#[derive(Debug, Deserialize)]
pub struct QueryArgs {
  pub query: String,
}

/// Validate a tool call against the query tool's contract.
pub fn parse_query_call(call: &ToolCall) -> Result<QueryArgs> {
  if call.name != QUERY_TOOL_NAME {
    return Err(Error::UnknownTool(call.name.clone()));
  }
  serde_json::from_str(&call.arguments).map_err(|e| Error::MalformedToolCall {
    tool:   call.name.clone(),
    reason: e.to_string(),
  })
}
