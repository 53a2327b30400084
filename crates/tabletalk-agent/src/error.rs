//! Error types for `tabletalk-agent`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("model error: {0}")]
  Model(#[from] ModelError),

  #[error("model called unknown tool {0:?}")]
  UnknownTool(String),

  #[error("malformed arguments for {tool}: {reason}")]
  MalformedToolCall { tool: String, reason: String },

  #[error("prompt error: {0}")]
  Prompt(#[from] PromptError),

  #[error(transparent)]
  Reports(#[from] tabletalk_datastore::Error),

  #[error("thread {thread_id:?} is bound to store {bound:?}, not {requested:?}")]
  StoreMismatch { thread_id: String, bound: String, requested: String },

  #[error("conversation store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("turn timed out after {0:?}")]
  Timeout(Duration),
}

impl Error {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Error::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure talking to the language model.
#[derive(Debug, Error)]
pub enum ModelError {
  #[error("request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("endpoint returned {status}: {body}")]
  Status { status: u16, body: String },

  #[error("response had no choices")]
  NoChoices,

  #[error("{0}")]
  Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
  #[error("prompt body has no {{schema}} slot")]
  MissingSlot,

  #[error("prompt body has {0} {{schema}} slots, expected one")]
  DuplicateSlot(usize),

  #[error("schema is missing tables the prompt refers to: {}", .0.join(", "))]
  MissingTables(Vec<String>),
}
