//! The language-model boundary.
//!
//! A [`ChatModel`] turns a list of messages plus tool descriptions into one
//! assistant message, which either carries text or asks for tool calls.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
  System,
  User,
  Assistant,
  Tool,
}

impl ChatRole {
  pub fn as_str(self) -> &'static str {
    match self {
      ChatRole::System => "system",
      ChatRole::User => "user",
      ChatRole::Assistant => "assistant",
      ChatRole::Tool => "tool",
    }
  }
}

/// A request from the model to invoke a tool. `arguments` is the raw JSON
/// text the model produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
  pub id:        String,
  pub name:      String,
  pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
  pub role:         ChatRole,
  #[serde(default)]
  pub content:      String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub tool_calls:   Vec<ToolCall>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tool_call_id: Option<String>,
}

impl ChatMessage {
  fn text(role: ChatRole, content: impl Into<String>) -> Self {
    Self { role, content: content.into(), tool_calls: Vec::new(), tool_call_id: None }
  }

  pub fn system(content: impl Into<String>) -> Self { Self::text(ChatRole::System, content) }

  pub fn user(content: impl Into<String>) -> Self { Self::text(ChatRole::User, content) }

  pub fn assistant(content: impl Into<String>) -> Self { Self::text(ChatRole::Assistant, content) }

  /// An assistant message requesting tool calls.
  pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
    Self { tool_calls: calls, ..Self::text(ChatRole::Assistant, "") }
  }

  /// The observation answering the tool call `call_id`.
  pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
    Self { tool_call_id: Some(call_id.into()), ..Self::text(ChatRole::Tool, content) }
  }
}

/// A tool the model may call. `parameters` is a JSON Schema object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
  pub name:        String,
  pub description: String,
  pub parameters:  serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatRequest {
  pub messages: Vec<ChatMessage>,
  pub tools:    Vec<ToolSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
  pub message: ChatMessage,
}

/// A text/tool-call generator.
pub trait ChatModel: Send + Sync {
  fn complete<'a>(
    &'a self,
    request: &'a ChatRequest,
  ) -> impl Future<Output = Result<ChatResponse, ModelError>> + Send + 'a;
}

impl<M: ChatModel> ChatModel for std::sync::Arc<M> {
  fn complete<'a>(
    &'a self,
    request: &'a ChatRequest,
  ) -> impl Future<Output = Result<ChatResponse, ModelError>> + Send + 'a {
    (**self).complete(request)
  }
}
