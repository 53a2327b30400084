//! [`OpenAiChatModel`]: a [`ChatModel`] over an OpenAI-compatible
//! `/chat/completions` endpoint.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
  model::{ChatMessage, ChatModel, ChatRequest, ChatResponse, ChatRole, ToolCall, ToolSpec},
  ModelError,
};

/// Connection settings for the model endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiConfig {
  /// Base URL up to and including the version segment, e.g.
  /// `https://api.openai.com/v1`.
  #[serde(default = "default_base_url")]
  pub base_url:             String,
  #[serde(default)]
  pub api_key:              Option<String>,
  #[serde(default = "default_model")]
  pub model:                String,
  #[serde(default = "default_temperature")]
  pub temperature:          f32,
  #[serde(default = "default_request_timeout_secs")]
  pub request_timeout_secs: u64,
}

fn default_base_url() -> String { "https://api.openai.com/v1".to_owned() }

fn default_model() -> String { "gpt-4o-mini".to_owned() }

fn default_temperature() -> f32 { 0.5 }

fn default_request_timeout_secs() -> u64 { 60 }

impl Default for OpenAiConfig {
  fn default() -> Self {
    Self {
      base_url:             default_base_url(),
      api_key:              None,
      model:                default_model(),
      temperature:          default_temperature(),
      request_timeout_secs: default_request_timeout_secs(),
    }
  }
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
  client: Client,
  config: OpenAiConfig,
}

impl OpenAiChatModel {
  pub fn new(config: OpenAiConfig) -> Result<Self, ModelError> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.request_timeout_secs))
      .build()?;
    Ok(Self { client, config })
  }

  pub fn config(&self) -> &OpenAiConfig { &self.config }

  fn url(&self) -> String {
    format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
  }
}

impl ChatModel for OpenAiChatModel {
  async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ModelError> {
    let body = WireRequest::new(&self.config, request);

    let mut req = self.client.post(self.url()).json(&body);
    if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
      req = req.bearer_auth(key);
    }

    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(ModelError::Status { status: status.as_u16(), body });
    }

    let parsed: WireResponse = resp.json().await?;
    let choice = parsed.choices.into_iter().next().ok_or(ModelError::NoChoices)?;
    tracing::debug!(
      model = %self.config.model,
      tool_calls = choice.message.tool_calls.len(),
      "model responded"
    );
    Ok(ChatResponse { message: choice.message.into_message() })
  }
}

// ─── Wire format ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct WireRequest<'a> {
  model:       &'a str,
  messages:    Vec<WireMessage>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  tools:       Vec<WireTool<'a>>,
  temperature: f32,
}

impl<'a> WireRequest<'a> {
  fn new(config: &'a OpenAiConfig, request: &'a ChatRequest) -> Self {
    Self {
      model:       &config.model,
      messages:    request.messages.iter().map(WireMessage::from_message).collect(),
      tools:       request.tools.iter().map(WireTool::from_spec).collect(),
      temperature: config.temperature,
    }
  }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
  role:         ChatRole,
  #[serde(default)]
  content:      Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  tool_calls:   Vec<WireToolCall>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  tool_call_id: Option<String>,
}

impl WireMessage {
  fn from_message(m: &ChatMessage) -> Self {
    // Assistant tool-call messages carry `null` content on the wire.
    let content = if m.content.is_empty() && !m.tool_calls.is_empty() {
      None
    } else {
      Some(m.content.clone())
    };
    Self {
      role: m.role,
      content,
      tool_calls: m
        .tool_calls
        .iter()
        .map(|c| WireToolCall {
          id:       c.id.clone(),
          kind:     "function".to_owned(),
          function: WireFunction { name: c.name.clone(), arguments: c.arguments.clone() },
        })
        .collect(),
      tool_call_id: m.tool_call_id.clone(),
    }
  }

  fn into_message(self) -> ChatMessage {
    ChatMessage {
      role:         self.role,
      content:      self.content.unwrap_or_default(),
      tool_calls:   self
        .tool_calls
        .into_iter()
        .map(|c| ToolCall { id: c.id, name: c.function.name, arguments: c.function.arguments })
        .collect(),
      tool_call_id: self.tool_call_id,
    }
  }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
  id:       String,
  #[serde(rename = "type", default = "function_kind")]
  kind:     String,
  function: WireFunction,
}

fn function_kind() -> String { "function".to_owned() }

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
  name:      String,
  #[serde(default)]
  arguments: String,
}

#[derive(Serialize)]
struct WireTool<'a> {
  #[serde(rename = "type")]
  kind:     &'static str,
  function: WireToolFunction<'a>,
}

#[derive(Serialize)]
struct WireToolFunction<'a> {
  name:        &'a str,
  description: &'a str,
  parameters:  &'a serde_json::Value,
}

impl<'a> WireTool<'a> {
  fn from_spec(spec: &'a ToolSpec) -> Self {
    Self {
      kind:     "function",
      function: WireToolFunction {
        name:        &spec.name,
        description: &spec.description,
        parameters:  &spec.parameters,
      },
    }
  }
}

#[derive(Deserialize)]
struct WireResponse {
  #[serde(default)]
  choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
  message: WireMessage,
}
