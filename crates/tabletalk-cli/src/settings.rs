//! Runtime configuration: an optional TOML file under `TABLETALK_`-prefixed
//! environment variables (`__` separates nested keys, e.g.
//! `TABLETALK_LLM__API_KEY`).

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use tabletalk_agent::{OrchestratorConfig, PromptTemplate, openai::OpenAiConfig};
use tabletalk_datastore::IngestPlan;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  #[serde(default = "default_data_dir")]
  pub data_dir:           PathBuf,
  #[serde(default = "default_conversations_path")]
  pub conversations_path: PathBuf,
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  #[serde(default = "default_upload_limit")]
  pub upload_limit_bytes: usize,
  #[serde(default)]
  pub llm:                OpenAiConfig,
  #[serde(default)]
  pub agent:              AgentSettings,
  #[serde(default)]
  pub ingest:             IngestPlan,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentSettings {
  #[serde(default = "default_max_steps")]
  pub max_steps:         usize,
  #[serde(default)]
  pub history_limit:     Option<usize>,
  #[serde(default = "default_turn_timeout_secs")]
  pub turn_timeout_secs: u64,
  #[serde(default)]
  pub required_tables:   Vec<String>,
  /// Replaces the built-in instructions; must contain one `{schema}`.
  #[serde(default)]
  pub prompt_body:       Option<String>,
}

impl Default for AgentSettings {
  fn default() -> Self {
    let defaults = OrchestratorConfig::default();
    Self {
      max_steps:         defaults.max_steps,
      history_limit:     defaults.history_limit,
      turn_timeout_secs: defaults.turn_timeout_secs,
      required_tables:   Vec::new(),
      prompt_body:       None,
    }
  }
}

fn default_data_dir() -> PathBuf { PathBuf::from("data") }

fn default_conversations_path() -> PathBuf { PathBuf::from("data/conversations.db") }

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_upload_limit() -> usize { tabletalk_api::DEFAULT_UPLOAD_LIMIT }

fn default_max_steps() -> usize { OrchestratorConfig::default().max_steps }

fn default_turn_timeout_secs() -> u64 { OrchestratorConfig::default().turn_timeout_secs }

impl Settings {
  /// Load from `path` (optional) and the process environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let env = config::Environment::with_prefix("TABLETALK")
      .prefix_separator("_")
      .separator("__");
    Self::from_sources(path, env)
  }

  fn from_sources(path: &Path, env: config::Environment) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(env)
      .build()
      .with_context(|| format!("failed to read configuration from {}", path.display()))?
      .try_deserialize()
      .context("failed to deserialise settings")
  }

  pub fn orchestrator(&self) -> OrchestratorConfig {
    OrchestratorConfig {
      max_steps:         self.agent.max_steps,
      history_limit:     self.agent.history_limit,
      turn_timeout_secs: self.agent.turn_timeout_secs,
    }
  }

  /// The configured prompt, validated before any store is touched.
  pub fn prompt(&self) -> anyhow::Result<PromptTemplate> {
    let template = match &self.agent.prompt_body {
      Some(body) => PromptTemplate::new(body.clone()),
      None => PromptTemplate::default(),
    }
    .requiring_tables(self.agent.required_tables.iter().cloned());
    template.validate().context("invalid agent.prompt_body")?;
    Ok(template)
  }
}
