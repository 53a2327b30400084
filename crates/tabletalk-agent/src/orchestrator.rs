//! [`Orchestrator`]: the `respond(store_id, user_text, thread_id)` surface.

use std::{
  collections::HashMap,
  sync::{Arc, PoisonError},
  time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tabletalk_core::{conversation::NewTurn, store::ConversationStore};
use tabletalk_datastore::Reports;

use crate::{model::ChatModel, prompt::PromptTemplate, registry::AgentRegistry, Error, Result};

/// Characters of user text kept in failure logs.
const LOGGED_TEXT_CHARS: usize = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
  #[serde(default = "default_max_steps")]
  pub max_steps:         usize,
  /// Most recent turns fed back to the model; `None` for the whole thread.
  #[serde(default)]
  pub history_limit:     Option<usize>,
  #[serde(default = "default_turn_timeout_secs")]
  pub turn_timeout_secs: u64,
}

fn default_max_steps() -> usize { 8 }

fn default_turn_timeout_secs() -> u64 { 120 }

impl Default for OrchestratorConfig {
  fn default() -> Self {
    Self {
      max_steps:         default_max_steps(),
      history_limit:     None,
      turn_timeout_secs: default_turn_timeout_secs(),
    }
  }
}

impl OrchestratorConfig {
  pub fn turn_timeout(&self) -> Duration { Duration::from_secs(self.turn_timeout_secs) }
}

/// Answers user messages against report stores, one thread at a time.
///
/// The conversation store is the only memory: each turn rebuilds the model
/// context from the thread's persisted history. Turns on the same thread are
/// serialised; turns on different threads run concurrently.
pub struct Orchestrator<S, M> {
  store:        Arc<S>,
  model:        M,
  reports:      Arc<Reports>,
  registry:     AgentRegistry,
  config:       OrchestratorConfig,
  thread_locks: ThreadLocks,
}

type ThreadLocks = std::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

impl<S, M> Orchestrator<S, M>
where
  S: ConversationStore,
  M: ChatModel,
{
  pub fn new(
    store: Arc<S>,
    model: M,
    reports: Arc<Reports>,
    template: PromptTemplate,
    config: OrchestratorConfig,
  ) -> Self {
    Self {
      store,
      model,
      reports,
      registry: AgentRegistry::new(template, config.max_steps),
      config,
      thread_locks: std::sync::Mutex::default(),
    }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn reports(&self) -> &Arc<Reports> { &self.reports }

  pub fn registry(&self) -> &AgentRegistry { &self.registry }

  pub fn config(&self) -> &OrchestratorConfig { &self.config }

  /// Forget the cached agent for a store, e.g. after re-ingestion.
  pub async fn invalidate(&self, store_id: &str) -> bool { self.registry.invalidate(store_id).await }

  /// [`respond`](Self::respond) bounded by the configured turn timeout.
  pub async fn respond_default(&self, store_id: &str, user_text: &str, thread_id: &str) -> Result<String> {
    self.respond_within(store_id, user_text, thread_id, self.config.turn_timeout()).await
  }

  /// [`respond`](Self::respond), abandoned after `timeout`. An abandoned turn
  /// appends nothing.
  pub async fn respond_within(
    &self,
    store_id: &str,
    user_text: &str,
    thread_id: &str,
    timeout: Duration,
  ) -> Result<String> {
    match tokio::time::timeout(timeout, self.respond(store_id, user_text, thread_id)).await {
      Ok(result) => result,
      Err(_) => {
        tracing::error!(
          store_id,
          thread_id,
          timeout_ms = timeout.as_millis() as u64,
          user_text = %truncate(user_text, LOGGED_TEXT_CHARS),
          "turn timed out"
        );
        Err(Error::Timeout(timeout))
      }
    }
  }

  /// Answer one user message on `thread_id`, binding the thread to
  /// `store_id` on first use.
  ///
  /// On success the user turn and the answer are appended together; on
  /// failure nothing is appended.
  pub async fn respond(&self, store_id: &str, user_text: &str, thread_id: &str) -> Result<String> {
    let started = Instant::now();
    let result = self.run_turn(store_id, user_text, thread_id).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match &result {
      Ok(_) => tracing::info!(store_id, thread_id, elapsed_ms, "turn answered"),
      Err(e) => tracing::error!(
        store_id,
        thread_id,
        elapsed_ms,
        user_text = %truncate(user_text, LOGGED_TEXT_CHARS),
        error = %e,
        "turn failed"
      ),
    }
    result
  }

  async fn run_turn(&self, store_id: &str, user_text: &str, thread_id: &str) -> Result<String> {
    let _turn = self.lock_thread(thread_id).await;

    if let Some(thread) = self.store.get_thread(thread_id).await.map_err(Error::store)? {
      if thread.store_id != store_id {
        return Err(Error::StoreMismatch {
          thread_id: thread.thread_id,
          bound:     thread.store_id,
          requested: store_id.to_owned(),
        });
      }
    }

    let instance = self.registry.get_or_create(store_id, &self.reports).await?;
    self.store.open_thread(thread_id, store_id).await.map_err(Error::store)?;
    let history = self
      .store
      .history(thread_id, self.config.history_limit)
      .await
      .map_err(Error::store)?;

    let outcome = instance.run(&self.model, &self.reports, &history, user_text).await?;

    let metadata = json!({
      "store_id": store_id,
      "queries":  outcome.queries,
      "cycles":   outcome.cycles,
      "answered": outcome.answered,
    });
    self
      .store
      .append_all(thread_id, vec![
        NewTurn::user(user_text),
        NewTurn::assistant(outcome.answer.clone()).with_metadata(metadata),
      ])
      .await
      .map_err(Error::store)?;

    Ok(outcome.answer)
  }

  #[cfg(test)]
  pub(crate) fn locked_threads(&self) -> usize {
    self.thread_locks.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  async fn lock_thread<'a>(&'a self, thread_id: &'a str) -> ThreadTurn<'a> {
    let lock = {
      let mut locks = self.thread_locks.lock().unwrap_or_else(PoisonError::into_inner);
      locks.entry(thread_id.to_owned()).or_default().clone()
    };
    ThreadTurn { guard: Some(lock.lock_owned().await), locks: &self.thread_locks, thread_id }
  }
}

/// Exclusive use of one thread; the lock entry is removed with the last
/// holder.
struct ThreadTurn<'a> {
  guard:     Option<tokio::sync::OwnedMutexGuard<()>>,
  locks:     &'a ThreadLocks,
  thread_id: &'a str,
}

impl Drop for ThreadTurn<'_> {
  fn drop(&mut self) {
    let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
    self.guard.take();
    if locks.get(self.thread_id).is_some_and(|l| Arc::strong_count(l) == 1) {
      locks.remove(self.thread_id);
    }
  }
}

fn truncate(text: &str, max_chars: usize) -> String {
  match text.char_indices().nth(max_chars) {
    Some((idx, _)) => format!("{}…", &text[..idx]),
    None => text.to_owned(),
  }
}
