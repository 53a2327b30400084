//! Orchestrator tests against a real report store, an in-memory conversation
//! store and scripted models.

use std::{
  collections::VecDeque,
  path::Path,
  sync::{Arc, Mutex},
  time::Duration,
};

use serde_json::json;
use tabletalk_core::{conversation::Role, store::ConversationStore};
use tabletalk_datastore::{IngestPlan, Reports};
use tabletalk_store_sqlite::SqliteStore;

use crate::{
  model::{ChatMessage, ChatModel, ChatRequest, ChatResponse, ChatRole, ToolCall},
  tool::QUERY_TOOL_NAME,
  Error, ModelError, Orchestrator, OrchestratorConfig, PromptTemplate, FALLBACK_ANSWER,
};

// ─── Fakes ───────────────────────────────────────────────────────────────────

/// Replays canned replies in order and records every request.
#[derive(Default)]
struct ScriptedModel {
  replies:  Mutex<VecDeque<Result<ChatMessage, String>>>,
  requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
  fn new(replies: impl IntoIterator<Item = ChatMessage>) -> Arc<Self> {
    Arc::new(Self {
      replies:  Mutex::new(replies.into_iter().map(Ok).collect()),
      requests: Mutex::default(),
    })
  }

  fn failing(message: &str) -> Arc<Self> {
    Arc::new(Self {
      replies:  Mutex::new(VecDeque::from([Err(message.to_owned())])),
      requests: Mutex::default(),
    })
  }

  fn requests(&self) -> Vec<ChatRequest> { self.requests.lock().unwrap().clone() }
}

impl ChatModel for ScriptedModel {
  async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ModelError> {
    self.requests.lock().unwrap().push(request.clone());
    let reply = self.replies.lock().unwrap().pop_front();
    match reply {
      Some(Ok(message)) => Ok(ChatResponse { message }),
      Some(Err(e)) => Err(ModelError::Other(e)),
      None => Err(ModelError::Other("script exhausted".into())),
    }
  }
}

/// Always asks for the same query; never answers.
struct LoopingModel;

impl ChatModel for LoopingModel {
  async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse, ModelError> {
    Ok(ChatResponse { message: query_call("c", "SELECT 1") })
  }
}

/// Answers with every user message it can see, joined by `|`.
struct EchoModel {
  delay: Duration,
}

impl ChatModel for EchoModel {
  async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ModelError> {
    tokio::time::sleep(self.delay).await;
    let seen: Vec<&str> = request
      .messages
      .iter()
      .filter(|m| m.role == ChatRole::User)
      .map(|m| m.content.as_str())
      .collect();
    Ok(ChatResponse { message: ChatMessage::assistant(seen.join("|")) })
  }
}

fn query_call(id: &str, sql: &str) -> ChatMessage {
  ChatMessage::tool_calls(vec![ToolCall {
    id:        id.into(),
    name:      QUERY_TOOL_NAME.into(),
    arguments: json!({ "query": sql }).to_string(),
  }])
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn write_store(dir: &Path, store_id: &str) {
  let conn = rusqlite::Connection::open(dir.join(format!("{store_id}.sqlite"))).unwrap();
  conn
    .execute_batch(
      "CREATE TABLE Summary (SKU TEXT, Orders INTEGER);
       INSERT INTO Summary VALUES ('A-1', 4), ('A-2', 2), ('A-3', 9);",
    )
    .unwrap();
}

struct Harness<M> {
  _dir:         tempfile::TempDir,
  orchestrator: Orchestrator<SqliteStore, M>,
}

async fn harness<M: ChatModel>(model: M, config: OrchestratorConfig) -> Harness<M> {
  let dir = tempfile::tempdir().unwrap();
  write_store(dir.path(), "ads");
  let reports = Arc::new(Reports::new(dir.path(), IngestPlan::default()));
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let orchestrator = Orchestrator::new(store, model, reports, PromptTemplate::default(), config);
  Harness { _dir: dir, orchestrator }
}

// ─── Reasoning loop ──────────────────────────────────────────────────────────

#[tokio::test]
async fn answers_through_the_query_tool() {
  let model = ScriptedModel::new([
    query_call("call_1", "SELECT COUNT(*) FROM Summary"),
    ChatMessage::assistant("There are 3 SKUs."),
  ]);
  let h = harness(model.clone(), OrchestratorConfig::default()).await;

  let answer = h.orchestrator.respond("ads", "How many SKUs?", "t-1").await.unwrap();
  assert_eq!(answer, "There are 3 SKUs.");

  let requests = model.requests();
  assert_eq!(requests.len(), 2);
  let system = &requests[0].messages[0];
  assert_eq!(system.role, ChatRole::System);
  assert!(system.content.contains("Table: Summary\nColumns: SKU (TEXT), Orders (INTEGER)"));
  assert_eq!(requests[0].tools[0].name, QUERY_TOOL_NAME);

  let observation = requests[1].messages.last().unwrap();
  assert_eq!(observation.role, ChatRole::Tool);
  assert_eq!(observation.tool_call_id.as_deref(), Some("call_1"));
  assert_eq!(observation.content, r#"{"columns":["COUNT(*)"],"rows":[[3]]}"#);

  let turns = h.orchestrator.store().history("t-1", None).await.unwrap();
  assert_eq!(turns.len(), 2);
  assert_eq!(turns[0].role, Role::User);
  assert_eq!(turns[0].content, "How many SKUs?");
  assert_eq!(turns[1].content, "There are 3 SKUs.");
  let meta = turns[1].metadata.as_ref().unwrap();
  assert_eq!(meta["store_id"], "ads");
  assert_eq!(meta["queries"], json!(["SELECT COUNT(*) FROM Summary"]));
  assert_eq!(meta["cycles"], 2);
}

#[tokio::test]
async fn query_errors_are_observed_and_the_loop_continues() {
  let model = ScriptedModel::new([
    query_call("c1", "SELECT * FROM Sumary"),
    query_call("c2", "SELECT SUM(Orders) FROM Summary"),
    ChatMessage::assistant("15 orders in total."),
  ]);
  let h = harness(model.clone(), OrchestratorConfig::default()).await;

  let answer = h.orchestrator.respond("ads", "Total orders?", "t-1").await.unwrap();
  assert_eq!(answer, "15 orders in total.");

  let requests = model.requests();
  let first_observation = &requests[1].messages.last().unwrap().content;
  assert!(first_observation.starts_with("Error executing query: "), "{first_observation}");
  assert_eq!(requests[2].messages.last().unwrap().content, r#"{"columns":["SUM(Orders)"],"rows":[[15]]}"#);
}

#[tokio::test]
async fn exhausted_step_budget_returns_fallback() {
  let config = OrchestratorConfig { max_steps: 3, ..OrchestratorConfig::default() };
  let h = harness(LoopingModel, config).await;

  let answer = h.orchestrator.respond("ads", "loop forever", "t-1").await.unwrap();
  assert_eq!(answer, FALLBACK_ANSWER);

  let turns = h.orchestrator.store().history("t-1", None).await.unwrap();
  let meta = turns[1].metadata.as_ref().unwrap();
  assert_eq!(meta["cycles"], 3);
  assert_eq!(meta["answered"], false);
}

#[tokio::test]
async fn empty_answer_returns_fallback() {
  let model = ScriptedModel::new([ChatMessage::assistant("   ")]);
  let h = harness(model, OrchestratorConfig::default()).await;
  let answer = h.orchestrator.respond("ads", "hello?", "t-1").await.unwrap();
  assert_eq!(answer, FALLBACK_ANSWER);
}

// ─── Failures ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_tool_fails_and_persists_nothing() {
  let model = ScriptedModel::new([ChatMessage::tool_calls(vec![ToolCall {
    id:        "c1".into(),
    name:      "run_shell".into(),
    arguments: "{}".into(),
  }])]);
  let h = harness(model, OrchestratorConfig::default()).await;

  let err = h.orchestrator.respond("ads", "rm -rf", "t-1").await.unwrap_err();
  assert!(matches!(&err, Error::UnknownTool(name) if name == "run_shell"), "{err}");
  assert!(h.orchestrator.store().history("t-1", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn model_failure_propagates() {
  let h = harness(ScriptedModel::failing("upstream unavailable"), OrchestratorConfig::default()).await;
  let err = h.orchestrator.respond("ads", "hi", "t-1").await.unwrap_err();
  assert!(matches!(err, Error::Model(_)), "{err}");
  assert!(h.orchestrator.store().history("t-1", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_store_is_reported() {
  let h = harness(ScriptedModel::new([]), OrchestratorConfig::default()).await;
  let err = h.orchestrator.respond("nope", "hi", "t-1").await.unwrap_err();
  assert!(matches!(err, Error::Reports(tabletalk_datastore::Error::StoreNotFound(_))), "{err}");
}

#[tokio::test]
async fn thread_stays_bound_to_its_store() {
  let h = harness(EchoModel { delay: Duration::ZERO }, OrchestratorConfig::default()).await;
  h.orchestrator.respond("ads", "first", "t-1").await.unwrap();

  let err = h.orchestrator.respond("other", "second", "t-1").await.unwrap_err();
  assert!(
    matches!(&err, Error::StoreMismatch { bound, requested, .. } if bound == "ads" && requested == "other"),
    "{err}"
  );
}

#[tokio::test]
async fn slow_turn_times_out_without_writing() {
  let h = harness(EchoModel { delay: Duration::from_millis(500) }, OrchestratorConfig::default()).await;
  let err = h
    .orchestrator
    .respond_within("ads", "slow", "t-1", Duration::from_millis(20))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Timeout(_)));
  assert!(h.orchestrator.store().history("t-1", None).await.unwrap().is_empty());
}

// ─── Memory ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn prior_turns_are_replayed_from_the_store() {
  let h = harness(EchoModel { delay: Duration::ZERO }, OrchestratorConfig::default()).await;

  assert_eq!(h.orchestrator.respond("ads", "one", "t-1").await.unwrap(), "one");
  assert_eq!(h.orchestrator.respond("ads", "two", "t-1").await.unwrap(), "one|two");
  assert_eq!(h.orchestrator.respond("ads", "three", "t-1").await.unwrap(), "one|two|three");
}

#[tokio::test]
async fn history_limit_bounds_the_context() {
  let config = OrchestratorConfig { history_limit: Some(2), ..OrchestratorConfig::default() };
  let h = harness(EchoModel { delay: Duration::ZERO }, config).await;

  h.orchestrator.respond("ads", "one", "t-1").await.unwrap();
  h.orchestrator.respond("ads", "two", "t-1").await.unwrap();
  // Only the last user/assistant pair ("two", "one|two") is replayed.
  assert_eq!(h.orchestrator.respond("ads", "three", "t-1").await.unwrap(), "two|three");
}

#[tokio::test]
async fn concurrent_threads_see_only_their_own_turns() {
  let h = harness(EchoModel { delay: Duration::from_millis(10) }, OrchestratorConfig::default()).await;
  let o = &h.orchestrator;

  let (a, b) = tokio::join!(o.respond("ads", "a1", "thread-a"), o.respond("ads", "b1", "thread-b"));
  assert_eq!((a.unwrap(), b.unwrap()), ("a1".to_owned(), "b1".to_owned()));

  let (a, b) = tokio::join!(o.respond("ads", "a2", "thread-a"), o.respond("ads", "b2", "thread-b"));
  assert_eq!(a.unwrap(), "a1|a2");
  assert_eq!(b.unwrap(), "b1|b2");

  assert_eq!(o.registry().cached().await, 1);
}

#[tokio::test]
async fn same_thread_turns_are_serialised() {
  let h = harness(EchoModel { delay: Duration::from_millis(10) }, OrchestratorConfig::default()).await;
  let o = &h.orchestrator;

  let (x, y) = tokio::join!(o.respond("ads", "x", "t-1"), o.respond("ads", "y", "t-1"));
  let (x, y) = (x.unwrap(), y.unwrap());
  // Whichever ran second saw the first one's turn.
  assert!((x == "x" && y == "x|y") || (y == "y" && x == "y|x"), "{x} / {y}");
  assert_eq!(o.store().history("t-1", None).await.unwrap().len(), 4);
  assert_eq!(o.locked_threads(), 0);
}

#[tokio::test]
async fn thread_locks_are_released_after_each_turn() {
  let h = harness(EchoModel { delay: Duration::from_millis(50) }, OrchestratorConfig::default()).await;
  let o = &h.orchestrator;

  let (a, b, c) = tokio::join!(
    o.respond("ads", "q", "thread-a"),
    o.respond("ads", "q", "thread-b"),
    o.respond("ads", "q", "thread-c"),
  );
  a.unwrap();
  b.unwrap();
  c.unwrap();
  assert_eq!(o.locked_threads(), 0);

  let timed_out = o.respond_within("ads", "q", "slow", Duration::from_millis(5)).await;
  assert!(matches!(timed_out, Err(Error::Timeout(_))));
  assert_eq!(o.locked_threads(), 0);
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn schema_snapshot_is_kept_until_invalidated() {
  let dir = tempfile::tempdir().unwrap();
  write_store(dir.path(), "ads");
  let reports = Arc::new(Reports::new(dir.path(), IngestPlan::default()));
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let model = ScriptedModel::new([
    ChatMessage::assistant("first"),
    ChatMessage::assistant("second"),
    ChatMessage::assistant("third"),
  ]);
  let o = Orchestrator::new(store, model.clone(), reports, PromptTemplate::default(), OrchestratorConfig::default());

  o.respond("ads", "q", "t-1").await.unwrap();
  rusqlite::Connection::open(dir.path().join("ads.sqlite"))
    .unwrap()
    .execute_batch("CREATE TABLE Keywords (Term TEXT);")
    .unwrap();

  o.respond("ads", "q", "t-1").await.unwrap();
  assert!(o.invalidate("ads").await);
  assert!(!o.invalidate("ads").await);
  o.respond("ads", "q", "t-1").await.unwrap();

  let systems: Vec<bool> = model
    .requests()
    .iter()
    .map(|r| r.messages[0].content.contains("Table: Keywords"))
    .collect();
  assert_eq!(systems, vec![false, false, true]);
}
