//! One agent bound to one report store, and the reasoning loop it runs.

use tabletalk_core::conversation::{Role, Turn};
use tabletalk_datastore::Reports;

use crate::{
  model::{ChatMessage, ChatModel, ChatRequest, ToolSpec},
  prompt::PromptTemplate,
  tool::{parse_query_call, query_tool_spec},
  Result,
};

/// Returned when the loop ends without a usable answer.
pub const FALLBACK_ANSWER: &str = "Sorry, I couldn't get a valid response from the agent.";

/// Compiled instructions and tool bindings for one store.
///
/// Immutable after construction; concurrent turns on different threads share
/// one instance.
#[derive(Debug)]
pub struct AgentInstance {
  store_id:     String,
  instructions: String,
  tools:        Vec<ToolSpec>,
  max_steps:    usize,
}

/// What one turn produced.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopOutcome {
  pub answer:   String,
  /// Statements passed to the query tool, in call order.
  pub queries:  Vec<String>,
  /// Model calls made.
  pub cycles:   usize,
  /// `false` when the answer is [`FALLBACK_ANSWER`].
  pub answered: bool,
}

impl AgentInstance {
  /// Snapshot the store's schema into the instructions.
  pub async fn build(
    store_id: &str,
    reports: &Reports,
    template: &PromptTemplate,
    max_steps: usize,
  ) -> Result<Self> {
    let schema = reports.schema(store_id).await?;
    let instructions = template.render(&schema)?;
    Ok(Self {
      store_id: store_id.to_owned(),
      instructions,
      tools: vec![query_tool_spec()],
      max_steps: max_steps.max(1),
    })
  }

  pub fn store_id(&self) -> &str { &self.store_id }

  pub fn instructions(&self) -> &str { &self.instructions }

  /// Run the reason-act loop for one user message.
  ///
  /// The context is the instructions, then the prior user and assistant
  /// turns of the thread, then `user_text`. Tool observations are appended
  /// as the loop goes.
  pub async fn run<M: ChatModel>(
    &self,
    model: &M,
    reports: &Reports,
    history: &[Turn],
    user_text: &str,
  ) -> Result<LoopOutcome> {
    let mut request = ChatRequest {
      messages: Vec::with_capacity(history.len() + 2),
      tools:    self.tools.clone(),
    };
    request.messages.push(ChatMessage::system(&self.instructions));
    request.messages.extend(history.iter().filter_map(|t| match t.role {
      Role::User => Some(ChatMessage::user(&t.content)),
      Role::Assistant => Some(ChatMessage::assistant(&t.content)),
      Role::System => None,
    }));
    request.messages.push(ChatMessage::user(user_text));

    let mut queries = Vec::new();

    for cycle in 1..=self.max_steps {
      let message = model.complete(&request).await?.message;

      if message.tool_calls.is_empty() {
        let answer = message.content.trim();
        if answer.is_empty() {
          tracing::warn!(store_id = %self.store_id, cycle, "model returned an empty answer");
          return Ok(LoopOutcome::fallback(queries, cycle));
        }
        return Ok(LoopOutcome {
          answer: answer.to_owned(),
          queries,
          cycles: cycle,
          answered: true,
        });
      }

      let calls = message.tool_calls.clone();
      request.messages.push(message);
      for call in calls {
        let args = parse_query_call(&call)?;
        tracing::debug!(store_id = %self.store_id, cycle, query = %args.query, "running query tool");
        let outcome = reports.execute(&self.store_id, &args.query).await;
        if outcome.is_error() {
          tracing::debug!(store_id = %self.store_id, cycle, "query tool returned an error");
        }
        request.messages.push(ChatMessage::tool_result(call.id, outcome.observation()));
        queries.push(args.query);
      }
    }

    tracing::warn!(store_id = %self.store_id, max_steps = self.max_steps, "step budget exhausted");
    Ok(LoopOutcome::fallback(queries, self.max_steps))
  }
}

impl LoopOutcome {
  fn fallback(queries: Vec<String>, cycles: usize) -> Self {
    Self { answer: FALLBACK_ANSWER.to_owned(), queries, cycles, answered: false }
  }
}
