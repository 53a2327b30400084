//! `POST /chat`: one user message in, one answer out.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tabletalk_agent::model::ChatModel;
use tabletalk_core::store::ConversationStore;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ChatBody {
  pub store_id:  String,
  /// Omit to start a new thread.
  #[serde(default)]
  pub thread_id: Option<String>,
  pub message:   String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatReply {
  pub thread_id: String,
  pub answer:    String,
}

pub async fn respond<S, M>(
  State(state): State<AppState<S, M>>,
  Json(body): Json<ChatBody>,
) -> Result<Json<ChatReply>, ApiError>
where
  S: ConversationStore,
  M: ChatModel,
{
  if body.message.trim().is_empty() {
    return Err(ApiError::BadRequest("message is empty".into()));
  }
  let thread_id = body
    .thread_id
    .filter(|t| !t.trim().is_empty())
    .unwrap_or_else(|| Uuid::new_v4().to_string());

  let answer = state
    .orchestrator
    .respond_default(&body.store_id, &body.message, &thread_id)
    .await?;
  Ok(Json(ChatReply { thread_id, answer }))
}
