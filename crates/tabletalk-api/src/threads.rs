//! Handlers for conversation history.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::Deserialize;
use tabletalk_agent::model::ChatModel;
use tabletalk_core::{
  conversation::{PopularQuestion, ThreadSummary, Turn},
  store::ConversationStore,
};

use crate::{AppState, error::ApiError};

const DEFAULT_POPULAR_LIMIT: usize = 10;

#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
  pub limit: Option<usize>,
}

/// `GET /threads`
pub async fn list<S, M>(State(state): State<AppState<S, M>>) -> Result<Json<Vec<ThreadSummary>>, ApiError>
where
  S: ConversationStore,
  M: ChatModel,
{
  let threads = state.orchestrator.store().list_threads().await.map_err(ApiError::internal)?;
  Ok(Json(threads))
}

/// `GET /threads/{thread_id}/turns[?limit=<n>]`
pub async fn turns<S, M>(
  State(state): State<AppState<S, M>>,
  Path(thread_id): Path<String>,
  Query(params): Query<LimitParams>,
) -> Result<Json<Vec<Turn>>, ApiError>
where
  S: ConversationStore,
  M: ChatModel,
{
  let store = state.orchestrator.store();
  store
    .get_thread(&thread_id)
    .await
    .map_err(ApiError::internal)?
    .ok_or_else(|| ApiError::NotFound(format!("thread {thread_id} not found")))?;
  let turns = store.history(&thread_id, params.limit).await.map_err(ApiError::internal)?;
  Ok(Json(turns))
}

/// `GET /questions/popular[?limit=<n>]`
pub async fn popular<S, M>(
  State(state): State<AppState<S, M>>,
  Query(params): Query<LimitParams>,
) -> Result<Json<Vec<PopularQuestion>>, ApiError>
where
  S: ConversationStore,
  M: ChatModel,
{
  let limit = params.limit.unwrap_or(DEFAULT_POPULAR_LIMIT);
  let questions = state
    .orchestrator
    .store()
    .popular_questions(limit)
    .await
    .map_err(ApiError::internal)?;
  Ok(Json(questions))
}
