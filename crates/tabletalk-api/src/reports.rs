//! Handlers for `/reports` endpoints.

use axum::{
  Json,
  extract::{Path, State},
};
use bytes::Bytes;
use serde::Deserialize;
use tabletalk_agent::model::ChatModel;
use tabletalk_core::{query::QueryOutcome, schema::Schema, store::ConversationStore};
use tabletalk_datastore::{IngestReport, Source};

use crate::{AppState, error::ApiError};

// ─── Upload ──────────────────────────────────────────────────────────────────

/// `PUT /reports/{store_id}`: replace the store from the workbook in the
/// body and drop the cached agent so the next chat sees the new schema.
pub async fn upload<S, M>(
  State(state): State<AppState<S, M>>,
  Path(store_id): Path<String>,
  body: Bytes,
) -> Result<Json<IngestReport>, ApiError>
where
  S: ConversationStore,
  M: ChatModel,
{
  if body.is_empty() {
    return Err(ApiError::BadRequest("empty upload".into()));
  }
  let orchestrator = &state.orchestrator;
  let report = orchestrator
    .reports()
    .ingest(&store_id, Source::Bytes(body.to_vec()))
    .await?;
  orchestrator.invalidate(&store_id).await;
  Ok(Json(report))
}

// ─── Schema ──────────────────────────────────────────────────────────────────

/// `GET /reports/{store_id}/schema`
pub async fn schema<S, M>(
  State(state): State<AppState<S, M>>,
  Path(store_id): Path<String>,
) -> Result<Json<Schema>, ApiError>
where
  S: ConversationStore,
  M: ChatModel,
{
  Ok(Json(state.orchestrator.reports().schema(&store_id).await?))
}

// ─── Query ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct QueryBody {
  pub sql: String,
}

/// `POST /reports/{store_id}/query`: statement failures come back as a
/// `{"status":"error"}` outcome, not an HTTP error.
pub async fn query<S, M>(
  State(state): State<AppState<S, M>>,
  Path(store_id): Path<String>,
  Json(body): Json<QueryBody>,
) -> Result<Json<QueryOutcome>, ApiError>
where
  S: ConversationStore,
  M: ChatModel,
{
  let reports = state.orchestrator.reports();
  let path = reports.store_path(&store_id)?;
  if !path.is_file() {
    return Err(ApiError::NotFound(format!("report store {store_id} not found")));
  }
  Ok(Json(reports.execute(&store_id, &body.sql).await))
}
