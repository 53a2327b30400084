//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("{0}")]
  Timeout(String),

  #[error("model error: {0}")]
  Upstream(String),

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub(crate) fn internal(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    ApiError::Internal(Box::new(e))
  }
}

impl From<tabletalk_datastore::Error> for ApiError {
  fn from(e: tabletalk_datastore::Error) -> Self {
    use tabletalk_datastore::Error as E;
    match e {
      E::InvalidStoreId(_) | E::Workbook(_) => ApiError::BadRequest(e.to_string()),
      E::StoreNotFound(_) => ApiError::NotFound(e.to_string()),
      other => ApiError::internal(other),
    }
  }
}

impl From<tabletalk_agent::Error> for ApiError {
  fn from(e: tabletalk_agent::Error) -> Self {
    use tabletalk_agent::Error as E;
    match e {
      E::Reports(e) => e.into(),
      E::StoreMismatch { .. } => ApiError::BadRequest(e.to_string()),
      E::Timeout(_) => ApiError::Timeout(e.to_string()),
      E::Model(_) | E::UnknownTool(_) | E::MalformedToolCall { .. } => ApiError::Upstream(e.to_string()),
      other => ApiError::internal(other),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
      ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let message = match &self {
      ApiError::NotFound(m) | ApiError::BadRequest(m) | ApiError::Timeout(m) | ApiError::Upstream(m) => m.clone(),
      ApiError::Internal(e) => e.to_string(),
    };
    if status.is_server_error() {
      tracing::warn!(status = status.as_u16(), error = %message, "request failed");
    }
    (status, Json(json!({ "error": message }))).into_response()
  }
}
