//! JSON HTTP API for tabletalk.
//!
//! Exposes an axum [`Router`] over an [`Orchestrator`]: report upload and
//! inspection, the chat surface, and the conversation history.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `PUT`  | `/reports/{store_id}` | Body: workbook bytes |
//! | `GET`  | `/reports/{store_id}/schema` | |
//! | `POST` | `/reports/{store_id}/query` | Body: `{"sql":"SELECT …"}` |
//! | `POST` | `/chat` | Body: `{"store_id","thread_id"?,"message"}` |
//! | `GET`  | `/threads` | |
//! | `GET`  | `/threads/{thread_id}/turns` | Optional `?limit=` |
//! | `GET`  | `/questions/popular` | Optional `?limit=` |

pub mod chat;
pub mod error;
pub mod reports;
pub mod threads;

use std::sync::Arc;

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post, put},
};
use tabletalk_agent::{Orchestrator, model::ChatModel};
use tabletalk_core::store::ConversationStore;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Default cap on uploaded workbook size.
pub const DEFAULT_UPLOAD_LIMIT: usize = 32 * 1024 * 1024;

/// Shared state threaded through all handlers.
pub struct AppState<S, M> {
  pub orchestrator: Arc<Orchestrator<S, M>>,
}

impl<S, M> Clone for AppState<S, M> {
  fn clone(&self) -> Self { Self { orchestrator: self.orchestrator.clone() } }
}

/// Build the API router.
pub fn router<S, M>(orchestrator: Arc<Orchestrator<S, M>>, upload_limit: usize) -> Router<()>
where
  S: ConversationStore + 'static,
  M: ChatModel + 'static,
{
  Router::new()
    // Reports
    .route("/reports/{store_id}", put(reports::upload::<S, M>))
    .route("/reports/{store_id}/schema", get(reports::schema::<S, M>))
    .route("/reports/{store_id}/query", post(reports::query::<S, M>))
    // Chat
    .route("/chat", post(chat::respond::<S, M>))
    // History
    .route("/threads", get(threads::list::<S, M>))
    .route("/threads/{thread_id}/turns", get(threads::turns::<S, M>))
    .route("/questions/popular", get(threads::popular::<S, M>))
    .layer(DefaultBodyLimit::max(upload_limit))
    .layer(TraceLayer::new_for_http())
    .with_state(AppState { orchestrator })
}
