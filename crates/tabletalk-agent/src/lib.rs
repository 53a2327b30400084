//! The agent orchestrator: a tool-using reasoning loop over a report store.
//!
//! - [`model`] is the boundary to the language model; [`openai`] implements it
//!   over any OpenAI-compatible `/chat/completions` endpoint.
//! - [`prompt`] renders the system instructions around a schema snapshot.
//! - [`registry`] caches one [`AgentInstance`] per store id.
//! - [`Orchestrator`] runs one turn per call, serialised per thread, with the
//!   conversation store as the only memory.

#![allow(async_fn_in_trait)]

pub mod error;
mod instance;
pub mod model;
pub mod openai;
mod orchestrator;
pub mod prompt;
mod registry;
pub mod tool;

pub use error::{Error, ModelError, PromptError, Result};
pub use instance::{AgentInstance, LoopOutcome, FALLBACK_ANSWER};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use prompt::PromptTemplate;
pub use registry::AgentRegistry;

#[cfg(test)]
mod tests;
