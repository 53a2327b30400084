use std::{collections::HashMap, sync::Arc};

use tabletalk_datastore::Reports;
use tokio::sync::Mutex;

use crate::{instance::AgentInstance, prompt::PromptTemplate, Result};

/// At most one [`AgentInstance`] per store id.
///
/// The map lock is held while an instance is built, so concurrent first
/// calls for a store construct it once.
#[derive(Debug)]
pub struct AgentRegistry {
  template:  PromptTemplate,
  max_steps: usize,
  instances: Mutex<HashMap<String, Arc<AgentInstance>>>,
}

impl AgentRegistry {
  pub fn new(template: PromptTemplate, max_steps: usize) -> Self {
    Self { template, max_steps, instances: Mutex::default() }
  }

  pub async fn get_or_create(&self, store_id: &str, reports: &Reports) -> Result<Arc<AgentInstance>> {
    let mut instances = self.instances.lock().await;
    if let Some(instance) = instances.get(store_id) {
      return Ok(instance.clone());
    }

    let instance = Arc::new(AgentInstance::build(store_id, reports, &self.template, self.max_steps).await?);
    tracing::info!(store_id, "agent instance built");
    instances.insert(store_id.to_owned(), instance.clone());
    Ok(instance)
  }

  /// Drop the cached instance so the next call re-reads the schema. Returns
  /// whether one was cached.
  pub async fn invalidate(&self, store_id: &str) -> bool {
    let removed = self.instances.lock().await.remove(store_id).is_some();
    if removed {
      tracing::info!(store_id, "agent instance invalidated");
    }
    removed
  }

  pub async fn cached(&self) -> usize { self.instances.lock().await.len() }
}
