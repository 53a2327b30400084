use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::{Arc, Mutex, PoisonError},
};

use tabletalk_core::{query::QueryOutcome, schema::Schema};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::{
  ingest::{self, IngestReport, Source},
  introspect,
  plan::IngestPlan,
  query::{self, ERROR_PREFIX},
  Error, Result,
};

const MAX_STORE_ID_LEN: usize = 64;

type LockMap = Mutex<HashMap<String, Arc<RwLock<()>>>>;

/// Report stores under one data directory, addressed by store id.
///
/// Each store has its own reader/writer lock: ingestion replaces the file and
/// holds the write half, introspection and queries share the read half.
#[derive(Debug)]
pub struct Reports {
  data_dir: PathBuf,
  plan:     IngestPlan,
  locks:    LockMap,
}

impl Reports {
  pub fn new(data_dir: impl Into<PathBuf>, plan: IngestPlan) -> Self {
    Self { data_dir: data_dir.into(), plan, locks: Mutex::default() }
  }

  pub fn data_dir(&self) -> &Path { &self.data_dir }

  pub fn plan(&self) -> &IngestPlan { &self.plan }

  /// `<data_dir>/<store_id>.sqlite`, after validating the id.
  pub fn store_path(&self, store_id: &str) -> Result<PathBuf> {
    if !is_valid_store_id(store_id) {
      return Err(Error::InvalidStoreId(store_id.to_owned()));
    }
    Ok(self.data_dir.join(format!("{store_id}.sqlite")))
  }

  pub fn exists(&self, store_id: &str) -> bool {
    self.store_path(store_id).is_ok_and(|p| p.is_file())
  }

  fn lock_for(&self, store_id: &str) -> Arc<RwLock<()>> {
    let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
    locks.entry(store_id.to_owned()).or_default().clone()
  }

  async fn read<'a>(&'a self, store_id: &'a str) -> Held<'a, OwnedRwLockReadGuard<()>> {
    let guard = self.lock_for(store_id).read_owned().await;
    Held { guard: Some(guard), locks: &self.locks, store_id }
  }

  async fn write<'a>(&'a self, store_id: &'a str) -> Held<'a, OwnedRwLockWriteGuard<()>> {
    let guard = self.lock_for(store_id).write_owned().await;
    Held { guard: Some(guard), locks: &self.locks, store_id }
  }

  /// Replace the store from a workbook using the configured plan.
  pub async fn ingest(&self, store_id: &str, source: Source) -> Result<IngestReport> {
    let path = self.store_path(store_id)?;
    let _held = self.write(store_id).await;

    let plan = self.plan.clone();
    let report =
      tokio::task::spawn_blocking(move || ingest::ingest_workbook(source, &path, &plan)).await??;
    tracing::info!(
      store_id,
      tables = report.tables.len(),
      skipped = report.skipped.len(),
      "store ingested"
    );
    Ok(report)
  }

  pub async fn schema(&self, store_id: &str) -> Result<Schema> {
    let path = self.store_path(store_id)?;
    let _held = self.read(store_id).await;
    introspect::read_schema(&path).await
  }

  /// Run a read-only statement. Never fails; see [`query::execute`].
  pub async fn execute(&self, store_id: &str, sql: &str) -> QueryOutcome {
    let path = match self.store_path(store_id) {
      Ok(path) => path,
      Err(e) => return QueryOutcome::error(format!("{ERROR_PREFIX}{e}")),
    };
    let _held = self.read(store_id).await;
    query::execute(&path, sql).await
  }
}

/// A store lock guard; the map entry is removed with the last holder.
struct Held<'a, G> {
  guard:    Option<G>,
  locks:    &'a LockMap,
  store_id: &'a str,
}

impl<G> Drop for Held<'_, G> {
  fn drop(&mut self) {
    let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
    self.guard.take();
    if locks.get(self.store_id).is_some_and(|l| Arc::strong_count(l) == 1) {
      locks.remove(self.store_id);
    }
  }
}

fn is_valid_store_id(id: &str) -> bool {
  !id.is_empty()
    && id.len() <= MAX_STORE_ID_LEN
    && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
