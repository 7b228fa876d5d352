use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Artifact, Error, Store, validate_key};

/// In-memory artifact store.
///
/// Suitable for tests and for embedding a pipeline without touching disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
  artifacts: RwLock<HashMap<String, Artifact>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Keys currently stored, sorted.
  pub async fn keys(&self) -> Vec<String> {
    let mut keys: Vec<String> = self.artifacts.read().await.keys().cloned().collect();
    keys.sort();
    keys
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn get(&self, key: &str) -> Result<Artifact, Error> {
    self
      .artifacts
      .read()
      .await
      .get(key)
      .cloned()
      .ok_or_else(|| Error::NotFound(key.to_string()))
  }

  async fn put(&self, key: &str, artifact: Artifact) -> Result<(), Error> {
    validate_key(key)?;
    self
      .artifacts
      .write()
      .await
      .insert(key.to_string(), artifact);
    Ok(())
  }

  async fn exists(&self, key: &str) -> Result<bool, Error> {
    Ok(self.artifacts.read().await.contains_key(key))
  }

  async fn delete(&self, key: &str) -> Result<(), Error> {
    self
      .artifacts
      .write()
      .await
      .remove(key)
      .map(|_| ())
      .ok_or_else(|| Error::NotFound(key.to_string()))
  }
}
