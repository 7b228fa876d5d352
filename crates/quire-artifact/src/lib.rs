//! Quire Artifact
//!
//! This crate provides the artifact storage trait and implementations for quire.
//! An artifact is the persisted result of one pipeline step, addressed by the
//! name of the step that produced it.
//!
//! The [`Store`] trait defines the backend layer. [`FsStore`] keeps one file per
//! artifact so any completed stage can be inspected out of process, and
//! [`MemoryStore`] keeps everything in memory for tests and embedding.

mod artifact;
mod error;
mod fs;
mod memory;

pub use artifact::{Artifact, ArtifactFormat};
pub use error::Error;
pub use fs::FsStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

/// Artifact storage trait.
///
/// Keys are step names. `put` overwrites any previous artifact stored under the
/// same key, whatever its format.
#[async_trait]
pub trait Store: Send + Sync {
  /// Retrieve an artifact by key.
  async fn get(&self, key: &str) -> Result<Artifact, Error>;

  /// Store an artifact.
  async fn put(&self, key: &str, artifact: Artifact) -> Result<(), Error>;

  /// Check whether an artifact exists.
  async fn exists(&self, key: &str) -> Result<bool, Error>;

  /// Delete an artifact by key.
  async fn delete(&self, key: &str) -> Result<(), Error>;
}

/// Reject keys that cannot be used as a single file name.
pub fn validate_key(key: &str) -> Result<(), Error> {
  if key.is_empty()
    || key == "."
    || key == ".."
    || key.contains('/')
    || key.contains('\\')
    || key.contains('\0')
  {
    return Err(Error::InvalidKey(key.to_string()));
  }
  Ok(())
}
