use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading a workflow definition.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read workflow file '{path}': {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid workflow definition: {0}")]
  Parse(#[from] serde_json::Error),
}
