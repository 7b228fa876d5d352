use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while ingesting documents.
#[derive(Debug, Error)]
pub enum IngestError {
  #[error("failed to read '{path}': {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to extract text from '{path}': {source}")]
  Pdf {
    path: PathBuf,
    #[source]
    source: lopdf::Error,
  },

  #[error("extraction task for '{path}' failed: {message}")]
  Task { path: PathBuf, message: String },
}
