/// Error type for artifact storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested artifact was not found.
  #[error("artifact not found: {0}")]
  NotFound(String),

  /// The key cannot address an artifact.
  #[error("invalid artifact key: '{0}'")]
  InvalidKey(String),

  /// The artifact could not be encoded or decoded.
  #[error("artifact '{key}' could not be serialized: {source}")]
  Serialization {
    key: String,
    #[source]
    source: serde_json::Error,
  },

  /// An I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}
