use thiserror::Error;

/// Errors that can occur while setting up a worker invoker.
#[derive(Debug, Error)]
pub enum WorkerError {
  #[error("failed to build HTTP client: {0}")]
  Client(#[from] reqwest::Error),

  #[error("invalid invoker configuration: {message}")]
  InvalidConfig { message: String },
}
