use quire_pipeline::PipelineError;
use thiserror::Error;

/// Errors that can occur while building a pipeline from a definition.
#[derive(Debug, Error)]
pub enum BuildError {
  /// The definition has no stages.
  #[error("workflow '{name}' has no stages")]
  EmptyWorkflow { name: String },

  /// A step must read either one artifact (`from`) or named sources (`inputs`).
  #[error("step '{step}': {message}")]
  InvalidInputs { step: String, message: String },

  /// A step reads an artifact that no earlier stage produces.
  #[error("step '{step}' reads '{source_step}' which is not produced by an earlier stage")]
  UnknownSource { step: String, source_step: String },

  /// Batched steps always store an ordered JSON list.
  #[error("batch '{step}' must use the json format")]
  BatchFormat { step: String },

  /// The assembled pipeline violates a build-time invariant.
  #[error(transparent)]
  Pipeline(#[from] PipelineError),
}
