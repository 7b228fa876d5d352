//! Error types for pipeline construction and execution.

use std::time::Duration;

use thiserror::Error;

/// Failure at the worker invocation boundary.
#[derive(Debug, Error)]
pub enum InvocationError {
  /// The worker ran and reported a failure.
  #[error("worker '{worker}' failed: {message}")]
  Failed { worker: String, message: String },

  /// The worker did not answer in time.
  #[error("worker '{worker}' timed out after {timeout_ms}ms")]
  Timeout { worker: String, timeout_ms: u64 },

  /// The call could not be delivered or its reply could not be read.
  #[error("worker '{worker}' transport error: {source}")]
  Transport {
    worker: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

impl InvocationError {
  /// Shorthand for a worker-reported failure.
  pub fn failed(worker: impl Into<String>, message: impl Into<String>) -> Self {
    InvocationError::Failed {
      worker: worker.into(),
      message: message.into(),
    }
  }

  /// A missed deadline. Durations past `u64::MAX` milliseconds saturate.
  pub fn timeout(worker: impl Into<String>, timeout: Duration) -> Self {
    InvocationError::Timeout {
      worker: worker.into(),
      timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    }
  }
}

/// Errors raised while executing a single step.
#[derive(Debug, Error)]
pub enum StepError {
  /// An input transform requested an artifact no earlier stage produced.
  #[error("missing dependency '{dependency}'")]
  MissingDependency { dependency: String },

  /// An input transform found an artifact of the wrong shape.
  #[error("invalid input: {message}")]
  InvalidInput { message: String },

  /// The worker call failed.
  #[error("worker invocation failed: {0}")]
  Invocation(#[source] InvocationError),

  /// One element of a batched step failed.
  #[error("worker invocation failed for batch input {index}: {source}")]
  BatchInvocation {
    index: usize,
    #[source]
    source: InvocationError,
  },

  /// The result could not be represented as an artifact.
  #[error("serialization failed: {message}")]
  Serialization { message: String },

  /// The artifact store rejected a read or write.
  #[error("artifact persistence failed: {0}")]
  Persistence(#[source] quire_artifact::Error),

  /// The output transform returned without storing the step's artifact.
  #[error("output transform did not write artifact '{key}'")]
  OutputNotWritten { key: String },

  /// The task running the step panicked or was aborted.
  #[error("step task aborted: {message}")]
  Panicked { message: String },
}

impl From<quire_artifact::Error> for StepError {
  fn from(e: quire_artifact::Error) -> Self {
    match e {
      quire_artifact::Error::Serialization { key, source } => StepError::Serialization {
        message: format!("artifact '{}': {}", key, source),
      },
      other => StepError::Persistence(other),
    }
  }
}

/// Errors that can occur while building or running a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
  /// The pipeline violates a build-time invariant.
  #[error("invalid pipeline: {message}")]
  InvalidPipeline { message: String },

  /// A step failed, failing its stage and the run.
  #[error("step '{step}' in stage '{stage}' failed: {source}")]
  StepFailed {
    stage: String,
    step: String,
    #[source]
    source: StepError,
  },

  /// The run was cancelled.
  #[error("pipeline execution cancelled")]
  Cancelled,
}

impl PipelineError {
  /// Name of the step that failed, if a step failure ended the run.
  pub fn step(&self) -> Option<&str> {
    match self {
      PipelineError::StepFailed { step, .. } => Some(step),
      _ => None,
    }
  }

  /// Name of the stage that failed, if a step failure ended the run.
  pub fn stage(&self) -> Option<&str> {
    match self {
      PipelineError::StepFailed { stage, .. } => Some(stage),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_timeout_reports_milliseconds() {
    let err = InvocationError::timeout("slow", Duration::from_secs(300));
    assert!(matches!(err, InvocationError::Timeout { timeout_ms: 300_000, .. }));
  }

  #[test]
  fn test_timeout_saturates_huge_durations() {
    let err = InvocationError::timeout("slow", Duration::MAX);
    assert!(matches!(err, InvocationError::Timeout { timeout_ms: u64::MAX, .. }));
  }

  #[test]
  fn test_artifact_serialization_maps_to_serialization() {
    let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: StepError = quire_artifact::Error::Serialization {
      key: "k".to_string(),
      source,
    }
    .into();
    assert!(matches!(err, StepError::Serialization { .. }));
  }

  #[test]
  fn test_artifact_io_maps_to_persistence() {
    let err: StepError = quire_artifact::Error::NotFound("k".to_string()).into();
    assert!(matches!(err, StepError::Persistence(_)));
  }

  #[test]
  fn test_step_failed_names_step() {
    let err = PipelineError::StepFailed {
      stage: "analysis".to_string(),
      step: "gaps".to_string(),
      source: StepError::MissingDependency {
        dependency: "summaries".to_string(),
      },
    };
    assert_eq!(err.step(), Some("gaps"));
    assert_eq!(err.stage(), Some("analysis"));
    assert_eq!(
      err.to_string(),
      "step 'gaps' in stage 'analysis' failed: missing dependency 'summaries'"
    );
  }
}
