//! Run reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::step::StageKind;

/// Status of a step within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
  Completed,
  Failed,
}

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
  pub step: String,
  pub worker: String,
  pub status: StepStatus,
  /// Number of worker invocations (the element count for batched steps).
  pub invocations: usize,
  pub started_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
  pub error: Option<String>,
}

/// Outcome of one stage. Step reports keep declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
  pub stage: String,
  pub kind: StageKind,
  pub steps: Vec<StepReport>,
  pub started_at: DateTime<Utc>,
  pub completed_at: DateTime<Utc>,
}

impl StageReport {
  pub fn succeeded(&self) -> bool {
    self.steps.iter().all(|s| s.status == StepStatus::Completed)
  }
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
  pub execution_id: String,
  pub pipeline: String,
  pub stages: Vec<StageReport>,
  pub started_at: DateTime<Utc>,
  pub completed_at: DateTime<Utc>,
}

impl RunResult {
  /// Keys of every artifact produced by the run, in stage order.
  pub fn artifacts(&self) -> Vec<&str> {
    self
      .stages
      .iter()
      .flat_map(|stage| stage.steps.iter())
      .filter(|step| step.status == StepStatus::Completed)
      .map(|step| step.step.as_str())
      .collect()
  }

  /// Report of the named step.
  pub fn step(&self, name: &str) -> Option<&StepReport> {
    self
      .stages
      .iter()
      .flat_map(|stage| stage.steps.iter())
      .find(|step| step.step == name)
  }
}
