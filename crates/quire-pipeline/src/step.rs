//! Step, group and stage descriptors.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::invoke::WorkerRef;
use crate::transform::{BatchInputTransform, InputTransform, OutputTransform};

/// A single worker invocation with its bound transforms.
#[derive(Clone)]
pub struct Step {
  name: String,
  worker: WorkerRef,
  input: Arc<dyn InputTransform>,
  output: Arc<dyn OutputTransform>,
}

impl Step {
  /// Create a step. `name` is also the key of the artifact it produces.
  pub fn new(
    name: impl Into<String>,
    worker: WorkerRef,
    input: impl InputTransform + 'static,
    output: impl OutputTransform + 'static,
  ) -> Self {
    Self {
      name: name.into(),
      worker,
      input: Arc::new(input),
      output: Arc::new(output),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn worker(&self) -> &WorkerRef {
    &self.worker
  }

  pub fn input(&self) -> &Arc<dyn InputTransform> {
    &self.input
  }

  pub fn output(&self) -> &Arc<dyn OutputTransform> {
    &self.output
  }
}

impl fmt::Debug for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Step")
      .field("name", &self.name)
      .field("worker", &self.worker)
      .field("dependencies", &self.input.dependencies())
      .finish()
  }
}

/// Invokes one worker once per element of a produced list.
///
/// The results are collected, in input order, under one artifact.
#[derive(Clone)]
pub struct BatchStep {
  name: String,
  worker: WorkerRef,
  input: Arc<dyn BatchInputTransform>,
  output: Arc<dyn OutputTransform>,
}

impl BatchStep {
  pub fn new(
    name: impl Into<String>,
    worker: WorkerRef,
    input: impl BatchInputTransform + 'static,
    output: impl OutputTransform + 'static,
  ) -> Self {
    Self {
      name: name.into(),
      worker,
      input: Arc::new(input),
      output: Arc::new(output),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn worker(&self) -> &WorkerRef {
    &self.worker
  }

  pub fn input(&self) -> &Arc<dyn BatchInputTransform> {
    &self.input
  }

  pub fn output(&self) -> &Arc<dyn OutputTransform> {
    &self.output
  }
}

impl fmt::Debug for BatchStep {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BatchStep")
      .field("name", &self.name)
      .field("worker", &self.worker)
      .field("dependencies", &self.input.dependencies())
      .finish()
  }
}

/// A step that can take part in a group.
#[derive(Debug, Clone)]
pub enum Member {
  Step(Step),
  Batch(BatchStep),
}

impl Member {
  pub fn name(&self) -> &str {
    match self {
      Member::Step(step) => step.name(),
      Member::Batch(step) => step.name(),
    }
  }

  pub fn worker(&self) -> &WorkerRef {
    match self {
      Member::Step(step) => step.worker(),
      Member::Batch(step) => step.worker(),
    }
  }

  /// Step names this member reads from.
  pub fn dependencies(&self) -> Vec<String> {
    match self {
      Member::Step(step) => step.input().dependencies(),
      Member::Batch(step) => step.input().dependencies(),
    }
  }
}

impl From<Step> for Member {
  fn from(step: Step) -> Self {
    Member::Step(step)
  }
}

impl From<BatchStep> for Member {
  fn from(step: BatchStep) -> Self {
    Member::Batch(step)
  }
}

/// Independent steps that run concurrently.
///
/// Member order only matters for logging and error reporting.
#[derive(Debug, Clone)]
pub struct Group {
  name: String,
  members: Vec<Member>,
}

impl Group {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      members: Vec::new(),
    }
  }

  /// Add a member to the group.
  pub fn with(mut self, member: impl Into<Member>) -> Self {
    self.members.push(member.into());
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn members(&self) -> &[Member] {
    &self.members
  }
}

/// Kind of a stage, for logging and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
  Step,
  Batch,
  Group,
}

impl fmt::Display for StageKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StageKind::Step => write!(f, "step"),
      StageKind::Batch => write!(f, "batch"),
      StageKind::Group => write!(f, "group"),
    }
  }
}

/// One position in the pipeline's declared order.
#[derive(Debug, Clone)]
pub enum Stage {
  Step(Step),
  Batch(BatchStep),
  Group(Group),
}

impl Stage {
  pub fn name(&self) -> &str {
    match self {
      Stage::Step(step) => step.name(),
      Stage::Batch(step) => step.name(),
      Stage::Group(group) => group.name(),
    }
  }

  pub fn kind(&self) -> StageKind {
    match self {
      Stage::Step(_) => StageKind::Step,
      Stage::Batch(_) => StageKind::Batch,
      Stage::Group(_) => StageKind::Group,
    }
  }

  /// The steps this stage dispatches.
  pub fn members(&self) -> Vec<Member> {
    match self {
      Stage::Step(step) => vec![Member::Step(step.clone())],
      Stage::Batch(step) => vec![Member::Batch(step.clone())],
      Stage::Group(group) => group.members().to_vec(),
    }
  }
}

impl From<Step> for Stage {
  fn from(step: Step) -> Self {
    Stage::Step(step)
  }
}

impl From<BatchStep> for Stage {
  fn from(step: BatchStep) -> Self {
    Stage::Batch(step)
  }
}

impl From<Group> for Stage {
  fn from(group: Group) -> Self {
    Stage::Group(group)
  }
}

/// An ordered list of stages.
///
/// Built-time invariants, checked by [`Pipeline::push`]:
/// - every step name is unique across the pipeline, so no two steps write the
///   same artifact;
/// - no step reads an artifact of its own stage.
#[derive(Debug, Clone)]
pub struct Pipeline {
  name: String,
  stages: Vec<Stage>,
  step_names: HashSet<String>,
}

impl Pipeline {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      stages: Vec::new(),
      step_names: HashSet::new(),
    }
  }

  /// Append a stage after validating it against the stages already added.
  pub fn push(&mut self, stage: impl Into<Stage>) -> Result<&mut Self, PipelineError> {
    let stage = stage.into();
    let members = stage.members();

    if members.is_empty() {
      return Err(PipelineError::InvalidPipeline {
        message: format!("stage '{}' has no steps", stage.name()),
      });
    }

    let mut stage_names = HashSet::new();
    for member in &members {
      if member.name().is_empty() {
        return Err(PipelineError::InvalidPipeline {
          message: format!("stage '{}' has a step with an empty name", stage.name()),
        });
      }
      if let Err(err) = quire_artifact::validate_key(member.name()) {
        return Err(PipelineError::InvalidPipeline {
          message: format!("stage '{}': {err}", stage.name()),
        });
      }
      if self.step_names.contains(member.name()) || !stage_names.insert(member.name()) {
        return Err(PipelineError::InvalidPipeline {
          message: format!("duplicate step name '{}'", member.name()),
        });
      }
    }

    for member in &members {
      if let Some(dependency) = member
        .dependencies()
        .into_iter()
        .find(|d| stage_names.contains(d.as_str()))
      {
        return Err(PipelineError::InvalidPipeline {
          message: format!(
            "step '{}' reads '{}' which is produced in the same stage '{}'",
            member.name(),
            dependency,
            stage.name()
          ),
        });
      }
    }

    self
      .step_names
      .extend(members.iter().map(|m| m.name().to_string()));
    self.stages.push(stage);
    Ok(self)
  }

  /// Builder-style variant of [`Pipeline::push`].
  pub fn with_stage(mut self, stage: impl Into<Stage>) -> Result<Self, PipelineError> {
    self.push(stage)?;
    Ok(self)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn stages(&self) -> &[Stage] {
    &self.stages
  }

  pub fn len(&self) -> usize {
    self.stages.len()
  }

  pub fn is_empty(&self) -> bool {
    self.stages.is_empty()
  }

  /// Whether a step with this name has been added.
  pub fn contains_step(&self, name: &str) -> bool {
    self.step_names.contains(name)
  }
}
