use indexmap::IndexMap;
use quire_artifact::ArtifactFormat;
use serde::{Deserialize, Serialize};

/// A single worker call.
///
/// The worker input is either one earlier artifact passed through as-is
/// (`from`) or an object assembled from several (`inputs`, field name to
/// producing step). Fields reach the worker in the order they are declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDef {
  pub name: String,
  pub worker: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub from: Option<String>,
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub inputs: IndexMap<String, String>,
  #[serde(default)]
  pub format: ArtifactFormat,
}

/// Where a batch takes its elements from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ItemsDef {
  /// The texts of the ingested documents, in file name order.
  Documents,
  /// The elements of an earlier list artifact.
  Artifact { name: String },
}

/// One worker call per element; results are stored as one ordered list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDef {
  pub name: String,
  pub worker: String,
  pub items: ItemsDef,
  #[serde(default)]
  pub format: ArtifactFormat,
}

/// A member of a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemberDef {
  Step(StepDef),
  Batch(BatchDef),
}

impl MemberDef {
  pub fn name(&self) -> &str {
    match self {
      MemberDef::Step(step) => &step.name,
      MemberDef::Batch(batch) => &batch.name,
    }
  }
}

/// Independent steps that run concurrently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDef {
  pub name: String,
  pub steps: Vec<MemberDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageDef {
  Step(StepDef),
  Batch(BatchDef),
  Group(GroupDef),
}

impl StageDef {
  pub fn name(&self) -> &str {
    match self {
      StageDef::Step(step) => &step.name,
      StageDef::Batch(batch) => &batch.name,
      StageDef::Group(group) => &group.name,
    }
  }

  /// Names of the steps this stage runs, in declaration order.
  pub fn step_names(&self) -> Vec<&str> {
    match self {
      StageDef::Step(step) => vec![step.name.as_str()],
      StageDef::Batch(batch) => vec![batch.name.as_str()],
      StageDef::Group(group) => group.steps.iter().map(|m| m.name()).collect(),
    }
  }
}

impl From<MemberDef> for StageDef {
  fn from(member: MemberDef) -> Self {
    match member {
      MemberDef::Step(step) => StageDef::Step(step),
      MemberDef::Batch(batch) => StageDef::Batch(batch),
    }
  }
}
