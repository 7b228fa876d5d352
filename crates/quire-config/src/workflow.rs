use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::stage::StageDef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub stages: Vec<StageDef>,
}

impl WorkflowDef {
  pub fn from_json(json: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(json)?)
  }

  /// Load a definition from a JSON file.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json(&json)
  }

  pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  /// Every step name, in stage order.
  pub fn step_names(&self) -> Vec<&str> {
    self.stages.iter().flat_map(|s| s.step_names()).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::stage::{ItemsDef, MemberDef};
  use quire_artifact::ArtifactFormat;

  const DEMO: &str = r#"{
    "name": "demo",
    "stages": [
      { "type": "batch", "name": "summaries", "worker": "Summarizer",
        "items": { "source": "documents" } },
      { "type": "group", "name": "analysis", "steps": [
        { "type": "step", "name": "related", "worker": "Related", "from": "summaries" },
        { "type": "batch", "name": "critiques", "worker": "Critic",
          "items": { "source": "artifact", "name": "summaries" } }
      ] },
      { "type": "step", "name": "paper", "worker": "Writer",
        "inputs": { "related_work": "related", "critiques": "critiques" },
        "format": "markdown" }
    ]
  }"#;

  #[test]
  fn test_parse_workflow() {
    let def = WorkflowDef::from_json(DEMO).unwrap();

    assert_eq!(def.name, "demo");
    assert_eq!(def.stages.len(), 3);
    assert_eq!(
      def.step_names(),
      vec!["summaries", "related", "critiques", "paper"]
    );

    let StageDef::Batch(batch) = &def.stages[0] else {
      panic!("expected batch stage");
    };
    assert_eq!(batch.items, ItemsDef::Documents);
    assert_eq!(batch.format, ArtifactFormat::Json);

    let StageDef::Group(group) = &def.stages[1] else {
      panic!("expected group stage");
    };
    assert!(matches!(
      &group.steps[1],
      MemberDef::Batch(b) if b.items == ItemsDef::Artifact { name: "summaries".to_string() }
    ));

    let StageDef::Step(paper) = &def.stages[2] else {
      panic!("expected step stage");
    };
    assert_eq!(paper.format, ArtifactFormat::Markdown);
    assert_eq!(paper.inputs.get("related_work").map(String::as_str), Some("related"));
    assert_eq!(
      paper.inputs.keys().map(String::as_str).collect::<Vec<_>>(),
      vec!["related_work", "critiques"]
    );
    assert!(paper.from.is_none());
  }

  #[test]
  fn test_serialization_roundtrip() {
    let def = WorkflowDef::from_json(DEMO).unwrap();
    let json = def.to_json_pretty().unwrap();
    assert_eq!(WorkflowDef::from_json(&json).unwrap(), def);
  }

  #[test]
  fn test_unknown_stage_type_rejected() {
    let json = r#"{"name": "x", "stages": [{"type": "loop", "name": "l"}]}"#;
    assert!(matches!(
      WorkflowDef::from_json(json),
      Err(ConfigError::Parse(_))
    ));
  }

  #[test]
  fn test_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("workflow.json");
    std::fs::write(&path, DEMO).unwrap();

    let def = WorkflowDef::from_file(&path).unwrap();
    assert_eq!(def.name, "demo");

    let missing = WorkflowDef::from_file(dir.path().join("missing.json"));
    assert!(matches!(missing, Err(ConfigError::Io { .. })));
  }
}
