//! Input and output transforms.
//!
//! Transforms are bound to a step when the pipeline is built. An input
//! transform assembles the worker input from earlier artifacts (or raw data);
//! an output transform persists the worker result as the step's artifact.

use async_trait::async_trait;
use quire_artifact::{Artifact, ArtifactFormat};
use serde::Serialize;
use serde_json::Value;

use crate::context::StepContext;
use crate::error::StepError;

/// Produces the input of a single-call step.
#[async_trait]
pub trait InputTransform: Send + Sync {
  /// Build the worker input.
  async fn resolve(&self, ctx: &StepContext) -> Result<Value, StepError>;

  /// Names of the steps whose artifacts this transform reads.
  fn dependencies(&self) -> Vec<String> {
    Vec::new()
  }
}

/// Produces the inputs of a batched step, one per worker invocation.
#[async_trait]
pub trait BatchInputTransform: Send + Sync {
  /// Build the list of worker inputs.
  async fn resolve_batch(&self, ctx: &StepContext) -> Result<Vec<Value>, StepError>;

  /// Names of the steps whose artifacts this transform reads.
  fn dependencies(&self) -> Vec<String> {
    Vec::new()
  }
}

/// Persists a worker result as the step's artifact.
///
/// After `commit` returns, reading the step's name from the context of a later
/// stage must yield the result. Batched steps receive the ordered list of
/// results as a JSON array.
#[async_trait]
pub trait OutputTransform: Send + Sync {
  async fn commit(&self, ctx: &StepContext, result: Value) -> Result<(), StepError>;
}

/// Assembles an object from the artifacts of named earlier steps.
///
/// Each field of the resulting object holds the artifact of its source step.
#[derive(Debug, Clone, Default)]
pub struct NamedSources {
  sources: Vec<(String, String)>,
}

impl NamedSources {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a field filled from the artifact of step `source`.
  pub fn field(mut self, field: impl Into<String>, source: impl Into<String>) -> Self {
    self.sources.push((field.into(), source.into()));
    self
  }

  /// `(field, source)` pairs in declaration order.
  pub fn sources(&self) -> &[(String, String)] {
    &self.sources
  }
}

impl<F: Into<String>, S: Into<String>> FromIterator<(F, S)> for NamedSources {
  fn from_iter<T: IntoIterator<Item = (F, S)>>(iter: T) -> Self {
    Self {
      sources: iter
        .into_iter()
        .map(|(field, source)| (field.into(), source.into()))
        .collect(),
    }
  }
}

#[async_trait]
impl InputTransform for NamedSources {
  async fn resolve(&self, ctx: &StepContext) -> Result<Value, StepError> {
    let mut combined = serde_json::Map::new();
    for (field, source) in &self.sources {
      let value = ctx.get_value(source).await?;
      combined.insert(field.clone(), value);
    }
    Ok(Value::Object(combined))
  }

  fn dependencies(&self) -> Vec<String> {
    self
      .sources
      .iter()
      .map(|(_, source)| source.clone())
      .collect()
  }
}

/// Passes one earlier artifact through unchanged.
#[derive(Debug, Clone)]
pub struct ArtifactInput {
  source: String,
}

impl ArtifactInput {
  pub fn new(source: impl Into<String>) -> Self {
    Self {
      source: source.into(),
    }
  }
}

#[async_trait]
impl InputTransform for ArtifactInput {
  async fn resolve(&self, ctx: &StepContext) -> Result<Value, StepError> {
    ctx.get_value(&self.source).await
  }

  fn dependencies(&self) -> Vec<String> {
    vec![self.source.clone()]
  }
}

/// Raw data fixed when the pipeline is built.
#[derive(Debug, Clone)]
pub struct Constant(pub Value);

#[async_trait]
impl InputTransform for Constant {
  async fn resolve(&self, _ctx: &StepContext) -> Result<Value, StepError> {
    Ok(self.0.clone())
  }
}

/// A fixed list of batch inputs, e.g. extracted document texts.
#[derive(Debug, Clone, Default)]
pub struct Items(pub Vec<Value>);

impl Items {
  /// Batch over a list of strings.
  pub fn texts<I, S>(texts: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Items(
      texts
        .into_iter()
        .map(|t| Value::String(t.into()))
        .collect(),
    )
  }
}

#[async_trait]
impl BatchInputTransform for Items {
  async fn resolve_batch(&self, _ctx: &StepContext) -> Result<Vec<Value>, StepError> {
    Ok(self.0.clone())
  }
}

/// Batches over the elements of an earlier list artifact.
#[derive(Debug, Clone)]
pub struct ExpandArtifact {
  source: String,
}

impl ExpandArtifact {
  pub fn new(source: impl Into<String>) -> Self {
    Self {
      source: source.into(),
    }
  }
}

#[async_trait]
impl BatchInputTransform for ExpandArtifact {
  async fn resolve_batch(&self, ctx: &StepContext) -> Result<Vec<Value>, StepError> {
    match ctx.get_value(&self.source).await? {
      Value::Array(items) => Ok(items),
      other => Err(StepError::InvalidInput {
        message: format!(
          "artifact '{}' is not a list (found {})",
          self.source,
          value_kind(&other)
        ),
      }),
    }
  }

  fn dependencies(&self) -> Vec<String> {
    vec![self.source.clone()]
  }
}

/// Stores the result under the step's name in the given format.
///
/// JSON accepts any value. Markdown and text require the worker to have
/// answered with a string.
#[derive(Debug, Clone, Copy, Default)]
pub struct Persist {
  format: ArtifactFormat,
}

impl Persist {
  pub fn new(format: ArtifactFormat) -> Self {
    Self { format }
  }

  pub fn json() -> Self {
    Self::new(ArtifactFormat::Json)
  }

  pub fn markdown() -> Self {
    Self::new(ArtifactFormat::Markdown)
  }

  pub fn format(&self) -> ArtifactFormat {
    self.format
  }
}

#[async_trait]
impl OutputTransform for Persist {
  async fn commit(&self, ctx: &StepContext, result: Value) -> Result<(), StepError> {
    let artifact = match self.format {
      ArtifactFormat::Json => Artifact::Json(result),
      format => match result {
        Value::String(content) => Artifact::Text { format, content },
        other => {
          return Err(StepError::Serialization {
            message: format!(
              "step '{}' produces {} output but the worker returned {}",
              ctx.step_name(),
              format.extension(),
              value_kind(&other)
            ),
          });
        }
      },
    };
    ctx.put(artifact).await
  }
}

/// Serialize a typed worker result into the canonical artifact representation.
///
/// Nested lists and maps of structured results serialize element-wise.
pub fn to_result<T: Serialize + ?Sized>(result: &T) -> Result<Value, StepError> {
  serde_json::to_value(result).map_err(|e| StepError::Serialization {
    message: e.to_string(),
  })
}

fn value_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "a list",
    Value::Object(_) => "an object",
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;
  use std::sync::Arc;

  use super::*;
  use crate::context::Context;
  use quire_artifact::MemoryStore;
  use serde::Deserialize;
  use serde_json::json;

  fn context() -> Context {
    Context::new(Arc::new(MemoryStore::new()))
  }

  async fn produce(ctx: &Context, step: &str, artifact: Artifact) {
    ctx.for_step(step).put(artifact).await.unwrap();
    ctx.commit_stage();
  }

  #[tokio::test]
  async fn test_named_sources_combines_fields() {
    let ctx = context();
    produce(&ctx, "related", Artifact::Json(json!({"themes": ["a"]}))).await;
    produce(&ctx, "gaps", Artifact::Json(json!(["g1"]))).await;

    let transform = NamedSources::new()
      .field("related_work", "related")
      .field("gaps", "gaps");

    let input = transform.resolve(&ctx.for_step("questions")).await.unwrap();
    assert_eq!(
      input,
      json!({"related_work": {"themes": ["a"]}, "gaps": ["g1"]})
    );
    let fields: Vec<&str> = input
      .as_object()
      .unwrap()
      .keys()
      .map(String::as_str)
      .collect();
    assert_eq!(fields, vec!["related_work", "gaps"]);
    assert_eq!(transform.dependencies(), vec!["related", "gaps"]);
  }

  #[tokio::test]
  async fn test_named_sources_missing_dependency() {
    let ctx = context();
    produce(&ctx, "related", Artifact::Json(json!({}))).await;

    let transform: NamedSources = [("related_work", "related"), ("gaps", "gaps")]
      .into_iter()
      .collect();

    let result = transform.resolve(&ctx.for_step("questions")).await;
    assert!(matches!(
      result,
      Err(StepError::MissingDependency { dependency }) if dependency == "gaps"
    ));
  }

  #[tokio::test]
  async fn test_text_artifact_reads_as_string() {
    let ctx = context();
    produce(&ctx, "paper", Artifact::markdown("# Title")).await;

    let input = ArtifactInput::new("paper")
      .resolve(&ctx.for_step("review"))
      .await
      .unwrap();
    assert_eq!(input, json!("# Title"));
  }

  #[tokio::test]
  async fn test_expand_artifact_requires_list() {
    let ctx = context();
    produce(&ctx, "list", Artifact::Json(json!(["a", "b"]))).await;
    produce(&ctx, "scalar", Artifact::Json(json!(3))).await;

    let items = ExpandArtifact::new("list")
      .resolve_batch(&ctx.for_step("each"))
      .await
      .unwrap();
    assert_eq!(items, vec![json!("a"), json!("b")]);

    let result = ExpandArtifact::new("scalar")
      .resolve_batch(&ctx.for_step("each"))
      .await;
    assert!(matches!(result, Err(StepError::InvalidInput { .. })));
  }

  #[tokio::test]
  async fn test_items_texts() {
    let ctx = context();
    let items = Items::texts(["doc1", "doc2"])
      .resolve_batch(&ctx.for_step("summaries"))
      .await
      .unwrap();
    assert_eq!(items, vec![json!("doc1"), json!("doc2")]);
  }

  #[tokio::test]
  async fn test_persist_markdown_requires_string() {
    let ctx = context();
    let step = ctx.for_step("paper");

    let result = Persist::markdown().commit(&step, json!({"not": "text"})).await;
    assert!(matches!(result, Err(StepError::Serialization { .. })));
    assert!(!step.has_written());

    Persist::markdown()
      .commit(&step, json!("# Paper"))
      .await
      .unwrap();
    assert!(step.has_written());
  }

  #[derive(Debug, PartialEq, Serialize, Deserialize)]
  struct Summary {
    title: Option<String>,
    keywords: Vec<String>,
    scores: BTreeMap<String, f64>,
  }

  #[tokio::test]
  async fn test_structured_round_trip() {
    let ctx = context();
    let summaries = vec![
      Summary {
        title: Some("Paper A".to_string()),
        keywords: vec!["rust".to_string(), "async".to_string()],
        scores: BTreeMap::from([("novelty".to_string(), 0.5)]),
      },
      Summary {
        title: None,
        keywords: vec![],
        scores: BTreeMap::new(),
      },
    ];

    let step = ctx.for_step("summaries");
    Persist::json()
      .commit(&step, to_result(&summaries).unwrap())
      .await
      .unwrap();
    ctx.commit_stage();

    let input = NamedSources::new()
      .field("summaries", "summaries")
      .resolve(&ctx.for_step("related"))
      .await
      .unwrap();

    let read_back: Vec<Summary> = serde_json::from_value(input["summaries"].clone()).unwrap();
    assert_eq!(read_back, summaries);
  }
}
