//! Runs the built-in research workflow against fake workers.

use std::sync::{Arc, Mutex};

use quire_artifact::{ArtifactFormat, MemoryStore, Store};
use quire_builder::{PipelineBuilder, research_workflow};
use quire_pipeline::{
  Context, Engine, EngineConfig, InvocationError, ResponseKind, WorkerRef, invoker_fn,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_research_workflow_runs_every_stage() {
  let inputs: Arc<Mutex<Vec<(String, Value)>>> = Arc::default();
  let recorded = inputs.clone();

  let invoker = Arc::new(invoker_fn(move |worker: WorkerRef, input: Value| {
    let recorded = recorded.clone();
    async move {
      recorded
        .lock()
        .unwrap()
        .push((worker.name.clone(), input.clone()));
      let output = match worker.response {
        ResponseKind::Text => json!("# A paper\n\nBody."),
        ResponseKind::Structured => json!({ "agent": worker.name, "input_kind": input.is_string() }),
      };
      Ok::<_, InvocationError>(output)
    }
  }));

  let documents = vec!["first paper".to_string(), "second paper".to_string()];
  let pipeline = PipelineBuilder::new(documents)
    .build(&research_workflow())
    .unwrap();

  let store = Arc::new(MemoryStore::new());
  let result = Engine::new(EngineConfig::default())
    .run(
      &pipeline,
      Context::new(store.clone()),
      invoker,
      CancellationToken::new(),
    )
    .await
    .unwrap();

  assert_eq!(result.stages.len(), 11);
  assert_eq!(result.artifacts().len(), 12);

  let summaries = store.get("paper_summary").await.unwrap().into_value();
  assert_eq!(summaries.as_array().map(|a| a.len()), Some(2));
  assert_eq!(summaries[0]["input_kind"], json!(true));

  let paper = store.get("paper").await.unwrap();
  assert_eq!(paper.format(), ArtifactFormat::Markdown);
  assert_eq!(paper.into_value(), json!("# A paper\n\nBody."));

  let inputs = inputs.lock().unwrap();
  assert_eq!(inputs.len(), 13);

  let (_, writer_input) = inputs
    .iter()
    .find(|(worker, _)| worker == "Paper Writer Agent")
    .unwrap();
  let fields: Vec<&str> = writer_input
    .as_object()
    .unwrap()
    .keys()
    .map(String::as_str)
    .collect();
  assert_eq!(fields.len(), 9);
  assert_eq!(
    writer_input["research_gaps"]["agent"],
    json!("Gap Identifier Agent")
  );
}
