use std::collections::HashSet;

use quire_config::{ArtifactFormat, BatchDef, ItemsDef, MemberDef, StageDef, StepDef, WorkflowDef};
use quire_pipeline::{
  ArtifactInput, BatchStep, ExpandArtifact, Group, Items, Member, NamedSources, Persist, Pipeline,
  Stage, Step, WorkerRef,
};
use tracing::debug;

use crate::error::BuildError;

/// Turns a [`WorkflowDef`] into an executable [`Pipeline`].
///
/// Batches over `documents` receive the ingested document texts in order.
pub struct PipelineBuilder {
  documents: Vec<String>,
}

impl PipelineBuilder {
  pub fn new(documents: Vec<String>) -> Self {
    Self { documents }
  }

  /// Build the pipeline, checking that every step only reads artifacts of
  /// earlier stages.
  pub fn build(&self, def: &WorkflowDef) -> Result<Pipeline, BuildError> {
    if def.stages.is_empty() {
      return Err(BuildError::EmptyWorkflow {
        name: def.name.clone(),
      });
    }

    let mut pipeline = Pipeline::new(&def.name);
    let mut produced: HashSet<String> = HashSet::new();

    for stage_def in &def.stages {
      let stage = self.build_stage(stage_def, &produced)?;
      pipeline.push(stage)?;
      produced.extend(stage_def.step_names().into_iter().map(String::from));
    }

    debug!(
      workflow = %def.name,
      stages = pipeline.len(),
      documents = self.documents.len(),
      "pipeline_built"
    );
    Ok(pipeline)
  }

  fn build_stage(&self, def: &StageDef, produced: &HashSet<String>) -> Result<Stage, BuildError> {
    match def {
      StageDef::Step(step) => Ok(build_step(step, produced)?.into()),
      StageDef::Batch(batch) => Ok(self.build_batch(batch, produced)?.into()),
      StageDef::Group(group) => {
        let mut built = Group::new(&group.name);
        for member in &group.steps {
          built = built.with(self.build_member(member, produced)?);
        }
        Ok(built.into())
      }
    }
  }

  fn build_member(
    &self,
    def: &MemberDef,
    produced: &HashSet<String>,
  ) -> Result<Member, BuildError> {
    match def {
      MemberDef::Step(step) => Ok(build_step(step, produced)?.into()),
      MemberDef::Batch(batch) => Ok(self.build_batch(batch, produced)?.into()),
    }
  }

  fn build_batch(
    &self,
    def: &BatchDef,
    produced: &HashSet<String>,
  ) -> Result<BatchStep, BuildError> {
    if def.format != ArtifactFormat::Json {
      return Err(BuildError::BatchFormat {
        step: def.name.clone(),
      });
    }

    let worker = WorkerRef::new(&def.worker);
    let batch = match &def.items {
      ItemsDef::Documents => BatchStep::new(
        &def.name,
        worker,
        Items::texts(self.documents.iter().cloned()),
        Persist::json(),
      ),
      ItemsDef::Artifact { name } => {
        check_source(&def.name, name, produced)?;
        BatchStep::new(&def.name, worker, ExpandArtifact::new(name), Persist::json())
      }
    };
    Ok(batch)
  }
}

fn build_step(def: &StepDef, produced: &HashSet<String>) -> Result<Step, BuildError> {
  let worker = if def.format.is_text() {
    WorkerRef::text(&def.worker)
  } else {
    WorkerRef::new(&def.worker)
  };
  let output = Persist::new(def.format);

  match (&def.from, def.inputs.is_empty()) {
    (Some(source), true) => {
      check_source(&def.name, source, produced)?;
      Ok(Step::new(&def.name, worker, ArtifactInput::new(source), output))
    }
    (None, false) => {
      for source in def.inputs.values() {
        check_source(&def.name, source, produced)?;
      }
      let sources: NamedSources = def
        .inputs
        .iter()
        .map(|(field, source)| (field.as_str(), source.as_str()))
        .collect();
      Ok(Step::new(&def.name, worker, sources, output))
    }
    (Some(_), false) => Err(BuildError::InvalidInputs {
      step: def.name.clone(),
      message: "set either 'from' or 'inputs', not both".to_string(),
    }),
    (None, true) => Err(BuildError::InvalidInputs {
      step: def.name.clone(),
      message: "no inputs; set 'from' or 'inputs'".to_string(),
    }),
  }
}

fn check_source(step: &str, source: &str, produced: &HashSet<String>) -> Result<(), BuildError> {
  if produced.contains(source) {
    Ok(())
  } else {
    Err(BuildError::UnknownSource {
      step: step.to_string(),
      source_step: source.to_string(),
    })
  }
}
