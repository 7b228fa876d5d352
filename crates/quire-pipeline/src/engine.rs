//! Pipeline execution engine.
//!
//! The [`Engine`] runs the stages of a [`Pipeline`] strictly in order. Every
//! step of a stage (and every element of a batched step) runs as its own tokio
//! task; the stage ends at a join barrier that waits for all of them, after
//! which the stage's artifacts are committed and the next stage may read them.
//!
//! A failing task does not cancel its siblings. The join waits for every
//! dispatched task to settle, then the first failure in declaration order is
//! surfaced and no later stage is dispatched.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::context::{Context, StepContext};
use crate::error::{InvocationError, PipelineError, StepError};
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::invoke::{Invoker, WorkerRef};
use crate::result::{RunResult, StageReport, StepReport, StepStatus};
use crate::step::{BatchStep, Member, Pipeline, Stage, Step};

/// Configuration for the engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
  /// Upper bound on simultaneous worker invocations across a stage.
  /// `None` leaves fan-out unbounded.
  pub max_concurrency: Option<usize>,
}

/// The pipeline execution engine.
///
/// Generic over `N: ExecutionNotifier`. Use [`Engine::new`] when events are
/// not needed, or [`Engine::with_notifier`] to observe them.
pub struct Engine<N: ExecutionNotifier = NoopNotifier> {
  config: EngineConfig,
  notifier: N,
}

impl Engine<NoopNotifier> {
  pub fn new(config: EngineConfig) -> Self {
    Self::with_notifier(config, NoopNotifier)
  }
}

impl Default for Engine<NoopNotifier> {
  fn default() -> Self {
    Self::new(EngineConfig::default())
  }
}

impl<N: ExecutionNotifier> Engine<N> {
  pub fn with_notifier(config: EngineConfig, notifier: N) -> Self {
    Self { config, notifier }
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Run every stage of `pipeline` against `context`.
  ///
  /// The context should be fresh for each run: only artifacts committed by
  /// this run's stages are readable through it.
  #[instrument(
    name = "pipeline_run",
    skip(self, pipeline, context, invoker, cancel),
    fields(pipeline = %pipeline.name())
  )]
  pub async fn run(
    &self,
    pipeline: &Pipeline,
    context: Context,
    invoker: Arc<dyn Invoker>,
    cancel: CancellationToken,
  ) -> Result<RunResult, PipelineError> {
    let execution_id = uuid::Uuid::new_v4().to_string();
    let started_at = Utc::now();

    info!(
      execution_id = %execution_id,
      pipeline = %pipeline.name(),
      stages = pipeline.len(),
      "run_started"
    );
    self.notifier.notify(ExecutionEvent::RunStarted {
      execution_id: execution_id.clone(),
      pipeline: pipeline.name().to_string(),
      stages: pipeline.len(),
    });

    let run = RunScope {
      execution_id: &execution_id,
      context: &context,
      invoker: &invoker,
      limiter: self
        .config
        .max_concurrency
        .map(|limit| Arc::new(Semaphore::new(limit.max(1)))),
      cancel: &cancel,
    };

    let result = self.run_stages(pipeline, &run).await;

    match &result {
      Ok(_) => {
        info!(execution_id = %execution_id, "run_completed");
        self.notifier.notify(ExecutionEvent::RunCompleted {
          execution_id: execution_id.clone(),
        });
      }
      Err(e) => {
        error!(execution_id = %execution_id, error = %e, "run_failed");
        self.notifier.notify(ExecutionEvent::RunFailed {
          execution_id: execution_id.clone(),
          error: e.to_string(),
        });
      }
    }

    let stages = result?;
    Ok(RunResult {
      execution_id,
      pipeline: pipeline.name().to_string(),
      stages,
      started_at,
      completed_at: Utc::now(),
    })
  }

  async fn run_stages(
    &self,
    pipeline: &Pipeline,
    run: &RunScope<'_>,
  ) -> Result<Vec<StageReport>, PipelineError> {
    let mut reports = Vec::with_capacity(pipeline.len());
    for stage in pipeline.stages() {
      if run.cancel.is_cancelled() {
        warn!(execution_id = %run.execution_id, "run cancelled");
        return Err(PipelineError::Cancelled);
      }
      reports.push(self.run_stage(stage, run).await?);
    }
    Ok(reports)
  }

  /// Dispatch every member of a stage, wait for all of them, then commit.
  async fn run_stage(
    &self,
    stage: &Stage,
    run: &RunScope<'_>,
  ) -> Result<StageReport, PipelineError> {
    let execution_id = run.execution_id;
    let members = stage.members();
    let step_names: Vec<String> = members.iter().map(|m| m.name().to_string()).collect();
    let started_at = Utc::now();

    info!(
      execution_id = %execution_id,
      stage = %stage.name(),
      kind = %stage.kind(),
      steps = ?step_names,
      "stage_started"
    );
    self.notifier.notify(ExecutionEvent::StageStarted {
      execution_id: execution_id.to_string(),
      stage: stage.name().to_string(),
      kind: stage.kind(),
      steps: step_names,
    });

    let mut handles = Vec::with_capacity(members.len());
    for member in &members {
      info!(
        execution_id = %execution_id,
        stage = %stage.name(),
        step = %member.name(),
        worker = %member.worker().name,
        "step_started"
      );
      self.notifier.notify(ExecutionEvent::StepStarted {
        execution_id: execution_id.to_string(),
        stage: stage.name().to_string(),
        step: member.name().to_string(),
        worker: member.worker().name.clone(),
      });

      let task = StepTask {
        member: member.clone(),
        ctx: run.context.for_step(member.name()),
        invoker: run.invoker.clone(),
        limiter: run.limiter.clone(),
      };
      handles.push(tokio::spawn(task.run()));
    }
    let _abort = AbortOnDrop::new(&handles);

    let outcomes = tokio::select! {
      outcomes = join_all(handles) => outcomes,
      _ = run.cancel.cancelled() => {
        warn!(execution_id = %execution_id, stage = %stage.name(), "run cancelled during stage");
        run.context.discard_stage();
        return Err(PipelineError::Cancelled);
      }
    };

    let mut reports = Vec::with_capacity(members.len());
    let mut first_failure: Option<(String, StepError)> = None;

    for (member, joined) in members.iter().zip(outcomes) {
      let outcome = joined.unwrap_or_else(|e| StepOutcome {
        started_at,
        completed_at: Utc::now(),
        result: Err(StepError::Panicked {
          message: e.to_string(),
        }),
      });

      let mut report = StepReport {
        step: member.name().to_string(),
        worker: member.worker().name.clone(),
        status: StepStatus::Completed,
        invocations: 0,
        started_at: outcome.started_at,
        completed_at: Some(outcome.completed_at),
        error: None,
      };

      match outcome.result {
        Ok(invocations) => {
          info!(
            execution_id = %execution_id,
            stage = %stage.name(),
            step = %member.name(),
            invocations,
            "step_completed"
          );
          self.notifier.notify(ExecutionEvent::StepCompleted {
            execution_id: execution_id.to_string(),
            stage: stage.name().to_string(),
            step: member.name().to_string(),
            invocations,
          });
          report.invocations = invocations;
        }
        Err(e) => {
          error!(
            execution_id = %execution_id,
            stage = %stage.name(),
            step = %member.name(),
            error = %e,
            "step_failed"
          );
          self.notifier.notify(ExecutionEvent::StepFailed {
            execution_id: execution_id.to_string(),
            stage: stage.name().to_string(),
            step: member.name().to_string(),
            error: e.to_string(),
          });
          report.status = StepStatus::Failed;
          report.error = Some(e.to_string());
          if first_failure.is_none() {
            first_failure = Some((member.name().to_string(), e));
          }
        }
      }
      reports.push(report);
    }

    if let Some((step, source)) = first_failure {
      run.context.discard_stage();
      let err = PipelineError::StepFailed {
        stage: stage.name().to_string(),
        step,
        source,
      };
      error!(
        execution_id = %execution_id,
        stage = %stage.name(),
        error = %err,
        "stage_failed"
      );
      self.notifier.notify(ExecutionEvent::StageFailed {
        execution_id: execution_id.to_string(),
        stage: stage.name().to_string(),
        error: err.to_string(),
      });
      return Err(err);
    }

    let artifacts = run.context.commit_stage();
    info!(
      execution_id = %execution_id,
      stage = %stage.name(),
      artifacts = ?artifacts,
      "stage_completed"
    );
    self.notifier.notify(ExecutionEvent::StageCompleted {
      execution_id: execution_id.to_string(),
      stage: stage.name().to_string(),
      artifacts,
    });

    Ok(StageReport {
      stage: stage.name().to_string(),
      kind: stage.kind(),
      steps: reports,
      started_at,
      completed_at: Utc::now(),
    })
  }
}

/// Per-run state shared by every stage.
struct RunScope<'a> {
  execution_id: &'a str,
  context: &'a Context,
  invoker: &'a Arc<dyn Invoker>,
  limiter: Option<Arc<Semaphore>>,
  cancel: &'a CancellationToken,
}

struct StepOutcome {
  started_at: DateTime<Utc>,
  completed_at: DateTime<Utc>,
  /// Number of worker invocations on success.
  result: Result<usize, StepError>,
}

/// Everything a spawned step needs, owned so the task is `'static`.
struct StepTask {
  member: Member,
  ctx: StepContext,
  invoker: Arc<dyn Invoker>,
  limiter: Option<Arc<Semaphore>>,
}

impl StepTask {
  async fn run(self) -> StepOutcome {
    let started_at = Utc::now();
    let result = match &self.member {
      Member::Step(step) => self.run_single(step).await,
      Member::Batch(step) => self.run_batch(step).await,
    };
    StepOutcome {
      started_at,
      completed_at: Utc::now(),
      result,
    }
  }

  async fn run_single(&self, step: &Step) -> Result<usize, StepError> {
    let input = step.input().resolve(&self.ctx).await?;
    let result = invoke_limited(
      self.invoker.as_ref(),
      self.limiter.as_deref(),
      step.worker(),
      input,
    )
    .await
    .map_err(StepError::Invocation)?;

    step.output().commit(&self.ctx, result).await?;
    ensure_written(&self.ctx)?;
    Ok(1)
  }

  /// One invocation per input element; results keep input order.
  ///
  /// Nothing is written unless every invocation succeeds.
  async fn run_batch(&self, step: &BatchStep) -> Result<usize, StepError> {
    let inputs = step.input().resolve_batch(&self.ctx).await?;
    let count = inputs.len();

    let handles: Vec<JoinHandle<Result<Value, InvocationError>>> = inputs
      .into_iter()
      .map(|input| {
        let invoker = self.invoker.clone();
        let limiter = self.limiter.clone();
        let worker = step.worker().clone();
        tokio::spawn(async move {
          invoke_limited(invoker.as_ref(), limiter.as_deref(), &worker, input).await
        })
      })
      .collect();
    let _abort = AbortOnDrop::new(&handles);

    let settled = join_all(handles).await;

    let mut results = Vec::with_capacity(count);
    let mut first_error: Option<StepError> = None;
    for (index, joined) in settled.into_iter().enumerate() {
      match joined {
        Ok(Ok(value)) => results.push(value),
        Ok(Err(source)) => {
          warn!(
            step = %step.name(),
            index,
            error = %source,
            "batch_invocation_failed"
          );
          if first_error.is_none() {
            first_error = Some(StepError::BatchInvocation { index, source });
          }
        }
        Err(e) => {
          if first_error.is_none() {
            first_error = Some(StepError::Panicked {
              message: format!("batch input {}: {}", index, e),
            });
          }
        }
      }
    }
    if let Some(e) = first_error {
      return Err(e);
    }

    step.output().commit(&self.ctx, Value::Array(results)).await?;
    ensure_written(&self.ctx)?;
    Ok(count)
  }
}

async fn invoke_limited(
  invoker: &dyn Invoker,
  limiter: Option<&Semaphore>,
  worker: &WorkerRef,
  input: Value,
) -> Result<Value, InvocationError> {
  let _permit = match limiter {
    Some(semaphore) => Some(
      semaphore
        .acquire()
        .await
        .map_err(|e| InvocationError::failed(&worker.name, e.to_string()))?,
    ),
    None => None,
  };
  invoker.invoke(worker, input).await
}

fn ensure_written(ctx: &StepContext) -> Result<(), StepError> {
  if ctx.has_written() {
    Ok(())
  } else {
    Err(StepError::OutputNotWritten {
      key: ctx.step_name().to_string(),
    })
  }
}

/// Aborts the tracked tasks when dropped.
///
/// Dropping a `JoinHandle` detaches its task; this keeps cancelled or
/// abandoned stages from leaving workers running in the background.
struct AbortOnDrop(Vec<AbortHandle>);

impl AbortOnDrop {
  fn new<T>(handles: &[JoinHandle<T>]) -> Self {
    Self(handles.iter().map(|h| h.abort_handle()).collect())
  }
}

impl Drop for AbortOnDrop {
  fn drop(&mut self) {
    for handle in &self.0 {
      handle.abort();
    }
  }
}
