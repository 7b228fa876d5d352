//! Staged worker-pipeline execution.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s. A stage is a single
//! [`Step`], a [`BatchStep`] that calls its worker once per input element, or a
//! [`Group`] of independent steps that run concurrently. Steps read the
//! artifacts of earlier stages through their input transform, call an external
//! worker through an [`Invoker`], and store the result under their own name
//! through their output transform.
//!
//! The [`Engine`] runs stages strictly in order with a join barrier between
//! them; a stage's artifacts become readable only after every step of that
//! stage has finished.

pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod invoke;
pub mod result;
pub mod step;
pub mod transform;

pub use context::{Context, StepContext};
pub use engine::{Engine, EngineConfig};
pub use error::{InvocationError, PipelineError, StepError};
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use invoke::{FnInvoker, Invoker, ResponseKind, TimeoutInvoker, WorkerRef, invoker_fn};
pub use result::{RunResult, StageReport, StepReport, StepStatus};
pub use step::{BatchStep, Group, Member, Pipeline, Stage, StageKind, Step};
pub use transform::{
  ArtifactInput, BatchInputTransform, Constant, ExpandArtifact, InputTransform, Items,
  NamedSources, OutputTransform, Persist, to_result,
};
