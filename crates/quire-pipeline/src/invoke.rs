//! The worker invocation boundary.
//!
//! The engine never knows how a worker runs. Callers supply an [`Invoker`]
//! which receives the worker reference and the input produced by the step's
//! input transform, and returns the worker's result.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::InvocationError;

/// Shape of the result a worker is expected to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
  /// A structured (JSON) document.
  #[default]
  Structured,
  /// Free text.
  Text,
}

/// Reference to an external worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerRef {
  /// Worker name, e.g. "Paper Summarizer Agent".
  pub name: String,

  /// What the worker answers with.
  #[serde(default)]
  pub response: ResponseKind,
}

impl WorkerRef {
  /// Reference a worker producing structured results.
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      response: ResponseKind::Structured,
    }
  }

  /// Reference a worker producing free text.
  pub fn text(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      response: ResponseKind::Text,
    }
  }
}

/// Invokes workers on behalf of the engine.
///
/// Implementations must be safe to call concurrently; the engine issues one
/// call per member of a group and per element of a batch at the same time.
#[async_trait]
pub trait Invoker: Send + Sync {
  /// Run `worker` on `input` and return its result.
  async fn invoke(&self, worker: &WorkerRef, input: Value) -> Result<Value, InvocationError>;
}

#[async_trait]
impl<T: Invoker + ?Sized> Invoker for Arc<T> {
  async fn invoke(&self, worker: &WorkerRef, input: Value) -> Result<Value, InvocationError> {
    (**self).invoke(worker, input).await
  }
}

/// An [`Invoker`] backed by an async function.
///
/// Created with [`invoker_fn`].
pub struct FnInvoker<F> {
  f: F,
}

/// Build an [`Invoker`] from an async function or closure.
///
/// ```ignore
/// let invoker = invoker_fn(|worker: WorkerRef, input: Value| async move {
///   Ok::<_, InvocationError>(json!({ "worker": worker.name, "echo": input }))
/// });
/// ```
pub fn invoker_fn<F, Fut>(f: F) -> FnInvoker<F>
where
  F: Fn(WorkerRef, Value) -> Fut + Send + Sync,
  Fut: Future<Output = Result<Value, InvocationError>> + Send,
{
  FnInvoker { f }
}

#[async_trait]
impl<F, Fut> Invoker for FnInvoker<F>
where
  F: Fn(WorkerRef, Value) -> Fut + Send + Sync,
  Fut: Future<Output = Result<Value, InvocationError>> + Send,
{
  async fn invoke(&self, worker: &WorkerRef, input: Value) -> Result<Value, InvocationError> {
    (self.f)(worker.clone(), input).await
  }
}

/// Bounds every invocation of the wrapped invoker by a deadline.
///
/// An expired deadline surfaces as [`InvocationError::Timeout`]; the engine
/// treats it like any other invocation failure.
pub struct TimeoutInvoker<I> {
  inner: I,
  timeout: Duration,
}

impl<I: Invoker> TimeoutInvoker<I> {
  pub fn new(inner: I, timeout: Duration) -> Self {
    Self { inner, timeout }
  }
}

#[async_trait]
impl<I: Invoker> Invoker for TimeoutInvoker<I> {
  async fn invoke(&self, worker: &WorkerRef, input: Value) -> Result<Value, InvocationError> {
    match tokio::time::timeout(self.timeout, self.inner.invoke(worker, input)).await {
      Ok(result) => result,
      Err(_) => Err(InvocationError::timeout(&worker.name, self.timeout)),
    }
  }
}
