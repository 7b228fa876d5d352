//! Shared execution context.
//!
//! A [`Context`] is the per-run view over an artifact [`Store`]. Artifacts
//! written by a stage are staged as *pending* and only become readable once the
//! engine commits the stage at its join barrier, so no step can observe a
//! sibling's output. Artifacts left in the store by earlier runs are never
//! visible; a run only reads what it produced itself.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use quire_artifact::{Artifact, Store};
use serde_json::Value;

use crate::error::StepError;

struct ContextState {
  /// Keys committed by completed stages of this run.
  visible: HashSet<String>,
  /// Keys written by the stage currently running.
  pending: HashSet<String>,
}

/// Execution context shared by every step of one run.
///
/// Cheap to clone; clones share the same store and visibility state.
#[derive(Clone)]
pub struct Context {
  store: Arc<dyn Store>,
  state: Arc<RwLock<ContextState>>,
}

impl Context {
  /// Create an empty context over the given store.
  pub fn new(store: Arc<dyn Store>) -> Self {
    Self {
      store,
      state: Arc::new(RwLock::new(ContextState {
        visible: HashSet::new(),
        pending: HashSet::new(),
      })),
    }
  }

  /// The underlying artifact store.
  pub fn store(&self) -> &Arc<dyn Store> {
    &self.store
  }

  /// Whether `key` was committed by an earlier stage of this run.
  pub fn is_visible(&self, key: &str) -> bool {
    self.read_state().visible.contains(key)
  }

  /// Keys committed so far, sorted.
  pub fn visible_keys(&self) -> Vec<String> {
    let mut keys: Vec<String> = self.read_state().visible.iter().cloned().collect();
    keys.sort();
    keys
  }

  /// A view of this context for one step.
  pub fn for_step(&self, step: impl Into<String>) -> StepContext {
    StepContext {
      context: self.clone(),
      step: step.into(),
    }
  }

  /// Make every artifact written by the current stage readable.
  pub(crate) fn commit_stage(&self) -> Vec<String> {
    let mut state = self.write_state();
    let mut committed: Vec<String> = state.pending.drain().collect();
    committed.sort();
    state.visible.extend(committed.iter().cloned());
    committed
  }

  /// Forget the artifacts written by a stage that failed.
  ///
  /// The files stay in the store for inspection but are never readable by
  /// this run.
  pub(crate) fn discard_stage(&self) {
    self.write_state().pending.clear();
  }

  pub(crate) fn is_pending(&self, key: &str) -> bool {
    self.read_state().pending.contains(key)
  }

  fn mark_pending(&self, key: &str) {
    self.write_state().pending.insert(key.to_string());
  }

  fn read_state(&self) -> std::sync::RwLockReadGuard<'_, ContextState> {
    self.state.read().unwrap_or_else(|e| e.into_inner())
  }

  fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, ContextState> {
    self.state.write().unwrap_or_else(|e| e.into_inner())
  }
}

/// The context as seen by one step's transforms.
///
/// Reads are limited to committed artifacts. Writes always target the step's
/// own key, so two steps can never write the same artifact.
#[derive(Clone)]
pub struct StepContext {
  context: Context,
  step: String,
}

impl StepContext {
  /// Name of the step this view belongs to.
  pub fn step_name(&self) -> &str {
    &self.step
  }

  /// The run-wide context.
  pub fn context(&self) -> &Context {
    &self.context
  }

  /// Read an artifact committed by an earlier stage.
  pub async fn get(&self, key: &str) -> Result<Artifact, StepError> {
    if !self.context.is_visible(key) {
      return Err(StepError::MissingDependency {
        dependency: key.to_string(),
      });
    }

    match self.context.store.get(key).await {
      Ok(artifact) => Ok(artifact),
      Err(quire_artifact::Error::NotFound(_)) => Err(StepError::MissingDependency {
        dependency: key.to_string(),
      }),
      Err(e) => Err(e.into()),
    }
  }

  /// Read an artifact committed by an earlier stage as a JSON value.
  pub async fn get_value(&self, key: &str) -> Result<Value, StepError> {
    Ok(self.get(key).await?.into_value())
  }

  /// Store this step's artifact.
  pub async fn put(&self, artifact: Artifact) -> Result<(), StepError> {
    self.context.store.put(&self.step, artifact).await?;
    self.context.mark_pending(&self.step);
    Ok(())
  }

  /// Whether this step has stored its artifact during the current stage.
  pub fn has_written(&self) -> bool {
    self.context.is_pending(&self.step)
  }
}
