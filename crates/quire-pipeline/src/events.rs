//! Execution events and notifiers.
//!
//! The engine reports every state transition of a run as an
//! [`ExecutionEvent`]. Consumers observe progress through an
//! [`ExecutionNotifier`] (print it, stream it, record it in tests).

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::step::StageKind;

/// Events emitted during a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
  RunStarted {
    execution_id: String,
    pipeline: String,
    stages: usize,
  },

  /// A stage is about to dispatch its steps.
  StageStarted {
    execution_id: String,
    stage: String,
    kind: StageKind,
    steps: Vec<String>,
  },

  StepStarted {
    execution_id: String,
    stage: String,
    step: String,
    worker: String,
  },

  /// A step stored its artifact. It becomes readable once its stage completes.
  StepCompleted {
    execution_id: String,
    stage: String,
    step: String,
    invocations: usize,
  },

  StepFailed {
    execution_id: String,
    stage: String,
    step: String,
    error: String,
  },

  /// Every step of the stage completed and its artifacts were committed.
  StageCompleted {
    execution_id: String,
    stage: String,
    artifacts: Vec<String>,
  },

  StageFailed {
    execution_id: String,
    stage: String,
    error: String,
  },

  RunCompleted { execution_id: String },

  RunFailed { execution_id: String, error: String },
}

impl ExecutionEvent {
  /// The execution this event belongs to.
  pub fn execution_id(&self) -> &str {
    match self {
      ExecutionEvent::RunStarted { execution_id, .. }
      | ExecutionEvent::StageStarted { execution_id, .. }
      | ExecutionEvent::StepStarted { execution_id, .. }
      | ExecutionEvent::StepCompleted { execution_id, .. }
      | ExecutionEvent::StepFailed { execution_id, .. }
      | ExecutionEvent::StageCompleted { execution_id, .. }
      | ExecutionEvent::StageFailed { execution_id, .. }
      | ExecutionEvent::RunCompleted { execution_id }
      | ExecutionEvent::RunFailed { execution_id, .. } => execution_id,
    }
  }
}

/// Receives execution events.
///
/// `notify` is called from the engine's task; implementations must not block.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// Sends events to an unbounded channel.
///
/// Event volume is a handful per step, so the channel is left unbounded and a
/// slow consumer never stalls the engine.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }

  /// Create a notifier together with the receiving end of its channel.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // The receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}

impl<T: ExecutionNotifier + ?Sized> ExecutionNotifier for std::sync::Arc<T> {
  fn notify(&self, event: ExecutionEvent) {
    (**self).notify(event)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_channel_notifier_delivers_in_order() {
    let (notifier, mut rx) = ChannelNotifier::channel();
    notifier.notify(ExecutionEvent::RunStarted {
      execution_id: "e1".to_string(),
      pipeline: "p".to_string(),
      stages: 2,
    });
    notifier.notify(ExecutionEvent::RunCompleted {
      execution_id: "e1".to_string(),
    });

    assert!(matches!(rx.try_recv(), Ok(ExecutionEvent::RunStarted { stages: 2, .. })));
    assert!(matches!(rx.try_recv(), Ok(ExecutionEvent::RunCompleted { .. })));
  }

  #[test]
  fn test_channel_notifier_ignores_dropped_receiver() {
    let (notifier, rx) = ChannelNotifier::channel();
    drop(rx);
    notifier.notify(ExecutionEvent::RunCompleted {
      execution_id: "e1".to_string(),
    });
  }

  #[test]
  fn test_event_serializes_with_tag() {
    let event = ExecutionEvent::StepFailed {
      execution_id: "e1".to_string(),
      stage: "s".to_string(),
      step: "a".to_string(),
      error: "boom".to_string(),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], "step_failed");
    assert_eq!(json["step"], "a");
    assert_eq!(event.execution_id(), "e1");
  }
}
