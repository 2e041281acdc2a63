//! Callback surface through which the orchestrator reports progress.

use crate::flow::state::FlowState;
use tokio::sync::mpsc;

/// Receives notifications from a running payment flow.
///
/// Every method is called from inside the orchestrator task, synchronously
/// and in the order the transitions happen, so implementations should return
/// quickly. All methods have no-op defaults; implement only what you need.
///
/// `on_success`, `on_failure` and `on_timeout` fire at most once per attempt
/// and only on a terminal transition. A timeout calls `on_timeout` but not
/// `on_failure`, although both leave the state `failed`.
pub trait FlowObserver: Send + Sync + 'static {
    /// Called after every state mutation with a copy of the new state.
    fn on_state_change(&self, _state: &FlowState) {}

    /// The payout completed.
    fn on_success(&self, _reference_id: &str) {}

    /// Creation failed or the backend reported the payment as failed.
    fn on_failure(&self, _error: &str, _can_retry: bool) {}

    /// The payment did not reach a terminal status in time. It may still
    /// settle out of band and need manual reconciliation.
    fn on_timeout(&self) {}
}

/// Observer that ignores everything.
impl FlowObserver for () {}

/// One observer notification, in a form that can cross a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    StateChanged(FlowState),
    Succeeded { reference_id: String },
    Failed { error: String, can_retry: bool },
    TimedOut,
}

impl FlowEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FlowEvent::StateChanged(_))
    }
}

/// Forwards every notification as a [`FlowEvent`] on an unbounded channel.
///
/// Handy for UI bridges and tests that want to `await` the next event
/// instead of sharing state with the callback.
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<FlowEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FlowEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn emit(&self, event: FlowEvent) {
        // Nobody listening is fine.
        let _ = self.sender.send(event);
    }
}

impl FlowObserver for ChannelObserver {
    fn on_state_change(&self, state: &FlowState) {
        self.emit(FlowEvent::StateChanged(state.clone()));
    }

    fn on_success(&self, reference_id: &str) {
        self.emit(FlowEvent::Succeeded {
            reference_id: reference_id.to_string(),
        });
    }

    fn on_failure(&self, error: &str, can_retry: bool) {
        self.emit(FlowEvent::Failed {
            error: error.to_string(),
            can_retry,
        });
    }

    fn on_timeout(&self) {
        self.emit(FlowEvent::TimedOut);
    }
}
