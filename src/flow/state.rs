//! The in-memory state of one payment attempt.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a payment attempt currently is in its lifecycle.
///
/// Variants are declared in lifecycle order. Within a single attempt the
/// status only moves forward (see [`FlowStatus::stage`]); going back to
/// [`FlowStatus::Idle`] requires an explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    #[default]
    Idle,
    Validating,
    CreatingCollection,
    SelectingApp,
    /// Part of the UI vocabulary; no transition in the orchestrator enters it.
    WaitingPayment,
    WaitingInApp,
    ProcessingPayout,
    Completed,
    Failed,
}

impl FlowStatus {
    /// Position in the lifecycle. Terminal statuses share the highest stage.
    pub fn stage(self) -> u8 {
        match self {
            FlowStatus::Idle => 0,
            FlowStatus::Validating => 1,
            FlowStatus::CreatingCollection => 2,
            FlowStatus::SelectingApp => 3,
            FlowStatus::WaitingPayment => 4,
            FlowStatus::WaitingInApp => 5,
            FlowStatus::ProcessingPayout => 6,
            FlowStatus::Completed | FlowStatus::Failed => 7,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FlowStatus::Completed | FlowStatus::Failed)
    }

    /// Default display text for this status.
    pub fn default_message(self) -> &'static str {
        match self {
            FlowStatus::Idle => "Ready to pay",
            FlowStatus::Validating => "Validating payment details...",
            FlowStatus::CreatingCollection => "Creating secure payment...",
            FlowStatus::SelectingApp => "Choose an app to complete the payment",
            FlowStatus::WaitingPayment => "Waiting for payment...",
            FlowStatus::WaitingInApp => "Complete the payment in your UPI app",
            FlowStatus::ProcessingPayout => "Payment received, sending to recipient...",
            FlowStatus::Completed => "Payment completed",
            FlowStatus::Failed => "Payment failed",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FlowStatus::Idle => "idle",
            FlowStatus::Validating => "validating",
            FlowStatus::CreatingCollection => "creating_collection",
            FlowStatus::SelectingApp => "selecting_app",
            FlowStatus::WaitingPayment => "waiting_payment",
            FlowStatus::WaitingInApp => "waiting_in_app",
            FlowStatus::ProcessingPayout => "processing_payout",
            FlowStatus::Completed => "completed",
            FlowStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a payment attempt, as handed to observers and callers.
///
/// Callers only ever receive clones; the live value is owned by the
/// orchestrator task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowState {
    pub status: FlowStatus,
    /// Display text. Never used for control flow.
    pub message: String,
    pub reference_id: Option<String>,
    /// Opaque app-selection payload from the backend.
    pub collection_links: Option<serde_json::Value>,
    /// Only present while `status` is [`FlowStatus::Failed`].
    pub error: Option<String>,
    pub can_retry: bool,
}

impl Default for FlowState {
    fn default() -> Self {
        Self {
            status: FlowStatus::Idle,
            message: FlowStatus::Idle.default_message().to_string(),
            reference_id: None,
            collection_links: None,
            error: None,
            can_retry: false,
        }
    }
}

impl FlowState {
    /// Moves to `status` with its default message, clearing any error.
    pub(crate) fn advance(&mut self, status: FlowStatus) {
        self.advance_with(status, status.default_message());
    }

    pub(crate) fn advance_with(&mut self, status: FlowStatus, message: impl Into<String>) {
        self.status = status;
        self.message = message.into();
        self.error = None;
        self.can_retry = false;
    }

    pub(crate) fn fail(&mut self, error: impl Into<String>, can_retry: bool) {
        let error = error.into();
        self.status = FlowStatus::Failed;
        self.message = error.clone();
        self.error = Some(error);
        self.can_retry = can_retry;
    }
}
