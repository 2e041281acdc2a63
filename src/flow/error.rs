//! # Flow Errors
//!
//! Errors returned by the [`PaymentFlowOrchestrator`](crate::flow::PaymentFlowOrchestrator)
//! handle itself. Payment failures are never reported here: they become
//! state transitions and observer callbacks.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FlowError {
    /// The orchestrator task is gone (disposed or shut down).
    #[error("Payment flow closed")]
    Closed,

    /// The orchestrator task dropped the reply channel.
    #[error("Payment flow dropped response channel")]
    Dropped,

    /// The configuration cannot drive a payment flow.
    #[error("Invalid flow configuration: {0}")]
    Config(String),
}
