//! # PaymentBackend Trait
//!
//! The seam between the orchestrator and the remote payment service. The
//! production implementation is [`HttpPaymentBackend`](crate::backend::HttpPaymentBackend);
//! tests use [`MockBackend`](crate::backend::mock::MockBackend).

use crate::backend::types::{CreateEscrowRequest, CreateEscrowResponse, StatusResponse};
use async_trait::async_trait;
use thiserror::Error;

/// Errors a backend call can produce.
///
/// These never reach observers as-is; the orchestrator turns them into
/// messages or swallows them (status polls).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    /// The request did not complete (connection, DNS, timeout).
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("Backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("Invalid backend response: {0}")]
    Decode(String),

    /// The configured base URL cannot address the backend.
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    /// No answer is available (used by test doubles).
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Client-side contract of the payment backend.
#[async_trait]
pub trait PaymentBackend: Send + Sync + 'static {
    /// Creates the escrow/collection record for a new attempt.
    async fn create_escrow(
        &self,
        request: CreateEscrowRequest,
    ) -> Result<CreateEscrowResponse, BackendError>;

    /// Reads the current remote status of a payment.
    async fn check_status(&self, reference_id: &str) -> Result<StatusResponse, BackendError>;
}
