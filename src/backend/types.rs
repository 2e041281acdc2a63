//! Wire shapes exchanged with the payment backend.
//!
//! The backend owns these formats; only the fields the orchestrator reads
//! are modelled.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the caller wants to pay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentParams {
    /// Positive amount in the unit the backend expects. Not validated here.
    pub amount: f64,
    /// UPI address (VPA) or other recipient identifier.
    pub recipient_identifier: String,
    pub recipient_name: Option<String>,
    pub category: Option<String>,
    pub note: Option<String>,
}

impl PaymentParams {
    pub fn new(amount: f64, recipient_identifier: impl Into<String>) -> Self {
        Self {
            amount,
            recipient_identifier: recipient_identifier.into(),
            recipient_name: None,
            category: None,
            note: None,
        }
    }

    pub fn recipient_name(mut self, name: impl Into<String>) -> Self {
        self.recipient_name = Some(name.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Body of `POST /pay-intents/escrow`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEscrowRequest {
    pub amount: f64,
    pub recipient_vpa: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl From<PaymentParams> for CreateEscrowRequest {
    fn from(params: PaymentParams) -> Self {
        Self {
            amount: params.amount,
            recipient_vpa: params.recipient_identifier,
            recipient_name: params.recipient_name,
            category: params.category,
            note: params.note,
        }
    }
}

/// Response of `POST /pay-intents/escrow`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEscrowResponse {
    pub reference_id: String,
    #[serde(default)]
    pub collection_links: serde_json::Value,
}

/// Response of `GET /pay-intents/{referenceId}/status`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            message: String::new(),
            error: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn remote_status(&self) -> RemoteStatus {
        RemoteStatus::from(self.status.as_str())
    }
}

/// Status token reported by the backend.
///
/// Unknown tokens are kept verbatim so newer backends don't break older
/// clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Initiated,
    CollectionPaid,
    ProcessingPayout,
    PayoutCompleted,
    Completed,
    Failed,
    Other(String),
}

impl From<&str> for RemoteStatus {
    fn from(token: &str) -> Self {
        match token {
            "initiated" => RemoteStatus::Initiated,
            "collection_paid" => RemoteStatus::CollectionPaid,
            "processing_payout" => RemoteStatus::ProcessingPayout,
            "payout_completed" => RemoteStatus::PayoutCompleted,
            "completed" => RemoteStatus::Completed,
            "failed" => RemoteStatus::Failed,
            other => RemoteStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            RemoteStatus::Initiated => "initiated",
            RemoteStatus::CollectionPaid => "collection_paid",
            RemoteStatus::ProcessingPayout => "processing_payout",
            RemoteStatus::PayoutCompleted => "payout_completed",
            RemoteStatus::Completed => "completed",
            RemoteStatus::Failed => "failed",
            RemoteStatus::Other(token) => token,
        };
        f.write_str(token)
    }
}
