//! Client side of the remote payment service.
//!
//! - [`PaymentBackend`] - the trait the orchestrator talks to
//! - [`HttpPaymentBackend`] - JSON over HTTP with `reqwest`
//! - [`mock::MockBackend`] - scripted replies for tests and demos

pub mod http;
pub mod mock;
pub mod transport;
pub mod types;

pub use http::HttpPaymentBackend;
pub use transport::{BackendError, PaymentBackend};
pub use types::*;
