//! Process-level setup shared by binaries embedding a payment flow.
//!
//! - [`setup_tracing`] - initializes structured logging

pub mod tracing;

pub use tracing::*;
