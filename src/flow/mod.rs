//! The payment flow orchestrator.
//!
//! One flow drives one payment attempt at a time: it creates the payment
//! record, waits for the user to pick a UPI app, then polls the backend until
//! the payout completes, fails, or runs out of time.
//!
//! # Main Components
//!
//! - [`PaymentFlowOrchestrator`] - the handle callers hold
//! - [`FlowActor`] - the task that owns the state machine and its timers
//! - [`FlowObserver`] - callbacks for state changes and terminal outcomes
//! - [`FlowState`] / [`FlowStatus`] - what observers and callers see
//!
//! # State Machine
//!
//! ```text
//! idle -> validating -> creating_collection -> selecting_app -> waiting_in_app
//!                                  \-> failed                        |
//! waiting_in_app -> processing_payout -> completed                   |
//!        any polling status -> failed (remote failure or timeout) <--+
//! failed --retry--> idle        any --cancel--> idle
//! ```

pub mod actor;
pub mod client;
pub mod error;
pub mod message;
pub mod observer;
pub mod state;

pub use actor::{FlowActor, TIMEOUT_MESSAGE};
pub use client::PaymentFlowOrchestrator;
pub use error::FlowError;
pub use observer::{ChannelObserver, FlowEvent, FlowObserver};
pub use state::{FlowState, FlowStatus};
