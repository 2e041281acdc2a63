//! # payflow
//!
//! > **Client-side orchestration of escrowed UPI payments.**
//!
//! A UPI payment in this app happens in three legs: the backend opens an
//! escrow collection, the user pays it from a third-party UPI app, and the
//! backend pays the money out to the recipient. Only the backend can see
//! when each leg finishes, so the client has to poll. This crate provides
//! that poller as a small state machine the UI can drive and observe.
//!
//! ## Design
//!
//! ### One actor per payment surface
//! Each [`PaymentFlowOrchestrator`](flow::PaymentFlowOrchestrator) is a handle to
//! a Tokio task ([`FlowActor`](flow::FlowActor)) that exclusively owns the
//! [`FlowState`](flow::FlowState), the poll timer, and the deadline timer.
//! Requests, backend results, and timer expiries are processed one at a time,
//! so the state needs no locks.
//!
//! ### Sequential polling
//! The next status request is scheduled only after the previous one settles,
//! and never while one is still out. Failed polls are logged and retried;
//! the flow gives up when the wall-clock deadline passes or the attempt
//! budget runs out, whichever comes first.
//!
//! ### Stale results are dropped, not aborted
//! Cancelling, retrying, or starting over bumps an attempt counter. Backend
//! results tagged with an older attempt, or arriving after polling stopped,
//! are ignored. Terminal statuses therefore stay terminal.
//!
//! ### Callbacks
//! Progress is reported through a [`FlowObserver`](flow::FlowObserver).
//! `on_state_change` sees every mutation; `on_success`, `on_failure`, and
//! `on_timeout` fire at most once per attempt. A timeout and a remote failure
//! both end in `failed`, so observers tell them apart by which callback fired.
//!
//! ## Module Tour
//!
//! - [`flow`] - the orchestrator: state, actor, handle, observer
//! - [`backend`] - the [`PaymentBackend`](backend::PaymentBackend) seam, the HTTP
//!   implementation, and [`MockBackend`](backend::mock::MockBackend) for tests
//! - [`config`] - [`FlowConfig`](config::FlowConfig) tunables
//! - [`runtime`] - tracing setup
//!
//! ## Running the Demo
//!
//! ```bash
//! # Scripted backend, no network
//! RUST_LOG=info cargo run
//!
//! # Real backend
//! PAYFLOW_API_BASE_URL=https://api.example.com RUST_LOG=info cargo run -- 100 a@bank
//! ```

pub mod backend;
pub mod config;
pub mod flow;
pub mod runtime;
