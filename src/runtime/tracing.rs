//! # Observability & Tracing
//!
//! [`setup_tracing`] installs a compact `tracing-subscriber` formatter that is
//! filtered through `RUST_LOG`.
//!
//! ## What Gets Traced
//!
//! - **Flow lifecycle**: start, dispose, and the final status
//! - **Transitions**: every status change with `from`/`to` fields
//! - **Polling**: each status request (`debug`), swallowed failures (`warn`)
//! - **Terminal outcomes**: completion, remote failure, timeout
//!
//! ## Usage
//!
//! ```bash
//! # Transitions and outcomes
//! RUST_LOG=info cargo run
//!
//! # Payloads and every poll
//! RUST_LOG=payflow=debug cargo run
//! ```
//!
//! With `RUST_LOG=info` a successful payment reads like:
//!
//! ```text
//! INFO Payment flow started
//! INFO Creating payment attempt=1
//! INFO Payment created reference_id=ref_demo_1
//! INFO App selected app="AppX" reference_id=Some("ref_demo_1")
//! INFO Status changed from=waiting_in_app to=processing_payout
//! INFO Payment completed reference_id=ref_demo_1
//! ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
