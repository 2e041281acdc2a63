//! Demo: runs one payment flow end to end.
//!
//! With `PAYFLOW_API_BASE_URL` set, the flow talks to that backend and takes
//! the amount and recipient from the command line (`payflow <amount> <vpa>`).
//! Without it, a scripted [`MockBackend`] plays the backend and the polling
//! interval is shortened so the demo finishes in a few seconds.

use payflow::backend::mock::MockBackend;
use payflow::backend::{PaymentParams, StatusResponse};
use payflow::config::FlowConfig;
use payflow::flow::{ChannelObserver, FlowEvent, PaymentFlowOrchestrator};
use payflow::runtime::setup_tracing;
use std::time::Duration;
use tracing::{error, info, warn, Instrument};

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let config = FlowConfig::from_env();
    let (observer, mut events) = ChannelObserver::new();

    let mut args = std::env::args().skip(1);
    let amount = args
        .next()
        .map(|a| a.parse::<f64>().map_err(|e| format!("invalid amount {:?}: {}", a, e)))
        .transpose()?
        .unwrap_or(100.0);
    let recipient = args.next().unwrap_or_else(|| "a@bank".to_string());

    let flow = if config.api_base_url.is_empty() {
        info!("PAYFLOW_API_BASE_URL not set, using scripted backend");
        let backend = scripted_backend();
        let config = config.with_poll_interval(Duration::from_millis(300));
        PaymentFlowOrchestrator::with_backend(config, backend, observer)
    } else {
        info!(base_url = %config.api_base_url, "Using HTTP backend");
        PaymentFlowOrchestrator::spawn(config, observer)
    }
    .map_err(|e| e.to_string())?;

    let span = tracing::info_span!("payment", %recipient);
    async {
        flow.start_payment(PaymentParams::new(amount, recipient.clone()).note("demo"))
            .await
            .map_err(|e| e.to_string())?;

        let state = flow.get_state();
        if state.reference_id.is_none() {
            error!(error = ?state.error, "Payment could not be created");
            return Ok(());
        }
        info!(links = ?state.collection_links, "Collection created, choosing app");
        flow.select_app("AppX").await.map_err(|e| e.to_string())?;

        while let Some(event) = events.recv().await {
            match event {
                FlowEvent::StateChanged(state) => {
                    info!(status = %state.status, message = %state.message, "State")
                }
                FlowEvent::Succeeded { reference_id } => {
                    info!(%reference_id, "Payment succeeded");
                    break;
                }
                FlowEvent::Failed { error, can_retry } => {
                    error!(%error, can_retry, "Payment failed");
                    break;
                }
                FlowEvent::TimedOut => {
                    warn!("Payment timed out; it may still settle, check with the backend");
                    break;
                }
            }
        }
        Ok::<(), String>(())
    }
    .instrument(span)
    .await?;

    flow.shutdown().await;
    info!("Demo finished");
    Ok(())
}

fn scripted_backend() -> MockBackend {
    let backend = MockBackend::new();
    backend.expect_create().delayed(Duration::from_millis(200)).return_ok(
        "ref_demo_1",
        serde_json::json!({ "AppX": "upi://pay?pa=escrow@bank&tr=ref_demo_1" }),
    );
    backend.expect_status("ref_demo_1").times(3).return_status("initiated");
    backend
        .expect_status("ref_demo_1")
        .return_response(StatusResponse::new("collection_paid").with_message("Money received"));
    backend.expect_status("ref_demo_1").return_status("payout_completed");
    backend
}
