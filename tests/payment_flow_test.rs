use payflow::backend::mock::MockBackend;
use payflow::backend::{BackendError, PaymentParams, StatusResponse};
use payflow::config::FlowConfig;
use payflow::flow::{
    ChannelObserver, FlowEvent, FlowObserver, FlowStatus, PaymentFlowOrchestrator, TIMEOUT_MESSAGE,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

/// Collects events up to and including the first terminal one.
async fn until_terminal(events: &mut UnboundedReceiver<FlowEvent>) -> Vec<FlowEvent> {
    let mut seen = Vec::new();
    while let Some(event) = events.recv().await {
        let terminal = event.is_terminal();
        seen.push(event);
        if terminal {
            break;
        }
    }
    seen
}

fn drain(events: &mut UnboundedReceiver<FlowEvent>) -> Vec<FlowEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

fn statuses(events: &[FlowEvent]) -> Vec<FlowStatus> {
    events
        .iter()
        .filter_map(|e| match e {
            FlowEvent::StateChanged(state) => Some(state.status),
            _ => None,
        })
        .collect()
}

fn created(mock: &MockBackend, reference_id: &str) {
    mock.expect_create()
        .return_ok(reference_id, json!({ "AppX": format!("upi://pay?tr={}", reference_id) }));
}

/// Three `initiated` polls, then `completed`: one success, then silence.
#[tokio::test(start_paused = true)]
async fn test_happy_path_succeeds_once() {
    // Setup
    let mock = MockBackend::new();
    created(&mock, "ref_1");
    mock.expect_status("ref_1").times(3).return_status("initiated");
    mock.expect_status("ref_1").return_status("completed");

    let (observer, mut events) = ChannelObserver::new();
    let flow = PaymentFlowOrchestrator::with_backend(FlowConfig::default(), mock.clone(), observer)
        .unwrap();

    flow.start_payment(PaymentParams::new(100.0, "a@bank")).await.unwrap();
    let state = flow.get_state();
    assert_eq!(state.status, FlowStatus::SelectingApp);
    assert_eq!(state.reference_id.as_deref(), Some("ref_1"));
    assert_eq!(state.collection_links.unwrap()["AppX"], "upi://pay?tr=ref_1");

    // Execute
    flow.select_app("AppX").await.unwrap();
    let seen = until_terminal(&mut events).await;

    // Verify
    assert_eq!(
        seen.last().unwrap(),
        &FlowEvent::Succeeded { reference_id: "ref_1".into() }
    );
    assert_eq!(
        statuses(&seen),
        vec![
            FlowStatus::Validating,
            FlowStatus::CreatingCollection,
            FlowStatus::SelectingApp,
            FlowStatus::WaitingInApp,
            FlowStatus::Completed,
        ]
    );

    // Nothing polls after the terminal status.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(mock.status_call_count(), 4);
    assert!(drain(&mut events).is_empty());
    assert_eq!(flow.get_state().status, FlowStatus::Completed);

    let request = &mock.create_requests()[0];
    assert_eq!(request.amount, 100.0);
    assert_eq!(request.recipient_vpa, "a@bank");
    mock.verify();
}

#[tokio::test(start_paused = true)]
async fn test_collection_paid_moves_to_payout_then_completes() {
    let mock = MockBackend::new();
    created(&mock, "ref_1");
    mock.expect_status("ref_1").return_status("initiated");
    mock.expect_status("ref_1")
        .return_response(StatusResponse::new("collection_paid").with_message("Money received"));
    mock.expect_status("ref_1").return_status("processing_payout");
    mock.expect_status("ref_1").return_status("payout_completed");

    let (observer, mut events) = ChannelObserver::new();
    let flow = PaymentFlowOrchestrator::with_backend(FlowConfig::default(), mock.clone(), observer)
        .unwrap();
    flow.start_payment(PaymentParams::new(42.0, "shop@upi")).await.unwrap();
    flow.select_app("AppX").await.unwrap();

    let seen = until_terminal(&mut events).await;
    let payout = seen
        .iter()
        .find_map(|e| match e {
            FlowEvent::StateChanged(s) if s.status == FlowStatus::ProcessingPayout => Some(s.clone()),
            _ => None,
        })
        .expect("processing_payout was published");
    assert_eq!(payout.message, "Money received");
    assert!(matches!(seen.last(), Some(FlowEvent::Succeeded { .. })));
    mock.verify();
}

#[tokio::test(start_paused = true)]
async fn test_creation_failure_is_retryable_and_reported() {
    let mock = MockBackend::new();
    mock.expect_create().return_err(BackendError::Http {
        status: 503,
        body: "maintenance".into(),
    });

    let (observer, mut events) = ChannelObserver::new();
    let flow = PaymentFlowOrchestrator::with_backend(FlowConfig::default(), mock.clone(), observer)
        .unwrap();

    // Creation errors become state, never a returned error.
    flow.start_payment(PaymentParams::new(100.0, "a@bank")).await.unwrap();

    let state = flow.get_state();
    assert_eq!(state.status, FlowStatus::Failed);
    assert!(state.can_retry);
    assert_eq!(state.reference_id, None);
    assert!(state.error.as_deref().unwrap().contains("503"));

    let seen = until_terminal(&mut events).await;
    assert_eq!(
        statuses(&seen),
        vec![FlowStatus::Validating, FlowStatus::CreatingCollection, FlowStatus::Failed]
    );
    match seen.last().unwrap() {
        FlowEvent::Failed { error, can_retry } => {
            assert!(error.contains("maintenance"));
            assert!(*can_retry);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(mock.status_call_count(), 0);
}

/// Starting over from a failed attempt reports the return to idle first.
#[tokio::test(start_paused = true)]
async fn test_restart_after_failure_publishes_reset() {
    // Setup
    let mock = MockBackend::new();
    mock.expect_create().return_err(BackendError::Network("timed out".into()));
    created(&mock, "ref_2");

    let (observer, mut events) = ChannelObserver::new();
    let flow = PaymentFlowOrchestrator::with_backend(FlowConfig::default(), mock.clone(), observer)
        .unwrap();
    flow.start_payment(PaymentParams::new(100.0, "a@bank")).await.unwrap();
    until_terminal(&mut events).await;
    assert_eq!(flow.get_state().status, FlowStatus::Failed);

    // Execute
    flow.start_payment(PaymentParams::new(100.0, "a@bank")).await.unwrap();

    // Verify
    let seen = drain(&mut events);
    assert_eq!(
        statuses(&seen),
        vec![
            FlowStatus::Idle,
            FlowStatus::Validating,
            FlowStatus::CreatingCollection,
            FlowStatus::SelectingApp,
        ]
    );
    match &seen[0] {
        FlowEvent::StateChanged(state) => {
            assert_eq!(state.error, None);
            assert!(!state.can_retry);
        }
        other => panic!("expected state change, got {:?}", other),
    }
    mock.verify();
}

#[tokio::test(start_paused = true)]
async fn test_remote_failure_maps_to_on_failure() {
    let mock = MockBackend::new();
    created(&mock, "ref_1");
    mock.expect_status("ref_1").return_status("initiated");
    mock.expect_status("ref_1")
        .return_response(StatusResponse::new("failed").with_message("Monthly budget exceeded"));

    let (observer, mut events) = ChannelObserver::new();
    let flow = PaymentFlowOrchestrator::with_backend(FlowConfig::default(), mock.clone(), observer)
        .unwrap();
    flow.start_payment(PaymentParams::new(5000.0, "a@bank")).await.unwrap();
    flow.select_app("AppX").await.unwrap();

    let seen = until_terminal(&mut events).await;
    assert_eq!(
        seen.last().unwrap(),
        &FlowEvent::Failed { error: "Monthly budget exceeded".into(), can_retry: true }
    );
    let state = flow.get_state();
    assert_eq!(state.status, FlowStatus::Failed);
    assert_eq!(state.error.as_deref(), Some("Monthly budget exceeded"));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(mock.status_call_count(), 2);
    mock.verify();
}

#[tokio::test(start_paused = true)]
async fn test_remote_failure_prefers_error_field_then_default() {
    let mock = MockBackend::new();
    created(&mock, "ref_1");
    mock.expect_status("ref_1").return_response(
        StatusResponse::new("failed")
            .with_message("Something went wrong")
            .with_error("Recipient bank declined"),
    );
    created(&mock, "ref_2");
    mock.expect_status("ref_2").return_status("failed");

    let (observer, mut events) = ChannelObserver::new();
    let flow = PaymentFlowOrchestrator::with_backend(FlowConfig::default(), mock.clone(), observer)
        .unwrap();

    flow.start_payment(PaymentParams::new(1.0, "a@bank")).await.unwrap();
    flow.select_app("AppX").await.unwrap();
    let seen = until_terminal(&mut events).await;
    assert_eq!(
        seen.last().unwrap(),
        &FlowEvent::Failed { error: "Recipient bank declined".into(), can_retry: true }
    );

    flow.start_payment(PaymentParams::new(1.0, "a@bank")).await.unwrap();
    flow.select_app("AppX").await.unwrap();
    let seen = until_terminal(&mut events).await;
    assert_eq!(
        seen.last().unwrap(),
        &FlowEvent::Failed { error: "Payment failed".into(), can_retry: true }
    );
    mock.verify();
}

#[tokio::test(start_paused = true)]
async fn test_deadline_times_out_within_one_interval() {
    let mock = MockBackend::new();
    created(&mock, "ref_1");
    mock.set_default_status(StatusResponse::new("initiated"));

    let config = FlowConfig::default().with_max_poll_attempts(10_000);
    let (observer, mut events) = ChannelObserver::new();
    let flow = PaymentFlowOrchestrator::with_backend(config.clone(), mock.clone(), observer).unwrap();
    flow.start_payment(PaymentParams::new(100.0, "a@bank")).await.unwrap();

    let started = Instant::now();
    flow.select_app("AppX").await.unwrap();
    let seen = until_terminal(&mut events).await;
    let elapsed = started.elapsed();

    assert_eq!(seen.last().unwrap(), &FlowEvent::TimedOut);
    assert!(!seen.iter().any(|e| matches!(e, FlowEvent::Failed { .. })));
    assert!(elapsed >= config.status_timeout, "fired early: {:?}", elapsed);
    assert!(elapsed <= config.status_timeout + config.poll_interval, "fired late: {:?}", elapsed);

    let state = flow.get_state();
    assert_eq!(state.status, FlowStatus::Failed);
    assert_eq!(state.error.as_deref(), Some(TIMEOUT_MESSAGE));
    assert!(state.can_retry);
}

#[tokio::test(start_paused = true)]
async fn test_max_attempts_time_out_before_deadline() {
    let mock = MockBackend::new();
    created(&mock, "ref_1");
    mock.set_default_status(StatusResponse::new("initiated"));

    let config = FlowConfig::default()
        .with_status_timeout(Duration::from_secs(24 * 60 * 60))
        .with_max_poll_attempts(5);
    let (observer, mut events) = ChannelObserver::new();
    let flow = PaymentFlowOrchestrator::with_backend(config.clone(), mock.clone(), observer).unwrap();
    flow.start_payment(PaymentParams::new(100.0, "a@bank")).await.unwrap();

    let started = Instant::now();
    flow.select_app("AppX").await.unwrap();
    let seen = until_terminal(&mut events).await;

    assert_eq!(seen.last().unwrap(), &FlowEvent::TimedOut);
    assert_eq!(mock.status_call_count(), 5);
    // Four gaps between five polls, far from the wall-clock budget.
    let elapsed = started.elapsed();
    assert!(elapsed >= config.poll_interval * 4 && elapsed < config.poll_interval * 5, "{:?}", elapsed);
    assert_eq!(flow.get_state().error.as_deref(), Some(TIMEOUT_MESSAGE));
}

/// Replies slower than the poll interval must not overlap.
#[tokio::test(start_paused = true)]
async fn test_slow_status_calls_never_overlap() {
    let mock = MockBackend::new();
    created(&mock, "ref_1");
    mock.expect_status("ref_1")
        .times(4)
        .delayed(Duration::from_secs(7))
        .return_status("initiated");
    mock.expect_status("ref_1").return_status("completed");

    let (observer, mut events) = ChannelObserver::new();
    let flow = PaymentFlowOrchestrator::with_backend(FlowConfig::default(), mock.clone(), observer)
        .unwrap();
    flow.start_payment(PaymentParams::new(100.0, "a@bank")).await.unwrap();

    let started = Instant::now();
    flow.select_app("AppX").await.unwrap();
    let seen = until_terminal(&mut events).await;

    assert!(matches!(seen.last(), Some(FlowEvent::Succeeded { .. })));
    assert_eq!(mock.max_concurrent_status_calls(), 1);
    // Each interval starts after the previous reply: 4 * (7s + 3s).
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(40) && elapsed < Duration::from_secs(41), "{:?}", elapsed);
    mock.verify();
}

/// The deadline fires while a request is still out; its late reply is ignored.
#[tokio::test(start_paused = true)]
async fn test_stale_reply_after_timeout_is_ignored() {
    let mock = MockBackend::new();
    created(&mock, "ref_1");
    mock.expect_status("ref_1").return_status("initiated");
    mock.expect_status("ref_1")
        .delayed(Duration::from_secs(600))
        .return_status("completed");

    let (observer, mut events) = ChannelObserver::new();
    let flow = PaymentFlowOrchestrator::with_backend(FlowConfig::default(), mock.clone(), observer)
        .unwrap();
    flow.start_payment(PaymentParams::new(100.0, "a@bank")).await.unwrap();
    flow.select_app("AppX").await.unwrap();

    let seen = until_terminal(&mut events).await;
    assert_eq!(seen.last().unwrap(), &FlowEvent::TimedOut);

    // Let the slow "completed" reply land.
    tokio::time::sleep(Duration::from_secs(700)).await;
    assert!(drain(&mut events).is_empty());
    let state = flow.get_state();
    assert_eq!(state.status, FlowStatus::Failed);
    assert_eq!(state.error.as_deref(), Some(TIMEOUT_MESSAGE));
    mock.verify();
}

#[tokio::test(start_paused = true)]
async fn test_transient_errors_and_unknown_statuses_keep_polling() {
    let mock = MockBackend::new();
    created(&mock, "ref_1");
    mock.expect_status("ref_1").return_err(BackendError::Network("connection reset".into()));
    mock.expect_status("ref_1").return_status("refund_review");
    mock.expect_status("ref_1").return_status("collection_paid");
    // Out-of-order replica read; must not move the flow backwards.
    mock.expect_status("ref_1").return_status("initiated");
    mock.expect_status("ref_1")
        .return_err(BackendError::Http { status: 502, body: String::new() });
    mock.expect_status("ref_1").return_status("payout_completed");

    let (observer, mut events) = ChannelObserver::new();
    let flow = PaymentFlowOrchestrator::with_backend(FlowConfig::default(), mock.clone(), observer)
        .unwrap();
    flow.start_payment(PaymentParams::new(100.0, "a@bank")).await.unwrap();
    flow.select_app("AppX").await.unwrap();

    let seen = until_terminal(&mut events).await;
    assert!(matches!(seen.last(), Some(FlowEvent::Succeeded { .. })));
    assert_eq!(
        statuses(&seen),
        vec![
            FlowStatus::Validating,
            FlowStatus::CreatingCollection,
            FlowStatus::SelectingApp,
            FlowStatus::WaitingInApp,
            FlowStatus::ProcessingPayout,
            FlowStatus::Completed,
        ]
    );
    assert_eq!(mock.status_call_count(), 6);
    mock.verify();
}

#[tokio::test(start_paused = true)]
async fn test_retry_starts_fresh_attempt() {
    let mock = MockBackend::new();
    created(&mock, "ref_1");
    mock.expect_status("ref_1").return_status("failed");

    let (observer, mut events) = ChannelObserver::new();
    let flow = PaymentFlowOrchestrator::with_backend(FlowConfig::default(), mock.clone(), observer)
        .unwrap();
    flow.start_payment(PaymentParams::new(100.0, "a@bank")).await.unwrap();
    flow.select_app("AppX").await.unwrap();
    let seen = until_terminal(&mut events).await;
    assert!(matches!(seen.last(), Some(FlowEvent::Failed { can_retry: true, .. })));

    flow.retry().await.unwrap();
    let state = flow.get_state();
    assert_eq!(state.status, FlowStatus::Idle);
    assert_eq!(state.reference_id, None);
    assert_eq!(state.error, None);

    created(&mock, "ref_2");
    flow.start_payment(PaymentParams::new(100.0, "a@bank")).await.unwrap();
    assert_eq!(flow.get_state().reference_id.as_deref(), Some("ref_2"));

    // No timer from the first attempt comes back.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(mock.status_calls(), vec!["ref_1".to_string()]);

    mock.expect_status("ref_2").return_status("completed");
    flow.select_app("AppX").await.unwrap();
    let seen = until_terminal(&mut events).await;
    assert_eq!(
        seen.last().unwrap(),
        &FlowEvent::Succeeded { reference_id: "ref_2".into() }
    );
    assert_eq!(mock.status_calls(), vec!["ref_1".to_string(), "ref_2".to_string()]);
    mock.verify();
}

#[tokio::test(start_paused = true)]
async fn test_retry_is_noop_when_not_retryable() {
    let mock = MockBackend::new();
    created(&mock, "ref_1");

    let flow = PaymentFlowOrchestrator::with_backend(FlowConfig::default(), mock.clone(), ())
        .unwrap();
    flow.start_payment(PaymentParams::new(100.0, "a@bank")).await.unwrap();

    flow.retry().await.unwrap();
    let state = flow.get_state();
    assert_eq!(state.status, FlowStatus::SelectingApp);
    assert_eq!(state.reference_id.as_deref(), Some("ref_1"));
}

#[derive(Clone, Default)]
struct OutcomeCounter {
    successes: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
    timeouts: Arc<AtomicUsize>,
}

impl FlowObserver for OutcomeCounter {
    fn on_success(&self, _reference_id: &str) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_failure(&self, _error: &str, _can_retry: bool) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn on_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::SeqCst);
    }
}

/// Terminal callbacks fire once even if the backend keeps answering.
#[tokio::test(start_paused = true)]
async fn test_terminal_callbacks_fire_once() {
    let mock = MockBackend::new();
    created(&mock, "ref_1");
    mock.expect_status("ref_1").return_status("completed");
    mock.set_default_status(StatusResponse::new("failed"));

    let counter = OutcomeCounter::default();
    let flow = PaymentFlowOrchestrator::with_backend(FlowConfig::default(), mock.clone(), counter.clone())
        .unwrap();
    flow.start_payment(PaymentParams::new(100.0, "a@bank")).await.unwrap();
    flow.select_app("AppX").await.unwrap();

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(counter.successes.load(Ordering::SeqCst), 1);
    assert_eq!(counter.failures.load(Ordering::SeqCst), 0);
    assert_eq!(counter.timeouts.load(Ordering::SeqCst), 0);
    assert_eq!(mock.status_call_count(), 1);
    assert_eq!(flow.get_state().status, FlowStatus::Completed);
}
