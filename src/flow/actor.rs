//! # Payment Flow Actor
//!
//! The task that owns one payment flow. It holds the [`FlowState`], the poll
//! and deadline timers, and the bookkeeping for the status loop.
//!
//! **Concurrency Model**:
//! Requests from the handle, backend results, and timer expiries are all
//! handled one at a time inside [`FlowActor::run`], so the state needs no
//! locks. Backend calls run in their own short-lived tasks and report back
//! with the attempt number they were issued for. Anything from an older
//! attempt, or arriving after polling stopped, is dropped on arrival rather
//! than aborted.

use crate::backend::{
    BackendError, CreateEscrowRequest, CreateEscrowResponse, PaymentBackend, RemoteStatus,
    StatusResponse,
};
use crate::config::FlowConfig;
use crate::flow::client::PaymentFlowOrchestrator;
use crate::flow::message::{BackendEvent, FlowRequest, Response};
use crate::flow::observer::FlowObserver;
use crate::flow::state::{FlowState, FlowStatus};
use crate::flow::FlowError;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Error text used when monitoring runs out of time or attempts.
pub const TIMEOUT_MESSAGE: &str = "Payment took too long to complete";

const REMOTE_FAILURE_MESSAGE: &str = "Payment failed";

// =============================================================================
// 1. THE ACTOR STATE
// =============================================================================

/// Owns one payment flow.
///
/// # Architecture Note
/// There is exactly one status request on the wire at any time, across
/// attempts. `poll_in_flight` is only cleared when a status reply arrives,
/// whichever attempt it belongs to. A poll that comes due while an older
/// attempt's request is still out is deferred until that reply is dropped.
pub struct FlowActor {
    receiver: mpsc::Receiver<FlowRequest>,
    events_tx: mpsc::UnboundedSender<BackendEvent>,
    events_rx: mpsc::UnboundedReceiver<BackendEvent>,
    backend: Arc<dyn PaymentBackend>,
    observer: Arc<dyn FlowObserver>,
    config: FlowConfig,
    state: FlowState,
    publisher: watch::Sender<FlowState>,

    /// Bumped on every reset; results tagged with an older value are stale.
    attempt: u64,
    /// Replies to the `start_payment` call of the current attempt.
    pending_start: Option<Response<()>>,

    // --- status loop ---
    polling: bool,
    /// A status request is out. Survives resets until its reply arrives.
    poll_in_flight: bool,
    polls_sent: u32,
    next_poll_at: Option<Instant>,
    deadline: Option<Instant>,
}

impl FlowActor {
    pub fn new(
        config: FlowConfig,
        backend: Arc<dyn PaymentBackend>,
        observer: Arc<dyn FlowObserver>,
        buffer_size: usize,
    ) -> (Self, PaymentFlowOrchestrator) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (publisher, state_rx) = watch::channel(FlowState::default());
        let actor = Self {
            receiver,
            events_tx,
            events_rx,
            backend,
            observer,
            config,
            state: FlowState::default(),
            publisher,
            attempt: 0,
            pending_start: None,
            polling: false,
            poll_in_flight: false,
            polls_sent: 0,
            next_poll_at: None,
            deadline: None,
        };
        (actor, PaymentFlowOrchestrator::new(sender, state_rx))
    }

    // =========================================================================
    // 2. THE EVENT LOOP
    // =========================================================================

    /// Runs until disposed or until every handle is dropped.
    pub async fn run(mut self) {
        info!("Payment flow started");

        loop {
            let next_poll_at = self.next_poll_at;
            let deadline = self.deadline;

            tokio::select! {
                biased;

                request = self.receiver.recv() => match request {
                    Some(request) => {
                        if self.handle_request(request).is_break() {
                            break;
                        }
                    }
                    None => break,
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.handle_timeout();
                }
                _ = sleep_until(next_poll_at.unwrap_or_else(Instant::now)), if next_poll_at.is_some() => {
                    self.poll();
                }
            }
        }

        self.stop_polling();
        if let Some(respond_to) = self.pending_start.take() {
            let _ = respond_to.send(Err(FlowError::Closed));
        }
        info!(status = %self.state.status, "Payment flow stopped");
    }

    // =========================================================================
    // 3. REQUEST HANDLERS
    // =========================================================================

    /// Applies one caller request. Breaks only for `Dispose`.
    fn handle_request(&mut self, request: FlowRequest) -> ControlFlow<()> {
        match request {
            FlowRequest::StartPayment { params, respond_to } => {
                debug!(?params, "StartPayment");
                // Starting from idle changes nothing, so there is nothing to report.
                let was_idle = self.state == FlowState::default();
                self.reset_attempt();
                if !was_idle {
                    self.publish();
                }
                self.pending_start = Some(respond_to);

                self.state.advance(FlowStatus::Validating);
                self.publish();
                self.state.advance(FlowStatus::CreatingCollection);
                self.publish();

                let attempt = self.attempt;
                let backend = self.backend.clone();
                let events = self.events_tx.clone();
                let request = CreateEscrowRequest::from(params);
                tokio::spawn(async move {
                    let result = backend.create_escrow(request).await;
                    let _ = events.send(BackendEvent::Created { attempt, result });
                });
                info!(attempt, "Creating payment");
            }
            FlowRequest::SelectApp { app, respond_to } => {
                self.select_app(app);
                let _ = respond_to.send(Ok(()));
            }
            FlowRequest::Cancel { respond_to } => {
                info!(attempt = self.attempt, status = %self.state.status, "Cancelled");
                self.reset_attempt();
                self.publish();
                let _ = respond_to.send(Ok(()));
            }
            FlowRequest::Retry { respond_to } => {
                if self.state.can_retry {
                    info!(attempt = self.attempt, "Retry: back to idle");
                    self.reset_attempt();
                    self.publish();
                } else {
                    debug!(status = %self.state.status, "Retry ignored, not retryable");
                }
                let _ = respond_to.send(Ok(()));
            }
            FlowRequest::Dispose { respond_to } => {
                info!(attempt = self.attempt, "Dispose requested");
                self.stop_polling();
                let _ = respond_to.send(Ok(()));
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    // =========================================================================
    // 4. BACKEND RESULTS
    // =========================================================================

    fn handle_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Created { attempt, result } => {
                if attempt != self.attempt {
                    debug!(attempt, current = self.attempt, "Dropping stale create result");
                    return;
                }
                self.on_created(result);
            }
            BackendEvent::Polled { attempt, result } => {
                self.poll_in_flight = false;
                if attempt != self.attempt || !self.polling {
                    debug!(attempt, current = self.attempt, "Dropping stale status result");
                    // A poll of the current attempt may be waiting on this reply.
                    if self.polling && self.next_poll_at.is_none() {
                        self.poll();
                    }
                    return;
                }
                self.on_polled(result);
            }
        }
    }

    fn on_created(&mut self, result: Result<CreateEscrowResponse, BackendError>) {
        match result {
            Ok(created) => {
                info!(reference_id = %created.reference_id, "Payment created");
                self.state.reference_id = Some(created.reference_id);
                self.state.collection_links = Some(created.collection_links);
                self.state.advance(FlowStatus::SelectingApp);
                self.publish();
            }
            Err(e) => {
                warn!(error = %e, "Payment creation failed");
                let error = format!("Could not create payment: {}", e);
                self.state.fail(error.clone(), true);
                self.publish();
                self.observer.on_failure(&error, true);
            }
        }
        if let Some(respond_to) = self.pending_start.take() {
            let _ = respond_to.send(Ok(()));
        }
    }

    fn select_app(&mut self, app: String) {
        if self.polling {
            warn!(%app, "Status monitoring already running, ignoring app selection");
            return;
        }
        if self.state.reference_id.is_none() || self.state.status.is_terminal() {
            warn!(%app, status = %self.state.status, "No open payment, ignoring app selection");
            return;
        }

        info!(%app, reference_id = ?self.state.reference_id, "App selected");
        self.state
            .advance_with(FlowStatus::WaitingInApp, format!("Complete the payment in {}", app));
        self.publish();

        self.polling = true;
        self.polls_sent = 0;
        self.deadline = Some(Instant::now() + self.config.status_timeout);
        self.poll();
    }

    /// Sends one status request unless one is already out.
    ///
    /// If an older attempt's request is still pending, the poll is deferred
    /// and reissued when that reply arrives.
    fn poll(&mut self) {
        self.next_poll_at = None;
        if !self.polling {
            return;
        }
        if self.poll_in_flight {
            debug!(attempt = self.attempt, "Status request still out, deferring poll");
            return;
        }
        let Some(reference_id) = self.state.reference_id.clone() else {
            return;
        };

        self.poll_in_flight = true;
        self.polls_sent += 1;
        debug!(%reference_id, poll = self.polls_sent, "Polling status");

        let attempt = self.attempt;
        let backend = self.backend.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = backend.check_status(&reference_id).await;
            let _ = events.send(BackendEvent::Polled { attempt, result });
        });
    }

    fn on_polled(&mut self, result: Result<StatusResponse, BackendError>) {
        match result {
            Ok(response) => self.apply_remote_status(response),
            // Connectivity is flaky while the user is inside the UPI app.
            Err(e) => warn!(error = %e, poll = self.polls_sent, "Status check failed, will retry"),
        }

        if !self.polling {
            return;
        }
        if self.polls_sent >= self.config.max_poll_attempts {
            info!(polls = self.polls_sent, "Poll attempts exhausted");
            self.handle_timeout();
            return;
        }
        self.next_poll_at = Some(Instant::now() + self.config.poll_interval);
    }

    fn apply_remote_status(&mut self, response: StatusResponse) {
        let remote = response.remote_status();
        debug!(status = %remote, message = %response.message, "Status received");
        match remote {
            RemoteStatus::Initiated => self.progress(FlowStatus::WaitingInApp, &response.message),
            RemoteStatus::CollectionPaid | RemoteStatus::ProcessingPayout => {
                self.progress(FlowStatus::ProcessingPayout, &response.message)
            }
            RemoteStatus::PayoutCompleted | RemoteStatus::Completed => self.complete(),
            RemoteStatus::Failed => {
                let error = response
                    .error
                    .filter(|e| !e.is_empty())
                    .or_else(|| Some(response.message).filter(|m| !m.is_empty()))
                    .unwrap_or_else(|| REMOTE_FAILURE_MESSAGE.to_string());
                self.fail_remote(error);
            }
            RemoteStatus::Other(token) => {
                info!(status = %token, "Unknown remote status, still polling");
            }
        }
    }

    /// Non-terminal transition. Never moves backwards within an attempt.
    fn progress(&mut self, status: FlowStatus, remote_message: &str) {
        if status.stage() < self.state.status.stage() {
            debug!(from = %self.state.status, to = %status, "Ignoring backwards status");
            return;
        }
        let message = if !remote_message.is_empty() {
            remote_message.to_string()
        } else if status == self.state.status {
            self.state.message.clone()
        } else {
            status.default_message().to_string()
        };
        if status == self.state.status && message == self.state.message {
            return;
        }
        info!(from = %self.state.status, to = %status, "Status changed");
        self.state.advance_with(status, message);
        self.publish();
    }

    fn complete(&mut self) {
        self.stop_polling();
        self.state.advance(FlowStatus::Completed);
        self.publish();
        let reference_id = self.state.reference_id.clone().unwrap_or_default();
        info!(%reference_id, "Payment completed");
        self.observer.on_success(&reference_id);
    }

    fn fail_remote(&mut self, error: String) {
        self.stop_polling();
        warn!(reference_id = ?self.state.reference_id, %error, "Payment failed remotely");
        self.state.fail(error.clone(), true);
        self.publish();
        self.observer.on_failure(&error, true);
    }

    fn handle_timeout(&mut self) {
        if !self.polling {
            return;
        }
        self.stop_polling();
        warn!(
            reference_id = ?self.state.reference_id,
            polls = self.polls_sent,
            "Payment monitoring timed out"
        );
        self.state.fail(TIMEOUT_MESSAGE, true);
        self.publish();
        self.observer.on_timeout();
    }

    // =========================================================================
    // 5. HELPERS
    // =========================================================================

    /// Clears both timers and the loop flag. In-flight requests are left to
    /// finish; their results are dropped in `handle_event`, which is also
    /// where `poll_in_flight` is cleared.
    fn stop_polling(&mut self) {
        self.polling = false;
        self.next_poll_at = None;
        self.deadline = None;
    }

    /// Ends the current attempt and returns to an idle state without notifying.
    fn reset_attempt(&mut self) {
        self.stop_polling();
        self.attempt += 1;
        if let Some(respond_to) = self.pending_start.take() {
            let _ = respond_to.send(Ok(()));
        }
        self.state = FlowState::default();
    }

    fn publish(&self) {
        self.publisher.send_replace(self.state.clone());
        self.observer.on_state_change(&self.state);
    }
}
