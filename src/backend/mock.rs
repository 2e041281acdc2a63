//! # Mock Backend
//!
//! A scriptable [`PaymentBackend`] for driving the orchestrator without a
//! network.
//!
//! Replies are queued with a fluent builder and handed out in order. Status
//! polls that find the queue empty fall back to the default status, if one
//! was set, and otherwise fail with [`BackendError::Unavailable`]. The mock
//! also records every call and how many status requests overlapped.
//!
//! # Example
//! ```ignore
//! let mock = MockBackend::new();
//! mock.expect_create().return_ok("ref_1", serde_json::json!({}));
//! mock.expect_status("ref_1").times(3).return_status("initiated");
//! mock.expect_status("ref_1").return_status("completed");
//!
//! // drive an orchestrator built with Arc::new(mock.clone()) ...
//! mock.verify(); // all queued replies were consumed
//! ```

use crate::backend::transport::{BackendError, PaymentBackend};
use crate::backend::types::{CreateEscrowRequest, CreateEscrowResponse, StatusResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

// =============================================================================
// EXPECTATIONS
// =============================================================================

struct Expectation<T> {
    /// Reference id the call must carry; `None` for creates.
    reference_id: Option<String>,
    response: Result<T, BackendError>,
    delay: Option<Duration>,
}

#[derive(Default)]
struct MockState {
    creates: VecDeque<Expectation<CreateEscrowResponse>>,
    statuses: VecDeque<Expectation<StatusResponse>>,
    default_status: Option<StatusResponse>,
    create_requests: Vec<CreateEscrowRequest>,
    status_calls: Vec<String>,
    in_flight: usize,
    max_in_flight: usize,
    mismatches: Vec<String>,
}

/// Scriptable in-memory backend. Clones share the same script and records.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a reply for the next `create_escrow` call.
    pub fn expect_create(&self) -> CreateExpectationBuilder {
        CreateExpectationBuilder {
            state: self.state.clone(),
            delay: None,
        }
    }

    /// Queues a reply for the next `check_status` call for `reference_id`.
    pub fn expect_status(&self, reference_id: impl Into<String>) -> StatusExpectationBuilder {
        StatusExpectationBuilder {
            state: self.state.clone(),
            reference_id: reference_id.into(),
            delay: None,
            times: 1,
        }
    }

    /// Reply used for status polls once the queue is empty.
    pub fn set_default_status(&self, response: StatusResponse) {
        self.lock().default_status = Some(response);
    }

    /// Bodies of every `create_escrow` call, in order.
    pub fn create_requests(&self) -> Vec<CreateEscrowRequest> {
        self.lock().create_requests.clone()
    }

    /// Reference ids of every `check_status` call, in order.
    pub fn status_calls(&self) -> Vec<String> {
        self.lock().status_calls.clone()
    }

    pub fn status_call_count(&self) -> usize {
        self.lock().status_calls.len()
    }

    /// Highest number of status requests that were in flight at once.
    pub fn max_concurrent_status_calls(&self) -> usize {
        self.lock().max_in_flight
    }

    /// Panics if queued replies remain or a call did not match its expectation.
    pub fn verify(&self) {
        let state = self.lock();
        if !state.mismatches.is_empty() {
            panic!("Mock backend saw unexpected calls: {:?}", state.mismatches);
        }
        let remaining = state.creates.len() + state.statuses.len();
        if remaining > 0 {
            panic!("Not all expectations were met. {} remaining", remaining);
        }
    }
}

/// Builder for `create_escrow` replies.
pub struct CreateExpectationBuilder {
    state: Arc<Mutex<MockState>>,
    delay: Option<Duration>,
}

impl CreateExpectationBuilder {
    /// Delays the reply by `delay` (virtual time in paused tests).
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn return_ok(self, reference_id: impl Into<String>, collection_links: serde_json::Value) {
        self.push(Ok(CreateEscrowResponse {
            reference_id: reference_id.into(),
            collection_links,
        }));
    }

    pub fn return_err(self, error: BackendError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<CreateEscrowResponse, BackendError>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.creates.push_back(Expectation {
            reference_id: None,
            response,
            delay: self.delay,
        });
    }
}

/// Builder for `check_status` replies.
pub struct StatusExpectationBuilder {
    state: Arc<Mutex<MockState>>,
    reference_id: String,
    delay: Option<Duration>,
    times: usize,
}

impl StatusExpectationBuilder {
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues the same reply `times` times.
    pub fn times(mut self, times: usize) -> Self {
        self.times = times;
        self
    }

    /// Replies with a bare status token.
    pub fn return_status(self, status: &str) {
        self.return_response(StatusResponse::new(status));
    }

    pub fn return_response(self, response: StatusResponse) {
        self.push(Ok(response));
    }

    pub fn return_err(self, error: BackendError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<StatusResponse, BackendError>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for _ in 0..self.times {
            state.statuses.push_back(Expectation {
                reference_id: Some(self.reference_id.clone()),
                response: response.clone(),
                delay: self.delay,
            });
        }
    }
}

// =============================================================================
// BACKEND IMPL
// =============================================================================

#[async_trait]
impl PaymentBackend for MockBackend {
    async fn create_escrow(
        &self,
        request: CreateEscrowRequest,
    ) -> Result<CreateEscrowResponse, BackendError> {
        let next = {
            let mut state = self.lock();
            state.create_requests.push(request);
            state.creates.pop_front()
        };
        let Some(expectation) = next else {
            self.lock().mismatches.push("create_escrow".to_string());
            return Err(BackendError::Unavailable("no create expectation".into()));
        };
        debug!(delay = ?expectation.delay, "Mock create_escrow");
        if let Some(delay) = expectation.delay {
            tokio::time::sleep(delay).await;
        }
        expectation.response
    }

    async fn check_status(&self, reference_id: &str) -> Result<StatusResponse, BackendError> {
        let next = {
            let mut state = self.lock();
            state.status_calls.push(reference_id.to_string());
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            match state.statuses.pop_front() {
                Some(expectation) => {
                    if expectation.reference_id.as_deref() != Some(reference_id) {
                        state
                            .mismatches
                            .push(format!("check_status({}) expected {:?}", reference_id, expectation.reference_id));
                    }
                    Some((expectation.response, expectation.delay))
                }
                None => state.default_status.clone().map(|r| (Ok(r), None)),
            }
        };

        let result = match next {
            Some((response, delay)) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                response
            }
            None => Err(BackendError::Unavailable("no status expectation".into())),
        };

        self.lock().in_flight -= 1;
        result
    }
}
