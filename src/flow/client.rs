use crate::backend::{HttpPaymentBackend, PaymentBackend, PaymentParams};
use crate::config::FlowConfig;
use crate::flow::actor::FlowActor;
use crate::flow::message::{FlowRequest, Response};
use crate::flow::observer::FlowObserver;
use crate::flow::state::FlowState;
use crate::flow::FlowError;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, instrument};

/// Caller-facing handle to a running payment flow.
///
/// Construct one per payment surface with [`spawn`](Self::spawn) or
/// [`with_backend`](Self::with_backend), then drive it with
/// [`start_payment`](Self::start_payment) and [`select_app`](Self::select_app).
/// Progress arrives through the [`FlowObserver`] given at construction.
///
/// The handle is cheap to clone. The flow stops when [`dispose`](Self::dispose)
/// is called or when the last clone is dropped.
///
/// # Architecture Note
/// Commands travel to the actor over a bounded channel and wait on a oneshot
/// reply, so each call returns after the actor has applied it. Reads do not
/// go through the actor at all: the actor publishes every state into a
/// `watch` channel and [`get_state`](Self::get_state) clones the latest value.
///
/// # Example
///
/// ```ignore
/// let flow = PaymentFlowOrchestrator::spawn(FlowConfig::from_env(), observer)?;
/// flow.start_payment(PaymentParams::new(100.0, "a@bank")).await?;
/// flow.select_app("AppX").await?;
/// // ... observer.on_success / on_failure / on_timeout ...
/// flow.dispose().await;
/// ```
#[derive(Clone)]
pub struct PaymentFlowOrchestrator {
    sender: mpsc::Sender<FlowRequest>,
    state: watch::Receiver<FlowState>,
}

impl PaymentFlowOrchestrator {
    // =========================================================================
    // CONSTRUCTION
    // =========================================================================

    pub(crate) fn new(sender: mpsc::Sender<FlowRequest>, state: watch::Receiver<FlowState>) -> Self {
        Self { sender, state }
    }

    /// Starts a flow that talks HTTP to `config.api_base_url`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn spawn(config: FlowConfig, observer: impl FlowObserver) -> Result<Self, FlowError> {
        let backend = HttpPaymentBackend::new(&config.api_base_url, config.request_timeout)
            .map_err(|e| FlowError::Config(e.to_string()))?;
        Self::with_backend(config, backend, observer)
    }

    /// Starts a flow against any [`PaymentBackend`].
    ///
    /// Must be called inside a Tokio runtime.
    pub fn with_backend(
        config: FlowConfig,
        backend: impl PaymentBackend,
        observer: impl FlowObserver,
    ) -> Result<Self, FlowError> {
        config.validate()?;
        let (actor, handle) = FlowActor::new(config, Arc::new(backend), Arc::new(observer), 32);
        tokio::spawn(actor.run());
        Ok(handle)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Response<T>) -> FlowRequest,
    ) -> Result<T, FlowError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(make(respond_to))
            .await
            .map_err(|_| FlowError::Closed)?;
        response.await.map_err(|_| FlowError::Dropped)?
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    /// Begins a new attempt, discarding any previous one.
    ///
    /// Returns once the payment record has been created (state
    /// `selecting_app`) or creation failed (state `failed`, reported through
    /// `on_failure`). Creation errors are never returned here.
    #[instrument(skip(self, params))]
    pub async fn start_payment(&self, params: PaymentParams) -> Result<(), FlowError> {
        debug!(?params, "Sending request");
        self.request(|respond_to| FlowRequest::StartPayment { params, respond_to })
            .await
    }

    /// Records the app the user picked and starts status monitoring.
    ///
    /// Launching the app is up to the caller.
    #[instrument(skip(self))]
    pub async fn select_app(&self, app: &str) -> Result<(), FlowError> {
        let app = app.to_string();
        self.request(|respond_to| FlowRequest::SelectApp { app, respond_to })
            .await
    }

    /// Stops monitoring and returns to `idle` without any terminal callback.
    #[instrument(skip(self))]
    pub async fn cancel(&self) -> Result<(), FlowError> {
        self.request(|respond_to| FlowRequest::Cancel { respond_to }).await
    }

    /// Returns to `idle` if the last failure is retryable; otherwise does nothing.
    #[instrument(skip(self))]
    pub async fn retry(&self) -> Result<(), FlowError> {
        self.request(|respond_to| FlowRequest::Retry { respond_to }).await
    }

    /// Stops monitoring and shuts the flow down. Safe to call any number of times.
    #[instrument(skip(self))]
    pub async fn dispose(&self) {
        if let Err(e) = self.request(|respond_to| FlowRequest::Dispose { respond_to }).await {
            debug!(error = %e, "Already disposed");
        }
    }

    /// Disposes and waits for the flow task to exit.
    pub async fn shutdown(self) {
        self.dispose().await;
        self.sender.closed().await;
    }

    // =========================================================================
    // STATE
    // =========================================================================

    /// Copy of the latest state.
    pub fn get_state(&self) -> FlowState {
        self.state.borrow().clone()
    }

    /// Watch channel that sees every published state.
    pub fn subscribe(&self) -> watch::Receiver<FlowState> {
        self.state.clone()
    }

    /// True once the flow task has exited.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
