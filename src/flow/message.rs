//! Messages consumed by the [`FlowActor`](crate::flow::FlowActor).

use crate::backend::{BackendError, CreateEscrowResponse, PaymentParams, StatusResponse};
use crate::flow::FlowError;
use tokio::sync::oneshot;

/// One-shot reply channel used by the handle to wait for the actor.
pub type Response<T> = oneshot::Sender<Result<T, FlowError>>;

/// Requests sent by [`PaymentFlowOrchestrator`](crate::flow::PaymentFlowOrchestrator).
#[derive(Debug)]
pub enum FlowRequest {
    /// Answered once the creation outcome has been applied or the attempt
    /// was superseded.
    StartPayment {
        params: PaymentParams,
        respond_to: Response<()>,
    },
    SelectApp {
        app: String,
        respond_to: Response<()>,
    },
    Cancel {
        respond_to: Response<()>,
    },
    Retry {
        respond_to: Response<()>,
    },
    Dispose {
        respond_to: Response<()>,
    },
}

/// Results of backend calls, reported back by the tasks that made them.
///
/// Every event carries the attempt it belongs to so results from a
/// cancelled or superseded attempt can be dropped.
#[derive(Debug)]
pub(crate) enum BackendEvent {
    Created {
        attempt: u64,
        result: Result<CreateEscrowResponse, BackendError>,
    },
    Polled {
        attempt: u64,
        result: Result<StatusResponse, BackendError>,
    },
}
