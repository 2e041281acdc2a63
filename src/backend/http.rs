use crate::backend::transport::{BackendError, PaymentBackend};
use crate::backend::types::{CreateEscrowRequest, CreateEscrowResponse, StatusResponse};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// [`PaymentBackend`] over HTTP/JSON.
#[derive(Clone, Debug)]
pub struct HttpPaymentBackend {
    client: Client,
    base_url: Url,
}

impl HttpPaymentBackend {
    /// Builds a backend rooted at `base_url`, e.g. `https://api.example.com/v1`.
    ///
    /// `request_timeout` bounds each individual request.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, BackendError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BackendError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    /// Appends path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Backend rejected request");
            return Err(BackendError::Http {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PaymentBackend for HttpPaymentBackend {
    #[instrument(skip(self, request))]
    async fn create_escrow(
        &self,
        request: CreateEscrowRequest,
    ) -> Result<CreateEscrowResponse, BackendError> {
        let url = self.endpoint(&["pay-intents", "escrow"])?;
        debug!(%url, ?request, "Sending request");
        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;
        Self::decode(response).await
    }

    #[instrument(skip(self))]
    async fn check_status(&self, reference_id: &str) -> Result<StatusResponse, BackendError> {
        let url = self.endpoint(&["pay-intents", reference_id, "status"])?;
        debug!(%url, "Sending request");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;
        Self::decode(response).await
    }
}
