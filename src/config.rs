//! Tunables for a payment flow.

use crate::flow::FlowError;
use std::time::Duration;

/// Configuration for [`PaymentFlowOrchestrator`](crate::flow::PaymentFlowOrchestrator).
#[derive(Debug, Clone, PartialEq)]
pub struct FlowConfig {
    /// Root of the payment API, e.g. `https://api.example.com/v1`.
    pub api_base_url: String,
    /// Delay between one status poll settling and the next one starting.
    pub poll_interval: Duration,
    /// Wall-clock budget for status monitoring.
    pub status_timeout: Duration,
    /// Secondary bound on the number of status polls.
    pub max_poll_attempts: u32,
    /// Per-request timeout for the HTTP backend.
    pub request_timeout: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            poll_interval: Duration::from_millis(3_000),
            status_timeout: Duration::from_millis(300_000), // 5 minutes
            max_poll_attempts: 100,
            request_timeout: Duration::from_millis(15_000),
        }
    }
}

impl FlowConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    /// Reads `PAYFLOW_*` variables, keeping defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        let millis = |key: &str, fallback: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(fallback)
        };

        cfg.api_base_url = lookup("PAYFLOW_API_BASE_URL").unwrap_or_default();
        cfg.poll_interval = millis("PAYFLOW_POLL_INTERVAL_MS", cfg.poll_interval);
        cfg.status_timeout = millis("PAYFLOW_STATUS_TIMEOUT_MS", cfg.status_timeout);
        cfg.request_timeout = millis("PAYFLOW_REQUEST_TIMEOUT_MS", cfg.request_timeout);
        cfg.max_poll_attempts = lookup("PAYFLOW_MAX_POLL_ATTEMPTS")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(cfg.max_poll_attempts);

        cfg
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    pub fn with_max_poll_attempts(mut self, attempts: u32) -> Self {
        self.max_poll_attempts = attempts;
        self
    }

    /// Checks the polling tunables. The base URL is checked by the HTTP backend.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.poll_interval.is_zero() {
            return Err(FlowError::Config("poll_interval must be positive".into()));
        }
        if self.status_timeout.is_zero() {
            return Err(FlowError::Config("status_timeout must be positive".into()));
        }
        if self.max_poll_attempts == 0 {
            return Err(FlowError::Config("max_poll_attempts must be positive".into()));
        }
        Ok(())
    }
}
