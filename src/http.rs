//! Outbound HTTP client shared by the snapshot fetch and the build trigger.

use std::time::Duration;

/// Settings for the outbound `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Bound on a single request, connect included.
    pub request_timeout: Duration,
    /// Skip TLS certificate verification.
    pub insecure: bool,
}

impl HttpClientConfig {
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new() -> Self {
        HttpClientConfig {
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            insecure: false,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn build(&self) -> reqwest::Result<reqwest::Client> {
        if self.insecure {
            tracing::warn!("TLS certificate verification disabled for outbound requests");
        }
        reqwest::Client::builder()
            .user_agent(concat!("push-relay/", env!("CARGO_PKG_VERSION")))
            .timeout(self.request_timeout)
            .danger_accept_invalid_certs(self.insecure)
            .build()
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::new()
    }
}
