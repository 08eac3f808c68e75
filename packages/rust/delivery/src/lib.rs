//! Webhook delivery client.
//!
//! [`WebhookClient`] posts one JSON payload per classified lead and reports
//! the raw HTTP status. Deciding what counts as an acknowledgment is left to
//! the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use leadflow_shared::{DeliveryPayload, LeadSink, LeadflowError, Result, WebhookConfig};

/// User-Agent string for webhook requests.
const USER_AGENT: &str = concat!("leadflow/", env!("CARGO_PKG_VERSION"));

/// Long-lived handle to the downstream webhook, shared by all deliveries.
pub struct WebhookClient {
    client: Client,
    url: Url,
}

impl WebhookClient {
    /// Create a client posting to `url` with the given request timeout.
    pub fn new(url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| LeadflowError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, url })
    }

    /// Create a client from the `[webhook]` config section and an already validated URL.
    pub fn from_config(url: Url, config: &WebhookConfig) -> Result<Self> {
        Self::new(url, Duration::from_secs(config.timeout_secs))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl LeadSink for WebhookClient {
    #[instrument(skip_all, fields(email = %payload.email))]
    async fn deliver(&self, payload: &DeliveryPayload) -> Result<u16> {
        let response = self
            .client
            .post(self.url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| LeadflowError::Delivery(format!("{}: {e}", self.url)))?;

        let status = response.status().as_u16();
        debug!(status, "webhook responded");
        Ok(status)
    }
}
