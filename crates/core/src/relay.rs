//! Outbound HTTP calls from one hop to the next.
//!
//! Every call goes through one `reqwest::Client` built with the configured timeout.
//! Transport failures and 5xx replies are retried per [`RetryPolicy`]; by default
//! there is a single attempt. Callers that must not fail because a downstream hop is
//! down use [`RelayForwarder::forward_best_effort`].

use crate::config::{CoreConfig, RetryPolicy};
use crate::constants::HL7_LOG_TARGET;
use fhir::{Bundle, Resource, FHIR_JSON};
use hl7::Acknowledgment;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::time::Duration;

const TEXT_PLAIN: &str = "text/plain";

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to encode resource: {0}")]
    Encode(#[from] fhir::FhirError),

    #[error("{url} answered {status}")]
    Status { url: String, status: u16 },

    #[error("could not reach {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unreadable reply from {url}: {reason}")]
    InvalidReply { url: String, reason: String },
}

impl RelayError {
    fn is_retryable(&self) -> bool {
        match self {
            RelayError::Transport { .. } => true,
            RelayError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// HTTP client shared by the hops for relaying.
#[derive(Clone, Debug)]
pub struct RelayForwarder {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl RelayForwarder {
    /// # Errors
    ///
    /// Returns [`RelayError::Client`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RelayError::Client)?;
        Ok(Self { client, retry })
    }

    /// # Errors
    ///
    /// Returns [`RelayError::Client`] if the HTTP client cannot be built.
    pub fn from_config(cfg: &CoreConfig) -> Result<Self, RelayError> {
        Self::new(cfg.relay_timeout(), cfg.retry())
    }

    /// POST a resource to `url` and return the downstream status code.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] if the resource cannot be rendered, the hop cannot be
    /// reached, or it answers with a non-2xx status.
    pub async fn forward(&self, resource: &Resource, url: &str) -> Result<u16, RelayError> {
        let body = resource.render()?;
        let response = self
            .send_with_retry(url, || {
                self.client
                    .post(url)
                    .header(CONTENT_TYPE, FHIR_JSON)
                    .body(body.clone())
            })
            .await?;

        let status = response.status().as_u16();
        tracing::info!(
            url,
            status,
            resource_type = resource.resource_type(),
            "resource relayed"
        );
        Ok(status)
    }

    /// Like [`RelayForwarder::forward`], but a failure is logged and swallowed.
    ///
    /// Local state the caller already committed is left as is.
    pub async fn forward_best_effort(&self, resource: &Resource, url: &str) -> Option<u16> {
        match self.forward(resource, url).await {
            Ok(status) => Some(status),
            Err(err) => {
                tracing::error!(
                    url,
                    resource_type = resource.resource_type(),
                    error = %err,
                    "relay failed; downstream may be out of date"
                );
                None
            }
        }
    }

    /// POST a segment message and parse the ACK/NACK reply.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] if the hop cannot be reached, answers non-2xx, or the
    /// reply is not an ACK/NACK.
    pub async fn post_segment(&self, url: &str, message: &str) -> Result<Acknowledgment, RelayError> {
        tracing::info!(target: HL7_LOG_TARGET, url, message = %message.replace('\r', "\n"), "sending segment message");

        let response = self
            .send_with_retry(url, || {
                self.client
                    .post(url)
                    .header(CONTENT_TYPE, TEXT_PLAIN)
                    .body(message.to_string())
            })
            .await?;
        let text = read_text(url, response).await?;

        let ack = Acknowledgment::parse(&text).map_err(|err| RelayError::InvalidReply {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        tracing::info!(target: HL7_LOG_TARGET, url, reply = %ack, "received acknowledgment");
        Ok(ack)
    }

    /// GET a bundle for a full resync.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] if the hop cannot be reached, answers non-2xx, or the
    /// body is not a bundle.
    pub async fn fetch_bundle(&self, url: &str) -> Result<Bundle, RelayError> {
        let response = self
            .send_with_retry(url, || self.client.get(url).header(ACCEPT, FHIR_JSON))
            .await?;
        let text = read_text(url, response).await?;

        Bundle::parse(&text).map_err(|err| RelayError::InvalidReply {
            url: url.to_string(),
            reason: err.to_string(),
        })
    }

    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<reqwest::Response, RelayError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 1;
        let mut backoff = self.retry.initial_backoff;

        loop {
            let err = match build().send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => RelayError::Status {
                    url: url.to_string(),
                    status: response.status().as_u16(),
                },
                Err(source) => RelayError::Transport {
                    url: url.to_string(),
                    source,
                },
            };

            if attempt >= self.retry.max_attempts || !err.is_retryable() {
                return Err(err);
            }

            tracing::warn!(url, attempt, error = %err, "relay attempt failed; retrying");
            tokio::time::sleep(backoff).await;
            backoff = backoff.saturating_mul(2);
            attempt += 1;
        }
    }
}

async fn read_text(url: &str, response: reqwest::Response) -> Result<String, RelayError> {
    response.text().await.map_err(|source| RelayError::Transport {
        url: url.to_string(),
        source,
    })
}
