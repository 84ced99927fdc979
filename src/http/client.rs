//! HTTP client with classification, retry and throttling
//!
//! One logical request is at most `max_attempts` physical attempts. Between
//! attempts the client sleeps `initial_backoff * 2^n`, capped at
//! `max_backoff`. Each attempt re-applies authentication so an expired
//! token is refreshed before the retry goes out.

use super::throttle::Throttle;
use super::types::{classify, Fetched, HttpClientConfig, ResponseClass};
use crate::auth::Authenticator;
use crate::error::{Error, Result};
use reqwest::{Client, RequestBuilder};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// HTTP client shared by every stream of a run
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    authenticator: Option<Arc<Authenticator>>,
    throttle: Option<Throttle>,
    cancel: CancellationToken,
}

impl HttpClient {
    /// Create a client from configuration
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let mut builder = Client::builder().timeout(config.timeout);
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.as_str());
        }
        let client = builder.build()?;
        let throttle = config.throttle.map(Throttle::new);

        Ok(Self {
            client,
            config,
            authenticator: None,
            throttle,
            cancel: CancellationToken::new(),
        })
    }

    /// Authenticate every request with a shared authenticator
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Stop waiting and in-flight requests when `cancel` fires
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Cancellation token observed by this client
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// GET `url` with `query`, retrying per the client configuration
    pub async fn fetch(&self, url: &str, query: &[(String, String)]) -> Result<Fetched> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if let Some(throttle) = &self.throttle {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return Err(Error::Cancelled),
                    () = throttle.wait() => {}
                }
            }

            let req = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(Error::Cancelled),
                req = self.build_request(url, query) => req?,
            };
            attempt += 1;

            let sent = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(Error::Cancelled),
                sent = req.send() => sent,
            };

            let failure = match sent {
                Ok(response) => {
                    let status = response.status().as_u16();
                    match classify(status) {
                        ResponseClass::Success => {
                            let body = tokio::select! {
                                biased;
                                () = self.cancel.cancelled() => return Err(Error::Cancelled),
                                body = response.bytes() => body,
                            };
                            match body {
                                Ok(bytes) => {
                                    debug!(url, status, attempt, "Request succeeded");
                                    return parse_json(url, &bytes).map(Fetched::Body);
                                }
                                Err(e) => self.transport_failure(e)?,
                            }
                        }
                        ResponseClass::EmptyNotFound => {
                            debug!(url, "Resource not found, treating as empty");
                            return Ok(Fetched::NotFound);
                        }
                        ResponseClass::Fatal => {
                            let body = response.text().await.unwrap_or_default();
                            return Err(Error::http_status(status, url, body));
                        }
                        ResponseClass::Retriable => {
                            let body = response.text().await.unwrap_or_default();
                            Error::http_status(status, url, body)
                        }
                    }
                }
                Err(e) => self.transport_failure(e)?,
            };

            if attempt >= max_attempts {
                warn!(url, attempts = attempt, error = %failure, "Retries exhausted");
                return Err(Error::RetriesExhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    last_error: failure.to_string(),
                });
            }

            let delay = self.calculate_backoff(attempt - 1);
            warn!(
                url,
                attempt,
                max_attempts,
                error = %failure,
                "Request failed, retrying in {:?}",
                delay
            );
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(Error::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Build one attempt: default headers, query and auth
    async fn build_request(&self, url: &str, query: &[(String, String)]) -> Result<RequestBuilder> {
        let url = reqwest::Url::parse(url)?;
        let mut req = self.client.get(url);

        for (key, value) in &self.config.default_headers {
            req = req.header(key.as_str(), value.as_str());
        }
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(auth) = &self.authenticator {
            req = auth.apply(req).await?;
        }
        Ok(req)
    }

    /// Map a transport error to a retriable failure, or fail outright
    ///
    /// Timeouts, connect errors and bodies cut short are retried.
    fn transport_failure(&self, e: reqwest::Error) -> Result<Error> {
        if e.is_timeout() {
            Ok(Error::Timeout {
                timeout_ms: u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX),
            })
        } else if e.is_connect() || e.is_body() {
            Ok(Error::Http(e))
        } else {
            Err(Error::Http(e))
        }
    }

    /// Backoff delay after the given zero-based failed attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let delay = self.config.initial_backoff.saturating_mul(factor);
        delay.min(self.config.max_backoff)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_authenticator", &self.authenticator.is_some())
            .field("has_throttle", &self.throttle.is_some())
            .finish_non_exhaustive()
    }
}

/// Parse a 2xx body as JSON
fn parse_json(url: &str, bytes: &[u8]) -> Result<serde_json::Value> {
    serde_json::from_slice(bytes).map_err(|e| Error::malformed(url, format!("invalid JSON: {e}")))
}
