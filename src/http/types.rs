//! HTTP types: response classes, fetch outcomes and client configuration

use super::throttle::ThrottleConfig;
use crate::config::TapConfig;
use crate::types::{JsonValue, StringMap};
use std::time::Duration;

// ============================================================================
// Response Classification
// ============================================================================

/// How a response status is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// 2xx: parse the body
    Success,
    /// 5xx: retry the same request
    Retriable,
    /// Any other status: abort this partition
    Fatal,
    /// 404: the sub-resource does not exist for this context
    EmptyNotFound,
}

/// Classify an HTTP status code
pub fn classify(status: u16) -> ResponseClass {
    match status {
        200..=299 => ResponseClass::Success,
        404 => ResponseClass::EmptyNotFound,
        500..=599 => ResponseClass::Retriable,
        _ => ResponseClass::Fatal,
    }
}

// ============================================================================
// Fetch Outcome
// ============================================================================

/// Successful outcome of one logical request
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    /// Parsed JSON body of a 2xx response
    Body(JsonValue),
    /// The server answered 404
    NotFound,
}

// ============================================================================
// Client Configuration
// ============================================================================

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// Total attempts per request, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Ceiling for the retry delay
    pub max_backoff: Duration,
    /// Optional request throttle
    pub throttle: Option<ThrottleConfig>,
    /// Headers sent with every request
    pub default_headers: StringMap,
    /// User-Agent header
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            throttle: None,
            default_headers: StringMap::new(),
            user_agent: None,
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }

    /// Derive client settings from the tap configuration
    pub fn from_tap_config(config: &TapConfig) -> Self {
        let mut builder = Self::builder()
            .timeout(config.request_timeout())
            .max_attempts(config.max_attempts)
            .backoff(
                Duration::from_millis(config.backoff_initial_ms),
                Duration::from_millis(config.backoff_max_ms),
            )
            .header("Accept", "application/json");

        if let Some(rps) = config.requests_per_second {
            builder = builder.throttle(ThrottleConfig::per_second(rps));
        }
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        builder.build()
    }
}

/// Builder for [`HttpClientConfig`]
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the total attempt ceiling
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts.max(1);
        self
    }

    /// Set backoff bounds
    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Throttle outgoing requests
    pub fn throttle(mut self, config: ThrottleConfig) -> Self {
        self.config.throttle = Some(config);
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set the User-Agent header
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(agent.into());
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}
