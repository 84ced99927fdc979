//! HTTP client module
//!
//! Every API request issued by the paginator goes through [`HttpClient`].
//!
//! # Features
//!
//! - **Classification**: each status maps to a [`ResponseClass`]
//! - **Automatic Retries**: retriable responses and transport failures are
//!   retried with exponential backoff up to `max_attempts`
//! - **Throttling**: optional token bucket rate limiter using governor
//! - **Authentication**: the shared [`Authenticator`](crate::auth::Authenticator)
//!   is applied to every attempt
//! - **Cancellation**: waits and in-flight requests stop on the run's
//!   cancellation token

mod client;
mod throttle;
mod types;

pub use client::HttpClient;
pub use throttle::{Throttle, ThrottleConfig};
pub use types::{classify, Fetched, HttpClientConfig, ResponseClass};

#[cfg(test)]
mod tests;
