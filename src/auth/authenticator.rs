//! Authenticator implementation
//!
//! Applies the resolved strategy to requests and manages the OAuth token.

use super::types::{AuthStrategy, CachedToken, OAuthConfig, OAuthGrant};
use crate::error::{Error, Result};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Bound on a token request when none is configured
const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

/// Applies one auth strategy to every outbound API request
///
/// A single instance is built per run and shared (behind `Arc`) by every
/// stream, so the OAuth token is fetched once and refreshed only when it
/// stops being valid. Refresh happens under the write lock, which makes it
/// mutually exclusive across concurrent callers.
pub struct Authenticator {
    /// Resolved strategy
    strategy: AuthStrategy,
    /// Cached OAuth token
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    /// HTTP client for token requests
    http_client: Client,
    /// Bound on one token request, body included
    timeout: Duration,
}

impl Authenticator {
    /// Create a new authenticator for the given strategy
    pub fn new(strategy: AuthStrategy) -> Self {
        Self::with_client(strategy, Client::new())
    }

    /// Create an authenticator with a custom HTTP client
    pub fn with_client(strategy: AuthStrategy, http_client: Client) -> Self {
        Self {
            strategy,
            cached_token: Arc::new(RwLock::new(None)),
            http_client,
            timeout: DEFAULT_TOKEN_TIMEOUT,
        }
    }

    /// Bound token requests by `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Apply authentication to a request builder
    ///
    /// Only headers and transport credentials are touched, never the body.
    pub async fn apply(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        match &self.strategy {
            AuthStrategy::None => Ok(req),

            AuthStrategy::OAuth(_) => {
                let token = self.get_token().await?;
                Ok(req.bearer_auth(token.token))
            }

            AuthStrategy::Ntlm {
                username,
                password,
                domain,
            } => {
                let user = match domain {
                    Some(domain) => format!("{domain}\\{username}"),
                    None => username.clone(),
                };
                Ok(req.basic_auth(user, Some(password)))
            }

            AuthStrategy::Basic { username, password } => {
                Ok(req.basic_auth(username, Some(password)))
            }
        }
    }

    /// Return a valid token, fetching a new one first if needed
    pub async fn get_token(&self) -> Result<CachedToken> {
        let AuthStrategy::OAuth(oauth) = &self.strategy else {
            return Err(Error::auth(format!(
                "Token requested for '{}' auth",
                self.strategy.kind()
            )));
        };

        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_valid()) {
                return Ok(token.clone());
            }
        }

        let mut cached = self.cached_token.write().await;

        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref().filter(|t| t.is_valid()) {
            return Ok(token.clone());
        }

        let token = tokio::time::timeout(self.timeout, self.fetch_token(oauth))
            .await
            .map_err(|_| {
                Error::auth(format!(
                    "Token request timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })??;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Check whether a usable token is cached
    pub async fn is_valid(&self) -> bool {
        self.cached_token
            .read()
            .await
            .as_ref()
            .is_some_and(CachedToken::is_valid)
    }

    /// Request a token from the token endpoint
    async fn fetch_token(&self, oauth: &OAuthConfig) -> Result<CachedToken> {
        let mut form = vec![
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.as_str()),
        ];
        match &oauth.grant {
            OAuthGrant::ClientCredentials { scope } => {
                form.push(("grant_type", "client_credentials"));
                form.push(("scope", scope.as_str()));
            }
            OAuthGrant::RefreshToken {
                refresh_token,
                redirect_uri,
            } => {
                form.push(("grant_type", "refresh_token"));
                form.push(("refresh_token", refresh_token.as_str()));
                if let Some(uri) = redirect_uri {
                    form.push(("redirect_uri", uri.as_str()));
                }
            }
        }

        debug!(token_url = %oauth.token_url, "Requesting access token");

        let response = self
            .http_client
            .post(&oauth.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::auth(format!("Token endpoint unreachable: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TokenRefresh {
                message: format!("Token request failed with status {status}: {body}"),
            });
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::auth(format!("Invalid token response: {e}")))?;

        info!(
            expires_in = ?token_response.expires_in,
            "Obtained access token"
        );
        Ok(CachedToken::new(
            token_response.access_token,
            token_response.expires_in,
        ))
    }

    /// Clear the cached token, forcing a fetch on next use
    pub async fn clear_cache(&self) {
        let mut cached = self.cached_token.write().await;
        *cached = None;
    }

    /// Get the resolved strategy
    pub fn strategy(&self) -> &AuthStrategy {
        &self.strategy
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("strategy", &self.strategy.kind())
            .finish_non_exhaustive()
    }
}

/// OAuth2 token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// The v1 endpoint reports this as a string, v2 as a number
    #[serde(default, deserialize_with = "lenient_seconds")]
    expires_in: Option<i64>,
}

fn lenient_seconds<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(i64),
        Text(String),
    }

    match Option::<Seconds>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Seconds::Number(n)) => Ok(Some(n)),
        Some(Seconds::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
