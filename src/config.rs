//! Tap configuration
//!
//! The configuration surface consumed by the engine: credentials, API
//! location, the incremental floor and HTTP tuning. Loaded from a JSON or
//! YAML file, or from inline JSON.

use crate::error::{Error, Result, ResultExt};
use crate::stream::{is_yaml, ApiRoot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Host of the Business Central API
pub const API_HOST: &str = "https://api.businesscentral.dynamics.com/v2.0";

/// Token endpoint used with a refresh token
pub const COMMON_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/token";

/// Default scope for the client-credentials grant
pub const DEFAULT_SCOPE: &str = "https://api.businesscentral.dynamics.com/.default";

/// Complete tap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapConfig {
    // ------------------------------------------------------------------
    // OAuth
    // ------------------------------------------------------------------
    /// Application (client) id
    #[serde(default)]
    pub client_id: Option<String>,

    /// Application secret
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Tenant (directory) id
    #[serde(default)]
    pub tenant: Option<String>,

    /// Refresh token; switches the token request to the refresh-token grant
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Redirect URI registered for the refresh-token grant
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// Token endpoint override
    #[serde(default)]
    pub auth_endpoint: Option<String>,

    /// Scope for the client-credentials grant
    #[serde(default)]
    pub scope: Option<String>,

    // ------------------------------------------------------------------
    // NTLM / Basic
    // ------------------------------------------------------------------
    /// User name for on-premises web services
    #[serde(default)]
    pub username: Option<String>,

    /// Password for on-premises web services
    #[serde(default)]
    pub password: Option<String>,

    /// Windows domain qualifying the NTLM user name
    #[serde(default)]
    pub domain: Option<String>,

    /// Use HTTP Basic instead of NTLM for username/password credentials
    #[serde(default)]
    pub use_basic_auth: bool,

    // ------------------------------------------------------------------
    // API location
    // ------------------------------------------------------------------
    /// Environment name (e.g. `production`, `sandbox`)
    #[serde(default = "default_environment")]
    pub environment_name: String,

    /// Explicit API root replacing the standard and reports-finance roots
    #[serde(default)]
    pub base_url: Option<String>,

    /// Explicit OData web-services root
    #[serde(default)]
    pub odata_base_url: Option<String>,

    // ------------------------------------------------------------------
    // Extraction
    // ------------------------------------------------------------------
    /// Incremental floor used when a partition has no bookmark yet
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,

    /// User-Agent header sent with API requests
    #[serde(default)]
    pub user_agent: Option<String>,

    // ------------------------------------------------------------------
    // HTTP tuning
    // ------------------------------------------------------------------
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Total attempts per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay in milliseconds (doubles per attempt)
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,

    /// Ceiling for the retry delay in milliseconds
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Optional client-side request rate limit
    #[serde(default)]
    pub requests_per_second: Option<u32>,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            tenant: None,
            refresh_token: None,
            redirect_uri: None,
            auth_endpoint: None,
            scope: None,
            username: None,
            password: None,
            domain: None,
            use_basic_auth: false,
            environment_name: default_environment(),
            base_url: None,
            odata_base_url: None,
            start_date: None,
            user_agent: None,
            request_timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            requests_per_second: None,
        }
    }
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_initial_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

impl TapConfig {
    /// Load configuration from a file; `.yaml`/`.yml` are parsed as YAML, anything else as JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = if is_yaml(path) {
            serde_yaml::from_str(&contents)?
        } else {
            serde_json::from_str(&contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from inline JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field combinations before any network call
    pub fn validate(&self) -> Result<()> {
        if self.client_id.is_some() {
            if self.client_secret.is_none() {
                return Err(Error::missing_field("client_secret"));
            }
            if self.refresh_token.is_none() && self.tenant.is_none() && self.auth_endpoint.is_none()
            {
                return Err(Error::missing_field("tenant"));
            }
        }

        if self.username.is_some() && self.password.is_none() {
            return Err(Error::missing_field("password"));
        }

        if self.base_url.is_none() {
            let env = self.environment();
            if env.is_empty() || env.contains('/') || env.chars().any(char::is_whitespace) {
                return Err(Error::invalid_value(
                    "environment_name",
                    format!("'{}' is not a single path segment", self.environment_name),
                ));
            }
        }

        for (field, url) in [
            ("base_url", &self.base_url),
            ("odata_base_url", &self.odata_base_url),
            ("auth_endpoint", &self.auth_endpoint),
        ] {
            if let Some(url) = url {
                url::Url::parse(url)
                    .map_err(|e| Error::invalid_value(field, format!("{url}: {e}")))?;
            }
        }

        if self.max_attempts == 0 {
            return Err(Error::invalid_value("max_attempts", "must be at least 1"));
        }

        Ok(())
    }

    /// Environment name with any query-string residue removed
    pub fn environment(&self) -> &str {
        self.environment_name
            .split('?')
            .next()
            .unwrap_or_default()
            .trim()
    }

    /// Root URL a stream path is resolved against
    pub fn api_root(&self, root: ApiRoot) -> String {
        let env = self.environment();
        let url = match root {
            ApiRoot::Standard => self
                .base_url
                .clone()
                .unwrap_or_else(|| format!("{API_HOST}/{env}/api/v2.0")),
            ApiRoot::ReportsFinance => self
                .base_url
                .clone()
                .unwrap_or_else(|| format!("{API_HOST}/{env}/api/microsoft/reportsFinance/beta")),
            ApiRoot::OData => match (&self.odata_base_url, &self.base_url) {
                (Some(url), _) | (None, Some(url)) => url.clone(),
                (None, None) => format!(
                    "{API_HOST}/{}/{env}/ODataV4",
                    self.tenant.as_deref().unwrap_or("common")
                ),
            },
        };
        url.trim_end_matches('/').to_string()
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
