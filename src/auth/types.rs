//! Auth strategy types
//!
//! These types represent the resolved, runtime auth configuration.

use chrono::{DateTime, TimeDelta, Utc};

/// The single auth strategy a run uses
#[derive(Debug, Clone, Default)]
pub enum AuthStrategy {
    /// No authentication
    #[default]
    None,

    /// OAuth2 bearer token obtained from a token endpoint
    OAuth(OAuthConfig),

    /// NTLM credentials for on-premises web services
    Ntlm {
        /// User name
        username: String,
        /// Password
        password: String,
        /// Windows domain qualifying the user name
        domain: Option<String>,
    },

    /// HTTP Basic authentication
    Basic {
        /// Username
        username: String,
        /// Password
        password: String,
    },
}

impl AuthStrategy {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::OAuth(_) => "oauth2",
            Self::Ntlm { .. } => "ntlm",
            Self::Basic { .. } => "basic",
        }
    }
}

/// OAuth2 token endpoint settings
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Token endpoint URL
    pub token_url: String,
    /// Client ID
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
    /// Grant used to obtain tokens
    pub grant: OAuthGrant,
}

/// OAuth2 grant flavour
#[derive(Debug, Clone)]
pub enum OAuthGrant {
    /// Client credentials flow
    ClientCredentials {
        /// Requested scope
        scope: String,
    },
    /// Refresh token flow
    RefreshToken {
        /// Refresh token
        refresh_token: String,
        /// Redirect URI registered with the application
        redirect_uri: Option<String>,
    },
}

/// Access token together with when it was obtained
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// The access token
    pub token: String,
    /// When the token was fetched
    pub last_refreshed: DateTime<Utc>,
    /// Lifetime in seconds reported by the token endpoint
    pub expires_in: Option<i64>,
}

impl CachedToken {
    /// Create a token fetched now
    pub fn new(token: impl Into<String>, expires_in: Option<i64>) -> Self {
        Self::fetched_at(token, Utc::now(), expires_in)
    }

    /// Create a token fetched at a given instant
    pub fn fetched_at(
        token: impl Into<String>,
        last_refreshed: DateTime<Utc>,
        expires_in: Option<i64>,
    ) -> Self {
        Self {
            token: token.into(),
            last_refreshed,
            expires_in,
        }
    }

    /// Check validity at `now`
    ///
    /// A token without a reported lifetime (or a zero lifetime) never
    /// expires; otherwise it is valid while `now - last_refreshed` is below
    /// the lifetime. A negative lifetime is already expired and one too
    /// large to represent is treated as unbounded.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_in {
            None | Some(0) => true,
            Some(secs) if secs < 0 => false,
            Some(secs) => TimeDelta::try_seconds(secs)
                .map_or(true, |lifetime| now - self.last_refreshed < lifetime),
        }
    }

    /// Check validity now
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}
