//! Auth strategy selection
//!
//! Precedence: client credentials ⇒ OAuth; else a username ⇒ Basic when
//! `use_basic_auth` is set, NTLM otherwise; else no auth.

use super::types::{AuthStrategy, OAuthConfig, OAuthGrant};
use crate::config::{TapConfig, COMMON_TOKEN_URL, DEFAULT_SCOPE};
use crate::error::{Error, Result};

/// Select the auth strategy for a run
pub fn resolve(config: &TapConfig) -> Result<AuthStrategy> {
    if let (Some(client_id), Some(client_secret)) = (&config.client_id, &config.client_secret) {
        let grant = match &config.refresh_token {
            Some(refresh_token) => OAuthGrant::RefreshToken {
                refresh_token: refresh_token.clone(),
                redirect_uri: config.redirect_uri.clone(),
            },
            None => OAuthGrant::ClientCredentials {
                scope: config
                    .scope
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
            },
        };

        let token_url = match (&config.auth_endpoint, &grant, &config.tenant) {
            (Some(url), _, _) => url.clone(),
            (None, OAuthGrant::RefreshToken { .. }, _) => COMMON_TOKEN_URL.to_string(),
            (None, OAuthGrant::ClientCredentials { .. }, Some(tenant)) => {
                format!("https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token")
            }
            (None, OAuthGrant::ClientCredentials { .. }, None) => {
                return Err(Error::missing_field("tenant"));
            }
        };

        return Ok(AuthStrategy::OAuth(OAuthConfig {
            token_url,
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
            grant,
        }));
    }

    if let Some(username) = &config.username {
        let password = config.password.clone().unwrap_or_default();
        if config.use_basic_auth {
            return Ok(AuthStrategy::Basic {
                username: username.clone(),
                password,
            });
        }
        return Ok(AuthStrategy::Ntlm {
            username: username.clone(),
            password,
            domain: config.domain.clone(),
        });
    }

    Ok(AuthStrategy::None)
}
