//! Authentication module
//!
//! Supports: OAuth2 (client credentials or refresh token), NTLM, Basic
//!
//! `resolve` picks exactly one `AuthStrategy` from the configuration once
//! per run. The `Authenticator` applies it to outbound requests and owns the
//! shared, lazily refreshed OAuth credential.

mod authenticator;
mod resolver;
mod types;

pub use authenticator::Authenticator;
pub use resolver::resolve;
pub use types::{AuthStrategy, CachedToken, OAuthConfig, OAuthGrant};

#[cfg(test)]
mod tests;
