//! Tests for the auth module

use super::*;
use crate::config::TapConfig;
use base64::Engine;
use chrono::{Duration, Utc};
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn basic_header(built: &reqwest::Request) -> String {
    let value = built
        .headers()
        .get("Authorization")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let encoded = value.strip_prefix("Basic ").unwrap();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap();
    String::from_utf8(decoded).unwrap()
}

fn oauth(token_url: String) -> AuthStrategy {
    AuthStrategy::OAuth(OAuthConfig {
        token_url,
        client_id: "app".to_string(),
        client_secret: "secret".to_string(),
        grant: OAuthGrant::ClientCredentials {
            scope: "https://api.businesscentral.dynamics.com/.default".to_string(),
        },
    })
}

// ============================================================================
// Resolver Tests
// ============================================================================

#[test]
fn test_resolve_client_credentials() {
    let config = TapConfig {
        client_id: Some("app".to_string()),
        client_secret: Some("secret".to_string()),
        tenant: Some("contoso".to_string()),
        // Credentials win over a username.
        username: Some("bob".to_string()),
        ..TapConfig::default()
    };

    let AuthStrategy::OAuth(oauth) = resolve(&config).unwrap() else {
        panic!("expected OAuth");
    };
    assert_eq!(
        oauth.token_url,
        "https://login.microsoftonline.com/contoso/oauth2/v2.0/token"
    );
    assert!(matches!(oauth.grant, OAuthGrant::ClientCredentials { .. }));
}

#[test]
fn test_resolve_refresh_token() {
    let config = TapConfig {
        client_id: Some("app".to_string()),
        client_secret: Some("secret".to_string()),
        refresh_token: Some("rt".to_string()),
        redirect_uri: Some("https://app/callback".to_string()),
        ..TapConfig::default()
    };

    let AuthStrategy::OAuth(oauth) = resolve(&config).unwrap() else {
        panic!("expected OAuth");
    };
    assert_eq!(
        oauth.token_url,
        "https://login.microsoftonline.com/common/oauth2/token"
    );
    assert!(matches!(oauth.grant, OAuthGrant::RefreshToken { .. }));
}

#[test]
fn test_resolve_auth_endpoint_override() {
    let config = TapConfig {
        client_id: Some("app".to_string()),
        client_secret: Some("secret".to_string()),
        auth_endpoint: Some("http://localhost/token".to_string()),
        ..TapConfig::default()
    };
    let AuthStrategy::OAuth(oauth) = resolve(&config).unwrap() else {
        panic!("expected OAuth");
    };
    assert_eq!(oauth.token_url, "http://localhost/token");
}

#[test]
fn test_resolve_client_credentials_without_tenant() {
    let config = TapConfig {
        client_id: Some("app".to_string()),
        client_secret: Some("secret".to_string()),
        ..TapConfig::default()
    };
    assert!(resolve(&config).is_err());
}

#[test]
fn test_resolve_username_ntlm_or_basic() {
    let mut config = TapConfig {
        username: Some("bob".to_string()),
        password: Some("pw".to_string()),
        domain: Some("CORP".to_string()),
        ..TapConfig::default()
    };
    assert_eq!(resolve(&config).unwrap().kind(), "ntlm");

    config.use_basic_auth = true;
    assert_eq!(resolve(&config).unwrap().kind(), "basic");
}

#[test]
fn test_resolve_none() {
    let strategy = resolve(&TapConfig::default()).unwrap();
    assert!(matches!(strategy, AuthStrategy::None));
    assert_eq!(strategy.kind(), "none");
}

// ============================================================================
// CachedToken Tests
// ============================================================================

#[test]
fn test_cached_token_fresh() {
    let token = CachedToken::new("t", Some(3600));
    assert!(token.is_valid());
}

#[test]
fn test_cached_token_expired() {
    let fetched = Utc::now() - Duration::seconds(3601);
    let token = CachedToken::fetched_at("t", fetched, Some(3600));
    assert!(!token.is_valid());
}

#[test]
fn test_cached_token_boundary() {
    let fetched = Utc::now();
    let token = CachedToken::fetched_at("t", fetched, Some(60));
    assert!(token.is_valid_at(fetched + Duration::seconds(59)));
    assert!(!token.is_valid_at(fetched + Duration::seconds(60)));
}

#[test]
fn test_cached_token_without_expiry_never_expires() {
    let long_ago = Utc::now() - Duration::days(365);
    assert!(CachedToken::fetched_at("t", long_ago, None).is_valid());
    assert!(CachedToken::fetched_at("t", long_ago, Some(0)).is_valid());
}

#[test]
fn test_cached_token_extreme_lifetimes() {
    assert!(CachedToken::new("t", Some(i64::MAX / 10)).is_valid());
    assert!(CachedToken::new("t", Some(i64::MAX)).is_valid());
    assert!(!CachedToken::new("t", Some(-1)).is_valid());
    assert!(!CachedToken::new("t", Some(i64::MIN)).is_valid());
}

// ============================================================================
// Authenticator Tests
// ============================================================================

#[tokio::test]
async fn test_no_auth() {
    let auth = Authenticator::new(AuthStrategy::None);
    let req = reqwest::Client::new().get("https://example.com/api");
    let built = auth.apply(req).await.unwrap().build().unwrap();
    assert!(built.headers().get("Authorization").is_none());
}

#[tokio::test]
async fn test_basic_auth() {
    let auth = Authenticator::new(AuthStrategy::Basic {
        username: "bob".to_string(),
        password: "pw".to_string(),
    });
    let req = reqwest::Client::new().get("https://example.com/api");
    let built = auth.apply(req).await.unwrap().build().unwrap();
    assert_eq!(basic_header(&built), "bob:pw");
}

#[tokio::test]
async fn test_ntlm_domain_qualified_user() {
    let auth = Authenticator::new(AuthStrategy::Ntlm {
        username: "bob".to_string(),
        password: "pw".to_string(),
        domain: Some("CORP".to_string()),
    });
    let req = reqwest::Client::new().get("https://example.com/api");
    let built = auth.apply(req).await.unwrap().build().unwrap();
    assert_eq!(basic_header(&built), "CORP\\bob:pw");
}

#[tokio::test]
async fn test_auth_never_touches_body() {
    let auth = Authenticator::new(AuthStrategy::Basic {
        username: "bob".to_string(),
        password: "pw".to_string(),
    });
    let req = reqwest::Client::new()
        .post("https://example.com/api")
        .body("payload");
    let built = auth.apply(req).await.unwrap().build().unwrap();
    assert_eq!(built.body().unwrap().as_bytes(), Some(&b"payload"[..]));
}

#[tokio::test]
async fn test_oauth_token_fetched_once_and_cached() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "abc",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = Authenticator::new(oauth(format!("{}/token", server.uri())));
    assert!(!auth.is_valid().await);

    for _ in 0..3 {
        let req = reqwest::Client::new().get("https://example.com/api");
        let built = auth.apply(req).await.unwrap().build().unwrap();
        assert_eq!(built.headers().get("Authorization").unwrap(), "Bearer abc");
    }
    assert!(auth.is_valid().await);
}

#[tokio::test]
async fn test_oauth_concurrent_callers_share_one_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"access_token": "shared", "expires_in": 3600}))
                .set_delay(std::time::Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let auth = Arc::new(Authenticator::new(oauth(format!("{}/token", server.uri()))));
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let auth = Arc::clone(&auth);
            tokio::spawn(async move { auth.get_token().await.map(|t| t.token) })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), "shared");
    }
}

#[tokio::test]
async fn test_oauth_refreshes_after_clear() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "abc",
            "expires_in": "3599"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let auth = Authenticator::new(oauth(format!("{}/token", server.uri())));
    let token = auth.get_token().await.unwrap();
    assert_eq!(token.expires_in, Some(3599));

    auth.clear_cache().await;
    auth.get_token().await.unwrap();
}

#[tokio::test]
async fn test_oauth_refresh_token_grant() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=rt-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "rt-access"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let auth = Authenticator::new(AuthStrategy::OAuth(OAuthConfig {
        token_url: format!("{}/token", server.uri()),
        client_id: "app".to_string(),
        client_secret: "secret".to_string(),
        grant: OAuthGrant::RefreshToken {
            refresh_token: "rt-1".to_string(),
            redirect_uri: None,
        },
    }));

    let token = auth.get_token().await.unwrap();
    assert_eq!(token.token, "rt-access");
    assert!(token.expires_in.is_none());
}

#[tokio::test]
async fn test_oauth_rejected_credentials_abort_run() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
        .mount(&server)
        .await;

    let auth = Authenticator::new(oauth(format!("{}/token", server.uri())));
    let req = reqwest::Client::new().get("https://example.com/api");
    let err = auth.apply(req).await.unwrap_err();

    assert!(matches!(err, crate::Error::TokenRefresh { .. }));
    assert!(err.aborts_run());
    assert!(err.to_string().contains("invalid_client"));
}

#[tokio::test]
async fn test_oauth_unreachable_endpoint() {
    // Nothing listens on port 9 locally.
    let auth = Authenticator::new(oauth("http://127.0.0.1:9/token".to_string()));
    let err = auth.get_token().await.unwrap_err();
    assert!(matches!(err, crate::Error::Auth { .. }));
}

#[tokio::test]
async fn test_oauth_slow_token_endpoint_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"access_token": "late", "expires_in": 3600}))
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let auth = Authenticator::new(oauth(format!("{}/token", server.uri())))
        .with_timeout(std::time::Duration::from_millis(200));

    let started = std::time::Instant::now();
    let err = auth.get_token().await.unwrap_err();

    assert!(started.elapsed() < std::time::Duration::from_secs(2));
    assert!(matches!(err, crate::Error::Auth { .. }));
    assert!(err.aborts_run());
    assert!(err.to_string().contains("timed out"));
    assert!(!auth.is_valid().await);
}

#[tokio::test]
async fn test_get_token_rejected_for_basic() {
    let auth = Authenticator::new(AuthStrategy::Basic {
        username: "bob".to_string(),
        password: "pw".to_string(),
    });
    assert!(auth.get_token().await.is_err());
}
