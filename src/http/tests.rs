//! Tests for the HTTP client module

use super::*;
use crate::auth::{AuthStrategy, Authenticator, OAuthConfig, OAuthGrant};
use crate::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use test_case::test_case;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_config() -> HttpClientConfig {
    HttpClientConfig::builder()
        .timeout(Duration::from_secs(5))
        .max_attempts(3)
        .backoff(Duration::from_millis(1), Duration::from_millis(5))
        .build()
}

fn client() -> HttpClient {
    HttpClient::new(fast_config()).unwrap()
}

/// Serve a 200 whose body never finishes; returns the URL and accept count
async fn stalled_body_server() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let head = "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 64\r\n\r\n{\"value\": [";
                let _ = socket.write_all(head.as_bytes()).await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });

    (format!("http://{addr}/items"), accepted)
}

// ============================================================================
// Classification
// ============================================================================

#[test_case(200 => ResponseClass::Success ; "ok")]
#[test_case(204 => ResponseClass::Success ; "no content")]
#[test_case(404 => ResponseClass::EmptyNotFound ; "not found")]
#[test_case(400 => ResponseClass::Fatal ; "bad request")]
#[test_case(401 => ResponseClass::Fatal ; "unauthorized")]
#[test_case(403 => ResponseClass::Fatal ; "forbidden")]
#[test_case(429 => ResponseClass::Fatal ; "too many requests")]
#[test_case(500 => ResponseClass::Retriable ; "internal error")]
#[test_case(503 => ResponseClass::Retriable ; "unavailable")]
#[test_case(599 => ResponseClass::Retriable ; "upper 5xx")]
#[test_case(302 => ResponseClass::Fatal ; "unfollowed redirect")]
fn test_classify(status: u16) -> ResponseClass {
    classify(status)
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_from_tap_config() {
    let tap = crate::config::TapConfig {
        request_timeout_secs: 10,
        max_attempts: 5,
        backoff_initial_ms: 100,
        backoff_max_ms: 1000,
        requests_per_second: Some(4),
        user_agent: Some("tap-dynamics-bc/test".to_string()),
        ..Default::default()
    };
    let config = HttpClientConfig::from_tap_config(&tap);

    assert_eq!(config.timeout, Duration::from_secs(10));
    assert_eq!(config.max_attempts, 5);
    assert_eq!(config.initial_backoff, Duration::from_millis(100));
    assert_eq!(config.throttle, Some(ThrottleConfig::per_second(4)));
    assert_eq!(config.user_agent.as_deref(), Some("tap-dynamics-bc/test"));
}

#[test]
fn test_max_attempts_floor() {
    let config = HttpClientConfig::builder().max_attempts(0).build();
    assert_eq!(config.max_attempts, 1);
}

#[test]
fn test_backoff_doubles_and_caps() {
    let config = HttpClientConfig::builder()
        .backoff(Duration::from_millis(100), Duration::from_millis(350))
        .build();
    let client = HttpClient::new(config).unwrap();

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(1), Duration::from_millis(200));
    assert_eq!(client.calculate_backoff(2), Duration::from_millis(350));
    assert_eq!(client.calculate_backoff(40), Duration::from_millis(350));
}

// ============================================================================
// Fetch
// ============================================================================

#[tokio::test]
async fn test_fetch_success_with_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/companies"))
        .and(query_param("$expand", "picture"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": [{"id": "C1"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let query = vec![("$expand".to_string(), "picture".to_string())];
    let fetched = client()
        .fetch(&format!("{}/companies", server.uri()), &query)
        .await
        .unwrap();

    assert_eq!(
        fetched,
        Fetched::Body(serde_json::json!({"value": [{"id": "C1"}]}))
    );
}

#[tokio::test]
async fn test_fetch_retries_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": []})))
        .expect(1)
        .mount(&server)
        .await;

    let fetched = client()
        .fetch(&format!("{}/items", server.uri()), &[])
        .await
        .unwrap();
    assert!(matches!(fetched, Fetched::Body(_)));
}

#[tokio::test]
async fn test_fetch_server_error_exhausts_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client()
        .fetch(&format!("{}/items", server.uri()), &[])
        .await
        .unwrap_err();

    match err {
        Error::RetriesExhausted {
            attempts,
            last_error,
            ..
        } => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("500"));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_client_error_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad filter"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client()
        .fetch(&format!("{}/items", server.uri()), &[])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 400, ref body, .. } if body == "bad filter"));
    assert!(!err.aborts_run());
}

#[tokio::test]
async fn test_fetch_not_found_is_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/dimensionSetLines"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let fetched = client()
        .fetch(&format!("{}/dimensionSetLines", server.uri()), &[])
        .await
        .unwrap();
    assert_eq!(fetched, Fetched::NotFound);
}

#[tokio::test]
async fn test_fetch_malformed_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let url = format!("{}/items", server.uri());
    let err = client().fetch(&url, &[]).await.unwrap_err();
    assert!(matches!(err, Error::MalformedResponse { url: ref u, .. } if *u == url));
}

#[tokio::test]
async fn test_fetch_timeout_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(2)
        .mount(&server)
        .await;

    let config = HttpClientConfig::builder()
        .timeout(Duration::from_millis(50))
        .max_attempts(2)
        .backoff(Duration::from_millis(1), Duration::from_millis(1))
        .build();
    let err = HttpClient::new(config)
        .unwrap()
        .fetch(&format!("{}/slow", server.uri()), &[])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RetriesExhausted { attempts: 2, ref last_error, .. } if last_error.contains("timeout")));
}

#[tokio::test]
async fn test_fetch_sends_headers_and_auth() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/companies"))
        .and(header("User-Agent", "tap-dynamics-bc/1.0"))
        .and(header("Accept", "application/json"))
        .and(header("Authorization", "Basic Ym9iOnB3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": []})))
        .expect(1)
        .mount(&server)
        .await;

    let config = HttpClientConfig::builder()
        .user_agent("tap-dynamics-bc/1.0")
        .header("Accept", "application/json")
        .build();
    let auth = Arc::new(Authenticator::new(AuthStrategy::Basic {
        username: "bob".to_string(),
        password: "pw".to_string(),
    }));

    HttpClient::new(config)
        .unwrap()
        .with_authenticator(auth)
        .fetch(&format!("{}/companies", server.uri()), &[])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_fetch_cancelled_before_start() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = client()
        .with_cancellation(cancel)
        .fetch(&format!("{}/items", server.uri()), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn test_fetch_cancel_interrupts_backoff() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let config = HttpClientConfig::builder()
        .max_attempts(5)
        .backoff(Duration::from_secs(60), Duration::from_secs(60))
        .build();
    let cancel = CancellationToken::new();
    let client = HttpClient::new(config)
        .unwrap()
        .with_cancellation(cancel.clone());

    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        client.fetch(&format!("{}/items", server.uri()), &[]),
    )
    .await
    .unwrap()
    .unwrap_err();
    trigger.await.unwrap();
    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn test_fetch_stalled_body_is_retried() {
    let (url, accepted) = stalled_body_server().await;

    let config = HttpClientConfig::builder()
        .timeout(Duration::from_millis(200))
        .max_attempts(2)
        .backoff(Duration::from_millis(1), Duration::from_millis(1))
        .build();
    let err = HttpClient::new(config)
        .unwrap()
        .fetch(&url, &[])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RetriesExhausted { attempts: 2, .. }), "got {err:?}");
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_fetch_cancel_interrupts_body_read() {
    let (url, _) = stalled_body_server().await;

    let config = HttpClientConfig::builder()
        .timeout(Duration::from_secs(20))
        .build();
    let cancel = CancellationToken::new();
    let client = HttpClient::new(config)
        .unwrap()
        .with_cancellation(cancel.clone());

    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let err = client.fetch(&url, &[]).await.unwrap_err();
    trigger.await.unwrap();

    assert!(matches!(err, Error::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_fetch_cancel_interrupts_token_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"access_token": "late", "expires_in": 3600}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/companies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": []})))
        .expect(0)
        .mount(&server)
        .await;

    let auth = Authenticator::new(AuthStrategy::OAuth(OAuthConfig {
        token_url: format!("{}/token", server.uri()),
        client_id: "app".to_string(),
        client_secret: "secret".to_string(),
        grant: OAuthGrant::ClientCredentials {
            scope: "api".to_string(),
        },
    }))
    .with_timeout(Duration::from_secs(20));

    let cancel = CancellationToken::new();
    let client = client()
        .with_authenticator(Arc::new(auth))
        .with_cancellation(cancel.clone());

    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let err = client
        .fetch(&format!("{}/companies", server.uri()), &[])
        .await
        .unwrap_err();
    trigger.await.unwrap();

    assert!(matches!(err, Error::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_fetch_invalid_url() {
    let err = client().fetch("not a url", &[]).await.unwrap_err();
    assert!(matches!(err, Error::InvalidUrl(_)));
}

// ============================================================================
// Throttle
// ============================================================================

#[tokio::test]
async fn test_throttle_allows_burst_then_waits() {
    let throttle = Throttle::new(ThrottleConfig {
        requests_per_second: 2,
        burst: 3,
    });

    let started = Instant::now();
    for _ in 0..3 {
        throttle.wait().await;
    }
    assert!(started.elapsed() < Duration::from_millis(200));

    throttle.wait().await;
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_throttle_zero_rate_is_raised() {
    let throttle = Throttle::new(ThrottleConfig::per_second(0));
    throttle.wait().await;
}
