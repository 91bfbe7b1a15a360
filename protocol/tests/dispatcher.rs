//! Dispatcher state machine against a scripted platform.
//!
//! Each test builds its own dispatcher over an in-memory cache, so nothing
//! leaks between tests and no network is involved.

mod common;

use std::sync::Arc;

use common::*;
use wepay_protocol::auth::verifier::VerificationError;
use wepay_protocol::crypto::keys::parse_certificate;
use wepay_protocol::crypto::signatures::verify_sha256_rsa;
use wepay_protocol::{
    AuthenticatedDispatcher, BootstrapPolicy, CacheStore, ClientConfig, ClientError, FileCache,
    MemoryCache, Method,
};

fn config() -> ClientConfig {
    ClientConfig {
        base_url: BASE_URL.to_string(),
        ..ClientConfig::default()
    }
}

fn dispatcher(platform: Arc<ScriptedPlatform>) -> (Arc<MemoryCache>, AuthenticatedDispatcher) {
    dispatcher_with(platform, config())
}

fn dispatcher_with(
    platform: Arc<ScriptedPlatform>,
    config: ClientConfig,
) -> (Arc<MemoryCache>, AuthenticatedDispatcher) {
    let cache = Arc::new(MemoryCache::new());
    let dispatcher =
        AuthenticatedDispatcher::with_parts(credential(), config, platform, cache.clone()).unwrap();
    (cache, dispatcher)
}

// ---------------------------------------------------------------------------
// Verification & refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_first_verified_call_refreshes_exactly_once() {
    let platform = Arc::new(ScriptedPlatform::honest(r#"{"batch_id":"1030000071100999991182020050700019480001"}"#));
    let (_cache, dispatcher) = dispatcher(platform.clone());

    let response = dispatcher
        .call(Method::POST, "/v3/transfer/batches", r#"{"out_batch_no":"plfk2020042013"}"#, true)
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body["batch_id"], "1030000071100999991182020050700019480001");
    assert_eq!(response.request_id.as_deref(), Some("08DE8D8BC30C8F0A1A2B3C4D5E6F7A8B"));
    assert_eq!(platform.listing_fetches(), 1);
    // Business call + listing; the business call is not resent.
    assert_eq!(platform.request_count(), 2);
}

#[tokio::test]
async fn test_known_serial_skips_refresh() {
    let platform = Arc::new(ScriptedPlatform::honest(r#"{"ok":true}"#));
    let (_cache, dispatcher) = dispatcher(platform.clone());

    dispatcher.call(Method::GET, "/v3/a", "", true).await.unwrap();
    dispatcher.call(Method::GET, "/v3/b", "", true).await.unwrap();
    dispatcher.call(Method::GET, "/v3/c", "", true).await.unwrap();

    assert_eq!(platform.listing_fetches(), 1);
    assert_eq!(platform.request_count(), 4);
}

#[tokio::test]
async fn test_unknown_serial_after_refresh_fails_without_looping() {
    let platform = Arc::new(ScriptedPlatform::new(
        unsigned_response(200, LISTING),
        signed_response(200, r#"{"ok":true}"#, &signing_key(PLATFORM_KEY), "7132D72A03E93CDDF8C03BBD1F37EEDF"),
    ));
    let (_cache, dispatcher) = dispatcher(platform.clone());

    let err = dispatcher.call(Method::GET, "/v3/x", "", true).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Verification(VerificationError::UnknownSerial(ref s)) if s == "7132D72A03E93CDDF8C03BBD1F37EEDF"
    ));
    assert_eq!(platform.listing_fetches(), 1);
}

#[tokio::test]
async fn test_forged_response_rejected() {
    let platform = Arc::new(ScriptedPlatform::new(
        unsigned_response(200, LISTING),
        signed_response(200, r#"{"amount":1}"#, &signing_key(ROGUE_KEY), PLATFORM_SERIAL),
    ));
    let (_cache, dispatcher) = dispatcher(platform);

    let err = dispatcher.call(Method::GET, "/v3/x", "", true).await.unwrap_err();
    assert!(err.is_verification());
    assert!(matches!(
        err,
        ClientError::Verification(VerificationError::SignatureMismatch(_))
    ));
}

#[tokio::test]
async fn test_missing_signature_headers_fail_closed() {
    let platform = Arc::new(ScriptedPlatform::new(
        unsigned_response(200, LISTING),
        unsigned_response(200, r#"{"ok":true}"#),
    ));
    let (_cache, dispatcher) = dispatcher(platform.clone());

    let err = dispatcher.call(Method::GET, "/v3/x", "", true).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Verification(VerificationError::MissingHeader(_))
    ));
    assert_eq!(platform.listing_fetches(), 0);
}

#[tokio::test]
async fn test_unverified_call_never_touches_certificates() {
    let platform = Arc::new(ScriptedPlatform::new(
        unsigned_response(500, "unreachable"),
        unsigned_response(200, r#"{"ok":true}"#),
    ));
    let (cache, dispatcher) = dispatcher(platform.clone());

    let response = dispatcher.call(Method::GET, "/v3/x", "", false).await.unwrap();
    assert_eq!(response.body["ok"], true);
    assert_eq!(platform.listing_fetches(), 0);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_rejected_listing_fetch_is_verification_error() {
    let platform = Arc::new(ScriptedPlatform::new(
        unsigned_response(401, r#"{"code":"SIGN_ERROR","message":"signature mismatch"}"#),
        signed_response(200, "{}", &signing_key(PLATFORM_KEY), PLATFORM_SERIAL),
    ));
    let (cache, dispatcher) = dispatcher(platform);

    let err = dispatcher.call(Method::POST, "/v3/x", "{}", true).await.unwrap_err();
    assert!(err.is_verification(), "got {:?}", err);
    assert_eq!(err.upstream_code(), None);
    match err {
        ClientError::Verification(VerificationError::RefreshFailed { serial, reason }) => {
            assert_eq!(serial, PLATFORM_SERIAL);
            assert!(reason.contains("SIGN_ERROR"), "{}", reason);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_listing_timeout_is_verification_error() {
    let platform = Arc::new(ScriptedPlatform::honest("{}"));
    platform.time_out_listing();
    let (cache, dispatcher) = dispatcher(platform.clone());

    let err = dispatcher.call(Method::POST, "/v3/x", "{}", true).await.unwrap_err();
    assert!(
        matches!(err, ClientError::Verification(VerificationError::RefreshFailed { .. })),
        "got {:?}",
        err
    );
    assert_eq!(platform.listing_fetches(), 1);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_explicit_refresh_keeps_transport_error() {
    let platform = Arc::new(ScriptedPlatform::honest("{}"));
    platform.time_out_listing();
    let (_cache, dispatcher) = dispatcher(platform);

    let err = dispatcher.refresh_certificates().await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_expired_cached_certificate_refetched() {
    let platform = Arc::new(ScriptedPlatform::honest("{}"));
    let (cache, dispatcher) = dispatcher(platform.clone());

    dispatcher.call(Method::GET, "/v3/x", "", true).await.unwrap();
    // Evict the way an elapsed TTL would.
    cache.del(PLATFORM_SERIAL).await.unwrap();
    dispatcher.call(Method::GET, "/v3/x", "", true).await.unwrap();

    assert_eq!(platform.listing_fetches(), 2);
}

#[tokio::test]
async fn test_concurrent_first_calls_converge() {
    let platform = Arc::new(ScriptedPlatform::honest(r#"{"ok":true}"#));
    let (cache, dispatcher) = dispatcher(platform.clone());

    let (a, b) = tokio::join!(
        dispatcher.call(Method::GET, "/v3/a", "", true),
        dispatcher.call(Method::GET, "/v3/b", "", true)
    );
    assert!(a.is_ok());
    assert!(b.is_ok());
    // Either call may have refreshed; never more than one refresh each.
    assert!((1..=2).contains(&platform.listing_fetches()));
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_dispatchers_sharing_a_cache_share_trust() {
    let platform = Arc::new(ScriptedPlatform::honest("{}"));
    let cache = Arc::new(MemoryCache::new());
    let first =
        AuthenticatedDispatcher::with_parts(credential(), config(), platform.clone(), cache.clone())
            .unwrap();
    let second =
        AuthenticatedDispatcher::with_parts(credential(), config(), platform.clone(), cache).unwrap();

    first.call(Method::GET, "/v3/x", "", true).await.unwrap();
    second.call(Method::GET, "/v3/x", "", true).await.unwrap();
    assert_eq!(platform.listing_fetches(), 1);
}

#[tokio::test]
async fn test_file_cache_persists_certificates() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(FileCache::new(dir.path().join("certs")));
    let platform = Arc::new(ScriptedPlatform::honest("{}"));
    let dispatcher =
        AuthenticatedDispatcher::with_parts(credential(), config(), platform.clone(), cache.clone())
            .unwrap();

    dispatcher.call(Method::GET, "/v3/x", "", true).await.unwrap();
    assert!(dir.path().join("certs").join(PLATFORM_SERIAL).is_file());

    // A fresh dispatcher over the same directory starts trusted.
    let again =
        AuthenticatedDispatcher::with_parts(credential(), config(), platform.clone(), cache).unwrap();
    again.call(Method::GET, "/v3/x", "", true).await.unwrap();
    assert_eq!(platform.listing_fetches(), 1);
}

// ---------------------------------------------------------------------------
// Response mapping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_verified_business_error_becomes_upstream_api() {
    let body = r#"{"code":"NOT_ENOUGH","message":"insufficient balance"}"#;
    let platform = Arc::new(ScriptedPlatform::new(
        unsigned_response(200, LISTING),
        signed_response(403, body, &signing_key(PLATFORM_KEY), PLATFORM_SERIAL),
    ));
    let (_cache, dispatcher) = dispatcher(platform);

    match dispatcher.call(Method::POST, "/v3/transfer/batches", "{}", true).await {
        Err(ClientError::UpstreamApi { status, code, message }) => {
            assert_eq!(status, 403);
            assert_eq!(code, "NOT_ENOUGH");
            assert_eq!(message, "insufficient balance");
        }
        other => panic!("expected UpstreamApi, got {:?}", other),
    }
}

#[tokio::test]
async fn test_no_content_body_is_null() {
    let platform = Arc::new(ScriptedPlatform::honest(""));
    *platform.business.lock() = signed_response(204, "", &signing_key(PLATFORM_KEY), PLATFORM_SERIAL);
    let (_cache, dispatcher) = dispatcher(platform);

    let response = dispatcher.call(Method::POST, "/v3/x", "{}", true).await.unwrap();
    assert_eq!(response.status, 204);
    assert!(response.body.is_null());
}

// ---------------------------------------------------------------------------
// Outbound request shape
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_outbound_request_is_signed_and_well_formed() {
    let platform = Arc::new(ScriptedPlatform::honest("{}"));
    let (_cache, dispatcher) = dispatcher(platform.clone());
    let body = r#"{"out_batch_no":"plfk2020042013"}"#;

    dispatcher
        .call(Method::POST, "/v3/transfer/batches?x=1", body, false)
        .await
        .unwrap();

    let request = platform.last_request();
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.url, format!("{}/v3/transfer/batches?x=1", BASE_URL));
    assert_eq!(request.body, body.as_bytes());
    assert_eq!(request.headers["accept"], "application/json");
    assert_eq!(request.headers["content-type"], "application/json");
    assert!(request.headers["user-agent"]
        .to_str()
        .unwrap()
        .starts_with("wepay-protocol/"));

    let header = request.headers["authorization"].to_str().unwrap();
    let token = header
        .strip_prefix("WECHATPAY2-SHA256-RSA2048 ")
        .expect("scheme prefix");
    assert_eq!(token_field(token, "mchid"), Some(MCH_ID));
    assert_eq!(token_field(token, "serial_no"), Some(MERCHANT_SERIAL));

    let nonce = token_field(token, "nonce_str").unwrap();
    let timestamp = token_field(token, "timestamp").unwrap();
    let signature = token_field(token, "signature").unwrap();
    let canonical = format!(
        "POST\n/v3/transfer/batches?x=1\n{}\n{}\n{}\n",
        timestamp, nonce, body
    );
    let merchant = rsa::pkcs1v15::VerifyingKey::<sha2::Sha256>::new(
        parse_certificate(MERCHANT_CERT).unwrap().public_key,
    );
    assert!(verify_sha256_rsa(&merchant, canonical.as_bytes(), signature).unwrap());
}

#[tokio::test]
async fn test_each_request_gets_a_fresh_nonce() {
    let platform = Arc::new(ScriptedPlatform::honest("{}"));
    let (_cache, dispatcher) = dispatcher(platform.clone());

    dispatcher.call(Method::GET, "/v3/x", "", false).await.unwrap();
    dispatcher.call(Method::GET, "/v3/x", "", false).await.unwrap();

    let requests = platform.requests.lock();
    let nonce = |i: usize| {
        let header = requests[i].headers["authorization"].to_str().unwrap().to_string();
        token_field(&header, "nonce_str").unwrap().to_string()
    };
    assert_ne!(nonce(0), nonce(1));
}

#[tokio::test]
async fn test_call_json_sends_compact_utf8() {
    #[derive(serde::Serialize)]
    struct Batch<'a> {
        out_batch_no: &'a str,
        batch_name: &'a str,
    }

    let platform = Arc::new(ScriptedPlatform::honest("{}"));
    let (_cache, dispatcher) = dispatcher(platform.clone());
    dispatcher
        .call_json(
            Method::POST,
            "/v3/transfer/batches",
            &Batch {
                out_batch_no: "plfk2020042013",
                batch_name: "2019年1月深圳分部报销单",
            },
            false,
        )
        .await
        .unwrap();

    let sent = String::from_utf8(platform.last_request().body).unwrap();
    assert_eq!(
        sent,
        r#"{"out_batch_no":"plfk2020042013","batch_name":"2019年1月深圳分部报销单"}"#
    );
}

#[tokio::test]
async fn test_unprintable_user_agent_rejected_at_construction() {
    let platform = Arc::new(ScriptedPlatform::honest("{}"));
    let config = ClientConfig {
        user_agent: "bad\nagent".to_string(),
        ..config()
    };
    let result = AuthenticatedDispatcher::with_parts(
        credential(),
        config,
        platform,
        Arc::new(MemoryCache::new()),
    );
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

// ---------------------------------------------------------------------------
// Bootstrap policy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_self_verified_bootstrap_accepts_signed_listing() {
    let platform = Arc::new(ScriptedPlatform::new(
        signed_response(200, LISTING, &signing_key(PLATFORM_KEY), PLATFORM_SERIAL),
        signed_response(200, "{}", &signing_key(PLATFORM_KEY), PLATFORM_SERIAL),
    ));
    let config = ClientConfig {
        bootstrap_policy: BootstrapPolicy::SelfVerified,
        ..config()
    };
    let (_cache, dispatcher) = dispatcher_with(platform, config);
    assert!(dispatcher.call(Method::GET, "/v3/x", "", true).await.is_ok());
}

#[tokio::test]
async fn test_self_verified_bootstrap_rejects_forged_listing() {
    let platform = Arc::new(ScriptedPlatform::new(
        signed_response(200, LISTING, &signing_key(ROGUE_KEY), PLATFORM_SERIAL),
        signed_response(200, "{}", &signing_key(PLATFORM_KEY), PLATFORM_SERIAL),
    ));
    let config = ClientConfig {
        bootstrap_policy: BootstrapPolicy::SelfVerified,
        ..config()
    };
    let (cache, dispatcher) = dispatcher_with(platform, config);

    let err = dispatcher.call(Method::GET, "/v3/x", "", true).await.unwrap_err();
    assert!(err.is_verification());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_transport_trusted_bootstrap_accepts_unsigned_listing() {
    let platform = Arc::new(ScriptedPlatform::honest("{}"));
    let (_cache, dispatcher) = dispatcher(platform);
    assert_eq!(
        dispatcher.certificates().policy(),
        BootstrapPolicy::TransportTrusted
    );
    let outcome = dispatcher.refresh_certificates().await.unwrap();
    assert!(outcome.contains(PLATFORM_SERIAL));
}
