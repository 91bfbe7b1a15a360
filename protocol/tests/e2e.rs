//! End-to-end scenario for the v3 authentication scheme.
//!
//! Walks the whole trust chain with fixed inputs: merchant credential from
//! PEM fixtures, a deterministic signed request whose `Authorization` value
//! is asserted byte for byte (the expected signature was produced
//! independently with `openssl dgst -sha256 -sign`), then a platform
//! response verified against a certificate installed in the store, and
//! rejected once its body is touched.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;

use common::*;
use wepay_protocol::auth::{authorize, SignedRequest};
use wepay_protocol::certificates::{CertificateSource, FetchedListing};
use wepay_protocol::{
    AuthenticatedDispatcher, BootstrapPolicy, CacheStore, CertificateStore, ClientConfig,
    ClientError, MemoryCache, Method, ResponseVerifier, VerificationContext, VerificationError,
};

const EXPECTED_SIGNATURE: &str = "oDPlYmkiqqmFMdtlAl4eODc/sLIMGpCXzRSI5OVLR+B6IpncoxR9BFVkaUuwi50PBWR8MbuF8c21Mors5IlUCbRX4uAC2fbhgCeyOtU8M75cmI7OFP7kskYb3f+McpbKXqnrdI6i/Q9NjwfalwQ7kxv0pARiFuNqpjgYbIW4IUJGrXKtykgDsn4dCzlgYTf+jixdvs11rrcyWdTE8dwu+j6zp1z7+sEz7Gb+ZJ2v/TwjW03f1a9XoyttG+9UH6P9UGMtBC+tnSmZe4a6dtlKIfmnj2W27d8LweqZmmI8MjVRUAOb+yD1AOoOZAH4M2SgXeG80nBdBSX7x8+A5Ud5rg==";

/// Serves the fixture listing without signature headers.
struct FixtureListing;

#[async_trait]
impl CertificateSource for FixtureListing {
    async fn fetch_certificates(&self) -> Result<FetchedListing, ClientError> {
        Ok(FetchedListing {
            headers: HeaderMap::new(),
            body: LISTING.as_bytes().to_vec(),
        })
    }
}

#[test]
fn test_authorization_string_is_exact() {
    let request = SignedRequest::with_parts(
        Method::POST,
        "/v3/test?x=1",
        1_700_000_000,
        "abc123",
        r#"{"a":1}"#,
    );
    let authorization = authorize(&credential(), &request).unwrap();

    assert_eq!(authorization.signature, EXPECTED_SIGNATURE);
    assert_eq!(
        authorization.header_value(),
        format!(
            concat!(
                "WECHATPAY2-SHA256-RSA2048 ",
                r#"mchid="1900000001",nonce_str="abc123",timestamp="1700000000","#,
                r#"serial_no="3D2E6A0C7B51F4A98C01E2D3B4A59687",signature="{}""#
            ),
            EXPECTED_SIGNATURE
        )
    );
}

#[tokio::test]
async fn test_response_verifies_then_fails_when_corrupted() {
    let store = CertificateStore::new(
        Arc::new(MemoryCache::new()),
        BootstrapPolicy::TransportTrusted,
        ResponseVerifier::default(),
    );
    let outcome = store.refresh(&credential(), &FixtureListing).await.unwrap();
    assert!(outcome.contains(PLATFORM_SERIAL));

    let response = signed_response(200, r#"{"a":1}"#, &signing_key(PLATFORM_KEY), PLATFORM_SERIAL);
    let context = VerificationContext::from_response(&response.headers, &response.body).unwrap();
    let certificate = store.get(&context.serial).await.unwrap().expect("installed");

    let verifier = ResponseVerifier::default();
    assert_eq!(verifier.verify(&context, &certificate), Ok(()));

    let mut corrupted = context.clone();
    corrupted.body[5] = b'2';
    assert_eq!(corrupted.body, br#"{"a":2}"#);
    assert_eq!(
        verifier.verify(&corrupted, &certificate),
        Err(VerificationError::SignatureMismatch(PLATFORM_SERIAL.to_string()))
    );
}

#[tokio::test]
async fn test_full_round_trip_through_dispatcher() {
    let platform = Arc::new(ScriptedPlatform::honest(r#"{"a":1}"#));
    let cache = Arc::new(MemoryCache::new());
    let config = ClientConfig {
        base_url: BASE_URL.to_string(),
        ..ClientConfig::default()
    };
    let dispatcher =
        AuthenticatedDispatcher::with_parts(credential(), config, platform.clone(), cache.clone())
            .unwrap();

    let response = dispatcher
        .call(Method::POST, "/v3/test?x=1", r#"{"a":1}"#, true)
        .await
        .unwrap();
    assert_eq!(response.body, serde_json::json!({"a": 1}));

    // The cached value is the base64 PEM the store wrote.
    let cached = cache.get(PLATFORM_SERIAL).await.unwrap().unwrap();
    let cert = dispatcher.certificates().get(PLATFORM_SERIAL).await.unwrap().unwrap();
    assert!(!cached.contains("BEGIN"));
    assert_eq!(cert.pem(), PLATFORM_CERT);

    // Same platform, one byte of the body changed in flight.
    let mut tampered = platform.business.lock().clone();
    tampered.body = br#"{"a":2}"#.to_vec();
    *platform.business.lock() = tampered;
    let err = dispatcher
        .call(Method::POST, "/v3/test?x=1", r#"{"a":1}"#, true)
        .await
        .unwrap_err();
    assert!(err.is_verification());
}
