//! Shared fixtures for the integration tests: a scripted platform that
//! serves the certificate listing and one business endpoint, signing its
//! responses the way the real platform does.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rsa::pkcs1v15::SigningKey;
use sha2::Sha256;

use wepay_protocol::crypto::keys::load_private_key;
use wepay_protocol::crypto::signatures::sign_sha256_rsa;
use wepay_protocol::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use wepay_protocol::MerchantCredential;

pub const MERCHANT_KEY: &str = include_str!("../fixtures/merchant_key.pem");
pub const MERCHANT_CERT: &str = include_str!("../fixtures/merchant_cert.pem");
pub const PLATFORM_KEY: &str = include_str!("../fixtures/platform_key.pem");
pub const PLATFORM_CERT: &str = include_str!("../fixtures/platform_cert.pem");
pub const ROGUE_KEY: &str = include_str!("../fixtures/rogue_key.pem");
pub const LISTING: &str = include_str!("../fixtures/certificates.json");

pub const MCH_ID: &str = "1900000001";
pub const V3_KEY: &str = "0123456789abcdefghijklmnopqrstuv";
pub const MERCHANT_SERIAL: &str = "3D2E6A0C7B51F4A98C01E2D3B4A59687";
pub const PLATFORM_SERIAL: &str = "5157F09EFDC096DE15EBE81A47057A7232F1B8E1";
pub const BASE_URL: &str = "https://api.test.invalid";

pub fn credential() -> MerchantCredential {
    MerchantCredential::new(MCH_ID, MERCHANT_KEY, MERCHANT_CERT, V3_KEY).expect("fixture credential")
}

pub fn signing_key(pem: &str) -> SigningKey<Sha256> {
    SigningKey::new(load_private_key(pem).expect("fixture key"))
}

/// A response signed over `timestamp\nnonce\nbody\n`.
pub fn signed_response(status: u16, body: &str, key: &SigningKey<Sha256>, serial: &str) -> HttpResponse {
    let timestamp = "1700000100";
    let nonce = "5K8264ILTKCH16CQ2502SI8ZNMTM67VS";
    let message = format!("{}\n{}\n{}\n", timestamp, nonce, body);
    let signature = sign_sha256_rsa(key, message.as_bytes()).expect("sign");

    let mut headers = HeaderMap::new();
    put(&mut headers, "Wechatpay-Timestamp", timestamp);
    put(&mut headers, "Wechatpay-Nonce", nonce);
    put(&mut headers, "Wechatpay-Signature", &signature);
    put(&mut headers, "Wechatpay-Serial", serial);
    put(&mut headers, "Request-ID", "08DE8D8BC30C8F0A1A2B3C4D5E6F7A8B");
    HttpResponse {
        status,
        headers,
        body: body.as_bytes().to_vec(),
    }
}

pub fn unsigned_response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        headers: HeaderMap::new(),
        body: body.as_bytes().to_vec(),
    }
}

pub fn put(headers: &mut HeaderMap, name: &str, value: &str) {
    headers.insert(
        HeaderName::from_bytes(name.as_bytes()).expect("header name"),
        HeaderValue::from_str(value).expect("header value"),
    );
}

/// Scripted stand-in for the platform.
///
/// `GET /v3/certificates` returns `listing`; every other path returns
/// `business`. Every request is recorded.
pub struct ScriptedPlatform {
    pub listing: Mutex<HttpResponse>,
    pub business: Mutex<HttpResponse>,
    pub requests: Mutex<Vec<HttpRequest>>,
    listing_fetches: AtomicUsize,
    listing_times_out: AtomicBool,
}

impl ScriptedPlatform {
    pub fn new(listing: HttpResponse, business: HttpResponse) -> Self {
        Self {
            listing: Mutex::new(listing),
            business: Mutex::new(business),
            requests: Mutex::new(Vec::new()),
            listing_fetches: AtomicUsize::new(0),
            listing_times_out: AtomicBool::new(false),
        }
    }

    /// Make every certificate listing fetch fail with a timeout.
    pub fn time_out_listing(&self) {
        self.listing_times_out.store(true, Ordering::SeqCst);
    }

    /// Unsigned listing (the platform does sign it, but the default policy
    /// doesn't look) and a platform-signed business reply.
    pub fn honest(business_body: &str) -> Self {
        Self::new(
            unsigned_response(200, LISTING),
            signed_response(200, business_body, &signing_key(PLATFORM_KEY), PLATFORM_SERIAL),
        )
    }

    pub fn listing_fetches(&self) -> usize {
        self.listing_fetches.load(Ordering::SeqCst)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.requests.lock().last().cloned().expect("no request recorded")
    }
}

#[async_trait]
impl Transport for ScriptedPlatform {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let is_listing = request.url.ends_with("/v3/certificates");
        self.requests.lock().push(request);
        if is_listing {
            self.listing_fetches.fetch_add(1, Ordering::SeqCst);
            if self.listing_times_out.load(Ordering::SeqCst) {
                return Err(TransportError::Timeout {
                    url: format!("{}/v3/certificates", BASE_URL),
                });
            }
            Ok(self.listing.lock().clone())
        } else {
            Ok(self.business.lock().clone())
        }
    }
}

/// Pull one `key="value"` field out of an Authorization token.
pub fn token_field<'a>(token: &'a str, key: &str) -> Option<&'a str> {
    token.split(',').find_map(|part| {
        let (k, v) = part.split_once('=')?;
        (k.trim() == key).then(|| v.trim_matches('"'))
    })
}
