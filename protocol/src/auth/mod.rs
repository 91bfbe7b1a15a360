//! # Request Authentication
//!
//! The two halves of the v3 mutual-authentication scheme:
//!
//! - [`signer`] — outbound: canonical request string, merchant RSA
//!   signature, `Authorization` header.
//! - [`verifier`] — inbound: canonical response string, platform RSA
//!   signature check against a [`PlatformCertificate`](crate::certificates::PlatformCertificate).
//!
//! Both are pure. Timestamps, nonces and certificate lookups are supplied
//! by the caller.

pub mod signer;
pub mod verifier;

pub use signer::{authorize, generate_nonce, sign, Authorization, SignedRequest, SigningError};
pub use verifier::{ResponseVerifier, VerificationContext, VerificationError};
