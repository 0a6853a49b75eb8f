//! Slack request signing (`v0` HMAC-SHA256 over `v0:{timestamp}:{body}`).

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_VERSION: &str = "v0";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const MAX_TIMESTAMP_SKEW_SECS: u64 = 60 * 5;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing `{0}` header")]
    MissingHeader(&'static str),
    #[error("request timestamp is not a unix time")]
    InvalidTimestamp,
    #[error("request timestamp is outside the replay window")]
    StaleTimestamp,
    #[error("signature is not a `v0=` hex digest")]
    Malformed,
    #[error("signing secret cannot key HMAC-SHA256")]
    InvalidKey,
    #[error("signature does not match request body")]
    Mismatch,
}

/// Produces the header value Slack would send for `body`.
#[cfg(test)]
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
    let mac = keyed_mac(secret, timestamp, body)?;
    Ok(format!("{SIGNATURE_VERSION}={}", hex::encode(mac.finalize().into_bytes())))
}

/// Checks the replay window first, then compares digests in constant time.
pub fn verify(
    secret: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
    now_unix: i64,
) -> Result<(), SignatureError> {
    let timestamp = timestamp.ok_or(SignatureError::MissingHeader(TIMESTAMP_HEADER))?;
    let signature = signature.ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?;

    let issued_at = timestamp.trim().parse::<i64>().map_err(|_| SignatureError::InvalidTimestamp)?;
    if now_unix.abs_diff(issued_at) > MAX_TIMESTAMP_SKEW_SECS {
        return Err(SignatureError::StaleTimestamp);
    }

    let digest = signature
        .strip_prefix(SIGNATURE_VERSION)
        .and_then(|rest| rest.strip_prefix('='))
        .ok_or(SignatureError::Malformed)?;
    let expected = hex::decode(digest).map_err(|_| SignatureError::Malformed)?;

    keyed_mac(secret, timestamp, body)?.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
}

fn keyed_mac(secret: &str, timestamp: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(mac)
}
