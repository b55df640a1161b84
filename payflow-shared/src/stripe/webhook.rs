/// Webhook signature verification
///
/// Stripe signs every webhook delivery with an HMAC-SHA256 over the raw
/// request body, carried in the `Stripe-Signature` header as
/// `t=<unix>,v1=<hex>[,v1=<hex>...]`. The signed payload is
/// `"{timestamp}.{body}"`, so neither the body nor the timestamp can be
/// replayed independently. Verification must happen on the raw bytes before
/// any JSON parsing.
///
/// # Security
///
/// - HMAC comparison is constant-time (`Mac::verify_slice`)
/// - The timestamp must be within a configurable tolerance window, which
///   bounds replay of captured deliveries
/// - Multiple `v1` entries are accepted so the endpoint keeps working while
///   the signing secret is being rotated
///
/// # Example
///
/// ```
/// use payflow_shared::stripe::webhook::{construct_event, signature_header};
///
/// let secret = "whsec_test";
/// let payload = br#"{"id":"evt_1","type":"account.updated","data":{"object":{"id":"acct_1"}}}"#;
/// let header = signature_header(payload, secret, chrono::Utc::now().timestamp());
///
/// let event = construct_event(payload, &header, secret, 300).unwrap();
/// assert_eq!(event.kind, "account.updated");
/// ```

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::types::Event;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Default replay tolerance, matching Stripe's SDK default
pub const DEFAULT_TOLERANCE_SECONDS: i64 = 300;

/// Error type for signature verification
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// Header missing, unparsable, or carrying no `v1` entry
    #[error("malformed signature header")]
    MalformedHeader,

    /// Signed timestamp outside the tolerance window
    #[error("signature timestamp outside tolerance")]
    TimestampOutOfTolerance,

    /// No candidate signature matched the payload
    #[error("signature mismatch")]
    Mismatch,

    /// Signature verified but the body is not a valid event
    #[error("malformed event payload: {0}")]
    MalformedPayload(String),
}

/// Verifies a `Stripe-Signature` header against the raw request body
///
/// # Errors
///
/// Returns [`SignatureError::MalformedHeader`] for an unparsable header,
/// [`SignatureError::TimestampOutOfTolerance`] for stale or future-dated
/// deliveries, and [`SignatureError::Mismatch`] when no signature matches.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_seconds: i64,
) -> Result<(), SignatureError> {
    let (timestamp, candidates) = parse_header(header)?;

    let age = chrono::Utc::now().timestamp() - timestamp;
    if age.abs() > tolerance_seconds {
        return Err(SignatureError::TimestampOutOfTolerance);
    }

    let signed_payload = signed_payload(payload, timestamp);

    for candidate in &candidates {
        let Ok(candidate) = hex::decode(candidate) else {
            continue;
        };

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| SignatureError::Mismatch)?;
        mac.update(&signed_payload);

        if mac.verify_slice(&candidate).is_ok() {
            return Ok(());
        }
    }

    Err(SignatureError::Mismatch)
}

/// Verifies the signature and decodes the event body
///
/// # Errors
///
/// As [`verify_signature`], plus [`SignatureError::MalformedPayload`] when
/// the verified body is not a valid event.
pub fn construct_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_seconds: i64,
) -> Result<Event, SignatureError> {
    verify_signature(payload, header, secret, tolerance_seconds)?;

    serde_json::from_slice(payload).map_err(|e| SignatureError::MalformedPayload(e.to_string()))
}

/// Produces a valid signature header for a payload
///
/// Used by the test suites and local delivery tooling; the scheme is exactly
/// what [`verify_signature`] checks.
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any size");
    mac.update(&signed_payload(payload, timestamp));

    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}

fn signed_payload(payload: &[u8], timestamp: i64) -> Vec<u8> {
    let mut signed = timestamp.to_string().into_bytes();
    signed.push(b'.');
    signed.extend_from_slice(payload);
    signed
}

/// Splits the header into its timestamp and the `v1` candidates
///
/// Unknown schemes (Stripe also sends `v0`) are ignored.
fn parse_header(header: &str) -> Result<(i64, Vec<&str>), SignatureError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for item in header.split(',') {
        let Some((key, value)) = item.trim().split_once('=') else {
            return Err(SignatureError::MalformedHeader);
        };

        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| SignatureError::MalformedHeader)?,
                );
            }
            "v1" => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if candidates.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }

    Ok((timestamp, candidates))
}
