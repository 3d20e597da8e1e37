//! Webhook signature scheme.
//!
//! The provider signs each delivery with a header of the form
//! `t=<unix seconds>,v1=<hex signature>[,v1=<hex signature>...]`, where each
//! signature is `HMAC-SHA256(secret, "<t>.<raw body>")`. Several `v1` entries
//! appear while the provider rotates secrets.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::PaymentError;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted distance between the signed timestamp and now.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

fn mac_for(payload: &[u8], secret: &str, timestamp: i64) -> Result<HmacSha256, PaymentError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::SignatureInvalid(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Builds the signature header for `payload` signed at `timestamp`.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, PaymentError> {
    let digest = mac_for(payload, secret, timestamp)?.finalize().into_bytes();
    Ok(format!("t={timestamp},v1={}", hex::encode(digest)))
}

/// Verifies a signature header against `payload`.
///
/// Fails if the header is unparsable, the timestamp is further than
/// `tolerance_secs` from `now`, or no `v1` entry matches. The comparison is
/// constant-time.
pub fn verify(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), PaymentError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(value.parse::<i64>().map_err(|_| {
                    PaymentError::SignatureInvalid("unparsable timestamp".to_string())
                })?);
            }
            "v1" => {
                // Entries that are not hex can never match; skip them.
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| PaymentError::SignatureInvalid("missing timestamp".to_string()))?;

    if signatures.is_empty() {
        return Err(PaymentError::SignatureInvalid(
            "no v1 signature present".to_string(),
        ));
    }

    if now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(PaymentError::SignatureInvalid(
            "timestamp outside tolerance".to_string(),
        ));
    }

    for signature in &signatures {
        if mac_for(payload, secret, timestamp)?
            .verify_slice(signature)
            .is_ok()
        {
            return Ok(());
        }
    }

    Err(PaymentError::SignatureInvalid(
        "no matching signature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_700_000_000;

    fn assert_invalid(result: Result<(), PaymentError>, reason: &str) {
        match result {
            Err(PaymentError::SignatureInvalid(r)) => assert_eq!(r, reason),
            other => panic!("expected SignatureInvalid({reason}), got {other:?}"),
        }
    }

    #[test]
    fn test_sign_then_verify() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, SECRET, NOW).unwrap();
        assert!(header.starts_with(&format!("t={NOW},v1=")));
        verify(payload, &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW + 10).unwrap();
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let header = sign(br#"{"amount":100}"#, SECRET, NOW).unwrap();
        assert_invalid(
            verify(br#"{"amount":999}"#, &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW),
            "no matching signature",
        );
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let payload = b"{}";
        let header = sign(payload, "whsec_other", NOW).unwrap();
        assert_invalid(
            verify(payload, &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW),
            "no matching signature",
        );
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let payload = b"{}";
        let header = sign(payload, SECRET, NOW).unwrap();
        assert_invalid(
            verify(payload, &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW + 301),
            "timestamp outside tolerance",
        );
    }

    #[test]
    fn test_any_matching_v1_entry_is_accepted() {
        let payload = b"{}";
        let good = sign(payload, SECRET, NOW).unwrap();
        let good_sig = good.split_once(",v1=").unwrap().1;
        let header = format!("t={NOW},v1=deadbeef,v1=zz-not-hex,v1={good_sig}");
        verify(payload, &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW).unwrap();
    }

    #[test]
    fn test_malformed_headers() {
        assert_invalid(
            verify(b"{}", "v1=abcd", SECRET, DEFAULT_TOLERANCE_SECS, NOW),
            "missing timestamp",
        );
        assert_invalid(
            verify(b"{}", &format!("t={NOW}"), SECRET, DEFAULT_TOLERANCE_SECS, NOW),
            "no v1 signature present",
        );
        assert_invalid(
            verify(b"{}", "t=soon,v1=abcd", SECRET, DEFAULT_TOLERANCE_SECS, NOW),
            "unparsable timestamp",
        );
        assert_invalid(
            verify(b"{}", "", SECRET, DEFAULT_TOLERANCE_SECS, NOW),
            "missing timestamp",
        );
        assert_invalid(
            verify(
                b"{}",
                &format!("t={},v1=00", i64::MIN),
                SECRET,
                DEFAULT_TOLERANCE_SECS,
                NOW,
            ),
            "timestamp outside tolerance",
        );
        assert_invalid(
            verify(
                b"{}",
                &format!("t={},v1=00", i64::MAX),
                SECRET,
                DEFAULT_TOLERANCE_SECS,
                NOW,
            ),
            "timestamp outside tolerance",
        );
    }
}
