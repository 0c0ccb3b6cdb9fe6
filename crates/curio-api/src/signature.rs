//! Webhook signature verification.
//!
//! The provider signs every delivery with `provider-signature:
//! t=<unix>,v1=<hex>` where the hex value is HMAC-SHA256 over
//! `"{t}.{body}"`. Verification must pass before any side effect runs.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use curio_core::defaults;

type HmacSha256 = Hmac<Sha256>;

/// Signature verification configuration, from environment.
#[derive(Debug, Clone)]
pub struct SignatureConfig {
    /// Shared signing secret. Required unless verification is disabled.
    pub secret: Option<String>,
    /// Bypass flag for non-production use. Every bypassed request logs a
    /// warning.
    pub disabled: bool,
    /// Maximum accepted clock skew in seconds.
    pub tolerance_secs: i64,
}

impl SignatureConfig {
    pub fn from_env() -> Self {
        Self {
            secret: std::env::var(defaults::ENV_WEBHOOK_SECRET).ok(),
            disabled: std::env::var(defaults::ENV_WEBHOOK_SIGNATURE_DISABLED)
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            tolerance_secs: defaults::SIGNATURE_TOLERANCE_SECS,
        }
    }

    /// Verify a delivery. `header` is the raw `provider-signature` value,
    /// `now` the receiver's Unix time.
    pub fn verify(&self, header: Option<&str>, body: &[u8], now: i64) -> Result<(), RejectReason> {
        if self.disabled {
            warn!(
                subsystem = "api",
                component = "webhook",
                "Signature verification bypassed by configuration"
            );
            return Ok(());
        }
        let Some(secret) = &self.secret else {
            return Err(RejectReason::SecretNotConfigured);
        };
        let header = header.ok_or(RejectReason::MissingHeader)?;
        let (timestamp, signature) = parse_header(header)?;

        if (now - timestamp).abs() > self.tolerance_secs {
            return Err(RejectReason::TimestampOutOfTolerance);
        }

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| RejectReason::SecretNotConfigured)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);

        let expected = hex::decode(signature).map_err(|_| RejectReason::MalformedHeader)?;
        // verify_slice is constant-time.
        mac.verify_slice(&expected)
            .map_err(|_| RejectReason::SignatureMismatch)
    }
}

/// Why a delivery was rejected. Never echoed verbatim to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    SecretNotConfigured,
    MissingHeader,
    MalformedHeader,
    TimestampOutOfTolerance,
    SignatureMismatch,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecretNotConfigured => "secret_not_configured",
            Self::MissingHeader => "missing_header",
            Self::MalformedHeader => "malformed_header",
            Self::TimestampOutOfTolerance => "timestamp_out_of_tolerance",
            Self::SignatureMismatch => "signature_mismatch",
        }
    }
}

/// Parse `t=<unix>,v1=<hex>`.
fn parse_header(header: &str) -> Result<(i64, &str), RejectReason> {
    let mut timestamp = None;
    let mut signature = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signature = Some(value),
            _ => {}
        }
    }
    match (timestamp, signature) {
        (Some(t), Some(v1)) => Ok((t, v1)),
        _ => Err(RejectReason::MalformedHeader),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, timestamp: i64, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    fn config(secret: &str) -> SignatureConfig {
        SignatureConfig {
            secret: Some(secret.to_string()),
            disabled: false,
            tolerance_secs: defaults::SIGNATURE_TOLERANCE_SECS,
        }
    }

    #[test]
    fn test_valid_signature_accepted() {
        let body = br#"{"type":"video.asset.ready"}"#;
        let header = sign("whsec_test", 1_700_000_000, body);
        assert!(config("whsec_test")
            .verify(Some(&header), body, 1_700_000_000)
            .is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = sign("whsec_test", 1_700_000_000, b"original");
        assert_eq!(
            config("whsec_test").verify(Some(&header), b"tampered", 1_700_000_000),
            Err(RejectReason::SignatureMismatch)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = b"{}";
        let header = sign("whsec_other", 1_700_000_000, body);
        assert_eq!(
            config("whsec_test").verify(Some(&header), body, 1_700_000_000),
            Err(RejectReason::SignatureMismatch)
        );
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let body = b"{}";
        let timestamp = 1_700_000_000;
        let header = sign("whsec_test", timestamp, body);
        let now = timestamp + defaults::SIGNATURE_TOLERANCE_SECS + 1;
        assert_eq!(
            config("whsec_test").verify(Some(&header), body, now),
            Err(RejectReason::TimestampOutOfTolerance)
        );
    }

    #[test]
    fn test_future_timestamp_within_tolerance_accepted() {
        let body = b"{}";
        let timestamp = 1_700_000_100;
        let header = sign("whsec_test", timestamp, body);
        assert!(config("whsec_test")
            .verify(Some(&header), body, timestamp - 60)
            .is_ok());
    }

    #[test]
    fn test_missing_and_malformed_headers_rejected() {
        let cfg = config("whsec_test");
        assert_eq!(
            cfg.verify(None, b"{}", 1_700_000_000),
            Err(RejectReason::MissingHeader)
        );
        assert_eq!(
            cfg.verify(Some("v1=deadbeef"), b"{}", 1_700_000_000),
            Err(RejectReason::MalformedHeader)
        );
        assert_eq!(
            cfg.verify(Some("t=notanumber,v1=deadbeef"), b"{}", 1_700_000_000),
            Err(RejectReason::MalformedHeader)
        );
    }

    #[test]
    fn test_missing_secret_rejects_when_enabled() {
        let cfg = SignatureConfig {
            secret: None,
            disabled: false,
            tolerance_secs: 300,
        };
        assert_eq!(
            cfg.verify(Some("t=1,v1=aa"), b"{}", 1),
            Err(RejectReason::SecretNotConfigured)
        );
    }

    #[test]
    fn test_bypass_accepts_unsigned_request() {
        let cfg = SignatureConfig {
            secret: None,
            disabled: true,
            tolerance_secs: 300,
        };
        assert!(cfg.verify(None, b"{}", 1).is_ok());
    }
}
