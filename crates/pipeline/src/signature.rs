//! Webhook signature verification.
//!
//! Every scheme hashes the raw, unparsed request body bytes. Re-serializing a
//! parsed object is not byte-identical and would break verification, so the
//! public functions here only accept `&[u8]` and the JSON layer is reached
//! after verification succeeds.
//!
//! A provider with no configured secret always fails verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{PipelineError, PipelineResult};
use crate::event::Provider;

type HmacSha256 = Hmac<Sha256>;

/// Maximum allowed skew between the card processor's signed timestamp and the
/// local clock.
pub const STRIPE_TOLERANCE_SECS: i64 = 300;

/// Verify an inbound delivery against the provider's signing scheme.
///
/// `header` is the raw value of the provider's signature header, absent when
/// the request did not carry one.
pub fn verify(
    provider: Provider,
    raw_body: &[u8],
    header: Option<&str>,
    secret: Option<&str>,
) -> PipelineResult<()> {
    let header = header.ok_or(PipelineError::SignatureMissing)?;
    // Fail closed: an unconfigured secret never verifies.
    let secret = secret.ok_or(PipelineError::SignatureInvalid)?;

    match provider {
        Provider::Stripe => verify_stripe_at(
            raw_body,
            header,
            secret,
            time::OffsetDateTime::now_utc().unix_timestamp(),
        ),
        Provider::Gumroad | Provider::Payhip => verify_hex_digest(raw_body, header, secret),
    }
}

/// Card-processor scheme: header `t=<unix-ts>,v1=<hex>[,v1=<hex>...]`,
/// HMAC-SHA256 over `"<t>.<raw body>"`. Any `v1` candidate may match.
///
/// Takes `now` explicitly so the tolerance window is testable.
pub fn verify_stripe_at(
    raw_body: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> PipelineResult<()> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        let kv: Vec<&str> = part.splitn(2, '=').collect();
        if kv.len() != 2 {
            continue;
        }
        match kv[0].trim() {
            "t" => timestamp = kv[1].parse().ok(),
            "v1" => candidates.push(kv[1]),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(PipelineError::SignatureInvalid)?;
    if candidates.is_empty() {
        return Err(PipelineError::SignatureInvalid);
    }

    if (now - timestamp).abs() > STRIPE_TOLERANCE_SECS {
        tracing::warn!(
            timestamp = timestamp,
            now = now,
            "Webhook timestamp outside tolerance window"
        );
        return Err(PipelineError::SignatureInvalid);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PipelineError::SignatureInvalid)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(raw_body);
    let expected = hex::encode(mac.finalize().into_bytes());

    if candidates.iter().any(|sig| ct_eq_hex(sig, &expected)) {
        Ok(())
    } else {
        Err(PipelineError::SignatureInvalid)
    }
}

/// Marketplace scheme: header carries a single hex HMAC-SHA256 digest of the
/// raw body. Hex comparison is case-insensitive and constant-time.
pub fn verify_hex_digest(raw_body: &[u8], header: &str, secret: &str) -> PipelineResult<()> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PipelineError::SignatureInvalid)?;
    mac.update(raw_body);
    let expected = hex::encode(mac.finalize().into_bytes());

    if ct_eq_hex(header.trim(), &expected) {
        Ok(())
    } else {
        Err(PipelineError::SignatureInvalid)
    }
}

/// Body-embedded shared secret check, used only in
/// [`MarketplaceAuthMode::AllowBodySecret`](crate::config::MarketplaceAuthMode)
/// when the signature header is absent.
pub fn verify_body_secret(provided: &str, secret: &str) -> PipelineResult<()> {
    if provided.len() == secret.len()
        && bool::from(provided.as_bytes().ct_eq(secret.as_bytes()))
    {
        Ok(())
    } else {
        Err(PipelineError::SignatureInvalid)
    }
}

/// Constant-time, case-insensitive comparison of two hex strings.
fn ct_eq_hex(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let a = a.to_ascii_lowercase();
    let b = b.to_ascii_lowercase();
    bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}
