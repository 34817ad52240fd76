//! Webhook delivery authentication via `X-Hub-Signature-256`.

use anyhow::{bail, Context, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Check the signature header against the raw delivery body.
///
/// The digest comparison runs in constant time inside the mac. Errors carry
/// neither key material nor the expected digest, so nothing useful leaks to
/// an unauthenticated sender.
pub fn verify_webhook_signature(payload: &[u8], header: &str, secret: &str) -> Result<()> {
    let claimed = header
        .trim()
        .strip_prefix(SIGNATURE_PREFIX)
        .context("delivery signature header must look like sha256=<hex>")?;
    let claimed = decode_digest(claimed)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .context("webhook secret was rejected by the mac")?;
    mac.update(payload);
    if mac.verify_slice(&claimed).is_err() {
        bail!("delivery signature does not match the payload");
    }
    Ok(())
}

/// Strict hex decode of the claimed digest, either case accepted.
fn decode_digest(hex: &str) -> Result<Vec<u8>> {
    let raw = hex.as_bytes();
    if raw.is_empty() || raw.len() % 2 != 0 {
        bail!("delivery signature digest is not valid hex");
    }
    raw.chunks_exact(2)
        .map(|pair| Ok(hex_nibble(pair[0])? << 4 | hex_nibble(pair[1])?))
        .collect()
}

fn hex_nibble(byte: u8) -> Result<u8> {
    match byte {
        b'0'..=b'9' => Ok(byte - b'0'),
        b'a'..=b'f' => Ok(byte - b'a' + 10),
        b'A'..=b'F' => Ok(byte - b'A' + 10),
        _ => bail!("delivery signature digest is not valid hex"),
    }
}
