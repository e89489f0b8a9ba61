//! Push delivery signatures: HMAC-SHA1 over the raw request body.
//!
//! The host sends `X-Hub-Signature: sha1=<hex>`. Verification must run on the
//! exact bytes received, before any JSON parsing.

use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

const PREFIX: &str = "sha1=";

/// Decode a `sha1=<hex>` header into digest bytes. Prefix and hex digits are
/// matched case-insensitively. `None` for anything malformed.
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let header = header.trim();
    let prefix = header.get(..PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(PREFIX) {
        return None;
    }
    hex::decode(&header[PREFIX.len()..]).ok()
}

/// Header value for `body` signed with `secret`. `None` if the key is rejected.
pub fn compute_signature(secret: &[u8], body: &[u8]) -> Option<String> {
    let mut mac = HmacSha1::new_from_slice(secret).ok()?;
    mac.update(body);
    Some(format!("{PREFIX}{}", hex::encode(mac.finalize().into_bytes())))
}

/// Constant-time check of `header` against `body` and `secret`.
pub fn verify_signature(secret: &[u8], body: &[u8], header: &str) -> bool {
    let Some(expected) = parse_signature_header(header) else {
        return false;
    };
    let Ok(mut mac) = HmacSha1::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SECRET: &[u8] = b"It's a Secret to Everybody";
    const BODY: &[u8] = br#"{"ref":"refs/heads/main","repository":{"id":1}}"#;

    #[test]
    fn known_vector() {
        // RFC 2202 test case 2
        let sig = compute_signature(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(sig, "sha1=effcdf6ae5eb2fa2d27416d5f184df9c259a7c79");
    }

    #[test]
    fn accepts_own_signature_in_any_case() {
        let sig = compute_signature(SECRET, BODY).unwrap();
        assert!(verify_signature(SECRET, BODY, &sig));
        assert!(verify_signature(SECRET, BODY, &sig.to_uppercase()));
    }

    #[test]
    fn any_body_mutation_is_rejected() {
        let sig = compute_signature(SECRET, BODY).unwrap();
        for i in 0..BODY.len() {
            let mut tampered = BODY.to_vec();
            tampered[i] ^= 0x01;
            assert!(!verify_signature(SECRET, &tampered, &sig), "byte {i}");
        }
    }

    #[test]
    fn other_secret_is_rejected() {
        let sig = compute_signature(SECRET, BODY).unwrap();
        assert!(!verify_signature(b"another secret", BODY, &sig));
    }

    #[rstest]
    #[case("")]
    #[case("sha1=")]
    #[case("sha256=effcdf6ae5eb2fa2d27416d5f184df9c259a7c79")]
    #[case("effcdf6ae5eb2fa2d27416d5f184df9c259a7c79")]
    #[case("sha1=zz")]
    #[case("sha1=abc")]
    fn malformed_headers_never_verify(#[case] header: &str) {
        assert!(!verify_signature(SECRET, BODY, header));
    }

    #[test]
    fn parse_handles_prefix_case() {
        assert_eq!(parse_signature_header("SHA1=0aFF"), Some(vec![0x0a, 0xff]));
        assert_eq!(parse_signature_header("sha1"), None);
    }
}
