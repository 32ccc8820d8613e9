use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Characters left verbatim when encoding token query values: the RFC 3986
/// unreserved set.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Same as [`QUERY_VALUE`] plus `/`, used for the URI inside the sign-string.
const SIGNED_URI: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Errors raised while computing a shared access signature
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Shared access key is not valid base64: {0}")]
    InvalidKey(#[from] base64::DecodeError),

    #[error("Shared access key rejected by HMAC: {0}")]
    KeyLength(#[from] hmac::digest::InvalidLength),
}

/// Build a `SharedAccessSignature` token for `uri` valid for `expiry_secs`
/// from now. The key is the base64-encoded hub access key; `policy_name`
/// adds an `skn` field when present.
pub fn sas_token(
    uri: &str,
    key: &str,
    policy_name: Option<&str>,
    expiry_secs: u64,
) -> Result<String, TokenError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    sas_token_at(uri, key, policy_name, expiry_secs, now)
}

/// Deterministic core of [`sas_token`]; `now` is seconds since the epoch.
///
/// The sign-string is `<url-encoded uri>\n<expiry>`, signed with HMAC-SHA256
/// keyed by the decoded access key.
pub fn sas_token_at(
    uri: &str,
    key: &str,
    policy_name: Option<&str>,
    expiry_secs: u64,
    now: u64,
) -> Result<String, TokenError> {
    let expiry = now + expiry_secs;
    let sign_data = format!("{}\n{}", utf8_percent_encode(uri, SIGNED_URI), expiry);

    let key_bytes = STANDARD.decode(key)?;
    let mut mac = HmacSha256::new_from_slice(&key_bytes)?;
    mac.update(sign_data.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    let mut fields = vec![
        ("sr", uri.to_string()),
        ("sig", signature),
        ("se", expiry.to_string()),
    ];
    if let Some(policy) = policy_name {
        fields.push(("skn", policy.to_string()));
    }

    let query = fields
        .iter()
        .map(|(name, value)| format!("{}={}", name, utf8_percent_encode(value, QUERY_VALUE)))
        .collect::<Vec<_>>()
        .join("&");

    Ok(format!("SharedAccessSignature {}", query))
}

#[cfg(test)]
mod tests {
    use super::*;

    const URI: &str = "myhub.azure-devices.net";
    const NOW: u64 = 1_600_000_000;

    fn test_key() -> String {
        STANDARD.encode(b"super-secret-device-key")
    }

    #[test]
    fn test_token_is_deterministic() {
        let key = test_key();
        let first = sas_token_at(URI, &key, Some("iothubowner"), 3600, NOW).unwrap();
        let second = sas_token_at(URI, &key, Some("iothubowner"), 3600, NOW).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_token_shape_and_field_order() {
        let key = test_key();
        let token = sas_token_at(URI, &key, Some("iothubowner"), 3600, NOW).unwrap();

        assert!(token.starts_with("SharedAccessSignature "));
        let query = token.trim_start_matches("SharedAccessSignature ");
        let names: Vec<_> = query
            .split('&')
            .map(|field| field.split('=').next().unwrap())
            .collect();
        assert_eq!(names, ["sr", "sig", "se", "skn"]);
        assert!(query.contains(&format!("se={}", NOW + 3600)));
        assert!(query.ends_with("skn=iothubowner"));
    }

    #[test]
    fn test_policy_name_is_optional() {
        let key = test_key();
        let token = sas_token_at(URI, &key, None, 60, NOW).unwrap();
        assert!(!token.contains("skn="));
        assert!(token.contains("se="));
    }

    #[test]
    fn test_signature_matches_recomputed_hmac() {
        let key = test_key();
        let token = sas_token_at(URI, &key, None, 60, NOW).unwrap();

        // Recompute the signature over the documented sign-string.
        let sign_data = format!("{}\n{}", URI, NOW + 60);
        let mut mac = HmacSha256::new_from_slice(&STANDARD.decode(&key).unwrap()).unwrap();
        mac.update(sign_data.as_bytes());
        let expected = STANDARD.encode(mac.finalize().into_bytes());
        let expected_encoded = utf8_percent_encode(&expected, QUERY_VALUE).to_string();

        let sig = token
            .split('&')
            .find(|field| field.starts_with("sig="))
            .unwrap()
            .trim_start_matches("sig=");
        assert_eq!(sig, expected_encoded);
    }

    #[test]
    fn test_invalid_key_is_rejected() {
        let result = sas_token_at(URI, "not base64!!", None, 60, NOW);
        assert!(matches!(result, Err(TokenError::InvalidKey(_))));
    }
}
