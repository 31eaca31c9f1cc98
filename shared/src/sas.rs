//! Shared access signature (SAS) tokens
//!
//! A token is a form-urlencoded query prefixed with a scheme label:
//! ```text
//! SharedAccessSignature sr=<resource>&sig=<base64 hmac>&se=<expiry>&skn=<policy>
//! ```
//! The signature is HMAC-SHA256 over `urlencode(resource) + "\n" + expiry`,
//! keyed by the base64-decoded shared access key.

use crate::descriptor::HubCredentials;
use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use url::form_urlencoded;

type HmacSha256 = Hmac<Sha256>;

/// Scheme label in front of every token
pub const SCHEME: &str = "SharedAccessSignature";

/// Errors while signing or checking a token
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SasError {
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token expired at {0}")]
    Expired(u64),

    #[error("Token was issued for resource {0}")]
    ResourceMismatch(String),

    #[error("Token was issued for policy {0}")]
    PolicyMismatch(String),

    #[error("Token signature does not match")]
    SignatureMismatch,

    #[error("Signing key rejected")]
    InvalidKey,
}

/// Fields of a parsed token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SasToken {
    pub resource: String,
    pub signature: String,
    pub expires: u64,
    pub key_name: Option<String>,
}

/// Form-urlencode one component (space as `+`, `/` as `%2F`)
pub fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn mac_for(resource: &str, key: &[u8], expires: u64) -> Result<HmacSha256, SasError> {
    let string_to_sign = format!("{}\n{}", encode_component(resource), expires);
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SasError::InvalidKey)?;
    mac.update(string_to_sign.as_bytes());
    Ok(mac)
}

/// Compute the base64 signature for `resource` valid until `expires`
pub fn sign(resource: &str, key: &[u8], expires: u64) -> Result<String, SasError> {
    let mac = mac_for(resource, key, expires)?;
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

/// Build a complete token string for the hub named in `credentials`
pub fn build_token(credentials: &HubCredentials, expires: u64) -> Result<String, SasError> {
    let signature = sign(&credentials.host_name, credentials.key(), expires)?;
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("sr", &credentials.host_name)
        .append_pair("sig", &signature)
        .append_pair("se", &expires.to_string())
        .append_pair("skn", &credentials.policy_name)
        .finish();
    Ok(format!("{SCHEME} {query}"))
}

impl SasToken {
    /// Parse a token string (with its scheme label)
    pub fn parse(token: &str) -> Result<Self, SasError> {
        let query = token
            .trim()
            .strip_prefix(SCHEME)
            .map(str::trim_start)
            .ok_or_else(|| SasError::Malformed(format!("missing {SCHEME} scheme")))?;

        let mut resource = None;
        let mut signature = None;
        let mut expires = None;
        let mut key_name = None;

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.to_ascii_lowercase().as_str() {
                "sr" => resource = Some(value.into_owned()),
                "sig" => signature = Some(value.into_owned()),
                "se" => {
                    let parsed = value
                        .parse::<u64>()
                        .map_err(|_| SasError::Malformed(format!("bad expiry '{value}'")))?;
                    expires = Some(parsed);
                }
                "skn" => key_name = Some(value.into_owned()),
                _ => {}
            }
        }

        Ok(Self {
            resource: resource.ok_or_else(|| SasError::Malformed("missing sr".into()))?,
            signature: signature.ok_or_else(|| SasError::Malformed("missing sig".into()))?,
            expires: expires.ok_or_else(|| SasError::Malformed("missing se".into()))?,
            key_name,
        })
    }

    /// Check the token against the hub credentials at time `now_secs`
    pub fn verify(&self, credentials: &HubCredentials, now_secs: u64) -> Result<(), SasError> {
        if !self.resource.eq_ignore_ascii_case(&credentials.host_name) {
            return Err(SasError::ResourceMismatch(self.resource.clone()));
        }
        if let Some(ref name) = self.key_name {
            if name != &credentials.policy_name {
                return Err(SasError::PolicyMismatch(name.clone()));
            }
        }
        if self.expires <= now_secs {
            return Err(SasError::Expired(self.expires));
        }

        let provided = BASE64_STANDARD
            .decode(&self.signature)
            .map_err(|_| SasError::SignatureMismatch)?;
        mac_for(&self.resource, credentials.key(), self.expires)?
            .verify_slice(&provided)
            .map_err(|_| SasError::SignatureMismatch)
    }
}

/// Parse and verify in one step
pub fn verify_token(token: &str, credentials: &HubCredentials, now_secs: u64) -> Result<SasToken, SasError> {
    let parsed = SasToken::parse(token)?;
    parsed.verify(credentials, now_secs)?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> HubCredentials {
        HubCredentials::parse(
            "HostName=greenhouse.example.net;SharedAccessKeyName=service;SharedAccessKey=c2VjcmV0LWtleQ==",
        )
        .unwrap()
    }

    #[test]
    fn test_encode_component_is_form_encoding() {
        assert_eq!(encode_component("a b/c"), "a+b%2Fc");
        assert_eq!(encode_component("greenhouse.example.net"), "greenhouse.example.net");
    }

    #[test]
    fn test_token_layout() {
        let token = build_token(&credentials(), 1_700_003_600).unwrap();
        assert!(token.starts_with("SharedAccessSignature sr=greenhouse.example.net&sig="));
        assert!(token.ends_with("&se=1700003600&skn=service"));
    }

    #[test]
    fn test_signature_is_deterministic() {
        let key = credentials();
        let a = sign("greenhouse.example.net", key.key(), 42).unwrap();
        let b = sign("greenhouse.example.net", key.key(), 42).unwrap();
        let c = sign("greenhouse.example.net", key.key(), 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_parse_round_trips_signature_with_padding() {
        let token = build_token(&credentials(), 5_000).unwrap();
        let parsed = SasToken::parse(&token).unwrap();
        assert_eq!(parsed.resource, "greenhouse.example.net");
        assert_eq!(parsed.expires, 5_000);
        assert_eq!(parsed.key_name.as_deref(), Some("service"));
        assert_eq!(parsed.signature, sign("greenhouse.example.net", credentials().key(), 5_000).unwrap());
    }

    #[test]
    fn test_verify_accepts_own_token() {
        let token = build_token(&credentials(), 2_000).unwrap();
        assert!(verify_token(&token, &credentials(), 1_000).is_ok());
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let token = build_token(&credentials(), 2_000).unwrap();
        assert_eq!(
            verify_token(&token, &credentials(), 2_000),
            Err(SasError::Expired(2_000))
        );
    }

    #[test]
    fn test_verify_rejects_tampered_expiry() {
        let token = build_token(&credentials(), 2_000).unwrap();
        let tampered = token.replace("se=2000", "se=9000");
        assert_eq!(
            verify_token(&tampered, &credentials(), 1_000),
            Err(SasError::SignatureMismatch)
        );
    }

    #[test]
    fn test_verify_rejects_other_policy_and_key() {
        let other = HubCredentials::parse(
            "HostName=greenhouse.example.net;SharedAccessKeyName=device;SharedAccessKey=b3RoZXI=",
        )
        .unwrap();
        let token = build_token(&other, 2_000).unwrap();
        assert_eq!(
            verify_token(&token, &credentials(), 1_000),
            Err(SasError::PolicyMismatch("device".into()))
        );
    }

    #[test]
    fn test_parse_requires_scheme() {
        assert!(matches!(
            SasToken::parse("sr=a&sig=b&se=1"),
            Err(SasError::Malformed(_))
        ));
    }
}
