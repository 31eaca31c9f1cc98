//! Token manager - caches a SAS token and renews it before it runs out

use greenhouse_shared::sas::{self, SasError};
use greenhouse_shared::{now_secs, timing, DescriptorError, HubCredentials};
use tracing::debug;

/// A signed token and the second it stops being valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    /// Unix seconds
    pub expires_at: u64,
}

impl AccessToken {
    /// Seconds of validity left at `now`
    pub fn remaining_at(&self, now: u64) -> u64 {
        self.expires_at.saturating_sub(now)
    }
}

/// Owns the hub credentials and the one token derived from them
#[derive(Debug)]
pub struct TokenManager {
    credentials: HubCredentials,
    ttl_secs: u64,
    current: Option<AccessToken>,
}

impl TokenManager {
    /// Parse a `HostName=..;SharedAccessKeyName=..;SharedAccessKey=..`
    /// descriptor
    pub fn new(descriptor: &str) -> Result<Self, DescriptorError> {
        Ok(Self::from_credentials(HubCredentials::parse(descriptor)?))
    }

    pub fn from_credentials(credentials: HubCredentials) -> Self {
        Self {
            credentials,
            ttl_secs: timing::TOKEN_TTL_SECS,
            current: None,
        }
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self.current = None;
        self
    }

    pub fn credentials(&self) -> &HubCredentials {
        &self.credentials
    }

    /// Sign a fresh token valid for the configured lifetime from `now`
    pub fn generate_at(&self, now: u64) -> Result<AccessToken, SasError> {
        let expires_at = now + self.ttl_secs;
        Ok(AccessToken {
            value: sas::build_token(&self.credentials, expires_at)?,
            expires_at,
        })
    }

    pub fn current_token(&mut self) -> Result<AccessToken, SasError> {
        self.current_token_at(now_secs())
    }

    /// The cached token while at least the minimum validity remains,
    /// otherwise a new one
    pub fn current_token_at(&mut self, now: u64) -> Result<AccessToken, SasError> {
        if let Some(token) = &self.current {
            if token.remaining_at(now) >= timing::TOKEN_MIN_REMAINING_SECS {
                return Ok(token.clone());
            }
        }

        let token = self.generate_at(now)?;
        debug!(
            host = %self.credentials.host_name,
            expires_at = token.expires_at,
            "token renewed"
        );
        self.current = Some(token.clone());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenhouse_shared::sas::verify_token;

    const DESCRIPTOR: &str =
        "HostName=greenhouse.example.net;SharedAccessKeyName=service;SharedAccessKey=c2VjcmV0LWtleQ==";
    const T0: u64 = 1_700_000_000;

    #[test]
    fn test_descriptor_fields_required() {
        assert!(TokenManager::new(DESCRIPTOR).is_ok());
        for broken in [
            "SharedAccessKeyName=service;SharedAccessKey=c2VjcmV0",
            "HostName=h;SharedAccessKey=c2VjcmV0",
            "HostName=h;SharedAccessKeyName=service",
            "HostName=foo;SharedAccessKey=bar",
        ] {
            assert!(
                matches!(TokenManager::new(broken), Err(DescriptorError::InvalidDescriptor(_))),
                "{broken} should be rejected"
            );
        }
    }

    #[test]
    fn test_fresh_token_lives_for_ttl() {
        let manager = TokenManager::new(DESCRIPTOR).unwrap();
        let token = manager.generate_at(T0).unwrap();
        assert_eq!(token.expires_at - T0, 3600);
        assert!(token.value.starts_with("SharedAccessSignature sr=greenhouse.example.net&sig="));
        assert!(token.value.ends_with(&format!("&se={}&skn=service", T0 + 3600)));

        verify_token(&token.value, manager.credentials(), T0).unwrap();
    }

    #[test]
    fn test_same_instant_same_token() {
        let mut manager = TokenManager::new(DESCRIPTOR).unwrap();
        let first = manager.current_token_at(T0).unwrap();
        let second = manager.current_token_at(T0).unwrap();
        assert_eq!(first.value, second.value);

        // Signing is deterministic, so a second manager agrees byte for byte.
        let mut other = TokenManager::new(DESCRIPTOR).unwrap();
        assert_eq!(other.current_token_at(T0).unwrap().value, first.value);
    }

    #[test]
    fn test_reuse_until_minimum_validity() {
        let mut manager = TokenManager::new(DESCRIPTOR).unwrap();
        let first = manager.current_token_at(T0).unwrap();

        // Exactly 300 seconds left still counts as valid.
        let at_boundary = manager.current_token_at(T0 + 3300).unwrap();
        assert_eq!(at_boundary, first);

        let renewed = manager.current_token_at(T0 + 3301).unwrap();
        assert_ne!(renewed, first);
        assert_eq!(renewed.expires_at, T0 + 3301 + 3600);

        // The renewed token is now the cached one.
        assert_eq!(manager.current_token_at(T0 + 3302).unwrap(), renewed);
    }

    #[test]
    fn test_expired_cache_is_replaced() {
        let mut manager = TokenManager::new(DESCRIPTOR).unwrap().with_ttl(60);
        let first = manager.current_token_at(T0).unwrap();
        // A 60 s token never has 300 s left, so every call renews.
        let second = manager.current_token_at(T0 + 1).unwrap();
        assert_ne!(first, second);
        assert_eq!(second.expires_at, T0 + 61);
    }
}
