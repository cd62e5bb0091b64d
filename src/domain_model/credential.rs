use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Short-lived bearer credential attached to outbound calls.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(pub String);

/// Long-lived credential, only ever sent to the refresh endpoint.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshToken(pub String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl RefreshToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken(<{} bytes>)", self.0.len())
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefreshToken(<{} bytes>)", self.0.len())
    }
}

/// Token pair as returned by the credential-issuing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: AccessToken(access_token.into()),
            refresh_token: RefreshToken(refresh_token.into()),
        }
    }

    /// Both halves present. Partial pairs are never persisted.
    pub fn is_complete(&self) -> bool {
        !self.access_token.0.is_empty() && !self.refresh_token.0.is_empty()
    }
}

/// Persisted form of a credential pair, with its locally derived expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredential {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl StoredCredential {
    pub fn new(pair: TokenPair, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_at,
        }
    }

    /// True once `now` reaches `expires_at - skew`.
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        match self.expires_at.checked_sub_signed(skew) {
            Some(threshold) => now >= threshold,
            None => true,
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.access_token.0.is_empty() && !self.refresh_token.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let issued = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let credential =
            StoredCredential::new(TokenPair::new("a", "r"), issued + Duration::seconds(900));
        let skew = Duration::seconds(30);

        assert!(!credential.is_expired_at(issued + Duration::milliseconds(869_999), skew));
        assert!(credential.is_expired_at(issued + Duration::seconds(870), skew));
        assert!(credential.is_expired_at(issued + Duration::seconds(890), skew));
    }

    #[test]
    fn test_stored_credential_wire_format() {
        let expires_at = Utc.timestamp_millis_opt(1_700_000_900_000).unwrap();
        let credential = StoredCredential::new(TokenPair::new("a1", "r1"), expires_at);

        let json = serde_json::to_value(&credential).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "accessToken": "a1",
                "refreshToken": "r1",
                "expiresAt": 1_700_000_900_000i64,
            })
        );
    }

    #[test]
    fn test_debug_does_not_leak_tokens() {
        let pair = TokenPair::new("secret-access", "secret-refresh");
        let rendered = format!("{:?}", pair);
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_partial_pair_is_incomplete() {
        assert!(!TokenPair::new("", "r").is_complete());
        assert!(!TokenPair::new("a", "").is_complete());
        assert!(TokenPair::new("a", "r").is_complete());
    }
}
