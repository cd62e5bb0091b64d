use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

pub const CREDENTIAL_KEY: &str = "auth_tokens";

/// Where a freshly stored pair gets its expiry from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirySource {
    /// Issuance time plus the configured lifetime.
    Fixed,
    /// The access token's own `exp` claim, falling back to `Fixed`.
    TokenClaim,
}

impl std::str::FromStr for ExpirySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(ExpirySource::Fixed),
            "token_claim" => Ok(ExpirySource::TokenClaim),
            other => Err(format!("unknown expiry source: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CredentialPolicy {
    pub lifetime: Duration,
    pub refresh_skew: Duration,
    pub expiry_source: ExpirySource,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            lifetime: Duration::minutes(15),
            refresh_skew: Duration::seconds(30),
            expiry_source: ExpirySource::Fixed,
        }
    }
}

pub struct SessionCredentialStore {
    storage: Arc<dyn SessionStorage>,
    clock: Arc<dyn Clock>,
    policy: CredentialPolicy,
}

impl SessionCredentialStore {
    pub fn new(
        storage: Arc<dyn SessionStorage>,
        clock: Arc<dyn Clock>,
        policy: CredentialPolicy,
    ) -> Self {
        Self {
            storage,
            clock,
            policy,
        }
    }

    fn expires_at(
        &self,
        pair: &TokenPair,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, CredentialStoreError> {
        if self.policy.expiry_source == ExpirySource::TokenClaim {
            if let Some(claimed) = token_claim_expiry(&pair.access_token) {
                return Ok(claimed);
            }
        }
        now.checked_add_signed(self.policy.lifetime)
            .ok_or(CredentialStoreError::ExpiryOutOfRange(self.policy.lifetime))
    }

    async fn discard(&self) -> Result<(), CredentialStoreError> {
        self.storage.remove(CREDENTIAL_KEY).await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: i64,
}

// The signature is the server's business; only the claim is read here.
fn token_claim_expiry(token: &AccessToken) -> Option<DateTime<Utc>> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    let data = decode::<ExpiryClaim>(token.as_str(), &DecodingKey::from_secret(&[]), &validation)
        .ok()?;
    Utc.timestamp_opt(data.claims.exp, 0).single()
}

#[async_trait::async_trait]
impl CredentialStore for SessionCredentialStore {
    async fn set(&self, pair: TokenPair) -> Result<StoredCredential, CredentialStoreError> {
        if !pair.is_complete() {
            return Err(CredentialStoreError::IncompletePair);
        }
        let now = self.clock.now();
        let expires_at = self.expires_at(&pair, now)?;
        let credential = StoredCredential::new(pair, expires_at);
        let serialized = serde_json::to_string(&credential)?;
        self.storage.set(CREDENTIAL_KEY, &serialized).await?;
        debug!(%expires_at, "credential stored");
        Ok(credential)
    }

    async fn current(&self) -> Result<Option<StoredCredential>, CredentialStoreError> {
        let Some(raw) = self.storage.get(CREDENTIAL_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<StoredCredential>(&raw) {
            Ok(credential) if credential.is_complete() => Ok(Some(credential)),
            Ok(_) => {
                warn!("discarding incomplete stored credential");
                self.discard().await?;
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "discarding unreadable stored credential");
                self.discard().await?;
                Ok(None)
            }
        }
    }

    async fn clear(&self) -> Result<(), CredentialStoreError> {
        self.discard().await?;
        debug!("credential cleared");
        Ok(())
    }

    fn is_stale(&self, credential: &StoredCredential) -> bool {
        credential.is_expired_at(self.clock.now(), self.policy.refresh_skew)
    }
}
