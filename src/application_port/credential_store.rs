use crate::domain_model::*;
use crate::domain_port::SessionStorageError;

#[derive(Debug, thiserror::Error)]
pub enum CredentialStoreError {
    #[error("refusing to store an incomplete token pair")]
    IncompletePair,
    #[error("credential lifetime of {0} overflows the clock")]
    ExpiryOutOfRange(chrono::Duration),
    #[error("store error: {0}")]
    Store(#[from] SessionStorageError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Store `pair`, stamping its expiry. Overwrites any existing pair.
    async fn set(&self, pair: TokenPair) -> Result<StoredCredential, CredentialStoreError>;
    /// Current credential, or `None` if absent or unreadable.
    async fn current(&self) -> Result<Option<StoredCredential>, CredentialStoreError>;
    /// Idempotent.
    async fn clear(&self) -> Result<(), CredentialStoreError>;
    /// Whether `credential` is past its refresh threshold.
    fn is_stale(&self, credential: &StoredCredential) -> bool;

    async fn access_token(&self) -> Result<Option<AccessToken>, CredentialStoreError> {
        Ok(self.current().await?.map(|c| c.access_token))
    }

    async fn refresh_token(&self) -> Result<Option<RefreshToken>, CredentialStoreError> {
        Ok(self.current().await?.map(|c| c.refresh_token))
    }

    /// True if nothing is stored or the stored pair is stale.
    async fn is_expired(&self) -> Result<bool, CredentialStoreError> {
        Ok(match self.current().await? {
            Some(credential) => self.is_stale(&credential),
            None => true,
        })
    }
}
