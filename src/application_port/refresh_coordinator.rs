use crate::domain_model::AccessToken;

/// Outcome of one refresh cycle, shared by every caller admitted to it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("no refresh token available")]
    NoRefreshToken,
    #[error("refresh token rejected with status {status}")]
    Rejected { status: u16 },
    #[error("refresh exchange failed: {0}")]
    Transport(String),
    #[error("refresh exchange timed out")]
    Timeout,
    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),
    #[error("credential store error: {0}")]
    Store(String),
    #[error("refresh cycle abandoned")]
    Abandoned,
}

#[async_trait::async_trait]
pub trait RefreshCoordinator: Send + Sync {
    /// Obtain a credential newer than `current`, running at most one remote
    /// exchange at a time. Concurrent callers share the outcome of the cycle
    /// in flight.
    async fn ensure_fresh_credential(
        &self,
        current: Option<&AccessToken>,
    ) -> Result<AccessToken, RefreshError>;

    fn is_refreshing(&self) -> bool;
}
