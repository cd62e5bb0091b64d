use crate::application_port::{CredentialStoreError, PipelineError};
use crate::domain_model::*;
use tokio::sync::watch;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("request failed: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("credential store error: {0}")]
    Store(#[from] CredentialStoreError),
    #[error("server returned an incomplete token pair")]
    MissingToken,
    #[error("invalid response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

#[async_trait::async_trait]
pub trait AccountService: Send + Sync {
    async fn login(&self, input: LoginInput) -> Result<User, AccountError>;
    async fn register(&self, input: RegisterInput) -> Result<User, AccountError>;
    async fn logout(&self) -> Result<(), AccountError>;
    async fn load_current_user(&self) -> Result<Option<User>, AccountError>;
    /// Restore the user from a stored credential; a failed restore clears it.
    async fn initialize_current_user(&self) -> Result<Option<User>, AccountError>;
    async fn check_email_exists(&self, email: &str) -> Result<bool, AccountError>;
    fn current_user(&self) -> Option<User>;
    fn subscribe_current_user(&self) -> watch::Receiver<Option<User>>;
}
