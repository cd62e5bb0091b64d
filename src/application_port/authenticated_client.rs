use crate::application_port::{CredentialStoreError, RefreshError};
use crate::domain_model::*;
use crate::domain_port::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no credential available")]
    NoCredential,
    #[error("credential rejected by server (status {})", .0.status)]
    AuthRejectedByServer(ApiResponse),
    #[error("session ended: {0}")]
    RefreshExchangeFailed(#[from] RefreshError),
    #[error("refreshed credential rejected (status {})", .0.status)]
    RetryExhausted(ApiResponse),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("request failed with status {}", .0.status)]
    Status(ApiResponse),
    #[error(transparent)]
    Store(#[from] CredentialStoreError),
}

impl PipelineError {
    /// The failing response, if the server answered at all.
    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            PipelineError::AuthRejectedByServer(r)
            | PipelineError::RetryExhausted(r)
            | PipelineError::Status(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_session_ended(&self) -> bool {
        matches!(self, PipelineError::RefreshExchangeFailed(_))
    }
}

#[async_trait::async_trait]
pub trait AuthenticatedClient: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<ApiResponse, PipelineError>;
    /// A credential is present and not yet due for refresh.
    async fn is_authenticated(&self) -> bool;
}
