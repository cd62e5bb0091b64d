use crate::domain_model::*;

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Dispatch `request` as-is. Any HTTP status is a successful dispatch;
    /// only failures to obtain a response are errors.
    async fn send(&self, request: &OutboundRequest) -> Result<ApiResponse, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
