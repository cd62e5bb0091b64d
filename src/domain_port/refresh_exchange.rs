use crate::application_port::RefreshError;
use crate::domain_model::*;

/// The remote credential-issuing endpoint.
#[async_trait::async_trait]
pub trait RefreshExchange: Send + Sync {
    async fn exchange(&self, refresh_token: &RefreshToken) -> Result<TokenPair, RefreshError>;
}
