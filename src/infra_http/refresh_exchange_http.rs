use crate::application_port::RefreshError;
use crate::domain_model::*;
use crate::domain_port::*;
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// `POST {refresh_path} {refreshToken}` straight through the transport, never
/// through the authenticated pipeline.
pub struct HttpRefreshExchange {
    transport: Arc<dyn Transport>,
    refresh_path: String,
}

impl HttpRefreshExchange {
    pub fn new(transport: Arc<dyn Transport>, refresh_path: impl Into<String>) -> Self {
        Self {
            transport,
            refresh_path: refresh_path.into(),
        }
    }
}

#[async_trait::async_trait]
impl RefreshExchange for HttpRefreshExchange {
    async fn exchange(&self, refresh_token: &RefreshToken) -> Result<TokenPair, RefreshError> {
        let body = serde_json::to_value(RefreshRequest {
            refresh_token: refresh_token.as_str(),
        })
        .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
        let request = OutboundRequest::post(self.refresh_path.as_str(), body).public();

        let response = self
            .transport
            .send(&request)
            .await
            .map_err(|e| match e {
                TransportError::Timeout => RefreshError::Timeout,
                other => RefreshError::Transport(other.to_string()),
            })?;

        if !response.is_success() {
            return Err(RefreshError::Rejected {
                status: response.status,
            });
        }

        let pair: TokenPair = response
            .json()
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
        if !pair.is_complete() {
            return Err(RefreshError::InvalidResponse(
                "token pair is missing a token".to_string(),
            ));
        }
        Ok(pair)
    }
}
