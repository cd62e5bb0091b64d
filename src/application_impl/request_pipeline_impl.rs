use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use tracing::{Instrument, debug, info_span, trace};

/// Where an outbound call stands. Only used for tracing; the transitions
/// live in `RequestPipeline::drive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Sent,
    Succeeded,
    AuthRejected,
    Refreshing,
    Retried,
    OtherFailure,
}

/// One call on its way through the pipeline.
struct OutboundCall {
    request: OutboundRequest,
    /// Set once the call has been through a refresh cycle. A second
    /// rejection after that is final.
    retried: bool,
    state: RequestState,
}

impl OutboundCall {
    fn new(request: OutboundRequest) -> Self {
        Self {
            request,
            retried: false,
            state: RequestState::Pending,
        }
    }

    fn enter(&mut self, state: RequestState) {
        trace!(from = ?self.state, to = ?state, "request state");
        self.state = state;
    }

    fn prepared(&self, token: Option<&AccessToken>) -> OutboundRequest {
        match token {
            Some(token) => self.request.with_bearer(token),
            None => self.request.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Requests to this path never trigger a refresh.
    pub refresh_path: String,
    /// Refresh before sending when the stored credential is already stale.
    pub proactive_refresh: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            refresh_path: "Accounts/refresh".to_string(),
            proactive_refresh: true,
        }
    }
}

pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    coordinator: Arc<dyn RefreshCoordinator>,
    config: PipelineConfig,
}

impl RequestPipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        coordinator: Arc<dyn RefreshCoordinator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            transport,
            store,
            coordinator,
            config,
        }
    }

    /// Token to attach on first dispatch. A stale stored credential is
    /// refreshed up front, which uses up the call's one refresh cycle.
    async fn initial_credential(
        &self,
        call: &mut OutboundCall,
    ) -> Result<AccessToken, PipelineError> {
        let credential = self
            .store
            .current()
            .await?
            .ok_or(PipelineError::NoCredential)?;

        if self.config.proactive_refresh && self.store.is_stale(&credential) {
            debug!("stored credential is stale, refreshing before dispatch");
            call.enter(RequestState::Refreshing);
            call.retried = true;
            let token = self
                .coordinator
                .ensure_fresh_credential(Some(&credential.access_token))
                .await?;
            return Ok(token);
        }

        Ok(credential.access_token)
    }

    async fn drive(&self, mut call: OutboundCall) -> Result<ApiResponse, PipelineError> {
        let mut token = if call.request.requires_auth() {
            Some(self.initial_credential(&mut call).await?)
        } else {
            None
        };

        loop {
            let prepared = call.prepared(token.as_ref());
            if call.state != RequestState::Retried {
                call.enter(RequestState::Sent);
            }

            let response = match self.transport.send(&prepared).await {
                Ok(response) => response,
                Err(e) => {
                    call.enter(RequestState::OtherFailure);
                    return Err(PipelineError::Transport(e));
                }
            };

            match response.classify() {
                ResponseClass::Success => {
                    call.enter(RequestState::Succeeded);
                    return Ok(response);
                }
                ResponseClass::Unauthorized if call.request.requires_auth() => {
                    if call.request.targets(&self.config.refresh_path) {
                        call.enter(RequestState::OtherFailure);
                        return Err(PipelineError::AuthRejectedByServer(response));
                    }
                    if call.retried {
                        call.enter(RequestState::OtherFailure);
                        return Err(PipelineError::RetryExhausted(response));
                    }
                    call.enter(RequestState::AuthRejected);
                }
                _ => {
                    call.enter(RequestState::OtherFailure);
                    return Err(PipelineError::Status(response));
                }
            }

            call.enter(RequestState::Refreshing);
            let fresh = self
                .coordinator
                .ensure_fresh_credential(token.as_ref())
                .await
                .inspect_err(|_| call.enter(RequestState::OtherFailure))?;
            call.retried = true;
            call.enter(RequestState::Retried);
            token = Some(fresh);
        }
    }
}

#[async_trait::async_trait]
impl AuthenticatedClient for RequestPipeline {
    async fn send(&self, request: OutboundRequest) -> Result<ApiResponse, PipelineError> {
        let span = info_span!(
            "request",
            id = %uuid::Uuid::new_v4(),
            method = %request.method,
            target = %request.target,
        );
        let result = self.drive(OutboundCall::new(request)).instrument(span.clone()).await;
        span.in_scope(|| match &result {
            Ok(response) => debug!(status = response.status, "request succeeded"),
            Err(e) => debug!(error = %e, "request failed"),
        });
        result
    }

    async fn is_authenticated(&self) -> bool {
        match self.store.current().await {
            Ok(Some(credential)) => !self.store.is_stale(&credential),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{
        CredentialPolicy, SessionCredentialStore, SingleFlightRefreshCoordinator,
    };
    use crate::infra_fake::*;
    use crate::infra_memory::MemorySessionStorage;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use futures_util::future::join_all;

    struct Fixture {
        pipeline: Arc<RequestPipeline>,
        transport: Arc<ScriptedTransport>,
        exchange: Arc<FakeRefreshExchange>,
        store: Arc<SessionCredentialStore>,
        observer: Arc<RecordingSessionObserver>,
        clock: Arc<ManualClock>,
    }

    fn login_time() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    async fn fixture(transport: ScriptedTransport, exchange: FakeRefreshExchange) -> Fixture {
        let clock = Arc::new(ManualClock::new(login_time()));
        let store = Arc::new(SessionCredentialStore::new(
            Arc::new(MemorySessionStorage::new()),
            clock.clone(),
            CredentialPolicy::default(),
        ));
        store.set(TokenPair::new("a1", "r1")).await.unwrap();
        let transport = Arc::new(transport);
        let exchange = Arc::new(exchange);
        let observer = Arc::new(RecordingSessionObserver::new());
        let coordinator = Arc::new(SingleFlightRefreshCoordinator::new(
            store.clone(),
            exchange.clone(),
            observer.clone(),
            None,
        ));
        let pipeline = Arc::new(RequestPipeline::new(
            transport.clone(),
            store.clone(),
            coordinator,
            PipelineConfig::default(),
        ));
        Fixture {
            pipeline,
            transport,
            exchange,
            store,
            observer,
            clock,
        }
    }

    fn issuing_a2() -> FakeRefreshExchange {
        FakeRefreshExchange::issuing(TokenPair::new("a2", "r2"))
    }

    fn bearer(token: &str) -> Option<String> {
        Some(format!("Bearer {token}"))
    }

    #[tokio::test]
    async fn test_attaches_current_credential() {
        let f = fixture(ScriptedTransport::accepting(&["a1"]), issuing_a2()).await;

        let response = f.pipeline.send(OutboundRequest::get("Orders")).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(f.transport.authorizations(), vec![bearer("a1")]);
        assert_eq!(f.exchange.calls(), 0);
    }

    #[tokio::test]
    async fn test_public_request_skips_credential_and_refresh() {
        let f = fixture(ScriptedTransport::accepting(&["a1"]), issuing_a2()).await;

        let result = f
            .pipeline
            .send(OutboundRequest::get("Products").public())
            .await;

        assert!(matches!(result, Err(PipelineError::Status(ref r)) if r.status == 401));
        assert_eq!(f.transport.authorizations(), vec![None]);
        assert_eq!(f.exchange.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_credential_fails_without_dispatch() {
        let f = fixture(ScriptedTransport::accepting(&["a1"]), issuing_a2()).await;
        f.store.clear().await.unwrap();

        let result = f.pipeline.send(OutboundRequest::get("Orders")).await;

        assert!(matches!(result, Err(PipelineError::NoCredential)));
        assert_eq!(f.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_rejection_refreshes_and_retries_once() {
        let f = fixture(ScriptedTransport::accepting(&["a2"]), issuing_a2()).await;

        let response = f.pipeline.send(OutboundRequest::get("Orders")).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(
            f.transport.authorizations(),
            vec![bearer("a1"), bearer("a2")]
        );
        assert_eq!(f.exchange.calls(), 1);
        assert_eq!(
            f.store.access_token().await.unwrap(),
            Some(AccessToken("a2".to_string()))
        );
    }

    #[tokio::test]
    async fn test_rejected_retry_is_final() {
        let f = fixture(ScriptedTransport::accepting(&[]), issuing_a2()).await;

        let result = f.pipeline.send(OutboundRequest::get("Orders")).await;

        assert!(matches!(result, Err(PipelineError::RetryExhausted(ref r)) if r.status == 401));
        assert_eq!(f.transport.request_count(), 2);
        assert_eq!(f.exchange.calls(), 1);
        assert!(f.observer.endings().is_empty());
    }

    #[tokio::test]
    async fn test_failed_refresh_ends_session() {
        let f = fixture(
            ScriptedTransport::accepting(&["a2"]),
            FakeRefreshExchange::failing(RefreshError::Rejected { status: 401 }),
        )
        .await;

        let result = f.pipeline.send(OutboundRequest::get("Orders")).await;

        assert!(matches!(
            result,
            Err(PipelineError::RefreshExchangeFailed(RefreshError::Rejected { status: 401 }))
        ));
        assert!(f.store.current().await.unwrap().is_none());
        assert_eq!(f.observer.endings().len(), 1);
        assert!(!f.pipeline.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_rejected_refresh_endpoint_is_not_refreshed() {
        let f = fixture(ScriptedTransport::accepting(&[]), issuing_a2()).await;

        let result = f
            .pipeline
            .send(OutboundRequest::post(
                "accounts/REFRESH",
                serde_json::json!({ "refreshToken": "r1" }),
            ))
            .await;

        assert!(matches!(result, Err(PipelineError::AuthRejectedByServer(_))));
        assert_eq!(f.exchange.calls(), 0);
    }

    #[tokio::test]
    async fn test_other_failures_pass_through() {
        let f = fixture(
            ScriptedTransport::new(|_| Ok(ApiResponse::new(500, "boom"))),
            issuing_a2(),
        )
        .await;

        let result = f.pipeline.send(OutboundRequest::get("Orders")).await;

        match result {
            Err(PipelineError::Status(response)) => {
                assert_eq!(response.status, 500);
                assert_eq!(response.text(), "boom");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(f.exchange.calls(), 0);
    }

    #[tokio::test]
    async fn test_transport_errors_pass_through() {
        let f = fixture(
            ScriptedTransport::new(|_| Err(TransportError::Network("reset".to_string()))),
            issuing_a2(),
        )
        .await;

        let result = f.pipeline.send(OutboundRequest::get("Orders")).await;

        assert!(matches!(
            result,
            Err(PipelineError::Transport(TransportError::Network(_)))
        ));
        assert_eq!(f.exchange.calls(), 0);
    }

    #[tokio::test]
    async fn test_stale_credential_is_refreshed_before_dispatch() {
        let f = fixture(ScriptedTransport::accepting(&["a2"]), issuing_a2()).await;
        f.clock.advance(Duration::seconds(890));
        assert!(!f.pipeline.is_authenticated().await);

        let response = f.pipeline.send(OutboundRequest::get("Basket")).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(f.transport.authorizations(), vec![bearer("a2")]);
        assert_eq!(f.exchange.calls(), 1);
        let stored = f.store.current().await.unwrap().unwrap();
        assert_eq!(
            stored.expires_at,
            login_time() + Duration::seconds(890) + Duration::seconds(900)
        );
        assert!(f.pipeline.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_rejection_after_proactive_refresh_is_final() {
        let f = fixture(ScriptedTransport::accepting(&[]), issuing_a2()).await;
        f.clock.advance(Duration::seconds(890));

        let result = f.pipeline.send(OutboundRequest::get("Basket")).await;

        assert!(matches!(result, Err(PipelineError::RetryExhausted(_))));
        assert_eq!(f.exchange.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rejections_share_one_refresh() {
        let f = fixture(ScriptedTransport::accepting(&["a2"]), issuing_a2()).await;

        let results = join_all((0..10).map(|i| {
            let pipeline = f.pipeline.clone();
            async move { pipeline.send(OutboundRequest::get(format!("Orders/{i}"))).await }
        }))
        .await;

        for result in results {
            assert_eq!(result.unwrap().status, 200);
        }
        assert_eq!(f.exchange.calls(), 1);
        let retried_with: Vec<_> = f
            .transport
            .authorizations()
            .into_iter()
            .filter(|h| h.as_deref() != Some("Bearer a1"))
            .collect();
        assert_eq!(retried_with.len(), 10);
        assert!(retried_with.iter().all(|h| h == &bearer("a2")));
    }
}
