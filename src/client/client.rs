use crate::application_impl::*;
use crate::application_port::*;
use crate::client::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_http::*;
use crate::infra_memory::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use anyhow::anyhow;
use nanoid::nanoid;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Everything the application needs to talk to the API as the signed-in user.
pub struct Client {
    pub authenticated_client: Arc<dyn AuthenticatedClient>,
    pub account_service: Arc<dyn AccountService>,
    pub credential_store: Arc<dyn CredentialStore>,
    pub coordinator: Arc<dyn RefreshCoordinator>,
    session_observer: Arc<WatchSessionObserver>,
    namespace: String,
}

impl Client {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        validate(settings)?;

        let alphabet: [char; 16] = [
            '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f',
        ];
        let namespace = match &settings.session.namespace {
            Some(namespace) => format!("session:{}", namespace),
            None => format!("session:{}", nanoid!(10, &alphabet)),
        };

        let storage: Arc<dyn SessionStorage> = match settings.session.backend.as_str() {
            "memory" => Arc::new(MemorySessionStorage::new()),
            "redis" => {
                let dsn = settings
                    .session
                    .redis_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("session.redis_dsn is required for redis"))?;
                Arc::new(
                    RedisSessionStorage::connect(dsn, namespace.clone(), settings.session.ttl_secs)
                        .await?,
                )
            }
            other => return Err(anyhow!("Unknown session backend: {}", other)),
        };

        let policy = CredentialPolicy {
            lifetime: seconds(settings.credential.lifetime_secs)?,
            refresh_skew: seconds(settings.credential.refresh_skew_secs)?,
            expiry_source: settings
                .credential
                .expiry_source
                .parse::<ExpirySource>()
                .map_err(|e| anyhow!(e))?,
        };
        let credential_store: Arc<dyn CredentialStore> = Arc::new(SessionCredentialStore::new(
            storage,
            Arc::new(SystemClock),
            policy,
        ));

        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::try_new(
            &settings.api.base_url,
            Duration::from_secs(settings.api.request_timeout_secs),
        )?);
        let exchange: Arc<dyn RefreshExchange> = Arc::new(HttpRefreshExchange::new(
            transport.clone(),
            settings.api.refresh_path.clone(),
        ));

        let session_observer = Arc::new(WatchSessionObserver::new(
            settings.session.login_path.clone(),
        ));
        let refresh_timeout = settings
            .refresh
            .timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        let coordinator: Arc<dyn RefreshCoordinator> =
            Arc::new(SingleFlightRefreshCoordinator::new(
                credential_store.clone(),
                exchange,
                session_observer.clone(),
                refresh_timeout,
            ));

        let authenticated_client: Arc<dyn AuthenticatedClient> = Arc::new(RequestPipeline::new(
            transport,
            credential_store.clone(),
            coordinator.clone(),
            PipelineConfig {
                refresh_path: settings.api.refresh_path.clone(),
                proactive_refresh: settings.credential.proactive_refresh,
            },
        ));
        let account_service: Arc<dyn AccountService> = Arc::new(RealAccountService::new(
            authenticated_client.clone(),
            credential_store.clone(),
        ));

        info!(
            base_url = %settings.api.base_url,
            backend = %settings.session.backend,
            %namespace,
            "client ready"
        );

        Ok(Self {
            authenticated_client,
            account_service,
            credential_store,
            coordinator,
            session_observer,
            namespace,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn session_events(&self) -> watch::Receiver<SessionEvent> {
        self.session_observer.subscribe()
    }

    pub async fn login(&self, input: LoginInput) -> Result<User, AccountError> {
        let user = self.account_service.login(input).await?;
        self.session_observer.reset();
        Ok(user)
    }

    pub async fn register(&self, input: RegisterInput) -> Result<User, AccountError> {
        let user = self.account_service.register(input).await?;
        self.session_observer.reset();
        Ok(user)
    }

    pub async fn send(&self, request: OutboundRequest) -> Result<ApiResponse, PipelineError> {
        self.authenticated_client.send(request).await
    }

    /// End the client session. Session storage must not outlive it.
    pub async fn shutdown(&self) {
        info!("client shutting down...");
        if let Err(e) = self.credential_store.clear().await {
            warn!("could not clear credential on shutdown: {}", e);
        }
    }
}

/// Reject settings that would only fail later, on first login or refresh.
fn validate(settings: &Settings) -> anyhow::Result<()> {
    if settings.session.ttl_secs == 0 {
        return Err(anyhow!("session.ttl_secs must be at least 1"));
    }
    if settings.credential.lifetime_secs == 0 {
        return Err(anyhow!("credential.lifetime_secs must be at least 1"));
    }
    let lifetime = seconds(settings.credential.lifetime_secs)?;
    if chrono::Utc::now().checked_add_signed(lifetime).is_none() {
        return Err(anyhow!(
            "credential.lifetime_secs is out of range: {}",
            settings.credential.lifetime_secs
        ));
    }
    seconds(settings.credential.refresh_skew_secs)?;
    Ok(())
}

fn seconds(secs: u64) -> anyhow::Result<chrono::Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| anyhow!("duration out of range: {}s", secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::parse_settings;
    use std::io::Write;

    fn settings_with(extra: &str) -> Settings {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        write!(
            file,
            r#"
            [api]
            base_url = "http://127.0.0.1:9/api/"

            [session]
            backend = "memory"
            {extra}

            [log]
            filter = "info"
            "#
        )
        .unwrap();
        parse_settings(file.path().to_str()).unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&settings_with("")).is_ok());
    }

    #[test]
    fn test_zero_session_ttl_is_rejected() {
        assert!(validate(&settings_with("ttl_secs = 0")).is_err());
    }

    #[test]
    fn test_lifetime_out_of_range_is_rejected() {
        let mut settings = settings_with("");
        settings.credential.lifetime_secs = 9_000_000_000_000;
        assert!(validate(&settings).is_err());

        settings.credential.lifetime_secs = 0;
        assert!(validate(&settings).is_err());
    }
}
