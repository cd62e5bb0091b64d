use crate::application_port::*;
use crate::domain_model::*;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

const LOGIN_PATH: &str = "Accounts/login";
const REGISTER_PATH: &str = "Accounts/register";
const CURRENT_USER_PATH: &str = "Accounts/current";
const EMAIL_EXISTS_PATH: &str = "Accounts/email-exists";

pub struct RealAccountService {
    client: Arc<dyn AuthenticatedClient>,
    store: Arc<dyn CredentialStore>,
    current_user: watch::Sender<Option<User>>,
}

impl RealAccountService {
    pub fn new(client: Arc<dyn AuthenticatedClient>, store: Arc<dyn CredentialStore>) -> Self {
        let (current_user, _) = watch::channel(None);
        Self {
            client,
            store,
            current_user,
        }
    }

    fn publish(&self, user: Option<User>) {
        self.current_user.send_replace(user);
    }

    /// Shared tail of login and register: keep the issued pair, publish the user.
    async fn establish_session(&self, response: ApiResponse) -> Result<User, AccountError> {
        let user: User = response.json()?;
        let pair = user.token_pair();
        if !pair.is_complete() {
            return Err(AccountError::MissingToken);
        }
        self.store.set(pair).await?;
        info!(email = %user.email, "session established");
        self.publish(Some(user.clone()));
        Ok(user)
    }
}

#[async_trait::async_trait]
impl AccountService for RealAccountService {
    async fn login(&self, input: LoginInput) -> Result<User, AccountError> {
        let request = OutboundRequest::post(LOGIN_PATH, serde_json::to_value(&input)?).public();
        let response = self.client.send(request).await?;
        self.establish_session(response).await
    }

    async fn register(&self, input: RegisterInput) -> Result<User, AccountError> {
        let request =
            OutboundRequest::post(REGISTER_PATH, serde_json::to_value(&input)?).public();
        let response = self.client.send(request).await?;
        self.establish_session(response).await
    }

    async fn logout(&self) -> Result<(), AccountError> {
        self.store.clear().await?;
        self.publish(None);
        info!("logged out");
        Ok(())
    }

    async fn load_current_user(&self) -> Result<Option<User>, AccountError> {
        if self.store.access_token().await?.is_none() {
            self.publish(None);
            return Ok(None);
        }
        let response = self
            .client
            .send(OutboundRequest::get(CURRENT_USER_PATH))
            .await?;
        let user: User = response.json()?;
        self.publish(Some(user.clone()));
        Ok(Some(user))
    }

    async fn initialize_current_user(&self) -> Result<Option<User>, AccountError> {
        if self.store.access_token().await?.is_none() {
            return Ok(None);
        }
        match self.load_current_user().await {
            Ok(user) => Ok(user),
            Err(e) => {
                warn!(error = %e, "could not restore session, clearing credential");
                self.store.clear().await?;
                self.publish(None);
                Ok(None)
            }
        }
    }

    async fn check_email_exists(&self, email: &str) -> Result<bool, AccountError> {
        let email: String = url::form_urlencoded::byte_serialize(email.as_bytes()).collect();
        let request =
            OutboundRequest::get(format!("{EMAIL_EXISTS_PATH}?email={email}")).public();
        let response = self.client.send(request).await?;
        Ok(response.json()?)
    }

    fn current_user(&self) -> Option<User> {
        self.current_user.borrow().clone()
    }

    fn subscribe_current_user(&self) -> watch::Receiver<Option<User>> {
        self.current_user.subscribe()
    }
}
