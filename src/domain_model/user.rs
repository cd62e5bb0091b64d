use crate::domain_model::TokenPair;
use serde::{Deserialize, Serialize};

/// Account as returned by the login, register and current-user endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub display_name: String,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl User {
    /// The server issues a single token today; it doubles as the refresh
    /// token until a separate one is returned.
    pub fn token_pair(&self) -> TokenPair {
        let refresh = self
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.token);
        TokenPair::new(self.token.clone(), refresh.to_owned())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    pub display_name: String,
    pub email: String,
    pub password: String,
}
