use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub api: Api,
    #[serde(default)]
    pub credential: Credential,
    #[serde(default)]
    pub refresh: Refresh,
    pub session: Session,
    pub log: Log,
}

#[derive(Debug, Deserialize)]
pub struct Api {
    pub base_url: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Credential {
    #[serde(default = "default_lifetime_secs")]
    pub lifetime_secs: u64,
    #[serde(default = "default_refresh_skew_secs")]
    pub refresh_skew_secs: u64,
    #[serde(default = "default_expiry_source")]
    pub expiry_source: String, // "fixed" or "token_claim"
    #[serde(default = "default_true")]
    pub proactive_refresh: bool,
}

impl Default for Credential {
    fn default() -> Self {
        Self {
            lifetime_secs: default_lifetime_secs(),
            refresh_skew_secs: default_refresh_skew_secs(),
            expiry_source: default_expiry_source(),
            proactive_refresh: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Refresh {
    pub timeout_secs: Option<u64>, // absent: wait for the exchange indefinitely
}

#[derive(Debug, Deserialize)]
pub struct Session {
    pub backend: String, // "memory" or "redis"
    pub redis_dsn: Option<String>,
    pub namespace: Option<String>,
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_login_path")]
    pub login_path: String,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

fn default_refresh_path() -> String {
    "Accounts/refresh".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_lifetime_secs() -> u64 {
    15 * 60
}

fn default_refresh_skew_secs() -> u64 {
    30
}

fn default_expiry_source() -> String {
    "fixed".to_string()
}

fn default_true() -> bool {
    true
}

fn default_session_ttl_secs() -> u64 {
    12 * 60 * 60
}

fn default_login_path() -> String {
    "/account/login".to_string()
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

const ENV_PREFIX: &str = "FRESHCART";

/// Load settings from `path` (or the build's default file), with
/// `FRESHCART__SECTION__KEY` environment variables taking precedence.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_settings(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_file_gets_defaults() {
        let file = write_settings(
            r#"
            [api]
            base_url = "https://shop.example.com/api/"

            [session]
            backend = "memory"

            [log]
            filter = "info"
            "#,
        );

        let settings = parse_settings(file.path().to_str()).unwrap();

        assert_eq!(settings.api.refresh_path, "Accounts/refresh");
        assert_eq!(settings.api.request_timeout_secs, 30);
        assert_eq!(settings.credential.lifetime_secs, 900);
        assert_eq!(settings.credential.refresh_skew_secs, 30);
        assert_eq!(settings.credential.expiry_source, "fixed");
        assert!(settings.credential.proactive_refresh);
        assert_eq!(settings.refresh.timeout_secs, None);
        assert_eq!(settings.session.login_path, "/account/login");
        assert!(settings.session.redis_dsn.is_none());
    }

    #[test]
    fn test_full_file() {
        let file = write_settings(
            r#"
            [api]
            base_url = "https://shop.example.com/api/"
            refresh_path = "auth/refresh"
            request_timeout_secs = 5

            [credential]
            lifetime_secs = 600
            refresh_skew_secs = 10
            expiry_source = "token_claim"
            proactive_refresh = false

            [refresh]
            timeout_secs = 15

            [session]
            backend = "redis"
            redis_dsn = "redis://127.0.0.1:6379"
            namespace = "web"
            ttl_secs = 3600

            [log]
            filter = "freshcart=debug"
            "#,
        );

        let settings = parse_settings(file.path().to_str()).unwrap();

        assert_eq!(settings.api.refresh_path, "auth/refresh");
        assert_eq!(settings.credential.expiry_source, "token_claim");
        assert!(!settings.credential.proactive_refresh);
        assert_eq!(settings.refresh.timeout_secs, Some(15));
        assert_eq!(settings.session.backend, "redis");
        assert_eq!(settings.session.namespace.as_deref(), Some("web"));
        assert_eq!(settings.session.ttl_secs, 3600);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(parse_settings(Some("does/not/exist.toml")).is_err());
    }

    #[test]
    fn test_missing_required_section_is_an_error() {
        let file = write_settings(
            r#"
            [log]
            filter = "info"
            "#,
        );

        assert!(parse_settings(file.path().to_str()).is_err());
    }
}
