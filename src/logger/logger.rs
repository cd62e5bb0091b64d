use crate::settings;
use anyhow::{Result, anyhow};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

const BOOTSTRAP_FILTER: &str = "info";

pub struct LogConfig {
    pub filter: String,
}

impl From<&settings::Log> for LogConfig {
    fn from(log: &settings::Log) -> Self {
        Self {
            filter: log.filter.clone(),
        }
    }
}

/// Global subscriber whose filter can be swapped once settings are loaded.
/// Output goes to stderr so stdout stays free for command results.
pub struct Logger {
    reload_handle: reload::Handle<EnvFilter, Registry>,
    env_override: bool,
}

impl Logger {
    pub fn new_bootstrap() -> Self {
        let from_env = EnvFilter::try_from_default_env().ok();
        let env_override = from_env.is_some();
        let filter = from_env.unwrap_or_else(|| EnvFilter::new(BOOTSTRAP_FILTER));
        let (filter, reload_handle) = reload::Layer::new(filter);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();

        Self {
            reload_handle,
            env_override,
        }
    }

    /// Apply the configured filter. `RUST_LOG`, when set, stays in charge.
    pub fn reload_from_config(&self, config: &LogConfig) -> Result<()> {
        if self.env_override {
            return Ok(());
        }
        let filter = parse_filter(config)?;
        self.reload_handle.reload(filter).map_err(|e| anyhow!(e))?;
        Ok(())
    }
}

fn parse_filter(config: &LogConfig) -> Result<EnvFilter> {
    EnvFilter::try_new(&config.filter).map_err(|e| anyhow!(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter() {
        let ok = LogConfig {
            filter: "freshcart=debug,warn".to_string(),
        };
        assert!(parse_filter(&ok).is_ok());

        let bad = LogConfig {
            filter: "freshcart=loud".to_string(),
        };
        assert!(parse_filter(&bad).is_err());
    }
}
