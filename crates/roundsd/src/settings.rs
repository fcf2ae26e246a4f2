//! Runtime configuration, loaded from environment variables (and an
//! optional config file) via the `config` crate. Every key has a sane
//! default so the daemon runs standalone with no configuration at all.

use serde::Deserialize;

fn default_poll_interval() -> u64 {
    60
}

fn default_poll_batch_size() -> u64 {
    100
}

fn default_lookback_minutes() -> i64 {
    15
}

fn default_run_mode() -> RunMode {
    RunMode::Daemon
}

fn default_webhook_host() -> String {
    "0.0.0.0".to_string()
}

fn default_webhook_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_codebase_path() -> String {
    ".".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Daemon,
    Cli,
    Webhook,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,

    /// Number of error events retrieved per poll cycle.
    #[serde(default = "default_poll_batch_size")]
    pub poll_batch_size: u64,

    #[serde(default = "default_lookback_minutes")]
    pub error_lookback_minutes: i64,

    /// Daily diagnosis spend cap in USD. `None` means unlimited.
    #[serde(default)]
    pub daily_budget_limit: Option<f64>,

    #[serde(default = "default_run_mode")]
    pub run_mode: RunMode,

    #[serde(default = "default_webhook_host")]
    pub webhook_host: String,

    #[serde(default = "default_webhook_port")]
    pub webhook_port: u16,

    #[serde(default)]
    pub webhook_api_key: Option<String>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_codebase_path")]
    pub codebase_path: String,
}

impl Settings {
    /// Loads settings from (in ascending priority) built-in defaults, an
    /// optional `rounds.yaml`/`rounds.json` in the working directory, and
    /// `ROUNDS_*` environment variables.
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("rounds").required(false))
            .add_source(config::Environment::with_prefix("ROUNDS").separator("__"))
            .build()?;

        let settings: Settings = settings
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("failed to load settings: {e}"))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects settings combinations that would never be valid, regardless
    /// of what produced them (file, environment, or built-in defaults).
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_seconds == 0 {
            anyhow::bail!("poll_interval_seconds must be positive");
        }
        if self.poll_batch_size == 0 {
            anyhow::bail!("poll_batch_size must be positive");
        }
        if self.error_lookback_minutes <= 0 {
            anyhow::bail!("error_lookback_minutes must be positive");
        }
        if let Some(limit) = self.daily_budget_limit {
            if limit < 0.0 {
                anyhow::bail!("daily_budget_limit must be non-negative");
            }
        }
        if self.webhook_port == 0 {
            anyhow::bail!("webhook_port must be between 1 and 65535");
        }
        Ok(())
    }

    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Settings {
        Settings {
            poll_interval_seconds: default_poll_interval(),
            poll_batch_size: default_poll_batch_size(),
            error_lookback_minutes: default_lookback_minutes(),
            daily_budget_limit: None,
            run_mode: default_run_mode(),
            webhook_host: default_webhook_host(),
            webhook_port: default_webhook_port(),
            webhook_api_key: None,
            log_level: default_log_level(),
            log_json: false,
            codebase_path: default_codebase_path(),
        }
    }

    #[test]
    fn built_in_defaults_validate() {
        assert!(defaults().validate().is_ok());
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let mut settings = defaults();
        settings.poll_interval_seconds = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_batch_size_rejected() {
        let mut settings = defaults();
        settings.poll_batch_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn negative_budget_limit_rejected() {
        let mut settings = defaults();
        settings.daily_budget_limit = Some(-1.0);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_webhook_port_rejected() {
        let mut settings = defaults();
        settings.webhook_port = 0;
        assert!(settings.validate().is_err());
    }
}
