//! Configuration management.

use crate::{CoreError, CoreResult, Environment, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default identity service URL (override at compile time via MOMENTUM_IDENTITY_URL).
pub const DEFAULT_IDENTITY_URL: &str = match option_env!("MOMENTUM_IDENTITY_URL") {
    Some(url) => url,
    None => "https://momentum.supabase.co",
};

/// Default identity publishable key (override at compile time via MOMENTUM_IDENTITY_KEY).
pub const DEFAULT_IDENTITY_PUBLISHABLE_KEY: &str = match option_env!("MOMENTUM_IDENTITY_KEY") {
    Some(key) => key,
    None => "momentum-publishable-key",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Fallback tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Deployment environment, used for base-URL resolution.
    #[serde(default)]
    pub environment: Environment,
    /// Identity service project URL.
    #[serde(default = "default_identity_url")]
    pub identity_url: String,
    /// Identity service publishable key (public, safe to expose).
    #[serde(default = "default_identity_publishable_key")]
    pub identity_publishable_key: String,
    /// Reachability probe target. Defaults to a static asset on the API host.
    #[serde(default)]
    pub probe_url: Option<String>,
    #[serde(default)]
    pub connectivity: ConnectivitySettings,
    #[serde(default)]
    pub session: SessionSettings,
}

/// Connectivity polling settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivitySettings {
    pub base_interval_ms: u64,
    pub max_interval_ms: u64,
    pub grace_period_ms: u64,
    pub probe_timeout_ms: u64,
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        Self {
            base_interval_ms: 10_000,
            max_interval_ms: 60_000,
            grace_period_ms: 2_000,
            probe_timeout_ms: 5_000,
        }
    }
}

/// Session lifecycle settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Tokens expiring within this many seconds are refreshed before use.
    pub refresh_horizon_secs: i64,
    /// Route prefixes that require an authenticated user.
    pub protected_path_prefixes: Vec<String>,
    /// Where to send the user when a protected route loses its session.
    pub home_route: String,
    /// Route that lets a recovering user choose a new password.
    pub password_update_route: String,
    /// Delay before navigating to `password_update_route` after a recovery event.
    pub recovery_redirect_delay_ms: u64,
    /// Redirect target embedded in password reset mails.
    pub password_reset_redirect_url: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            refresh_horizon_secs: 60,
            protected_path_prefixes: vec![
                "/profile".to_string(),
                "/settings".to_string(),
                "/notifications".to_string(),
            ],
            home_route: "/".to_string(),
            password_update_route: "/profile/password".to_string(),
            recovery_redirect_delay_ms: 100,
            password_reset_redirect_url: None,
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_identity_url() -> String {
    DEFAULT_IDENTITY_URL.to_string()
}

fn default_identity_publishable_key() -> String {
    DEFAULT_IDENTITY_PUBLISHABLE_KEY.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            environment: Environment::default(),
            identity_url: default_identity_url(),
            identity_publishable_key: default_identity_publishable_key(),
            probe_url: None,
            connectivity: ConnectivitySettings::default(),
            session: SessionSettings::default(),
        }
    }
}

impl Config {
    /// Defaults with `MOMENTUM_*` environment overrides applied.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Read a config file as-is, without environment overrides.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Some(log_level) = env_value("MOMENTUM_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(environment) = env_value("MOMENTUM_ENVIRONMENT") {
            match environment.parse() {
                Ok(env) => self.environment = env,
                Err(e) => tracing::warn!(error = %e, "Ignoring MOMENTUM_ENVIRONMENT"),
            }
        }
        if let Some(url) = env_value("MOMENTUM_IDENTITY_URL") {
            self.identity_url = url;
        }
        if let Some(key) = env_value("MOMENTUM_IDENTITY_KEY") {
            self.identity_publishable_key = key;
        }
        if let Some(url) = env_value("MOMENTUM_PROBE_URL") {
            self.probe_url = Some(url);
        }
    }

    /// Get the identity service URL as a parsed URL.
    pub fn identity_url(&self) -> CoreResult<Url> {
        Url::parse(&self.identity_url).map_err(CoreError::from)
    }

    /// Resolve the reachability probe target.
    ///
    /// An explicit `probe_url` wins; otherwise a static asset on the
    /// environment's API host is used.
    pub fn probe_url(&self) -> CoreResult<Url> {
        match &self.probe_url {
            Some(url) => Url::parse(url).map_err(CoreError::from),
            None => {
                let base = Url::parse(self.environment.api_base_url())?;
                base.join("/favicon.ico").map_err(CoreError::from)
            }
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}
