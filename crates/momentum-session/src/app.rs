//! Wiring of the session core for a headless run.

use anyhow::Context;
use client_config_and_utils::{Config, Paths};
use connectivity_monitor::{ConnectivityConfig, ConnectivityMonitor, HttpProber};
use identity_client::{FileSessionStore, GoTrueClient, IdentityClient};
use session_lifecycle::{
    DesktopPlatform, HeadlessNavigator, SessionCollaborators, SessionConfig,
    SessionLifecycleManager,
};
use std::sync::Arc;
use tracing::debug;

/// Everything a command needs.
pub struct AppContext {
    pub identity: GoTrueClient,
    pub monitor: Option<ConnectivityMonitor>,
    pub manager: SessionLifecycleManager,
}

impl AppContext {
    /// Build the core. With `connectivity` set, a monitor is created (not
    /// started) and coordinated with the manager.
    pub fn build(config: &Config, paths: &Paths, connectivity: bool) -> anyhow::Result<Self> {
        paths
            .ensure_dirs()
            .context("Failed to create runtime directories")?;

        let store = Arc::new(FileSessionStore::new(paths.session_file()));
        let identity = GoTrueClient::new(
            config.identity_url()?,
            &config.identity_publishable_key,
            store,
        );

        let monitor = if connectivity {
            Some(build_monitor(config)?)
        } else {
            None
        };

        let identity_client: Arc<dyn IdentityClient> = Arc::new(identity.clone());
        let manager = SessionLifecycleManager::new(
            SessionConfig::from(&config.session),
            SessionCollaborators {
                identity: Some(identity_client),
                navigator: Arc::new(HeadlessNavigator::new("/")),
                platform: Arc::new(DesktopPlatform::new(config.environment)),
                connectivity: monitor.clone(),
            },
        );

        debug!(
            environment = %config.environment,
            identity_url = %config.identity_url,
            "Session core ready"
        );

        Ok(Self {
            identity,
            monitor,
            manager,
        })
    }
}

pub fn build_monitor(config: &Config) -> anyhow::Result<ConnectivityMonitor> {
    let settings = ConnectivityConfig::from(&config.connectivity);
    let prober = HttpProber::new(config.probe_url()?, settings.probe_timeout);
    Ok(ConnectivityMonitor::new(settings, Arc::new(prober)))
}
