//! Connectivity commands.

use super::print_json;
use crate::app::AppContext;
use client_config_and_utils::{Config, Paths};
use connectivity_monitor::{ConnectivityChange, ConnectivityConfig, HttpProber, Prober};
use identity_client::IdentityClient;
use serde::Serialize;
use session_lifecycle::SessionSnapshot;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
struct ProbeReport {
    target: String,
    online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Probe reachability once and report.
pub async fn probe(config: &Config) -> anyhow::Result<()> {
    let settings = ConnectivityConfig::from(&config.connectivity);
    let prober = HttpProber::new(config.probe_url()?, settings.probe_timeout);

    let outcome = prober.probe().await;
    print_json(&ProbeReport {
        target: prober.target().to_string(),
        online: outcome.is_ok(),
        error: outcome.err().map(|e| e.to_string()),
    })
}

/// Run the monitor and keep the session fresh until Ctrl-C.
pub async fn watch(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let app = AppContext::build(config, paths, true)?;
    let Some(monitor) = app.monitor.clone() else {
        anyhow::bail!("Connectivity monitor unavailable");
    };

    if let Err(e) = app.manager.initialize_session().await {
        warn!(error = %e, "Could not restore session");
    }

    let _connectivity = monitor.subscribe(|change: &ConnectivityChange| {
        info!(
            is_online = change.current.is_online,
            os_online = change.current.os_online,
            show_offline_banner = change.current.show_offline_banner,
            "Connectivity"
        );
    });
    let _session = app.manager.subscribe(|snapshot: &SessionSnapshot| {
        info!(
            phase = ?snapshot.phase,
            user_id = ?snapshot.user_id,
            "Session"
        );
    });

    monitor.start();
    app.identity.start_auto_refresh();
    info!(
        authenticated = app.manager.is_authenticated(),
        "Watching session, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    app.identity.stop_auto_refresh();
    monitor.stop();
    Ok(())
}
