//! Connectivity state and polling policy.

use chrono::{DateTime, Utc};
use client_config_and_utils::ConnectivitySettings;
use serde::Serialize;
use std::time::Duration;

/// Observable connectivity state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivityState {
    /// Last value reported by the OS. Optimistic and unreliable.
    pub os_online: bool,
    /// Result of the last probe; the source of truth.
    pub is_online: bool,
    /// Set once `is_online` has been false for the whole grace period.
    pub show_offline_banner: bool,
    /// Time of the last successful probe.
    pub last_verified_online: Option<DateTime<Utc>>,
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self {
            os_online: true,
            is_online: true,
            show_offline_banner: false,
            last_verified_online: None,
        }
    }
}

/// One observed transition of [`ConnectivityState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityChange {
    pub previous: ConnectivityState,
    pub current: ConnectivityState,
}

impl ConnectivityChange {
    /// True when `is_online` flipped in this transition.
    pub fn online_changed(&self) -> bool {
        self.previous.is_online != self.current.is_online
    }
}

/// Polling and debounce timings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityConfig {
    /// Poll interval while probes succeed.
    pub base_interval: Duration,
    /// Upper bound for the backed-off interval.
    pub max_interval: Duration,
    /// How long `is_online` must stay false before the banner shows.
    pub grace_period: Duration,
    /// Per-probe timeout.
    pub probe_timeout: Duration,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self::from(&ConnectivitySettings::default())
    }
}

impl From<&ConnectivitySettings> for ConnectivityConfig {
    fn from(settings: &ConnectivitySettings) -> Self {
        Self {
            base_interval: Duration::from_millis(settings.base_interval_ms),
            max_interval: Duration::from_millis(settings.max_interval_ms),
            grace_period: Duration::from_millis(settings.grace_period_ms),
            probe_timeout: Duration::from_millis(settings.probe_timeout_ms),
        }
    }
}

impl ConnectivityConfig {
    /// Interval to use after a failed probe.
    pub fn backoff(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_interval)
    }
}
