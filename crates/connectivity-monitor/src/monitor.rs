//! Connectivity monitor with adaptive polling and a debounced offline banner.
//!
//! Lifecycle: `Idle --start()--> Running --stop()--> Stopped`. Once stopped,
//! every operation is a no-op and no timer or probe can mutate state.
//!
//! Every mutation happens under the core lock; observers are notified after
//! the lock is released.

use crate::{ConnectivityChange, ConnectivityConfig, ConnectivityState, ProbeResult, Prober};
use chrono::Utc;
use client_config_and_utils::{ObserverRegistry, Subscription, Timer};
use parking_lot::{Mutex, MutexGuard};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Stopped,
}

struct MonitorCore {
    lifecycle: Lifecycle,
    state: ConnectivityState,
    current_interval: Duration,
    /// Cancellation token for probes: only the probe issued with the current
    /// generation may report its result.
    probe_generation: u64,
    probe_task: Option<JoinHandle<()>>,
    poll_timer: Option<Timer>,
    banner_timer: Option<Timer>,
}

struct MonitorInner {
    config: ConnectivityConfig,
    prober: Arc<dyn Prober>,
    core: Mutex<MonitorCore>,
    observers: ObserverRegistry<ConnectivityChange>,
}

/// Actively verified online/offline signal.
///
/// Cloning is cheap and every clone drives the same monitor.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<MonitorInner>,
}

impl ConnectivityMonitor {
    pub fn new(config: ConnectivityConfig, prober: Arc<dyn Prober>) -> Self {
        let current_interval = config.base_interval;
        Self {
            inner: Arc::new(MonitorInner {
                config,
                prober,
                core: Mutex::new(MonitorCore {
                    lifecycle: Lifecycle::Idle,
                    state: ConnectivityState::default(),
                    current_interval,
                    probe_generation: 0,
                    probe_task: None,
                    poll_timer: None,
                    banner_timer: None,
                }),
                observers: ObserverRegistry::new(),
            }),
        }
    }

    /// Begin monitoring with one immediate probe.
    pub fn start(&self) {
        {
            let mut core = self.inner.lock_core();
            match core.lifecycle {
                Lifecycle::Idle => core.lifecycle = Lifecycle::Running,
                Lifecycle::Running => {
                    warn!("Connectivity monitor already started");
                    return;
                }
                Lifecycle::Stopped => return,
            }
        }

        info!(
            base_interval_ms = self.inner.config.base_interval.as_millis() as u64,
            max_interval_ms = self.inner.config.max_interval.as_millis() as u64,
            "Connectivity monitor started"
        );
        self.inner.verify();
    }

    /// Cancel every timer and any in-flight probe. Final.
    pub fn stop(&self) {
        let mut core = self.inner.lock_core();
        if core.lifecycle == Lifecycle::Stopped {
            return;
        }
        core.lifecycle = Lifecycle::Stopped;
        core.probe_generation += 1;
        if let Some(task) = core.probe_task.take() {
            task.abort();
        }
        core.poll_timer = None;
        core.banner_timer = None;
        drop(core);

        info!("Connectivity monitor stopped");
    }

    /// Probe now, superseding any in-flight probe and the scheduled poll.
    pub fn verify(&self) {
        self.inner.verify();
    }

    /// The OS reports the network as gone. Trusted immediately.
    pub fn on_os_offline(&self) {
        let change = {
            let mut core = self.inner.lock_core();
            if core.lifecycle == Lifecycle::Stopped {
                return;
            }
            let previous = core.state.clone();
            core.state.os_online = false;
            core.state.is_online = false;
            // A probe issued before the drop must not report the network back.
            core.probe_generation += 1;
            if let Some(task) = core.probe_task.take() {
                task.abort();
            }
            if core.lifecycle == Lifecycle::Running {
                let delay = core.current_interval;
                self.inner.schedule_poll(&mut core, delay);
            }
            self.inner.arm_banner_timer(&mut core);
            transition(previous, &core.state)
        };

        debug!("OS reported offline");
        self.inner.publish(change);
    }

    /// The OS reports the network as back. Verified before being trusted.
    pub fn on_os_online(&self) {
        let change = {
            let mut core = self.inner.lock_core();
            if core.lifecycle == Lifecycle::Stopped {
                return;
            }
            let previous = core.state.clone();
            core.state.os_online = true;
            transition(previous, &core.state)
        };

        debug!("OS reported online, verifying");
        self.inner.publish(change);
        self.inner.verify();
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> ConnectivityState {
        self.inner.lock_core().state.clone()
    }

    pub fn is_online(&self) -> bool {
        self.inner.lock_core().state.is_online
    }

    /// Backoff interval, reset to the base on success and doubled on failure.
    pub fn current_interval(&self) -> Duration {
        self.inner.lock_core().current_interval
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.lock_core().lifecycle == Lifecycle::Stopped
    }

    /// Observe state transitions until the returned guard is dropped.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&ConnectivityChange) + Send + Sync + 'static,
    {
        self.inner.observers.subscribe(observer)
    }
}

impl MonitorInner {
    fn lock_core(&self) -> MutexGuard<'_, MonitorCore> {
        self.core.lock()
    }

    fn verify(self: &Arc<Self>) {
        let mut core = self.lock_core();
        if core.lifecycle == Lifecycle::Stopped {
            return;
        }

        core.probe_generation += 1;
        let generation = core.probe_generation;
        let cadence = core.current_interval;

        if let Some(previous) = core.probe_task.take() {
            if !previous.is_finished() {
                debug!("Cancelling in-flight probe");
            }
            previous.abort();
        }
        // The completed probe schedules the next poll.
        core.poll_timer = None;

        let prober = self.prober.clone();
        let weak = Arc::downgrade(self);
        core.probe_task = Some(tokio::spawn(async move {
            let outcome = prober.probe().await;
            if let Some(inner) = weak.upgrade() {
                inner.complete_probe(generation, cadence, outcome);
            }
        }));
    }

    /// `cadence` is the interval in effect when the probe was issued; the
    /// next poll waits that long, so a new backoff step applies one poll later.
    fn complete_probe(
        self: &Arc<Self>,
        generation: u64,
        cadence: Duration,
        outcome: ProbeResult<()>,
    ) {
        let change = {
            let mut core = self.lock_core();
            if core.lifecycle == Lifecycle::Stopped || generation != core.probe_generation {
                debug!(generation, "Discarding superseded probe result");
                return;
            }
            core.probe_task = None;

            let previous = core.state.clone();
            match outcome {
                Ok(()) => {
                    core.state.is_online = true;
                    core.state.last_verified_online = Some(Utc::now());
                    core.state.show_offline_banner = false;
                    core.banner_timer = None;
                    core.current_interval = self.config.base_interval;
                }
                Err(e) => {
                    core.state.is_online = false;
                    core.current_interval = self.config.backoff(core.current_interval);
                    self.arm_banner_timer(&mut core);
                    debug!(
                        error = %e,
                        next_interval_ms = core.current_interval.as_millis() as u64,
                        "Reachability probe failed"
                    );
                }
            }

            self.schedule_poll(&mut core, cadence);
            transition(previous, &core.state)
        };

        if let Some(change) = &change {
            if change.online_changed() {
                info!(is_online = change.current.is_online, "Connectivity changed");
            }
        }
        self.publish(change);
    }

    fn schedule_poll(self: &Arc<Self>, core: &mut MonitorCore, delay: Duration) {
        let weak = Arc::downgrade(self);
        core.poll_timer = Some(Timer::after(delay, move || {
            if let Some(inner) = weak.upgrade() {
                inner.verify();
            }
        }));
    }

    fn arm_banner_timer(self: &Arc<Self>, core: &mut MonitorCore) {
        if core.banner_timer.is_some() || core.state.show_offline_banner {
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        core.banner_timer = Some(Timer::after(self.config.grace_period, move || {
            if let Some(inner) = weak.upgrade() {
                inner.banner_grace_elapsed();
            }
        }));
    }

    fn banner_grace_elapsed(&self) {
        let change = {
            let mut core = self.lock_core();
            if core.lifecycle == Lifecycle::Stopped {
                return;
            }
            core.banner_timer = None;
            if core.state.is_online {
                return;
            }
            let previous = core.state.clone();
            core.state.show_offline_banner = true;
            transition(previous, &core.state)
        };

        info!("Offline past grace period, showing banner");
        self.publish(change);
    }

    fn publish(&self, change: Option<ConnectivityChange>) {
        if let Some(change) = change {
            self.observers.notify(&change);
        }
    }
}

fn transition(previous: ConnectivityState, current: &ConnectivityState) -> Option<ConnectivityChange> {
    (previous != *current).then(|| ConnectivityChange {
        previous,
        current: current.clone(),
    })
}
