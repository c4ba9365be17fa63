//! Actively verified connectivity for the Momentum client.
//!
//! This crate provides:
//! - A reachability [`Prober`] and its HTTP implementation
//! - A [`ConnectivityMonitor`] that probes on an adaptive cadence, reacts to
//!   OS online/offline hints, and debounces the offline banner
//!
//! OS network events are treated as hints only. `is_online` reflects the last
//! probe, except that an OS offline event is trusted immediately.

mod error;
mod monitor;
mod prober;
mod state;


pub use error::{ProbeError, ProbeResult};
pub use monitor::ConnectivityMonitor;
pub use prober::{cache_busted_url, HttpProber, Prober, CACHE_BUST_PARAM};
pub use state::{ConnectivityChange, ConnectivityConfig, ConnectivityState};
