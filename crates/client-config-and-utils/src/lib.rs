//! Core types, configuration, and utilities shared by the Momentum session crates.

mod config;
mod environment;
mod error;
mod logging;
pub mod observers;
mod paths;
pub mod timer;

pub use config::{
    Config, ConnectivitySettings, SessionSettings, DEFAULT_IDENTITY_PUBLISHABLE_KEY,
    DEFAULT_IDENTITY_URL, DEFAULT_LOG_LEVEL,
};
pub use environment::Environment;
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use observers::{ObserverRegistry, Subscription};
pub use paths::Paths;
pub use timer::Timer;
