//! Logging bootstrap for Momentum binaries.
//!
//! Stderr always gets compact output. The JSONL file sink is opt-in through
//! `MOMENTUM_LOG_FILE`.

use observability::LogConfig;
use std::path::PathBuf;

const LOG_FILE_ENV: &str = "MOMENTUM_LOG_FILE";

/// Install the global subscriber for `service_name`.
///
/// `level` is the fallback filter when `RUST_LOG` is unset.
pub fn init_logging(service_name: &str, level: &str) {
    let log_path = std::env::var(LOG_FILE_ENV)
        .ok()
        .and_then(|raw| resolve_log_file(&raw, observability::default_log_path()));

    observability::init_with_config(LogConfig {
        service_name: service_name.to_string(),
        default_level: level.to_string(),
        log_path,
        also_stderr: true,
    });
}

/// `MOMENTUM_LOG_FILE` semantics: empty, `0` or `false` disable the sink,
/// `1` or `true` select `default`, anything else is taken as a path.
fn resolve_log_file(raw: &str, default: Option<PathBuf>) -> Option<PathBuf> {
    let value = raw.trim();
    if value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false") {
        None
    } else if value == "1" || value.eq_ignore_ascii_case("true") {
        default
    } else {
        Some(PathBuf::from(value))
    }
}
