//! Sensor Anomaly Lab Pipeline
//!
//! Configuration, logging setup and the pipeline steps behind the
//! `anomaly-lab` command-line tool.

pub mod commands;
pub mod config;

pub use crate::config::{load_config, LabConfig};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter directive: an explicit `--log-level` beats `RUST_LOG`, which beats
/// the configured level
pub fn log_filter(flag: Option<&str>, env: Option<&str>, configured: &str) -> String {
    flag.or(env.filter(|e| !e.trim().is_empty()))
        .unwrap_or(configured)
        .to_string()
}

/// Install the global subscriber with the directive chosen by [`log_filter`].
///
/// Calling it twice keeps the first subscriber.
pub fn init_logging(flag: Option<&str>, configured: &str, json: bool) {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = log_filter(flag, env.as_deref(), configured);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(configured));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
