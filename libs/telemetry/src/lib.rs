//! Logging and metrics plumbing shared by the courier crates.
//!
//! `install` wires a `tracing-subscriber` registry for binaries; libraries only
//! emit through `tracing` macros and [`record_counter`].

use anyhow::Result;

mod config;
mod context;
mod metrics;
mod tracing_init;

pub use config::TelemetryConfig;
pub use context::TelemetryLabels;
pub use crate::metrics::{record_counter, set_telemetry_enabled, telemetry_enabled};
pub use tracing_init::init_telemetry;

/// Installs the shared subscriber configured from `RUST_LOG` and `LOG_FORMAT`.
pub fn install(service_name: &str) -> Result<()> {
    init_telemetry(TelemetryConfig::from_env(service_name, env!("CARGO_PKG_VERSION")))
}
