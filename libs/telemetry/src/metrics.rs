use std::sync::atomic::{AtomicBool, Ordering};

use metrics::Label;

use crate::context::TelemetryLabels;

static TELEMETRY_ENABLED: AtomicBool = AtomicBool::new(false);

/// Whether counters are forwarded to the installed `metrics` recorder.
pub fn telemetry_enabled() -> bool {
    TELEMETRY_ENABLED.load(Ordering::SeqCst)
}

pub fn set_telemetry_enabled(enabled: bool) {
    TELEMETRY_ENABLED.store(enabled, Ordering::SeqCst);
}

pub fn record_counter(name: &'static str, value: u64, labels: &TelemetryLabels) {
    if !telemetry_enabled() {
        return;
    }
    let labels: Vec<Label> = labels
        .tags()
        .into_iter()
        .map(|(key, value)| Label::new(key, value))
        .collect();
    metrics::counter!(name, labels).increment(value);
}
