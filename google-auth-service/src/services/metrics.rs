use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// Metrics
pub static LOGINS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static RENEWALS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static STATES_SWEPT_TOTAL: OnceLock<IntCounter> = OnceLock::new();

fn register<C>(registry: &Registry, name: &str, collector: Result<C, prometheus::Error>) -> Option<C>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    let collector = match collector {
        Ok(metric) => metric,
        Err(e) => {
            tracing::error!("Failed to create {} metric: {}", name, e);
            return None;
        }
    };

    if let Err(e) = registry.register(Box::new(collector.clone())) {
        tracing::error!("Failed to register {} collector: {}", name, e);
        return None;
    }
    Some(collector)
}

/// Idempotent: only the first call installs the registry.
pub fn init_metrics() {
    if REGISTRY.get().is_some() {
        return;
    }
    let registry = Registry::new();

    let logins = register(
        &registry,
        "google_auth_logins_total",
        IntCounterVec::new(
            Opts::new("google_auth_logins_total", "Login attempts by flow and outcome"),
            &["flow", "outcome"],
        ),
    );
    let renewals = register(
        &registry,
        "google_auth_renewals_total",
        IntCounterVec::new(
            Opts::new("google_auth_renewals_total", "Lease renewals by outcome"),
            &["outcome"],
        ),
    );
    let swept = register(
        &registry,
        "google_auth_states_swept_total",
        IntCounter::new(
            "google_auth_states_swept_total",
            "Expired login states removed by sweeps",
        ),
    );

    // Initialize globals
    let _ = REGISTRY.set(registry);
    if let Some(logins) = logins {
        let _ = LOGINS_TOTAL.set(logins);
    }
    if let Some(renewals) = renewals {
        let _ = RENEWALS_TOTAL.set(renewals);
    }
    if let Some(swept) = swept {
        let _ = STATES_SWEPT_TOTAL.set(swept);
    }
}

pub fn record_login(flow: &str, outcome: &str) {
    if let Some(counter) = LOGINS_TOTAL.get() {
        counter.with_label_values(&[flow, outcome]).inc();
    }
}

pub fn record_renewal(outcome: &str) {
    if let Some(counter) = RENEWALS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_swept(count: usize) {
    if let Some(counter) = STATES_SWEPT_TOTAL.get() {
        counter.inc_by(count as u64);
    }
}

pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to convert metrics to UTF-8: {}", e);
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}
