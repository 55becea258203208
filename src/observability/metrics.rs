//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatcher_requests_total` (counter): requests routed to a mount, by mount and kind
//! - `dispatcher_fallback_total` (counter): requests handed to the parent unchanged
//! - `dispatcher_short_circuit_total` (counter): hook short-circuits, by stage
//! - `dispatcher_request_duration_seconds` (histogram): dispatch latency of mounted requests
//! - `dispatcher_mounts` (gauge): mounts in the current snapshot
//!
//! Recording is a no-op until a recorder is installed with [`init_metrics`].

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::dispatch::application::AppKind;
use crate::dispatch::hooks::HookStage;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_dispatch(mount: &str, kind: AppKind, start: Instant) {
    ::metrics::counter!(
        "dispatcher_requests_total",
        "mount" => mount.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
    ::metrics::histogram!("dispatcher_request_duration_seconds")
        .record(start.elapsed().as_secs_f64());
}

pub fn record_fallback() {
    ::metrics::counter!("dispatcher_fallback_total").increment(1);
}

pub fn record_short_circuit(stage: HookStage) {
    ::metrics::counter!("dispatcher_short_circuit_total", "stage" => stage.to_string())
        .increment(1);
}

pub fn record_mounts(count: usize) {
    ::metrics::gauge!("dispatcher_mounts").set(count as f64);
}
