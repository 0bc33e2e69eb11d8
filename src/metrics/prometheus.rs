use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus HTTP exporter on `addr`.
/// After this call, any metrics recorded via the `metrics` crate
/// macros (counter!, histogram!) are exported at /metrics.
/// Without it the macros are no-ops.
pub fn init_metrics_server(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|err| anyhow::anyhow!("failed to start Prometheus metrics server: {err}"))
}

// ── Poller metrics ───────────────────────────────────────────────

pub fn record_cycle(poller: &str, outcome: &str) {
    counter!("poll_cycles_total", "poller" => poller.to_string(), "outcome" => outcome.to_string())
        .increment(1);
}

/// Fetch plus reconcile, excluding the wait before the next cycle.
pub fn record_cycle_latency(poller: &str, elapsed: Duration) {
    histogram!("poll_cycle_latency_ms", "poller" => poller.to_string())
        .record(elapsed.as_secs_f64() * 1_000.0);
}

pub fn record_backoff() {
    counter!("poll_backoffs_total").increment(1);
}

// ── Reconciler metrics ───────────────────────────────────────────

pub fn record_patch(page: &str, kind: &str) {
    counter!("view_patches_total", "page" => page.to_string(), "kind" => kind.to_string())
        .increment(1);
}

pub fn record_reload() {
    counter!("page_reloads_total").increment(1);
}
