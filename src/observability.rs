use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: mutation requests sent to the remote. Labels: op, status.
pub const REMOTE_REQUESTS_TOTAL: &str = "toolroom_remote_requests_total";

/// Counter: remote calls that failed (network or error-status). Labels: op.
pub const REMOTE_FAILURES_TOTAL: &str = "toolroom_remote_failures_total";

// ── State health ────────────────────────────────────────────────

/// Counter: optimistic mutations rolled back to their snapshot. Labels: op.
pub const ROLLBACKS_TOTAL: &str = "toolroom_rollbacks_total";

/// Counter: full-dataset reconciliation fetches that replaced local state.
pub const RECONCILIATIONS_TOTAL: &str = "toolroom_reconciliations_total";

/// Counter: history rows whose status blob failed to parse and degraded to
/// an empty item map.
pub const HISTORY_PARSE_FAILURES_TOTAL: &str = "toolroom_history_parse_failures_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
