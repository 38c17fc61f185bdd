use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: bookings created.
pub const BOOKINGS_CREATED_TOTAL: &str = "otbook_bookings_created_total";

/// Counter: creations rejected by the conflict check or exclusion rule.
pub const BOOKING_CONFLICTS_TOTAL: &str = "otbook_booking_conflicts_total";

/// Counter: explicit status transitions. Labels: status.
pub const STATUS_TRANSITIONS_TOTAL: &str = "otbook_status_transitions_total";

/// Counter: bookings auto-completed by the past-date sweep.
pub const BOOKINGS_AUTOCOMPLETED_TOTAL: &str = "otbook_bookings_autocompleted_total";

/// Counter: bookings deleted.
pub const BOOKINGS_DELETED_TOTAL: &str = "otbook_bookings_deleted_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Counter: store calls that failed as unavailable.
pub const STORE_ERRORS_TOTAL: &str = "otbook_store_errors_total";

/// Install the fmt tracing subscriber. Call once from the embedding
/// application; tests rely on the default no-op subscriber instead.
pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init_metrics(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
