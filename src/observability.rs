use std::net::SocketAddr;

use crate::wire::Request;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total requests handled. Labels: op, status.
pub const REQUESTS_TOTAL: &str = "huddle_requests_total";

/// Histogram: request latency in seconds. Labels: op.
pub const REQUEST_DURATION_SECONDS: &str = "huddle_request_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "huddle_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "huddle_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "huddle_connections_rejected_total";

/// Histogram: booking-collection flush duration in seconds.
pub const STORE_FLUSH_DURATION_SECONDS: &str = "huddle_store_flush_duration_seconds";

/// Histogram: flush requests served per collection write (group commit).
pub const STORE_FLUSH_BATCH_SIZE: &str = "huddle_store_flush_batch_size";

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

/// Map a Request variant to a short label for metrics.
pub fn request_label(request: &Request) -> &'static str {
    match request {
        Request::Login { .. } => "login",
        Request::Register { .. } => "register",
        Request::Settings => "settings",
        Request::Rooms => "rooms",
        Request::CrmConfig => "crm_config",
        Request::Schedule { .. } => "schedule",
        Request::ListBookings { .. } => "list_bookings",
        Request::CreateBooking { .. } => "create_booking",
        Request::CancelBooking { .. } => "cancel_booking",
        Request::SubmitTicket { .. } => "submit_ticket",
        Request::SubmitSuggestion { .. } => "submit_suggestion",
        Request::AdminBookings { .. } => "admin_bookings",
        Request::AdminUsers { .. } => "admin_users",
        Request::AdminTickets { .. } => "admin_tickets",
        Request::AdminSuggestions { .. } => "admin_suggestions",
    }
}
