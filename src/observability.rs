use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "roomcal_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "roomcal_query_duration_seconds";

/// Counter: submissions rejected because the slot was taken.
pub const CONFLICTS_TOTAL: &str = "roomcal_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "roomcal_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "roomcal_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "roomcal_connections_rejected_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "roomcal_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "roomcal_wal_flush_batch_size";

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

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertRoomType { .. } => "insert_room_type",
        Command::UpdateRoomType { .. } => "update_room_type",
        Command::DeleteRoomType { .. } => "delete_room_type",
        Command::SelectRoomTypes { .. } => "select_room_types",
        Command::InsertBooking { .. } => "insert_booking",
        Command::DeleteBooking { .. } => "delete_booking",
        Command::InsertEvent { .. } => "insert_event",
        Command::UpdateEvent { .. } => "update_event",
        Command::DeleteEvent { .. } => "delete_event",
        Command::SelectCalendar { .. } => "select_calendar",
        Command::SelectEntries { .. } => "select_entries",
        Command::SelectFreeSlots { .. } => "select_free_slots",
        Command::Listen { .. } => "listen",
        Command::Unlisten { .. } => "unlisten",
        Command::UnlistenAll => "unlisten_all",
    }
}
