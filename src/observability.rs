use std::net::SocketAddr;
use std::time::Instant;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total engine operations. Labels: op, status.
pub const OPS_TOTAL: &str = "slotbook_ops_total";

/// Histogram: operation latency in seconds. Labels: op.
pub const OP_DURATION_SECONDS: &str = "slotbook_op_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL commit duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "slotbook_wal_flush_duration_seconds";

/// Histogram: events per WAL commit.
pub const WAL_FLUSH_BATCH_SIZE: &str = "slotbook_wal_flush_batch_size";

/// Gauge: waitlist entries currently queued.
pub const WAITLIST_DEPTH: &str = "slotbook_waitlist_depth";

/// Install a Prometheus metrics exporter on the given port. No-op if `port`
/// is `None`; embedders that run their own recorder skip this.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Record one engine operation's outcome and latency.
pub(crate) fn record_op(op: &'static str, started: Instant, ok: bool) {
    metrics::counter!(OPS_TOTAL, "op" => op, "status" => if ok { "ok" } else { "error" }).increment(1);
    metrics::histogram!(OP_DURATION_SECONDS, "op" => op).record(started.elapsed().as_secs_f64());
}
