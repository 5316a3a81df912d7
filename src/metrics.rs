//! Prometheus metrics collection for relayd.
//!
//! Metrics live in a private registry and are exposed on `/metrics` by
//! [`crate::http`] when a metrics port is configured. Recording before
//! [`init`] is a no-op, which keeps unit tests free of global setup.
//!
//! - `relay_records_total{kind}` - inbound records handled, by kind
//! - `relay_record_duration_seconds{kind}` - handler latency
//! - `relay_lane_sessions{lane}` - sessions bound to each lane

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Messages handed to a live recipient's lane.
pub static MESSAGES_RELAYED: OnceLock<IntCounter> = OnceLock::new();

/// Messages parked in the offline store.
pub static MESSAGES_QUEUED: OnceLock<IntCounter> = OnceLock::new();

/// Offline messages replayed on login.
pub static MESSAGES_REPLAYED: OnceLock<IntCounter> = OnceLock::new();

/// Frames dropped because a session's outbound queue was full.
pub static OUTBOUND_DROPPED: OnceLock<IntCounter> = OnceLock::new();

/// Messages held back because a session's outbound queue was full.
pub static OUTBOUND_BACKLOGGED: OnceLock<IntCounter> = OnceLock::new();

/// Login attempts by result.
pub static LOGINS: OnceLock<IntCounterVec> = OnceLock::new();

/// Inbound records handled, by kind.
pub static RECORD_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

/// Handler latency by record kind.
pub static RECORD_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Handler errors by record kind and error code.
pub static HANDLER_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges (can increase/decrease)
// ========================================================================

/// Currently connected sessions.
pub static CONNECTED_SESSIONS: OnceLock<IntGauge> = OnceLock::new();

/// Currently authenticated sessions.
pub static AUTHENTICATED_SESSIONS: OnceLock<IntGauge> = OnceLock::new();

/// Sessions bound to each lane.
pub static LANE_SESSIONS: OnceLock<IntGaugeVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before metrics are scraped.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(MESSAGES_RELAYED, IntCounter::new("relay_messages_relayed_total", "Messages delivered to a live recipient"));
    register!(MESSAGES_QUEUED, IntCounter::new("relay_messages_queued_total", "Messages queued for an offline recipient"));
    register!(MESSAGES_REPLAYED, IntCounter::new("relay_messages_replayed_total", "Offline messages replayed on login"));
    register!(OUTBOUND_DROPPED, IntCounter::new("relay_outbound_dropped_total", "Frames dropped on a full outbound queue"));
    register!(OUTBOUND_BACKLOGGED, IntCounter::new("relay_outbound_backlogged_total", "Messages held on a full outbound queue"));
    register!(LOGINS, IntCounterVec::new(Opts::new("relay_logins_total", "Login attempts by result"), &["result"]));
    register!(RECORD_COUNTER, IntCounterVec::new(Opts::new("relay_records_total", "Inbound records handled by kind"), &["kind"]));
    register!(RECORD_LATENCY, HistogramVec::new(
        HistogramOpts::new("relay_record_duration_seconds", "Handler latency by record kind")
            .buckets(vec![0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        &["kind"]));
    register!(HANDLER_ERRORS, IntCounterVec::new(Opts::new("relay_handler_errors_total", "Handler errors by kind and code"), &["kind", "error"]));
    register!(CONNECTED_SESSIONS, IntGauge::new("relay_connected_sessions", "Currently connected sessions"));
    register!(AUTHENTICATED_SESSIONS, IntGauge::new("relay_authenticated_sessions", "Currently authenticated sessions"));
    register!(LANE_SESSIONS, IntGaugeVec::new(Opts::new("relay_lane_sessions", "Sessions bound to each lane"), &["lane"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

#[inline]
fn inc(metric: &OnceLock<IntCounter>) {
    if let Some(c) = metric.get() {
        c.inc();
    }
}

#[inline]
pub fn record_relayed() {
    inc(&MESSAGES_RELAYED);
}

#[inline]
pub fn record_queued() {
    inc(&MESSAGES_QUEUED);
}

#[inline]
pub fn record_replayed(count: usize) {
    if let Some(c) = MESSAGES_REPLAYED.get() {
        c.inc_by(count as u64);
    }
}

#[inline]
pub fn record_outbound_dropped() {
    inc(&OUTBOUND_DROPPED);
}

#[inline]
pub fn record_outbound_backlogged() {
    inc(&OUTBOUND_BACKLOGGED);
}

#[inline]
pub fn record_login(accepted: bool) {
    if let Some(c) = LOGINS.get() {
        c.with_label_values(&[if accepted { "accepted" } else { "duplicate" }]).inc();
    }
}

/// Record a handled record with latency.
#[inline]
pub fn record_record(kind: &str, duration_secs: f64) {
    if let Some(c) = RECORD_COUNTER.get() {
        c.with_label_values(&[kind]).inc();
    }
    if let Some(h) = RECORD_LATENCY.get() {
        h.with_label_values(&[kind]).observe(duration_secs);
    }
}

/// Record a handler error.
#[inline]
pub fn record_handler_error(kind: &str, error: &str) {
    if let Some(c) = HANDLER_ERRORS.get() {
        c.with_label_values(&[kind, error]).inc();
    }
}

#[inline]
pub fn inc_connected() {
    if let Some(g) = CONNECTED_SESSIONS.get() {
        g.inc();
    }
}

#[inline]
pub fn dec_connected() {
    if let Some(g) = CONNECTED_SESSIONS.get() {
        g.dec();
    }
}

#[inline]
pub fn set_authenticated(count: usize) {
    if let Some(g) = AUTHENTICATED_SESSIONS.get() {
        g.set(count as i64);
    }
}

/// Update a lane's session gauge.
#[inline]
pub fn set_lane_load(lane: usize, load: usize) {
    if let Some(g) = LANE_SESSIONS.get() {
        g.with_label_values(&[&lane.to_string()]).set(load as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_lifecycle() {
        init();

        record_record("login", 0.001);
        record_handler_error("message", "malformed");
        set_lane_load(0, 3);

        let output = gather_metrics();
        assert!(output.contains("relay_records_total"));
        assert!(output.contains("relay_handler_errors_total"));
        assert!(output.contains("relay_lane_sessions{lane=\"0\"} 3"));
    }
}
