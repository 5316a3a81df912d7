//! Telemetry utilities for handler timing and tracing spans.

use std::time::Instant;

/// Guard for timing record handling and recording metrics.
///
/// Records handler latency when dropped.
pub struct RecordTimer {
    kind: &'static str,
    start: Instant,
}

impl RecordTimer {
    /// Start timing a record of the given kind.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            start: Instant::now(),
        }
    }
}

impl Drop for RecordTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_record(self.kind, duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, debug_span, info_span};

    /// Span for a lane task.
    pub fn lane(index: usize) -> Span {
        info_span!("lane", lane = index)
    }

    /// Span for handling one inbound record.
    pub fn record(kind: &str, session: &str, name: Option<&str>) -> Span {
        if let Some(name) = name {
            debug_span!("record", kind = %kind, session = %session, name = %name)
        } else {
            debug_span!("record", kind = %kind, session = %session)
        }
    }
}
