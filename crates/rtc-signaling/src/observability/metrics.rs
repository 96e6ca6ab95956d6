//! Metrics definitions for the signaling layer.
//!
//! All metrics follow Prometheus naming conventions:
//! - `rtc_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `status`: success, error
//! - `operation`: publish, stop_publishing, subscribe, unsubscribe
//! - `outcome`: applied plus one value per no-op reason, or error
//! - `actor_type`: registry, room
//!
//! Room and user identifiers never appear as labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus metrics recorder and return the handle used to
/// render the scrape output.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Negotiation runs parse + transport allocation; p99 well under 250ms
        .set_buckets_for_metric(
            Matcher::Prefix("rtc_negotiation".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set negotiation buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Rooms & Sessions (Gauges)
// ============================================================================

/// Metric: `rtc_rooms_active`
pub fn set_rooms_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("rtc_rooms_active").set(count as f64);
}

/// Metric: `rtc_sessions_active`
///
/// Moved by deltas from each room actor, so the sum spans all rooms.
pub fn session_opened() {
    gauge!("rtc_sessions_active").increment(1.0);
}

/// Metric: `rtc_sessions_active`
pub fn session_closed() {
    gauge!("rtc_sessions_active").decrement(1.0);
}

/// Record a session force-closed by a newer join of the same user.
///
/// Metric: `rtc_session_preemptions_total`
pub fn record_preemption() {
    counter!("rtc_session_preemptions_total").increment(1);
}

// ============================================================================
// Negotiation
// ============================================================================

/// Record one offer/answer exchange.
///
/// Metrics: `rtc_negotiations_total`, `rtc_negotiation_duration_seconds`
/// Labels: `status` (success, error)
pub fn record_negotiation(status: &str, duration: Duration) {
    counter!("rtc_negotiations_total", "status" => status.to_string()).increment(1);
    histogram!("rtc_negotiation_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());
}

// ============================================================================
// Tracks
// ============================================================================

/// Metric: `rtc_track_operations_total`
/// Labels: `operation`, `outcome`
pub fn record_track_operation(operation: &str, outcome: &str) {
    counter!(
        "rtc_track_operations_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

// ============================================================================
// Actors & Channels
// ============================================================================

/// Metric: `rtc_actor_panics_total`
/// Labels: `actor_type`
pub fn record_actor_panic(actor_type: &str) {
    counter!("rtc_actor_panics_total", "actor_type" => actor_type.to_string()).increment(1);
}

/// Record a notification dropped because the client channel was full.
///
/// Metric: `rtc_events_dropped_total`
pub fn record_event_dropped() {
    counter!("rtc_events_dropped_total").increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    // These run against the global no-op recorder when none is installed.

    #[test]
    fn test_gauges() {
        set_rooms_active(0);
        set_rooms_active(12);
        session_opened();
        session_closed();
    }

    #[test]
    fn test_counters_and_histograms() {
        record_preemption();
        record_negotiation("success", Duration::from_millis(4));
        record_negotiation("error", Duration::from_micros(300));
        record_track_operation("publish", "applied");
        record_track_operation("subscribe", "track_not_found");
        record_actor_panic("room");
        record_event_dropped();
    }

    #[test]
    fn test_metric_names_recorded() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            set_rooms_active(3);
            session_opened();
            session_opened();
            record_preemption();
            record_negotiation("success", Duration::from_millis(10));
            record_track_operation("publish", "duplicate_track");
            record_actor_panic("registry");
            record_event_dropped();
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let names: Vec<String> = snapshot
            .iter()
            .map(|(key, _, _, _)| key.key().name().to_string())
            .collect();

        for expected in [
            "rtc_rooms_active",
            "rtc_sessions_active",
            "rtc_session_preemptions_total",
            "rtc_negotiations_total",
            "rtc_negotiation_duration_seconds",
            "rtc_track_operations_total",
            "rtc_actor_panics_total",
            "rtc_events_dropped_total",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }

        let sessions = snapshot
            .iter()
            .find(|(key, _, _, _)| key.key().name() == "rtc_sessions_active")
            .map(|(_, _, _, value)| value.clone())
            .unwrap();
        assert!(matches!(sessions, DebugValue::Gauge(v) if v.into_inner() == 2.0));
    }
}
