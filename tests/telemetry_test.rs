//! Integration tests for telemetry initialization and span helpers.

use std::path::Path;

use watchq::model::{ItemOutcome, WorkerId};
use watchq::telemetry::{TelemetryConfig, init_telemetry, metrics, worker};

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be set once per process, so a second
    // initialization elsewhere in this binary may return Err; that is fine.
    let config = TelemetryConfig {
        endpoint: None,
        service_name: "watchq-test".to_string(),
        default_filter: "debug".to_string(),
    };
    let _guard = init_telemetry(config);
}

#[test]
fn worker_spans_record_outcome() {
    let id = WorkerId::new();
    let _run = worker::worker_span(id).entered();
    let span = worker::item_span(id, Path::new("/in/a.txt"));
    worker::record_outcome(&span, ItemOutcome::Skipped);
}

#[test]
fn metrics_record_without_provider() {
    metrics::record_enqueued("scan", 3);
    metrics::record_enqueued("notification", 0);
    metrics::record_completed(ItemOutcome::Processed, 1.5);
    metrics::workers_spawned().add(2, &[]);
}

#[test]
fn worker_id_displays_short_form() {
    let id = WorkerId::new();
    assert_eq!(id.to_string().len(), 8);
    assert!(id.0.to_string().starts_with(&id.to_string()));
}
