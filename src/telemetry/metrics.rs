//! Metric instrument factories for watchq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`; with
//! no provider installed the instruments are no-ops.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};

use crate::model::ItemOutcome;

fn meter() -> Meter {
    opentelemetry::global::meter("watchq")
}

/// Counter: work items added to the queue.
/// Labels: `source` ("scan" | "notification").
pub fn items_enqueued() -> Counter<u64> {
    meter()
        .u64_counter("watchq.items.enqueued")
        .with_description("Number of work items added to the queue")
        .build()
}

/// Counter: work items a worker finished with.
/// Labels: `outcome` ("processed" | "skipped" | "failed").
pub fn items_completed() -> Counter<u64> {
    meter()
        .u64_counter("watchq.items.completed")
        .with_description("Number of claimed work items, by outcome")
        .build()
}

/// Counter: workers spawned by the pool.
pub fn workers_spawned() -> Counter<u64> {
    meter()
        .u64_counter("watchq.workers.spawned")
        .with_description("Number of workers spawned")
        .build()
}

/// Histogram: time spent on one item in milliseconds.
/// Labels: `outcome`.
pub fn item_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("watchq.item.duration_ms")
        .with_description("Per-item processing duration in milliseconds")
        .with_unit("ms")
        .build()
}

pub fn record_enqueued(source: &'static str, count: u64) {
    if count > 0 {
        items_enqueued().add(count, &[KeyValue::new("source", source)]);
    }
}

pub fn record_completed(outcome: ItemOutcome, duration_ms: f64) {
    let labels = [KeyValue::new("outcome", outcome.as_str())];
    items_completed().add(1, &labels);
    item_duration_ms().record(duration_ms, &labels);
}
