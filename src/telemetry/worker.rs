//! Worker and item span helpers.

use std::path::Path;

use tracing::Span;

use crate::model::{ItemOutcome, WorkerId};

/// Span covering a worker's whole run.
pub fn worker_span(worker_id: WorkerId) -> Span {
    tracing::info_span!("worker.run", "worker.id" = %worker_id)
}

/// Span for one claimed item. `item.outcome` is filled in by
/// [`record_outcome`].
pub fn item_span(worker_id: WorkerId, source: &Path) -> Span {
    tracing::info_span!(
        "worker.item",
        "worker.id" = %worker_id,
        "item.source" = %source.display(),
        "item.outcome" = tracing::field::Empty,
    )
}

pub fn record_outcome(span: &Span, outcome: ItemOutcome) {
    span.record("item.outcome", outcome.as_str());
}
