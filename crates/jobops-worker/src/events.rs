//! Shared sink for `Event` rows emitted by `jobops_core::apply_transition`.
//! `apply_transition` is the sole writer of lifecycle columns and always
//! returns the `Event` describing what it did; every call site routes the
//! event through here so it actually lands in the `events` table instead of
//! being dropped on the floor.

use jobops_core::Event;
use jobops_evidence::EvidenceStore;
use tracing::warn;

/// Persists `event` via `EvidenceStore::insert_event`, logging (not
/// propagating) a failure — losing an audit row must never fail the
/// request that produced it.
pub async fn persist(evidence: &EvidenceStore, event: Event) {
    if let Err(e) = evidence.insert_event(&event.event_type, event.job_key.as_deref(), event.payload).await {
        warn!(event_type = %event.event_type, job_key = ?event.job_key, error = %e, "failed to persist event");
    }
}
