//! JobOps Evidence - Postgres-backed evidence and contact ledger (C7).

pub mod schema;
pub mod store;

pub use schema::{Channel, Contact, ContactTouchpoint, EventRow, JobEvidence, RequirementType, TouchpointStatus};
pub use store::{EvidenceStore, StoreError};
