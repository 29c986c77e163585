//! JobOps Connectors - source adapters that turn heterogeneous payloads
//! (manual paste, email, RSS/Atom, chat webhooks) into canonical ingest
//! envelopes.

pub mod chat;
pub mod email;
pub mod envelope;
pub mod error;
pub mod fetcher;
pub mod health;
pub mod manual;
pub mod rss;

pub use envelope::{CandidateEnvelope, CanonicalJob, Source};
pub use error::ConnectorError;
pub use fetcher::{MockFetcher, ReqwestFetcher};
pub use health::{check_batch, HealthStatus, SourceHealth};
