//! JobOps Core - canonicalization, JD resolution, and the lifecycle state machine.
//!
//! This crate has no I/O of its own: HTTP fetching is injected through the
//! `Fetcher` trait, and persistence lives in `jobops-evidence`/`jobops-worker`.

pub mod canonicalize;
pub mod error;
pub mod html;
pub mod jd_resolver;
pub mod lifecycle;
pub mod model;
pub mod quality;

pub use canonicalize::{canonicalize, canonicalize_with, job_key_for, Canonical, CanonicalizerConfig};
pub use error::CoreError;
pub use jd_resolver::{resolve, FetchError, Fetcher, FetchedPage, JdResolverConfig, ResolveInput, ResolveOutput};
pub use lifecycle::{apply_transition, Transition};
pub use model::{
    Event, FetchStatus, Job, JdConfidence, JdSource, JobStatus, ScoringFinalStatus, ScoringRun, ScoringSource, StageMetric, StageStatus,
    SystemStatus, Target,
};
