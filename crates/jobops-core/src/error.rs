//! Typed errors for the core crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("fetch timed out")]
    FetchTimeout,
    #[error("fetch forbidden (host returned an auth/challenge response)")]
    FetchForbidden,
    #[error("fetch returned an empty body")]
    EmptyBody,
    #[error("fetch failed: {0}")]
    FetchOther(String),
    #[error("transition blocked: job {job_key} is in terminal status")]
    TerminalStateLocked { job_key: String },
}
