//! Typed errors for the AI crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("LLM provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("LLM HTTP call failed: {0}")]
    Http(String),
    #[error("could not parse LLM response as JSON: {0}")]
    Parse(String),
}
