//! Typed errors for the source adapters.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("feed parse failed: {0}")]
    FeedParse(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
}
