//! JobOps AI - LLM-backed extraction and scoring for the scoring pipeline (C5).

pub mod client;
pub mod error;
pub mod extract;
pub mod prompt;
pub mod score;

pub use client::{HttpLlmClient, LlmClient, LlmCompletion, LlmProvider, MockLlmClient};
pub use error::AiError;
pub use extract::{parse_extraction_response, ExtractionResult};
pub use score::{compute_final_score, parse_scoring_response, pick_primary, PotentialContact, ScoreWeights, ScoringJudgment};
