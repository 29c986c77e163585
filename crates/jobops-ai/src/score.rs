//! AI reason (score) stage output contract, the final-score formula, and
//! the deterministic tie-break between target judgments.

use serde::{Deserialize, Serialize};

use crate::error::AiError;
use crate::prompt::strip_code_fences;

/// Default weights per spec §4.5; exposed as configuration rather than
/// hard-coded, since the exact formula was an open question in the source.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub w_must: f64,
    pub w_nice: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { w_must: 0.7, w_nice: 0.3 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PotentialContact {
    pub name: Option<String>,
    pub role: Option<String>,
    pub linkedin_url: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringJudgment {
    pub primary_target_id: String,
    pub score_must: f64,
    pub score_nice: f64,
    pub final_score: f64,
    pub reject_triggered: u8,
    pub reason_top_matches: String,
    #[serde(default)]
    pub potential_contacts: Vec<PotentialContact>,
}

pub fn parse_scoring_response(response: &str) -> Result<ScoringJudgment, AiError> {
    let json_str = strip_code_fences(response);
    serde_json::from_str(json_str).map_err(|e| AiError::Parse(e.to_string()))
}

/// `final_score = clip(w_must*score_must + w_nice*score_nice - reject_penalty, 0, 100)`.
pub fn compute_final_score(score_must: f64, score_nice: f64, reject_penalty: f64, weights: ScoreWeights) -> f64 {
    let raw = weights.w_must * score_must + weights.w_nice * score_nice - reject_penalty;
    raw.clamp(0.0, 100.0)
}

/// Deterministic tie-break across multiple per-target judgments: higher
/// `final_score`, then higher `score_must`, then lexicographic target id.
pub fn pick_primary(judgments: &[ScoringJudgment]) -> Option<&ScoringJudgment> {
    judgments.iter().max_by(|a, b| {
        a.final_score
            .partial_cmp(&b.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.score_must.partial_cmp(&b.score_must).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| b.primary_target_id.cmp(&a.primary_target_id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn judgment(id: &str, final_score: f64, score_must: f64) -> ScoringJudgment {
        ScoringJudgment {
            primary_target_id: id.into(),
            score_must,
            score_nice: 0.0,
            final_score,
            reject_triggered: 0,
            reason_top_matches: String::new(),
            potential_contacts: vec![],
        }
    }

    #[test]
    fn compute_final_score_clips_to_range() {
        let weights = ScoreWeights::default();
        assert_eq!(compute_final_score(100.0, 100.0, 0.0, weights), 100.0);
        assert_eq!(compute_final_score(0.0, 0.0, 50.0, weights), 0.0);
        assert!((compute_final_score(80.0, 50.0, 0.0, weights) - 71.0).abs() < 1e-9);
    }

    #[test]
    fn pick_primary_breaks_ties_by_final_score_then_score_must_then_id() {
        let judgments = vec![judgment("b", 50.0, 40.0), judgment("a", 50.0, 40.0)];
        let winner = pick_primary(&judgments).unwrap();
        assert_eq!(winner.primary_target_id, "a");
    }

    #[test]
    fn pick_primary_prefers_higher_final_score() {
        let judgments = vec![judgment("a", 40.0, 90.0), judgment("b", 60.0, 10.0)];
        let winner = pick_primary(&judgments).unwrap();
        assert_eq!(winner.primary_target_id, "b");
    }

    #[test]
    fn pick_primary_on_empty_returns_none() {
        assert!(pick_primary(&[]).is_none());
    }

    #[test]
    fn parses_scoring_response() {
        let response = r#"{
            "primary_target_id": "t1",
            "score_must": 80,
            "score_nice": 60,
            "final_score": 74,
            "reject_triggered": 0,
            "reason_top_matches": "strong rust match"
        }"#;
        let judgment = parse_scoring_response(response).unwrap();
        assert_eq!(judgment.primary_target_id, "t1");
        assert_eq!(judgment.reject_triggered, 0);
    }
}
