//! Per-batch source health check (spec §4.3): summarizes how many
//! envelopes in a batch actually carried something usable.

use serde::{Deserialize, Serialize};

use crate::envelope::CandidateEnvelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Failing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHealth {
    pub status: HealthStatus,
    pub reason: &'static str,
    pub total: usize,
    pub valid: usize,
}

const LOW_VALID_RATIO: f64 = 0.5;

pub fn check_batch(total_candidates: usize, envelopes: &[CandidateEnvelope]) -> SourceHealth {
    if total_candidates == 0 {
        return SourceHealth { status: HealthStatus::Failing, reason: "no_candidates", total: 0, valid: 0 };
    }

    let valid = envelopes.iter().filter(|e| !e.canonical_job.job_url.trim().is_empty()).count();
    if valid == 0 {
        return SourceHealth {
            status: HealthStatus::Failing,
            reason: "no_valid_candidates",
            total: total_candidates,
            valid,
        };
    }

    let has_canonical_urls = envelopes.iter().any(|e| e.canonical_job.job_url.starts_with("http"));
    if !has_canonical_urls {
        return SourceHealth {
            status: HealthStatus::Degraded,
            reason: "no_canonical_job_urls",
            total: total_candidates,
            valid,
        };
    }

    let ratio = valid as f64 / total_candidates as f64;
    if ratio < LOW_VALID_RATIO {
        return SourceHealth { status: HealthStatus::Degraded, reason: "low_valid_ratio", total: total_candidates, valid };
    }

    SourceHealth { status: HealthStatus::Healthy, reason: "ok", total: total_candidates, valid }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{CandidateEnvelope, Source};

    fn envelope(url: &str) -> CandidateEnvelope {
        CandidateEnvelope::new(Source::Rss, url, serde_json::json!({}), 0)
    }

    #[test]
    fn no_candidates_is_failing() {
        let health = check_batch(0, &[]);
        assert_eq!(health.status, HealthStatus::Failing);
        assert_eq!(health.reason, "no_candidates");
    }

    #[test]
    fn all_non_http_is_degraded_no_canonical_urls() {
        let envelopes = vec![envelope("whatsapp://m1")];
        let health = check_batch(1, &envelopes);
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.reason, "no_canonical_job_urls");
    }

    #[test]
    fn low_valid_ratio_is_degraded() {
        let envelopes = vec![envelope("https://a.example/1")];
        let health = check_batch(5, &envelopes);
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.reason, "low_valid_ratio");
    }

    #[test]
    fn healthy_batch() {
        let envelopes = vec![envelope("https://a.example/1"), envelope("https://b.example/2")];
        let health = check_batch(2, &envelopes);
        assert_eq!(health.status, HealthStatus::Healthy);
    }
}
