//! Manual adapter: one envelope per pasted URL.

use crate::envelope::{CandidateEnvelope, Source};

pub fn ingest(raw_urls: &[String], ingest_timestamp: i64) -> Vec<CandidateEnvelope> {
    raw_urls
        .iter()
        .map(|url| CandidateEnvelope::new(Source::Manual, url.clone(), serde_json::json!({ "raw_url": url }), ingest_timestamp))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_envelope_per_url() {
        let urls = vec!["https://a.example/1".to_string(), "https://b.example/2".to_string()];
        let envelopes = ingest(&urls, 1_700_000_000);
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].canonical_job.job_url, "https://a.example/1");
        assert_eq!(envelopes[1].source, Source::Manual);
    }
}
