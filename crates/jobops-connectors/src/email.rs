//! Email adapter: pulls candidate URLs out of plain text and HTML bodies
//! and carries the raw email as passthrough context for the JD resolver's
//! email fallback path.

use std::sync::OnceLock;

use regex::Regex;

use crate::envelope::{CandidateEnvelope, Source};

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s"'<>]+"#).unwrap())
}

#[derive(Debug, Clone, Default)]
pub struct EmailPayload {
    pub subject: Option<String>,
    pub from: Option<String>,
    pub text: Option<String>,
    pub html: Option<String>,
}

pub fn ingest(payload: EmailPayload, ingest_timestamp: i64) -> Vec<CandidateEnvelope> {
    let decoded_html = payload.html.as_deref().map(|h| html_escape::decode_html_entities(h).into_owned());

    let mut seen = std::collections::HashSet::new();
    let mut urls = Vec::new();
    for haystack in [payload.text.as_deref(), decoded_html.as_deref()].into_iter().flatten() {
        for m in url_re().find_iter(haystack) {
            let url = m.as_str().trim_end_matches(['.', ',', ')', ']']).to_string();
            if seen.insert(url.clone()) {
                urls.push(url);
            }
        }
    }

    urls.into_iter()
        .map(|url| {
            let mut envelope =
                CandidateEnvelope::new(Source::Email, url.clone(), serde_json::json!({ "extracted_from": "email" }), ingest_timestamp);
            envelope.email_subject = payload.subject.clone();
            envelope.email_from = payload.from.clone();
            envelope.email_text = payload.text.clone();
            envelope.email_html = payload.html.clone();
            envelope
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_urls_from_plain_text_and_html() {
        let payload = EmailPayload {
            subject: Some("New opening".into()),
            from: Some("recruiter@acme.example".into()),
            text: Some("Check this out: https://boards.greenhouse.io/acme/jobs/1 thanks!".into()),
            html: Some("<a href=\"https://boards.greenhouse.io/acme/jobs/2\">apply</a> &amp; more".into()),
        };
        let envelopes = ingest(payload, 1_700_000_000);
        let urls: Vec<_> = envelopes.iter().map(|e| e.canonical_job.job_url.clone()).collect();
        assert!(urls.contains(&"https://boards.greenhouse.io/acme/jobs/1".to_string()));
        assert!(urls.contains(&"https://boards.greenhouse.io/acme/jobs/2".to_string()));
    }

    #[test]
    fn carries_email_context_for_jd_fallback() {
        let payload = EmailPayload {
            subject: None,
            from: None,
            text: Some("https://example.com/job".into()),
            html: None,
        };
        let envelopes = ingest(payload, 0);
        assert_eq!(envelopes.len(), 1);
        assert!(envelopes[0].email_text.is_some());
    }

    #[test]
    fn dedupes_identical_urls_across_text_and_html() {
        let payload = EmailPayload {
            subject: None,
            from: None,
            text: Some("https://example.com/job".into()),
            html: Some("<a href=\"https://example.com/job\">apply</a>".into()),
        };
        let envelopes = ingest(payload, 0);
        assert_eq!(envelopes.len(), 1);
    }
}
