//! RSS/Atom adapter: parses feed items, unwraps common tracking-redirect
//! wrappers, and applies allow/block keyword filters before emitting
//! envelopes.

use feed_rs::parser;
use url::Url;

use crate::envelope::{CandidateEnvelope, Source};
use crate::error::ConnectorError;

/// Query params that wrap the real destination URL (Google Alerts, feed
/// aggregator redirectors, ...). Unwrapped up to `MAX_UNWRAP_DEPTH` times.
const WRAPPER_PARAMS: &[&str] = &["url", "q", "redirect"];
const MAX_UNWRAP_DEPTH: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct RssFilterConfig {
    pub allow_keywords: Vec<String>,
    pub block_keywords: Vec<String>,
}

impl RssFilterConfig {
    fn passes(&self, haystack: &str) -> bool {
        let lower = haystack.to_lowercase();
        if self.block_keywords.iter().any(|kw| lower.contains(&kw.to_lowercase())) {
            return false;
        }
        if self.allow_keywords.is_empty() {
            return true;
        }
        self.allow_keywords.iter().any(|kw| lower.contains(&kw.to_lowercase()))
    }
}

pub fn ingest(feed_bytes: &[u8], filter: &RssFilterConfig, ingest_timestamp: i64) -> Result<Vec<CandidateEnvelope>, ConnectorError> {
    let feed = parser::parse(feed_bytes).map_err(|e| ConnectorError::FeedParse(e.to_string()))?;

    let mut envelopes = Vec::new();
    for entry in feed.entries {
        let Some(link) = entry.links.first().map(|l| l.href.clone()) else {
            continue;
        };
        let title = entry.title.map(|t| t.content).unwrap_or_default();
        let summary = entry.summary.map(|s| s.content).unwrap_or_default();
        let haystack = format!("{title} {summary}");
        if !filter.passes(&haystack) {
            continue;
        }

        let resolved = unwrap_redirect(&link);
        let mut envelope = CandidateEnvelope::new(
            Source::Rss,
            resolved,
            serde_json::json!({ "title": title, "summary": summary, "original_link": link }),
            ingest_timestamp,
        );
        envelope.canonical_job.title = Some(title);
        envelope.canonical_job.description = Some(summary);
        envelopes.push(envelope);
    }
    Ok(envelopes)
}

fn unwrap_redirect(link: &str) -> String {
    let mut current = link.to_string();
    for _ in 0..MAX_UNWRAP_DEPTH {
        let Ok(url) = Url::parse(&current) else {
            break;
        };
        let Some(inner) = url
            .query_pairs()
            .find(|(k, _)| WRAPPER_PARAMS.contains(&k.to_lowercase().as_str()))
            .map(|(_, v)| v.into_owned())
        else {
            break;
        };
        if inner == current || !inner.starts_with("http") {
            break;
        }
        current = inner;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Jobs</title>
    <item>
      <title>Senior Rust Engineer</title>
      <link>https://aggregator.example/r?url=https%3A%2F%2Fboards.greenhouse.io%2Facme%2Fjobs%2F1</link>
      <description>Backend role using Rust and distributed systems</description>
    </item>
    <item>
      <title>Marketing Intern</title>
      <link>https://boards.greenhouse.io/acme/jobs/2</link>
      <description>Social media and content</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn unwraps_redirect_wrapper() {
        let filter = RssFilterConfig::default();
        let envelopes = ingest(RSS_FEED.as_bytes(), &filter, 0).unwrap();
        assert!(envelopes.iter().any(|e| e.canonical_job.job_url.contains("greenhouse.io/acme/jobs/1")));
    }

    #[test]
    fn block_keyword_filters_out_item() {
        let filter = RssFilterConfig { allow_keywords: vec![], block_keywords: vec!["marketing".into()] };
        let envelopes = ingest(RSS_FEED.as_bytes(), &filter, 0).unwrap();
        assert!(!envelopes.iter().any(|e| e.canonical_job.title.as_deref() == Some("Marketing Intern")));
    }

    #[test]
    fn allow_keyword_requires_match() {
        let filter = RssFilterConfig { allow_keywords: vec!["rust".into()], block_keywords: vec![] };
        let envelopes = ingest(RSS_FEED.as_bytes(), &filter, 0).unwrap();
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].canonical_job.title.as_deref(), Some("Senior Rust Engineer"));
    }
}
