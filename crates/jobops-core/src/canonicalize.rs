//! C1: URL canonicalization. Pure function, no I/O.
//!
//! `job_key` must be stable: two raw URLs that canonicalize equally produce
//! the same key, so ingest can upsert to a single authoritative row.

use sha2::{Digest, Sha256};
use url::Url;

/// Query parameters that are kept verbatim on generic hosts; everything else
/// is treated as tracking noise and stripped.
const GENERIC_BENIGN_PARAMS: &[&str] = &["id", "jobid", "job_id", "gh_jid", "lever-id", "posting_id"];

/// Host suffixes accepted under the generic family when no specific rule
/// family recognizes the host. Kept small and explicit rather than
/// open-ended, matching the spec's "unless configured as generic-allowed".
const DEFAULT_GENERIC_ALLOWED_HOSTS: &[&str] = &[
    "greenhouse.io",
    "lever.co",
    "workday.com",
    "myworkdayjobs.com",
    "ashbyhq.com",
    "indeed.com",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Canonical {
    Ignored,
    Accepted {
        job_url: String,
        job_key: String,
        source_domain: String,
        external_id: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct CanonicalizerConfig {
    /// Extra hosts accepted under the generic family, on top of the defaults.
    pub extra_generic_hosts: Vec<String>,
}

impl Default for CanonicalizerConfig {
    fn default() -> Self {
        Self { extra_generic_hosts: Vec::new() }
    }
}

pub fn canonicalize(raw_url: &str) -> Canonical {
    canonicalize_with(raw_url, &CanonicalizerConfig::default())
}

pub fn canonicalize_with(raw_url: &str, config: &CanonicalizerConfig) -> Canonical {
    let Ok(url) = Url::parse(raw_url.trim()) else {
        return Canonical::Ignored;
    };
    let Some(host) = url.host_str() else {
        return Canonical::Ignored;
    };
    let host = host.to_lowercase();

    if let Some(result) = canonicalize_linkedin(&host, &url) {
        return result;
    }
    if let Some(result) = canonicalize_iimjobs(&host, &url) {
        return result;
    }
    if let Some(result) = canonicalize_naukri(&host, &url) {
        return result;
    }
    canonicalize_generic(&host, &url, config)
}

fn accept(job_url: String, source_domain: String, external_id: Option<String>) -> Canonical {
    let job_key = job_key_for(&job_url);
    Canonical::Accepted { job_url, job_key, source_domain, external_id }
}

fn canonicalize_linkedin(host: &str, url: &Url) -> Option<Canonical> {
    if !host.ends_with("linkedin.com") {
        return None;
    }
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    let idx = segments.iter().position(|s| *s == "view")?;
    if idx == 0 || segments[idx - 1] != "jobs" {
        return Some(Canonical::Ignored);
    }
    let id = segments.get(idx + 1)?;
    if !id.chars().all(|c| c.is_ascii_digit()) || id.is_empty() {
        return Some(Canonical::Ignored);
    }
    Some(accept(
        format!("https://www.linkedin.com/jobs/view/{id}/"),
        "linkedin.com".to_string(),
        Some(id.to_string()),
    ))
}

fn canonicalize_iimjobs(host: &str, url: &Url) -> Option<Canonical> {
    if !host.ends_with("iimjobs.com") {
        return None;
    }
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    if segments.len() < 2 || segments[0] != "j" {
        return Some(Canonical::Ignored);
    }
    let last = segments[1];
    let stem = last.strip_suffix(".html").unwrap_or(last);
    let (slug, id) = stem.rsplit_once('-')?;
    if slug.is_empty() || id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Some(Canonical::Ignored);
    }
    Some(accept(
        format!("https://www.iimjobs.com/j/{slug}-{id}.html"),
        "iimjobs.com".to_string(),
        Some(id.to_string()),
    ))
}

fn canonicalize_naukri(host: &str, url: &Url) -> Option<Canonical> {
    if !host.ends_with("naukri.com") {
        return None;
    }
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    let last = segments.last()?;
    if !last.starts_with("job-listings-") {
        return Some(Canonical::Ignored);
    }
    let (_, id) = last.rsplit_once('-')?;
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Some(Canonical::Ignored);
    }
    Some(accept(
        format!("https://www.naukri.com/{last}"),
        "naukri.com".to_string(),
        Some(id.to_string()),
    ))
}

fn canonicalize_generic(host: &str, url: &Url, config: &CanonicalizerConfig) -> Canonical {
    let allowed = DEFAULT_GENERIC_ALLOWED_HOSTS.iter().any(|h| host.ends_with(h))
        || config.extra_generic_hosts.iter().any(|h| host.ends_with(h.as_str()));
    if !allowed {
        return Canonical::Ignored;
    }

    let mut canonical = url.clone();
    canonical.set_fragment(None);
    canonical.set_host(Some(host)).ok();

    let kept: Vec<(String, String)> = canonical
        .query_pairs()
        .filter(|(k, _)| GENERIC_BENIGN_PARAMS.contains(&k.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        canonical.set_query(None);
    } else {
        let mut pairs = canonical.query_pairs_mut();
        pairs.clear();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        drop(pairs);
    }

    let mut job_url = canonical.to_string();
    if job_url.ends_with('/') && canonical.path() != "/" {
        job_url.pop();
    }

    accept(job_url, host.to_string(), None)
}

/// Lowercase hex of the low 128 bits of a SHA-256 digest of the canonical URL.
pub fn job_key_for(canonical_url: &str) -> String {
    let digest = Sha256::digest(canonical_url.as_bytes());
    digest[16..32].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linkedin_accepts_numeric_job_id() {
        let result = canonicalize("https://www.linkedin.com/jobs/view/1234567890/?utm=x");
        match result {
            Canonical::Accepted { job_url, external_id, source_domain, .. } => {
                assert_eq!(job_url, "https://www.linkedin.com/jobs/view/1234567890/");
                assert_eq!(external_id.as_deref(), Some("1234567890"));
                assert_eq!(source_domain, "linkedin.com");
            }
            Canonical::Ignored => panic!("expected accept"),
        }
    }

    #[test]
    fn equivalent_raw_urls_produce_identical_job_key() {
        let a = canonicalize("https://www.linkedin.com/jobs/view/42/?utm_source=x");
        let b = canonicalize("https://linkedin.com/jobs/view/42");
        let (Canonical::Accepted { job_key: ka, .. }, Canonical::Accepted { job_key: kb, .. }) = (a, b) else {
            panic!("expected both to accept");
        };
        assert_eq!(ka, kb);
    }

    #[test]
    fn linkedin_rejects_non_numeric_id() {
        assert_eq!(canonicalize("https://www.linkedin.com/jobs/view/abc/"), Canonical::Ignored);
    }

    #[test]
    fn iimjobs_preserves_slug_and_id() {
        match canonicalize("https://www.iimjobs.com/j/senior-backend-engineer-987.html") {
            Canonical::Accepted { job_url, external_id, .. } => {
                assert_eq!(job_url, "https://www.iimjobs.com/j/senior-backend-engineer-987.html");
                assert_eq!(external_id.as_deref(), Some("987"));
            }
            Canonical::Ignored => panic!("expected accept"),
        }
    }

    #[test]
    fn naukri_preserves_id_suffix() {
        match canonicalize("https://www.naukri.com/job-listings-backend-engineer-acme-bangalore-3-7-years-180325901234") {
            Canonical::Accepted { external_id, .. } => {
                assert_eq!(external_id.as_deref(), Some("180325901234"));
            }
            Canonical::Ignored => panic!("expected accept"),
        }
    }

    #[test]
    fn unknown_host_is_ignored_by_default() {
        assert_eq!(canonicalize("https://some-random-blog.example/post/1"), Canonical::Ignored);
    }

    #[test]
    fn generic_host_strips_tracking_params() {
        match canonicalize("https://boards.greenhouse.io/acme/jobs/12345?utm_source=li&utm_campaign=spring&gh_jid=12345") {
            Canonical::Accepted { job_url, .. } => {
                assert!(!job_url.contains("utm_source"));
                assert!(job_url.contains("gh_jid=12345"));
            }
            Canonical::Ignored => panic!("expected accept"),
        }
    }

    #[test]
    fn malformed_url_is_ignored() {
        assert_eq!(canonicalize("not a url at all"), Canonical::Ignored);
    }
}
