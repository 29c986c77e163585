//! C2: JD resolution — fetch-or-extract a job description and grade its
//! usability. No concrete HTTP client lives here; callers inject a
//! `Fetcher` so this crate stays free of a networking dependency.

use std::time::Duration;

use async_trait::async_trait;

use crate::html::{clean_html, largest_dense_window};
use crate::model::{FetchStatus, JdConfidence, JdSource};
use crate::quality::{hiring_signal_count, is_low_quality_jd};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(3_500);
const MIN_CHARS_HIGH: usize = 600;
const MIN_CHARS_MEDIUM: usize = 300;
const MIN_HIRING_SIGNALS_HIGH: usize = 3;

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub final_url: String,
    pub body: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("fetch timed out")]
    Timeout,
    #[error("fetch forbidden")]
    Forbidden,
    #[error("fetch failed: {0}")]
    Other(String),
}

/// HTTP fetcher collaborator: bounded timeout, stable user agent, bounded
/// redirect following. Implemented by `jobops-connectors::ReqwestFetcher`
/// in production and by an in-memory mock in tests.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError>;
}

#[derive(Debug, Clone, Default)]
pub struct ResolveInput<'a> {
    pub job_url: Option<&'a str>,
    pub email_text: Option<&'a str>,
    pub email_html: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct ResolveDebug {
    pub http_status: Option<u16>,
    pub final_url: Option<String>,
    pub raw_len: usize,
}

#[derive(Debug, Clone)]
pub struct ResolveOutput {
    pub jd_text_clean: Option<String>,
    pub jd_source: JdSource,
    pub fetch_status: FetchStatus,
    pub jd_confidence: JdConfidence,
    pub debug: ResolveDebug,
}

#[derive(Debug, Clone)]
pub struct JdResolverConfig {
    pub fetch_timeout: Duration,
    pub min_jd_chars: usize,
}

impl Default for JdResolverConfig {
    fn default() -> Self {
        Self { fetch_timeout: DEFAULT_FETCH_TIMEOUT, min_jd_chars: 120 }
    }
}

pub async fn resolve(fetcher: &dyn Fetcher, input: ResolveInput<'_>, config: &JdResolverConfig) -> ResolveOutput {
    let mut debug = ResolveDebug { http_status: None, final_url: None, raw_len: 0 };

    if let Some(url) = input.job_url {
        match fetcher.fetch(url, config.fetch_timeout).await {
            Ok(page) => {
                debug.http_status = Some(page.status);
                debug.final_url = Some(page.final_url.clone());
                debug.raw_len = page.body.len();

                if (200..300).contains(&page.status) {
                    let cleaned = clean_text(&page.body);
                    if let Some(outcome) = grade(cleaned, JdSource::Fetched, config) {
                        return outcome;
                    }
                    // Cleaned to nothing usable or classified low-quality: fall through to email/failure.
                } else if page.status == 403 || page.status == 429 {
                    if let Some(outcome) = fall_back_to_email(input, config, &debug, true) {
                        return outcome;
                    }
                    return ResolveOutput {
                        jd_text_clean: None,
                        jd_source: JdSource::None,
                        fetch_status: FetchStatus::Blocked,
                        jd_confidence: JdConfidence::Low,
                        debug,
                    };
                }
            }
            Err(FetchError::Forbidden) => {
                if let Some(outcome) = fall_back_to_email(input, config, &debug, true) {
                    return outcome;
                }
                return ResolveOutput {
                    jd_text_clean: None,
                    jd_source: JdSource::None,
                    fetch_status: FetchStatus::Blocked,
                    jd_confidence: JdConfidence::Low,
                    debug,
                };
            }
            Err(_) => {
                if let Some(outcome) = fall_back_to_email(input, config, &debug, false) {
                    return outcome;
                }
                return ResolveOutput {
                    jd_text_clean: None,
                    jd_source: JdSource::None,
                    fetch_status: FetchStatus::Failed,
                    jd_confidence: JdConfidence::Low,
                    debug,
                };
            }
        }
    }

    if let Some(outcome) = fall_back_to_email(input, config, &debug, false) {
        return outcome;
    }

    ResolveOutput {
        jd_text_clean: None,
        jd_source: JdSource::None,
        fetch_status: FetchStatus::Failed,
        jd_confidence: JdConfidence::Low,
        debug,
    }
}

fn fall_back_to_email(input: ResolveInput<'_>, config: &JdResolverConfig, _debug: &ResolveDebug, blocked: bool) -> Option<ResolveOutput> {
    let _ = blocked;
    let body = input.email_html.or(input.email_text)?;
    let cleaned = clean_text(body);
    grade(cleaned, JdSource::Email, config)
}

fn clean_text(raw: &str) -> Option<String> {
    let cleaned = clean_html(raw);
    largest_dense_window(&cleaned)
}

/// Apply low-quality classification and confidence scoring to a cleaned
/// text window. Returns `None` if the text didn't survive cleaning at all
/// (caller should try the next source or fail).
fn grade(cleaned: Option<String>, source: JdSource, config: &JdResolverConfig) -> Option<ResolveOutput> {
    let text = cleaned?;
    let debug = ResolveDebug { http_status: None, final_url: None, raw_len: text.len() };

    if is_low_quality_jd(&text, config.min_jd_chars) {
        return Some(ResolveOutput {
            jd_text_clean: None,
            jd_source: source,
            fetch_status: FetchStatus::Blocked,
            jd_confidence: JdConfidence::Low,
            debug,
        });
    }

    let confidence = confidence_for(&text);
    Some(ResolveOutput {
        jd_text_clean: Some(text),
        jd_source: source,
        fetch_status: FetchStatus::Ok,
        jd_confidence: confidence,
        debug,
    })
}

fn confidence_for(text: &str) -> JdConfidence {
    let len = text.chars().count();
    let signals = hiring_signal_count(text);
    if len >= MIN_CHARS_HIGH && signals >= MIN_HIRING_SIGNALS_HIGH {
        JdConfidence::High
    } else if len >= MIN_CHARS_MEDIUM {
        JdConfidence::Medium
    } else {
        JdConfidence::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedFetcher {
        responses: Mutex<Vec<Result<FetchedPage, FetchError>>>,
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, _url: &str, _timeout: Duration) -> Result<FetchedPage, FetchError> {
            self.responses.lock().unwrap().pop().unwrap()
        }
    }

    fn page(status: u16, body: &str) -> FetchedPage {
        FetchedPage { status, final_url: "https://example.com/job".into(), body: body.into() }
    }

    #[tokio::test]
    async fn falls_back_to_email_when_fetch_blocked() {
        let fetcher = ScriptedFetcher { responses: Mutex::new(vec![Ok(page(403, "<html>blocked</html>"))]) };
        let email = "<p>We are looking for a backend engineer. Responsibilities: design APIs and own services. \
            Requirements: 4+ years Rust experience, strong communication skills, and a growth mindset.</p>";
        let out = resolve(
            &fetcher,
            ResolveInput { job_url: Some("https://example.com/job"), email_text: None, email_html: Some(email) },
            &JdResolverConfig::default(),
        )
        .await;
        assert_eq!(out.jd_source, JdSource::Email);
        assert_eq!(out.fetch_status, FetchStatus::Ok);
        assert!(out.jd_text_clean.is_some());
    }

    #[tokio::test]
    async fn blocked_shell_page_with_no_email_yields_needs_manual_jd_signal() {
        let fetcher = ScriptedFetcher {
            responses: Mutex::new(vec![Ok(page(200, "<html><body>Please enable cookies to continue browsing.</body></html>"))]),
        };
        let out = resolve(
            &fetcher,
            ResolveInput { job_url: Some("https://example.com/job"), email_text: None, email_html: None },
            &JdResolverConfig::default(),
        )
        .await;
        assert_eq!(out.fetch_status, FetchStatus::Blocked);
        assert_eq!(out.jd_confidence, JdConfidence::Low);
        assert!(out.jd_text_clean.is_none());
    }

    #[tokio::test]
    async fn high_confidence_requires_length_and_signals() {
        let body = format!(
            "<p>{}</p>",
            "We are looking for a senior engineer. Responsibilities include designing distributed systems, \
             mentoring engineers, and owning the on-call rotation. Requirements: 6+ years of backend experience, \
             deep knowledge of Rust, and excellent communication. Qualifications: a degree in computer science or equivalent experience. "
                .repeat(3)
        );
        let fetcher = ScriptedFetcher { responses: Mutex::new(vec![Ok(page(200, &body))]) };
        let out = resolve(
            &fetcher,
            ResolveInput { job_url: Some("https://example.com/job"), email_text: None, email_html: None },
            &JdResolverConfig::default(),
        )
        .await;
        assert_eq!(out.jd_confidence, JdConfidence::High);
    }

    #[tokio::test]
    async fn timeout_with_no_email_returns_failed() {
        let fetcher = ScriptedFetcher { responses: Mutex::new(vec![Err(FetchError::Timeout)]) };
        let out = resolve(
            &fetcher,
            ResolveInput { job_url: Some("https://example.com/job"), email_text: None, email_html: None },
            &JdResolverConfig::default(),
        )
        .await;
        assert_eq!(out.fetch_status, FetchStatus::Failed);
        assert_eq!(out.jd_source, JdSource::None);
    }
}
