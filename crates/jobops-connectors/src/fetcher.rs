//! Production and test implementations of `jobops_core::Fetcher`.

use std::time::Duration;

use async_trait::async_trait;
use jobops_core::{FetchError, FetchedPage, Fetcher};
use tracing::debug;

const USER_AGENT: &str = "JobOpsBot/1.0 (+https://jobops.local)";
const MAX_REDIRECTS: usize = 5;

pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .expect("reqwest client config is static and always valid");
        Self { client }
    }
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        debug!(url, "fetching JD page");
        let response = tokio::time::timeout(timeout, self.client.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Other(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        if status == 403 || status == 401 {
            return Err(FetchError::Forbidden);
        }

        let body = tokio::time::timeout(timeout, response.text())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(|e| FetchError::Other(e.to_string()))?;

        Ok(FetchedPage { status, final_url, body })
    }
}

/// In-memory fetcher for tests: returns scripted responses keyed by URL.
#[derive(Default)]
pub struct MockFetcher {
    pub responses: std::collections::HashMap<String, Result<FetchedPage, FetchError>>,
}

impl MockFetcher {
    pub fn with(url: impl Into<String>, response: Result<FetchedPage, FetchError>) -> Self {
        let mut responses = std::collections::HashMap::new();
        responses.insert(url.into(), response);
        Self { responses }
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchedPage, FetchError> {
        match self.responses.get(url) {
            Some(Ok(page)) => Ok(page.clone()),
            Some(Err(e)) => Err(e.clone()),
            None => Err(FetchError::Other(format!("no scripted response for {url}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_fetcher_returns_scripted_page() {
        let fetcher = MockFetcher::with(
            "https://example.com/job",
            Ok(FetchedPage { status: 200, final_url: "https://example.com/job".into(), body: "<p>hi</p>".into() }),
        );
        let page = fetcher.fetch("https://example.com/job", Duration::from_secs(1)).await.unwrap();
        assert_eq!(page.status, 200);
    }

    #[tokio::test]
    async fn mock_fetcher_errors_for_unknown_url() {
        let fetcher = MockFetcher::default();
        let err = fetcher.fetch("https://unknown", Duration::from_secs(1)).await;
        assert!(err.is_err());
    }
}
