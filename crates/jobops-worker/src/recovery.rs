//! C8 Recovery Loops: backfill/rescore/retry-fetch sweeps over stuck jobs.
//! Grounded in the teacher's `reaper.rs` stale-job reclamation loop — same
//! "scan -> act -> report" shape, adapted to three named operations with
//! a per-source-domain summary instead of a single reclaimed/failed count.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use jobops_core::{FetchStatus, Job, JdConfidence, JdResolverConfig, ResolveInput};
use jobops_evidence::EvidenceStore;

use crate::config::WorkerConfig;
use crate::jobs_repo::JobsRepo;
use crate::scoring::{self, ScoringContext};

#[derive(Debug, Default, Clone, Serialize)]
pub struct SourceSummary {
    pub source_domain: String,
    pub total: usize,
    pub recovered: usize,
    pub manual_needed: usize,
    pub needs_ai: usize,
    pub blocked: usize,
    pub low_quality: usize,
    pub link_only: usize,
    pub ignored: usize,
    pub inserted: usize,
    pub updated: usize,
}

impl SourceSummary {
    fn for_domain(domain: &str) -> Self {
        Self { source_domain: domain.to_string(), ..Default::default() }
    }
}

pub struct RecoveryDeps {
    pub repo: Arc<dyn JobsRepo>,
    pub evidence: EvidenceStore,
    pub fetcher: Arc<dyn jobops_core::Fetcher>,
    pub ai_client: Option<Arc<dyn jobops_ai::LlmClient>>,
    pub config: WorkerConfig,
}

/// Cool-down tracking for retry-fetch: no more than one retry per host per
/// hour (spec §4.8). Kept as an in-memory map; a restart simply resets it,
/// which only costs an extra retry, never a correctness violation.
#[derive(Default)]
pub struct HostCooldown {
    last_retry: std::sync::Mutex<HashMap<String, DateTime<Utc>>>,
}

impl HostCooldown {
    pub fn new() -> Self {
        Self::default()
    }

    fn allow(&self, host: &str, now: DateTime<Utc>) -> bool {
        let mut guard = self.last_retry.lock().unwrap();
        match guard.get(host) {
            Some(last) if now - *last < chrono::Duration::hours(1) => false,
            _ => {
                guard.insert(host.to_string(), now);
                true
            }
        }
    }
}

fn summarize(jobs: &[Job]) -> HashMap<String, SourceSummary> {
    let mut by_domain = HashMap::new();
    for job in jobs {
        by_domain.entry(job.source_domain.clone()).or_insert_with(|| SourceSummary::for_domain(&job.source_domain)).total += 1;
    }
    by_domain
}

/// Re-run JD resolution for jobs with empty/low-quality JD and `updated_at`
/// older than `stale_before`.
pub async fn backfill_missing(deps: &RecoveryDeps, stale_before: DateTime<Utc>, limit: usize, force: bool) -> Vec<SourceSummary> {
    let candidates = match deps.repo.list(None, None, 5000, 0).await {
        Ok(jobs) => jobs,
        Err(_) => return vec![],
    };
    let candidates: Vec<Job> =
        candidates.into_iter().filter(|j| (!j.has_usable_jd() || j.jd_confidence == Some(JdConfidence::Low)) && j.updated_at < stale_before).take(limit).collect();

    let mut summaries = summarize(&candidates);
    let resolver_config = JdResolverConfig { fetch_timeout: Duration::from_secs(deps.config.fetch_timeout_secs), min_jd_chars: deps.config.min_jd_chars };

    for mut job in candidates {
        let summary = summaries.entry(job.source_domain.clone()).or_insert_with(|| SourceSummary::for_domain(&job.source_domain));
        if job.status.is_some_and(|s| s.is_terminal()) && !force {
            summary.manual_needed += 1;
            continue;
        }

        let resolved = jobops_core::resolve(
            deps.fetcher.as_ref(),
            ResolveInput { job_url: Some(&job.job_url), email_text: None, email_html: None },
            &resolver_config,
        )
        .await;

        job.jd_text_clean = resolved.jd_text_clean;
        job.jd_source = resolved.jd_source;
        job.fetch_status = Some(resolved.fetch_status);
        job.jd_confidence = Some(resolved.jd_confidence);

        if resolved.fetch_status == FetchStatus::Ok && job.has_usable_jd() {
            summary.recovered += 1;
        } else {
            summary.manual_needed += 1;
        }

        if deps.repo.replace(&job).await.is_ok() {
            info!(job_key = %job.job_key, "backfill re-resolved JD");
        }
    }

    summaries.into_values().collect()
}

/// Rerun scoring for jobs with non-empty JD and `last_scored_at` older than
/// `target_updated_after` (the latest target update time).
pub async fn rescore_existing(
    deps: &RecoveryDeps,
    target_updated_after: DateTime<Utc>,
    limit: usize,
    force: bool,
) -> Vec<SourceSummary> {
    let candidates = match deps.repo.list(None, None, 5000, 0).await {
        Ok(jobs) => jobs,
        Err(_) => return vec![],
    };
    let candidates: Vec<Job> = candidates
        .into_iter()
        .filter(|j| j.has_usable_jd() && j.last_scored_at.is_none_or(|t| t < target_updated_after))
        .take(limit)
        .collect();

    let mut summaries = summarize(&candidates);
    let ctx = ScoringContext { repo: deps.repo.clone(), evidence: deps.evidence.clone(), ai_client: deps.ai_client.clone(), config: deps.config.clone() };

    for job in candidates {
        let summary = summaries.entry(job.source_domain.clone()).or_insert_with(|| SourceSummary::for_domain(&job.source_domain));
        if job.status.is_some_and(|s| s.is_terminal()) && !force {
            summary.manual_needed += 1;
            continue;
        }
        match scoring::run_for_job(&ctx, &job.job_key, jobops_core::ScoringSource::Rescore).await {
            Ok(_) => summary.recovered += 1,
            Err(_) => summary.needs_ai += 1,
        }
    }

    summaries.into_values().collect()
}

/// Re-fetch JD for `fetch_status in {blocked, failed}` rows, honoring a
/// per-host cooldown of one retry per hour.
pub async fn retry_fetch_missing(deps: &RecoveryDeps, cooldown: &HostCooldown, limit: usize) -> Vec<SourceSummary> {
    let candidates = match deps.repo.list(None, None, 5000, 0).await {
        Ok(jobs) => jobs,
        Err(_) => return vec![],
    };
    let candidates: Vec<Job> =
        candidates.into_iter().filter(|j| matches!(j.fetch_status, Some(FetchStatus::Blocked) | Some(FetchStatus::Failed))).take(limit).collect();

    let mut summaries = summarize(&candidates);
    let resolver_config = JdResolverConfig { fetch_timeout: Duration::from_secs(deps.config.fetch_timeout_secs), min_jd_chars: deps.config.min_jd_chars };
    let now = Utc::now();

    for mut job in candidates {
        let summary = summaries.entry(job.source_domain.clone()).or_insert_with(|| SourceSummary::for_domain(&job.source_domain));
        if !cooldown.allow(&job.source_domain, now) {
            summary.ignored += 1;
            continue;
        }

        let resolved = jobops_core::resolve(
            deps.fetcher.as_ref(),
            ResolveInput { job_url: Some(&job.job_url), email_text: None, email_html: None },
            &resolver_config,
        )
        .await;

        job.fetch_status = Some(resolved.fetch_status);
        job.jd_confidence = Some(resolved.jd_confidence);
        if resolved.jd_text_clean.is_some() {
            job.jd_text_clean = resolved.jd_text_clean;
            job.jd_source = resolved.jd_source;
        }

        match resolved.fetch_status {
            FetchStatus::Ok => summary.recovered += 1,
            FetchStatus::Blocked => summary.blocked += 1,
            FetchStatus::Failed => summary.low_quality += 1,
            FetchStatus::AiUnavailable => summary.needs_ai += 1,
        }

        let _ = deps.repo.replace(&job).await;
    }

    summaries.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_cooldown_blocks_second_retry_within_an_hour() {
        let cooldown = HostCooldown::new();
        let now = Utc::now();
        assert!(cooldown.allow("example.com", now));
        assert!(!cooldown.allow("example.com", now + chrono::Duration::minutes(10)));
    }

    #[test]
    fn host_cooldown_allows_retry_after_an_hour() {
        let cooldown = HostCooldown::new();
        let now = Utc::now();
        assert!(cooldown.allow("example.com", now));
        assert!(cooldown.allow("example.com", now + chrono::Duration::hours(2)));
    }
}
