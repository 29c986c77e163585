//! C4 Ingest Orchestrator: canonicalize -> lock -> probe -> resolve JD ->
//! lifecycle -> upsert -> optional scoring. Mirrors the teacher's
//! `job_loop`/`exec` dispatch shape, but driven synchronously per request
//! instead of off a queue (see DESIGN.md for that deviation).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use jobops_ai::LlmClient;
use jobops_connectors::health::{check_batch, SourceHealth};
use jobops_connectors::CandidateEnvelope;
use jobops_core::{
    apply_transition, canonicalize, Canonical, Fetcher, FetchStatus, Job, JdConfidence, JdResolverConfig, JobStatus, ResolveInput,
    SystemStatus, Transition,
};
use jobops_evidence::EvidenceStore;

use crate::config::WorkerConfig;
use crate::events;
use crate::jobs_repo::JobsRepo;
use crate::lock::JobLocks;
use crate::scoring::{self, ScoringContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestAction {
    Inserted,
    Updated,
    Ignored,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestRowResult {
    pub raw_url: String,
    pub job_key: Option<String>,
    pub job_url: Option<String>,
    pub was_existing: bool,
    pub action: IngestAction,
    pub status: Option<JobStatus>,
    pub jd_source: Option<String>,
    pub fetch_status: Option<String>,
    pub system_status: Option<SystemStatus>,
    pub error: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct IngestCounts {
    pub inserted: usize,
    pub updated: usize,
    pub ignored: usize,
}

#[derive(Debug, Serialize)]
pub struct IngestReport {
    pub counts: IngestCounts,
    pub health: SourceHealth,
    pub results: Vec<IngestRowResult>,
}

pub struct IngestDeps {
    pub repo: Arc<dyn JobsRepo>,
    pub evidence: EvidenceStore,
    pub fetcher: Arc<dyn Fetcher>,
    pub ai_client: Option<Arc<dyn LlmClient>>,
    pub locks: Arc<JobLocks>,
    pub config: WorkerConfig,
}

/// Run the ingest orchestrator over `envelopes`, preserving submission
/// order in the returned `results` even though per-envelope work may run
/// concurrently.
pub async fn ingest(deps: Arc<IngestDeps>, envelopes: Vec<CandidateEnvelope>) -> IngestReport {
    let batch_budget = Duration::from_secs(deps.config.per_ingest_batch_budget_secs);
    let raw_urls: Vec<String> = envelopes.iter().map(|e| e.canonical_job.job_url.clone()).collect();
    let health = check_batch(envelopes.len(), &envelopes);
    events::persist(
        &deps.evidence,
        jobops_core::Event::new("INGEST_BATCH_HEALTH", None, serde_json::to_value(&health).unwrap_or_default(), Utc::now()),
    )
    .await;

    let futures = envelopes.into_iter().enumerate().map(|(idx, envelope)| {
        let deps = deps.clone();
        async move { (idx, ingest_one(&deps, envelope).await) }
    });

    let mut indexed = match tokio::time::timeout(batch_budget, join_all(futures)).await {
        Ok(indexed) => indexed,
        Err(_) => {
            warn!(count = raw_urls.len(), "per-batch ingest budget exceeded, reporting rows as skipped");
            return IngestReport {
                counts: IngestCounts::default(),
                health,
                results: raw_urls
                    .into_iter()
                    .map(|raw_url| IngestRowResult {
                        raw_url,
                        job_key: None,
                        job_url: None,
                        was_existing: false,
                        action: IngestAction::Ignored,
                        status: None,
                        jd_source: None,
                        fetch_status: None,
                        system_status: None,
                        error: Some("batch_budget_exceeded".into()),
                    })
                    .collect(),
            };
        }
    };
    indexed.sort_by_key(|(idx, _)| *idx);

    let mut counts = IngestCounts::default();
    let results: Vec<IngestRowResult> = indexed
        .into_iter()
        .map(|(_, row)| {
            match row.action {
                IngestAction::Inserted => counts.inserted += 1,
                IngestAction::Updated => counts.updated += 1,
                IngestAction::Ignored => counts.ignored += 1,
            }
            row
        })
        .collect();

    IngestReport { counts, health, results }
}

async fn ingest_one(deps: &IngestDeps, envelope: CandidateEnvelope) -> IngestRowResult {
    let raw_url = envelope.canonical_job.job_url.clone();

    let canonical = canonicalize(&raw_url);
    let (job_url, job_key, source_domain, external_id) = match canonical {
        Canonical::Ignored => {
            return IngestRowResult {
                raw_url,
                job_key: None,
                job_url: None,
                was_existing: false,
                action: IngestAction::Ignored,
                status: None,
                jd_source: None,
                fetch_status: None,
                system_status: None,
                error: None,
            }
        }
        Canonical::Accepted { job_url, job_key, source_domain, external_id } => (job_url, job_key, source_domain, external_id),
    };

    let locks = deps.locks.clone();
    let Some(_guard) = locks.acquire(&job_key).await else {
        warn!(job_key = %job_key, "lock busy, skipping ingest row");
        return IngestRowResult {
            raw_url,
            job_key: Some(job_key),
            job_url: Some(job_url),
            was_existing: false,
            action: IngestAction::Ignored,
            status: None,
            jd_source: None,
            fetch_status: None,
            system_status: None,
            error: Some("job_key_busy".into()),
        };
    };

    let budget = Duration::from_secs(deps.config.per_request_budget_secs);
    match tokio::time::timeout(budget, ingest_locked(deps, &job_key, &job_url, &source_domain, external_id, raw_url.clone(), envelope))
        .await
    {
        Ok(result) => result,
        Err(_) => {
            warn!(job_key = %job_key, "per-request budget exceeded during ingest");
            IngestRowResult {
                raw_url,
                job_key: Some(job_key),
                job_url: Some(job_url),
                was_existing: false,
                action: IngestAction::Ignored,
                status: None,
                jd_source: None,
                fetch_status: None,
                system_status: None,
                error: Some("request_budget_exceeded".into()),
            }
        }
    }
}

/// `action` reported to callers is purely a function of whether the job
/// already existed before this row was processed — link-only/low-quality
/// JD outcomes are reported through `system_status`, never through a
/// separate action variant.
fn ingest_action_for(was_existing: bool) -> IngestAction {
    if was_existing {
        IngestAction::Updated
    } else {
        IngestAction::Inserted
    }
}

/// The lock-protected body of `ingest_one`, split out so it can be raced
/// against the per-request budget with `tokio::time::timeout`.
#[allow(clippy::too_many_arguments)]
async fn ingest_locked(
    deps: &IngestDeps,
    job_key: &str,
    job_url: &str,
    source_domain: &str,
    external_id: Option<String>,
    raw_url: String,
    envelope: CandidateEnvelope,
) -> IngestRowResult {
    let job_key = job_key.to_string();
    let job_url = job_url.to_string();
    let source_domain = source_domain.to_string();

    let existing = deps.repo.find_by_key(&job_key).await.ok().flatten();
    let was_existing = existing.is_some();
    let now = Utc::now();

    let resolver_config =
        JdResolverConfig { fetch_timeout: Duration::from_secs(deps.config.fetch_timeout_secs), min_jd_chars: deps.config.min_jd_chars };
    let resolve_input =
        ResolveInput { job_url: &job_url, email_text: envelope.email_text.as_deref(), email_html: envelope.email_html.as_deref() };
    let resolved = jobops_core::resolve(deps.fetcher.as_ref(), resolve_input, &resolver_config).await;

    let mut job = existing.unwrap_or_else(|| Job::new_stub(job_key.clone(), job_url.clone(), raw_url.clone(), source_domain.clone(), now));
    job.external_id = external_id.or(job.external_id.clone());
    if job.role_title.is_none() {
        job.role_title = if envelope.canonical_job.title.is_empty() { None } else { Some(envelope.canonical_job.title.clone()) };
    }
    if job.company.is_none() {
        job.company = if envelope.canonical_job.company.is_empty() { None } else { Some(envelope.canonical_job.company.clone()) };
    }

    job.jd_text_clean = resolved.jd_text_clean.clone();
    job.jd_source = resolved.jd_source;
    job.fetch_status = Some(resolved.fetch_status);
    job.jd_confidence = Some(resolved.jd_confidence);

    let low_quality_jd = !job.has_usable_jd() || resolved.jd_confidence == JdConfidence::Low;
    let ai_unavailable = deps.ai_client.is_none();
    if ai_unavailable && resolved.fetch_status == FetchStatus::Ok {
        job.fetch_status = Some(FetchStatus::AiUnavailable);
    }

    let link_only = low_quality_jd || ai_unavailable;
    let system_status = if low_quality_jd {
        Some(SystemStatus::NeedsManualJd)
    } else if ai_unavailable {
        Some(SystemStatus::AiUnavailable)
    } else {
        None
    };

    let should_apply_insert_transition = job.status.is_none() || (!was_existing);
    if should_apply_insert_transition {
        match apply_transition(&mut job, Transition::IngestInsert { link_only, system_status }, now, false) {
            Ok(event) => events::persist(&deps.evidence, event).await,
            Err(e) => warn!(job_key = %job_key, error = %e, "lifecycle transition refused during ingest"),
        }
    } else if !job.status.is_some_and(JobStatus::is_terminal) {
        job.system_status = system_status;
    }

    let (saved_job, _) = match deps.repo.upsert_merge(job, now).await {
        Ok(result) => result,
        Err(e) => {
            warn!(job_key = %job_key, error = %e, "failed to persist ingest row");
            return IngestRowResult {
                raw_url,
                job_key: Some(job_key),
                job_url: Some(job_url),
                was_existing,
                action: IngestAction::Ignored,
                status: None,
                jd_source: None,
                fetch_status: None,
                system_status: None,
                error: Some("store_error".into()),
            };
        }
    };

    let action = ingest_action_for(was_existing);

    let jd_source_str = format!("{:?}", saved_job.jd_source).to_lowercase();
    let fetch_status_str = saved_job.fetch_status.map(|s| format!("{s:?}").to_lowercase());

    if !low_quality_jd && !ai_unavailable && saved_job.has_usable_jd() {
        let ctx = ScoringContext {
            repo: deps.repo.clone(),
            evidence: deps.evidence.clone(),
            ai_client: deps.ai_client.clone(),
            config: deps.config.clone(),
        };
        match scoring::run_for_job(&ctx, &saved_job.job_key, jobops_core::ScoringSource::Ingest).await {
            Ok(_) => info!(job_key = %job_key, "ingest-triggered scoring completed"),
            Err(e) => warn!(job_key = %job_key, error = %e, "ingest-triggered scoring failed"),
        }
    }

    let refreshed = deps.repo.find_by_key(&job_key).await.ok().flatten().unwrap_or(saved_job);

    IngestRowResult {
        raw_url,
        job_key: Some(job_key),
        job_url: Some(job_url),
        was_existing,
        action,
        status: refreshed.status,
        jd_source: Some(jd_source_str),
        fetch_status: fetch_status_str,
        system_status: refreshed.system_status,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_action_serializes_snake_case() {
        let s = serde_json::to_string(&IngestAction::Updated).unwrap();
        assert_eq!(s, "\"updated\"");
    }

    #[test]
    fn ingest_action_ignores_link_only_downgrade() {
        // A row that is new but resolves to a low-quality/link-only JD is
        // still action=inserted; link-only is carried in system_status.
        assert_eq!(ingest_action_for(false), IngestAction::Inserted);
        assert_eq!(ingest_action_for(true), IngestAction::Updated);
    }
}
