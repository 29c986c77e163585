//! C5 Scoring Pipeline: heuristic gate -> AI extract -> AI reason -> evidence
//! upsert, each stage recording a `StageMetric`, persisted as one
//! `ScoringRun`. Grounded in the teacher's stage-returning `ExecResult`
//! shape (`kalla-worker::exec`), generalized to extraction/scoring JSON
//! contracts instead of recipe generation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;
use uuid::Uuid;

use jobops_ai::{self, LlmClient};
use jobops_core::{apply_transition, Job, ScoringFinalStatus, ScoringRun, ScoringSource, StageMetric, StageStatus, Target, Transition};
use jobops_evidence::{EvidenceStore, RequirementType};

use crate::config::WorkerConfig;
use crate::events;
use crate::jobs_repo::JobsRepo;

const EXTRACTION_FRESHNESS_HOURS: i64 = 24;
const RETRY_BACKOFF_MS: [u64; 2] = [100, 400];

#[derive(Clone)]
pub struct ScoringContext {
    pub repo: Arc<dyn JobsRepo>,
    pub evidence: EvidenceStore,
    pub ai_client: Option<Arc<dyn LlmClient>>,
    pub config: WorkerConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("job {0} not found")]
    JobNotFound(String),
    #[error(transparent)]
    Repo(#[from] crate::jobs_repo::RepoError),
    #[error(transparent)]
    Core(#[from] jobops_core::CoreError),
}

fn word_boundary_regex_cache() -> &'static std::sync::Mutex<std::collections::HashMap<String, Regex>> {
    static CACHE: OnceLock<std::sync::Mutex<std::collections::HashMap<String, Regex>>> = OnceLock::new();
    CACHE.get_or_init(|| std::sync::Mutex::new(std::collections::HashMap::new()))
}

fn contains_word(haystack_lower: &str, needle: &str) -> bool {
    let needle_lower = needle.to_lowercase();
    let cache = word_boundary_regex_cache();
    let mut guard = cache.lock().unwrap();
    let re = guard.entry(needle_lower.clone()).or_insert_with(|| {
        let escaped = regex::escape(&needle_lower);
        Regex::new(&format!(r"\b{escaped}\b")).unwrap_or_else(|_| Regex::new(&escaped).unwrap())
    });
    re.is_match(haystack_lower)
}

/// Sum of case-insensitive word-boundary matches of the union of all
/// targets' `must`+`nice` keywords against `jd_text_lower`.
fn target_signal_score(jd_text_lower: &str, targets: &[Target]) -> usize {
    let mut keywords: std::collections::HashSet<String> = std::collections::HashSet::new();
    for t in targets {
        keywords.extend(t.must.iter().cloned());
        keywords.extend(t.nice.iter().cloned());
    }
    keywords.iter().filter(|kw| contains_word(jd_text_lower, kw)).count()
}

fn blocked_keyword_hits(jd_text_lower: &str, targets: &[Target]) -> Vec<String> {
    let mut blocked: std::collections::HashSet<String> = std::collections::HashSet::new();
    for t in targets {
        blocked.extend(t.reject.iter().cloned());
    }
    blocked.into_iter().filter(|kw| contains_word(jd_text_lower, kw)).map(|kw| format!("blocked_keyword:{kw}")).collect()
}

pub async fn run_for_job(ctx: &ScoringContext, job_key: &str, source: ScoringSource) -> Result<ScoringRun, ScoringError> {
    let mut job = ctx.repo.find_by_key(job_key).await?.ok_or_else(|| ScoringError::JobNotFound(job_key.to_string()))?;
    let targets = ctx.repo.list_targets().await?;
    let now = Utc::now();
    let run_started = now;

    let jd_text = job.jd_text_clean.clone().unwrap_or_default();
    let jd_lower = jd_text.to_lowercase();

    // Stage 1: heuristic gate (deterministic, synchronous).
    let gate_started = Utc::now();
    let signal = target_signal_score(&jd_lower, &targets);
    let mut heuristic_reasons = blocked_keyword_hits(&jd_lower, &targets);
    let passes_length = jd_text.trim().chars().count() >= ctx.config.min_jd_chars;
    let passes_signal = signal >= ctx.config.min_target_signal;
    if !passes_length {
        heuristic_reasons.push("jd_too_short".to_string());
    }
    if !passes_signal {
        heuristic_reasons.push("insufficient_target_signal".to_string());
    }
    let heuristic_passed = passes_length && passes_signal && heuristic_reasons.iter().all(|r| !r.starts_with("blocked_keyword:"));
    let gate_finished = Utc::now();
    let heuristic_gate = StageMetric {
        status: if heuristic_passed { StageStatus::Ok } else { StageStatus::Rejected },
        started_at: gate_started,
        finished_at: gate_finished,
        latency_ms: (gate_finished - gate_started).num_milliseconds(),
        tokens_in: 0,
        tokens_out: 0,
        tokens_total: 0,
        error: None,
    };

    if !heuristic_passed {
        let event = apply_transition(&mut job, Transition::ScoringRejected { from_heuristic: true }, now, false)?;
        ctx.repo.replace(&job).await?;
        events::persist(&ctx.evidence, event).await;

        let run = ScoringRun {
            id: Uuid::new_v4(),
            job_key: job_key.to_string(),
            source,
            final_status: ScoringFinalStatus::RejectedHeuristic,
            heuristic_reasons,
            heuristic_gate,
            ai_extract: StageMetric::skipped(now),
            ai_reason: StageMetric::skipped(now),
            evidence_upsert: StageMetric::skipped(now),
            ai_model: None,
            total_latency_ms: (Utc::now() - run_started).num_milliseconds(),
            final_score: None,
            reject_triggered: true,
            created_at: now,
        };
        ctx.repo.insert_scoring_run(&run).await?;
        return Ok(run);
    }

    let Some(ai_client) = ctx.ai_client.clone() else {
        job.system_status = Some(jobops_core::SystemStatus::AiUnavailable);
        ctx.repo.replace(&job).await?;
        let run = ScoringRun {
            id: Uuid::new_v4(),
            job_key: job_key.to_string(),
            source,
            final_status: ScoringFinalStatus::Failed,
            heuristic_reasons,
            heuristic_gate,
            ai_extract: StageMetric::skipped(now),
            ai_reason: StageMetric::skipped(now),
            evidence_upsert: StageMetric::skipped(now),
            ai_model: None,
            total_latency_ms: (Utc::now() - run_started).num_milliseconds(),
            final_score: None,
            reject_triggered: false,
            created_at: now,
        };
        ctx.repo.insert_scoring_run(&run).await?;
        return Ok(run);
    };

    // Stage 2: AI extract.
    let extraction_fresh = job.role_title.is_some()
        && !job.must_have.is_empty()
        && job.last_scored_at.is_some_and(|t| now - t < chrono::Duration::hours(EXTRACTION_FRESHNESS_HOURS));

    let (ai_extract, extract_failed) = if extraction_fresh {
        (StageMetric::skipped(now), false)
    } else {
        run_extract_stage(ai_client.as_ref(), &jd_text, &mut job).await
    };

    // Stage 3: AI reason (per-target loop; ties broken by jobops_ai::pick_primary).
    let (ai_reason, reason_failed, judgment) = if extract_failed {
        (StageMetric::skipped(now), false, None)
    } else {
        run_reason_stage(ai_client.as_ref(), &job, &targets).await
    };

    let ai_failed = extract_failed || reason_failed;
    let ai_model = Some(ai_client.model_name().to_string());

    if ai_failed {
        job.system_status = Some(jobops_core::SystemStatus::AiUnavailable);
        ctx.repo.replace(&job).await?;
        let run = ScoringRun {
            id: Uuid::new_v4(),
            job_key: job_key.to_string(),
            source,
            final_status: ScoringFinalStatus::Failed,
            heuristic_reasons,
            heuristic_gate,
            ai_extract,
            ai_reason,
            evidence_upsert: StageMetric::skipped(now),
            ai_model,
            total_latency_ms: (Utc::now() - run_started).num_milliseconds(),
            final_score: None,
            reject_triggered: false,
            created_at: now,
        };
        ctx.repo.insert_scoring_run(&run).await?;
        return Ok(run);
    }

    let judgment = judgment.expect("reason stage succeeded without a judgment");
    job.primary_target_id = Some(judgment.primary_target_id.clone());
    job.score_must = Some(judgment.score_must);
    job.score_nice = Some(judgment.score_nice);
    job.final_score = Some(judgment.final_score);
    job.reject_triggered = judgment.reject_triggered != 0;
    job.reason_top_matches = Some(judgment.reason_top_matches.clone());

    // Stage 4: evidence upsert.
    let evidence_started = Utc::now();
    let evidence_err = upsert_evidence_for_job(ctx, &job, &targets).await.err();
    let evidence_finished = Utc::now();
    let evidence_upsert = StageMetric {
        status: if evidence_err.is_none() { StageStatus::Ok } else { StageStatus::Failed },
        started_at: evidence_started,
        finished_at: evidence_finished,
        latency_ms: (evidence_finished - evidence_started).num_milliseconds(),
        tokens_in: 0,
        tokens_out: 0,
        tokens_total: 0,
        error: evidence_err.as_ref().map(|e| e.to_string()),
    };
    if let Some(e) = &evidence_err {
        warn!(job_key = %job_key, error = %e, "evidence upsert failed");
    }

    let event = if job.reject_triggered {
        apply_transition(&mut job, Transition::ScoringRejected { from_heuristic: false }, now, false)?
    } else {
        apply_transition(
            &mut job,
            Transition::ScoringCompleted { final_score: judgment.final_score, shortlist_threshold: ctx.config.shortlist_threshold },
            now,
            false,
        )?
    };
    ctx.repo.replace(&job).await?;
    events::persist(&ctx.evidence, event).await;

    let run = ScoringRun {
        id: Uuid::new_v4(),
        job_key: job_key.to_string(),
        source,
        final_status: ScoringFinalStatus::Completed,
        heuristic_reasons,
        heuristic_gate,
        ai_extract,
        ai_reason,
        evidence_upsert,
        ai_model,
        total_latency_ms: (Utc::now() - run_started).num_milliseconds(),
        final_score: Some(judgment.final_score),
        reject_triggered: job.reject_triggered,
        created_at: now,
    };
    ctx.repo.insert_scoring_run(&run).await?;
    Ok(run)
}

/// Calls `attempt` up to three times total, backing off 100ms then 400ms
/// between attempts (spec.md §4.5's exponential 100ms -> 400ms policy).
async fn with_retry<T, E, F, Fut>(mut attempt: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut last_err = match attempt().await {
        Ok(v) => return Ok(v),
        Err(e) => e,
    };
    for backoff_ms in RETRY_BACKOFF_MS {
        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        match attempt().await {
            Ok(v) => return Ok(v),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

async fn run_extract_stage(ai_client: &dyn LlmClient, jd_text: &str, job: &mut Job) -> (StageMetric, bool) {
    let started = Utc::now();
    let system_prompt = jobops_ai::prompt::EXTRACTION_SYSTEM_PROMPT;
    let user_prompt = jobops_ai::prompt::build_extraction_prompt(jd_text);

    let result = with_retry(|| async { ai_client.complete(system_prompt, &user_prompt).await }).await;
    let finished = Utc::now();
    let latency_ms = (finished - started).num_milliseconds();

    match result {
        Ok(completion) => match jobops_ai::parse_extraction_response(&completion.content) {
            Ok(extracted) => {
                job.role_title = extracted.role_title.or(job.role_title.clone());
                job.company = extracted.company.or(job.company.clone());
                job.location = extracted.location.or(job.location.clone());
                job.work_mode = extracted.work_mode.or(job.work_mode.clone());
                job.seniority = extracted.seniority.or(job.seniority.clone());
                job.experience_years_min = extracted.experience_years_min.or(job.experience_years_min);
                job.experience_years_max = extracted.experience_years_max.or(job.experience_years_max);
                if !extracted.must_have_keywords.is_empty() {
                    job.must_have = extracted.must_have_keywords;
                }
                if !extracted.nice_to_have_keywords.is_empty() {
                    job.nice_to_have = extracted.nice_to_have_keywords;
                }
                if !extracted.reject_keywords.is_empty() {
                    job.reject_keywords = extracted.reject_keywords;
                }
                (
                    StageMetric {
                        status: StageStatus::Ok,
                        started_at: started,
                        finished_at: finished,
                        latency_ms,
                        tokens_in: completion.tokens_in,
                        tokens_out: completion.tokens_out,
                        tokens_total: completion.tokens_in + completion.tokens_out,
                        error: None,
                    },
                    false,
                )
            }
            Err(e) => (
                StageMetric {
                    status: StageStatus::Failed,
                    started_at: started,
                    finished_at: finished,
                    latency_ms,
                    tokens_in: completion.tokens_in,
                    tokens_out: completion.tokens_out,
                    tokens_total: completion.tokens_in + completion.tokens_out,
                    error: Some(e.to_string()),
                },
                true,
            ),
        },
        Err(e) => (
            StageMetric {
                status: StageStatus::Failed,
                started_at: started,
                finished_at: finished,
                latency_ms,
                tokens_in: 0,
                tokens_out: 0,
                tokens_total: 0,
                error: Some(e.to_string()),
            },
            true,
        ),
    }
}

async fn run_reason_stage(ai_client: &dyn LlmClient, job: &Job, targets: &[Target]) -> (StageMetric, bool, Option<jobops_ai::ScoringJudgment>) {
    let started = Utc::now();
    if targets.is_empty() {
        let finished = Utc::now();
        return (
            StageMetric {
                status: StageStatus::Skipped,
                started_at: started,
                finished_at: finished,
                latency_ms: 0,
                tokens_in: 0,
                tokens_out: 0,
                tokens_total: 0,
                error: Some("no targets configured".into()),
            },
            true,
            None,
        );
    }

    let system_prompt = jobops_ai::prompt::SCORING_SYSTEM_PROMPT;
    let mut judgments = Vec::with_capacity(targets.len());
    let mut tokens_in_total = 0u32;
    let mut tokens_out_total = 0u32;
    let mut any_failed = false;

    for target in targets {
        let user_prompt = jobops_ai::prompt::build_scoring_prompt(job.jd_text_clean.as_deref().unwrap_or_default(), target);
        match with_retry(|| async { ai_client.complete(system_prompt, &user_prompt).await }).await {
            Ok(completion) => {
                tokens_in_total += completion.tokens_in;
                tokens_out_total += completion.tokens_out;
                match jobops_ai::parse_scoring_response(&completion.content) {
                    Ok(judgment) => judgments.push(judgment),
                    Err(e) => {
                        warn!(target = %target.id, error = %e, "failed to parse scoring response");
                        any_failed = true;
                    }
                }
            }
            Err(e) => {
                warn!(target = %target.id, error = %e, "scoring call failed");
                any_failed = true;
            }
        }
    }

    let finished = Utc::now();
    let latency_ms = (finished - started).num_milliseconds();

    if judgments.is_empty() {
        return (
            StageMetric {
                status: StageStatus::Failed,
                started_at: started,
                finished_at: finished,
                latency_ms,
                tokens_in: tokens_in_total,
                tokens_out: tokens_out_total,
                tokens_total: tokens_in_total + tokens_out_total,
                error: Some("no target produced a usable judgment".into()),
            },
            true,
            None,
        );
    }

    let primary = jobops_ai::pick_primary(&judgments).cloned();
    let _ = any_failed;
    (
        StageMetric {
            status: StageStatus::Ok,
            started_at: started,
            finished_at: finished,
            latency_ms,
            tokens_in: tokens_in_total,
            tokens_out: tokens_out_total,
            tokens_total: tokens_in_total + tokens_out_total,
            error: None,
        },
        false,
        primary,
    )
}

async fn upsert_evidence_for_job(ctx: &ScoringContext, job: &Job, targets: &[Target]) -> Result<(), jobops_evidence::StoreError> {
    let jd_lower = job.jd_text_clean.as_deref().unwrap_or_default().to_lowercase();
    let Some(target) = targets.iter().find(|t| Some(&t.id) == job.primary_target_id.as_ref()) else {
        return Ok(());
    };

    for (requirement_type, keywords) in
        [(RequirementType::Must, &target.must), (RequirementType::Nice, &target.nice), (RequirementType::Reject, &target.reject)]
    {
        for keyword in keywords {
            let matched = contains_word(&jd_lower, keyword);
            let confidence = if matched { 80.0 } else { 20.0 };
            ctx.evidence
                .upsert_evidence(
                    &job.job_key,
                    keyword,
                    requirement_type,
                    Some(job.jd_text_clean.as_deref().unwrap_or_default()),
                    Some("jd_text_clean"),
                    confidence,
                    matched,
                )
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: &str, must: Vec<&str>, nice: Vec<&str>, reject: Vec<&str>) -> Target {
        let now = Utc::now();
        Target {
            id: id.into(),
            name: id.into(),
            primary_role: None,
            preferred_seniority: vec![],
            preferred_locations: vec![],
            must: must.into_iter().map(String::from).collect(),
            nice: nice.into_iter().map(String::from).collect(),
            reject: reject.into_iter().map(String::from).collect(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn target_signal_score_counts_distinct_keyword_hits() {
        let targets = vec![target("t1", vec!["rust", "postgres"], vec!["kubernetes"], vec![])];
        let jd = "we use rust and postgres daily, kubernetes is a plus";
        assert_eq!(target_signal_score(&jd.to_lowercase(), &targets), 3);
    }

    #[test]
    fn blocked_keyword_hits_are_reported_with_prefix() {
        let targets = vec![target("t1", vec!["rust"], vec![], vec!["javascript"])];
        let jd = "we use only javascript and python here".to_lowercase();
        let hits = blocked_keyword_hits(&jd, &targets);
        assert_eq!(hits, vec!["blocked_keyword:javascript".to_string()]);
    }

    #[test]
    fn contains_word_respects_word_boundaries() {
        assert!(contains_word("we use go for backend services", "go"));
        assert!(!contains_word("we use golang for backend services", "go"));
    }
}
