//! Repository for `jobs`, `targets`, and `scoring_runs`, modeled as the
//! `JobsRepo` trait (spec: DB is one of the four collaborator interfaces)
//! with a Postgres-backed production adapter (`PgJobsRepo`) and an
//! in-memory adapter (`InMemoryJobsRepo`) for tests, matching the
//! `Fetcher`/`LlmClient` trait-plus-mock pattern used elsewhere.
//!
//! `jobops-core::Job` carries no `sqlx` derives (the core crate has no I/O
//! of its own), so `PgJobsRepo` hand-maps rows to/from the domain type
//! instead of deriving `FromRow` on it directly.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use jobops_core::{
    FetchStatus, Job, JdConfidence, JdSource, JobStatus, ScoringFinalStatus, ScoringRun, ScoringSource, StageMetric, StageStatus,
    SystemStatus, Target,
};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("malformed stored value: {0}")]
    Decode(String),
}

fn jd_source_str(v: JdSource) -> &'static str {
    match v {
        JdSource::Fetched => "fetched",
        JdSource::Email => "email",
        JdSource::Manual => "manual",
        JdSource::None => "none",
    }
}

fn jd_source_from(s: &str) -> Result<JdSource, RepoError> {
    match s {
        "fetched" => Ok(JdSource::Fetched),
        "email" => Ok(JdSource::Email),
        "manual" => Ok(JdSource::Manual),
        "none" => Ok(JdSource::None),
        other => Err(RepoError::Decode(format!("unknown jd_source {other}"))),
    }
}

fn fetch_status_str(v: FetchStatus) -> &'static str {
    match v {
        FetchStatus::Ok => "ok",
        FetchStatus::Blocked => "blocked",
        FetchStatus::Failed => "failed",
        FetchStatus::AiUnavailable => "ai_unavailable",
    }
}

fn fetch_status_from(s: &str) -> Result<FetchStatus, RepoError> {
    match s {
        "ok" => Ok(FetchStatus::Ok),
        "blocked" => Ok(FetchStatus::Blocked),
        "failed" => Ok(FetchStatus::Failed),
        "ai_unavailable" => Ok(FetchStatus::AiUnavailable),
        other => Err(RepoError::Decode(format!("unknown fetch_status {other}"))),
    }
}

fn jd_confidence_str(v: JdConfidence) -> &'static str {
    match v {
        JdConfidence::Low => "low",
        JdConfidence::Medium => "medium",
        JdConfidence::High => "high",
    }
}

fn jd_confidence_from(s: &str) -> Result<JdConfidence, RepoError> {
    match s {
        "low" => Ok(JdConfidence::Low),
        "medium" => Ok(JdConfidence::Medium),
        "high" => Ok(JdConfidence::High),
        other => Err(RepoError::Decode(format!("unknown jd_confidence {other}"))),
    }
}

pub fn job_status_str(v: JobStatus) -> &'static str {
    match v {
        JobStatus::New => "NEW",
        JobStatus::Scored => "SCORED",
        JobStatus::Shortlisted => "SHORTLISTED",
        JobStatus::Applied => "APPLIED",
        JobStatus::Rejected => "REJECTED",
        JobStatus::Archived => "ARCHIVED",
        JobStatus::LinkOnly => "LINK_ONLY",
    }
}

pub fn job_status_from(s: &str) -> Result<JobStatus, RepoError> {
    match s {
        "NEW" => Ok(JobStatus::New),
        "SCORED" => Ok(JobStatus::Scored),
        "SHORTLISTED" => Ok(JobStatus::Shortlisted),
        "APPLIED" => Ok(JobStatus::Applied),
        "REJECTED" => Ok(JobStatus::Rejected),
        "ARCHIVED" => Ok(JobStatus::Archived),
        "LINK_ONLY" => Ok(JobStatus::LinkOnly),
        other => Err(RepoError::Decode(format!("unknown status {other}"))),
    }
}

fn system_status_str(v: SystemStatus) -> &'static str {
    match v {
        SystemStatus::NeedsManualJd => "NEEDS_MANUAL_JD",
        SystemStatus::AiUnavailable => "AI_UNAVAILABLE",
        SystemStatus::RejectedHeuristic => "REJECTED_HEURISTIC",
    }
}

fn system_status_from(s: &str) -> Result<SystemStatus, RepoError> {
    match s {
        "NEEDS_MANUAL_JD" => Ok(SystemStatus::NeedsManualJd),
        "AI_UNAVAILABLE" => Ok(SystemStatus::AiUnavailable),
        "REJECTED_HEURISTIC" => Ok(SystemStatus::RejectedHeuristic),
        other => Err(RepoError::Decode(format!("unknown system_status {other}"))),
    }
}

fn scoring_source_str(v: ScoringSource) -> &'static str {
    match v {
        ScoringSource::ScorePending => "score_pending",
        ScoringSource::Rescore => "rescore",
        ScoringSource::ManualJd => "manual_jd",
        ScoringSource::Ingest => "ingest",
    }
}

fn scoring_final_status_str(v: ScoringFinalStatus) -> &'static str {
    match v {
        ScoringFinalStatus::Completed => "COMPLETED",
        ScoringFinalStatus::RejectedHeuristic => "REJECTED_HEURISTIC",
        ScoringFinalStatus::Failed => "FAILED",
    }
}

fn stage_metric_json(m: &StageMetric) -> serde_json::Value {
    serde_json::to_value(m).unwrap_or(serde_json::Value::Null)
}

/// The DB collaborator interface: every call site in `jobops-worker` talks
/// to jobs/targets/scoring_runs through this trait rather than a concrete
/// `sqlx` type, so tests can swap in `InMemoryJobsRepo`.
#[async_trait]
pub trait JobsRepo: Send + Sync {
    async fn find_by_key(&self, job_key: &str) -> Result<Option<Job>, RepoError>;
    async fn upsert_merge(&self, incoming: Job, now: DateTime<Utc>) -> Result<(Job, bool), RepoError>;
    async fn replace(&self, job: &Job) -> Result<(), RepoError>;
    async fn list(&self, status: Option<JobStatus>, q: Option<&str>, limit: i64, offset: i64) -> Result<Vec<Job>, RepoError>;
    async fn insert_scoring_run(&self, run: &ScoringRun) -> Result<(), RepoError>;
    async fn list_targets(&self) -> Result<Vec<Target>, RepoError>;
    async fn find_target(&self, id: &str) -> Result<Option<Target>, RepoError>;
    async fn upsert_target(&self, target: &Target) -> Result<(), RepoError>;
    async fn latest_target_update(&self) -> Result<Option<DateTime<Utc>>, RepoError>;
}

#[derive(Clone)]
pub struct PgJobsRepo {
    pool: PgPool,
}

impl PgJobsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                job_key TEXT PRIMARY KEY,
                job_url TEXT NOT NULL,
                job_url_raw TEXT NOT NULL,
                source_domain TEXT NOT NULL,
                external_id TEXT,
                role_title TEXT,
                company TEXT,
                location TEXT,
                work_mode TEXT,
                seniority TEXT,
                experience_years_min INT,
                experience_years_max INT,
                must_have TEXT[] NOT NULL DEFAULT '{}',
                nice_to_have TEXT[] NOT NULL DEFAULT '{}',
                reject_keywords TEXT[] NOT NULL DEFAULT '{}',
                jd_text_clean TEXT,
                jd_source TEXT NOT NULL DEFAULT 'none',
                fetch_status TEXT,
                jd_confidence TEXT,
                primary_target_id TEXT,
                score_must DOUBLE PRECISION,
                score_nice DOUBLE PRECISION,
                final_score DOUBLE PRECISION,
                reject_triggered BOOLEAN NOT NULL DEFAULT FALSE,
                reject_reasons TEXT[] NOT NULL DEFAULT '{}',
                reason_top_matches TEXT,
                status TEXT,
                system_status TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                last_scored_at TIMESTAMPTZ,
                applied_at TIMESTAMPTZ,
                rejected_at TIMESTAMPTZ,
                archived_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS targets (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                primary_role TEXT,
                preferred_seniority TEXT[] NOT NULL DEFAULT '{}',
                preferred_locations TEXT[] NOT NULL DEFAULT '{}',
                must TEXT[] NOT NULL DEFAULT '{}',
                nice TEXT[] NOT NULL DEFAULT '{}',
                reject TEXT[] NOT NULL DEFAULT '{}',
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scoring_runs (
                id UUID PRIMARY KEY,
                job_key TEXT NOT NULL REFERENCES jobs(job_key) ON DELETE CASCADE,
                source TEXT NOT NULL,
                final_status TEXT NOT NULL,
                heuristic_reasons TEXT[] NOT NULL DEFAULT '{}',
                heuristic_gate JSONB NOT NULL,
                ai_extract JSONB NOT NULL,
                ai_reason JSONB NOT NULL,
                evidence_upsert JSONB NOT NULL,
                ai_model TEXT,
                total_latency_ms BIGINT NOT NULL,
                final_score DOUBLE PRECISION,
                reject_triggered BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl PgJobsRepo {
    async fn write_row(&self, incoming: &Job) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                job_key, job_url, job_url_raw, source_domain, external_id,
                role_title, company, location, work_mode, seniority,
                experience_years_min, experience_years_max,
                must_have, nice_to_have, reject_keywords,
                jd_text_clean, jd_source, fetch_status, jd_confidence,
                primary_target_id, score_must, score_nice, final_score,
                reject_triggered, reject_reasons, reason_top_matches,
                status, system_status,
                created_at, updated_at, last_scored_at, applied_at, rejected_at, archived_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19,
                $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32, $33, $34
            )
            ON CONFLICT (job_key) DO UPDATE SET
                job_url = EXCLUDED.job_url, job_url_raw = EXCLUDED.job_url_raw, source_domain = EXCLUDED.source_domain,
                external_id = EXCLUDED.external_id, role_title = EXCLUDED.role_title, company = EXCLUDED.company,
                location = EXCLUDED.location, work_mode = EXCLUDED.work_mode, seniority = EXCLUDED.seniority,
                experience_years_min = EXCLUDED.experience_years_min, experience_years_max = EXCLUDED.experience_years_max,
                must_have = EXCLUDED.must_have, nice_to_have = EXCLUDED.nice_to_have, reject_keywords = EXCLUDED.reject_keywords,
                jd_text_clean = EXCLUDED.jd_text_clean, jd_source = EXCLUDED.jd_source, fetch_status = EXCLUDED.fetch_status,
                jd_confidence = EXCLUDED.jd_confidence, primary_target_id = EXCLUDED.primary_target_id,
                score_must = EXCLUDED.score_must, score_nice = EXCLUDED.score_nice, final_score = EXCLUDED.final_score,
                reject_triggered = EXCLUDED.reject_triggered, reject_reasons = EXCLUDED.reject_reasons,
                reason_top_matches = EXCLUDED.reason_top_matches, status = EXCLUDED.status, system_status = EXCLUDED.system_status,
                updated_at = EXCLUDED.updated_at, last_scored_at = EXCLUDED.last_scored_at, applied_at = EXCLUDED.applied_at,
                rejected_at = EXCLUDED.rejected_at, archived_at = EXCLUDED.archived_at
            "#,
        )
        .bind(&incoming.job_key)
        .bind(&incoming.job_url)
        .bind(&incoming.job_url_raw)
        .bind(&incoming.source_domain)
        .bind(&incoming.external_id)
        .bind(&incoming.role_title)
        .bind(&incoming.company)
        .bind(&incoming.location)
        .bind(&incoming.work_mode)
        .bind(&incoming.seniority)
        .bind(incoming.experience_years_min)
        .bind(incoming.experience_years_max)
        .bind(&incoming.must_have)
        .bind(&incoming.nice_to_have)
        .bind(&incoming.reject_keywords)
        .bind(&incoming.jd_text_clean)
        .bind(jd_source_str(incoming.jd_source))
        .bind(incoming.fetch_status.map(fetch_status_str))
        .bind(incoming.jd_confidence.map(jd_confidence_str))
        .bind(&incoming.primary_target_id)
        .bind(incoming.score_must)
        .bind(incoming.score_nice)
        .bind(incoming.final_score)
        .bind(incoming.reject_triggered)
        .bind(&incoming.reject_reasons)
        .bind(&incoming.reason_top_matches)
        .bind(incoming.status.map(job_status_str))
        .bind(incoming.system_status.map(system_status_str))
        .bind(incoming.created_at)
        .bind(incoming.updated_at)
        .bind(incoming.last_scored_at)
        .bind(incoming.applied_at)
        .bind(incoming.rejected_at)
        .bind(incoming.archived_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl JobsRepo for PgJobsRepo {
    async fn find_by_key(&self, job_key: &str) -> Result<Option<Job>, RepoError> {
        let row = sqlx::query("SELECT * FROM jobs WHERE job_key = $1").bind(job_key).fetch_optional(&self.pool).await?;
        row.map(|r| row_to_job(&r)).transpose()
    }

    /// Insert `job` if absent, else merge non-empty incoming fields over the
    /// existing row (prefer non-empty existing unless the caller passes an
    /// explicit override by setting the field before calling). Always bumps
    /// `updated_at`; `created_at` is set only on insert. Returns
    /// `(job, was_existing)`.
    async fn upsert_merge(&self, mut incoming: Job, now: DateTime<Utc>) -> Result<(Job, bool), RepoError> {
        let existing = self.find_by_key(&incoming.job_key).await?;
        let was_existing = existing.is_some();

        if let Some(existing) = existing {
            merge_prefer_non_empty(&mut incoming, &existing);
            incoming.created_at = existing.created_at;
        }
        incoming.updated_at = now;
        self.write_row(&incoming).await?;

        Ok((incoming, was_existing))
    }

    /// Overwrite the row verbatim with `job`'s current fields — used after
    /// the caller has already resolved merge semantics (e.g. a lifecycle
    /// transition or scoring result applied to an in-memory `Job`).
    async fn replace(&self, job: &Job) -> Result<(), RepoError> {
        self.write_row(job).await
    }

    async fn list(&self, status: Option<JobStatus>, q: Option<&str>, limit: i64, offset: i64) -> Result<Vec<Job>, RepoError> {
        let status_str = status.map(job_status_str);
        let like = q.map(|s| format!("%{}%", s.to_lowercase()));
        let rows = sqlx::query(
            r#"
            SELECT * FROM jobs
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR lower(coalesce(role_title, '')) LIKE $2 OR lower(coalesce(company, '')) LIKE $2)
            ORDER BY updated_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(status_str)
        .bind(like)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_job).collect()
    }

    async fn insert_scoring_run(&self, run: &ScoringRun) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO scoring_runs (
                id, job_key, source, final_status, heuristic_reasons,
                heuristic_gate, ai_extract, ai_reason, evidence_upsert,
                ai_model, total_latency_ms, final_score, reject_triggered, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(run.id)
        .bind(&run.job_key)
        .bind(scoring_source_str(run.source))
        .bind(scoring_final_status_str(run.final_status))
        .bind(&run.heuristic_reasons)
        .bind(stage_metric_json(&run.heuristic_gate))
        .bind(stage_metric_json(&run.ai_extract))
        .bind(stage_metric_json(&run.ai_reason))
        .bind(stage_metric_json(&run.evidence_upsert))
        .bind(&run.ai_model)
        .bind(run.total_latency_ms)
        .bind(run.final_score)
        .bind(run.reject_triggered)
        .bind(run.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_targets(&self) -> Result<Vec<Target>, RepoError> {
        let rows = sqlx::query("SELECT * FROM targets ORDER BY created_at").fetch_all(&self.pool).await?;
        rows.iter().map(row_to_target).collect()
    }

    async fn find_target(&self, id: &str) -> Result<Option<Target>, RepoError> {
        let row = sqlx::query("SELECT * FROM targets WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_target).transpose()
    }

    /// Target writes are serialized globally per spec §5 ("single-writer");
    /// callers are expected to hold a single admin-request-scoped mutex
    /// above this method if concurrent admin writers are possible.
    async fn upsert_target(&self, target: &Target) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO targets (id, name, primary_role, preferred_seniority, preferred_locations, must, nice, reject, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name, primary_role = EXCLUDED.primary_role,
                preferred_seniority = EXCLUDED.preferred_seniority, preferred_locations = EXCLUDED.preferred_locations,
                must = EXCLUDED.must, nice = EXCLUDED.nice, reject = EXCLUDED.reject, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&target.id)
        .bind(&target.name)
        .bind(&target.primary_role)
        .bind(&target.preferred_seniority)
        .bind(&target.preferred_locations)
        .bind(&target.must)
        .bind(&target.nice)
        .bind(&target.reject)
        .bind(target.created_at)
        .bind(target.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_target_update(&self) -> Result<Option<DateTime<Utc>>, RepoError> {
        let row = sqlx::query("SELECT max(updated_at) as m FROM targets").fetch_one(&self.pool).await?;
        Ok(row.try_get::<Option<DateTime<Utc>>, _>("m")?)
    }
}

fn merge_prefer_non_empty(incoming: &mut Job, existing: &Job) {
    macro_rules! prefer_existing_if_incoming_empty {
        ($field:ident) => {
            if incoming.$field.is_none() {
                incoming.$field = existing.$field.clone();
            }
        };
    }
    prefer_existing_if_incoming_empty!(role_title);
    prefer_existing_if_incoming_empty!(company);
    prefer_existing_if_incoming_empty!(location);
    prefer_existing_if_incoming_empty!(work_mode);
    prefer_existing_if_incoming_empty!(seniority);
    prefer_existing_if_incoming_empty!(external_id);

    if incoming.must_have.is_empty() {
        incoming.must_have = existing.must_have.clone();
    }
    if incoming.nice_to_have.is_empty() {
        incoming.nice_to_have = existing.nice_to_have.clone();
    }
    if incoming.reject_keywords.is_empty() {
        incoming.reject_keywords = existing.reject_keywords.clone();
    }
    if !incoming.has_usable_jd() {
        incoming.jd_text_clean = existing.jd_text_clean.clone();
    }
}

fn row_to_job(row: &sqlx::postgres::PgRow) -> Result<Job, RepoError> {
    let jd_source: String = row.try_get("jd_source")?;
    let fetch_status: Option<String> = row.try_get("fetch_status")?;
    let jd_confidence: Option<String> = row.try_get("jd_confidence")?;
    let status: Option<String> = row.try_get("status")?;
    let system_status: Option<String> = row.try_get("system_status")?;

    Ok(Job {
        job_key: row.try_get("job_key")?,
        job_url: row.try_get("job_url")?,
        job_url_raw: row.try_get("job_url_raw")?,
        source_domain: row.try_get("source_domain")?,
        external_id: row.try_get("external_id")?,
        role_title: row.try_get("role_title")?,
        company: row.try_get("company")?,
        location: row.try_get("location")?,
        work_mode: row.try_get("work_mode")?,
        seniority: row.try_get("seniority")?,
        experience_years_min: row.try_get("experience_years_min")?,
        experience_years_max: row.try_get("experience_years_max")?,
        must_have: row.try_get("must_have")?,
        nice_to_have: row.try_get("nice_to_have")?,
        reject_keywords: row.try_get("reject_keywords")?,
        jd_text_clean: row.try_get("jd_text_clean")?,
        jd_source: jd_source_from(&jd_source)?,
        fetch_status: fetch_status.map(|s| fetch_status_from(&s)).transpose()?,
        jd_confidence: jd_confidence.map(|s| jd_confidence_from(&s)).transpose()?,
        primary_target_id: row.try_get("primary_target_id")?,
        score_must: row.try_get("score_must")?,
        score_nice: row.try_get("score_nice")?,
        final_score: row.try_get("final_score")?,
        reject_triggered: row.try_get("reject_triggered")?,
        reject_reasons: row.try_get("reject_reasons")?,
        reason_top_matches: row.try_get("reason_top_matches")?,
        status: status.map(|s| job_status_from(&s)).transpose()?,
        system_status: system_status.map(|s| system_status_from(&s)).transpose()?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        last_scored_at: row.try_get("last_scored_at")?,
        applied_at: row.try_get("applied_at")?,
        rejected_at: row.try_get("rejected_at")?,
        archived_at: row.try_get("archived_at")?,
    })
}

fn row_to_target(row: &sqlx::postgres::PgRow) -> Result<Target, RepoError> {
    Ok(Target {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        primary_role: row.try_get("primary_role")?,
        preferred_seniority: row.try_get("preferred_seniority")?,
        preferred_locations: row.try_get("preferred_locations")?,
        must: row.try_get("must")?,
        nice: row.try_get("nice")?,
        reject: row.try_get("reject")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// In-memory `JobsRepo` adapter for tests: no network, no schema, just two
/// locked maps. Mirrors `jobops-connectors::fetcher::MockFetcher` and
/// `jobops-ai::client::MockLlmClient` as the DB collaborator's mock.
#[derive(Default)]
pub struct InMemoryJobsRepo {
    jobs: Mutex<HashMap<String, Job>>,
    targets: Mutex<HashMap<String, Target>>,
    scoring_runs: Mutex<Vec<ScoringRun>>,
}

impl InMemoryJobsRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a job directly, bypassing merge semantics — for test setup.
    pub fn seed_job(&self, job: Job) {
        self.jobs.lock().unwrap().insert(job.job_key.clone(), job);
    }

    /// Seeds a target directly — for test setup.
    pub fn seed_target(&self, target: Target) {
        self.targets.lock().unwrap().insert(target.id.clone(), target);
    }
}

#[async_trait]
impl JobsRepo for InMemoryJobsRepo {
    async fn find_by_key(&self, job_key: &str) -> Result<Option<Job>, RepoError> {
        Ok(self.jobs.lock().unwrap().get(job_key).cloned())
    }

    async fn upsert_merge(&self, mut incoming: Job, now: DateTime<Utc>) -> Result<(Job, bool), RepoError> {
        let mut jobs = self.jobs.lock().unwrap();
        let existing = jobs.get(&incoming.job_key).cloned();
        let was_existing = existing.is_some();
        if let Some(existing) = &existing {
            merge_prefer_non_empty(&mut incoming, existing);
            incoming.created_at = existing.created_at;
        }
        incoming.updated_at = now;
        jobs.insert(incoming.job_key.clone(), incoming.clone());
        Ok((incoming, was_existing))
    }

    async fn replace(&self, job: &Job) -> Result<(), RepoError> {
        self.jobs.lock().unwrap().insert(job.job_key.clone(), job.clone());
        Ok(())
    }

    async fn list(&self, status: Option<JobStatus>, q: Option<&str>, limit: i64, offset: i64) -> Result<Vec<Job>, RepoError> {
        let like = q.map(|s| s.to_lowercase());
        let mut matched: Vec<Job> = self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| status.is_none_or(|s| j.status == Some(s)))
            .filter(|j| match &like {
                None => true,
                Some(needle) => {
                    j.role_title.as_deref().unwrap_or_default().to_lowercase().contains(needle)
                        || j.company.as_deref().unwrap_or_default().to_lowercase().contains(needle)
                }
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let offset = offset.max(0) as usize;
        Ok(matched.into_iter().skip(offset).take(limit.max(0) as usize).collect())
    }

    async fn insert_scoring_run(&self, run: &ScoringRun) -> Result<(), RepoError> {
        self.scoring_runs.lock().unwrap().push(run.clone());
        Ok(())
    }

    async fn list_targets(&self) -> Result<Vec<Target>, RepoError> {
        let mut targets: Vec<Target> = self.targets.lock().unwrap().values().cloned().collect();
        targets.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(targets)
    }

    async fn find_target(&self, id: &str) -> Result<Option<Target>, RepoError> {
        Ok(self.targets.lock().unwrap().get(id).cloned())
    }

    async fn upsert_target(&self, target: &Target) -> Result<(), RepoError> {
        self.targets.lock().unwrap().insert(target.id.clone(), target.clone());
        Ok(())
    }

    async fn latest_target_update(&self) -> Result<Option<DateTime<Utc>>, RepoError> {
        Ok(self.targets.lock().unwrap().values().map(|t| t.updated_at).max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobops_core::JdSource;

    fn job(job_key: &str, now: DateTime<Utc>) -> Job {
        Job::new_stub(job_key.into(), format!("https://x/{job_key}"), format!("https://x/{job_key}"), "x.com".into(), now)
    }

    #[test]
    fn merge_prefers_existing_non_empty_fields() {
        let now = Utc::now();
        let mut incoming = job("k1", now);
        let mut existing = job("k1", now);
        existing.role_title = Some("Staff Engineer".into());
        existing.must_have = vec!["rust".into()];
        existing.jd_text_clean = Some("a".repeat(300));
        existing.jd_source = JdSource::Fetched;

        incoming.role_title = None;
        incoming.must_have = vec![];

        merge_prefer_non_empty(&mut incoming, &existing);
        assert_eq!(incoming.role_title.as_deref(), Some("Staff Engineer"));
        assert_eq!(incoming.must_have, vec!["rust".to_string()]);
        assert!(incoming.jd_text_clean.is_some());
    }

    #[test]
    fn merge_keeps_incoming_non_empty_fields_over_existing() {
        let now = Utc::now();
        let mut incoming = job("k1", now);
        let mut existing = job("k1", now);
        existing.role_title = Some("Old Title".into());
        incoming.role_title = Some("New Title".into());

        merge_prefer_non_empty(&mut incoming, &existing);
        assert_eq!(incoming.role_title.as_deref(), Some("New Title"));
    }

    #[test]
    fn status_round_trips_through_string_form() {
        for s in [
            JobStatus::New,
            JobStatus::Scored,
            JobStatus::Shortlisted,
            JobStatus::Applied,
            JobStatus::Rejected,
            JobStatus::Archived,
            JobStatus::LinkOnly,
        ] {
            let round = job_status_from(job_status_str(s)).unwrap();
            assert_eq!(round, s);
        }
    }

    #[tokio::test]
    async fn in_memory_repo_upsert_merge_tracks_was_existing() {
        let repo = InMemoryJobsRepo::new();
        let now = Utc::now();
        let (saved, was_existing) = repo.upsert_merge(job("k1", now), now).await.unwrap();
        assert!(!was_existing);
        assert_eq!(saved.job_key, "k1");

        let mut update = job("k1", now);
        update.role_title = Some("Staff Engineer".into());
        let (saved, was_existing) = repo.upsert_merge(update, now).await.unwrap();
        assert!(was_existing);
        assert_eq!(saved.role_title.as_deref(), Some("Staff Engineer"));
    }

    #[tokio::test]
    async fn in_memory_repo_list_filters_by_status() {
        let repo = InMemoryJobsRepo::new();
        let now = Utc::now();
        let mut scored = job("k1", now);
        scored.status = Some(JobStatus::Scored);
        repo.seed_job(scored);
        repo.seed_job(job("k2", now));

        let results = repo.list(Some(JobStatus::Scored), None, 50, 0).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].job_key, "k1");
    }

    #[tokio::test]
    async fn in_memory_repo_target_round_trips() {
        let repo = InMemoryJobsRepo::new();
        let now = Utc::now();
        let target = Target {
            id: "t1".into(),
            name: "Rust Backend".into(),
            primary_role: None,
            preferred_seniority: vec![],
            preferred_locations: vec![],
            must: vec!["rust".into()],
            nice: vec![],
            reject: vec![],
            created_at: now,
            updated_at: now,
        };
        repo.upsert_target(&target).await.unwrap();
        let found = repo.find_target("t1").await.unwrap().unwrap();
        assert_eq!(found.name, "Rust Backend");
        assert_eq!(repo.latest_target_update().await.unwrap(), Some(now));
    }
}
