//! The UI/admin HTTP surface (spec §6): job listing and lifecycle actions,
//! ingest, batch scoring, target management, and pure-function admin probes
//! over individual pipeline stages. Grounded in the teacher's axum
//! `Router::new().route(...).with_state(...)` layout.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use jobops_connectors::email::EmailPayload;
use jobops_core::{canonicalize, resolve, Canonical, Job, JdResolverConfig, JobStatus, ResolveInput, ScoringSource, Target, Transition};

use crate::auth::{ApiAuth, EitherAuth, UiAuth};
use crate::error::ApiError;
use crate::events;
use crate::ingest::{ingest, IngestDeps};
use crate::jobs_repo::job_status_from;
use crate::scoring::{self, ScoringContext};
use crate::AppState;

// The envelope is always `{ok, data}` JSON; `T` just documents the payload
// shape for each handler's signature.
type ApiResult<T> = Result<Json<Value>, ApiError>;

fn ok_json<T: serde::Serialize>(data: T) -> Json<Value> {
    Json(json!({ "ok": true, "data": data }))
}

pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/{job_key}", get(get_job))
        .route("/jobs/{job_key}/status", post(set_job_status))
        .route("/jobs/{job_key}/rescore", post(rescore_job))
        .route("/jobs/{job_key}/manual-jd", post(manual_jd))
        .route("/ingest", post(ingest_handler))
        .route("/score-pending", post(score_pending))
        .route("/targets", get(list_targets).post(upsert_target_handler))
        .route("/targets/{id}", get(get_target).post(update_target_handler))
        .route("/normalize-job", post(normalize_job))
        .route("/resolve-jd", post(resolve_jd))
        .route("/extract-jd", post(extract_jd))
        .route("/score-jd", post(score_jd))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn scoring_context(state: &AppState) -> ScoringContext {
    ScoringContext { repo: state.repo.clone(), evidence: state.evidence.clone(), ai_client: state.ai_client.clone(), config: state.config.clone() }
}

fn resolver_config(state: &AppState) -> JdResolverConfig {
    JdResolverConfig { fetch_timeout: Duration::from_secs(state.config.fetch_timeout_secs), min_jd_chars: state.config.min_jd_chars }
}

// ---- jobs ----

#[derive(Debug, Deserialize)]
struct ListJobsQuery {
    status: Option<String>,
    q: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_jobs(_auth: UiAuth, State(state): State<Arc<AppState>>, Query(params): Query<ListJobsQuery>) -> ApiResult<Value> {
    let status = params.status.as_deref().map(job_status_from).transpose().map_err(ApiError::from)?;
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let offset = params.offset.unwrap_or(0).max(0);
    let jobs = state.repo.list(status, params.q.as_deref(), limit, offset).await?;
    Ok(ok_json(json!({ "jobs": jobs, "limit": limit, "offset": offset })))
}

async fn get_job(_auth: UiAuth, State(state): State<Arc<AppState>>, Path(job_key): Path<String>) -> ApiResult<Job> {
    let job = state.repo.find_by_key(&job_key).await?.ok_or_else(|| ApiError::NotFound(job_key.clone()))?;
    Ok(ok_json(job))
}

#[derive(Debug, Deserialize)]
struct SetStatusBody {
    status: String,
}

async fn set_job_status(
    _auth: UiAuth,
    State(state): State<Arc<AppState>>,
    Path(job_key): Path<String>,
    Json(body): Json<SetStatusBody>,
) -> ApiResult<Job> {
    let status = job_status_from(&body.status).map_err(ApiError::from)?;
    let mut job = state.repo.find_by_key(&job_key).await?.ok_or_else(|| ApiError::NotFound(job_key.clone()))?;
    let event = jobops_core::apply_transition(&mut job, Transition::ExplicitStatus { status }, Utc::now(), false)?;
    state.repo.replace(&job).await?;
    events::persist(&state.evidence, event).await;
    Ok(ok_json(job))
}

async fn rescore_job(_auth: UiAuth, State(state): State<Arc<AppState>>, Path(job_key): Path<String>) -> ApiResult<Value> {
    let _guard = state.locks.acquire(&job_key).await.ok_or(ApiError::LockBusy)?;
    let ctx = scoring_context(&state);
    let run = scoring::run_for_job(&ctx, &job_key, ScoringSource::Rescore).await?;
    Ok(ok_json(run))
}

#[derive(Debug, Deserialize)]
struct ManualJdBody {
    jd_text_clean: String,
}

async fn manual_jd(
    _auth: UiAuth,
    State(state): State<Arc<AppState>>,
    Path(job_key): Path<String>,
    Json(body): Json<ManualJdBody>,
) -> ApiResult<Value> {
    if body.jd_text_clean.trim().chars().count() < 200 {
        return Err(ApiError::Validation("jd_text_clean must be at least 200 characters".into()));
    }

    let _guard = state.locks.acquire(&job_key).await.ok_or(ApiError::LockBusy)?;
    let mut job = state.repo.find_by_key(&job_key).await?.ok_or_else(|| ApiError::NotFound(job_key.clone()))?;

    job.jd_text_clean = Some(body.jd_text_clean);
    job.jd_source = jobops_core::JdSource::Manual;
    job.fetch_status = Some(jobops_core::FetchStatus::Ok);
    job.jd_confidence = Some(jobops_core::JdConfidence::High);
    let now = Utc::now();
    let event = jobops_core::apply_transition(&mut job, Transition::ManualJdSubmit, now, false)?;
    state.repo.replace(&job).await?;
    events::persist(&state.evidence, event).await;

    if state.ai_client.is_none() {
        job.status = Some(JobStatus::LinkOnly);
        job.system_status = Some(jobops_core::SystemStatus::AiUnavailable);
        job.updated_at = now;
        state.repo.replace(&job).await?;
        return Ok(ok_json(json!({ "status": "LINK_ONLY", "saved_only": true })));
    }

    let ctx = scoring_context(&state);
    let run = scoring::run_for_job(&ctx, &job_key, ScoringSource::ManualJd).await?;
    Ok(ok_json(run))
}

// ---- ingest ----

#[derive(Debug, Deserialize)]
struct IngestBody {
    #[serde(default)]
    raw_urls: Vec<String>,
    email_subject: Option<String>,
    email_from: Option<String>,
    email_text: Option<String>,
    email_html: Option<String>,
}

async fn ingest_handler(_auth: UiAuth, State(state): State<Arc<AppState>>, Json(body): Json<IngestBody>) -> ApiResult<Value> {
    let now = Utc::now().timestamp();
    let mut envelopes = jobops_connectors::manual::ingest(&body.raw_urls, now);

    if body.email_text.is_some() || body.email_html.is_some() {
        let payload = EmailPayload { subject: body.email_subject, from: body.email_from, text: body.email_text, html: body.email_html };
        envelopes.extend(jobops_connectors::email::ingest(payload, now));
    }

    let deps = Arc::new(IngestDeps {
        repo: state.repo.clone(),
        evidence: state.evidence.clone(),
        fetcher: state.fetcher.clone(),
        ai_client: state.ai_client.clone(),
        locks: state.locks.clone(),
        config: state.config.clone(),
    });
    let report = ingest(deps, envelopes).await;
    Ok(ok_json(report))
}

// ---- batch scoring ----

#[derive(Debug, Deserialize)]
struct ScorePendingBody {
    limit: Option<i64>,
    status: Option<String>,
}

async fn score_pending(_auth: EitherAuth, State(state): State<Arc<AppState>>, Json(body): Json<ScorePendingBody>) -> ApiResult<Value> {
    let status = body.status.as_deref().map(job_status_from).transpose().map_err(ApiError::from)?;
    let limit = body.limit.unwrap_or(50).clamp(1, 500);
    let jobs = state.repo.list(status, None, limit, 0).await?;

    let ctx = scoring_context(&state);
    let mut scored = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;
    for job in jobs {
        if !job.has_usable_jd() || job.status.is_some_and(JobStatus::is_terminal) {
            skipped += 1;
            continue;
        }
        match scoring::run_for_job(&ctx, &job.job_key, ScoringSource::ScorePending).await {
            Ok(_) => scored += 1,
            Err(_) => failed += 1,
        }
    }

    Ok(ok_json(json!({ "scored": scored, "skipped": skipped, "failed": failed })))
}

// ---- targets ----

async fn list_targets(_auth: UiAuth, State(state): State<Arc<AppState>>) -> ApiResult<Vec<Target>> {
    let targets = state.repo.list_targets().await?;
    Ok(ok_json(targets))
}

async fn get_target(_auth: UiAuth, State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Target> {
    let target = state.repo.find_target(&id).await?.ok_or_else(|| ApiError::NotFound(id.clone()))?;
    Ok(ok_json(target))
}

#[derive(Debug, Deserialize)]
struct TargetBody {
    id: Option<String>,
    name: String,
    primary_role: Option<String>,
    #[serde(default)]
    preferred_seniority: Vec<String>,
    #[serde(default)]
    preferred_locations: Vec<String>,
    #[serde(default)]
    must: Vec<String>,
    #[serde(default)]
    nice: Vec<String>,
    #[serde(default)]
    reject: Vec<String>,
}

async fn upsert_target_handler(_auth: UiAuth, State(state): State<Arc<AppState>>, Json(body): Json<TargetBody>) -> ApiResult<Target> {
    let id = body.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    save_target(&state, id, body).await
}

async fn update_target_handler(
    _auth: UiAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<TargetBody>,
) -> ApiResult<Target> {
    state.repo.find_target(&id).await?.ok_or_else(|| ApiError::NotFound(id.clone()))?;
    save_target(&state, id, body).await
}

async fn save_target(state: &AppState, id: String, body: TargetBody) -> ApiResult<Target> {
    let now = Utc::now();
    let existing = state.repo.find_target(&id).await?;
    let created_at = existing.map(|t| t.created_at).unwrap_or(now);
    let target = Target {
        id,
        name: body.name,
        primary_role: body.primary_role,
        preferred_seniority: body.preferred_seniority,
        preferred_locations: body.preferred_locations,
        must: body.must,
        nice: body.nice,
        reject: body.reject,
        created_at,
        updated_at: now,
    };
    state.repo.upsert_target(&target).await?;
    Ok(ok_json(target))
}

// ---- pure-function admin probes over C1/C2/C5 ----

#[derive(Debug, Deserialize)]
struct NormalizeJobBody {
    raw_url: String,
}

async fn normalize_job(_auth: ApiAuth, Json(body): Json<NormalizeJobBody>) -> ApiResult<Value> {
    let data = match canonicalize(&body.raw_url) {
        Canonical::Ignored => json!({ "accepted": false }),
        Canonical::Accepted { job_url, job_key, source_domain, external_id } => {
            json!({ "accepted": true, "job_url": job_url, "job_key": job_key, "source_domain": source_domain, "external_id": external_id })
        }
    };
    Ok(ok_json(data))
}

#[derive(Debug, Deserialize)]
struct ResolveJdBody {
    job_url: Option<String>,
    email_text: Option<String>,
    email_html: Option<String>,
}

async fn resolve_jd(_auth: ApiAuth, State(state): State<Arc<AppState>>, Json(body): Json<ResolveJdBody>) -> ApiResult<Value> {
    let input = ResolveInput { job_url: body.job_url.as_deref(), email_text: body.email_text.as_deref(), email_html: body.email_html.as_deref() };
    let out = resolve(state.fetcher.as_ref(), input, &resolver_config(&state)).await;
    Ok(ok_json(json!({
        "jd_text_clean": out.jd_text_clean,
        "jd_source": out.jd_source,
        "fetch_status": out.fetch_status,
        "jd_confidence": out.jd_confidence,
        "http_status": out.debug.http_status,
        "final_url": out.debug.final_url,
    })))
}

#[derive(Debug, Deserialize)]
struct ExtractJdBody {
    jd_text: String,
}

async fn extract_jd(_auth: ApiAuth, State(state): State<Arc<AppState>>, Json(body): Json<ExtractJdBody>) -> ApiResult<Value> {
    let ai_client = state.ai_client.clone().ok_or_else(|| ApiError::CollaboratorUnavailable("no AI provider configured".into()))?;
    let user_prompt = jobops_ai::prompt::build_extraction_prompt(&body.jd_text);
    let completion = ai_client
        .complete(jobops_ai::prompt::EXTRACTION_SYSTEM_PROMPT, &user_prompt)
        .await
        .map_err(|e| ApiError::CollaboratorUnavailable(e.to_string()))?;
    let extracted = jobops_ai::parse_extraction_response(&completion.content).map_err(|e| ApiError::Validation(e.to_string()))?;
    Ok(ok_json(extracted))
}

#[derive(Debug, Deserialize)]
struct ScoreJdBody {
    jd_text: String,
    target_id: String,
}

async fn score_jd(_auth: ApiAuth, State(state): State<Arc<AppState>>, Json(body): Json<ScoreJdBody>) -> ApiResult<Value> {
    let ai_client = state.ai_client.clone().ok_or_else(|| ApiError::CollaboratorUnavailable("no AI provider configured".into()))?;
    let target = state.repo.find_target(&body.target_id).await?.ok_or_else(|| ApiError::NotFound(body.target_id.clone()))?;
    let user_prompt = jobops_ai::prompt::build_scoring_prompt(&body.jd_text, &target);
    let completion = ai_client
        .complete(jobops_ai::prompt::SCORING_SYSTEM_PROMPT, &user_prompt)
        .await
        .map_err(|e| ApiError::CollaboratorUnavailable(e.to_string()))?;
    let judgment = jobops_ai::parse_scoring_response(&completion.content).map_err(|e| ApiError::Validation(e.to_string()))?;
    Ok(ok_json(judgment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs_repo::InMemoryJobsRepo;
    use crate::lock::JobLocks;
    use crate::metrics::WorkerMetrics;
    use http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    #[test]
    fn normalize_job_body_deserializes() {
        let body: NormalizeJobBody = serde_json::from_str(r#"{"raw_url": "https://example.com/job"}"#).unwrap();
        assert_eq!(body.raw_url, "https://example.com/job");
    }

    #[test]
    fn manual_jd_body_rejects_via_handler_length_check() {
        let body: ManualJdBody = serde_json::from_str(r#"{"jd_text_clean": "too short"}"#).unwrap();
        assert!(body.jd_text_clean.trim().chars().count() < 200);
    }

    #[test]
    fn list_jobs_query_all_fields_optional() {
        let q: ListJobsQuery = serde_json::from_str("{}").unwrap();
        assert!(q.status.is_none());
        assert!(q.limit.is_none());
    }

    #[test]
    fn target_body_defaults_keyword_lists_to_empty() {
        let body: TargetBody = serde_json::from_str(r#"{"name": "Rust Backend"}"#).unwrap();
        assert!(body.must.is_empty());
        assert!(body.nice.is_empty());
        assert!(body.reject.is_empty());
    }

    // `connect_lazy` never opens a socket, so these tests construct a real
    // `AppState` without a live Postgres instance. Auth is open (ui_key/
    // api_key unset) and the DB collaborator is `InMemoryJobsRepo`, so every
    // route under `api_router` is reachable without touching `state.pool`
    // (only `health.rs`'s `/ready` route does that).
    fn test_state(repo: InMemoryJobsRepo) -> Arc<AppState> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://localhost/jobops_test").expect("lazy pool never connects eagerly");
        let config = WorkerConfig {
            worker_id: "test-worker".into(),
            database_url: "postgres://localhost/jobops_test".into(),
            bind_port: 0,
            ui_key: None,
            api_key: None,
            allow_origin: "*".into(),
            min_jd_chars: 120,
            min_target_signal: 8,
            shortlist_threshold: 75.0,
            fetch_timeout_secs: 3,
            llm_timeout_secs: 30,
            lock_timeout_secs: 10,
            per_request_budget_secs: 60,
            per_ingest_batch_budget_secs: 120,
            recovery_enabled: false,
            recover_backfill_limit: 50,
            recover_rescore_limit: 50,
            recover_retry_fetch_limit: 50,
            rss_allow_keywords: vec![],
            rss_block_keywords: vec![],
            scheduler_interval_secs: 900,
            config_cache_ttl_secs: 60,
        };
        Arc::new(AppState {
            evidence: jobops_evidence::EvidenceStore::new(pool.clone()),
            pool,
            config,
            repo: Arc::new(repo),
            fetcher: Arc::new(jobops_connectors::MockFetcher::default()),
            ai_client: None,
            locks: Arc::new(JobLocks::new(Duration::from_secs(10))),
            metrics: WorkerMetrics::new(),
        })
    }

    fn seeded_job(repo: &InMemoryJobsRepo, job_key: &str, now: chrono::DateTime<Utc>) -> jobops_core::Job {
        let job = jobops_core::Job::new_stub(job_key.into(), format!("https://x/{job_key}"), format!("https://x/{job_key}"), "x.com".into(), now);
        repo.seed_job(job.clone());
        job
    }

    #[tokio::test]
    async fn get_job_returns_404_for_unknown_key() {
        let app = api_router(test_state(InMemoryJobsRepo::new()));
        let response = app
            .oneshot(Request::builder().uri("/jobs/does-not-exist").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_job_returns_seeded_job() {
        let repo = InMemoryJobsRepo::new();
        seeded_job(&repo, "job-1", Utc::now());
        let app = api_router(test_state(repo));

        let response =
            app.oneshot(Request::builder().uri("/jobs/job-1").body(axum::body::Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["data"]["job_key"], "job-1");
    }

    #[tokio::test]
    async fn list_jobs_filters_by_status_query_param() {
        let repo = InMemoryJobsRepo::new();
        let now = Utc::now();
        let mut scored = seeded_job(&repo, "job-scored", now);
        scored.status = Some(JobStatus::Scored);
        repo.seed_job(scored);
        seeded_job(&repo, "job-new", now);

        let app = api_router(test_state(repo));

        let response =
            app.oneshot(Request::builder().uri("/jobs?status=SCORED").body(axum::body::Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        let jobs = body["data"]["jobs"].as_array().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0]["job_key"], "job-scored");
    }

    #[tokio::test]
    async fn set_job_status_applies_lifecycle_transition() {
        let repo = InMemoryJobsRepo::new();
        seeded_job(&repo, "job-1", Utc::now());
        let app = api_router(test_state(repo));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/jobs/job-1/status")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(r#"{"status": "ARCHIVED"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["data"]["status"], "ARCHIVED");
    }

    #[tokio::test]
    async fn upsert_target_round_trips_through_router() {
        let app = api_router(test_state(InMemoryJobsRepo::new()));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/targets")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(r#"{"name": "Rust Backend", "must": ["rust"]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["data"]["name"], "Rust Backend");
    }
}
