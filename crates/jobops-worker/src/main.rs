//! jobops-worker binary — the JobOps ingest/scoring service.

mod auth;
mod config;
mod error;
mod events;
mod health;
mod http_api;
mod ingest;
mod jobs_repo;
mod lock;
mod metrics;
mod recovery;
mod scheduler;
mod scoring;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::WorkerConfig;
use jobops_ai::{HttpLlmClient, LlmClient};
use jobops_connectors::ReqwestFetcher;
use jobops_evidence::EvidenceStore;
use jobs_repo::{JobsRepo, PgJobsRepo};
use lock::JobLocks;
use metrics::WorkerMetrics;
use recovery::RecoveryDeps;
use scheduler::Scheduler;

pub struct AppState {
    pub pool: PgPool,
    pub config: WorkerConfig,
    pub repo: Arc<dyn JobsRepo>,
    pub evidence: EvidenceStore,
    pub fetcher: Arc<dyn jobops_core::Fetcher>,
    pub ai_client: Option<Arc<dyn LlmClient>>,
    pub locks: Arc<JobLocks>,
    pub metrics: WorkerMetrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = WorkerConfig::from_env()?;
    info!("Starting jobops-worker {}", config.worker_id);

    let pool = PgPoolOptions::new().max_connections(5).connect(&config.database_url).await?;
    info!("Connected to database");

    let pg_repo = PgJobsRepo::new(pool.clone());
    pg_repo.ensure_schema().await?;
    let repo: Arc<dyn JobsRepo> = Arc::new(pg_repo);
    let evidence = EvidenceStore::new(pool.clone());
    evidence.ensure_schema().await?;
    info!("Schema ensured");

    let fetcher: Arc<dyn jobops_core::Fetcher> = Arc::new(ReqwestFetcher::new());

    let ai_client: Option<Arc<dyn LlmClient>> = match HttpLlmClient::from_env() {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!(error = %e, "no AI provider configured, scoring stage will be skipped");
            None
        }
    };

    let locks = Arc::new(JobLocks::new(Duration::from_secs(config.lock_timeout_secs)));
    let worker_metrics = WorkerMetrics::new();

    let recovery_deps = Arc::new(RecoveryDeps {
        repo: repo.clone(),
        evidence: evidence.clone(),
        fetcher: fetcher.clone(),
        ai_client: ai_client.clone(),
        config: config.clone(),
    });

    let scheduler =
        Arc::new(Scheduler::new(repo.clone(), evidence.clone(), recovery_deps, Duration::from_secs(config.scheduler_interval_secs)));
    if config.recovery_enabled {
        tokio::spawn(scheduler.run());
        info!("Recovery scheduler started (interval: {}s)", config.scheduler_interval_secs);
    } else {
        info!("Recovery scheduler disabled by config");
    }

    let bind_port = config.bind_port;
    let state = Arc::new(AppState { pool, config, repo, evidence, fetcher, ai_client, locks, metrics: worker_metrics });

    let app = health::health_router(state.clone()).merge(http_api::api_router(state));

    let addr = format!("0.0.0.0:{bind_port}");
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
