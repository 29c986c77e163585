//! Worker configuration from environment variables, plus a small TTL cache
//! for values components may want refreshed without a process restart.

use anyhow::{Context, Result};
use std::sync::RwLock;
use std::time::{Duration, Instant};

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    env_or(name, default).parse::<T>().map_err(|e| anyhow::anyhow!("invalid {name}: {e}"))
}

fn env_list(name: &str) -> Vec<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub database_url: String,
    pub bind_port: u16,

    pub ui_key: Option<String>,
    pub api_key: Option<String>,
    pub allow_origin: String,

    pub min_jd_chars: usize,
    pub min_target_signal: usize,
    pub shortlist_threshold: f64,

    pub fetch_timeout_secs: u64,
    pub llm_timeout_secs: u64,
    pub lock_timeout_secs: u64,
    pub per_request_budget_secs: u64,
    pub per_ingest_batch_budget_secs: u64,

    pub recovery_enabled: bool,
    pub recover_backfill_limit: usize,
    pub recover_rescore_limit: usize,
    pub recover_retry_fetch_limit: usize,

    pub rss_allow_keywords: Vec<String>,
    pub rss_block_keywords: Vec<String>,

    pub scheduler_interval_secs: u64,

    pub config_cache_ttl_secs: u64,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            worker_id: env_or("WORKER_ID", &uuid::Uuid::new_v4().to_string()),
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL required")?,
            bind_port: env_parse("BIND_PORT", "8080").context("invalid BIND_PORT")?,

            ui_key: std::env::var("UI_KEY").ok(),
            api_key: std::env::var("API_KEY").ok(),
            allow_origin: env_or("ALLOW_ORIGIN", "*"),

            min_jd_chars: env_parse("MIN_JD_CHARS", "120").context("invalid MIN_JD_CHARS")?,
            min_target_signal: env_parse("MIN_TARGET_SIGNAL", "8").context("invalid MIN_TARGET_SIGNAL")?,
            shortlist_threshold: env_parse("SHORTLIST_THRESHOLD", "75").context("invalid SHORTLIST_THRESHOLD")?,

            fetch_timeout_secs: env_parse("FETCH_TIMEOUT_SECS", "3").context("invalid FETCH_TIMEOUT_SECS")?,
            llm_timeout_secs: env_parse("LLM_TIMEOUT_SECS", "30").context("invalid LLM_TIMEOUT_SECS")?,
            lock_timeout_secs: env_parse("LOCK_TIMEOUT_SECS", "10").context("invalid LOCK_TIMEOUT_SECS")?,
            per_request_budget_secs: env_parse("PER_REQUEST_BUDGET_SECS", "60").context("invalid PER_REQUEST_BUDGET_SECS")?,
            per_ingest_batch_budget_secs: env_parse("PER_INGEST_BATCH_BUDGET_SECS", "120")
                .context("invalid PER_INGEST_BATCH_BUDGET_SECS")?,

            recovery_enabled: env_parse("RECOVERY_ENABLED", "true").context("invalid RECOVERY_ENABLED")?,
            recover_backfill_limit: env_parse("RECOVER_BACKFILL_LIMIT", "50").context("invalid RECOVER_BACKFILL_LIMIT")?,
            recover_rescore_limit: env_parse("RECOVER_RESCORE_LIMIT", "50").context("invalid RECOVER_RESCORE_LIMIT")?,
            recover_retry_fetch_limit: env_parse("RECOVER_RETRY_FETCH_LIMIT", "50")
                .context("invalid RECOVER_RETRY_FETCH_LIMIT")?,

            rss_allow_keywords: env_list("RSS_ALLOW_KEYWORDS"),
            rss_block_keywords: env_list("RSS_BLOCK_KEYWORDS"),

            scheduler_interval_secs: env_parse("SCHEDULER_INTERVAL_SECS", "900").context("invalid SCHEDULER_INTERVAL_SECS")?,

            config_cache_ttl_secs: env_parse("CONFIG_CACHE_TTL_SECS", "60").context("invalid CONFIG_CACHE_TTL_SECS")?,
        })
    }
}

/// Process-wide cache for configuration values that may be refreshed
/// without a restart (spec §5: "a small process-global configuration
/// cache with a TTL, default 60s"). Holds the full `WorkerConfig` snapshot;
/// components ask for the current snapshot rather than reading env vars
/// ad hoc.
pub struct ConfigCache {
    ttl: Duration,
    inner: RwLock<(WorkerConfig, Instant)>,
}

impl ConfigCache {
    pub fn new(initial: WorkerConfig) -> Self {
        let ttl = Duration::from_secs(initial.config_cache_ttl_secs);
        Self { ttl, inner: RwLock::new((initial, Instant::now())) }
    }

    /// Returns a fresh snapshot, reloading from the environment if the TTL
    /// has elapsed since the last load.
    pub fn get(&self) -> Result<WorkerConfig> {
        {
            let guard = self.inner.read().unwrap();
            if guard.1.elapsed() < self.ttl {
                return Ok(guard.0.clone());
            }
        }
        let fresh = WorkerConfig::from_env()?;
        let mut guard = self.inner.write().unwrap();
        *guard = (fresh.clone(), Instant::now());
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> WorkerConfig {
        std::env::set_var("DATABASE_URL", "postgres://localhost/jobops_test");
        WorkerConfig::from_env().unwrap()
    }

    #[test]
    fn from_env_applies_documented_defaults() {
        let cfg = base_config();
        assert_eq!(cfg.min_jd_chars, 120);
        assert_eq!(cfg.min_target_signal, 8);
        assert_eq!(cfg.shortlist_threshold, 75.0);
        assert!(cfg.recovery_enabled);
    }

    #[test]
    fn config_cache_serves_cached_value_within_ttl() {
        let cfg = base_config();
        let cache = ConfigCache::new(cfg);
        let a = cache.get().unwrap();
        let b = cache.get().unwrap();
        assert_eq!(a.worker_id, b.worker_id);
    }
}
