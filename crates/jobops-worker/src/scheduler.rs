//! C9 Scheduler: periodic triggers for recovery sweeps, admission-controlled
//! so an overrun trigger can't stack a second run on top of itself. Mirrors
//! the teacher's `reaper::spawn_reaper` interval-tick pattern.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use jobops_evidence::EvidenceStore;

use crate::jobs_repo::JobsRepo;
use crate::recovery::{self, HostCooldown, RecoveryDeps};

struct Trigger {
    name: &'static str,
    running: AtomicBool,
}

impl Trigger {
    fn new(name: &'static str) -> Self {
        Self { name, running: AtomicBool::new(false) }
    }

    /// Returns a guard that flips `running` back to false on drop if the
    /// admission succeeded, or `None` if a prior tick is still in flight.
    fn admit(&self) -> Option<TriggerGuard<'_>> {
        if self.running.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok() {
            Some(TriggerGuard { running: &self.running })
        } else {
            None
        }
    }
}

struct TriggerGuard<'a> {
    running: &'a AtomicBool,
}

impl Drop for TriggerGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

pub struct Scheduler {
    repo: Arc<dyn JobsRepo>,
    evidence: EvidenceStore,
    recovery_deps: Arc<RecoveryDeps>,
    cooldown: HostCooldown,
    interval: Duration,
    backfill: Trigger,
    rescore: Trigger,
    retry_fetch: Trigger,
}

impl Scheduler {
    pub fn new(repo: Arc<dyn JobsRepo>, evidence: EvidenceStore, recovery_deps: Arc<RecoveryDeps>, interval: Duration) -> Self {
        Self {
            repo,
            evidence,
            recovery_deps,
            cooldown: HostCooldown::new(),
            interval,
            backfill: Trigger::new("recovery_backfill"),
            rescore: Trigger::new("recovery_rescore"),
            retry_fetch: Trigger::new("recovery_retry_fetch"),
        }
    }

    /// Runs forever on a fixed interval. Intended to be `tokio::spawn`ed
    /// once from `main`.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    async fn tick(&self) {
        self.run_trigger(&self.backfill, recover_backfill(self)).await;
        self.run_trigger(&self.rescore, recover_rescore(self)).await;
        self.run_trigger(&self.retry_fetch, recover_retry_fetch(self)).await;
    }

    async fn run_trigger<F>(&self, trigger: &Trigger, fut: F)
    where
        F: std::future::Future<Output = ()>,
    {
        let Some(_guard) = trigger.admit() else {
            warn!(trigger = trigger.name, "skipping tick, previous run still in flight");
            let payload = serde_json::json!({ "trigger": trigger.name });
            if let Err(e) = self.evidence.insert_event("CRON_SKIPPED_OVERLAP", None, payload).await {
                warn!(error = %e, "failed to record CRON_SKIPPED_OVERLAP event");
            }
            return;
        };
        fut.await;
    }
}

async fn recover_backfill(scheduler: &Scheduler) {
    let stale_before = Utc::now() - chrono::Duration::hours(1);
    let limit = scheduler.recovery_deps.config.recover_backfill_limit;
    let summaries = recovery::backfill_missing(&scheduler.recovery_deps, stale_before, limit, false).await;
    info!(count = summaries.len(), "recovery backfill tick complete");
}

async fn recover_rescore(scheduler: &Scheduler) {
    let limit = scheduler.recovery_deps.config.recover_rescore_limit;
    let target_updated_after = match scheduler.repo.latest_target_update().await {
        Ok(Some(t)) => t,
        _ => return,
    };
    let summaries = recovery::rescore_existing(&scheduler.recovery_deps, target_updated_after, limit, false).await;
    info!(count = summaries.len(), "recovery rescore tick complete");
}

async fn recover_retry_fetch(scheduler: &Scheduler) {
    let limit = scheduler.recovery_deps.config.recover_retry_fetch_limit;
    let summaries = recovery::retry_fetch_missing(&scheduler.recovery_deps, &scheduler.cooldown, limit).await;
    info!(count = summaries.len(), "recovery retry-fetch tick complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_refuses_second_admission_while_first_is_held() {
        let trigger = Trigger::new("t");
        let guard = trigger.admit();
        assert!(guard.is_some());
        assert!(trigger.admit().is_none());
        drop(guard);
        assert!(trigger.admit().is_some());
    }
}
