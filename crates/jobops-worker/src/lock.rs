//! Per-`job_key` advisory lock (spec §5): at most one Ingest Orchestrator
//! or Scoring Pipeline invocation is in flight per key at a time. Grounded
//! in the teacher's `tokio::sync::Mutex`-guarded stream handle in its queue
//! client, generalized to a keyed map via `dashmap`.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub struct JobLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
    timeout: Duration,
}

/// Held for the span of one canonicalize -> upsert -> score operation.
/// Dropping it releases the per-key lock.
pub struct JobLockGuard {
    _guard: OwnedMutexGuard<()>,
}

impl JobLocks {
    pub fn new(timeout: Duration) -> Self {
        Self { locks: DashMap::new(), timeout }
    }

    /// Acquire the lock for `job_key`, waiting up to the configured timeout.
    /// Returns `None` if the timeout elapses first — callers map that to
    /// `action=ignored, error=job_key_busy`.
    pub async fn acquire(&self, job_key: &str) -> Option<JobLockGuard> {
        let mutex = self.locks.entry(job_key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
        match tokio::time::timeout(self.timeout, mutex.lock_owned()).await {
            Ok(guard) => Some(JobLockGuard { _guard: guard }),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquires_uncontended_lock() {
        let locks = JobLocks::new(Duration::from_millis(200));
        let guard = locks.acquire("job-1").await;
        assert!(guard.is_some());
    }

    #[tokio::test]
    async fn second_acquire_waits_for_release_then_succeeds() {
        let locks = Arc::new(JobLocks::new(Duration::from_millis(500)));
        let guard = locks.acquire("job-2").await.unwrap();

        let locks2 = locks.clone();
        let handle = tokio::spawn(async move { locks2.acquire("job-2").await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);

        let second = handle.await.unwrap();
        assert!(second.is_some());
    }

    #[tokio::test]
    async fn acquire_times_out_when_held_too_long() {
        let locks = Arc::new(JobLocks::new(Duration::from_millis(30)));
        let _held = locks.acquire("job-3").await.unwrap();

        let result = locks.acquire("job-3").await;
        assert!(result.is_none());
    }
}
