//! C6: the lifecycle state machine. `apply_transition` is the sole writer
//! of status/system_status/timestamp columns; every caller routes through
//! it so the Event audit trail stays complete.

use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::model::{Event, Job, JobStatus, SystemStatus};

#[derive(Debug, Clone)]
pub enum Transition {
    /// `(null) -> NEW | LINK_ONLY` at ingest insert time.
    IngestInsert { link_only: bool, system_status: Option<SystemStatus> },
    /// Scoring completed without reject; may additionally cross the
    /// shortlist threshold.
    ScoringCompleted { final_score: f64, shortlist_threshold: f64 },
    /// Scoring rejected the job, heuristically or via AI judgment.
    ScoringRejected { from_heuristic: bool },
    /// A fresh manual JD was submitted; clears `system_status` so scoring
    /// re-runs cleanly.
    ManualJdSubmit,
    /// An explicit, user-initiated status change.
    ExplicitStatus { status: JobStatus },
}

/// Apply `transition` to `job`, returning the Event it emits.
///
/// Scoring-driven transitions (`ScoringCompleted`, `ScoringRejected`) are
/// refused once a job has reached a terminal status, unless `force` is set
/// — matching the rule that APPLIED/REJECTED/ARCHIVED are not silently
/// overwritten by automation.
pub fn apply_transition(job: &mut Job, transition: Transition, now: DateTime<Utc>, force: bool) -> Result<Event, CoreError> {
    let is_scoring_driven = matches!(transition, Transition::ScoringCompleted { .. } | Transition::ScoringRejected { .. });
    if is_scoring_driven && !force {
        if let Some(status) = job.status {
            if status.is_terminal() {
                return Err(CoreError::TerminalStateLocked { job_key: job.job_key.clone() });
            }
        }
    }

    let event_type;
    let mut payload = serde_json::json!({});

    match transition {
        Transition::IngestInsert { link_only, system_status } => {
            job.status = Some(if link_only { JobStatus::LinkOnly } else { JobStatus::New });
            job.system_status = system_status;
            event_type = "JOB_INGESTED";
            payload = serde_json::json!({ "status": job.status });
        }
        Transition::ScoringCompleted { final_score, shortlist_threshold } => {
            job.status = Some(JobStatus::Scored);
            job.last_scored_at = Some(now);
            if final_score >= shortlist_threshold {
                job.status = Some(JobStatus::Shortlisted);
            }
            event_type = "JOB_SCORED";
            payload = serde_json::json!({ "final_score": final_score, "status": job.status });
        }
        Transition::ScoringRejected { from_heuristic } => {
            job.status = Some(JobStatus::Rejected);
            job.rejected_at = Some(now);
            if from_heuristic {
                job.system_status = Some(SystemStatus::RejectedHeuristic);
            }
            event_type = "JOB_REJECTED";
            payload = serde_json::json!({ "from_heuristic": from_heuristic });
        }
        Transition::ManualJdSubmit => {
            job.system_status = None;
            event_type = "MANUAL_JD_SUBMITTED";
        }
        Transition::ExplicitStatus { status } => {
            job.status = Some(status);
            match status {
                JobStatus::Applied => job.applied_at = Some(now),
                JobStatus::Rejected => job.rejected_at = Some(now),
                JobStatus::Archived => job.archived_at = Some(now),
                _ => {}
            }
            // system_status is orthogonal and intentionally preserved here.
            event_type = "JOB_STATUS_CHANGED";
            payload = serde_json::json!({ "status": status });
        }
    }

    job.updated_at = now;
    Ok(Event::new(event_type, Some(job.job_key.clone()), payload, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JdSource;

    fn job(now: DateTime<Utc>) -> Job {
        Job::new_stub("k1".into(), "https://x/1".into(), "https://x/1".into(), "x".into(), now)
    }

    #[test]
    fn ingest_insert_sets_new_or_link_only() {
        let now = Utc::now();
        let mut j = job(now);
        apply_transition(&mut j, Transition::IngestInsert { link_only: false, system_status: None }, now, false).unwrap();
        assert_eq!(j.status, Some(JobStatus::New));

        let mut j2 = job(now);
        apply_transition(
            &mut j2,
            Transition::IngestInsert { link_only: true, system_status: Some(SystemStatus::NeedsManualJd) },
            now,
            false,
        )
        .unwrap();
        assert_eq!(j2.status, Some(JobStatus::LinkOnly));
        assert_eq!(j2.system_status, Some(SystemStatus::NeedsManualJd));
    }

    #[test]
    fn scoring_completed_crosses_shortlist_threshold() {
        let now = Utc::now();
        let mut j = job(now);
        j.status = Some(JobStatus::New);
        apply_transition(&mut j, Transition::ScoringCompleted { final_score: 82.0, shortlist_threshold: 75.0 }, now, false).unwrap();
        assert_eq!(j.status, Some(JobStatus::Shortlisted));
        assert_eq!(j.last_scored_at, Some(now));
    }

    #[test]
    fn scoring_completed_below_threshold_stays_scored() {
        let now = Utc::now();
        let mut j = job(now);
        j.status = Some(JobStatus::New);
        apply_transition(&mut j, Transition::ScoringCompleted { final_score: 40.0, shortlist_threshold: 75.0 }, now, false).unwrap();
        assert_eq!(j.status, Some(JobStatus::Scored));
    }

    #[test]
    fn scoring_cannot_override_terminal_status_without_force() {
        let now = Utc::now();
        let mut j = job(now);
        j.status = Some(JobStatus::Applied);
        let err = apply_transition(&mut j, Transition::ScoringCompleted { final_score: 90.0, shortlist_threshold: 75.0 }, now, false);
        assert!(err.is_err());
        assert_eq!(j.status, Some(JobStatus::Applied));
    }

    #[test]
    fn forced_scoring_can_override_terminal_status() {
        let now = Utc::now();
        let mut j = job(now);
        j.status = Some(JobStatus::Rejected);
        apply_transition(&mut j, Transition::ScoringCompleted { final_score: 90.0, shortlist_threshold: 75.0 }, now, true).unwrap();
        assert_eq!(j.status, Some(JobStatus::Shortlisted));
    }

    #[test]
    fn explicit_status_preserves_system_status() {
        let now = Utc::now();
        let mut j = job(now);
        j.system_status = Some(SystemStatus::AiUnavailable);
        apply_transition(&mut j, Transition::ExplicitStatus { status: JobStatus::Applied }, now, false).unwrap();
        assert_eq!(j.status, Some(JobStatus::Applied));
        assert_eq!(j.system_status, Some(SystemStatus::AiUnavailable));
        assert_eq!(j.applied_at, Some(now));
    }

    #[test]
    fn manual_jd_submit_clears_system_status() {
        let now = Utc::now();
        let mut j = job(now);
        j.system_status = Some(SystemStatus::NeedsManualJd);
        j.jd_source = JdSource::None;
        apply_transition(&mut j, Transition::ManualJdSubmit, now, false).unwrap();
        assert_eq!(j.system_status, None);
    }

    #[test]
    fn updated_at_is_monotonic_with_created_at() {
        let created = Utc::now();
        let mut j = job(created);
        let later = created + chrono::Duration::seconds(5);
        apply_transition(&mut j, Transition::ExplicitStatus { status: JobStatus::Shortlisted }, later, false).unwrap();
        assert!(j.updated_at >= j.created_at);
    }
}
