//! Domain types shared by the canonicalizer, JD resolver, and lifecycle machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    New,
    Scored,
    Shortlisted,
    Applied,
    Rejected,
    Archived,
    LinkOnly,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Applied | JobStatus::Rejected | JobStatus::Archived)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemStatus {
    NeedsManualJd,
    AiUnavailable,
    RejectedHeuristic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JdSource {
    Fetched,
    Email,
    Manual,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Ok,
    Blocked,
    Failed,
    AiUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JdConfidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringSource {
    ScorePending,
    Rescore,
    ManualJd,
    Ingest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoringFinalStatus {
    Completed,
    RejectedHeuristic,
    Failed,
}

/// The central entity: at most one authoritative row per canonical URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_key: String,
    pub job_url: String,
    pub job_url_raw: String,
    pub source_domain: String,
    pub external_id: Option<String>,

    pub role_title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub work_mode: Option<String>,
    pub seniority: Option<String>,
    pub experience_years_min: Option<i32>,
    pub experience_years_max: Option<i32>,

    pub must_have: Vec<String>,
    pub nice_to_have: Vec<String>,
    pub reject_keywords: Vec<String>,

    pub jd_text_clean: Option<String>,
    pub jd_source: JdSource,
    pub fetch_status: Option<FetchStatus>,
    pub jd_confidence: Option<JdConfidence>,

    pub primary_target_id: Option<String>,
    pub score_must: Option<f64>,
    pub score_nice: Option<f64>,
    pub final_score: Option<f64>,
    pub reject_triggered: bool,
    pub reject_reasons: Vec<String>,
    pub reason_top_matches: Option<String>,

    pub status: Option<JobStatus>,
    pub system_status: Option<SystemStatus>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_scored_at: Option<DateTime<Utc>>,
    pub applied_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Job {
    /// A brand-new row as it looks the instant after an ingest insert, before
    /// lifecycle and JD resolution fill it in.
    pub fn new_stub(job_key: String, job_url: String, job_url_raw: String, source_domain: String, now: DateTime<Utc>) -> Self {
        Self {
            job_key,
            job_url,
            job_url_raw,
            source_domain,
            external_id: None,
            role_title: None,
            company: None,
            location: None,
            work_mode: None,
            seniority: None,
            experience_years_min: None,
            experience_years_max: None,
            must_have: Vec::new(),
            nice_to_have: Vec::new(),
            reject_keywords: Vec::new(),
            jd_text_clean: None,
            jd_source: JdSource::None,
            fetch_status: None,
            jd_confidence: None,
            primary_target_id: None,
            score_must: None,
            score_nice: None,
            final_score: None,
            reject_triggered: false,
            reject_reasons: Vec::new(),
            reason_top_matches: None,
            status: None,
            system_status: None,
            created_at: now,
            updated_at: now,
            last_scored_at: None,
            applied_at: None,
            rejected_at: None,
            archived_at: None,
        }
    }

    pub fn has_usable_jd(&self) -> bool {
        self.jd_text_clean.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

/// A user-configured scoring rubric, mutated only by explicit admin operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub name: String,
    pub primary_role: Option<String>,
    pub preferred_seniority: Vec<String>,
    pub preferred_locations: Vec<String>,
    pub must: Vec<String>,
    pub nice: Vec<String>,
    pub reject: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-stage telemetry recorded inside a `ScoringRun`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Ok,
    Rejected,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageMetric {
    pub status: StageStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub latency_ms: i64,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub tokens_total: u32,
    pub error: Option<String>,
}

impl StageMetric {
    pub fn skipped(started_at: DateTime<Utc>) -> Self {
        Self {
            status: StageStatus::Skipped,
            started_at,
            finished_at: started_at,
            latency_ms: 0,
            tokens_in: 0,
            tokens_out: 0,
            tokens_total: 0,
            error: None,
        }
    }
}

/// Append-only telemetry row for one scoring attempt. Never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRun {
    pub id: uuid::Uuid,
    pub job_key: String,
    pub source: ScoringSource,
    pub final_status: ScoringFinalStatus,
    pub heuristic_reasons: Vec<String>,
    pub heuristic_gate: StageMetric,
    pub ai_extract: StageMetric,
    pub ai_reason: StageMetric,
    pub evidence_upsert: StageMetric,
    pub ai_model: Option<String>,
    pub total_latency_ms: i64,
    pub final_score: Option<f64>,
    pub reject_triggered: bool,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: uuid::Uuid,
    pub event_type: String,
    pub job_key: Option<String>,
    pub payload: serde_json::Value,
    pub ts: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, job_key: Option<String>, payload: serde_json::Value, ts: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            event_type: event_type.into(),
            job_key,
            payload,
            ts,
        }
    }
}
