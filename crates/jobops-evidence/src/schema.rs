//! Row types for the evidence/contact store (C7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum RequirementType {
    Must,
    Nice,
    Reject,
}

/// Per-requirement evidence row, unique on `(job_key, requirement_text, requirement_type)`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobEvidence {
    pub id: Uuid,
    pub job_key: String,
    pub requirement_text: String,
    pub requirement_type: RequirementType,
    pub evidence_text: Option<String>,
    pub evidence_source: Option<String>,
    pub confidence_score: f64,
    pub matched: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum Channel {
    Linkedin,
    Email,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum TouchpointStatus {
    Draft,
    Sent,
    Replied,
}

impl TouchpointStatus {
    /// Ordinal used to reject backward transitions (SENT -> DRAFT etc.).
    fn rank(self) -> u8 {
        match self {
            TouchpointStatus::Draft => 0,
            TouchpointStatus::Sent => 1,
            TouchpointStatus::Replied => 2,
        }
    }

    pub fn can_advance_to(self, next: TouchpointStatus) -> bool {
        next.rank() >= self.rank()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub linkedin_url: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub company: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContactTouchpoint {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub job_key: String,
    pub channel: Channel,
    pub status: TouchpointStatus,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventRow {
    pub id: Uuid,
    pub event_type: String,
    pub job_key: Option<String>,
    pub payload: serde_json::Value,
    pub ts: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touchpoint_status_allows_forward_transitions() {
        assert!(TouchpointStatus::Draft.can_advance_to(TouchpointStatus::Sent));
        assert!(TouchpointStatus::Sent.can_advance_to(TouchpointStatus::Replied));
        assert!(TouchpointStatus::Draft.can_advance_to(TouchpointStatus::Draft));
    }

    #[test]
    fn touchpoint_status_rejects_backward_transitions() {
        assert!(!TouchpointStatus::Sent.can_advance_to(TouchpointStatus::Draft));
        assert!(!TouchpointStatus::Replied.can_advance_to(TouchpointStatus::Sent));
    }
}
