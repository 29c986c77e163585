//! Evidence/contact/event store, backed by Postgres via `sqlx`. Schema
//! creation is additive-only and idempotent (`CREATE TABLE IF NOT EXISTS`
//! / `ADD COLUMN IF NOT EXISTS`), composed per table the way the reference
//! migration runner this is grounded on composes per-table `apply` steps.

use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::schema::{Channel, Contact, ContactTouchpoint, EventRow, JobEvidence, RequirementType, TouchpointStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("touchpoint status cannot move backward from {from:?} to {to:?}")]
    InvalidTouchpointTransition { from: TouchpointStatus, to: TouchpointStatus },
}

#[derive(Clone)]
pub struct EvidenceStore {
    pool: PgPool,
}

impl EvidenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_evidence (
                id UUID PRIMARY KEY,
                job_key TEXT NOT NULL,
                requirement_text TEXT NOT NULL,
                requirement_type TEXT NOT NULL,
                evidence_text TEXT,
                evidence_source TEXT,
                confidence_score DOUBLE PRECISION NOT NULL DEFAULT 0,
                matched BOOLEAN NOT NULL DEFAULT FALSE,
                notes TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                UNIQUE (job_key, requirement_text, requirement_type)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS contacts (
                id UUID PRIMARY KEY,
                linkedin_url TEXT UNIQUE,
                email TEXT UNIQUE,
                name TEXT,
                company TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS contact_touchpoints (
                id UUID PRIMARY KEY,
                contact_id UUID NOT NULL REFERENCES contacts(id),
                job_key TEXT NOT NULL,
                channel TEXT NOT NULL,
                status TEXT NOT NULL,
                content TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                UNIQUE (contact_id, job_key, channel)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id UUID PRIMARY KEY,
                event_type TEXT NOT NULL,
                job_key TEXT,
                payload JSONB NOT NULL,
                ts TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("evidence store schema ensured");
        Ok(())
    }

    pub async fn upsert_evidence(
        &self,
        job_key: &str,
        requirement_text: &str,
        requirement_type: RequirementType,
        evidence_text: Option<&str>,
        evidence_source: Option<&str>,
        confidence_score: f64,
        matched: bool,
    ) -> Result<JobEvidence, StoreError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, JobEvidence>(
            r#"
            INSERT INTO job_evidence (id, job_key, requirement_text, requirement_type, evidence_text, evidence_source, confidence_score, matched, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NULL, $9, $9)
            ON CONFLICT (job_key, requirement_text, requirement_type)
            DO UPDATE SET
                evidence_text = EXCLUDED.evidence_text,
                evidence_source = EXCLUDED.evidence_source,
                confidence_score = EXCLUDED.confidence_score,
                matched = EXCLUDED.matched,
                updated_at = EXCLUDED.updated_at
            RETURNING id, job_key, requirement_text, requirement_type, evidence_text, evidence_source, confidence_score, matched, notes, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(job_key)
        .bind(requirement_text)
        .bind(requirement_type)
        .bind(evidence_text)
        .bind(evidence_source)
        .bind(confidence_score)
        .bind(matched)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_evidence_for_job(&self, job_key: &str) -> Result<Vec<JobEvidence>, StoreError> {
        let rows = sqlx::query_as::<_, JobEvidence>(
            "SELECT id, job_key, requirement_text, requirement_type, evidence_text, evidence_source, confidence_score, matched, notes, created_at, updated_at \
             FROM job_evidence WHERE job_key = $1 ORDER BY requirement_type, requirement_text",
        )
        .bind(job_key)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Identity resolves in order: `linkedin_url -> email -> lower(name)+lower(company)`.
    /// On match, non-null incoming fields overwrite (COALESCE against the new value first).
    pub async fn upsert_contact(
        &self,
        linkedin_url: Option<&str>,
        email: Option<&str>,
        name: Option<&str>,
        company: Option<&str>,
    ) -> Result<Contact, StoreError> {
        let now = Utc::now();
        let existing = self.find_contact(linkedin_url, email, name, company).await?;

        if let Some(existing) = existing {
            let row = sqlx::query_as::<_, Contact>(
                r#"
                UPDATE contacts SET
                    linkedin_url = COALESCE($2, linkedin_url),
                    email = COALESCE($3, email),
                    name = COALESCE($4, name),
                    company = COALESCE($5, company),
                    updated_at = $6
                WHERE id = $1
                RETURNING id, linkedin_url, email, name, company, created_at, updated_at
                "#,
            )
            .bind(existing.id)
            .bind(linkedin_url)
            .bind(email)
            .bind(name)
            .bind(company)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
            return Ok(row);
        }

        let row = sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (id, linkedin_url, email, name, company, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING id, linkedin_url, email, name, company, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(linkedin_url)
        .bind(email)
        .bind(name)
        .bind(company)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_contact(
        &self,
        linkedin_url: Option<&str>,
        email: Option<&str>,
        name: Option<&str>,
        company: Option<&str>,
    ) -> Result<Option<Contact>, StoreError> {
        if let Some(linkedin_url) = linkedin_url {
            if let Some(row) = sqlx::query_as::<_, Contact>(
                "SELECT id, linkedin_url, email, name, company, created_at, updated_at FROM contacts WHERE lower(linkedin_url) = lower($1)",
            )
            .bind(linkedin_url)
            .fetch_optional(&self.pool)
            .await?
            {
                return Ok(Some(row));
            }
        }
        if let Some(email) = email {
            if let Some(row) = sqlx::query_as::<_, Contact>(
                "SELECT id, linkedin_url, email, name, company, created_at, updated_at FROM contacts WHERE lower(email) = lower($1)",
            )
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            {
                return Ok(Some(row));
            }
        }
        if let (Some(name), Some(company)) = (name, company) {
            if let Some(row) = sqlx::query_as::<_, Contact>(
                "SELECT id, linkedin_url, email, name, company, created_at, updated_at FROM contacts WHERE lower(name) = lower($1) AND lower(company) = lower($2)",
            )
            .bind(name)
            .bind(company)
            .fetch_optional(&self.pool)
            .await?
            {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    /// Upsert on `(contact_id, job_key, channel)`. Status transitions must
    /// be forward-only (DRAFT -> SENT -> REPLIED); a backward transition
    /// is rejected rather than silently ignored.
    pub async fn upsert_touchpoint(
        &self,
        contact_id: Uuid,
        job_key: &str,
        channel: Channel,
        status: TouchpointStatus,
        content: Option<&str>,
    ) -> Result<ContactTouchpoint, StoreError> {
        let now = Utc::now();
        let existing = sqlx::query_as::<_, ContactTouchpoint>(
            "SELECT id, contact_id, job_key, channel, status, content, created_at, updated_at \
             FROM contact_touchpoints WHERE contact_id = $1 AND job_key = $2 AND channel = $3",
        )
        .bind(contact_id)
        .bind(job_key)
        .bind(channel)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(existing) = existing {
            if !existing.status.can_advance_to(status) {
                return Err(StoreError::InvalidTouchpointTransition { from: existing.status, to: status });
            }
            let row = sqlx::query_as::<_, ContactTouchpoint>(
                r#"
                UPDATE contact_touchpoints SET status = $2, content = COALESCE($3, content), updated_at = $4
                WHERE id = $1
                RETURNING id, contact_id, job_key, channel, status, content, created_at, updated_at
                "#,
            )
            .bind(existing.id)
            .bind(status)
            .bind(content)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
            return Ok(row);
        }

        let row = sqlx::query_as::<_, ContactTouchpoint>(
            r#"
            INSERT INTO contact_touchpoints (id, contact_id, job_key, channel, status, content, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING id, contact_id, job_key, channel, status, content, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(contact_id)
        .bind(job_key)
        .bind(channel)
        .bind(status)
        .bind(content)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn insert_event(&self, event_type: &str, job_key: Option<&str>, payload: serde_json::Value) -> Result<EventRow, StoreError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            INSERT INTO events (id, event_type, job_key, payload, ts)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, event_type, job_key, payload, ts
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event_type)
        .bind(job_key)
        .bind(payload)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touchpoint_transition_error_is_descriptive() {
        let err = StoreError::InvalidTouchpointTransition { from: TouchpointStatus::Sent, to: TouchpointStatus::Draft };
        assert!(err.to_string().contains("Sent"));
    }
}
