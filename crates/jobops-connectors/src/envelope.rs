//! The tagged envelope every source adapter produces, generalized from the
//! spec's duck-typed per-source payload shapes into one Rust type.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Source {
    Manual,
    Email,
    Rss,
    Chat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanonicalJob {
    pub title: Option<String>,
    pub company: Option<String>,
    pub description: Option<String>,
    pub external_id: Option<String>,
    pub job_url: String,
    pub source_domain: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateEnvelope {
    pub source: Source,
    pub raw_payload: serde_json::Value,
    pub canonical_job: CanonicalJob,
    pub ingest_timestamp: i64,

    /// Passthrough context for the JD resolver when the adapter already
    /// has email body text/html available (spec §4.3 "Email").
    pub email_subject: Option<String>,
    pub email_from: Option<String>,
    pub email_text: Option<String>,
    pub email_html: Option<String>,
}

impl CandidateEnvelope {
    pub fn new(source: Source, job_url: impl Into<String>, raw_payload: serde_json::Value, ingest_timestamp: i64) -> Self {
        Self {
            source,
            raw_payload,
            canonical_job: CanonicalJob { job_url: job_url.into(), ..Default::default() },
            ingest_timestamp,
            email_subject: None,
            email_from: None,
            email_text: None,
            email_html: None,
        }
    }
}
