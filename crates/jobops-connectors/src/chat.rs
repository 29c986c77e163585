//! Chat webhook adapter (e.g. WhatsApp): extracts a URL from the message
//! text, or falls back to a synthetic job URL keyed by message id when the
//! lead arrived as a media attachment that needs external OCR.

use std::sync::OnceLock;

use regex::Regex;

use crate::envelope::{CandidateEnvelope, Source};

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s"'<>]+"#).unwrap())
}

#[derive(Debug, Clone)]
pub struct ChatMedia {
    pub mime_type: String,
    pub caption: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatPayload {
    pub message_id: String,
    pub text: Option<String>,
    pub media: Option<ChatMedia>,
}

#[derive(Debug, Clone)]
pub struct PendingOcrMedia {
    pub message_id: String,
    pub mime_type: String,
    pub caption: Option<String>,
}

pub struct ChatIngestResult {
    pub envelopes: Vec<CandidateEnvelope>,
    pub pending_ocr: Vec<PendingOcrMedia>,
}

pub fn ingest(payload: ChatPayload, ingest_timestamp: i64) -> ChatIngestResult {
    if let Some(text) = payload.text.as_deref() {
        if let Some(m) = url_re().find(text) {
            let url = m.as_str().trim_end_matches(['.', ',', ')', ']']).to_string();
            let envelope = CandidateEnvelope::new(
                Source::Chat,
                url,
                serde_json::json!({ "message_id": payload.message_id, "text": text }),
                ingest_timestamp,
            );
            return ChatIngestResult { envelopes: vec![envelope], pending_ocr: Vec::new() };
        }
    }

    match payload.media {
        Some(media) => {
            let synthetic_url = format!("whatsapp://{}", payload.message_id);
            let envelope = CandidateEnvelope::new(
                Source::Chat,
                synthetic_url,
                serde_json::json!({
                    "message_id": payload.message_id,
                    "mime_type": media.mime_type,
                    "caption": media.caption,
                }),
                ingest_timestamp,
            );
            let pending = PendingOcrMedia { message_id: payload.message_id, mime_type: media.mime_type, caption: media.caption };
            ChatIngestResult { envelopes: vec![envelope], pending_ocr: vec![pending] }
        }
        None => ChatIngestResult { envelopes: Vec::new(), pending_ocr: Vec::new() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_url_from_message_text() {
        let payload = ChatPayload { message_id: "m1".into(), text: Some("check https://example.com/job out".into()), media: None };
        let result = ingest(payload, 0);
        assert_eq!(result.envelopes.len(), 1);
        assert_eq!(result.envelopes[0].canonical_job.job_url, "https://example.com/job");
        assert!(result.pending_ocr.is_empty());
    }

    #[test]
    fn media_without_url_emits_synthetic_job_url_and_queues_ocr() {
        let payload = ChatPayload {
            message_id: "m2".into(),
            text: None,
            media: Some(ChatMedia { mime_type: "image/jpeg".into(), caption: Some("job posting screenshot".into()) }),
        };
        let result = ingest(payload, 0);
        assert_eq!(result.envelopes.len(), 1);
        assert_eq!(result.envelopes[0].canonical_job.job_url, "whatsapp://m2");
        assert_eq!(result.pending_ocr.len(), 1);
        assert_eq!(result.pending_ocr[0].mime_type, "image/jpeg");
    }

    #[test]
    fn no_text_and_no_media_yields_nothing() {
        let payload = ChatPayload { message_id: "m3".into(), text: None, media: None };
        let result = ingest(payload, 0);
        assert!(result.envelopes.is_empty());
    }
}
