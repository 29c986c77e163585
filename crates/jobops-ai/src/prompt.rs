//! Prompt templates for the extract and reason stages of C5.

use jobops_core::model::Target;

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are an expert technical recruiter. Given a cleaned job description, extract structured fields as strict JSON with exactly these keys:
{
  "role_title": string|null,
  "company": string|null,
  "location": string|null,
  "seniority": string|null,
  "work_mode": string|null,
  "experience_years_min": number|null,
  "experience_years_max": number|null,
  "must_have_keywords": string[],
  "nice_to_have_keywords": string[],
  "reject_keywords": string[]
}
Output ONLY the JSON object, no explanation, no markdown fences."#;

pub const SCORING_SYSTEM_PROMPT: &str = r#"You are scoring a job description against a candidate's target rubrics. Given the JD and a list of targets (each with must/nice/reject keyword bags), pick the single best-fit target and output strict JSON with exactly these keys:
{
  "primary_target_id": string,
  "score_must": number,
  "score_nice": number,
  "final_score": number,
  "reject_triggered": 0 | 1,
  "reason_top_matches": string,
  "potential_contacts": [{"name": string|null, "role": string|null, "linkedin_url": string|null, "email": string|null}]
}
score_must and score_nice are 0-100. final_score must be consistent with final_score = clip(0.7*score_must + 0.3*score_nice - reject_penalty, 0, 100).
Output ONLY the JSON object, no explanation, no markdown fences."#;

pub fn build_extraction_prompt(jd_text: &str) -> String {
    format!("## Job Description\n{jd_text}\n\nExtract the structured fields now.")
}

pub fn build_scoring_prompt(jd_text: &str, target: &Target) -> String {
    format!(
        r#"## Job Description
{jd_text}

## Target: {name} (id={id})
Primary role: {role}
Preferred seniority: {seniority}
Preferred locations: {locations}
Must-have keywords: {must}
Nice-to-have keywords: {nice}
Reject keywords: {reject}

Score this job against this single target."#,
        name = target.name,
        id = target.id,
        role = target.primary_role.as_deref().unwrap_or("(any)"),
        seniority = target.preferred_seniority.join(", "),
        locations = target.preferred_locations.join(", "),
        must = target.must.join(", "),
        nice = target.nice.join(", "),
        reject = target.reject.join(", "),
    )
}

/// Strip markdown code fences some providers wrap JSON in despite being
/// asked not to.
pub fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.trim_end_matches("```").trim()
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.trim_end_matches("```").trim()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn build_scoring_prompt_includes_keyword_bags() {
        let now = Utc::now();
        let target = Target {
            id: "t1".into(),
            name: "Rust backend".into(),
            primary_role: Some("Backend Engineer".into()),
            preferred_seniority: vec!["senior".into()],
            preferred_locations: vec!["remote".into()],
            must: vec!["rust".into()],
            nice: vec!["kubernetes".into()],
            reject: vec!["php".into()],
            created_at: now,
            updated_at: now,
        };
        let prompt = build_scoring_prompt("We use Rust extensively.", &target);
        assert!(prompt.contains("rust"));
        assert!(prompt.contains("kubernetes"));
        assert!(prompt.contains("t1"));
    }

    #[test]
    fn strip_code_fences_removes_json_fence() {
        let wrapped = "```json\n{\"a\":1}\n```";
        assert_eq!(strip_code_fences(wrapped), "{\"a\":1}");
    }

    #[test]
    fn strip_code_fences_passes_through_plain_json() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }
}
