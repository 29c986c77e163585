//! AI extract stage output contract and parsing.

use serde::{Deserialize, Serialize};

use crate::error::AiError;
use crate::prompt::strip_code_fences;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub role_title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub seniority: Option<String>,
    pub work_mode: Option<String>,
    pub experience_years_min: Option<i32>,
    pub experience_years_max: Option<i32>,
    #[serde(default)]
    pub must_have_keywords: Vec<String>,
    #[serde(default)]
    pub nice_to_have_keywords: Vec<String>,
    #[serde(default)]
    pub reject_keywords: Vec<String>,
}

pub fn parse_extraction_response(response: &str) -> Result<ExtractionResult, AiError> {
    let json_str = strip_code_fences(response);
    serde_json::from_str(json_str).map_err(|e| AiError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_extraction() {
        let response = r#"{
            "role_title": "Backend Engineer",
            "company": "Acme",
            "location": "Remote",
            "seniority": "Senior",
            "work_mode": "remote",
            "experience_years_min": 4,
            "experience_years_max": 8,
            "must_have_keywords": ["rust", "postgres"],
            "nice_to_have_keywords": ["kubernetes"],
            "reject_keywords": []
        }"#;
        let result = parse_extraction_response(response).unwrap();
        assert_eq!(result.role_title.as_deref(), Some("Backend Engineer"));
        assert_eq!(result.must_have_keywords, vec!["rust", "postgres"]);
    }

    #[test]
    fn parses_response_wrapped_in_code_fence() {
        let response = "```json\n{\"must_have_keywords\": [\"go\"]}\n```";
        let result = parse_extraction_response(response).unwrap();
        assert_eq!(result.must_have_keywords, vec!["go"]);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_extraction_response("not json").is_err());
    }
}
