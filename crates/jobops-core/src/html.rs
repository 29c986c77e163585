//! HTML-to-text cleaning for JD bodies. Deliberately a small hand-rolled
//! pass rather than a full HTML parser: the transform only needs to strip
//! noise tags and collapse whitespace, not build a DOM.

use regex::Regex;
use std::sync::OnceLock;

fn script_style_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</\1>").unwrap())
}

fn block_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<(br\s*/?|/p|/div|/li|/h[1-6]|/tr)>").unwrap())
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap())
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+").unwrap())
}

fn blank_lines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap())
}

/// Strip script/style blocks, turn block-level closings into newlines,
/// decode HTML entities, and collapse whitespace.
pub fn clean_html(raw: &str) -> String {
    let no_script = script_style_re().replace_all(raw, "");
    let with_breaks = block_break_re().replace_all(&no_script, "\n");
    let no_tags = tag_re().replace_all(&with_breaks, " ");
    let decoded = html_escape::decode_html_entities(&no_tags);
    let collapsed_spaces = whitespace_re().replace_all(&decoded, " ");
    let collapsed = blank_lines_re().replace_all(&collapsed_spaces, "\n\n");
    collapsed
        .lines()
        .map(|l| l.trim())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

const MIN_WINDOW_CHARS: usize = 200;

/// Pick the densest contiguous run of non-empty paragraphs, scored by
/// words-per-character (a crude proxy for "prose" vs. nav/boilerplate).
pub fn largest_dense_window(text: &str) -> Option<String> {
    let paragraphs: Vec<&str> = text.split("\n\n").map(|p| p.trim()).filter(|p| !p.is_empty()).collect();
    if paragraphs.is_empty() {
        return None;
    }

    let mut best_window = String::new();
    let mut best_density = -1.0f64;

    for start in 0..paragraphs.len() {
        let mut acc = String::new();
        for paragraph in &paragraphs[start..] {
            if !acc.is_empty() {
                acc.push_str("\n\n");
            }
            acc.push_str(paragraph);
            if acc.chars().count() < MIN_WINDOW_CHARS {
                continue;
            }
            let density = paragraph_density(&acc);
            if density > best_density {
                best_density = density;
                best_window = acc.clone();
            }
        }
    }

    if best_window.chars().count() < MIN_WINDOW_CHARS {
        return None;
    }
    Some(best_window)
}

fn paragraph_density(text: &str) -> f64 {
    let words = text.split_whitespace().count();
    let chars = text.chars().count().max(1);
    words as f64 / chars as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_and_style() {
        let raw = "<html><head><style>.x{color:red}</style></head><body><script>alert(1)</script><p>Hello world</p></body></html>";
        let cleaned = clean_html(raw);
        assert!(!cleaned.contains("alert"));
        assert!(!cleaned.contains("color:red"));
        assert!(cleaned.contains("Hello world"));
    }

    #[test]
    fn decodes_entities_and_collapses_whitespace() {
        let raw = "<p>Tom &amp; Jerry</p><p>Line1<br>Line2</p>";
        let cleaned = clean_html(raw);
        assert!(cleaned.contains("Tom & Jerry"));
        assert!(cleaned.contains("Line1"));
        assert!(cleaned.contains("Line2"));
    }

    #[test]
    fn largest_dense_window_rejects_short_text() {
        assert!(largest_dense_window("too short").is_none());
    }

    #[test]
    fn largest_dense_window_picks_prose_over_boilerplate() {
        let nav = "Home\n\nAbout\n\nContact\n\nCareers\n\nLogin";
        let prose = "We are looking for a senior backend engineer with strong distributed systems experience. \
            Responsibilities include designing APIs, mentoring engineers, and owning on-call rotations. \
            Requirements: 5+ years of Rust or Go, familiarity with Kubernetes, and excellent communication skills.";
        let combined = format!("{nav}\n\n{prose}");
        let window = largest_dense_window(&combined).unwrap();
        assert!(window.contains("distributed systems"));
    }
}
