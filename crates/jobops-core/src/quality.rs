//! Deterministic low-quality JD classification, used by the resolver to
//! avoid persisting cookie walls, captchas, and other non-JD shells.

const SHELL_MARKERS: &[&str] = &[
    "enable javascript",
    "please enable cookies",
    "accept all cookies",
    "verify you are human",
    "are you a robot",
    "complete the captcha",
    "unusual traffic from your",
    "this job is no longer available",
    "job has expired",
    "privacy notice",
    "we use cookies to",
];

const HIRING_SIGNALS: &[&str] = &[
    "responsibilities",
    "requirements",
    "qualifications",
    "you will",
    "you'll be",
    "we are looking for",
    "must have",
    "nice to have",
    "about the role",
];

/// True if the text is a shell page (cookie wall, captcha, ...) or too
/// short to carry real signal.
pub fn is_low_quality_jd(text: &str, min_signal_chars: usize) -> bool {
    let lower = text.to_lowercase();
    if SHELL_MARKERS.iter().any(|m| lower.contains(m)) {
        return true;
    }
    text.trim().chars().count() < min_signal_chars
}

pub fn hiring_signal_count(text: &str) -> usize {
    let lower = text.to_lowercase();
    HIRING_SIGNALS.iter().filter(|m| lower.contains(*m)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cookie_wall() {
        assert!(is_low_quality_jd("Please enable cookies to continue browsing our careers site.", 50));
    }

    #[test]
    fn detects_captcha_marker() {
        assert!(is_low_quality_jd("Verify you are human before continuing.", 10));
    }

    #[test]
    fn short_text_is_low_quality_regardless_of_content() {
        assert!(is_low_quality_jd("Great team.", 120));
    }

    #[test]
    fn real_jd_is_not_low_quality() {
        let jd = "We are looking for a backend engineer. Responsibilities: design APIs, own services. \
            Requirements: 4+ years of experience with Rust or Go.";
        assert!(!is_low_quality_jd(jd, 120));
    }

    #[test]
    fn hiring_signal_count_counts_distinct_markers() {
        let jd = "Responsibilities: own services. Requirements: 4 years experience. We are looking for a leader.";
        assert!(hiring_signal_count(jd) >= 3);
    }
}
