//! Input validation for user-supplied case text and file uploads.
//!
//! Checks run in order: length bounds, prompt-injection patterns, XSS
//! patterns, SQL patterns, special-character ratio. Each violation adds a
//! fixed weight to the risk score (clamped to 1.0) and any violation makes
//! the input invalid. Callers surface only the violation *category*; the
//! matched pattern stays internal so rejections do not coach attackers.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::SecurityConfig;

/// Category of a validation violation. This is the only detail disclosed
/// to callers and audit consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationCategory {
    Length,
    PromptInjection,
    Xss,
    Sql,
    SpecialChars,
    FileSize,
    FileType,
    FileName,
}

impl ViolationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Length => "length",
            Self::PromptInjection => "prompt_injection",
            Self::Xss => "xss",
            Self::Sql => "sql",
            Self::SpecialChars => "special_chars",
            Self::FileSize => "file_size",
            Self::FileType => "file_type",
            Self::FileName => "file_name",
        }
    }

    /// Fixed risk weight contributed by one violation of this category.
    fn weight(&self) -> f64 {
        match self {
            Self::Length => 0.2,
            Self::SpecialChars => 0.3,
            Self::Sql => 0.4,
            Self::Xss => 0.5,
            Self::PromptInjection => 0.5,
            Self::FileSize => 0.5,
            Self::FileType => 0.6,
            Self::FileName => 0.7,
        }
    }
}

/// Result of validating one input.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub sanitized_input: String,
    pub violations: Vec<ViolationCategory>,
    pub risk_score: f64,
}

impl ValidationReport {
    pub fn violation_labels(&self) -> Vec<String> {
        self.violations
            .iter()
            .map(|v| v.as_str().to_string())
            .collect()
    }
}

static PROMPT_INJECTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)ignore\s+(?:all\s+)?(?:previous|above|prior|the\s+above)\s+(?:instructions?|commands?)",
        r"(?i)disregard\s+(?:previous|above|prior)",
        r"(?i)forget\s+(?:previous|above|prior)",
        r"(?i)you\s+are\s+now\s+(?:in\s+)?(?:admin|system|root)",
        r"(?i)new\s+instructions?:",
        r"(?i)system\s*:\s*(?:ignore|disregard|forget)",
        r"(?i)system\s+(?:prompt|mode):",
        r"(?i)jailbreak",
        r"(?i)DAN\s+mode",
        r"(?i)(?:begin|start|end)\s+(?:system|admin)",
        r"(?i)\[system\]",
        r"(?i)/\*\s*system\s*\*/",
        r"(?i)---\s*BEGIN\s+SYSTEM\s*---",
        r"(?i)\bSYSTEM\s*:",
        r"(?i)override\s+(?:security|protocols)",
        r"(?i)instructions?\s+(?:are\s+)?void",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static XSS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?is)<script[^>]*>.*?</script>",
        r"(?i)<script",
        r"(?i)javascript:",
        r"(?i)onerror\s*=",
        r"(?i)onload\s*=",
        r"(?i)<iframe",
        r"(?i)<embed",
        r"(?i)<object",
        r"(?i)<svg\s+onload",
        r"(?i)<img[^>]*onerror",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static SQL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i);\s*drop\s+table",
        r"(?i);\s*delete\s+from",
        r"(?i)union\s+select",
        r"(?im)--\s*$",
        r"(?s)/\*.*\*/",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static SPECIAL_CHAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[^\w\s.,;:!?()\[\]{}\-'"/]"#).unwrap());

static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

static JS_SCHEME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)javascript:").unwrap());

static FILENAME_BAD_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"|?*]"#).unwrap());

/// Validates and sanitizes user inputs.
pub struct InputValidator {
    min_len: usize,
    max_len: usize,
    max_file_bytes: u64,
    special_char_ratio: f64,
}

impl InputValidator {
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            min_len: config.min_input_len,
            max_len: config.max_input_len,
            max_file_bytes: config.max_file_mb * 1024 * 1024,
            special_char_ratio: config.special_char_ratio,
        }
    }

    /// Validate case description text. Inputs of exactly `min_len` and
    /// exactly `max_len` characters are valid.
    pub fn validate_case_text(&self, text: &str) -> ValidationReport {
        let mut violations = Vec::new();

        let len = text.chars().count();
        if len < self.min_len || len > self.max_len {
            violations.push(ViolationCategory::Length);
        }

        if PROMPT_INJECTION_PATTERNS.iter().any(|p| p.is_match(text)) {
            violations.push(ViolationCategory::PromptInjection);
        }

        if XSS_PATTERNS.iter().any(|p| p.is_match(text)) {
            violations.push(ViolationCategory::Xss);
        }

        if SQL_PATTERNS.iter().any(|p| p.is_match(text)) {
            violations.push(ViolationCategory::Sql);
        }

        if self.has_excessive_special_chars(text) {
            violations.push(ViolationCategory::SpecialChars);
        }

        report_from(violations, sanitize_text(text))
    }

    /// Validate a file upload. Only `.pdf` files of at most the configured
    /// size pass; traversal components reject outright.
    pub fn validate_file_upload(&self, filename: &str, file_size_bytes: u64) -> ValidationReport {
        let mut violations = Vec::new();

        if file_size_bytes > self.max_file_bytes {
            violations.push(ViolationCategory::FileSize);
        }

        let lower = filename.to_lowercase();
        if !lower.ends_with(".pdf") {
            violations.push(ViolationCategory::FileType);
        }

        if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
            violations.push(ViolationCategory::FileName);
        } else if FILENAME_BAD_CHARS_RE.is_match(filename) {
            violations.push(ViolationCategory::FileName);
        }

        report_from(violations, sanitize_filename(filename))
    }

    fn has_excessive_special_chars(&self, text: &str) -> bool {
        let total = text.chars().count();
        if total == 0 {
            return false;
        }
        let special = SPECIAL_CHAR_RE.find_iter(text).count();
        (special as f64 / total as f64) > self.special_char_ratio
    }
}

fn report_from(violations: Vec<ViolationCategory>, sanitized: String) -> ValidationReport {
    let risk_score: f64 = violations.iter().map(|v| v.weight()).sum();
    ValidationReport {
        is_valid: violations.is_empty(),
        sanitized_input: sanitized,
        violations,
        risk_score: risk_score.min(1.0),
    }
}

/// Strip HTML tags and `javascript:` schemes and collapse whitespace.
pub fn sanitize_text(text: &str) -> String {
    let without_tags = HTML_TAG_RE.replace_all(text, "");
    let without_js = JS_SCHEME_RE.replace_all(&without_tags, "");
    without_js.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip path components and dangerous characters from a filename.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit('/')
        .next()
        .unwrap_or(filename)
        .rsplit('\\')
        .next()
        .unwrap_or(filename);
    let cleaned = FILENAME_BAD_CHARS_RE.replace_all(base, "").to_string();
    if cleaned.chars().count() > 255 {
        cleaned.chars().take(255).collect()
    } else {
        cleaned
    }
}
