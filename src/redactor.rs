//! PII detection and placeholder redaction.
//!
//! Detects six PII kinds (person names, Indian phone numbers, emails,
//! Aadhaar numbers, PAN numbers, bank account numbers) and replaces each
//! with a placeholder of the form `[<KIND>_<ordinal>_<hex8>]`, where
//! `<hex8>` is the first 8 hex digits of the SHA-256 of the matched value.
//! The same value always yields the same placeholder within one redaction
//! run, and redaction is idempotent: redacting redacted text changes
//! nothing.
//!
//! Legal text is full of look-alikes (case numbers read like phone numbers,
//! party names read like person names), so every candidate passes a
//! denylist filter over the value and its surrounding context before it is
//! emitted. Bank account numbers are only digit runs *not otherwise
//! recognized*: overlapping candidates resolve in kind-specificity order.

use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// PII kinds, ordered by detection specificity. When two candidates
/// overlap, the more specific kind wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiKind {
    Email,
    Pan,
    Aadhaar,
    Phone,
    BankAccount,
    PersonName,
}

impl PiiKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Pan => "pan",
            Self::Aadhaar => "aadhaar",
            Self::Phone => "phone",
            Self::BankAccount => "bank_account",
            Self::PersonName => "person_name",
        }
    }

    fn placeholder_tag(&self) -> &'static str {
        match self {
            Self::Email => "EMAIL",
            Self::Pan => "PAN",
            Self::Aadhaar => "AADHAAR",
            Self::Phone => "PHONE",
            Self::BankAccount => "BANK_ACCOUNT",
            Self::PersonName => "PERSON",
        }
    }

    /// Base detection confidence per kind. Emails and PANs have rigid
    /// formats; names and account numbers are guesswork.
    fn base_confidence(&self) -> f64 {
        match self {
            Self::Email => 0.95,
            Self::Pan => 0.95,
            Self::Aadhaar => 0.90,
            Self::Phone => 0.75,
            Self::BankAccount => 0.60,
            Self::PersonName => 0.70,
        }
    }

    fn priority(&self) -> u8 {
        match self {
            Self::Email => 0,
            Self::Pan => 1,
            Self::Aadhaar => 2,
            Self::Phone => 3,
            Self::BankAccount => 4,
            Self::PersonName => 5,
        }
    }
}

const ALL_KINDS: &[PiiKind] = &[
    PiiKind::Email,
    PiiKind::Pan,
    PiiKind::Aadhaar,
    PiiKind::Phone,
    PiiKind::BankAccount,
    PiiKind::PersonName,
];

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
});

static PAN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z]{5}\d{4}[A-Z]\b").unwrap());

static AADHAAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}[-\s]\d{4}[-\s]\d{4}\b|\b\d{12}\b").unwrap());

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?91[-\s]?\d{10}\b|\b\d{10}\b").unwrap());

static BANK_ACCOUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{9,18}\b").unwrap());

static PERSON_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:Mr\.|Mrs\.|Ms\.|Dr\.|Justice|Hon'?ble)\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)+\b|\b[A-Z][a-z]+\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?\b",
    )
    .unwrap()
});

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\b(19|20)\d{2}\b$").unwrap());

/// Legal and organizational phrases that disqualify a person-name
/// candidate, checked against the value and its context window.
const NAME_DENYLIST: &[&str] = &[
    "supreme court",
    "high court",
    "civil appeal",
    "criminal appeal",
    "state of",
    "union of",
    "petitioner",
    "respondent",
    "appellant",
    "state government",
    "central government",
    "union government",
    "government of",
    "ministry of",
    "company",
    "corporation",
    "platform",
    "limited",
    "ltd",
    "private limited",
    "pvt ltd",
    "public limited",
    "legal issues",
    "facts",
    "arguments",
    "case:",
    "v.",
    "vs.",
    "background",
    "issues",
    "judgment",
    "order",
    "relief",
    "social media",
    "bank",
    "insurance",
    "trust",
    "society",
];

/// Titles that rescue a name candidate even in denylisted context.
const NAME_TITLES: &[&str] = &["justice", "mr.", "mrs.", "ms.", "dr."];

/// One emitted detection.
#[derive(Debug, Clone, Serialize)]
pub struct PiiDetection {
    pub kind: PiiKind,
    /// SHA-256 hex of the original value; the value itself is never stored.
    pub value_hash: String,
    pub placeholder: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
}

/// Result of one redaction run.
#[derive(Debug, Clone)]
pub struct RedactionResult {
    pub redacted_text: String,
    pub detections: Vec<PiiDetection>,
    /// Mean confidence over emitted detections; 1.0 when nothing was found.
    pub confidence: f64,
}

impl RedactionResult {
    /// Distinct kinds detected, in first-occurrence order.
    pub fn kinds_detected(&self) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        for d in &self.detections {
            if !kinds.contains(&d.kind.label()) {
                kinds.push(d.kind.label());
            }
        }
        kinds
    }
}

/// Redacts PII from text while preserving document shape.
pub struct PiiRedactor {
    min_confidence: f64,
}

impl PiiRedactor {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    /// Detect and replace PII, producing stable placeholders.
    pub fn redact(&self, text: &str) -> RedactionResult {
        let mut candidates = Vec::new();
        for &kind in ALL_KINDS {
            for m in regex_for(kind).find_iter(text) {
                candidates.push((kind, m.start(), m.end()));
            }
        }

        // Specificity order, then position, so overlap resolution is
        // deterministic and bank accounts only claim unclaimed digit runs.
        candidates.sort_by_key(|&(kind, start, _)| (kind.priority(), start));

        let mut kept: Vec<(PiiKind, usize, usize)> = Vec::new();
        for (kind, start, end) in candidates {
            if kept
                .iter()
                .any(|&(_, ks, ke)| start < ke && end > ks)
            {
                continue;
            }
            if is_false_positive(kind, &text[start..end], text, start, end) {
                continue;
            }
            if kind.base_confidence() < self.min_confidence {
                continue;
            }
            kept.push((kind, start, end));
        }

        // Document order for ordinal assignment and replacement.
        kept.sort_by_key(|&(_, start, _)| start);

        let mut counters = std::collections::HashMap::new();
        let mut placeholders_by_value: std::collections::HashMap<(PiiKind, String), String> =
            std::collections::HashMap::new();
        let mut detections = Vec::new();

        for &(kind, start, end) in &kept {
            let value = text[start..end].to_string();
            let placeholder = placeholders_by_value
                .entry((kind, value.clone()))
                .or_insert_with(|| {
                    let counter = counters.entry(kind).or_insert(0usize);
                    *counter += 1;
                    format!(
                        "[{}_{}_{}]",
                        kind.placeholder_tag(),
                        counter,
                        &hash_hex(&value)[..8]
                    )
                })
                .clone();

            detections.push(PiiDetection {
                kind,
                value_hash: hash_hex(&value),
                placeholder,
                start,
                end,
                confidence: kind.base_confidence(),
            });
        }

        // Replace back-to-front so earlier offsets stay valid.
        let mut redacted = text.to_string();
        for d in detections.iter().rev() {
            redacted.replace_range(d.start..d.end, &d.placeholder);
        }

        let confidence = if detections.is_empty() {
            1.0
        } else {
            detections.iter().map(|d| d.confidence).sum::<f64>() / detections.len() as f64
        };

        RedactionResult {
            redacted_text: redacted,
            detections,
            confidence,
        }
    }
}

fn regex_for(kind: PiiKind) -> &'static Regex {
    match kind {
        PiiKind::Email => &EMAIL_RE,
        PiiKind::Pan => &PAN_RE,
        PiiKind::Aadhaar => &AADHAAR_RE,
        PiiKind::Phone => &PHONE_RE,
        PiiKind::BankAccount => &BANK_ACCOUNT_RE,
        PiiKind::PersonName => &PERSON_NAME_RE,
    }
}

/// Context-based false-positive filtering.
fn is_false_positive(kind: PiiKind, value: &str, text: &str, start: usize, end: usize) -> bool {
    let context = context_window(text, start, end);

    match kind {
        PiiKind::PersonName => {
            let value_lower = value.to_lowercase();
            if NAME_DENYLIST.iter().any(|term| value_lower.contains(term)) {
                return true;
            }
            if NAME_DENYLIST.iter().any(|term| context.contains(term))
                && !NAME_TITLES.iter().any(|title| context.contains(title))
            {
                return true;
            }
            // All-caps tokens over 2 chars are acronyms or case-name styling.
            if value.len() > 2 && value.chars().all(|c| !c.is_lowercase()) {
                return true;
            }
            false
        }
        PiiKind::Phone => {
            context.contains("section") || context.contains("case no") || context.contains("appeal no")
        }
        PiiKind::BankAccount => {
            if YEAR_RE.is_match(value) {
                return true;
            }
            context.contains("section") || context.contains("case")
        }
        _ => false,
    }
}

/// Lowercased 50-char window around a candidate.
fn context_window(text: &str, start: usize, end: usize) -> String {
    let from = floor_char_boundary(text, start.saturating_sub(50));
    let to = ceil_char_boundary(text, (end + 50).min(text.len()));
    text[from..to].to_lowercase()
}

fn floor_char_boundary(text: &str, mut pos: usize) -> usize {
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

fn ceil_char_boundary(text: &str, mut pos: usize) -> usize {
    while pos < text.len() && !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}

fn hash_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}
