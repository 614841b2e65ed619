//! Hallucination detection over LLM output.
//!
//! Extracts legal references (statute sections, constitutional articles,
//! case citations) from generated text and validates each one:
//!
//! - Statutes and articles check against the known valid-section sets of
//!   the Indian codes. Out-of-range sections are suspected fakes with the
//!   valid range in the reason.
//! - Case citations check against the vector store: a citation that no
//!   indexed chunk's citation fuzzily contains is a suspected fake.
//!
//! Detection never fails a request. Suspected fakes annotate the response;
//! a per-call record is appended to the hallucination audit log.

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::LazyLock;
use tracing::warn;

use crate::audit::JsonlWriter;
use crate::error::Result;
use crate::retriever::Retriever;

const HALLUCINATION_LOG_FILE: &str = "hallucination_audit.log";

/// Reference type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefType {
    Statute,
    Article,
    Case,
}

/// Validation verdict for one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Valid,
    SuspectedFake,
    Unknown,
}

/// One extracted legal reference with its validation outcome.
#[derive(Debug, Clone, Serialize)]
pub struct Reference {
    pub ref_type: RefType,
    /// The matched text, e.g. `Section 302 of IPC`.
    pub text: String,
    /// Parsed section/article key, e.g. `302` or `21A`; empty for cases.
    pub key: String,
    /// Statute code the key belongs to; empty for cases.
    pub act: String,
    pub verdict: Verdict,
    pub confidence: f64,
    pub reason: String,
}

/// Aggregate detection result for one LLM response.
#[derive(Debug, Clone, Serialize)]
pub struct HallucinationReport {
    pub has_hallucinations: bool,
    pub num_references: usize,
    pub num_suspected: usize,
    pub references: Vec<Reference>,
    pub suspected_fake_refs: Vec<Reference>,
    /// Max per-fake confidence when fakes exist, else 1.0.
    pub confidence_score: f64,
    pub summary: String,
}

impl HallucinationReport {
    fn clean(num_references: usize, references: Vec<Reference>) -> Self {
        let summary = if num_references == 0 {
            "No references found to validate".to_string()
        } else {
            format!("All {} references validated successfully.", num_references)
        };
        Self {
            has_hallucinations: false,
            num_references,
            num_suspected: 0,
            references,
            suspected_fake_refs: Vec::new(),
            confidence_score: 1.0,
            summary,
        }
    }
}

/// A statute code with its valid section set.
struct StatuteTable {
    act: &'static str,
    full_name: &'static str,
    range: std::ops::RangeInclusive<u32>,
    special: &'static [&'static str],
}

static STATUTES: &[StatuteTable] = &[
    StatuteTable {
        act: "IPC",
        full_name: "Indian Penal Code, 1860",
        range: 1..=511,
        special: &["498A", "376A", "376B", "376C", "376D"],
    },
    StatuteTable {
        act: "CrPC",
        full_name: "Code of Criminal Procedure, 1973",
        range: 1..=484,
        special: &[],
    },
    StatuteTable {
        act: "CPC",
        full_name: "Code of Civil Procedure, 1908",
        range: 1..=158,
        special: &[],
    },
    StatuteTable {
        act: "IT Act",
        full_name: "Information Technology Act, 2000",
        range: 1..=87,
        special: &["66A", "66B", "66C", "66D", "66E", "66F"],
    },
    StatuteTable {
        act: "Evidence Act",
        full_name: "Indian Evidence Act, 1872",
        range: 1..=167,
        special: &[],
    },
];

static CONSTITUTION: StatuteTable = StatuteTable {
    act: "Constitution",
    full_name: "Constitution of India",
    range: 1..=395,
    special: &["12A", "21A", "35A", "51A", "371A", "371B"],
};

/// One regex per act family, combining the `Section N of <act>`,
/// `<act> Section N`, and `s. N <act>` spellings.
struct StatutePattern {
    act: &'static str,
    regex: Regex,
}

static STATUTE_PATTERNS: LazyLock<Vec<StatutePattern>> = LazyLock::new(|| {
    let spellings: &[(&str, &str)] = &[
        ("IPC", r"I\.?P\.?C\.?"),
        ("CrPC", r"Cr\.?P\.?C\.?"),
        ("CPC", r"C\.?P\.?C\.?"),
        ("IT Act", r"I\.?T\.?\s+Act"),
        ("Evidence Act", r"Evidence\s+Act"),
    ];
    spellings
        .iter()
        .map(|(act, spelling)| StatutePattern {
            act,
            regex: Regex::new(&format!(
                r"(?i)Section\s+(\d+[A-Z]?)\s+(?:of\s+)?(?:the\s+)?{s}\b|{s}\s+Section\s+(\d+[A-Z]?)|\bs\.?\s*(\d+[A-Z]?)\s+{s}\b",
                s = spelling
            ))
            .unwrap(),
        })
        .collect()
});

static ARTICLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Article\s+(\d+[A-Z]?)(?:\s+of\s+(?:the\s+)?Constitution)?").unwrap()
});

static CITATION_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\[\d{4}\]\s*\d+\s*S\.C\.R\.\s*\d+",
        r"(?i)\b\d{4}\s*INSC\s*\d+",
        r"(?i)\b\d{4}\s*SCC\s*\d+",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Record appended to the hallucination audit log.
#[derive(Debug, Serialize)]
struct HallucinationAuditRecord {
    timestamp: String,
    user_id: String,
    suspected_hallucination: bool,
    input_query: String,
    output_text: String,
    suspected_fake_refs: Vec<AuditFakeRef>,
    confidence_score: f64,
    num_suspected: usize,
}

#[derive(Debug, Serialize)]
struct AuditFakeRef {
    #[serde(rename = "type")]
    ref_type: RefType,
    text: String,
    reason: String,
    confidence: f64,
    matched_statute: Option<bool>,
    validated_against_index: Option<bool>,
}

/// Validates legal references in LLM output against the statute tables and
/// the vector store.
pub struct HallucinationDetector {
    retriever: Option<Arc<Retriever>>,
    log: Option<JsonlWriter>,
}

impl HallucinationDetector {
    /// `retriever` enables case-citation validation; without it, citations
    /// are reported as [`Verdict::Unknown`].
    pub fn new(retriever: Option<Arc<Retriever>>, audit_dir: Option<&Path>) -> Result<Self> {
        let log = match audit_dir {
            Some(dir) => Some(JsonlWriter::open(&dir.join(HALLUCINATION_LOG_FILE))?),
            None => None,
        };
        Ok(Self { retriever, log })
    }

    /// Detect hallucinated references in one LLM response. Never errors;
    /// at worst the references list is empty or partial.
    pub async fn detect(
        &self,
        input_query: &str,
        output_text: &str,
        user_id: Option<&str>,
    ) -> HallucinationReport {
        let mut references = self.extract_and_validate(output_text).await;
        references.sort_by(|a, b| a.text.cmp(&b.text));

        if references.is_empty() {
            return HallucinationReport::clean(0, references);
        }

        let suspected: Vec<Reference> = references
            .iter()
            .filter(|r| r.verdict == Verdict::SuspectedFake)
            .cloned()
            .collect();

        if suspected.is_empty() {
            return HallucinationReport::clean(references.len(), references);
        }

        let confidence_score = suspected
            .iter()
            .map(|r| r.confidence)
            .fold(0.0f64, f64::max);

        let report = HallucinationReport {
            has_hallucinations: true,
            num_references: references.len(),
            num_suspected: suspected.len(),
            summary: format!(
                "Found {} suspected hallucination(s) out of {} total references. Please verify these references independently.",
                suspected.len(),
                references.len()
            ),
            suspected_fake_refs: suspected,
            references,
            confidence_score,
        };

        self.write_audit(input_query, output_text, user_id, &report);
        report
    }

    async fn extract_and_validate(&self, text: &str) -> Vec<Reference> {
        let mut references = Vec::new();
        let mut seen_spans: Vec<(usize, usize)> = Vec::new();

        for pattern in STATUTE_PATTERNS.iter() {
            for caps in pattern.regex.captures_iter(text) {
                let m = caps.get(0).unwrap();
                if overlaps(&seen_spans, m.start(), m.end()) {
                    continue;
                }
                seen_spans.push((m.start(), m.end()));

                let key = caps
                    .iter()
                    .skip(1)
                    .flatten()
                    .next()
                    .map(|g| g.as_str().to_uppercase())
                    .unwrap_or_default();
                references.push(validate_statute(pattern.act, m.as_str(), &key));
            }
        }

        for caps in ARTICLE_RE.captures_iter(text) {
            let m = caps.get(0).unwrap();
            if overlaps(&seen_spans, m.start(), m.end()) {
                continue;
            }
            seen_spans.push((m.start(), m.end()));

            let key = caps
                .get(1)
                .map(|g| g.as_str().to_uppercase())
                .unwrap_or_default();
            references.push(validate_article(m.as_str(), &key));
        }

        for regex in CITATION_RES.iter() {
            for m in regex.find_iter(text) {
                if overlaps(&seen_spans, m.start(), m.end()) {
                    continue;
                }
                seen_spans.push((m.start(), m.end()));
                references.push(self.validate_citation(m.as_str()).await);
            }
        }

        references
    }

    /// Check a citation against the vector store by fuzzy containment on
    /// the metadata citation of retrieved chunks.
    async fn validate_citation(&self, citation: &str) -> Reference {
        let Some(ref retriever) = self.retriever else {
            return Reference {
                ref_type: RefType::Case,
                text: citation.to_string(),
                key: String::new(),
                act: String::new(),
                verdict: Verdict::Unknown,
                confidence: 0.5,
                reason: "no retriever available for validation".into(),
            };
        };

        match retriever.retrieve(citation, 3).await {
            Ok(hits) => {
                let found = hits
                    .iter()
                    .any(|hit| citations_match(citation, &hit.record.citation));
                if found {
                    Reference {
                        ref_type: RefType::Case,
                        text: citation.to_string(),
                        key: String::new(),
                        act: String::new(),
                        verdict: Verdict::Valid,
                        confidence: 0.9,
                        reason: "found in vector store".into(),
                    }
                } else {
                    Reference {
                        ref_type: RefType::Case,
                        text: citation.to_string(),
                        key: String::new(),
                        act: String::new(),
                        verdict: Verdict::SuspectedFake,
                        confidence: 0.8,
                        reason: "citation not found in vector store".into(),
                    }
                }
            }
            Err(e) => Reference {
                ref_type: RefType::Case,
                text: citation.to_string(),
                key: String::new(),
                act: String::new(),
                verdict: Verdict::Unknown,
                confidence: 0.5,
                reason: format!("error validating: {}", e),
            },
        }
    }

    fn write_audit(
        &self,
        input_query: &str,
        output_text: &str,
        user_id: Option<&str>,
        report: &HallucinationReport,
    ) {
        let Some(ref log) = self.log else {
            return;
        };

        let record = HallucinationAuditRecord {
            timestamp: chrono::Utc::now().to_rfc3339(),
            user_id: user_id.unwrap_or("anonymous").to_string(),
            suspected_hallucination: report.has_hallucinations,
            input_query: truncate(input_query, 200),
            output_text: truncate(output_text, 500),
            suspected_fake_refs: report
                .suspected_fake_refs
                .iter()
                .map(|r| AuditFakeRef {
                    ref_type: r.ref_type,
                    text: r.text.clone(),
                    reason: r.reason.clone(),
                    confidence: r.confidence,
                    matched_statute: (r.ref_type != RefType::Case)
                        .then_some(r.verdict == Verdict::Valid),
                    validated_against_index: (r.ref_type == RefType::Case)
                        .then_some(r.verdict == Verdict::Valid),
                })
                .collect(),
            confidence_score: report.confidence_score,
            num_suspected: report.num_suspected,
        };

        if let Err(e) = log.append(&record) {
            warn!(error = %e, "failed to append hallucination audit record");
        }
    }
}

fn validate_statute(act: &str, text: &str, key: &str) -> Reference {
    let table = STATUTES
        .iter()
        .find(|t| t.act == act)
        .expect("statute table exists for every pattern");
    validate_against_table(RefType::Statute, table, text, key, "Section")
}

fn validate_article(text: &str, key: &str) -> Reference {
    validate_against_table(RefType::Article, &CONSTITUTION, text, key, "Article")
}

fn validate_against_table(
    ref_type: RefType,
    table: &StatuteTable,
    text: &str,
    key: &str,
    unit: &str,
) -> Reference {
    let make = |verdict, confidence, reason: String| Reference {
        ref_type,
        text: text.to_string(),
        key: key.to_string(),
        act: table.act.to_string(),
        verdict,
        confidence,
        reason,
    };

    if key.is_empty() {
        return make(Verdict::Unknown, 0.5, "no section number to validate".into());
    }

    if table.special.contains(&key) {
        return make(
            Verdict::Valid,
            0.9,
            format!("valid special {} {}", unit.to_lowercase(), key),
        );
    }

    let numeric: String = key.chars().take_while(|c| c.is_ascii_digit()).collect();
    match numeric.parse::<u32>() {
        Ok(n) if table.range.contains(&n) && numeric == *key => make(
            Verdict::Valid,
            0.9,
            format!("valid {} {}", unit.to_lowercase(), n),
        ),
        Ok(_) => make(
            Verdict::SuspectedFake,
            0.95,
            format!(
                "{} {} does not exist in {} (valid {}s {}-{})",
                unit,
                key,
                table.full_name,
                unit.to_lowercase(),
                table.range.start(),
                table.range.end()
            ),
        ),
        Err(_) => make(
            Verdict::SuspectedFake,
            0.95,
            format!("invalid {} format: {}", unit.to_lowercase(), key),
        ),
    }
}

/// Fuzzy citation containment: collapse whitespace, lowercase, then compare
/// digit sets with at least 0.7 overlap.
fn citations_match(a: &str, b: &str) -> bool {
    let norm_a = a.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
    let norm_b = b.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
    if !norm_a.is_empty() && norm_b.contains(&norm_a) {
        return true;
    }

    static NUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
    let nums_a: HashSet<&str> = NUM_RE.find_iter(a).map(|m| m.as_str()).collect();
    let nums_b: HashSet<&str> = NUM_RE.find_iter(b).map(|m| m.as_str()).collect();
    if nums_a.is_empty() || nums_b.is_empty() {
        return false;
    }
    let overlap = nums_a.intersection(&nums_b).count() as f64;
    overlap / nums_a.len().max(nums_b.len()) as f64 >= 0.7
}

fn overlaps(spans: &[(usize, usize)], start: usize, end: usize) -> bool {
    spans.iter().any(|&(s, e)| start < e && end > s)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> HallucinationDetector {
        HallucinationDetector::new(None, None).unwrap()
    }

    #[tokio::test]
    async fn test_fake_ipc_section_caught() {
        let report = detector()
            .detect("q", "The offence falls under Section 999 of IPC as held.", None)
            .await;

        assert!(report.has_hallucinations);
        assert_eq!(report.num_suspected, 1);
        let fake = &report.suspected_fake_refs[0];
        assert_eq!(fake.ref_type, RefType::Statute);
        assert!((fake.confidence - 0.95).abs() < 1e-9);
        assert!(fake.reason.contains("1-511"), "reason: {}", fake.reason);
        assert!((report.confidence_score - 0.95).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fake_article_caught() {
        let report = detector()
            .detect("q", "This violates Article 500 of the Constitution.", None)
            .await;

        assert!(report.has_hallucinations);
        let fake = &report.suspected_fake_refs[0];
        assert_eq!(fake.ref_type, RefType::Article);
        assert!((fake.confidence - 0.95).abs() < 1e-9);
        assert!(fake.reason.contains("1-395"), "reason: {}", fake.reason);
    }

    #[tokio::test]
    async fn test_valid_references_pass() {
        let report = detector()
            .detect(
                "q",
                "Charged under Section 302 IPC, read with Article 21, and Section 154 CrPC applies.",
                None,
            )
            .await;

        assert!(!report.has_hallucinations);
        assert_eq!(report.num_references, 3);
        assert_eq!(report.num_suspected, 0);
        assert!((report.confidence_score - 1.0).abs() < 1e-9);
        assert!(report
            .references
            .iter()
            .all(|r| r.verdict == Verdict::Valid));
    }

    #[tokio::test]
    async fn test_special_sections_valid() {
        let report = detector()
            .detect(
                "q",
                "Cruelty under Section 498A of IPC and Article 21A and Section 66A of IT Act.",
                None,
            )
            .await;
        assert!(!report.has_hallucinations, "{:?}", report.suspected_fake_refs);
        assert_eq!(report.num_references, 3);
    }

    #[tokio::test]
    async fn test_statute_boundary_sections() {
        let d = detector();
        let valid = d
            .detect("q", "See Section 511 of IPC and Section 484 of CrPC.", None)
            .await;
        assert!(!valid.has_hallucinations);

        let invalid = d
            .detect("q", "See Section 512 of IPC and Section 485 of CrPC.", None)
            .await;
        assert_eq!(invalid.num_suspected, 2);
    }

    #[tokio::test]
    async fn test_all_statute_spellings_extracted() {
        let report = detector()
            .detect(
                "q",
                "IPC Section 420 applies; also s. 34 IPC and Section 138 of the CrPC.",
                None,
            )
            .await;
        assert_eq!(report.num_references, 3, "{:?}", report.references);
    }

    #[tokio::test]
    async fn test_evidence_and_cpc_tables() {
        let d = detector();
        let ok = d
            .detect("q", "Section 65 of the Evidence Act and Section 100 CPC.", None)
            .await;
        assert!(!ok.has_hallucinations, "{:?}", ok.suspected_fake_refs);

        let bad = d.detect("q", "Section 999 of the Evidence Act.", None).await;
        assert!(bad.has_hallucinations);
        assert!(bad.suspected_fake_refs[0].reason.contains("1-167"));
    }

    #[tokio::test]
    async fn test_no_references_is_clean() {
        let report = detector()
            .detect("q", "The parties should consider settlement.", None)
            .await;
        assert!(!report.has_hallucinations);
        assert_eq!(report.num_references, 0);
        assert!((report.confidence_score - 1.0).abs() < 1e-9);
        assert_eq!(report.summary, "No references found to validate");
    }

    #[tokio::test]
    async fn test_citation_without_retriever_is_unknown() {
        let report = detector()
            .detect("q", "As held in [2025] 9 S.C.R. 585 the rule stands.", None)
            .await;
        assert!(!report.has_hallucinations);
        assert_eq!(report.num_references, 1);
        assert_eq!(report.references[0].verdict, Verdict::Unknown);
    }

    #[tokio::test]
    async fn test_confidence_is_max_over_fakes() {
        // One statute fake (0.95) dominates a second weaker signal.
        let report = detector()
            .detect(
                "q",
                "Section 999 of IPC and also Section 700 of CrPC were cited.",
                None,
            )
            .await;
        assert_eq!(report.num_suspected, 2);
        assert!((report.confidence_score - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_citations_match_containment() {
        assert!(citations_match(
            "[2025] 9 S.C.R. 585",
            "[2025] 9 S.C.R. 585 : 2025 INSC 790"
        ));
        assert!(citations_match(
            "[2025]  9  s.c.r.  585",
            "[2025] 9 S.C.R. 585 : 2025 INSC 790"
        ));
    }

    #[test]
    fn test_citations_match_digit_overlap() {
        assert!(citations_match("2025 INSC 790", "[2025] 9 S.C.R. 585 : 2025 INSC 790"));
        assert!(!citations_match("[2020] 4 S.C.R. 999", "[2025] 9 S.C.R. 585"));
    }

    #[test]
    fn test_validate_statute_unknown_key() {
        let r = validate_statute("IPC", "Section  of IPC", "");
        assert_eq!(r.verdict, Verdict::Unknown);
    }
}
