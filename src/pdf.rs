//! PDF parsing and judgment metadata extraction.
//!
//! Extraction is citation-grade: the parser keeps per-page texts so the
//! ingestion pipeline can attach a page number to every chunk, and pulls
//! the citation, case title, case number, and bench from the opening pages.
//! Fields that cannot be extracted stay empty; nothing is fabricated.
//!
//! Citation forms recognized on the first page:
//!
//! ```text
//! [2025] 9 S.C.R. 585          (S.C.R. report citation)
//! 2025 INSC 790                (neutral citation)
//! [2025] 9 S.C.R. 585 : 2025 INSC 790   (both on one line, joined)
//! ```

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::models::{JudgmentMetadata, ParsedJudgment};

static SCR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[\d{4}\]\s*\d+\s*S\.C\.R\.\s*\d+").unwrap());

static INSC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\d{4}\s*INSC\s*\d+").unwrap());

static TITLE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(.{2,120}?)\s+[vV]s?\.\s+(.{2,120}?)\s*$").unwrap()
});

static TITLE_INLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)INSC\s+\d+\s+(.+?)\s+vs?\.?\s+(.+?)(?:\s*\()").unwrap()
});

static CASE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\(((?:Civil Appeal|Criminal Appeal|Writ Petition|Special Leave Petition|SLP|Transfer Petition|Review Petition|Contempt Petition|Original Suit)[^)]*No\.?(?:\(s\))?\.?\s+[\d\-]+[^)]*)\)",
    )
    .unwrap()
});

static BENCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+?),?\s*\*?\s*JJ?\.\]").unwrap());

static JUDGE_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Hon'?ble\s+|Justice\s+|\bJ\.\s*$").unwrap());

/// Parse a judgment PDF from a file path.
pub fn parse_file(path: &Path) -> Result<ParsedJudgment> {
    let bytes = std::fs::read(path)
        .map_err(|e| Error::Parse(format!("cannot read {}: {}", path.display(), e)))?;
    parse_bytes(&bytes, &path.display().to_string())
}

/// Parse a judgment PDF from raw bytes. `name` is used in error messages.
pub fn parse_bytes(bytes: &[u8], name: &str) -> Result<ParsedJudgment> {
    let pages = extract_pages(bytes)
        .map_err(|e| Error::Parse(format!("PDF extraction failed for {}: {}", name, e)))?;

    let full_text = pages.join("\n\n");
    if full_text.trim().is_empty() {
        return Err(Error::EmptyDocument(name.to_string()));
    }

    // Judge names sometimes spill onto the second page.
    let mut head = pages[0].clone();
    if let Some(second) = pages.get(1) {
        head.push('\n');
        head.push_str(&second.chars().take(500).collect::<String>());
    }

    let metadata = extract_metadata(&head);

    Ok(ParsedJudgment {
        full_text,
        pages,
        metadata,
    })
}

/// Extract per-page texts from PDF bytes.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<String>> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| Error::Parse(e.to_string()))?;
    Ok(pages)
}

/// Extract all metadata from the head of a judgment.
pub fn extract_metadata(head_text: &str) -> JudgmentMetadata {
    JudgmentMetadata {
        citation: extract_citation(head_text),
        case_title: extract_case_title(head_text),
        case_number: extract_case_number(head_text),
        judges: extract_judges(head_text),
    }
}

/// Extract the case citation. When both the S.C.R. and INSC forms appear,
/// they are joined with `:`. Returns an empty string when neither is found.
pub fn extract_citation(text: &str) -> String {
    let combined = flatten(text);

    let scr = SCR_RE.find(&combined).map(|m| normalize_ws(m.as_str()));
    let insc = INSC_RE.find(&combined).map(|m| normalize_ws(m.as_str()));

    match (scr, insc) {
        (Some(s), Some(i)) => format!("{} : {}", s, i),
        (Some(s), None) => s,
        (None, Some(i)) => i,
        (None, None) => String::new(),
    }
}

/// Extract the case title: the first line of the form `<Party> v. <Party>`,
/// falling back to the inline form following the INSC citation.
pub fn extract_case_title(text: &str) -> String {
    for line in text.lines().take(40) {
        if let Some(caps) = TITLE_LINE_RE.captures(line.trim()) {
            let left = caps.get(1).unwrap().as_str().trim();
            let right = caps.get(2).unwrap().as_str().trim();
            if !left.is_empty() && !right.is_empty() {
                return format!("{} v. {}", left, right);
            }
        }
    }

    let combined = flatten(text);
    if let Some(caps) = TITLE_INLINE_RE.captures(&combined) {
        return format!(
            "{} v. {}",
            caps.get(1).unwrap().as_str().trim(),
            caps.get(2).unwrap().as_str().trim()
        );
    }

    String::new()
}

/// Extract the case number: the first parenthesized `<Kind> No. N of YYYY`
/// group.
pub fn extract_case_number(text: &str) -> String {
    let combined = flatten(text);
    CASE_NUMBER_RE
        .captures(&combined)
        .map(|caps| normalize_ws(caps.get(1).unwrap().as_str()))
        .unwrap_or_default()
}

/// Extract judge names from the `[Name1 and Name2, JJ.]` bench bracket.
pub fn extract_judges(text: &str) -> Vec<String> {
    let combined = flatten(text);
    let Some(caps) = BENCH_RE.captures(&combined) else {
        return Vec::new();
    };

    let bench = caps.get(1).unwrap().as_str();
    let mut judges = Vec::new();

    for part in bench.split(',') {
        for name in split_on_and(part) {
            let name = JUDGE_PREFIX_RE.replace_all(&name, "");
            let name = name.replace('*', "");
            let name = name.trim().trim_matches(',').trim();
            if name.len() > 2 && !matches!(name.to_lowercase().as_str(), "jr" | "sr" | "ii" | "iii")
            {
                judges.push(name.to_string());
            }
        }
    }

    judges
}

fn split_on_and(part: &str) -> Vec<String> {
    static AND_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\s+and\s+").unwrap());
    AND_RE.split(part).map(|s| s.trim().to_string()).collect()
}

fn flatten(text: &str) -> String {
    text.lines().collect::<Vec<_>>().join(" ")
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRST_PAGE: &str = "[2025] 9 S.C.R. 585 : 2025 INSC 790\n\
Railway Protection Force & Ors. v. Prem Chand Kumar & Ors.\n\
(Civil Appeal No. 11716 of 2025)\n\
05 August 2025\n\
[Vikram Nath* and Sandeep Mehta, JJ.]\n\
Issue for Consideration\n\
Whether compassionate appointment claims survive delay.";

    #[test]
    fn test_extract_full_citation_joined() {
        assert_eq!(
            extract_citation(FIRST_PAGE),
            "[2025] 9 S.C.R. 585 : 2025 INSC 790"
        );
    }

    #[test]
    fn test_extract_citation_scr_only() {
        assert_eq!(
            extract_citation("As reported in [2024] 3 S.C.R. 101 the court held"),
            "[2024] 3 S.C.R. 101"
        );
    }

    #[test]
    fn test_extract_citation_insc_only() {
        assert_eq!(extract_citation("2023 INSC 456"), "2023 INSC 456");
    }

    #[test]
    fn test_extract_citation_missing_is_empty() {
        assert_eq!(extract_citation("No citation on this page"), "");
    }

    #[test]
    fn test_extract_citation_joins_across_lines() {
        let text = "[2025] 1 S.C.R. 1\nsomething\n2025 INSC 2";
        assert_eq!(extract_citation(text), "[2025] 1 S.C.R. 1 : 2025 INSC 2");
    }

    #[test]
    fn test_extract_title_from_line() {
        assert_eq!(
            extract_case_title(FIRST_PAGE),
            "Railway Protection Force & Ors. v. Prem Chand Kumar & Ors."
        );
    }

    #[test]
    fn test_extract_title_vs_form() {
        let text = "State of Punjab vs. Davinder Singh\n(Criminal Appeal No. 1 of 2024)";
        assert_eq!(extract_case_title(text), "State of Punjab v. Davinder Singh");
    }

    #[test]
    fn test_extract_title_missing_is_empty() {
        assert_eq!(extract_case_title("no parties here"), "");
    }

    #[test]
    fn test_extract_case_number() {
        assert_eq!(
            extract_case_number(FIRST_PAGE),
            "Civil Appeal No. 11716 of 2025"
        );
    }

    #[test]
    fn test_extract_case_number_plural_form() {
        let text = "(Criminal Appeal No(s). 3955-3956 of 2025)";
        assert_eq!(extract_case_number(text), "Criminal Appeal No(s). 3955-3956 of 2025");
    }

    #[test]
    fn test_extract_case_number_missing_is_empty() {
        assert_eq!(extract_case_number("(some other parenthetical)"), "");
    }

    #[test]
    fn test_extract_judges_from_bench_bracket() {
        let judges = extract_judges(FIRST_PAGE);
        assert_eq!(judges, vec!["Vikram Nath", "Sandeep Mehta"]);
    }

    #[test]
    fn test_extract_judges_three_on_bench() {
        let judges = extract_judges("[B.R. Gavai, Vikram Nath and Sandeep Mehta, JJ.]");
        assert_eq!(judges, vec!["B.R. Gavai", "Vikram Nath", "Sandeep Mehta"]);
    }

    #[test]
    fn test_extract_judges_missing_is_empty() {
        assert!(extract_judges("no bench bracket").is_empty());
    }

    #[test]
    fn test_parse_bytes_rejects_garbage() {
        let err = parse_bytes(b"not a pdf", "garbage.pdf").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
