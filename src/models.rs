//! Core data models used throughout lexrag.
//!
//! These types represent the judgments, chunks, and retrieval results that
//! flow through the ingestion and query pipelines. The data lifecycle is:
//!
//! ```text
//! PDF → ParsedJudgment → chunk() → ChunkRecord (+ embedding) → VectorIndex
//!                                                      ↓
//!                                            retrieve() → RetrievalHit
//!                                                      ↓
//!                             Mode A → CaseMatch   Mode C → GroupedCase
//! ```
//!
//! # Type Relationships
//!
//! - A **[`ParsedJudgment`]** is the raw output of the PDF parser: full text,
//!   individual page texts, and extracted [`JudgmentMetadata`].
//! - A **[`ChunkRecord`]** is a bounded, header-attributed unit of a judgment,
//!   the atom of indexing and retrieval. Records are created only by the
//!   ingestion pipeline and are immutable until the corpus is rebuilt.
//! - A **[`RetrievalHit`]** is a chunk plus a distance score for one query.
//!   Scores are comparable only within the same query.
//! - A **[`CaseMatch`]** is the deduplicated best hit for one case.
//! - A **[`GroupedCase`]** is a case plus an ordered, size-bounded subset of
//!   its hits.

use serde::{Deserialize, Serialize};

/// Metadata extracted from the first pages of a judgment PDF.
///
/// Fields that cannot be extracted are left empty, never fabricated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JudgmentMetadata {
    /// Canonical citation, e.g. `[2025] 9 S.C.R. 585 : 2025 INSC 790`.
    pub citation: String,
    /// Case title, e.g. `Railway Protection Force v. Prem Chand Kumar`.
    pub case_title: String,
    /// Case number, e.g. `Civil Appeal No. 11716 of 2025`.
    pub case_number: String,
    /// Judge names extracted from the bench line, if present.
    pub judges: Vec<String>,
}

/// A parsed judgment: concatenated text plus per-page texts and metadata.
///
/// Per-page texts are preserved individually so the ingestion pipeline can
/// assign a page number to every chunk.
#[derive(Debug, Clone)]
pub struct ParsedJudgment {
    /// All pages joined with blank lines.
    pub full_text: String,
    /// Text of each page, in order. 0-based; page numbers are 1-based.
    pub pages: Vec<String>,
    /// Extracted citation/title/number/judges.
    pub metadata: JudgmentMetadata,
}

/// A chunk of a judgment stored in the vector index.
///
/// Invariants:
/// - `body` is non-empty and `document_url` resolves to a fetchable object
///   (when an object store is configured).
/// - `1 <= page_number <= total_pages`.
/// - `(case_key, chunk_ordinal)` is unique within the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Opaque chunk id (UUID v4).
    pub chunk_id: String,
    /// Case title from the source judgment.
    pub case_title: String,
    /// Canonical citation; empty when none was found.
    pub citation: String,
    /// Case number; empty when none was found.
    pub case_number: String,
    /// Judges on the bench, when extracted.
    #[serde(default)]
    pub judges: Vec<String>,
    /// Section header this chunk belongs to (e.g. `Held`, `Facts`).
    pub section: String,
    /// Position of this chunk within its case, in traversal order.
    pub chunk_ordinal: usize,
    /// Chunk text body.
    pub body: String,
    /// 1-indexed page on which the chunk begins.
    pub page_number: usize,
    /// Total pages of the source PDF.
    pub total_pages: usize,
    /// Source file name the chunk came from.
    pub source_file: String,
    /// Stable document URL (`s3://bucket/key`); empty when uploads are off.
    pub document_url: String,
}

impl ChunkRecord {
    /// The grouping key for case-level deduplication: citation when present,
    /// otherwise title + number.
    pub fn case_key(&self) -> String {
        if !self.citation.is_empty() {
            self.citation.clone()
        } else {
            format!("{} / {}", self.case_title, self.case_number)
        }
    }
}

/// A chunk returned by the retriever, with its distance for one query.
///
/// Distances are non-negative; lower is closer. Scores from different
/// queries must not be compared.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalHit {
    /// The matched chunk with full metadata.
    pub record: ChunkRecord,
    /// Distance to the query vector (lower = closer).
    pub distance: f32,
    /// The query text that produced this hit.
    pub query: String,
}

/// Deduplicated best hit for one case (similarity Mode A output).
#[derive(Debug, Clone, Serialize)]
pub struct CaseMatch {
    pub case_title: String,
    pub citation: String,
    pub case_number: String,
    pub judges: Vec<String>,
    pub section: String,
    pub page_number: usize,
    pub chunk_id: String,
    pub document_url: String,
    pub similarity_score: f32,
    /// First 300 characters of the best-matching chunk.
    pub content_preview: String,
}

impl CaseMatch {
    pub fn from_hit(hit: &RetrievalHit) -> Self {
        Self {
            case_title: hit.record.case_title.clone(),
            citation: hit.record.citation.clone(),
            case_number: hit.record.case_number.clone(),
            judges: hit.record.judges.clone(),
            section: hit.record.section.clone(),
            page_number: hit.record.page_number,
            chunk_id: hit.record.chunk_id.clone(),
            document_url: hit.record.document_url.clone(),
            similarity_score: hit.distance,
            content_preview: preview(&hit.record.body, 300),
        }
    }
}

/// A case plus an ordered subset of its hits (similarity Mode C output).
///
/// Hits are ordered by ascending distance and bounded by
/// `max_chunks_per_case`; `best_distance` is the lowest distance in the group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupedCase {
    pub case_key: String,
    pub case_title: String,
    pub citation: String,
    pub case_number: String,
    pub document_url: String,
    pub best_distance: f32,
    pub chunks: Vec<RetrievalHit>,
}

/// Truncate text to at most `max` characters on a char boundary, appending
/// an ellipsis when shortened.
pub fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(citation: &str, title: &str, number: &str) -> ChunkRecord {
        ChunkRecord {
            chunk_id: "c1".into(),
            case_title: title.into(),
            citation: citation.into(),
            case_number: number.into(),
            judges: vec![],
            section: "Held".into(),
            chunk_ordinal: 0,
            body: "body".into(),
            page_number: 1,
            total_pages: 10,
            source_file: "a.pdf".into(),
            document_url: "s3://bucket/a.pdf".into(),
        }
    }

    #[test]
    fn test_case_key_prefers_citation() {
        let r = record("[2025] 1 S.C.R. 100", "A v. B", "Civil Appeal No. 1 of 2025");
        assert_eq!(r.case_key(), "[2025] 1 S.C.R. 100");
    }

    #[test]
    fn test_case_key_falls_back_to_title_and_number() {
        let r = record("", "A v. B", "Civil Appeal No. 1 of 2025");
        assert_eq!(r.case_key(), "A v. B / Civil Appeal No. 1 of 2025");
    }

    #[test]
    fn test_preview_truncates_with_ellipsis() {
        let long = "x".repeat(400);
        let p = preview(&long, 300);
        assert_eq!(p.chars().count(), 303);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn test_preview_short_text_unchanged() {
        assert_eq!(preview("short", 300), "short");
    }
}
