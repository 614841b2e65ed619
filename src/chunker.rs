//! Header-based judgment chunker.
//!
//! Splits a judgment into `(section_header, body)` pairs keyed by the
//! recognized section headers of Supreme Court judgments. A header line owns
//! the following text until the next header. Sections larger than
//! `max_chunk_size` are subdivided at paragraph boundaries, then sentence
//! boundaries, then a hard character limit, preserving header attribution on
//! every piece (`Held (Part 2)` etc.).
//!
//! Concatenating all chunk bodies in order recovers the original text up to
//! whitespace: header lines stay inside the body of the section they open.

use regex::Regex;
use std::sync::LazyLock;

/// A header-attributed chunk of a judgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionChunk {
    pub header: String,
    pub body: String,
}

/// Section headers recognized in Supreme Court judgments. A line starting
/// with one of these (case-insensitively) opens a new section.
const SECTION_HEADERS: &[&str] = &[
    r"Issue for Consideration",
    r"Headnotes",
    r"Held:?",
    r"List of Acts",
    r"List of Keywords",
    r"Case Arising From",
    r"Case Law Cited",
    r"Appearances for Parties",
    r"Judgment\s*/\s*Order of the Supreme Court",
    r"Judgment$",
    r"Order$",
    r"Conclusion",
    r"Facts",
    r"Analysis",
    r"Reasoning",
    r"Background",
    r"Submissions?",
    r"Discussion",
    r"Ratio Decidendi",
    r"Obiter Dicta",
];

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = SECTION_HEADERS.join("|");
    Regex::new(&format!(r"(?i)^(?:{})", alternation)).unwrap()
});

static SENTENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+(?:\s+|$)").unwrap());

static ABBREV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:dr|mr|mrs|ms|hon|no|nos|vs|v|s|ss|art|cl|pp|e\.g|i\.e)\.$").unwrap()
});

/// Header attributed to text before the first recognized header, and to
/// judgments with no recognized header at all.
const IMPLICIT_HEADER: &str = "Body";

/// Split a judgment into header-attributed, size-bounded chunks.
///
/// Empty and whitespace-only chunks are dropped. Every returned body is at
/// most `max_chunk_size` characters.
pub fn chunk_judgment(text: &str, max_chunk_size: usize) -> Vec<SectionChunk> {
    let sections = split_by_headers(text);

    let mut chunks = Vec::new();
    for (header, body) in sections {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.chars().count() <= max_chunk_size {
            chunks.push(SectionChunk {
                header,
                body: trimmed.to_string(),
            });
            continue;
        }

        let pieces = split_oversized(trimmed, max_chunk_size);
        let multi = pieces.len() > 1;
        for (i, piece) in pieces.into_iter().enumerate() {
            let header = if multi {
                format!("{} (Part {})", header, i + 1)
            } else {
                header.clone()
            };
            chunks.push(SectionChunk {
                header,
                body: piece,
            });
        }
    }

    chunks
}

/// Split text into `(header, body)` sections at recognized header lines.
/// The header line itself stays at the start of its section body so that
/// concatenation reproduces the document.
fn split_by_headers(text: &str) -> Vec<(String, String)> {
    let mut sections: Vec<(String, Vec<&str>)> = Vec::new();
    let mut current_header = IMPLICIT_HEADER.to_string();
    let mut current_lines: Vec<&str> = Vec::new();

    for line in text.lines() {
        let stripped = line.trim();
        if HEADER_RE.is_match(stripped) {
            if current_lines.iter().any(|l| !l.trim().is_empty()) {
                sections.push((current_header.clone(), std::mem::take(&mut current_lines)));
            } else {
                current_lines.clear();
            }
            current_header = stripped.to_string();
        }
        current_lines.push(line);
    }
    if current_lines.iter().any(|l| !l.trim().is_empty()) {
        sections.push((current_header, current_lines));
    }

    sections
        .into_iter()
        .map(|(h, lines)| (h, lines.join("\n")))
        .collect()
}

/// Subdivide an oversized section: paragraphs packed into buffers, with
/// sentence and hard-limit fallbacks for paragraphs that alone exceed the
/// limit.
fn split_oversized(text: &str, max_chunk_size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut buf = String::new();

    for para in text.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }

        let would_be = if buf.is_empty() {
            para.chars().count()
        } else {
            buf.chars().count() + 2 + para.chars().count()
        };

        if would_be > max_chunk_size && !buf.is_empty() {
            pieces.push(std::mem::take(&mut buf));
        }

        if para.chars().count() > max_chunk_size {
            if !buf.is_empty() {
                pieces.push(std::mem::take(&mut buf));
            }
            pieces.extend(split_sentences(para, max_chunk_size));
        } else {
            if !buf.is_empty() {
                buf.push_str("\n\n");
            }
            buf.push_str(para);
        }
    }

    if !buf.is_empty() {
        pieces.push(buf);
    }
    pieces
}

/// Pack sentences into pieces of at most `max_chunk_size` characters; a
/// single sentence over the limit is split at the hard character boundary.
fn split_sentences(text: &str, max_chunk_size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut buf = String::new();

    for (start, end) in sentence_spans(text) {
        let sentence = text[start..end].trim();
        if sentence.is_empty() {
            continue;
        }

        if buf.chars().count() + sentence.chars().count() + 1 > max_chunk_size && !buf.is_empty() {
            pieces.push(std::mem::take(&mut buf));
        }

        if sentence.chars().count() > max_chunk_size {
            if !buf.is_empty() {
                pieces.push(std::mem::take(&mut buf));
            }
            pieces.extend(hard_split(sentence, max_chunk_size));
        } else {
            if !buf.is_empty() {
                buf.push(' ');
            }
            buf.push_str(sentence);
        }
    }

    if !buf.is_empty() {
        pieces.push(buf);
    }
    pieces
}

/// Find sentence boundaries, skipping common legal abbreviations and
/// decimal points.
fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut last_end = 0;

    for mat in SENTENCE_RE.find_iter(text) {
        let end = mat.end();
        let candidate = &text[last_end..end];

        if ABBREV_RE.is_match(candidate.trim_end()) {
            continue;
        }
        let before = mat.start();
        if before > 0
            && text[..before]
                .chars()
                .last()
                .is_some_and(|c| c.is_ascii_digit())
        {
            continue;
        }

        spans.push((last_end, end));
        last_end = end;
    }

    if last_end < text.len() && !text[last_end..].trim().is_empty() {
        spans.push((last_end, text.len()));
    }
    spans
}

/// Split at the hard character limit on char boundaries, preferring a
/// nearby space.
fn hard_split(text: &str, max_chunk_size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.chars().count() <= max_chunk_size {
            pieces.push(remaining.to_string());
            break;
        }
        let byte_limit = remaining
            .char_indices()
            .nth(max_chunk_size)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let split_at = remaining[..byte_limit]
            .rfind(' ')
            .map(|pos| pos + 1)
            .unwrap_or(byte_limit);
        let split_at = if split_at == 0 { byte_limit } else { split_at };
        pieces.push(remaining[..split_at].trim_end().to_string());
        remaining = &remaining[split_at..];
    }
    pieces
}
