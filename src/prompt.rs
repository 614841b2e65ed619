//! Grounded LLM prompt assembly.
//!
//! Every prompt has three named slots: a fixed system instruction that pins
//! the assistant's role and required Markdown output shape, a retrieval
//! context block listing each hit with citation-grade metadata, and the
//! sanitized user input (plus prior turns in chat).
//!
//! Trimming order when the context exceeds its budget: excerpt bodies
//! shrink first, then whole hits drop from the tail. Citation and URL
//! fields are never truncated.

use crate::models::RetrievalHit;

/// System instruction for case analysis. The output contract (section
/// names, per-precedent fields, verbatim URLs) is what the hallucination
/// detector and the UI downstream rely on.
pub const ANALYSIS_SYSTEM_INSTRUCTION: &str = r#"You are an expert legal case analyzer for lawyers working with Indian Supreme Court precedents.

A lawyer has provided details of their CURRENT CASE. Analyze the RETRIEVED PRECEDENTS and explain how each relates to the current case: the legal principles it establishes, why it is relevant, which arguments it supports, and direct quotes that apply. Always include page numbers and document links exactly as given in the context.

FORMAT YOUR RESPONSE IN MARKDOWN WITH THESE SECTIONS:

## Current Case Summary
[Brief summary of the legal issues in the current case]

## Similar Precedents Found
[Numbered list. For each precedent include: case title, citation, page number, why it is relevant, one direct quote, and the document URL verbatim.]

## Strategic Recommendations
[How the lawyer can use these precedents]

## All References
[Every cited case with its document URL]"#;

/// System instruction for chat turns. Adds the follow-up questions section
/// the chat engine parses out of the response.
pub const CHAT_SYSTEM_INSTRUCTION: &str = r#"You are a knowledgeable legal assistant helping discuss a legal case analysis.

Your role is to answer questions about the case clearly and accurately, provide relevant legal insights based on the precedents supplied in context, clarify legal concepts in plain English, and maintain a professional but conversational tone. Cite precedents with their citations and document links when applicable.

End every response with a section titled "Suggested Follow-up Questions" containing a numbered list of 3 specific questions that would deepen the analysis."#;

/// Lower bound below which excerpt bodies are not shrunk further; past
/// this point whole hits are dropped instead.
const MIN_EXCERPT_CHARS: usize = 200;

/// A retrieval hit plus an optional full-page excerpt that replaces the
/// chunk body in the prompt.
pub struct ContextHit {
    pub hit: RetrievalHit,
    pub page_excerpt: Option<String>,
}

impl ContextHit {
    pub fn from_hit(hit: RetrievalHit) -> Self {
        Self {
            hit,
            page_excerpt: None,
        }
    }

    fn excerpt(&self) -> &str {
        self.page_excerpt.as_deref().unwrap_or(&self.hit.record.body)
    }
}

/// Render the retrieval context block. `budget_chars` bounds the total
/// rendered size; metadata lines are exempt from trimming.
pub fn format_context(hits: &[ContextHit], budget_chars: usize) -> String {
    if hits.is_empty() {
        return String::new();
    }

    let mut excerpt_budget = budget_chars / hits.len().max(1);
    let mut included = hits.len();

    // Shrink excerpts toward the floor; when even floored excerpts blow the
    // budget, drop hits from the tail.
    loop {
        let rendered = render_entries(&hits[..included], excerpt_budget);
        if rendered.chars().count() <= budget_chars || included == 1 {
            return rendered;
        }
        if excerpt_budget > MIN_EXCERPT_CHARS {
            excerpt_budget = (excerpt_budget / 2).max(MIN_EXCERPT_CHARS);
        } else {
            included -= 1;
        }
    }
}

fn render_entries(hits: &[ContextHit], excerpt_budget: usize) -> String {
    let mut out = String::new();
    for (i, ctx) in hits.iter().enumerate() {
        let record = &ctx.hit.record;
        let excerpt = truncate_chars(ctx.excerpt(), excerpt_budget);

        out.push_str(&format!(
            "{}. {} — {} — page {} — section {}\n{}\n{}\n\n",
            i + 1,
            display_or(&record.case_title, "(untitled case)"),
            display_or(&record.citation, "(no citation)"),
            record.page_number,
            record.section,
            excerpt,
            display_or(&record.document_url, "(no document link)"),
        ));
    }
    out
}

/// Assemble the full analysis prompt.
pub fn build_analysis_prompt(case_text: &str, hits: &[ContextHit], budget_chars: usize) -> String {
    format!(
        "{}\n\nCURRENT CASE DETAILS:\n{}\n\nRETRIEVED SIMILAR PRECEDENTS:\n{}",
        ANALYSIS_SYSTEM_INSTRUCTION,
        case_text,
        format_context(hits, budget_chars),
    )
}

/// A prior conversation turn rendered into the chat prompt.
pub struct HistoryTurn {
    pub role: &'static str,
    pub content: String,
}

/// Assemble a chat turn prompt: system slot, originating case context,
/// retrieved precedents, prior turns, then the new user message.
pub fn build_chat_prompt(
    case_context: &str,
    hits: &[ContextHit],
    history: &[HistoryTurn],
    user_message: &str,
    budget_chars: usize,
) -> String {
    let mut parts = vec![CHAT_SYSTEM_INSTRUCTION.to_string()];

    if !case_context.trim().is_empty() {
        parts.push(format!("CASE UNDER DISCUSSION:\n{}", case_context));
    }

    if !hits.is_empty() {
        parts.push(format!(
            "RELEVANT PRECEDENTS:\n{}",
            format_context(hits, budget_chars)
        ));
    }

    if !history.is_empty() {
        let mut block = String::from("CONVERSATION HISTORY:");
        for turn in history {
            block.push_str(&format!("\n{}: {}", turn.role, turn.content));
        }
        parts.push(block);
    }

    parts.push(format!("User: {}\n\nAssistant:", user_message));
    parts.join("\n\n")
}

/// Parse the "Suggested Follow-up Questions" numbered list out of an LLM
/// response. Returns at most three questions.
pub fn parse_followup_questions(response: &str) -> Vec<String> {
    let mut questions = Vec::new();
    let mut in_section = false;

    for line in response.lines() {
        let trimmed = line.trim();
        if trimmed
            .to_lowercase()
            .contains("suggested follow-up questions")
        {
            in_section = true;
            continue;
        }
        if !in_section || trimmed.is_empty() {
            continue;
        }

        let starts_listed = trimmed
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '*');
        if starts_listed {
            let question = trimmed
                .trim_start_matches(|c: char| {
                    c.is_ascii_digit() || matches!(c, '.' | ')' | '-' | '*' | ' ')
                })
                .trim();
            if question.len() > 10 {
                questions.push(question.to_string());
            }
        } else if !questions.is_empty() {
            break;
        }
    }

    questions.truncate(3);
    questions
}

fn display_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}...", cut)
}
