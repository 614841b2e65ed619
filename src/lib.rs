//! # LexRAG
//!
//! **A legal research engine over a corpus of Supreme Court judgments.**
//!
//! Given a new case description (free text or PDF), LexRAG retrieves
//! semantically similar prior judgments, groups matches into per-case
//! bundles, produces a grounded multi-section analysis with an LLM, and
//! enforces end-to-end correctness through input validation, PII
//! redaction, and post-hoc reference validation. A session-oriented chat
//! layer lets a user interrogate the analysis, with every turn re-grounded
//! by retrieval.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────┐   ┌──────────────┐
//! │ PDF dir  │──▶│ Ingest pipeline    │──▶│ Vector index │
//! │ (+S3 up) │   │ parse→chunk→embed │   │ (directory)  │
//! └──────────┘   └───────────────────┘   └──────┬───────┘
//!                                               │
//!            ┌──────────────────────────────────┤
//!            ▼                                  ▼
//!   ┌────────────────┐                 ┌────────────────┐
//!   │ Analysis flow  │                 │ Chat sessions  │
//!   │ enforce→search │                 │ + page excerpts│
//!   │ →prompt→LLM    │                 │ from S3 PDFs   │
//!   │ →hallucination │                 └────────────────┘
//!   └────────────────┘
//! ```
//!
//! ## Query Flow
//!
//! 1. The **security enforcer** ([`enforcer`]) validates the input
//!    ([`validator`]) and redacts PII ([`redactor`]), writing one record to
//!    the append-only security audit log.
//! 2. The **similarity engine** ([`similarity`]) retrieves precedents in
//!    one of three modes: deduplicated cases, raw chunks, or per-case
//!    chunk bundles.
//! 3. The **prompt builder** ([`prompt`]) renders a grounded prompt whose
//!    context block carries citation, page number, section, and document
//!    URL for every hit.
//! 4. The **LLM client** ([`llm`]) produces the analysis; outages degrade
//!    to a deterministic precedent listing.
//! 5. The **hallucination detector** ([`hallucination`]) validates every
//!    statute, article, and citation the output references.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with environment overrides |
//! | [`models`] | Core data types: `ChunkRecord`, `RetrievalHit`, `CaseMatch` |
//! | [`pdf`] | PDF parsing and judgment metadata extraction |
//! | [`object_store`] | S3 client (SigV4) and document URL canonicalization |
//! | [`chunker`] | Header-based judgment chunker |
//! | [`embedding`] | Embedding provider trait and backends |
//! | [`index`] | On-disk vector index with atomic rebuild |
//! | [`ingest`] | Ingestion pipeline: PDFs → index |
//! | [`retriever`] | Top-k retrieval with full chunk metadata |
//! | [`similarity`] | Deduplicated / raw / grouped retrieval modes |
//! | [`excerpt`] | Query-time page excerpts from stored PDFs |
//! | [`prompt`] | Grounded prompt assembly and trimming |
//! | [`llm`] | Completion provider trait and backends |
//! | [`validator`] | Input validation (length, injection, XSS, SQL) |
//! | [`redactor`] | PII detection and placeholder redaction |
//! | [`enforcer`] | Security pipeline with audit logging |
//! | [`hallucination`] | Legal reference validation over LLM output |
//! | [`chat`] | Chat sessions with retrieval-grounded turns |
//! | [`analysis`] | End-to-end case analysis orchestration |
//! | [`server`] | JSON HTTP API (axum) |
//! | [`audit`] | Append-only JSONL audit writer |
//! | [`error`] | Crate-wide error type |

pub mod analysis;
pub mod audit;
pub mod chat;
pub mod chunker;
pub mod config;
pub mod embedding;
pub mod enforcer;
pub mod error;
pub mod excerpt;
pub mod hallucination;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod object_store;
pub mod pdf;
pub mod prompt;
pub mod redactor;
pub mod retriever;
pub mod server;
pub mod similarity;
pub mod validator;

pub use error::{Error, Result};
