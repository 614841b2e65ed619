//! Ingestion pipeline: PDFs → parsed judgments → chunks → embeddings → index.
//!
//! For each PDF in the corpus directory:
//!
//! 1. Parse text, per-page texts, and citation metadata ([`crate::pdf`]).
//! 2. Optionally upload the source PDF to the object store and record the
//!    canonical `s3://` URL on every chunk.
//! 3. Chunk the full text by section header ([`crate::chunker`]).
//! 4. Assign each chunk the first page whose text contains the chunk's
//!    opening 100 characters; page 1 with a warning when no page matches.
//! 5. Embed chunk bodies in batches and append to the index.
//!
//! The finished index is written into a scratch directory and swapped into
//! place, so a failed run leaves the previous index intact. A single PDF
//! failing to parse skips that file; the summary lists every failure.

use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::chunker::chunk_judgment;
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::models::{ChunkRecord, ParsedJudgment};
use crate::object_store::ObjectStoreClient;
use crate::pdf;

/// Outcome of one ingestion run.
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub pdfs_processed: usize,
    pub chunks_indexed: usize,
    pub uploads: usize,
    /// `(file name, error message)` for every skipped PDF.
    pub failures: Vec<(String, String)>,
}

/// Ingest every PDF under the configured corpus directory and atomically
/// replace the vector index.
pub async fn run_ingest(
    config: &Config,
    provider: &dyn EmbeddingProvider,
    store: Option<&ObjectStoreClient>,
) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();
    let mut index = VectorIndex::new(provider.dims());

    let mut pdf_paths: Vec<_> = WalkDir::new(&config.corpus.pdf_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .map(|e| e.into_path())
        .collect();
    pdf_paths.sort();

    info!(count = pdf_paths.len(), dir = %config.corpus.pdf_dir.display(), "starting ingestion");

    for path in &pdf_paths {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        match ingest_one(config, provider, store, path, &file_name, &mut index).await {
            Ok((chunks, uploaded)) => {
                summary.pdfs_processed += 1;
                summary.chunks_indexed += chunks;
                if uploaded {
                    summary.uploads += 1;
                }
                info!(file = %file_name, chunks, "ingested");
            }
            Err(e) => {
                warn!(file = %file_name, error = %e, "skipping PDF");
                summary.failures.push((file_name, e.to_string()));
            }
        }
    }

    index.save(&config.index.dir)?;
    info!(
        chunks = summary.chunks_indexed,
        failures = summary.failures.len(),
        dir = %config.index.dir.display(),
        "index written"
    );

    Ok(summary)
}

/// Parse, upload, chunk, embed, and append one PDF. Returns the chunk count
/// and whether an upload happened.
async fn ingest_one(
    config: &Config,
    provider: &dyn EmbeddingProvider,
    store: Option<&ObjectStoreClient>,
    path: &Path,
    file_name: &str,
    index: &mut VectorIndex,
) -> Result<(usize, bool)> {
    let parsed = pdf::parse_file(path)?;

    let mut document_url = String::new();
    let mut uploaded = false;
    if let Some(store) = store {
        let key = format!("{}/{}.pdf", config.object_store.key_prefix, Uuid::new_v4());
        document_url = store.upload(path, &key).await?;
        uploaded = true;
    }

    let records = build_chunk_records(
        &parsed,
        file_name,
        &document_url,
        config.chunking.max_chunk_size,
    );
    if records.is_empty() {
        return Ok((0, uploaded));
    }

    let bodies: Vec<String> = records.iter().map(|r| r.body.clone()).collect();
    let vectors = provider.embed(&bodies).await?;

    let count = records.len();
    for (record, vector) in records.into_iter().zip(vectors) {
        index.append(record, vector)?;
    }

    Ok((count, uploaded))
}

/// Chunk a parsed judgment and assemble full chunk records with page
/// numbers and ordinals.
pub fn build_chunk_records(
    parsed: &ParsedJudgment,
    source_file: &str,
    document_url: &str,
    max_chunk_size: usize,
) -> Vec<ChunkRecord> {
    let chunks = chunk_judgment(&parsed.full_text, max_chunk_size);
    let total_pages = parsed.pages.len().max(1);

    chunks
        .into_iter()
        .enumerate()
        .map(|(ordinal, chunk)| {
            let page_number = locate_page(&chunk.body, &parsed.pages).unwrap_or_else(|| {
                warn!(
                    file = source_file,
                    ordinal, "chunk prefix not found on any page, defaulting to page 1"
                );
                1
            });

            ChunkRecord {
                chunk_id: Uuid::new_v4().to_string(),
                case_title: parsed.metadata.case_title.clone(),
                citation: parsed.metadata.citation.clone(),
                case_number: parsed.metadata.case_number.clone(),
                judges: parsed.metadata.judges.clone(),
                section: chunk.header,
                chunk_ordinal: ordinal,
                body: chunk.body,
                page_number,
                total_pages,
                source_file: source_file.to_string(),
                document_url: document_url.to_string(),
            }
        })
        .collect()
}

/// Find the 1-indexed page on which a chunk begins: the first page whose
/// text contains the chunk's opening 100 characters. Comparison is
/// whitespace-insensitive because chunking re-joins wrapped lines.
fn locate_page(chunk_body: &str, pages: &[String]) -> Option<usize> {
    let needle: String = squash_ws(chunk_body).chars().take(100).collect();
    if needle.is_empty() {
        return None;
    }

    for (i, page) in pages.iter().enumerate() {
        if squash_ws(page).contains(&needle) {
            return Some(i + 1);
        }
    }
    None
}

fn squash_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
