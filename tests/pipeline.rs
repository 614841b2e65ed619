//! End-to-end ingestion and retrieval: PDF bytes → parse → chunk → embed →
//! index on disk → load → search.

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use lexrag::config::Config;
use lexrag::embedding::MockEmbeddings;
use lexrag::index::VectorIndex;
use lexrag::ingest::run_ingest;
use lexrag::pdf;
use lexrag::retriever::Retriever;
use lexrag::similarity::SimilarityEngine;

/// Minimal valid single-page PDF with one text line per input line. Builds
/// the body then the xref with correct byte offsets so pdf parsing
/// succeeds.
fn minimal_pdf_with_text(text: &str) -> Vec<u8> {
    let escape = |line: &str| {
        line.replace('\\', r"\\")
            .replace('(', r"\(")
            .replace(')', r"\)")
    };
    let mut stream = String::new();
    for (i, line) in text.lines().enumerate() {
        stream.push_str(&format!(
            "BT /F1 12 Tf 72 {} Td ({}) Tj ET\n",
            720 - i * 16,
            escape(line)
        ));
    }
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!("4 0 obj << /Length {} >> stream\n{}endstream endobj\n", stream.len(), stream)
            .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn test_config(root: &TempDir) -> Config {
    let mut config: Config = toml::from_str(
        r#"
        [embedding]
        provider = "mock"
        dims = 128
        "#,
    )
    .unwrap();
    config.corpus.pdf_dir = root.path().join("pdfs");
    config.index.dir = root.path().join("index");
    config.security.audit_dir = root.path().join("audit");
    config
}

fn write_pdf(dir: &PathBuf, name: &str, text: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), minimal_pdf_with_text(text)).unwrap();
}

#[test]
fn parse_minimal_pdf_extracts_page_text() {
    let bytes = minimal_pdf_with_text("compassionate appointment claim by dependent");
    let parsed = pdf::parse_bytes(&bytes, "test.pdf").unwrap();
    assert_eq!(parsed.pages.len(), 1);
    assert!(parsed.full_text.contains("compassionate appointment"));
}

#[tokio::test]
async fn ingest_then_search_roundtrip() {
    let root = TempDir::new().unwrap();
    let config = test_config(&root);
    let pdf_dir = config.corpus.pdf_dir.clone();

    write_pdf(&pdf_dir, "bail.pdf", "anticipatory bail granted for economic offences");
    write_pdf(&pdf_dir, "land.pdf", "land acquisition compensation enhanced on appeal");

    let provider = MockEmbeddings::new(128);
    let summary = run_ingest(&config, &provider, None).await.unwrap();
    assert_eq!(summary.pdfs_processed, 2);
    assert!(summary.chunks_indexed >= 2);
    assert!(summary.failures.is_empty());

    // The index directory is the atomic artifact pair.
    assert!(config.index.dir.join("records.json").exists());
    assert!(config.index.dir.join("vectors.bin").exists());

    let mut retriever = Retriever::new(Arc::new(MockEmbeddings::new(128)));
    retriever.load(&config.index.dir).unwrap();
    let hits = retriever
        .retrieve("anticipatory bail economic offences", 2)
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert!(hits[0].record.body.contains("bail"));
    assert!(hits[0].record.page_number >= 1);
    assert!(hits[0].record.page_number <= hits[0].record.total_pages);
}

#[tokio::test]
async fn unreadable_pdf_is_skipped_and_reported() {
    let root = TempDir::new().unwrap();
    let config = test_config(&root);
    let pdf_dir = config.corpus.pdf_dir.clone();

    write_pdf(&pdf_dir, "good.pdf", "cheque dishonour complaint under negotiable instruments");
    std::fs::write(pdf_dir.join("broken.pdf"), b"this is not a pdf at all").unwrap();

    let provider = MockEmbeddings::new(128);
    let summary = run_ingest(&config, &provider, None).await.unwrap();

    assert_eq!(summary.pdfs_processed, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].0, "broken.pdf");

    // The index still builds from the good file.
    let index = VectorIndex::load(&config.index.dir).unwrap();
    assert!(index.len() >= 1);
}

#[tokio::test]
async fn reingest_replaces_index_atomically() {
    let root = TempDir::new().unwrap();
    let config = test_config(&root);
    let pdf_dir = config.corpus.pdf_dir.clone();

    write_pdf(&pdf_dir, "first.pdf", "first corpus document about service law");
    let provider = MockEmbeddings::new(128);
    run_ingest(&config, &provider, None).await.unwrap();
    let first_len = VectorIndex::load(&config.index.dir).unwrap().len();

    write_pdf(&pdf_dir, "second.pdf", "second corpus document about tax assessment");
    run_ingest(&config, &provider, None).await.unwrap();

    let index = VectorIndex::load(&config.index.dir).unwrap();
    assert!(index.len() > first_len);
    assert!(!config.index.dir.with_extension("tmp").exists());
}

#[tokio::test]
async fn similarity_modes_work_over_ingested_corpus() {
    let root = TempDir::new().unwrap();
    let config = test_config(&root);
    let pdf_dir = config.corpus.pdf_dir.clone();

    write_pdf(
        &pdf_dir,
        "a.pdf",
        "[2025] 1 S.C.R. 100\nmurder trial circumstantial evidence chain",
    );
    write_pdf(
        &pdf_dir,
        "b.pdf",
        "[2025] 2 S.C.R. 200\nmurder conviction overturned on evidence gaps",
    );
    write_pdf(
        &pdf_dir,
        "c.pdf",
        "[2025] 3 S.C.R. 300\npartnership dissolution accounts settlement",
    );

    let provider = MockEmbeddings::new(128);
    run_ingest(&config, &provider, None).await.unwrap();

    let mut retriever = Retriever::new(Arc::new(MockEmbeddings::new(128)));
    retriever.load(&config.index.dir).unwrap();
    let engine = SimilarityEngine::new(Arc::new(retriever));

    let cases = engine
        .find_similar_cases("murder evidence", 3)
        .await
        .unwrap();
    assert!(!cases.is_empty());
    for pair in cases.windows(2) {
        assert!(pair[0].similarity_score <= pair[1].similarity_score);
    }
    // Case keys in Mode A output are distinct.
    let mut keys: Vec<&str> = cases.iter().map(|c| c.citation.as_str()).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), cases.len());

    let groups = engine.find_grouped("murder evidence", 2, 2).await.unwrap();
    assert!(groups.len() <= 2);
    for group in &groups {
        assert!(group.chunks.len() <= 2);
    }
}
