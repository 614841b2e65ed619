//! Retrieval-mode properties over a controlled corpus: deduplication,
//! bounds, and ordering guarantees of the three similarity modes.

use std::sync::Arc;

use lexrag::embedding::{EmbeddingProvider, MockEmbeddings};
use lexrag::index::VectorIndex;
use lexrag::models::ChunkRecord;
use lexrag::retriever::Retriever;
use lexrag::similarity::SimilarityEngine;

const DIMS: usize = 128;

fn record(case: &str, citation: &str, ordinal: usize, body: &str) -> ChunkRecord {
    ChunkRecord {
        chunk_id: format!("{}-{}", case, ordinal),
        case_title: format!("{} v. State", case),
        citation: citation.to_string(),
        case_number: format!("Criminal Appeal No. {} of 2025", ordinal + 1),
        judges: vec![],
        section: "Analysis".into(),
        chunk_ordinal: ordinal,
        body: body.into(),
        page_number: (ordinal % 20) + 1,
        total_pages: 40,
        source_file: format!("{}.pdf", case),
        document_url: String::new(),
    }
}

/// Corpus for the dedup scenario: case X has 25 chunks about dowry
/// cruelty, case Y has 13, plus ten single-chunk unrelated cases.
async fn build_engine() -> SimilarityEngine {
    let provider = MockEmbeddings::new(DIMS);
    let mut index = VectorIndex::new(DIMS);

    let mut specs: Vec<(String, String, usize, &str)> = vec![
        (
            "X".into(),
            "[2025] 1 S.C.R. 10".into(),
            25,
            "dowry cruelty Section 498A allegations",
        ),
        (
            "Y".into(),
            "[2025] 2 S.C.R. 20".into(),
            13,
            "dowry death presumption and cruelty",
        ),
    ];
    for i in 0..10 {
        specs.push((
            format!("Z{}", i),
            format!("[2024] {} S.C.R. {}", i + 1, 100 + i),
            1,
            "unrelated commercial arbitration",
        ));
    }

    for (case, citation, n, topic) in &specs {
        for i in 0..*n {
            let body = format!("{} discussion point {} in case {}", topic, i, case);
            let vector = provider.embed(&[body.clone()]).await.unwrap().remove(0);
            index
                .append(record(case, citation, i, &body), vector)
                .unwrap();
        }
    }

    let retriever = Retriever::with_index(Arc::new(MockEmbeddings::new(DIMS)), Arc::new(index));
    SimilarityEngine::new(Arc::new(retriever))
}

#[tokio::test]
async fn mode_a_dedup_collapses_multi_chunk_cases() {
    let engine = build_engine().await;

    // Cases X (25 chunks) and Y (13 chunks) dominate the 30-candidate
    // window for this query, so k=10 yields exactly those two distinct
    // cases: the shortfall is reported, never padded.
    let matches = engine
        .find_similar_cases("dowry cruelty allegations", 10)
        .await
        .unwrap();
    assert_eq!(matches.len(), 2);

    let keys: Vec<&str> = matches.iter().map(|m| m.citation.as_str()).collect();
    assert!(keys.contains(&"[2025] 1 S.C.R. 10"));
    assert!(keys.contains(&"[2025] 2 S.C.R. 20"));

    for pair in matches.windows(2) {
        assert!(pair[0].similarity_score <= pair[1].similarity_score);
    }
}

#[tokio::test]
async fn mode_a_fills_k_when_enough_distinct_cases() {
    // Twelve single-chunk cases sharing the query topic: k=10 returns
    // exactly 10 distinct case keys.
    let provider = MockEmbeddings::new(DIMS);
    let mut index = VectorIndex::new(DIMS);
    for i in 0..12 {
        let case = format!("W{}", i);
        let citation = format!("[2023] {} S.C.R. {}", i + 1, 500 + i);
        let body = format!("trademark passing off injunction variant {}", i);
        let vector = provider.embed(&[body.clone()]).await.unwrap().remove(0);
        index
            .append(record(&case, &citation, 0, &body), vector)
            .unwrap();
    }
    let retriever = Retriever::with_index(Arc::new(MockEmbeddings::new(DIMS)), Arc::new(index));
    let engine = SimilarityEngine::new(Arc::new(retriever));

    let matches = engine
        .find_similar_cases("trademark passing off injunction", 10)
        .await
        .unwrap();
    assert_eq!(matches.len(), 10);

    let mut keys: Vec<String> = matches.iter().map(|m| m.citation.clone()).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 10, "case keys must be distinct");
}

#[tokio::test]
async fn mode_a_shortfall_is_reported_not_padded() {
    let engine = build_engine().await;

    // Only 12 distinct cases exist in the corpus; within the 3k candidate
    // window fewer may appear, and the result never pads.
    let matches = engine
        .find_similar_cases("dowry cruelty allegations", 50)
        .await
        .unwrap();
    assert!(matches.len() <= 12);
    let mut keys: Vec<String> = matches.iter().map(|m| m.citation.clone()).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), matches.len());
}

#[tokio::test]
async fn mode_b_returns_exactly_min_k_corpus() {
    let engine = build_engine().await;

    let hits = engine
        .find_similar_chunks("dowry cruelty allegations", 30)
        .await
        .unwrap();
    assert_eq!(hits.len(), 30);
    for pair in hits.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }

    let all = engine
        .find_similar_chunks("dowry cruelty allegations", 1000)
        .await
        .unwrap();
    assert_eq!(all.len(), 48); // 25 + 13 + 10 chunks in the corpus
}

#[tokio::test]
async fn mode_c_group_bounds_and_ordering() {
    let engine = build_engine().await;

    let groups = engine
        .find_grouped("dowry cruelty allegations", 3, 4)
        .await
        .unwrap();

    assert!(groups.len() <= 3);
    for group in &groups {
        assert!(!group.chunks.is_empty());
        assert!(group.chunks.len() <= 4);
        for chunk in &group.chunks {
            assert_eq!(chunk.record.case_key(), group.case_key);
        }
        for pair in group.chunks.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
        assert!((group.best_distance - group.chunks[0].distance).abs() < 1e-6);
    }
    for pair in groups.windows(2) {
        assert!(pair[0].best_distance <= pair[1].best_distance);
    }

    // The dominant case contributes its full quota.
    assert_eq!(groups[0].chunks.len(), 4);
}

#[tokio::test]
async fn output_is_deterministic_across_runs() {
    let engine = build_engine().await;

    let a = engine
        .find_similar_cases("dowry cruelty allegations", 8)
        .await
        .unwrap();
    let b = engine
        .find_similar_cases("dowry cruelty allegations", 8)
        .await
        .unwrap();

    let keys_a: Vec<&str> = a.iter().map(|m| m.citation.as_str()).collect();
    let keys_b: Vec<&str> = b.iter().map(|m| m.citation.as_str()).collect();
    assert_eq!(keys_a, keys_b);
}
