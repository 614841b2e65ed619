//! Case similarity engine: the three retrieval modes over the retriever.
//!
//! | Mode | Entry point | Shape |
//! |------|-------------|-------|
//! | A | [`SimilarityEngine::find_similar_cases`] | k distinct cases, best chunk each |
//! | B | [`SimilarityEngine::find_similar_chunks`] | raw top-k chunks, duplicates allowed |
//! | C | [`SimilarityEngine::find_grouped`] | k cases, up to m chunks each |
//!
//! Chunks of the same judgment dominate the raw neighbor list, so Mode A
//! over-fetches 3k chunks and keeps the best-scoring chunk per case key;
//! Mode C over-fetches `3 * k * m` and buckets hits per case. Equal
//! distances break by ascending chunk ordinal, then case key, so output is
//! a deterministic function of the index state and the query.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{CaseMatch, GroupedCase, RetrievalHit};
use crate::retriever::Retriever;

/// Similarity engine over a shared retriever handle.
///
/// The engine holds the retriever, never the reverse, so there is no
/// reference cycle between the two.
pub struct SimilarityEngine {
    retriever: Arc<Retriever>,
}

impl SimilarityEngine {
    pub fn new(retriever: Arc<Retriever>) -> Self {
        Self { retriever }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Mode A: up to `k` distinct cases, each represented by its
    /// best-scoring chunk. Returns fewer when the candidate window holds
    /// fewer distinct cases; the shortfall is never padded.
    pub async fn find_similar_cases(&self, query: &str, k: usize) -> Result<Vec<CaseMatch>> {
        let hits = self.find_similar_case_hits(query, k).await?;
        Ok(hits.iter().map(CaseMatch::from_hit).collect())
    }

    /// Mode A at the hit level: the deduplicated best chunk per case, with
    /// full chunk bodies. Used by the prompt builder, which needs more than
    /// the preview a [`CaseMatch`] carries.
    pub async fn find_similar_case_hits(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut hits = self.retriever.retrieve_with_scores(query, k * 3).await?;
        sort_hits(&mut hits);

        let mut order: Vec<String> = Vec::new();
        let mut best: HashMap<String, RetrievalHit> = HashMap::new();

        for hit in hits {
            let key = hit.record.case_key();
            match best.get(&key) {
                None => {
                    if order.len() < k {
                        order.push(key.clone());
                        best.insert(key, hit);
                        if order.len() == k {
                            break;
                        }
                    }
                }
                Some(existing) => {
                    if hit.distance < existing.distance {
                        best.insert(key, hit);
                    }
                }
            }
        }

        let mut deduped: Vec<RetrievalHit> = order
            .iter()
            .filter_map(|key| best.remove(key))
            .collect();
        sort_hits(&mut deduped);
        Ok(deduped)
    }

    /// Mode B: the raw top-k chunks, duplicates allowed.
    pub async fn find_similar_chunks(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        let mut hits = self.retriever.retrieve_with_scores(query, k).await?;
        sort_hits(&mut hits);
        Ok(hits)
    }

    /// Mode C: up to `k_cases` cases, each with its `max_chunks_per_case`
    /// best chunks, groups ordered by their best hit.
    pub async fn find_grouped(
        &self,
        query: &str,
        k_cases: usize,
        max_chunks_per_case: usize,
    ) -> Result<Vec<GroupedCase>> {
        if k_cases == 0 || max_chunks_per_case == 0 {
            return Ok(Vec::new());
        }

        let fetch = k_cases * max_chunks_per_case * 3;
        let mut hits = self.retriever.retrieve_with_scores(query, fetch).await?;
        sort_hits(&mut hits);

        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<RetrievalHit>> = HashMap::new();

        for hit in hits {
            let key = hit.record.case_key();
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            groups.entry(key).or_default().push(hit);
        }

        let mut cases: Vec<GroupedCase> = order
            .into_iter()
            .map(|key| {
                let mut chunks = groups.remove(&key).unwrap_or_default();
                sort_hits(&mut chunks);
                chunks.truncate(max_chunks_per_case);
                let first = &chunks[0].record;
                GroupedCase {
                    case_key: key,
                    case_title: first.case_title.clone(),
                    citation: first.citation.clone(),
                    case_number: first.case_number.clone(),
                    document_url: first.document_url.clone(),
                    best_distance: chunks[0].distance,
                    chunks,
                }
            })
            .collect();

        cases.sort_by(|a, b| {
            a.best_distance
                .partial_cmp(&b.best_distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.case_key.cmp(&b.case_key))
        });
        cases.truncate(k_cases);
        Ok(cases)
    }
}

/// Deterministic hit ordering: distance, then chunk ordinal, then case key.
fn sort_hits(hits: &mut [RetrievalHit]) {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.record.chunk_ordinal.cmp(&b.record.chunk_ordinal))
            .then_with(|| a.record.case_key().cmp(&b.record.case_key()))
    });
}
