//! On-disk vector index for judgment chunks.
//!
//! The index is a directory holding two files treated as one atomic
//! artifact:
//!
//! - `records.json` — the side-car chunk records (metadata + bodies)
//! - `vectors.bin` — the embedding matrix: `u32` count, `u32` dims, then
//!   row-major little-endian `f32` values
//!
//! Search is an exhaustive squared-L2 scan; vectors are unit-normalized at
//! embedding time, so the ordering matches cosine distance. Lower is closer
//! and distances are non-negative.
//!
//! Rebuilds are atomic: [`VectorIndex::save`] writes into `<dir>.tmp` and
//! renames it into place, so a crash mid-build leaves the previous index
//! intact. After ingestion the index is only ever replaced wholesale, never
//! mutated, which is what lets many readers share one loaded copy.

use std::path::Path;

use crate::error::{Error, Result};
use crate::models::ChunkRecord;

const RECORDS_FILE: &str = "records.json";
const VECTORS_FILE: &str = "vectors.bin";

/// In-memory vector index over chunk records.
#[derive(Debug)]
pub struct VectorIndex {
    dims: usize,
    records: Vec<ChunkRecord>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Create an empty index for vectors of the given dimensionality.
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            records: Vec::new(),
            vectors: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Append a chunk record with its embedding.
    ///
    /// Enforces the chunk invariants: non-empty body, page number within
    /// `[1, total_pages]`, and the configured embedding dimension.
    pub fn append(&mut self, record: ChunkRecord, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dims {
            return Err(Error::InvalidInput(format!(
                "embedding dimension {} does not match index dimension {}",
                vector.len(),
                self.dims
            )));
        }
        if record.body.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "chunk {} has an empty body",
                record.chunk_id
            )));
        }
        if record.page_number < 1 || record.page_number > record.total_pages {
            return Err(Error::InvalidInput(format!(
                "chunk {} page_number {} outside [1, {}]",
                record.chunk_id, record.page_number, record.total_pages
            )));
        }
        self.records.push(record);
        self.vectors.push(vector);
        Ok(())
    }

    /// Exhaustive nearest-neighbor search: returns up to `k` record indices
    /// with squared-L2 distances, ascending. Ties preserve insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if query.len() != self.dims || k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, squared_l2(query, v)))
            .collect();

        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }

    /// Get a record by the index returned from [`search`](Self::search).
    pub fn record(&self, idx: usize) -> Option<&ChunkRecord> {
        self.records.get(idx)
    }

    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    /// Persist the index into `dir` atomically: build `<dir>.tmp`, then swap
    /// it into place. The previous index survives any mid-write failure.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let tmp = dir.with_extension("tmp");
        if tmp.exists() {
            std::fs::remove_dir_all(&tmp)?;
        }
        std::fs::create_dir_all(&tmp)?;

        let records_json = serde_json::to_vec_pretty(&self.records)?;
        std::fs::write(tmp.join(RECORDS_FILE), records_json)?;

        let mut blob = Vec::with_capacity(8 + self.vectors.len() * self.dims * 4);
        blob.extend_from_slice(&(self.vectors.len() as u32).to_le_bytes());
        blob.extend_from_slice(&(self.dims as u32).to_le_bytes());
        for vector in &self.vectors {
            for value in vector {
                blob.extend_from_slice(&value.to_le_bytes());
            }
        }
        std::fs::write(tmp.join(VECTORS_FILE), blob)?;

        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }
        std::fs::rename(&tmp, dir)?;
        Ok(())
    }

    /// Load an index from its directory. Fails with
    /// [`Error::StorageUnavailable`] when the directory or either file is
    /// missing or inconsistent.
    pub fn load(dir: &Path) -> Result<Self> {
        let records_path = dir.join(RECORDS_FILE);
        let vectors_path = dir.join(VECTORS_FILE);
        if !records_path.exists() || !vectors_path.exists() {
            return Err(Error::StorageUnavailable(format!(
                "no vector index at {}",
                dir.display()
            )));
        }

        let records_json = std::fs::read(&records_path)?;
        let records: Vec<ChunkRecord> = serde_json::from_slice(&records_json)?;

        let blob = std::fs::read(&vectors_path)?;
        if blob.len() < 8 {
            return Err(Error::StorageUnavailable(
                "vector file truncated: missing header".into(),
            ));
        }
        let count = u32::from_le_bytes(blob[0..4].try_into().unwrap()) as usize;
        let dims = u32::from_le_bytes(blob[4..8].try_into().unwrap()) as usize;

        let expected = 8 + count * dims * 4;
        if blob.len() != expected || count != records.len() {
            return Err(Error::StorageUnavailable(format!(
                "vector file inconsistent: {} records, {} vectors of {} dims, {} bytes",
                records.len(),
                count,
                dims,
                blob.len()
            )));
        }

        let mut vectors = Vec::with_capacity(count);
        let mut offset = 8;
        for _ in 0..count {
            let mut vector = Vec::with_capacity(dims);
            for _ in 0..dims {
                vector.push(f32::from_le_bytes(
                    blob[offset..offset + 4].try_into().unwrap(),
                ));
                offset += 4;
            }
            vectors.push(vector);
        }

        Ok(Self {
            dims,
            records,
            vectors,
        })
    }
}

/// Squared L2 distance between two equal-length vectors.
fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
