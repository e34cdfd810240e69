//! In-memory vector index over embedded papers.
//!
//! Brute-force cosine similarity: vectors are L2-normalized on insert and
//! on query, so similarity is a plain dot product. The index is built fresh
//! every run and supports no update or delete.
//!
//! # Ordering
//!
//! [`VectorIndex::query`] sorts by descending similarity with a stable sort,
//! so equal scores keep insertion order. `k` is capped to the collection
//! size.

use thiserror::Error;

use crate::embedding::{dot, l2_normalize};
use crate::models::{EmbeddedRecord, PaperRecord};

#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("embedding vector is empty")]
    EmptyVector,

    #[error("dimension mismatch: index holds {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// A single query result.
#[derive(Debug, Clone)]
pub struct Hit<'a> {
    pub record: &'a PaperRecord,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub score: f32,
    /// Insertion position of the record.
    pub position: usize,
}

/// Append-only collection of [`EmbeddedRecord`]s.
#[derive(Debug, Default)]
pub struct VectorIndex {
    records: Vec<EmbeddedRecord>,
    dims: Option<usize>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Dimensionality fixed by the first insert, if any.
    pub fn dims(&self) -> Option<usize> {
        self.dims
    }

    /// Append a record. The first insert fixes the dimensionality; later
    /// inserts with a different length are rejected.
    pub fn insert(&mut self, record: PaperRecord, vector: &[f32]) -> Result<(), IndexError> {
        self.check_dims(vector.len())?;
        self.dims = Some(vector.len());
        self.records.push(EmbeddedRecord {
            record,
            vector: l2_normalize(vector),
        });
        Ok(())
    }

    /// Return the `k` records most similar to `vector`, best first.
    ///
    /// ```rust
    /// use paperweek_core::index::VectorIndex;
    /// # use paperweek_core::models::PaperRecord;
    /// # fn paper(id: &str) -> PaperRecord {
    /// #     PaperRecord { id: id.into(), title: id.into(), summary: String::new(),
    /// #         authors: vec![], source: "test".into(), published: None, url: String::new() }
    /// # }
    ///
    /// let mut index = VectorIndex::new();
    /// index.insert(paper("a"), &[1.0, 0.0]).unwrap();
    /// index.insert(paper("b"), &[0.0, 1.0]).unwrap();
    ///
    /// let hits = index.query(&[0.1, 0.9], 1).unwrap();
    /// assert_eq!(hits[0].record.id, "b");
    /// ```
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Hit<'_>>, IndexError> {
        if self.records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.check_dims(vector.len())?;

        let query = l2_normalize(vector);
        let mut hits: Vec<Hit<'_>> = self
            .records
            .iter()
            .enumerate()
            .map(|(position, stored)| {
                let score = dot(&query, &stored.vector);
                Hit {
                    record: &stored.record,
                    score: if score.is_nan() { f32::NEG_INFINITY } else { score },
                    position,
                }
            })
            .collect();

        // `sort_by` is stable: ties keep insertion order.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k.min(self.records.len()));
        Ok(hits)
    }

    fn check_dims(&self, actual: usize) -> Result<(), IndexError> {
        if actual == 0 {
            return Err(IndexError::EmptyVector);
        }
        match self.dims {
            Some(expected) if expected != actual => {
                Err(IndexError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(id: &str) -> PaperRecord {
        PaperRecord {
            id: id.to_string(),
            title: format!("Paper {}", id),
            summary: String::new(),
            authors: Vec::new(),
            source: "test".to_string(),
            published: None,
            url: String::new(),
        }
    }

    fn sample_vectors() -> Vec<Vec<f32>> {
        vec![
            vec![0.9, 0.1, 0.0, 0.3],
            vec![-0.2, 0.8, 0.5, 0.1],
            vec![0.0, 0.0, 1.0, 0.0],
            vec![0.4, 0.4, 0.4, 0.4],
            vec![-1.0, 0.2, -0.3, 0.7],
            vec![12.0, 3.0, -4.0, 0.5],
        ]
    }

    fn build_index() -> VectorIndex {
        let mut index = VectorIndex::new();
        for (i, v) in sample_vectors().iter().enumerate() {
            index.insert(paper(&i.to_string()), v).unwrap();
        }
        index
    }

    #[test]
    fn test_query_returns_owner_of_present_vector() {
        let index = build_index();
        for (i, v) in sample_vectors().iter().enumerate() {
            let hits = index.query(v, 1).unwrap();
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].record.id, i.to_string());
            assert!((hits[0].score - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_scores_non_increasing() {
        let index = build_index();
        let hits = index.query(&[0.3, -0.1, 0.7, 0.2], 4).unwrap();
        assert_eq!(hits.len(), 4);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_k_larger_than_collection_returns_everything() {
        let index = build_index();
        let hits = index.query(&[1.0, 0.0, 0.0, 0.0], 100).unwrap();
        assert_eq!(hits.len(), index.len());

        let mut positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        positions.sort_unstable();
        assert_eq!(positions, (0..index.len()).collect::<Vec<_>>());

        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut index = VectorIndex::new();
        index.insert(paper("first"), &[1.0, 0.0]).unwrap();
        index.insert(paper("other"), &[0.0, 1.0]).unwrap();
        index.insert(paper("second"), &[2.0, 0.0]).unwrap();
        index.insert(paper("third"), &[0.5, 0.0]).unwrap();

        let hits = index.query(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.record.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut index = VectorIndex::new();
        index.insert(paper("a"), &[1.0, 0.0, 0.0]).unwrap();
        assert_eq!(
            index.insert(paper("b"), &[1.0, 0.0]),
            Err(IndexError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(index.len(), 1);
        assert!(matches!(
            index.query(&[1.0], 1),
            Err(IndexError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_vector_rejected() {
        let mut index = VectorIndex::new();
        assert_eq!(index.insert(paper("a"), &[]), Err(IndexError::EmptyVector));
        assert!(index.is_empty());
        assert_eq!(index.dims(), None);
    }

    #[test]
    fn test_query_empty_index_or_zero_k() {
        let index = VectorIndex::new();
        assert!(index.query(&[1.0], 3).unwrap().is_empty());

        let index = build_index();
        assert!(index.query(&[1.0, 0.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_no_dedup_at_index_layer() {
        let mut index = VectorIndex::new();
        index.insert(paper("same"), &[1.0, 1.0]).unwrap();
        index.insert(paper("same"), &[1.0, 1.0]).unwrap();
        assert_eq!(index.len(), 2);
    }
}
