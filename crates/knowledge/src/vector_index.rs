//! Vector index abstraction for department passages.

use crate::types::PassageChunk;
use roleflow_core::AppResult;

/// Read-only nearest-neighbour lookup over one department's passages.
///
/// Handles are shared between concurrent queries and never mutated after
/// construction; a refresh replaces the handle rather than changing it.
pub trait VectorIndex: Send + Sync {
    /// Department this index was built for (lower-cased).
    fn department(&self) -> &str;

    /// Number of indexed passages.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Top-k passages nearest to the query embedding.
    ///
    /// Returns `(passage, distance)` in ascending distance order; lower is
    /// closer. Callers must not assume every passage is tagged with
    /// `department()`.
    fn search(&self, query_embedding: &[f32], top_k: usize)
        -> AppResult<Vec<(PassageChunk, f32)>>;
}

/// Squared Euclidean distance. Mismatched lengths are infinitely far apart.
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }

    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squared_euclidean() {
        assert_eq!(squared_euclidean(&[1.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((squared_euclidean(&[1.0, 0.0], &[0.0, 1.0]) - 2.0).abs() < 1e-6);
        assert_eq!(squared_euclidean(&[1.0], &[1.0, 0.0]), f32::INFINITY);
    }
}
