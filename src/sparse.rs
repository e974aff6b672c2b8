//! Sparse vector representation and arithmetic.
//!
//! Vectors are stored as parallel `indices`/`values` arrays, serialized as
//! `{"indices": [...], "values": [...]}` — the same shape the vector rows
//! carry in persistence. Absent indices are implicitly zero, so vectors of
//! different dimensionality compare fine (callers must still build both
//! sides against the same vocabulary for the comparison to mean anything).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A sparse numeric vector: only non-zero dimensions are stored.
///
/// Invariant: `indices.len() == values.len()` and indices are unique.
/// Order of dimensions is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f64>,
}

impl SparseVector {
    /// Empty (all-zero) vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(index, weight)` pairs. Duplicate indices are summed.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, f64)>) -> Self {
        let mut map: HashMap<u32, f64> = HashMap::new();
        for (idx, val) in pairs {
            *map.entry(idx).or_insert(0.0) += val;
        }
        let mut entries: Vec<(u32, f64)> = map.into_iter().collect();
        entries.sort_by_key(|(idx, _)| *idx);

        let mut indices = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());
        for (idx, val) in entries {
            indices.push(idx);
            values.push(val);
        }
        Self { indices, values }
    }

    /// Number of stored (non-zero) dimensions.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// True when the vector has no stored dimensions.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Iterate over `(index, weight)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    /// Dot product: sums products of weights sharing an index.
    pub fn dot(&self, other: &SparseVector) -> f64 {
        // Probe the smaller side against a map of the larger one.
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };

        let map: HashMap<u32, f64> = large.iter().collect();
        small
            .iter()
            .filter_map(|(idx, val)| map.get(&idx).map(|v| val * v))
            .sum()
    }

    /// Euclidean norm over all stored weights.
    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Cosine similarity. Returns 0.0 when either vector has zero norm;
    /// never divides by zero, never panics.
    pub fn cosine(&self, other: &SparseVector) -> f64 {
        let norm_a = self.norm();
        let norm_b = other.norm();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        self.dot(other) / (norm_a * norm_b)
    }

    /// Scale every weight by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.values {
            *v *= factor;
        }
    }
}

/// Accumulates weighted sparse vectors, then resolves to their weighted
/// average. Used by the user-vector aggregation paths.
#[derive(Debug, Default)]
pub struct WeightedAccumulator {
    sums: HashMap<u32, f64>,
    total_weight: f64,
}

impl WeightedAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `weight * vector` to the running sum.
    pub fn add(&mut self, vector: &SparseVector, weight: f64) {
        for (idx, val) in vector.iter() {
            *self.sums.entry(idx).or_insert(0.0) += weight * val;
        }
    }

    /// Record weight without touching the sums. Lets callers count a
    /// contribution toward the denominator in one place.
    pub fn add_weight(&mut self, weight: f64) {
        self.total_weight += weight;
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Resolve to `Σ(w_i · v_i) / Σ(w_i)`. `None` when the total weight is
    /// zero — averaging nothing is a no-op, not an empty vector.
    pub fn average(&self) -> Option<SparseVector> {
        if self.total_weight == 0.0 {
            return None;
        }

        let total = self.total_weight;
        Some(SparseVector::from_pairs(
            self.sums.iter().map(|(idx, sum)| (*idx, sum / total)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec_of(pairs: &[(u32, f64)]) -> SparseVector {
        SparseVector::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_cosine_self_is_one() {
        let v = vec_of(&[(0, 1.0), (3, 2.0), (7, 0.5)]);
        assert!((v.cosine(&v) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_zero_vector_is_zero() {
        let zero = SparseVector::new();
        let v = vec_of(&[(1, 1.0)]);

        assert_eq!(zero.cosine(&zero), 0.0);
        assert_eq!(zero.cosine(&v), 0.0);
        assert_eq!(v.cosine(&zero), 0.0);
    }

    #[test]
    fn test_cosine_disjoint_support_is_zero() {
        let a = vec_of(&[(0, 1.0), (2, 3.0)]);
        let b = vec_of(&[(1, 5.0), (3, 2.0)]);
        assert_eq!(a.cosine(&b), 0.0);
    }

    #[test]
    fn test_cosine_symmetric() {
        let a = vec_of(&[(0, 1.0), (1, 2.0), (5, 0.25)]);
        let b = vec_of(&[(1, 4.0), (5, 1.0), (9, 3.0)]);
        assert!((a.cosine(&b) - b.cosine(&a)).abs() < 1e-12);
    }

    #[test]
    fn test_dot_shared_indices_only() {
        let a = vec_of(&[(0, 2.0), (1, 3.0)]);
        let b = vec_of(&[(1, 4.0), (2, 5.0)]);
        assert!((a.dot(&b) - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_norm_includes_all_weights() {
        let v = vec_of(&[(0, 3.0), (100, 4.0)]);
        assert!((v.norm() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_different_dimensionality_tolerated() {
        let a = vec_of(&[(0, 1.0)]);
        let b = vec_of(&[(0, 1.0), (1_000_000, 2.0)]);
        let expected = 1.0 / (1.0 * (1.0_f64 + 4.0).sqrt());
        assert!((a.cosine(&b) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_from_pairs_sums_duplicates() {
        let v = SparseVector::from_pairs(vec![(1, 1.0), (1, 2.0), (0, 0.5)]);
        assert_eq!(v.indices, vec![0, 1]);
        assert_eq!(v.values, vec![0.5, 3.0]);
    }

    #[test]
    fn test_serde_round_trip_shape() {
        let v = vec_of(&[(0, 0.5), (4, 1.5)]);
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("\"indices\""));
        assert!(json.contains("\"values\""));

        let back: SparseVector = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_accumulator_weighted_average() {
        let mut acc = WeightedAccumulator::new();
        acc.add(&vec_of(&[(0, 1.0)]), 2.0);
        acc.add_weight(2.0);
        acc.add(&vec_of(&[(0, 1.0), (1, 1.0)]), 3.0);
        acc.add_weight(3.0);

        let avg = acc.average().unwrap();
        // dim 0: (2*1 + 3*1) / 5 = 1.0, dim 1: 3/5 = 0.6
        assert_eq!(avg.indices, vec![0, 1]);
        assert!((avg.values[0] - 1.0).abs() < 1e-12);
        assert!((avg.values[1] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_accumulator_zero_weight_is_none() {
        let acc = WeightedAccumulator::new();
        assert!(acc.average().is_none());
    }
}
