use serde::{Deserialize, Serialize};

/// Point-in-time view of a histogram.
///
/// `cumulative[i]` counts observations `<= bounds[i]`. The implicit `+Inf`
/// bucket is `count`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramSnapshot {
    pub bounds: Vec<f64>,
    pub cumulative: Vec<u64>,
    pub sum: f64,
    pub count: u64,
}

impl HistogramSnapshot {
    /// An empty histogram over `bounds`.
    pub fn empty(bounds: &[f64]) -> Self {
        Self {
            bounds: bounds.to_vec(),
            cumulative: vec![0; bounds.len()],
            sum: 0.0,
            count: 0,
        }
    }

    /// Whether `other` uses exactly the same bucket boundaries.
    pub fn same_layout(&self, other: &[f64]) -> bool {
        self.bounds.len() == other.len()
            && self
                .bounds
                .iter()
                .zip(other)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }

    /// Bucket-wise addition. Callers must check `same_layout` first.
    pub fn merge(&mut self, other: &HistogramSnapshot) {
        debug_assert!(self.same_layout(&other.bounds));
        for (mine, theirs) in self.cumulative.iter_mut().zip(&other.cumulative) {
            *mine += theirs;
        }
        self.sum += other.sum;
        self.count += other.count;
    }

    /// Iterate `(upper_bound, cumulative_count)` pairs including the `+Inf` bucket.
    pub fn buckets(&self) -> impl Iterator<Item = (f64, u64)> + '_ {
        self.bounds
            .iter()
            .copied()
            .zip(self.cumulative.iter().copied())
            .chain(std::iter::once((f64::INFINITY, self.count)))
    }
}
