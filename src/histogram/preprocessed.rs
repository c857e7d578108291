//! An immutable snapshot of a histogram with a precomputed prefix-sum
//! ladder over its non-empty regular bins, enabling `O(log n)`
//! `get_bin_by_rank` instead of the linear scan the mutable containers use.
//! Building one is `O(bins)`; afterwards the source histogram may be
//! mutated freely without affecting the snapshot.

use crate::histogram::Histogram;
use crate::layout::Layout;

#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedHistogram {
    layout: Layout,
    min: f64,
    max: f64,
    total_count: u64,
    underflow_count: u64,
    overflow_count: u64,
    /// Ascending, non-empty regular bin indices.
    bin_indices: Vec<i32>,
    bin_counts: Vec<u64>,
    /// `prefix_sums[i]` is the total count of all regular bins before
    /// `bin_indices[i]`; has `bin_indices.len() + 1` entries, the last one
    /// being the grand regular total.
    prefix_sums: Vec<u64>,
}

impl PreprocessedHistogram {
    pub(crate) fn from_histogram(source: &Histogram) -> Self {
        let mut bin_indices = Vec::new();
        let mut bin_counts = Vec::new();

        if !source.is_empty() {
            let mut it = source.first_non_empty_bin().expect("non-empty histogram");
            loop {
                let bin = it.bin();
                if !bin.is_underflow_bin() && !bin.is_overflow_bin() {
                    bin_indices.push(bin.bin_index());
                    bin_counts.push(bin.count());
                }
                if it.is_last_non_empty_bin() {
                    break;
                }
                it.next().expect("not last but advance failed");
            }
        }

        let mut prefix_sums = Vec::with_capacity(bin_counts.len() + 1);
        let mut acc = 0u64;
        prefix_sums.push(0);
        for &c in &bin_counts {
            acc += c;
            prefix_sums.push(acc);
        }

        PreprocessedHistogram {
            layout: source.get_layout().clone(),
            min: source.get_min(),
            max: source.get_max(),
            total_count: source.get_total_count(),
            underflow_count: source.get_underflow_count(),
            overflow_count: source.get_overflow_count(),
            bin_indices,
            bin_counts,
            prefix_sums,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn underflow_count(&self) -> u64 {
        self.underflow_count
    }

    pub fn overflow_count(&self) -> u64 {
        self.overflow_count
    }

    pub fn estimated_footprint_in_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + (self.bin_indices.len() + self.prefix_sums.len()) * std::mem::size_of::<i32>()
            + self.bin_counts.len() * std::mem::size_of::<u64>()
    }

    pub fn regular_count(&self, bin_index: i32) -> u64 {
        match self.bin_indices.binary_search(&bin_index) {
            Ok(i) => self.bin_counts[i],
            Err(_) => 0,
        }
    }

    pub fn first_nonempty_regular(&self) -> Option<i32> {
        self.bin_indices.first().copied()
    }

    pub fn last_nonempty_regular(&self) -> Option<i32> {
        self.bin_indices.last().copied()
    }

    pub fn next_nonempty_regular(&self, after: i32) -> Option<i32> {
        let idx = self.bin_indices.partition_point(|&b| b <= after);
        self.bin_indices.get(idx).copied()
    }

    pub fn prev_nonempty_regular(&self, before: i32) -> Option<i32> {
        let idx = self.bin_indices.partition_point(|&b| b < before);
        if idx == 0 {
            None
        } else {
            self.bin_indices.get(idx - 1).copied()
        }
    }

    /// `O(log n)` rank lookup via binary search over the prefix-sum ladder,
    /// returning `(bin_index, less_count)` in the same global rank space the
    /// linear-scan containers use (underflow, then regular bins ascending,
    /// then overflow).
    pub fn locate_rank(&self, rank: u64) -> (i32, u64) {
        if rank < self.underflow_count {
            return (self.layout.underflow_bin_index(), 0);
        }
        let regular_rank = rank - self.underflow_count;
        let regular_total = *self.prefix_sums.last().unwrap_or(&0);
        if regular_rank >= regular_total {
            return (self.layout.overflow_bin_index(), self.underflow_count + regular_total);
        }
        // Largest `i` with `prefix_sums[i] <= regular_rank`.
        let i = self.prefix_sums.partition_point(|&s| s <= regular_rank) - 1;
        (self.bin_indices[i], self.underflow_count + self.prefix_sums[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::ValueEstimator;
    use crate::layout::Layout;

    #[test]
    fn preprocessed_copy_matches_source_queries() {
        let layout = Layout::log_quadratic(1e-5, 1e-2, -1e6, 1e6).unwrap();
        let mut h = Histogram::create_dynamic(layout);
        for i in 0..200i64 {
            h.add_value((i as f64) * 1.3 - 50.0).unwrap();
        }
        let snapshot = h.get_preprocessed_copy();

        for rank in [0u64, 1, 50, 99, 100, 150, 199] {
            let a = h.get_value(rank, &ValueEstimator::Uniform).unwrap();
            let b = snapshot.get_value(rank, &ValueEstimator::Uniform).unwrap();
            assert_eq!(a.to_bits(), b.to_bits(), "mismatch at rank {rank}");
        }
        assert_eq!(h.get_total_count(), snapshot.get_total_count());
    }

    #[test]
    fn snapshot_is_independent_of_further_mutation() {
        let layout = Layout::log_linear(1e-5, 1e-2, -1e6, 1e6).unwrap();
        let mut h = Histogram::create_static(layout);
        h.add_value(1.0).unwrap();
        let snapshot = h.get_preprocessed_copy();
        h.add_value(1000.0).unwrap();
        assert_eq!(snapshot.get_total_count(), 1);
        assert_eq!(h.get_total_count(), 2);
    }
}
