//! The three histogram containers and the enum that unifies them.
//!
//! [`Histogram`] is a closed, tagged union over the three storage shapes —
//! [`StaticHistogram`], [`DynamicHistogram`], [`PreprocessedHistogram`] —
//! rather than a trait object: the set is fixed by the spec, and dispatching
//! through a `match` keeps the hot increment/query paths monomorphic,
//! matching the `Layout` enum's design in [`crate::layout`].

mod bin;
mod dynamic;
mod preprocessed;
mod static_histogram;

pub use bin::{Bin, BinIterator};
pub use dynamic::DynamicHistogram;
pub use preprocessed::PreprocessedHistogram;
pub use static_histogram::StaticHistogram;

/// Shared with [`crate::serialization`], whose bit-packed bin-count section
/// uses the identical mode-to-cell-width scheme as this container's own
/// storage.
pub(crate) use dynamic::{cell_bits, mode_for_value};

use tracing::{debug, instrument};

use crate::algorithms::{find_first, interpolate};
use crate::error::{Error, Result};
use crate::estimators::{QuantileEstimator, ValueEstimator};
use crate::layout::Layout;

/// A mutable or immutable collection of bin counts over a [`Layout`],
/// tracking the exact minimum and maximum of every value recorded.
#[derive(Debug, Clone)]
pub enum Histogram {
    Static(StaticHistogram),
    Dynamic(DynamicHistogram),
    Preprocessed(PreprocessedHistogram),
}

impl Histogram {
    /// A container backed by one pre-allocated `u64` per regular bin index.
    /// Only practical when `layout.regular_bin_count()` is small enough to
    /// afford allocating up front.
    pub fn create_static(layout: Layout) -> Self {
        Histogram::Static(StaticHistogram::new(layout))
    }

    /// A container backed by bit-packed, on-demand-grown storage. The right
    /// default for wide, low-error layouts where most regular bins never
    /// see a value.
    pub fn create_dynamic(layout: Layout) -> Self {
        Histogram::Dynamic(DynamicHistogram::new(layout))
    }

    pub fn get_layout(&self) -> &Layout {
        match self {
            Histogram::Static(h) => h.layout(),
            Histogram::Dynamic(h) => h.layout(),
            Histogram::Preprocessed(h) => h.layout(),
        }
    }

    pub fn get_min(&self) -> f64 {
        match self {
            Histogram::Static(h) => h.min(),
            Histogram::Dynamic(h) => h.min(),
            Histogram::Preprocessed(h) => h.min(),
        }
    }

    pub fn get_max(&self) -> f64 {
        match self {
            Histogram::Static(h) => h.max(),
            Histogram::Dynamic(h) => h.max(),
            Histogram::Preprocessed(h) => h.max(),
        }
    }

    pub fn get_total_count(&self) -> u64 {
        match self {
            Histogram::Static(h) => h.total_count(),
            Histogram::Dynamic(h) => h.total_count(),
            Histogram::Preprocessed(h) => h.total_count(),
        }
    }

    pub fn get_underflow_count(&self) -> u64 {
        match self {
            Histogram::Static(h) => h.underflow_count(),
            Histogram::Dynamic(h) => h.underflow_count(),
            Histogram::Preprocessed(h) => h.underflow_count(),
        }
    }

    pub fn get_overflow_count(&self) -> u64 {
        match self {
            Histogram::Static(h) => h.overflow_count(),
            Histogram::Dynamic(h) => h.overflow_count(),
            Histogram::Preprocessed(h) => h.overflow_count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.get_total_count() == 0
    }

    pub fn get_estimated_footprint_in_bytes(&self) -> usize {
        match self {
            Histogram::Static(h) => h.estimated_footprint_in_bytes(),
            Histogram::Dynamic(h) => h.estimated_footprint_in_bytes(),
            Histogram::Preprocessed(h) => h.estimated_footprint_in_bytes(),
        }
    }

    fn count_at(&self, bin_index: i32) -> u64 {
        let layout = self.get_layout();
        if bin_index <= layout.underflow_bin_index() {
            self.get_underflow_count()
        } else if bin_index >= layout.overflow_bin_index() {
            self.get_overflow_count()
        } else {
            self.regular_count(bin_index)
        }
    }

    fn regular_count(&self, bin_index: i32) -> u64 {
        match self {
            Histogram::Static(h) => h.regular_count(bin_index),
            Histogram::Dynamic(h) => h.regular_count(bin_index),
            Histogram::Preprocessed(h) => h.regular_count(bin_index),
        }
    }

    fn first_nonempty_regular(&self) -> Option<i32> {
        match self {
            Histogram::Static(h) => h.first_nonempty_regular(),
            Histogram::Dynamic(h) => h.first_nonempty_regular(),
            Histogram::Preprocessed(h) => h.first_nonempty_regular(),
        }
    }

    fn last_nonempty_regular(&self) -> Option<i32> {
        match self {
            Histogram::Static(h) => h.last_nonempty_regular(),
            Histogram::Dynamic(h) => h.last_nonempty_regular(),
            Histogram::Preprocessed(h) => h.last_nonempty_regular(),
        }
    }

    fn next_nonempty_regular(&self, after: i32) -> Option<i32> {
        match self {
            Histogram::Static(h) => h.next_nonempty_regular(after),
            Histogram::Dynamic(h) => h.next_nonempty_regular(after),
            Histogram::Preprocessed(h) => h.next_nonempty_regular(after),
        }
    }

    fn prev_nonempty_regular(&self, before: i32) -> Option<i32> {
        match self {
            Histogram::Static(h) => h.prev_nonempty_regular(before),
            Histogram::Dynamic(h) => h.prev_nonempty_regular(before),
            Histogram::Preprocessed(h) => h.prev_nonempty_regular(before),
        }
    }

    fn first_nonempty_bin_index(&self) -> Option<i32> {
        let layout = self.get_layout();
        if self.get_underflow_count() > 0 {
            return Some(layout.underflow_bin_index());
        }
        if let Some(r) = self.first_nonempty_regular() {
            return Some(r);
        }
        if self.get_overflow_count() > 0 {
            return Some(layout.overflow_bin_index());
        }
        None
    }

    fn last_nonempty_bin_index(&self) -> Option<i32> {
        let layout = self.get_layout();
        if self.get_overflow_count() > 0 {
            return Some(layout.overflow_bin_index());
        }
        if let Some(r) = self.last_nonempty_regular() {
            return Some(r);
        }
        if self.get_underflow_count() > 0 {
            return Some(layout.underflow_bin_index());
        }
        None
    }

    fn next_bin_index(&self, current: i32) -> Option<i32> {
        let layout = self.get_layout();
        let underflow_idx = layout.underflow_bin_index();
        let overflow_idx = layout.overflow_bin_index();
        if current < underflow_idx {
            return self.first_nonempty_bin_index();
        }
        if current < overflow_idx {
            if let Some(r) = self.next_nonempty_regular(current) {
                return Some(r);
            }
            if self.get_overflow_count() > 0 {
                return Some(overflow_idx);
            }
        }
        None
    }

    fn prev_bin_index(&self, current: i32) -> Option<i32> {
        let layout = self.get_layout();
        let underflow_idx = layout.underflow_bin_index();
        let overflow_idx = layout.overflow_bin_index();
        if current > overflow_idx {
            return self.last_nonempty_bin_index();
        }
        if current > underflow_idx {
            if let Some(r) = self.prev_nonempty_regular(current) {
                return Some(r);
            }
            if self.get_underflow_count() > 0 {
                return Some(underflow_idx);
            }
        }
        None
    }

    /// `(bin_index, less_count)` for the bin holding global rank `rank`.
    /// Preprocessed snapshots answer in `O(log n)` via their prefix-sum
    /// ladder; the mutable containers fall back to a linear scan from
    /// whichever end `rank` is closer to.
    fn locate_rank(&self, rank: u64) -> (i32, u64) {
        if let Histogram::Preprocessed(p) = self {
            return p.locate_rank(rank);
        }
        let total = self.get_total_count();
        if rank < total / 2 {
            let mut bin_index = self
                .first_nonempty_bin_index()
                .expect("rank < total implies a non-empty histogram");
            let mut less = 0u64;
            loop {
                let count = self.count_at(bin_index);
                if rank < less + count {
                    return (bin_index, less);
                }
                less += count;
                bin_index = self
                    .next_bin_index(bin_index)
                    .expect("rank is within total_count, so a next bin must exist");
            }
        } else {
            let mut bin_index = self
                .last_nonempty_bin_index()
                .expect("rank < total implies a non-empty histogram");
            let mut less = total - self.count_at(bin_index);
            loop {
                if rank >= less {
                    return (bin_index, less);
                }
                bin_index = self
                    .prev_bin_index(bin_index)
                    .expect("rank is within total_count, so a previous bin must exist");
                less -= self.count_at(bin_index);
            }
        }
    }

    /// A cursor positioned at the bin holding global rank `rank`.
    pub fn get_bin_by_rank(&self, rank: u64) -> Result<BinIterator<'_>> {
        let total = self.get_total_count();
        if rank >= total {
            return Err(Error::InvalidArgument(format!(
                "rank {rank} is out of bounds for a histogram with total_count {total}"
            )));
        }
        let (bin_index, less_count) = self.locate_rank(rank);
        let greater_count = total - less_count - self.count_at(bin_index);
        Ok(BinIterator::new(self, bin_index, less_count, greater_count))
    }

    pub fn first_non_empty_bin(&self) -> Result<BinIterator<'_>> {
        let bin_index = self
            .first_nonempty_bin_index()
            .ok_or_else(|| Error::InvalidArgument("histogram is empty".to_string()))?;
        let greater_count = self.get_total_count() - self.count_at(bin_index);
        Ok(BinIterator::new(self, bin_index, 0, greater_count))
    }

    pub fn last_non_empty_bin(&self) -> Result<BinIterator<'_>> {
        let bin_index = self
            .last_nonempty_bin_index()
            .ok_or_else(|| Error::InvalidArgument("histogram is empty".to_string()))?;
        let less_count = self.get_total_count() - self.count_at(bin_index);
        Ok(BinIterator::new(self, bin_index, less_count, 0))
    }

    /// Estimates the value at global rank `rank`, deferring to `estimator`
    /// for any rank strictly between the first and the last (which are
    /// always the exact recorded minimum and maximum).
    pub fn get_value(&self, rank: u64, estimator: &ValueEstimator) -> Result<f64> {
        let total = self.get_total_count();
        if rank >= total {
            return Err(Error::InvalidArgument(format!(
                "rank {rank} is out of bounds for a histogram with total_count {total}"
            )));
        }
        if rank == 0 {
            return Ok(self.get_min());
        }
        if rank == total - 1 {
            return Ok(self.get_max());
        }
        let it = self.get_bin_by_rank(rank)?;
        let rank_in_bin = rank - it.less_count();
        Ok(estimator.estimate_value(&it.bin(), rank_in_bin))
    }

    /// Estimates the value at quantile `p` (in `[0, 1]`) by mapping it to a
    /// continuous rank via `quantile_estimator` and linearly interpolating
    /// between the two bracketing integer ranks' estimated values.
    pub fn get_quantile(
        &self,
        p: f64,
        quantile_estimator: &QuantileEstimator,
        value_estimator: &ValueEstimator,
    ) -> Result<f64> {
        if p.is_nan() || !(0.0..=1.0).contains(&p) {
            return Err(Error::InvalidArgument(format!("p must lie in [0, 1], got {p}")));
        }
        if self.is_empty() {
            return Ok(f64::NAN);
        }
        let n = self.get_total_count();
        let z = quantile_estimator.continuous_rank(p, n);
        let lo_rank = z.floor() as u64;
        let hi_rank = (lo_rank + 1).min(n - 1);
        let v_lo = self.get_value(lo_rank, value_estimator)?;
        if hi_rank == lo_rank {
            return Ok(v_lo);
        }
        let v_hi = self.get_value(hi_rank, value_estimator)?;
        Ok(interpolate(z, lo_rank as f64, v_lo, hi_rank as f64, v_hi))
    }

    /// The one mutation primitive the serialization reader needs: bump the
    /// cell `bin_index` resolves to (underflow, overflow, or a regular
    /// bin/cell) by `n`. Exposed crate-wide rather than wrapped in a
    /// separate builder type, since the histogram shapes already dispatch
    /// through this same enum.
    pub(crate) fn increment(&mut self, bin_index: i32, n: u64) -> Result<()> {
        match self {
            Histogram::Static(h) => h.increment(bin_index, n),
            Histogram::Dynamic(h) => h.increment(bin_index, n),
            Histogram::Preprocessed(_) => {
                Err(Error::InvalidArgument("a preprocessed histogram is immutable".to_string()))
            }
        }
    }

    pub(crate) fn set_min_max(&mut self, min: f64, max: f64) {
        match self {
            Histogram::Static(h) => h.set_min_max(min, max),
            Histogram::Dynamic(h) => h.set_min_max(min, max),
            Histogram::Preprocessed(_) => unreachable!("checked by callers before reaching here"),
        }
    }

    pub(crate) fn raw_increment_regular(&mut self, bin_index: i32, n: u64) {
        match self {
            Histogram::Static(h) => h.raw_increment_regular(bin_index, n),
            Histogram::Dynamic(h) => h.raw_increment_regular(bin_index, n),
            Histogram::Preprocessed(_) => unreachable!("deserializer never builds directly into a preprocessed shape"),
        }
    }

    /// Records one occurrence of `x`.
    #[instrument(skip(self))]
    pub fn add_value(&mut self, x: f64) -> Result<()> {
        self.add_value_n(x, 1)
    }

    /// Records `n` occurrences of `x` at once, counting as a single
    /// increment of the target bin's cell rather than `n` separate ones.
    pub fn add_value_n(&mut self, x: f64, n: u64) -> Result<()> {
        match self {
            Histogram::Static(h) => h.add_value_n(x, n),
            Histogram::Dynamic(h) => h.add_value_n(x, n),
            Histogram::Preprocessed(_) => {
                Err(Error::InvalidArgument("a preprocessed histogram is immutable".to_string()))
            }
        }
    }

    /// Bulk-records `len` values produced by the non-decreasing function
    /// `f(0), f(1), ..., f(len - 1)`, running each bin's worth of
    /// consecutive indices through a single [`crate::algorithms::find_first`]
    /// search instead of one `add_value` call per index. Useful for
    /// initializing a histogram from an already-sorted data set.
    pub fn add_ascending_sequence<F: Fn(i64) -> f64>(&mut self, f: F, len: i64) -> Result<()> {
        if matches!(self, Histogram::Preprocessed(_)) {
            return Err(Error::InvalidArgument("a preprocessed histogram is immutable".to_string()));
        }
        if len < 0 {
            return Err(Error::InvalidArgument(format!("len must be non-negative, got {len}")));
        }
        if len == 0 {
            return Ok(());
        }

        let first = f(0);
        let last = f(len - 1);
        if first.is_nan() || last.is_nan() {
            return Err(Error::InvalidArgument("cannot record NaN".to_string()));
        }

        let layout = self.get_layout().clone();
        let mut i: i64 = 0;
        while i < len {
            let x = f(i);
            if x.is_nan() {
                return Err(Error::InvalidArgument("cannot record NaN".to_string()));
            }
            let bin_index = layout.map_to_bin_index(x);
            let j = if bin_index >= layout.overflow_bin_index() {
                len
            } else {
                let upper = layout.bin_upper_bound(bin_index);
                find_first(|k| k >= len || f(k) >= upper, i, len)?
            };
            self.increment(bin_index, (j - i) as u64)?;
            i = j;
        }

        self.set_min_max(first, last);
        Ok(())
    }

    /// Folds `other`'s samples into `self`. When both share the same
    /// layout, bin counts are added index-for-index; otherwise each of
    /// `other`'s samples is re-estimated with `value_estimator` and
    /// re-recorded one at a time, since there is no exact way to place a
    /// foreign bin's count onto a differently-shaped set of bins.
    #[instrument(skip(self, other, value_estimator))]
    pub fn add_histogram(&mut self, other: &Histogram, value_estimator: &ValueEstimator) -> Result<()> {
        if matches!(self, Histogram::Preprocessed(_)) {
            return Err(Error::InvalidArgument("a preprocessed histogram is immutable".to_string()));
        }
        if other.is_empty() {
            return Ok(());
        }
        self.get_total_count().checked_add(other.get_total_count()).ok_or_else(|| {
            Error::ArithmeticOverflow("merged total_count would exceed u64::MAX".to_string())
        })?;

        self.increment(self.get_layout().underflow_bin_index(), other.get_underflow_count())?;
        self.increment(self.get_layout().overflow_bin_index(), other.get_overflow_count())?;

        if self.get_layout() == other.get_layout() {
            debug!("merging via the index-aligned fast path");
            let mut it = other.first_non_empty_bin()?;
            loop {
                let bin = it.bin();
                if !bin.is_underflow_bin() && !bin.is_overflow_bin() {
                    self.increment(bin.bin_index(), bin.count())?;
                }
                if it.is_last_non_empty_bin() {
                    break;
                }
                it.next()?;
            }
        } else {
            debug!("merging via the value-estimator re-binning path");
            let mut it = other.first_non_empty_bin()?;
            loop {
                let bin = it.bin();
                if !bin.is_underflow_bin() && !bin.is_overflow_bin() {
                    for rank_in_bin in 0..bin.count() {
                        let v = value_estimator.estimate_value(&bin, rank_in_bin);
                        self.add_value(v)?;
                    }
                }
                if it.is_last_non_empty_bin() {
                    break;
                }
                it.next()?;
            }
        }

        self.set_min_max(other.get_min(), other.get_max());
        Ok(())
    }

    /// Builds an immutable snapshot with an `O(log n)` `get_bin_by_rank`,
    /// independent of any further mutation of `self`.
    pub fn get_preprocessed_copy(&self) -> Histogram {
        Histogram::Preprocessed(PreprocessedHistogram::from_histogram(self))
    }
}

impl PartialEq for Histogram {
    /// Two histograms are equal when they hold the same layout, the same
    /// exact min/max, and the same non-empty bins (including the underflow
    /// and overflow sentinels) with the same counts — regardless of which
    /// of the three concrete shapes either one is stored as.
    fn eq(&self, other: &Self) -> bool {
        if self.get_layout() != other.get_layout() {
            return false;
        }
        if self.get_min().to_bits() != other.get_min().to_bits() {
            return false;
        }
        if self.get_max().to_bits() != other.get_max().to_bits() {
            return false;
        }
        if self.get_total_count() != other.get_total_count() {
            return false;
        }

        let mut a = self.first_nonempty_bin_index();
        let mut b = other.first_nonempty_bin_index();
        loop {
            match (a, b) {
                (None, None) => return true,
                (Some(ai), Some(bi)) => {
                    if ai != bi || self.count_at(ai) != other.count_at(bi) {
                        return false;
                    }
                    a = self.next_bin_index(ai);
                    b = other.next_bin_index(bi);
                }
                _ => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;

    fn layout() -> Layout {
        Layout::log_quadratic(1e-5, 1e-2, -1e6, 1e6).unwrap()
    }

    #[test]
    fn starts_empty() {
        let h = Histogram::create_dynamic(layout());
        assert!(h.is_empty());
        assert_eq!(h.get_total_count(), 0);
        assert_eq!(h.get_underflow_count(), 0);
        assert_eq!(h.get_overflow_count(), 0);
    }

    #[test]
    fn add_value_updates_min_max_and_total() {
        let mut h = Histogram::create_dynamic(layout());
        h.add_value(3.0).unwrap();
        h.add_value(-2.0).unwrap();
        h.add_value(7.5).unwrap();
        assert_eq!(h.get_total_count(), 3);
        assert_eq!(h.get_min(), -2.0);
        assert_eq!(h.get_max(), 7.5);
    }

    #[test]
    fn static_and_dynamic_agree_on_the_same_data() {
        let mut s = Histogram::create_static(layout());
        let mut d = Histogram::create_dynamic(layout());
        for i in -50..50 {
            s.add_value(i as f64 * 0.37).unwrap();
            d.add_value(i as f64 * 0.37).unwrap();
        }
        assert_eq!(s, d);
    }

    #[test]
    fn get_value_at_rank_zero_and_last_are_exact_extremes() {
        let mut h = Histogram::create_dynamic(layout());
        for v in [5.0, -3.0, 100.0, 1.0] {
            h.add_value(v).unwrap();
        }
        let n = h.get_total_count();
        assert_eq!(h.get_value(0, &ValueEstimator::Uniform).unwrap(), -3.0);
        assert_eq!(h.get_value(n - 1, &ValueEstimator::Uniform).unwrap(), 100.0);
    }

    #[test]
    fn get_quantile_rejects_out_of_range_p() {
        let mut h = Histogram::create_dynamic(layout());
        h.add_value(1.0).unwrap();
        let qe = QuantileEstimator::linear();
        let ve = ValueEstimator::Uniform;
        assert!(h.get_quantile(-0.1, &qe, &ve).is_err());
        assert!(h.get_quantile(1.1, &qe, &ve).is_err());
    }

    #[test]
    fn get_quantile_zero_and_one_match_min_and_max() {
        let mut h = Histogram::create_dynamic(layout());
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            h.add_value(v).unwrap();
        }
        let qe = QuantileEstimator::linear();
        let ve = ValueEstimator::Uniform;
        assert_eq!(h.get_quantile(0.0, &qe, &ve).unwrap(), h.get_min());
        assert_eq!(h.get_quantile(1.0, &qe, &ve).unwrap(), h.get_max());
    }

    #[test]
    fn add_ascending_sequence_matches_one_at_a_time_insertion() {
        let values: Vec<f64> = (0..500).map(|i| (i as f64) * 0.1 - 10.0).collect();

        let mut bulk = Histogram::create_dynamic(layout());
        bulk.add_ascending_sequence(|i| values[i as usize], values.len() as i64)
            .unwrap();

        let mut one_by_one = Histogram::create_dynamic(layout());
        for &v in &values {
            one_by_one.add_value(v).unwrap();
        }

        assert_eq!(bulk, one_by_one);
    }

    #[test]
    fn add_histogram_fast_path_preserves_conservation() {
        let mut a = Histogram::create_dynamic(layout());
        let mut b = Histogram::create_dynamic(layout());
        for i in 0..30 {
            a.add_value(i as f64).unwrap();
        }
        for i in 30..60 {
            b.add_value(i as f64).unwrap();
        }
        let total_before = a.get_total_count() + b.get_total_count();
        a.add_histogram(&b, &ValueEstimator::Uniform).unwrap();
        assert_eq!(a.get_total_count(), total_before);
        assert_eq!(a.get_min(), 0.0);
        assert_eq!(a.get_max(), 59.0);
    }

    #[test]
    fn add_histogram_rebinning_path_preserves_total_count() {
        let mut a = Histogram::create_dynamic(Layout::log_linear(1e-5, 1e-2, -1e6, 1e6).unwrap());
        let mut b = Histogram::create_dynamic(Layout::log_quadratic(1e-5, 1e-2, -1e6, 1e6).unwrap());
        for i in 0..20 {
            a.add_value(i as f64 + 1.0).unwrap();
        }
        for i in 0..20 {
            b.add_value(-(i as f64) - 1.0).unwrap();
        }
        let total_before = a.get_total_count() + b.get_total_count();
        a.add_histogram(&b, &ValueEstimator::Uniform).unwrap();
        assert_eq!(a.get_total_count(), total_before);
    }

    #[test]
    fn mutating_a_preprocessed_histogram_fails() {
        let mut h = Histogram::create_dynamic(layout());
        h.add_value(1.0).unwrap();
        let mut snapshot = h.get_preprocessed_copy();
        assert!(snapshot.add_value(2.0).is_err());
    }

    #[test]
    fn equality_holds_across_different_container_shapes() {
        let mut s = Histogram::create_static(layout());
        let mut d = Histogram::create_dynamic(layout());
        for v in [0.1, -5.0, 42.0, 42.0, 1000.0] {
            s.add_value(v).unwrap();
            d.add_value(v).unwrap();
        }
        let p = d.get_preprocessed_copy();
        assert_eq!(s, d);
        assert_eq!(d, p);
        assert_eq!(s, p);
    }

    // The remaining tests draw many samples from a non-uniform distribution
    // (rather than a handful of hand-picked literals) to exercise the
    // quantified invariants from the spec's testable-properties list across
    // a much wider swath of inputs than the literal cases above cover.
    use rand::prelude::*;
    use rand_distr::Normal;

    fn seeded_rng() -> StdRng {
        StdRng::seed_from_u64(0xDA7A_1571)
    }

    #[test]
    fn conservation_holds_over_many_random_samples() {
        let normal = Normal::new(0.0_f64, 250.0).unwrap();
        let mut rng = seeded_rng();
        let mut h = Histogram::create_dynamic(layout());
        let mut recorded = 0u64;
        for _ in 0..5000 {
            h.add_value(normal.sample(&mut rng)).unwrap();
            recorded += 1;
        }
        assert_eq!(h.get_total_count(), recorded);
        let regular_total: u64 = {
            let mut total = 0u64;
            if !h.is_empty() {
                let mut it = h.first_non_empty_bin().unwrap();
                loop {
                    let bin = it.bin();
                    if !bin.is_underflow_bin() && !bin.is_overflow_bin() {
                        total += bin.count();
                    }
                    if it.is_last_non_empty_bin() {
                        break;
                    }
                    it.next().unwrap();
                }
            }
            total
        };
        assert_eq!(
            h.get_underflow_count() + h.get_overflow_count() + regular_total,
            h.get_total_count()
        );
    }

    #[test]
    fn rank_monotonicity_holds_over_many_random_samples() {
        let normal = Normal::new(100.0_f64, 30.0).unwrap();
        let mut rng = seeded_rng();
        let mut h = Histogram::create_dynamic(layout());
        for _ in 0..2000 {
            h.add_value(normal.sample(&mut rng)).unwrap();
        }
        let ve = ValueEstimator::Uniform;
        let total = h.get_total_count();
        let mut last = h.get_value(0, &ve).unwrap();
        for rank in 1..total {
            let v = h.get_value(rank, &ve).unwrap();
            assert!(v >= last, "value at rank {rank} ({v}) < value at rank {} ({last})", rank - 1);
            last = v;
        }
    }

    #[test]
    fn merge_is_associative_over_random_partitions() {
        let normal = Normal::new(-10.0_f64, 5.0).unwrap();
        let mut rng = seeded_rng();
        let samples: Vec<f64> = (0..900).map(|_| normal.sample(&mut rng)).collect();
        let (part_a, rest) = samples.split_at(300);
        let (part_b, part_c) = rest.split_at(300);

        let build = |values: &[f64]| {
            let mut h = Histogram::create_dynamic(layout());
            for &v in values {
                h.add_value(v).unwrap();
            }
            h
        };

        let ve = ValueEstimator::Uniform;
        let mut ab_then_c = build(part_a);
        ab_then_c.add_histogram(&build(part_b), &ve).unwrap();
        ab_then_c.add_histogram(&build(part_c), &ve).unwrap();

        let mut a_then_bc = build(part_a);
        let mut bc = build(part_b);
        bc.add_histogram(&build(part_c), &ve).unwrap();
        a_then_bc.add_histogram(&bc, &ve).unwrap();

        assert_eq!(ab_then_c, a_then_bc);
    }
}
