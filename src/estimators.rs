//! Strategies for turning a bin (plus a rank within it) into a concrete
//! value, and a rank (plus a quantile `p`) into a concrete rank, closing the
//! gap between the discrete counts a histogram actually stores and the
//! continuous quantities callers usually want back out.

use crate::algorithms::{clip, nan_tolerant_average};
use crate::error::{Error, Result};
use crate::histogram::Bin;

/// How to pick a value to represent a single sample, given only the bin it
/// landed in and its rank among the other samples in that bin. None of
/// these strategies can recover the original value exactly; which one is
/// least wrong depends on the caller's assumption about the distribution
/// inside a bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueEstimator {
    /// Assumes samples are spread uniformly across the bin's `[lower,
    /// upper)` range and places this one at its proportional position.
    Uniform,
    /// Always returns the bin's lower bound, regardless of rank.
    LowerBound,
    /// Always returns the bin's upper bound, regardless of rank.
    UpperBound,
    /// Always returns the midpoint of the bin's bounds, regardless of rank.
    MidPoint,
}

impl ValueEstimator {
    /// `rank_in_bin` is the sample's rank among only the samples that fall
    /// in `bin` (i.e. `0..bin.count()`), not its global rank.
    pub fn estimate_value(&self, bin: &Bin, rank_in_bin: u64) -> f64 {
        let lower = bin.lower_bound();
        let upper = bin.upper_bound();
        match self {
            ValueEstimator::LowerBound => lower,
            ValueEstimator::UpperBound => upper,
            ValueEstimator::MidPoint => nan_tolerant_average(lower, upper),
            ValueEstimator::Uniform => {
                let count = bin.count().max(1) as f64;
                let fraction = (rank_in_bin as f64 + 0.5) / count;
                clip(lower + (upper - lower) * fraction, lower, upper)
            }
        }
    }
}

/// A SciPy/R `mquantiles`-style plotting-position quantile estimator,
/// parameterized by the two order-statistics plotting constants `alphap`
/// and `betap`. `alphap = betap = 1` gives the common "linear
/// interpolation between closest ranks" method (R's type 7, NumPy's and
/// SciPy's default).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuantileEstimator {
    SciPy { alphap: f64, betap: f64 },
}

impl QuantileEstimator {
    pub fn sci_py(alphap: f64, betap: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&alphap) || !(0.0..=1.0).contains(&betap) {
            return Err(Error::InvalidArgument(format!(
                "alphap and betap must lie in [0, 1], got alphap={alphap}, betap={betap}"
            )));
        }
        Ok(QuantileEstimator::SciPy { alphap, betap })
    }

    /// The plotting-position default (`alphap = betap = 1`), equivalent to
    /// linear interpolation between the two closest ranks.
    pub fn linear() -> Self {
        QuantileEstimator::SciPy { alphap: 1.0, betap: 1.0 }
    }

    /// Maps a quantile `p` in `[0, 1]` to a continuous rank in
    /// `[0, total_count - 1]` for a histogram holding `total_count`
    /// samples. The integer part of the result is the lower rank to
    /// interpolate from; the fractional part is the interpolation weight.
    pub fn continuous_rank(&self, p: f64, total_count: u64) -> f64 {
        let QuantileEstimator::SciPy { alphap, betap } = self;
        let n = total_count as f64;
        let m = alphap + p * (1.0 - alphap - betap);
        let aleph = n * p + m;
        clip(aleph - 1.0, 0.0, n - 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::Histogram;
    use crate::layout::Layout;

    #[test]
    fn lower_upper_and_midpoint_ignore_rank() {
        let layout = Layout::log_quadratic(1e-5, 1e-2, -1e6, 1e6).unwrap();
        let mut h = Histogram::create_static(layout);
        for _ in 0..5 {
            h.add_value(10.0).unwrap();
        }
        let it = h.first_non_empty_bin().unwrap();
        let bin = it.bin();

        let lower_a = ValueEstimator::LowerBound.estimate_value(&bin, 0);
        let lower_b = ValueEstimator::LowerBound.estimate_value(&bin, 4);
        assert_eq!(lower_a, lower_b);
        assert_eq!(lower_a, bin.lower_bound());

        let mid = ValueEstimator::MidPoint.estimate_value(&bin, 2);
        assert!(mid >= bin.lower_bound() && mid <= bin.upper_bound());
    }

    #[test]
    fn uniform_is_monotone_in_rank_and_stays_within_bounds() {
        let layout = Layout::log_quadratic(1e-5, 1e-2, -1e6, 1e6).unwrap();
        let mut h = Histogram::create_static(layout);
        for _ in 0..10 {
            h.add_value(10.0).unwrap();
        }
        let it = h.first_non_empty_bin().unwrap();
        let bin = it.bin();

        let mut last = f64::NEG_INFINITY;
        for rank in 0..bin.count() {
            let v = ValueEstimator::Uniform.estimate_value(&bin, rank);
            assert!(v >= bin.lower_bound() && v <= bin.upper_bound());
            assert!(v >= last);
            last = v;
        }
    }

    #[test]
    fn rejects_constants_outside_unit_interval() {
        assert!(QuantileEstimator::sci_py(-0.1, 1.0).is_err());
        assert!(QuantileEstimator::sci_py(1.0, 1.1).is_err());
    }

    #[test]
    fn continuous_rank_endpoints_hit_extremes() {
        let est = QuantileEstimator::linear();
        assert_eq!(est.continuous_rank(0.0, 100), 0.0);
        assert_eq!(est.continuous_rank(1.0, 100), 99.0);
    }
}
