//! Deterministic, reversible value-to-bin-index mappings. A [`Layout`] is an
//! immutable, freely shareable value type: [`crate::histogram`] holds one
//! behind an `Arc` and never mutates it, matching the borrow-checker-visible
//! sharing the teacher uses for its `Arc<SsdDevice>` handles in
//! `storage/page_manager.rs`.
//!
//! Five concrete strategies are implemented, all behind the one `Layout`
//! enum rather than a trait object: the set is closed (spec §9 calls out
//! layouts as "a small closed set of strategies... prefer tagged unions"),
//! and an enum lets `PartialEq`/`Hash` fall out of the field comparisons
//! instead of requiring a hand-rolled vtable-based equality.

mod custom;
mod log_based;
mod otel;

pub use custom::CustomLayout;
pub use log_based::{LogApproximation, LogBasedLayout};
pub use otel::OtelExponentialBucketsLayout;

use tracing::{debug, instrument};

use crate::error::{Error, Result};

/// A total, monotone mapping from `f64` to bin index, with designated
/// underflow/overflow sentinels outside the configured range.
///
/// Behind the `serde` feature this derives `Serialize`/`Deserialize`, so a
/// layout's configuration (not a histogram's data — that has its own
/// dedicated binary codec, see [`crate::serialization`]) can travel through
/// JSON/config files alongside the rest of an application's settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Layout {
    LogLinear(LogBasedLayout),
    LogQuadratic(LogBasedLayout),
    LogOptimal(LogBasedLayout),
    OtelExponentialBuckets(OtelExponentialBucketsLayout),
    Custom(CustomLayout),
}

impl Eq for Layout {}

impl std::hash::Hash for Layout {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Layout::LogLinear(l) | Layout::LogQuadratic(l) | Layout::LogOptimal(l) => {
                l.hash(state)
            }
            Layout::OtelExponentialBuckets(l) => l.hash(state),
            Layout::Custom(l) => l.hash(state),
        }
    }
}

impl Layout {
    /// Builds a layout whose bins are uniformly spaced within each
    /// power-of-two band (a linear interpolation of the log). Cheapest to
    /// evaluate per `add_value` call; preferred when update throughput
    /// dominates over bin count.
    #[instrument(skip(), err)]
    pub fn log_linear(
        absolute_error: f64,
        relative_error: f64,
        value_range_low: f64,
        value_range_high: f64,
    ) -> Result<Layout> {
        let inner = LogBasedLayout::new(
            LogApproximation::Linear,
            absolute_error,
            relative_error,
            value_range_low,
            value_range_high,
        )?;
        debug!(bin_count = inner.regular_bin_count(), "built log-linear layout");
        Ok(Layout::LogLinear(inner))
    }

    /// Builds a layout whose bins are placed with a quadratic interpolation
    /// of the log: tighter memory than [`Layout::log_linear`] for the same
    /// error bound, at a small additional cost per lookup.
    #[instrument(skip(), err)]
    pub fn log_quadratic(
        absolute_error: f64,
        relative_error: f64,
        value_range_low: f64,
        value_range_high: f64,
    ) -> Result<Layout> {
        let inner = LogBasedLayout::new(
            LogApproximation::Quadratic,
            absolute_error,
            relative_error,
            value_range_low,
            value_range_high,
        )?;
        debug!(bin_count = inner.regular_bin_count(), "built log-quadratic layout");
        Ok(Layout::LogQuadratic(inner))
    }

    /// Builds a layout that approaches the optimal bin packing for the
    /// configured relative-error objective, by calling `f64::log2` directly
    /// instead of approximating it from the IEEE-754 bit pattern.
    #[instrument(skip(), err)]
    pub fn log_optimal(
        absolute_error: f64,
        relative_error: f64,
        value_range_low: f64,
        value_range_high: f64,
    ) -> Result<Layout> {
        let inner = LogBasedLayout::new(
            LogApproximation::Optimal,
            absolute_error,
            relative_error,
            value_range_low,
            value_range_high,
        )?;
        debug!(bin_count = inner.regular_bin_count(), "built log-optimal layout");
        Ok(Layout::LogOptimal(inner))
    }

    /// Builds a layout with strictly exponential bins of base
    /// `2^(1/2^precision)`, the bucket boundary scheme used by OpenTelemetry
    /// exponential histograms.
    #[instrument(skip(), err)]
    pub fn otel_exponential(
        precision: i32,
        value_range_low: f64,
        value_range_high: f64,
    ) -> Result<Layout> {
        let inner =
            OtelExponentialBucketsLayout::new(precision, value_range_low, value_range_high)?;
        debug!(bin_count = inner.regular_bin_count(), "built otel-exponential layout");
        Ok(Layout::OtelExponentialBuckets(inner))
    }

    /// Builds a layout from an explicit, strictly increasing sequence of
    /// breakpoints. Bin `i` covers `[breakpoints[i], breakpoints[i+1])`.
    #[instrument(skip(breakpoints), err)]
    pub fn custom(breakpoints: Vec<f64>) -> Result<Layout> {
        let inner = CustomLayout::new(breakpoints)?;
        debug!(bin_count = inner.regular_bin_count(), "built custom layout");
        Ok(Layout::Custom(inner))
    }

    /// Maps `x` to a bin index. Total and monotone non-decreasing over the
    /// natural ordering of doubles; NaN maps to the overflow index.
    pub fn map_to_bin_index(&self, value: f64) -> i32 {
        if value.is_nan() {
            return self.overflow_bin_index();
        }
        match self {
            Layout::LogLinear(l) | Layout::LogQuadratic(l) | Layout::LogOptimal(l) => {
                l.map_to_bin_index(value)
            }
            Layout::OtelExponentialBuckets(l) => l.map_to_bin_index(value),
            Layout::Custom(l) => l.map_to_bin_index(value),
        }
    }

    pub fn bin_lower_bound(&self, bin_index: i32) -> f64 {
        match self {
            Layout::LogLinear(l) | Layout::LogQuadratic(l) | Layout::LogOptimal(l) => {
                l.bin_lower_bound(bin_index)
            }
            Layout::OtelExponentialBuckets(l) => l.bin_lower_bound(bin_index),
            Layout::Custom(l) => l.bin_lower_bound(bin_index),
        }
    }

    pub fn bin_upper_bound(&self, bin_index: i32) -> f64 {
        match self {
            Layout::LogLinear(l) | Layout::LogQuadratic(l) | Layout::LogOptimal(l) => {
                l.bin_upper_bound(bin_index)
            }
            Layout::OtelExponentialBuckets(l) => l.bin_upper_bound(bin_index),
            Layout::Custom(l) => l.bin_upper_bound(bin_index),
        }
    }

    pub fn underflow_bin_index(&self) -> i32 {
        match self {
            Layout::LogLinear(l) | Layout::LogQuadratic(l) | Layout::LogOptimal(l) => {
                l.underflow_bin_index()
            }
            Layout::OtelExponentialBuckets(l) => l.underflow_bin_index(),
            Layout::Custom(l) => l.underflow_bin_index(),
        }
    }

    pub fn overflow_bin_index(&self) -> i32 {
        match self {
            Layout::LogLinear(l) | Layout::LogQuadratic(l) | Layout::LogOptimal(l) => {
                l.overflow_bin_index()
            }
            Layout::OtelExponentialBuckets(l) => l.overflow_bin_index(),
            Layout::Custom(l) => l.overflow_bin_index(),
        }
    }

    /// Number of regular indices between the underflow and overflow
    /// sentinels, inclusive.
    pub fn regular_bin_count(&self) -> i64 {
        (self.overflow_bin_index() as i64) - (self.underflow_bin_index() as i64) - 1
    }
}

pub(crate) fn validate_error_bounds(
    absolute_error: f64,
    relative_error: f64,
    value_range_high: f64,
) -> Result<()> {
    if !(absolute_error > 0.0) || absolute_error.is_infinite() {
        return Err(Error::InvalidArgument(format!(
            "absolute_error must be positive and finite, got {absolute_error}"
        )));
    }
    if !(relative_error > 0.0) || !(relative_error < 1.0) {
        return Err(Error::InvalidArgument(format!(
            "relative_error must lie in (0, 1), got {relative_error}"
        )));
    }
    if absolute_error > relative_error * value_range_high {
        return Err(Error::InvalidArgument(format!(
            "absolute_error ({absolute_error}) must not exceed relative_error * value_range_high ({})",
            relative_error * value_range_high
        )));
    }
    Ok(())
}

pub(crate) fn validate_range(value_range_low: f64, value_range_high: f64) -> Result<()> {
    if !value_range_low.is_finite() || !value_range_high.is_finite() {
        return Err(Error::InvalidArgument(
            "value_range_low/value_range_high must be finite".to_string(),
        ));
    }
    if value_range_low > 0.0 || value_range_high < 0.0 || value_range_low >= value_range_high {
        return Err(Error::InvalidArgument(format!(
            "value range [{value_range_low}, {value_range_high}] must contain 0 and be non-empty"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_errors() {
        assert!(Layout::log_linear(0.0, 1e-2, -1e6, 1e6).is_err());
        assert!(Layout::log_linear(1e-5, 0.0, -1e6, 1e6).is_err());
        assert!(Layout::log_linear(1e-5, 1.0, -1e6, 1e6).is_err());
        assert!(Layout::log_linear(-1e-5, 1e-2, -1e6, 1e6).is_err());
    }

    #[test]
    fn rejects_absolute_error_exceeding_relative_bound() {
        assert!(Layout::log_linear(10.0, 1e-2, -1e6, 1e6).is_err());
    }

    #[test]
    fn rejects_nan_and_reversed_ranges() {
        assert!(Layout::log_linear(1e-5, 1e-2, f64::NAN, 1e6).is_err());
        assert!(Layout::log_linear(1e-5, 1e-2, 1e6, -1e6).is_err());
        assert!(Layout::log_linear(1e-5, 1e-2, 1.0, 2.0).is_err());
    }

    #[test]
    fn nan_maps_to_overflow() {
        let layout = Layout::log_quadratic(1e-5, 1e-2, -1e6, 1e6).unwrap();
        assert_eq!(layout.map_to_bin_index(f64::NAN), layout.overflow_bin_index());
    }

    #[test]
    fn equal_configurations_are_equal_and_hash_equal() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let a = Layout::log_linear(1e-5, 1e-2, -1e6, 1e6).unwrap();
        let b = Layout::log_linear(1e-5, 1e-2, -1e6, 1e6).unwrap();
        assert_eq!(a, b);

        let mut ha = DefaultHasher::new();
        a.hash(&mut ha);
        let mut hb = DefaultHasher::new();
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());

        let c = Layout::log_quadratic(1e-5, 1e-2, -1e6, 1e6).unwrap();
        assert_ne!(a, c);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn round_trips_through_json() {
        let layout = Layout::log_quadratic(1e-5, 1e-2, -1e6, 1e6).unwrap();
        let json = serde_json::to_string(&layout).unwrap();
        let decoded: Layout = serde_json::from_str(&json).unwrap();
        assert_eq!(layout, decoded);
    }
}
