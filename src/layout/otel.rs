//! Strictly exponential bucket boundaries with base `2^(1/2^precision)`,
//! matching the bucketing scheme OpenTelemetry's exponential histogram
//! aggregation uses. Unlike the log-linear/quadratic/optimal family there is
//! no absolute-error-driven linear region away from zero; instead a single
//! designated zero bin absorbs magnitudes too small to place on the
//! exponential scale without a division by zero in `log2`.

use std::hash::{Hash, Hasher};

use crate::error::{Error, Result};
use crate::layout::validate_range;

/// Smallest positive magnitude treated as distinct from zero; magnitudes at
/// or below this fall into the zero bin. Chosen as the smallest positive
/// normal `f64` so that `log2` of anything admitted to the exponential scale
/// stays within the normal exponent range.
const ZERO_THRESHOLD: f64 = f64::MIN_POSITIVE;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OtelExponentialBucketsLayout {
    precision: i32,
    value_range_low: f64,
    value_range_high: f64,
    scale_factor: f64,
    log2_zero_threshold: f64,
    underflow_bin_index: i32,
    overflow_bin_index: i32,
}

impl OtelExponentialBucketsLayout {
    pub(crate) fn new(precision: i32, value_range_low: f64, value_range_high: f64) -> Result<Self> {
        if !(-10..=30).contains(&precision) {
            return Err(Error::InvalidArgument(format!(
                "precision must lie in [-10, 30], got {precision}"
            )));
        }
        validate_range(value_range_low, value_range_high)?;

        let scale_factor = 2f64.powi(precision);
        let log2_zero_threshold = ZERO_THRESHOLD.log2();

        let mut layout = OtelExponentialBucketsLayout {
            precision,
            value_range_low,
            value_range_high,
            scale_factor,
            log2_zero_threshold,
            underflow_bin_index: 0,
            overflow_bin_index: 0,
        };

        let positive_max = layout.positive_index(value_range_high);
        let negative_max = layout.positive_index(-value_range_low);
        layout.underflow_bin_index = (-negative_max)
            .checked_sub(1)
            .expect("negative regular index range fits in i32");
        layout.overflow_bin_index = positive_max
            .checked_add(1)
            .expect("positive regular index range fits in i32");

        Ok(layout)
    }

    pub fn regular_bin_count(&self) -> i64 {
        (self.overflow_bin_index as i64) - (self.underflow_bin_index as i64) - 1
    }

    /// Continuous position such that `floor(position)` is the bin index for
    /// a positive magnitude `x > ZERO_THRESHOLD`; position `1.0` lands
    /// exactly at `ZERO_THRESHOLD`, so bin `0` is reserved for the zero bin.
    fn continuous_position(&self, x: f64) -> f64 {
        (x.log2() - self.log2_zero_threshold) * self.scale_factor + 1.0
    }

    fn inverse_position(&self, pos: f64) -> f64 {
        let log2x = self.log2_zero_threshold + (pos - 1.0) / self.scale_factor;
        2f64.powf(log2x)
    }

    fn positive_index(&self, x: f64) -> i32 {
        if x <= ZERO_THRESHOLD {
            return 0;
        }
        self.continuous_position(x).floor() as i32
    }

    pub fn map_to_bin_index(&self, value: f64) -> i32 {
        if value > self.value_range_high {
            return self.overflow_bin_index;
        }
        if value < self.value_range_low {
            return self.underflow_bin_index;
        }
        if value >= 0.0 {
            self.positive_index(value).min(self.overflow_bin_index - 1)
        } else {
            (-self.positive_index(-value)).max(self.underflow_bin_index + 1)
        }
    }

    pub fn bin_lower_bound(&self, bin_index: i32) -> f64 {
        if bin_index <= self.underflow_bin_index {
            return f64::NEG_INFINITY;
        }
        if bin_index >= self.overflow_bin_index {
            return self.value_range_high;
        }
        if bin_index == 0 {
            return -ZERO_THRESHOLD;
        }
        if bin_index > 0 {
            self.inverse_position(bin_index as f64)
        } else {
            -self.inverse_position((-bin_index + 1) as f64)
        }
    }

    pub fn bin_upper_bound(&self, bin_index: i32) -> f64 {
        if bin_index <= self.underflow_bin_index {
            return self.value_range_low;
        }
        if bin_index >= self.overflow_bin_index {
            return f64::INFINITY;
        }
        if bin_index == 0 {
            return ZERO_THRESHOLD;
        }
        if bin_index > 0 {
            self.inverse_position((bin_index + 1) as f64)
        } else {
            -self.inverse_position(-bin_index as f64)
        }
    }

    pub fn underflow_bin_index(&self) -> i32 {
        self.underflow_bin_index
    }

    pub fn overflow_bin_index(&self) -> i32 {
        self.overflow_bin_index
    }

    pub fn precision(&self) -> i32 {
        self.precision
    }
}

impl PartialEq for OtelExponentialBucketsLayout {
    fn eq(&self, other: &Self) -> bool {
        self.precision == other.precision
            && self.value_range_low.to_bits() == other.value_range_low.to_bits()
            && self.value_range_high.to_bits() == other.value_range_high.to_bits()
    }
}

impl Eq for OtelExponentialBucketsLayout {}

impl Hash for OtelExponentialBucketsLayout {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.precision.hash(state);
        self.value_range_low.to_bits().hash(state);
        self.value_range_high.to_bits().hash(state);
    }
}
