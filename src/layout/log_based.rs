//! The shared implementation behind `Layout::log_linear`/`log_quadratic`/
//! `log_optimal`. All three place bins at (approximately) geometric
//! spacing above a linear "near zero" region; they differ only in which
//! function approximates `log2` while walking the geometric region, trading
//! CPU cost for how tightly the bins can be packed.

use std::hash::{Hash, Hasher};

use crate::error::Result;
use crate::layout::{validate_error_bounds, validate_range};

/// Which function approximates `log2(x)` inside the geometric region of a
/// [`LogBasedLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LogApproximation {
    /// `log2(x) ≈ exponent + (mantissa - 1)`: exact at the band edges,
    /// cheapest to evaluate, loosest in the middle of a band.
    Linear,
    /// `log2(x) ≈ exponent + h(mantissa)` for a quadratic `h` matched to
    /// `log2`'s derivative at the band's lower edge: tighter than `Linear`
    /// at the same bin count, one extra multiply-add per lookup.
    Quadratic,
    /// Calls `f64::log2` directly: the tightest possible packing for the
    /// configured error bound, at the cost of a transcendental call per
    /// lookup.
    Optimal,
}

/// `log2(m)` derivative at `m=1`, used both as the quadratic
/// approximation's matched slope and (see [`density_safety_factor`]) as
/// part of the worst-case density bound for the linear approximation.
const QUADRATIC_SLOPE_AT_ONE: f64 = std::f64::consts::LOG2_E;

/// Upper bound on `true_log2_derivative(m) / approx_derivative(m)` for
/// `m` in `[1, 2)`, derived by hand from each approximation's derivative
/// against `d/dm log2(m) = 1/(m ln 2)`:
///
/// - `Linear`: `h'(m) = 1` everywhere, true derivative peaks at `m=1` with
///   value `1/ln2 ≈ 1.4427`, so the ratio peaks at `1.4427`.
/// - `Quadratic`: `h'(t) = k + 2(1-k)t` (`t = m-1`, `k = log2(e)`) is
///   matched to the true derivative at `t=0`; the ratio grows again toward
///   `t=1`, peaking at `(1/(2 ln2)) / (2-k) ≈ 1.294`.
/// - `Optimal`: exact, ratio is `1` everywhere.
///
/// A layout built with this factor folded into its per-octave bin count
/// cannot locally pack bins tighter than the true log2 spacing would
/// allow, which keeps the relative-error bound satisfied even where the
/// approximation's derivative diverges most from the real one.
fn density_safety_factor(kind: LogApproximation) -> f64 {
    match kind {
        LogApproximation::Linear => 1.45,
        LogApproximation::Quadratic => 1.3,
        LogApproximation::Optimal => 1.0,
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogBasedLayout {
    kind: LogApproximation,
    absolute_error: f64,
    relative_error: f64,
    value_range_low: f64,
    value_range_high: f64,

    zero_bin_half_width: f64,
    crossover: f64,
    log2_crossover: f64,
    crossover_pos: f64,
    bins_per_octave: f64,

    underflow_bin_index: i32,
    overflow_bin_index: i32,
}

impl LogBasedLayout {
    pub(crate) fn new(
        kind: LogApproximation,
        absolute_error: f64,
        relative_error: f64,
        value_range_low: f64,
        value_range_high: f64,
    ) -> Result<Self> {
        validate_error_bounds(absolute_error, relative_error, value_range_high)?;
        validate_range(value_range_low, value_range_high)?;

        let zero_bin_half_width = absolute_error / 2.0;
        let crossover = absolute_error / relative_error;
        let rho = 1.0 / (1.0 - relative_error);
        let log_rho = rho.ln();
        let bins_per_octave =
            (density_safety_factor(kind) * std::f64::consts::LN_2 / log_rho)
                .ceil()
                .max(1.0);
        let log2_crossover = log2_approx(kind, crossover);
        let crossover_pos = 1.0 + (crossover - zero_bin_half_width) / absolute_error;

        let mut layout = LogBasedLayout {
            kind,
            absolute_error,
            relative_error,
            value_range_low,
            value_range_high,
            zero_bin_half_width,
            crossover,
            log2_crossover,
            crossover_pos,
            bins_per_octave,
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

    /// Continuous position for positive `x` (magnitude), such that the bin
    /// index for that magnitude is `floor(position)`, valid for
    /// `x > zero_bin_half_width`.
    fn continuous_position(&self, x: f64) -> f64 {
        if x <= self.crossover {
            1.0 + (x - self.zero_bin_half_width) / self.absolute_error
        } else {
            let log2x = log2_approx(self.kind, x);
            self.crossover_pos + (log2x - self.log2_crossover) * self.bins_per_octave
        }
    }

    /// Inverse of [`Self::continuous_position`]: the smallest `x` whose
    /// position is `pos`.
    fn inverse_position(&self, pos: f64) -> f64 {
        if pos <= self.crossover_pos {
            self.zero_bin_half_width + (pos - 1.0) * self.absolute_error
        } else {
            let target_log2 = self.log2_crossover + (pos - self.crossover_pos) / self.bins_per_octave;
            inverse_log2_approx(self.kind, target_log2)
        }
    }

    /// Bin index for a positive magnitude (not yet sign-adjusted, not yet
    /// clamped against the over/underflow sentinels).
    fn positive_index(&self, x: f64) -> i32 {
        if x <= self.zero_bin_half_width {
            return 0;
        }
        let pos = self.continuous_position(x);
        pos.floor() as i32
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
            return -self.zero_bin_half_width;
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
            return self.zero_bin_half_width;
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
}

impl PartialEq for LogBasedLayout {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.absolute_error.to_bits() == other.absolute_error.to_bits()
            && self.relative_error.to_bits() == other.relative_error.to_bits()
            && self.value_range_low.to_bits() == other.value_range_low.to_bits()
            && self.value_range_high.to_bits() == other.value_range_high.to_bits()
    }
}

impl Eq for LogBasedLayout {}

impl Hash for LogBasedLayout {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.absolute_error.to_bits().hash(state);
        self.relative_error.to_bits().hash(state);
        self.value_range_low.to_bits().hash(state);
        self.value_range_high.to_bits().hash(state);
    }
}

/// Decomposes `x > 0` into `(exponent, mantissa)` with `mantissa in [1, 2)`
/// and `x == mantissa * 2^exponent`, directly from the IEEE-754 bit
/// pattern (no `frexp` libm call).
fn frexp2(x: f64) -> (i32, f64) {
    let bits = x.to_bits();
    let exponent = ((bits >> 52) & 0x7ff) as i32 - 1023;
    let mantissa_bits = (bits & 0x000f_ffff_ffff_ffff) | 0x3ff0_0000_0000_0000;
    (exponent, f64::from_bits(mantissa_bits))
}

/// Reconstructs `mantissa * 2^exponent` from a `[1, 2)` mantissa and an
/// exponent, via direct bit construction when the exponent is in the
/// normal range (exact), falling back to `powi` otherwise.
fn ldexp2(mantissa: f64, exponent: i32) -> f64 {
    let biased = exponent + 1023;
    if (1..=2046).contains(&biased) {
        let mantissa_bits = mantissa.to_bits() & 0x000f_ffff_ffff_ffff;
        f64::from_bits(((biased as u64) << 52) | mantissa_bits)
    } else {
        mantissa * 2f64.powi(exponent)
    }
}

fn quadratic_h(t: f64) -> f64 {
    let k = QUADRATIC_SLOPE_AT_ONE;
    t * (k + (1.0 - k) * t)
}

fn quadratic_h_inverse(h: f64) -> f64 {
    let k = QUADRATIC_SLOPE_AT_ONE;
    let coeff = 1.0 - k;
    if coeff.abs() < 1e-12 {
        return h / k;
    }
    let discriminant = k * k + 4.0 * coeff * h;
    (-k + discriminant.max(0.0).sqrt()) / (2.0 * coeff)
}

fn log2_approx(kind: LogApproximation, x: f64) -> f64 {
    if kind == LogApproximation::Optimal || !x.is_normal() {
        return x.log2();
    }
    let (exponent, mantissa) = frexp2(x);
    let t = mantissa - 1.0;
    match kind {
        LogApproximation::Linear => exponent as f64 + t,
        LogApproximation::Quadratic => exponent as f64 + quadratic_h(t),
        LogApproximation::Optimal => unreachable!(),
    }
}

fn inverse_log2_approx(kind: LogApproximation, target: f64) -> f64 {
    if kind == LogApproximation::Optimal {
        return 2f64.powf(target);
    }
    let exponent = target.floor();
    let frac = target - exponent;
    let mantissa = match kind {
        LogApproximation::Linear => 1.0 + frac,
        LogApproximation::Quadratic => 1.0 + quadratic_h_inverse(frac),
        LogApproximation::Optimal => unreachable!(),
    };
    ldexp2(mantissa, exponent as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layouts() -> Vec<LogBasedLayout> {
        vec![
            LogBasedLayout::new(LogApproximation::Linear, 1e-5, 1e-2, -1e6, 1e6).unwrap(),
            LogBasedLayout::new(LogApproximation::Quadratic, 1e-5, 1e-2, -1e6, 1e6).unwrap(),
            LogBasedLayout::new(LogApproximation::Optimal, 1e-5, 1e-2, -1e6, 1e6).unwrap(),
        ]
    }

    #[test]
    fn zero_maps_to_bin_zero() {
        for layout in layouts() {
            assert_eq!(layout.map_to_bin_index(0.0), 0);
            assert_eq!(layout.map_to_bin_index(-0.0), 0);
        }
    }

    #[test]
    fn monotone_non_decreasing_over_samples() {
        let samples: Vec<f64> = (-2000..2000)
            .map(|i| (i as f64) * 137.0 + 0.37)
            .collect();
        for layout in layouts() {
            let mut sorted = samples.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let mut last_index = layout.underflow_bin_index();
            for &x in &sorted {
                let idx = layout.map_to_bin_index(x);
                assert!(idx >= last_index, "index went backwards at x={x}");
                last_index = idx;
            }
        }
    }

    #[test]
    fn error_bound_holds_across_the_range() {
        for layout in layouts() {
            let mut x = layout.zero_bin_half_width * 1.01;
            while x < 1e6 {
                let idx = layout.map_to_bin_index(x);
                let lo = layout.bin_lower_bound(idx);
                let hi = layout.bin_upper_bound(idx);
                let bound =
                    (layout.absolute_error).max(layout.relative_error * lo.abs().max(hi.abs()));
                assert!(
                    hi - lo <= bound * 1.0000001,
                    "bin [{lo}, {hi}] width {} exceeds bound {bound} at x={x} ({:?})",
                    hi - lo,
                    layout.kind
                );
                x *= 1.0003;
            }
        }
    }

    #[test]
    fn reversibility_on_regular_bins() {
        for layout in layouts() {
            for idx in [1, 2, 5, 50, -1, -2, -5, -50] {
                if idx <= layout.underflow_bin_index() || idx >= layout.overflow_bin_index() {
                    continue;
                }
                let lower = layout.bin_lower_bound(idx);
                assert_eq!(
                    layout.map_to_bin_index(lower),
                    idx,
                    "map(lower({idx})) != {idx} for {:?}",
                    layout.kind
                );
                let upper = layout.bin_upper_bound(idx);
                let just_below_upper = upper - upper.abs().max(1.0) * f64::EPSILON * 4.0;
                if just_below_upper < upper {
                    assert_eq!(
                        layout.map_to_bin_index(just_below_upper),
                        idx,
                        "map(just below upper({idx})) != {idx} for {:?}",
                        layout.kind
                    );
                }
            }
        }
    }

    #[test]
    fn out_of_range_maps_to_sentinels() {
        for layout in layouts() {
            assert_eq!(layout.map_to_bin_index(1e30), layout.overflow_bin_index());
            assert_eq!(layout.map_to_bin_index(-1e30), layout.underflow_bin_index());
        }
    }

    #[test]
    fn negative_side_mirrors_positive() {
        for layout in layouts() {
            for &x in &[1.0, 100.0, 12345.0] {
                let pos_idx = layout.map_to_bin_index(x);
                let neg_idx = layout.map_to_bin_index(-x);
                assert_eq!(neg_idx, -pos_idx);
            }
        }
    }

    #[test]
    fn frexp2_matches_stdlib_log2_decomposition() {
        for &x in &[1.0, 1.5, 2.0, 3.0, 1024.0, 1e-10, 1e10, 0.1] {
            let (e, m) = frexp2(x);
            assert!((1.0..2.0).contains(&m), "mantissa out of range for {x}");
            assert!((m * 2f64.powi(e) - x).abs() <= x.abs() * 1e-12);
        }
    }
}
