//! Low-level numeric building blocks shared by every layout and histogram
//! implementation: interpolation, an overflow-safe midpoint, an
//! order-preserving double-to-long bijection, and a hinted binary search.
//!
//! Every function here is pure and allocation-free; the rest of the crate
//! leans on them to stay bit-identical across platforms, which the upper
//! layers (layouts, estimators) depend on for their round-trip guarantees.

use crate::error::Error;

/// `map_double_to_long(f64::NEG_INFINITY)`.
pub const NEGATIVE_INFINITY_MAPPED_TO_LONG: i64 = map_double_to_long(f64::NEG_INFINITY);
/// `map_double_to_long(f64::INFINITY)`.
pub const POSITIVE_INFINITY_MAPPED_TO_LONG: i64 = map_double_to_long(f64::INFINITY);

/// Maps a non-NaN `f64` to an `i64` such that the natural ordering of
/// doubles is preserved under the ordinary ordering of the returned longs.
///
/// Positive doubles keep their IEEE-754 bit pattern verbatim (it already
/// sorts correctly as a two's-complement integer); negative doubles have
/// every bit below the sign bit flipped so that larger magnitudes produce
/// smaller (more negative) longs.
pub const fn map_double_to_long(x: f64) -> i64 {
    let bits = x.to_bits() as i64;
    bits ^ ((bits >> 63) & 0x7fff_ffff_ffff_ffff)
}

/// Inverse of [`map_double_to_long`]. The transform is an involution, so the
/// forward formula is reapplied verbatim. Longs outside the image of
/// [`map_double_to_long`] correspond to NaN bit patterns and decode to NaN,
/// exactly as the contract requires.
pub const fn map_long_to_double(l: i64) -> f64 {
    let bits = l ^ ((l >> 63) & 0x7fff_ffff_ffff_ffff);
    f64::from_bits(bits as u64)
}

/// Branch-free midpoint of two `i64` values, well-defined over the full
/// range without overflow. Floors toward negative infinity, so the
/// midpoint of values with opposite extreme signs (e.g. `i64::MIN` and
/// `i64::MAX`) is `-1`, not `0`.
pub const fn calculate_midpoint(a: i64, b: i64) -> i64 {
    (a & b) + ((a ^ b) >> 1)
}

/// Clamps `x` into `[lo, hi]`, passing NaN through unchanged.
pub fn clip(x: f64, lo: f64, hi: f64) -> f64 {
    if x.is_nan() {
        x
    } else if x < lo {
        lo
    } else if x > hi {
        hi
    } else {
        x
    }
}

/// Averages two values that are not expected to individually be NaN except
/// as an artifact of `inf - inf`/`inf + -inf` arithmetic: if exactly one
/// side is NaN, the other side is returned untouched instead of poisoning
/// the result.
fn nan_tolerant_average(a: f64, b: f64) -> f64 {
    if a.is_nan() {
        b
    } else if b.is_nan() {
        a
    } else {
        0.5 * (a + b)
    }
}

/// Linearly interpolates `y` at `x` given two points `(x1, y1)` and
/// `(x2, y2)`.
///
/// Averages the two mathematically equivalent forms
/// `y1 + (y2-y1)*(x-x1)/(x2-x1)` and `y2 + (y2-y1)*(x-x2)/(x2-x1)` (falling
/// back to whichever form isn't NaN when infinities make one of them
/// indeterminate) and clips the result to `[min(y1,y2), max(y1,y2)]`. This
/// keeps the function symmetric under swapping the two points, monotone in
/// `x`, and exact when `y1` and `y2` carry identical bits (including signed
/// zero).
pub fn interpolate(x: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    if y1.to_bits() == y2.to_bits() {
        // Short-circuit so that e.g. two `-0.0` endpoints return `-0.0`
        // rather than whatever sign the arithmetic below would produce.
        return y1;
    }

    let delta_x = x2 - x1;
    let delta_y = y2 - y1;

    let form1 = y1 + delta_y * (x - x1) / delta_x;
    let form2 = y2 + delta_y * (x - x2) / delta_x;

    let result = nan_tolerant_average(form1, form2);

    let (lo, hi) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };
    clip(result, lo, hi)
}

/// Binary search for the smallest `x` in `[min, max]` at which `predicate`
/// becomes (and stays) true, assuming `predicate` is monotone non-decreasing
/// over that range. Fails if `predicate(max)` is false. Uses at most ~65
/// predicate evaluations over the full `i64` domain.
pub fn find_first<F>(mut predicate: F, min: i64, max: i64) -> Result<i64, Error>
where
    F: FnMut(i64) -> bool,
{
    if min > max {
        return Err(Error::InvalidArgument(format!(
            "min ({min}) must not be greater than max ({max})"
        )));
    }
    if !predicate(max) {
        return Err(Error::InvalidArgument(
            "predicate is false at max, no solution in range".to_string(),
        ));
    }
    let mut lo = min;
    let mut hi = max;
    while lo < hi {
        let mid = calculate_midpoint(lo, hi);
        if predicate(mid) {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    Ok(lo)
}

/// Like [`find_first`], but starts from an `initial_guess` and expands an
/// exponentially growing bracket around it before bisecting. Bounded by
/// roughly 128 predicate evaluations across the full `i64` domain; useful
/// when repeated calls are expected to land near a previous answer (the
/// ascending-sequence fast path exploits this).
pub fn find_first_with_guess<F>(
    mut predicate: F,
    min: i64,
    max: i64,
    initial_guess: i64,
) -> Result<i64, Error>
where
    F: FnMut(i64) -> bool,
{
    if min > max {
        return Err(Error::InvalidArgument(format!(
            "min ({min}) must not be greater than max ({max})"
        )));
    }
    let guess = initial_guess.clamp(min, max);

    if predicate(guess) {
        // The answer is <= guess. Walk the lower bound down, doubling the
        // stride, until the predicate turns false or we hit `min`.
        let mut true_bound = guess;
        let mut step: i64 = 1;
        loop {
            if true_bound == min {
                return Ok(min);
            }
            let probe = true_bound.saturating_sub(step).max(min);
            if predicate(probe) {
                true_bound = probe;
                step = step.saturating_mul(2);
            } else {
                return find_first(predicate, probe + 1, true_bound);
            }
        }
    } else {
        // The answer is > guess. Walk the upper bound up, doubling the
        // stride, until the predicate turns true.
        let mut false_bound = guess;
        let mut step: i64 = 1;
        loop {
            let probe = false_bound.saturating_add(step).min(max);
            if predicate(probe) {
                return find_first(predicate, false_bound + 1, probe);
            }
            if probe == max {
                return Err(Error::InvalidArgument(
                    "predicate is false at max, no solution in range".to_string(),
                ));
            }
            false_bound = probe;
            step = step.saturating_mul(2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_to_long_preserves_ordering() {
        let mut values = vec![
            f64::NEG_INFINITY,
            -1e300,
            -1.5,
            -1.0,
            -f64::MIN_POSITIVE,
            -0.0,
            0.0,
            f64::MIN_POSITIVE,
            1.0,
            1.5,
            1e300,
            f64::INFINITY,
        ];
        let mapped: Vec<i64> = values.iter().map(|&v| map_double_to_long(v)).collect();
        let mut sorted_pairs: Vec<(f64, i64)> =
            values.drain(..).zip(mapped.iter().copied()).collect();
        let mut by_long = sorted_pairs.clone();
        by_long.sort_by_key(|&(_, l)| l);
        sorted_pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        for (a, b) in sorted_pairs.iter().zip(by_long.iter()) {
            assert_eq!(a.1, b.1);
        }
        assert!(map_double_to_long(-0.0) < map_double_to_long(0.0));
    }

    #[test]
    fn double_long_round_trip() {
        for &v in &[0.0, -0.0, 1.0, -1.0, 1e30, -1e30, f64::MIN_POSITIVE] {
            let l = map_double_to_long(v);
            assert_eq!(map_long_to_double(l).to_bits(), v.to_bits());
        }
    }

    #[test]
    fn nan_outside_image_maps_back_to_nan() {
        // The bit pattern for a NaN, transformed as if it were a sortable
        // long, decodes back to a NaN double: the contract's "outside the
        // image maps to NaN" clause holds without special-casing.
        let nan_bits = f64::NAN.to_bits() as i64;
        assert!(map_long_to_double(nan_bits).is_nan());
    }

    #[test]
    fn midpoint_handles_full_range_without_overflow() {
        assert_eq!(calculate_midpoint(0, 0), 0);
        assert_eq!(calculate_midpoint(0, 10), 5);
        assert_eq!(calculate_midpoint(-10, 0), -5);
        assert_eq!(calculate_midpoint(i64::MIN, i64::MAX), -1);
        assert_eq!(calculate_midpoint(i64::MAX, i64::MIN), -1);
        assert_eq!(calculate_midpoint(i64::MIN, i64::MIN), i64::MIN);
        assert_eq!(calculate_midpoint(i64::MAX, i64::MAX), i64::MAX);
    }

    #[test]
    fn interpolate_exact_midpoint() {
        assert_eq!(interpolate(3.5, 3.0, 4.0, 4.0, 5.0), 4.5);
    }

    #[test]
    fn interpolate_symmetry() {
        let cases = [
            (3.5, 3.0, 4.0, 4.0, 5.0),
            (2.0, 3.0, f64::INFINITY, 4.0, f64::NEG_INFINITY),
            (3.5, 3.0, f64::INFINITY, 4.0, f64::NEG_INFINITY),
            (5.0, 3.0, f64::NEG_INFINITY, 4.0, f64::INFINITY),
            (-1.0, -5.0, -2.0, 10.0, 100.0),
        ];
        for (x, x1, y1, x2, y2) in cases {
            let a = interpolate(x, x1, y1, x2, y2);
            let b = interpolate(x, x2, y2, x1, y1);
            assert!(
                (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits(),
                "interpolate not symmetric: {a} vs {b}"
            );
        }
    }

    #[test]
    fn interpolate_infinite_endpoints() {
        assert_eq!(interpolate(2.0, 3.0, f64::INFINITY, 4.0, f64::NEG_INFINITY), f64::INFINITY);
        assert!(interpolate(3.5, 3.0, f64::INFINITY, 4.0, f64::NEG_INFINITY).is_nan());
        assert_eq!(interpolate(5.0, 3.0, f64::NEG_INFINITY, 4.0, f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn interpolate_equal_bits_returns_y1() {
        assert_eq!(interpolate(7.0, 1.0, 3.0, 9.0, 3.0), 3.0);
        assert_eq!(interpolate(7.0, 1.0, -0.0, 9.0, -0.0).to_bits(), (-0.0f64).to_bits());
    }

    #[test]
    fn find_first_matches_linear_scan() {
        let threshold = 1234i64;
        let result = find_first(|x| x >= threshold, -10_000, 10_000).unwrap();
        assert_eq!(result, threshold);
    }

    #[test]
    fn find_first_fails_when_predicate_false_at_max() {
        assert!(find_first(|x| x > 100, 0, 10).is_err());
    }

    #[test]
    fn find_first_with_guess_matches_find_first() {
        let threshold = 987_654i64;
        for guess in [0, 987_654, 1_000_000, -500_000, i64::MIN, i64::MAX] {
            let result =
                find_first_with_guess(|x| x >= threshold, -2_000_000, 2_000_000, guess).unwrap();
            assert_eq!(result, threshold);
        }
    }
}
