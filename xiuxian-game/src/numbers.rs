//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;
use rand::Rng;

/// Round a f64 and clamp it to the i64 range, returning 0 for NaN values.
#[must_use]
pub fn round_f64_to_i64(value: f64) -> i64 {
    if value.is_nan() {
        return 0;
    }
    let min = cast::<i64, f64>(i64::MIN).unwrap_or(f64::MIN);
    let max = cast::<i64, f64>(i64::MAX).unwrap_or(f64::MAX);
    let clamped = value.clamp(min, max).round();
    cast::<f64, i64>(clamped).unwrap_or(0)
}

/// Floor a f64 and clamp it to the i64 range, returning 0 for non-finite values.
#[must_use]
pub fn floor_f64_to_i64(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    let min = cast::<i64, f64>(i64::MIN).unwrap_or(f64::MIN);
    let max = cast::<i64, f64>(i64::MAX).unwrap_or(f64::MAX);
    let clamped = value.clamp(min, max).floor();
    cast::<f64, i64>(clamped).unwrap_or(0)
}

/// Ceil a f64 and clamp it to the i64 range, returning 0 for non-finite values.
#[must_use]
pub fn ceil_f64_to_i64(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    let min = cast::<i64, f64>(i64::MIN).unwrap_or(f64::MIN);
    let max = cast::<i64, f64>(i64::MAX).unwrap_or(f64::MAX);
    let clamped = value.clamp(min, max).ceil();
    cast::<f64, i64>(clamped).unwrap_or(0)
}

/// Convert i64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn i64_to_f64(value: i64) -> f64 {
    cast::<i64, f64>(value).unwrap_or(0.0)
}

/// Draw uniformly from `[low, high]`, returning `low` when the range is empty.
///
/// Tuning tables may pin a variance to a single value (for example `(1.0, 1.0)`),
/// which `gen_range` would reject.
pub fn roll_between<R>(rng: &mut R, (low, high): (f64, f64)) -> f64
where
    R: Rng + ?Sized,
{
    if high <= low {
        return low;
    }
    rng.gen_range(low..=high)
}
