//! Bounding arithmetic shared by every domain shape.

use super::BoundingMode;
use crate::value::Value;

/// Scalars that can be clipped, wrapped and folded into an interval.
pub(crate) trait Bounded: Copy + PartialOrd {
    /// Result lies in `[min, max)`. A degenerate interval yields `min`.
    fn wrap(self, min: Self, max: Self) -> Self;
    /// Mirror-reflection into `[min, max]`. A degenerate interval yields `min`.
    fn fold(self, min: Self, max: Self) -> Self;
}

fn wrap_i64(v: i64, min: i64, max: i64) -> i64 {
    let delta = max - min;
    if delta <= 0 {
        return min;
    }
    min + (v - min).rem_euclid(delta)
}

fn fold_i64(v: i64, min: i64, max: i64) -> i64 {
    let delta = max - min;
    if delta <= 0 {
        return min;
    }
    let period = 2 * delta;
    let r = (v - min).rem_euclid(period);
    if r <= delta { min + r } else { min + period - r }
}

impl Bounded for i32 {
    fn wrap(self, min: Self, max: Self) -> Self {
        wrap_i64(self as i64, min as i64, max as i64) as i32
    }

    fn fold(self, min: Self, max: Self) -> Self {
        fold_i64(self as i64, min as i64, max as i64) as i32
    }
}

impl Bounded for char {
    fn wrap(self, min: Self, max: Self) -> Self {
        let code = wrap_i64(self as i64, min as i64, max as i64);
        char::from_u32(code as u32).unwrap_or(min)
    }

    fn fold(self, min: Self, max: Self) -> Self {
        let code = fold_i64(self as i64, min as i64, max as i64);
        char::from_u32(code as u32).unwrap_or(min)
    }
}

impl Bounded for f32 {
    fn wrap(self, min: Self, max: Self) -> Self {
        let (v, lo, hi) = (self as f64, min as f64, max as f64);
        let delta = hi - lo;
        if !(delta > 0.0) || !v.is_finite() {
            return min;
        }
        let r = (v - lo).rem_euclid(delta);
        let out = (lo + r) as f32;
        // rounding can land exactly on the open end
        if out >= max { min } else { out }
    }

    fn fold(self, min: Self, max: Self) -> Self {
        let (v, lo, hi) = (self as f64, min as f64, max as f64);
        let delta = hi - lo;
        if !(delta > 0.0) || !v.is_finite() {
            return min;
        }
        let period = 2.0 * delta;
        let r = (v - lo).rem_euclid(period);
        let out = if r <= delta { lo + r } else { lo + period - r };
        (out as f32).clamp(min, max)
    }
}

impl Bounded for bool {
    fn wrap(self, _: Self, _: Self) -> Self {
        self
    }

    fn fold(self, _: Self, _: Self) -> Self {
        self
    }
}

fn clip<T: PartialOrd>(v: T, min: T, max: T) -> T {
    if v < min {
        min
    } else if v > max {
        max
    } else {
        v
    }
}

fn clip_min<T: PartialOrd>(v: T, min: T) -> T {
    if v < min { min } else { v }
}

fn clip_max<T: PartialOrd>(v: T, max: T) -> T {
    if v > max { max } else { v }
}

/// Applies `mode` with whichever bounds are present.
///
/// With both bounds every mode applies. With only a minimum, CLIP and LOW
/// clamp from below and everything else passes through; symmetrically for
/// only a maximum with CLIP and HIGH.
pub(crate) fn bound<T: Bounded>(mode: BoundingMode, v: T, min: Option<T>, max: Option<T>) -> T {
    use BoundingMode::*;
    match (min, max) {
        (Some(lo), Some(hi)) => match mode {
            Free => v,
            Clip => clip(v, lo, hi),
            Wrap => v.wrap(lo, hi),
            Fold => v.fold(lo, hi),
            Low => clip_min(v, lo),
            High => clip_max(v, hi),
        },
        (Some(lo), None) => match mode {
            Clip | Low => clip_min(v, lo),
            _ => v,
        },
        (None, Some(hi)) => match mode {
            Clip | High => clip_max(v, hi),
            _ => v,
        },
        (None, None) => v,
    }
}

/// Bounds checked first against an allowed-values set, then the interval.
/// `None` means the value was rejected.
pub(crate) fn bound_or_reject<T: Bounded>(
    mode: BoundingMode,
    v: T,
    min: Option<T>,
    max: Option<T>,
    values: &[T],
) -> Option<T> {
    if mode == BoundingMode::Free {
        return Some(v);
    }
    if !values.is_empty() {
        return values.iter().any(|x| *x == v).then_some(v);
    }
    Some(bound(mode, v, min, max))
}

/// Bounds every float component of `v` against the same interval.
pub(crate) fn bound_components<const N: usize>(
    mode: BoundingMode,
    v: [f32; N],
    min: Option<f32>,
    max: Option<f32>,
    values: &[f32],
) -> Option<[f32; N]> {
    let mut out = v;
    for c in out.iter_mut() {
        *c = bound_or_reject(mode, *c, min, max, values)?;
    }
    Some(out)
}

/// Bounds a value whose bounds are themselves values.
///
/// The bounds are converted to the value's type. Vectors take bounds
/// componentwise (a scalar bound broadcasts) and lists apply the same
/// bounds to each element.
pub(crate) fn bound_value(
    mode: BoundingMode,
    v: &Value,
    min: Option<&Value>,
    max: Option<&Value>,
) -> Value {
    fn vector<const N: usize>(
        mode: BoundingMode,
        v: [f32; N],
        min: Option<&Value>,
        max: Option<&Value>,
    ) -> [f32; N] {
        let lo = min.map(Value::to_array::<N>);
        let hi = max.map(Value::to_array::<N>);
        let mut out = v;
        for (i, c) in out.iter_mut().enumerate() {
            *c = bound(mode, *c, lo.map(|a| a[i]), hi.map(|a| a[i]));
        }
        out
    }

    match v {
        Value::Int(i) => Value::Int(bound(
            mode,
            *i,
            min.map(Value::to_int),
            max.map(Value::to_int),
        )),
        Value::Float(f) => Value::Float(bound(
            mode,
            *f,
            min.map(Value::to_float),
            max.map(Value::to_float),
        )),
        Value::Char(c) => Value::Char(bound(
            mode,
            *c,
            min.map(Value::to_char),
            max.map(Value::to_char),
        )),
        Value::Vec2f(a) => Value::Vec2f(vector(mode, *a, min, max)),
        Value::Vec3f(a) => Value::Vec3f(vector(mode, *a, min, max)),
        Value::Vec4f(a) => Value::Vec4f(vector(mode, *a, min, max)),
        Value::List(items) => Value::List(
            items
                .iter()
                .map(|item| bound_value(mode, item, min, max))
                .collect(),
        ),
        Value::Bool(_) | Value::String(_) | Value::Impulse | Value::Invalid => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BoundingMode::*;

    #[test]
    fn wrap_and_fold_integers() {
        assert_eq!(12i32.wrap(0, 10), 2);
        assert_eq!((-3i32).wrap(0, 10), 7);
        assert_eq!(10i32.wrap(0, 10), 0);
        assert_eq!(12i32.fold(0, 10), 8);
        assert_eq!((-3i32).fold(0, 10), 3);
        assert_eq!(25i32.fold(0, 10), 5);
        assert_eq!(5i32.wrap(3, 3), 3);
        assert_eq!(i32::MAX.wrap(i32::MIN, i32::MAX), i32::MIN);
    }

    #[test]
    fn wrap_and_fold_floats() {
        assert!((1.25f32.wrap(0.0, 1.0) - 0.25).abs() < 1e-6);
        assert!(((-0.25f32).wrap(0.0, 1.0) - 0.75).abs() < 1e-6);
        assert!((1.25f32.fold(0.0, 1.0) - 0.75).abs() < 1e-6);
        assert_eq!(0.5f32.wrap(1.0, 1.0), 1.0);
        assert_eq!(f32::NAN.wrap(0.0, 1.0), 0.0);
        assert!((-1e-9f32).wrap(0.0, 1.0) < 1.0);
    }

    #[test]
    fn half_bounded_modes() {
        assert_eq!(bound(Clip, -5, Some(0), None), 0);
        assert_eq!(bound(Low, -5, Some(0), None), 0);
        assert_eq!(bound(High, -5, Some(0), None), -5);
        assert_eq!(bound(Wrap, -5, Some(0), None), -5);
        assert_eq!(bound(Clip, 15, None, Some(10)), 10);
        assert_eq!(bound(High, 15, None, Some(10)), 10);
        assert_eq!(bound(Low, 15, None, Some(10)), 15);
        assert_eq!(bound(Fold, 15, None, None), 15);
    }

    #[test]
    fn low_and_high_with_both_bounds() {
        assert_eq!(bound(Low, 15, Some(0), Some(10)), 15);
        assert_eq!(bound(Low, -1, Some(0), Some(10)), 0);
        assert_eq!(bound(High, -1, Some(0), Some(10)), -1);
        assert_eq!(bound(High, 11, Some(0), Some(10)), 10);
    }

    #[test]
    fn allowed_values_take_precedence() {
        assert_eq!(bound_or_reject(Clip, 4, Some(0), Some(10), &[1, 3, 5]), None);
        assert_eq!(bound_or_reject(Clip, 3, Some(0), Some(10), &[1, 3, 5]), Some(3));
        assert_eq!(bound_or_reject(Free, 4, Some(0), Some(10), &[1, 3, 5]), Some(4));
    }

    #[test]
    fn value_bounds_broadcast_over_vectors() {
        let v = bound_value(
            Clip,
            &Value::Vec3f([-1.0, 0.5, 2.0]),
            Some(&Value::Float(0.0)),
            Some(&Value::Float(1.0)),
        );
        assert_eq!(v, Value::Vec3f([0.0, 0.5, 1.0]));
    }
}
