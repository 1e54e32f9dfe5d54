//! Value domains and bounding.
//!
//! A [`Domain`] describes the legal range of a parameter: optional minimum
//! and maximum, optionally an explicit set of allowed values. Applying it
//! under a [`BoundingMode`] either returns a value inside the domain or
//! [`Value::Invalid`] when the value cannot be made legal (not in the
//! allowed set, or a value/domain shape mismatch).
//!
//! Shapes:
//!
//! | Domain | Applies to |
//! |--------|------------|
//! | [`Domain::Empty`] | anything, unchanged |
//! | [`Domain::Bool`] | bools unchanged; vector components truthified |
//! | `Int` / `Float` / `Char` | scalars; vector components by broadcast |
//! | [`Domain::String`] | strings, by allowed-set membership |
//! | `Vec2f` / `Vec3f` / `Vec4f` | vectors, per component |
//! | [`Domain::List`] | lists per position, vectors per component |
//! | [`Domain::Generic`] | any value, bounds expressed as values |
//!
//! Impulses pass every domain unchanged.

mod clamp;
mod convert;

pub use convert::{DomainKind, WireDomain, make_domain};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::trace;

use crate::value::Value;
use clamp::{bound_components, bound_or_reject, bound_value};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum BoundingMode {
    #[default]
    Free,
    Clip,
    Wrap,
    Fold,
    Low,
    High,
}

/// Range over a scalar type.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarDomain<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub values: Vec<T>,
}

impl<T> Default for ScalarDomain<T> {
    fn default() -> Self {
        Self {
            min: None,
            max: None,
            values: Vec::new(),
        }
    }
}

impl<T> ScalarDomain<T> {
    pub fn new(min: T, max: T) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            values: Vec::new(),
        }
    }

    pub fn with_values(mut self, values: impl IntoIterator<Item = T>) -> Self {
        self.values = values.into_iter().collect();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringDomain {
    pub values: Vec<String>,
}

/// Per-component range for fixed-size float vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct VecDomain<const N: usize> {
    pub min: [Option<f32>; N],
    pub max: [Option<f32>; N],
    pub values: [Vec<f32>; N],
}

impl<const N: usize> Default for VecDomain<N> {
    fn default() -> Self {
        Self {
            min: [None; N],
            max: [None; N],
            values: std::array::from_fn(|_| Vec::new()),
        }
    }
}

impl<const N: usize> VecDomain<N> {
    pub fn new(min: [f32; N], max: [f32; N]) -> Self {
        Self {
            min: min.map(Some),
            max: max.map(Some),
            ..Self::default()
        }
    }

    /// Same bounds on every component.
    pub fn uniform(min: Option<f32>, max: Option<f32>, values: &[f32]) -> Self {
        Self {
            min: [min; N],
            max: [max; N],
            values: std::array::from_fn(|_| values.to_vec()),
        }
    }
}

/// Per-position range for lists. Positions past the end of `min`/`max`
/// are unbounded; an [`Value::Invalid`] entry also means unbounded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListDomain {
    pub min: Vec<Value>,
    pub max: Vec<Value>,
    pub values: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Domain {
    #[default]
    Empty,
    Bool,
    Int(ScalarDomain<i32>),
    Float(ScalarDomain<f32>),
    Char(ScalarDomain<char>),
    String(StringDomain),
    Vec2f(VecDomain<2>),
    Vec3f(VecDomain<3>),
    Vec4f(VecDomain<4>),
    List(ListDomain),
    Generic(ScalarDomain<Value>),
}

macro_rules! broadcast {
    ($mode:expr, $v:expr, $d:expr, $cast:expr) => {{
        let d = $d;
        let values: Vec<f32> = d.values.iter().map($cast).collect();
        bound_components($mode, *$v, d.min.as_ref().map($cast), d.max.as_ref().map($cast), &values)
    }};
}

impl Domain {
    pub fn is_empty(&self) -> bool {
        matches!(self, Domain::Empty)
    }

    /// Bounds `value` under `mode`.
    ///
    /// [`BoundingMode::Free`] returns the input. An allowed-values set is
    /// checked by membership and rejects non-members regardless of mode.
    /// Vectors and lists are bounded per component and rejected as a whole
    /// when any component is rejected.
    pub fn apply(&self, mode: BoundingMode, value: &Value) -> Value {
        if mode == BoundingMode::Free || value.is_impulse() || !value.valid() {
            return value.clone();
        }
        let out = self.apply_bounded(mode, value);
        if !out.valid() {
            trace!(%value, %mode, "[DOM] value rejected by domain");
        }
        out
    }

    fn apply_bounded(&self, mode: BoundingMode, value: &Value) -> Value {
        use Value as V;

        fn or_invalid<T>(r: Option<T>, f: impl FnOnce(T) -> Value) -> Value {
            r.map_or(Value::Invalid, f)
        }
        fn as_f32(c: &char) -> f32 {
            *c as u32 as f32
        }

        match (self, value) {
            (Domain::Empty, v) => v.clone(),

            (Domain::Bool, V::Bool(_)) => value.clone(),
            (Domain::Bool, V::Vec2f(a)) => V::Vec2f(truthify(*a)),
            (Domain::Bool, V::Vec3f(a)) => V::Vec3f(truthify(*a)),
            (Domain::Bool, V::Vec4f(a)) => V::Vec4f(truthify(*a)),

            (Domain::Int(d), V::Int(i)) => {
                or_invalid(bound_or_reject(mode, *i, d.min, d.max, &d.values), V::Int)
            }
            (Domain::Float(d), V::Float(f)) => {
                or_invalid(bound_or_reject(mode, *f, d.min, d.max, &d.values), V::Float)
            }
            (Domain::Char(d), V::Char(c)) => {
                or_invalid(bound_or_reject(mode, *c, d.min, d.max, &d.values), V::Char)
            }
            (Domain::String(d), V::String(s)) => {
                if d.values.is_empty() || d.values.contains(s) {
                    value.clone()
                } else {
                    V::Invalid
                }
            }

            (Domain::Int(d), V::Vec2f(a)) => or_invalid(broadcast!(mode, a, d, |x: &i32| *x as f32), V::Vec2f),
            (Domain::Int(d), V::Vec3f(a)) => or_invalid(broadcast!(mode, a, d, |x: &i32| *x as f32), V::Vec3f),
            (Domain::Int(d), V::Vec4f(a)) => or_invalid(broadcast!(mode, a, d, |x: &i32| *x as f32), V::Vec4f),
            (Domain::Float(d), V::Vec2f(a)) => or_invalid(broadcast!(mode, a, d, |x: &f32| *x), V::Vec2f),
            (Domain::Float(d), V::Vec3f(a)) => or_invalid(broadcast!(mode, a, d, |x: &f32| *x), V::Vec3f),
            (Domain::Float(d), V::Vec4f(a)) => or_invalid(broadcast!(mode, a, d, |x: &f32| *x), V::Vec4f),
            (Domain::Char(d), V::Vec2f(a)) => or_invalid(broadcast!(mode, a, d, as_f32), V::Vec2f),
            (Domain::Char(d), V::Vec3f(a)) => or_invalid(broadcast!(mode, a, d, as_f32), V::Vec3f),
            (Domain::Char(d), V::Vec4f(a)) => or_invalid(broadcast!(mode, a, d, as_f32), V::Vec4f),

            (Domain::Vec2f(d), V::Vec2f(a)) => or_invalid(vec_bound(mode, *a, d), V::Vec2f),
            (Domain::Vec3f(d), V::Vec3f(a)) => or_invalid(vec_bound(mode, *a, d), V::Vec3f),
            (Domain::Vec4f(d), V::Vec4f(a)) => or_invalid(vec_bound(mode, *a, d), V::Vec4f),

            (Domain::List(d), V::Vec2f(a)) => or_invalid(vec_bound(mode, *a, &d.to_vec_domain()), V::Vec2f),
            (Domain::List(d), V::Vec3f(a)) => or_invalid(vec_bound(mode, *a, &d.to_vec_domain()), V::Vec3f),
            (Domain::List(d), V::Vec4f(a)) => or_invalid(vec_bound(mode, *a, &d.to_vec_domain()), V::Vec4f),
            (Domain::List(d), V::List(items)) => or_invalid(list_bound(mode, items, d), V::List),

            (Domain::Generic(d), v) => generic_bound(mode, v, d),

            (domain, v) => {
                trace!(?domain, value = %v, "[DOM] value shape does not match domain");
                V::Invalid
            }
        }
    }
}

fn truthify<const N: usize>(v: [f32; N]) -> [f32; N] {
    v.map(|c| if c != 0.0 { 1.0 } else { 0.0 })
}

fn vec_bound<const N: usize>(mode: BoundingMode, v: [f32; N], d: &VecDomain<N>) -> Option<[f32; N]> {
    let mut out = v;
    for (i, c) in out.iter_mut().enumerate() {
        *c = bound_or_reject(mode, *c, d.min[i], d.max[i], &d.values[i])?;
    }
    Some(out)
}

fn list_bound(mode: BoundingMode, items: &[Value], d: &ListDomain) -> Option<Vec<Value>> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            if let Some(allowed) = d.values.get(i).filter(|v| !v.is_empty()) {
                return allowed.contains(item).then(|| item.clone());
            }
            let lo = d.min.get(i).filter(|m| m.valid());
            let hi = d.max.get(i).filter(|m| m.valid());
            Some(bound_value(mode, item, lo, hi))
        })
        .collect()
}

/// Value-typed bounds. Lists recurse element by element, so nested lists
/// are bounded at every depth.
fn generic_bound(mode: BoundingMode, value: &Value, d: &ScalarDomain<Value>) -> Value {
    if let Value::List(items) = value {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let bounded = generic_bound(mode, item, d);
            if !bounded.valid() {
                return Value::Invalid;
            }
            out.push(bounded);
        }
        return Value::List(out);
    }
    if !d.values.is_empty() {
        return if d.values.contains(value) {
            value.clone()
        } else {
            Value::Invalid
        };
    }
    bound_value(
        mode,
        value,
        d.min.as_ref().filter(|m| m.valid()),
        d.max.as_ref().filter(|m| m.valid()),
    )
}

impl ListDomain {
    /// Reads the leading positions as float component bounds.
    pub fn to_vec_domain<const N: usize>(&self) -> VecDomain<N> {
        let float_at = |list: &[Value], i: usize| list.get(i).filter(|v| v.valid()).map(Value::to_float);
        VecDomain {
            min: std::array::from_fn(|i| float_at(&self.min, i)),
            max: std::array::from_fn(|i| float_at(&self.max, i)),
            values: std::array::from_fn(|i| {
                self.values
                    .get(i)
                    .map(|set| set.iter().map(Value::to_float).collect())
                    .unwrap_or_default()
            }),
        }
    }
}
