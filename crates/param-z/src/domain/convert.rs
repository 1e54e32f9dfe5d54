//! Domain construction, accessors and re-typing.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Domain, ListDomain, ScalarDomain, StringDomain, VecDomain};
use crate::value::{Value, ValueType};

/// Builds a domain whose shape follows the type of `min` (or `max` when
/// `min` is invalid). Two invalid bounds give [`Domain::Empty`]; bounds of
/// different types give a [`Domain::Generic`].
pub fn make_domain(min: &Value, max: &Value) -> Domain {
    let shape = match (min.value_type(), max.value_type()) {
        (None, None) => return Domain::Empty,
        (Some(a), Some(b)) if a != b => {
            return Domain::Generic(ScalarDomain {
                min: Some(min.clone()),
                max: Some(max.clone()),
                values: Vec::new(),
            });
        }
        (Some(t), _) | (None, Some(t)) => t,
    };
    let mut domain = Domain::for_type(shape);
    domain.set_min(min);
    domain.set_max(max);
    domain
}

fn scalar_from<T>(v: &Value, get: impl Fn(&Value) -> T) -> Option<T> {
    v.valid().then(|| get(v))
}

fn to_value<T: Into<Value> + Clone>(v: &Option<T>) -> Value {
    v.clone().map_or(Value::Invalid, Into::into)
}

fn vec_bound_value<const N: usize>(b: &[Option<f32>; N]) -> Value {
    if b.iter().all(Option::is_none) {
        return Value::Invalid;
    }
    Value::List(
        b.iter()
            .map(|c| c.map_or(Value::Invalid, Value::Float))
            .collect(),
    )
}

fn vec_bound_from<const N: usize>(v: &Value) -> [Option<f32>; N] {
    match v {
        Value::Invalid => [None; N],
        Value::List(items) => std::array::from_fn(|i| {
            items.get(i).filter(|x| x.valid()).map(Value::to_float)
        }),
        other => other.to_array::<N>().map(Some),
    }
}

impl Domain {
    /// An unconstrained domain shaped for values of type `t`.
    pub fn for_type(t: ValueType) -> Domain {
        match t {
            ValueType::Impulse => Domain::Empty,
            ValueType::Bool => Domain::Bool,
            ValueType::Int => Domain::Int(ScalarDomain::default()),
            ValueType::Float => Domain::Float(ScalarDomain::default()),
            ValueType::Char => Domain::Char(ScalarDomain::default()),
            ValueType::String => Domain::String(StringDomain::default()),
            ValueType::Vec2f => Domain::Vec2f(VecDomain::default()),
            ValueType::Vec3f => Domain::Vec3f(VecDomain::default()),
            ValueType::Vec4f => Domain::Vec4f(VecDomain::default()),
            ValueType::List => Domain::List(ListDomain::default()),
        }
    }

    /// Lower bound as a value. Vector bounds read as a list of per-component
    /// floats, with [`Value::Invalid`] marking unbounded components.
    pub fn min(&self) -> Value {
        match self {
            Domain::Empty | Domain::String(_) => Value::Invalid,
            Domain::Bool => Value::Bool(false),
            Domain::Int(d) => to_value(&d.min),
            Domain::Float(d) => to_value(&d.min),
            Domain::Char(d) => to_value(&d.min),
            Domain::Vec2f(d) => vec_bound_value(&d.min),
            Domain::Vec3f(d) => vec_bound_value(&d.min),
            Domain::Vec4f(d) => vec_bound_value(&d.min),
            Domain::List(d) if d.min.is_empty() => Value::Invalid,
            Domain::List(d) => Value::List(d.min.clone()),
            Domain::Generic(d) => d.min.clone().unwrap_or_default(),
        }
    }

    pub fn max(&self) -> Value {
        match self {
            Domain::Empty | Domain::String(_) => Value::Invalid,
            Domain::Bool => Value::Bool(true),
            Domain::Int(d) => to_value(&d.max),
            Domain::Float(d) => to_value(&d.max),
            Domain::Char(d) => to_value(&d.max),
            Domain::Vec2f(d) => vec_bound_value(&d.max),
            Domain::Vec3f(d) => vec_bound_value(&d.max),
            Domain::Vec4f(d) => vec_bound_value(&d.max),
            Domain::List(d) if d.max.is_empty() => Value::Invalid,
            Domain::List(d) => Value::List(d.max.clone()),
            Domain::Generic(d) => d.max.clone().unwrap_or_default(),
        }
    }

    /// Sets the lower bound, converting `v` to the domain's shape. An
    /// invalid value unsets it. On an empty domain this picks the shape.
    pub fn set_min(&mut self, v: &Value) {
        self.set_bound(v, true)
    }

    pub fn set_max(&mut self, v: &Value) {
        self.set_bound(v, false)
    }

    fn set_bound(&mut self, v: &Value, lower: bool) {
        macro_rules! pick {
            ($d:expr, $val:expr) => {
                if lower { $d.min = $val } else { $d.max = $val }
            };
        }
        match self {
            Domain::Empty => {
                if let Some(t) = v.value_type() {
                    *self = Domain::for_type(t);
                    self.set_bound(v, lower);
                }
            }
            Domain::Bool | Domain::String(_) => {}
            Domain::Int(d) => pick!(d, scalar_from(v, Value::to_int)),
            Domain::Float(d) => pick!(d, scalar_from(v, Value::to_float)),
            Domain::Char(d) => pick!(d, scalar_from(v, Value::to_char)),
            Domain::Vec2f(d) => pick!(d, vec_bound_from(v)),
            Domain::Vec3f(d) => pick!(d, vec_bound_from(v)),
            Domain::Vec4f(d) => pick!(d, vec_bound_from(v)),
            Domain::List(d) => pick!(
                d,
                match v {
                    Value::Invalid => Vec::new(),
                    Value::List(items) => items.clone(),
                    other => vec![other.clone()],
                }
            ),
            Domain::Generic(d) => pick!(d, v.valid().then(|| v.clone())),
        }
    }

    /// Allowed values. Vector domains report the set of the first component,
    /// list domains the set of the first position.
    pub fn values(&self) -> Vec<Value> {
        fn lift<T: Clone + Into<Value>>(v: &[T]) -> Vec<Value> {
            v.iter().cloned().map(Into::into).collect()
        }
        match self {
            Domain::Empty => Vec::new(),
            Domain::Bool => Vec::new(),
            Domain::Int(d) => lift(&d.values),
            Domain::Float(d) => lift(&d.values),
            Domain::Char(d) => lift(&d.values),
            Domain::String(d) => lift(&d.values),
            Domain::Vec2f(d) => lift(&d.values[0]),
            Domain::Vec3f(d) => lift(&d.values[0]),
            Domain::Vec4f(d) => lift(&d.values[0]),
            Domain::List(d) => d.values.first().cloned().unwrap_or_default(),
            Domain::Generic(d) => d.values.clone(),
        }
    }

    /// Replaces the allowed-values set. Entries of another type are
    /// converted; vector domains apply the set to every component and list
    /// domains to every bounded position.
    pub fn set_values(&mut self, values: &[Value]) {
        let valid = || values.iter().filter(|v| v.valid());
        match self {
            Domain::Empty => {
                if let Some(t) = values.iter().find_map(Value::value_type) {
                    *self = Domain::for_type(t);
                    self.set_values(values);
                }
            }
            Domain::Bool => {}
            Domain::Int(d) => d.values = valid().map(Value::to_int).collect(),
            Domain::Float(d) => d.values = valid().map(Value::to_float).collect(),
            Domain::Char(d) => d.values = valid().map(Value::to_char).collect(),
            Domain::String(d) => d.values = valid().map(Value::to_plain_string).collect(),
            Domain::Vec2f(d) => d.values = per_component(values),
            Domain::Vec3f(d) => d.values = per_component(values),
            Domain::Vec4f(d) => d.values = per_component(values),
            Domain::List(d) => {
                let positions = d.min.len().max(d.max.len()).max(1);
                let set: Vec<Value> = valid().cloned().collect();
                d.values = vec![set; positions];
            }
            Domain::Generic(d) => d.values = valid().cloned().collect(),
        }
    }

    /// Re-shapes the domain for values of type `t`, keeping bounds and
    /// allowed values where they translate. Used when a parameter's type
    /// changes after its domain was set.
    pub fn convert_to(&self, t: ValueType) -> Domain {
        if self.is_empty() {
            return Domain::Empty;
        }
        let compatible = matches!(
            (self, t),
            (Domain::Bool, ValueType::Bool)
                | (Domain::Int(_), ValueType::Int)
                | (Domain::Float(_), ValueType::Float)
                | (Domain::Char(_), ValueType::Char)
                | (Domain::String(_), ValueType::String)
                | (Domain::Vec2f(_), ValueType::Vec2f)
                | (Domain::Vec3f(_), ValueType::Vec3f)
                | (Domain::Vec4f(_), ValueType::Vec4f)
                | (Domain::List(_), ValueType::List)
                | (Domain::Generic(_), ValueType::List)
        );
        if compatible {
            return self.clone();
        }

        match t {
            ValueType::Impulse => Domain::Empty,
            ValueType::List => match self {
                Domain::Vec2f(_) | Domain::Vec3f(_) | Domain::Vec4f(_) => {
                    let list = |v: Value| v.as_list().map(<[Value]>::to_vec).unwrap_or_default();
                    Domain::List(ListDomain {
                        min: list(self.min()),
                        max: list(self.max()),
                        values: Vec::new(),
                    })
                }
                _ => Domain::Generic(ScalarDomain {
                    min: Some(self.min()).filter(Value::valid),
                    max: Some(self.max()).filter(Value::valid),
                    values: self.values(),
                }),
            },
            ValueType::Vec2f | ValueType::Vec3f | ValueType::Vec4f => {
                if let Domain::List(d) = self {
                    return match t {
                        ValueType::Vec2f => Domain::Vec2f(d.to_vec_domain()),
                        ValueType::Vec3f => Domain::Vec3f(d.to_vec_domain()),
                        _ => Domain::Vec4f(d.to_vec_domain()),
                    };
                }
                let mut out = Domain::for_type(t);
                out.set_min(&self.min());
                out.set_max(&self.max());
                out.set_values(&self.values());
                out
            }
            _ => {
                let mut out = Domain::for_type(t);
                out.set_min(&self.min());
                out.set_max(&self.max());
                out.set_values(&self.values());
                out
            }
        }
    }
}

fn per_component<const N: usize>(values: &[Value]) -> [Vec<f32>; N] {
    let set: Vec<f32> = values
        .iter()
        .filter(|v| v.valid())
        .map(Value::to_float)
        .collect();
    std::array::from_fn(|_| set.clone())
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("<no domain>");
        }
        let (min, max) = (self.min(), self.max());
        let mut sep = "";
        if min.valid() {
            write!(f, "min: {min}")?;
            sep = " ; ";
        }
        if max.valid() {
            write!(f, "{sep}max: {max}")?;
            sep = " ; ";
        }
        let values = self.values();
        if !values.is_empty() {
            write!(f, "{sep}values: {}", Value::List(values))?;
        }
        Ok(())
    }
}

/// Shape tag of a [`WireDomain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DomainKind {
    #[default]
    Empty,
    Bool,
    Int,
    Float,
    Char,
    String,
    Vec2f,
    Vec3f,
    Vec4f,
    List,
    Generic,
}

/// Serialized form of a [`Domain`].
///
/// Bounds and allowed sets are stored per position: scalar domains use at
/// most one entry, vectors one per component and lists one per position.
/// [`Value::Invalid`] marks an unbounded position. Decoding gives back the
/// exact domain that was encoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireDomain {
    pub kind: DomainKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub min: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub max: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Vec<Value>>,
}

fn scalar_wire<T: Clone + Into<Value>>(kind: DomainKind, d: &ScalarDomain<T>) -> WireDomain {
    WireDomain {
        kind,
        min: d.min.iter().cloned().map(Into::into).collect(),
        max: d.max.iter().cloned().map(Into::into).collect(),
        values: if d.values.is_empty() {
            Vec::new()
        } else {
            vec![d.values.iter().cloned().map(Into::into).collect()]
        },
    }
}

fn vec_wire<const N: usize>(kind: DomainKind, d: &VecDomain<N>) -> WireDomain {
    let bounds = |b: &[Option<f32>; N]| -> Vec<Value> {
        if b.iter().all(Option::is_none) {
            return Vec::new();
        }
        b.iter().map(|c| c.map_or(Value::Invalid, Value::Float)).collect()
    };
    let values = if d.values.iter().all(Vec::is_empty) {
        Vec::new()
    } else {
        d.values
            .iter()
            .map(|set| set.iter().copied().map(Value::Float).collect())
            .collect()
    };
    WireDomain {
        kind,
        min: bounds(&d.min),
        max: bounds(&d.max),
        values,
    }
}

impl From<&Domain> for WireDomain {
    fn from(d: &Domain) -> Self {
        match d {
            Domain::Empty => WireDomain::default(),
            Domain::Bool => WireDomain {
                kind: DomainKind::Bool,
                ..WireDomain::default()
            },
            Domain::Int(d) => scalar_wire(DomainKind::Int, d),
            Domain::Float(d) => scalar_wire(DomainKind::Float, d),
            Domain::Char(d) => scalar_wire(DomainKind::Char, d),
            Domain::String(d) => WireDomain {
                kind: DomainKind::String,
                values: if d.values.is_empty() {
                    Vec::new()
                } else {
                    vec![d.values.iter().map(|s| Value::from(s.as_str())).collect()]
                },
                ..WireDomain::default()
            },
            Domain::Vec2f(d) => vec_wire(DomainKind::Vec2f, d),
            Domain::Vec3f(d) => vec_wire(DomainKind::Vec3f, d),
            Domain::Vec4f(d) => vec_wire(DomainKind::Vec4f, d),
            Domain::List(d) => WireDomain {
                kind: DomainKind::List,
                min: d.min.clone(),
                max: d.max.clone(),
                values: d.values.clone(),
            },
            Domain::Generic(d) => scalar_wire(DomainKind::Generic, d),
        }
    }
}

fn scalar_from_wire<T>(w: &WireDomain, get: impl Fn(&Value) -> T) -> ScalarDomain<T> {
    let first = |list: &[Value]| list.first().filter(|v| v.valid()).map(&get);
    ScalarDomain {
        min: first(&w.min),
        max: first(&w.max),
        values: w
            .values
            .first()
            .map(|set| set.iter().filter(|v| v.valid()).map(&get).collect())
            .unwrap_or_default(),
    }
}

fn vec_from_wire<const N: usize>(w: &WireDomain) -> VecDomain<N> {
    let at = |list: &[Value], i: usize| list.get(i).filter(|v| v.valid()).map(Value::to_float);
    VecDomain {
        min: std::array::from_fn(|i| at(&w.min, i)),
        max: std::array::from_fn(|i| at(&w.max, i)),
        values: std::array::from_fn(|i| {
            w.values
                .get(i)
                .map(|set| set.iter().filter(|v| v.valid()).map(Value::to_float).collect())
                .unwrap_or_default()
        }),
    }
}

impl From<WireDomain> for Domain {
    fn from(w: WireDomain) -> Self {
        match w.kind {
            DomainKind::Empty => Domain::Empty,
            DomainKind::Bool => Domain::Bool,
            DomainKind::Int => Domain::Int(scalar_from_wire(&w, Value::to_int)),
            DomainKind::Float => Domain::Float(scalar_from_wire(&w, Value::to_float)),
            DomainKind::Char => Domain::Char(scalar_from_wire(&w, Value::to_char)),
            DomainKind::String => Domain::String(StringDomain {
                values: scalar_from_wire(&w, Value::to_plain_string).values,
            }),
            DomainKind::Vec2f => Domain::Vec2f(vec_from_wire(&w)),
            DomainKind::Vec3f => Domain::Vec3f(vec_from_wire(&w)),
            DomainKind::Vec4f => Domain::Vec4f(vec_from_wire(&w)),
            DomainKind::List => Domain::List(ListDomain {
                min: w.min,
                max: w.max,
                values: w.values,
            }),
            DomainKind::Generic => Domain::Generic(scalar_from_wire(&w, Value::clone)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BoundingMode;

    #[test]
    fn make_domain_follows_bound_types() {
        assert_eq!(
            make_domain(&Value::Int(0), &Value::Int(10)),
            Domain::Int(ScalarDomain::new(0, 10))
        );
        assert_eq!(make_domain(&Value::Invalid, &Value::Invalid), Domain::Empty);
        assert!(matches!(
            make_domain(&Value::Int(0), &Value::Float(1.0)),
            Domain::Generic(_)
        ));
        let half = make_domain(&Value::Invalid, &Value::Float(2.0));
        assert_eq!(half.min(), Value::Invalid);
        assert_eq!(half.max(), Value::Float(2.0));
    }

    #[test]
    fn vector_bounds_broadcast_scalars() {
        let d = make_domain(&Value::Vec3f([0.0; 3]), &Value::Float(1.0));
        // mixed types make a generic domain
        assert!(matches!(d, Domain::Generic(_)));

        let mut d = Domain::for_type(ValueType::Vec3f);
        d.set_min(&Value::Float(-1.0));
        d.set_max(&Value::Vec3f([1.0, 2.0, 3.0]));
        assert_eq!(
            d.apply(BoundingMode::Clip, &Value::Vec3f([-5.0, 5.0, 2.5])),
            Value::Vec3f([-1.0, 2.0, 2.5])
        );
    }

    #[test]
    fn convert_int_domain_to_float() {
        let d = Domain::Int(ScalarDomain::new(0, 10).with_values([2, 4]));
        let f = d.convert_to(ValueType::Float);
        assert_eq!(
            f,
            Domain::Float(ScalarDomain::new(0.0, 10.0).with_values([2.0, 4.0]))
        );
    }

    #[test]
    fn convert_scalar_domain_to_list_is_generic() {
        let d = Domain::Float(ScalarDomain::new(0.0, 1.0));
        let l = d.convert_to(ValueType::List);
        let v = Value::List(vec![Value::Float(2.0), Value::Float(-1.0)]);
        assert_eq!(
            l.apply(BoundingMode::Clip, &v),
            Value::List(vec![Value::Float(1.0), Value::Float(0.0)])
        );
    }

    #[test]
    fn convert_vec_domain_to_list_is_positional() {
        let d = Domain::Vec2f(VecDomain::new([0.0, 10.0], [1.0, 20.0]));
        let l = d.convert_to(ValueType::List);
        let v = Value::List(vec![Value::Float(5.0), Value::Float(5.0)]);
        assert_eq!(
            l.apply(BoundingMode::Clip, &v),
            Value::List(vec![Value::Float(1.0), Value::Float(10.0)])
        );
    }

    #[test]
    fn wire_form_keeps_bounds_and_values() {
        let d = Domain::Int(ScalarDomain::new(1, 5).with_values([1, 3, 5]));
        let wire = WireDomain::from(&d);
        let json = serde_json::to_string(&wire).unwrap();
        let back: WireDomain = serde_json::from_str(&json).unwrap();
        assert_eq!(Domain::from(back), d);

        let s = Domain::String(StringDomain {
            values: vec!["a".into()],
        });
        assert_eq!(Domain::from(WireDomain::from(&s)), s);
    }

    #[test]
    fn wire_form_is_exact_for_every_shape() {
        let mut late_set = VecDomain::<2>::default();
        late_set.values[1] = vec![0.0, 0.5];
        let mut half_bounded = VecDomain::<3>::new([0.0, 1.0, 2.0], [1.0, 2.0, 3.0]);
        half_bounded.min[1] = None;

        let domains = [
            Domain::Empty,
            Domain::Bool,
            Domain::Float(ScalarDomain {
                min: None,
                max: Some(2.0),
                values: vec![],
            }),
            Domain::Char(ScalarDomain::new('a', 'z')),
            Domain::Vec2f(late_set),
            Domain::Vec3f(half_bounded),
            Domain::Vec4f(VecDomain::uniform(Some(-1.0), None, &[0.0])),
            Domain::List(ListDomain {
                min: vec![Value::Int(0), Value::Invalid],
                max: vec![Value::Int(10)],
                values: vec![vec![Value::Int(1), Value::Int(2)], vec![]],
            }),
            Domain::List(ListDomain {
                min: vec![],
                max: vec![],
                values: vec![vec![], vec![Value::from("x")]],
            }),
            Domain::Generic(ScalarDomain::new(Value::Int(0), Value::Float(1.0))),
        ];
        for d in domains {
            let json = serde_json::to_string(&WireDomain::from(&d)).unwrap();
            let back: WireDomain = serde_json::from_str(&json).unwrap();
            assert_eq!(Domain::from(back), d, "through {json}");
        }
    }

    #[test]
    fn decoded_domains_bound_like_the_original() {
        let list = Domain::List(ListDomain {
            min: vec![],
            max: vec![],
            values: vec![vec![Value::Int(1), Value::Int(2)], vec![]],
        });
        let mirrored = Domain::from(WireDomain::from(&list));
        let v = Value::List(vec![Value::Int(1), Value::Int(99)]);
        assert_eq!(mirrored.apply(BoundingMode::Clip, &v), v);

        let mut vec = VecDomain::<2>::default();
        vec.values[1] = vec![0.0, 0.5];
        let mirrored = Domain::from(WireDomain::from(&Domain::Vec2f(vec)));
        assert!(!mirrored.apply(BoundingMode::Clip, &Value::Vec2f([9.0, 0.25])).valid());
    }

    #[test]
    fn display() {
        let d = Domain::Int(ScalarDomain::new(0, 10));
        assert_eq!(d.to_string(), "min: 0 ; max: 10");
        assert_eq!(Domain::Empty.to_string(), "<no domain>");
    }
}
