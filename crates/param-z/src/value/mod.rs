//! Runtime values carried by parameters.
//!
//! [`Value`] is a closed union over every shape a parameter can hold. Two
//! variants have special meaning:
//!
//! - [`Value::Invalid`] is the "no value" sentinel. Writing it anywhere is a
//!   no-op and a domain that rejects a value returns it.
//! - [`Value::Impulse`] is an absorbing element for comparison: it is equal
//!   to, and both `<=` and `>=`, every other value. Writing an impulse to a
//!   typed parameter re-commits the parameter's previous value.
//!
//! Conversions between types are total; see [`Value::convert`].

mod convert;

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Type tag of a non-invalid [`Value`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Impulse,
    Bool,
    Int,
    Float,
    Char,
    String,
    Vec2f,
    Vec3f,
    Vec4f,
    List,
}

impl ValueType {
    /// The value a freshly typed parameter starts with.
    pub fn default_value(self) -> Value {
        match self {
            Self::Impulse => Value::Impulse,
            Self::Bool => Value::Bool(false),
            Self::Int => Value::Int(0),
            Self::Float => Value::Float(0.0),
            Self::Char => Value::Char('\0'),
            Self::String => Value::String(String::new()),
            Self::Vec2f => Value::Vec2f([0.0; 2]),
            Self::Vec3f => Value::Vec3f([0.0; 3]),
            Self::Vec4f => Value::Vec4f([0.0; 4]),
            Self::List => Value::List(Vec::new()),
        }
    }
}

/// Marker converting into [`Value::Impulse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Impulse;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    #[default]
    Invalid,
    Impulse,
    Bool(bool),
    Int(i32),
    Float(f32),
    Char(char),
    String(String),
    Vec2f([f32; 2]),
    Vec3f([f32; 3]),
    Vec4f([f32; 4]),
    List(Vec<Value>),
}

impl Value {
    pub fn valid(&self) -> bool {
        !matches!(self, Value::Invalid)
    }

    pub fn is_impulse(&self) -> bool {
        matches!(self, Value::Impulse)
    }

    /// `None` for [`Value::Invalid`].
    pub fn value_type(&self) -> Option<ValueType> {
        Some(match self {
            Value::Invalid => return None,
            Value::Impulse => ValueType::Impulse,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Char(_) => ValueType::Char,
            Value::String(_) => ValueType::String,
            Value::Vec2f(_) => ValueType::Vec2f,
            Value::Vec3f(_) => ValueType::Vec3f,
            Value::Vec4f(_) => ValueType::Vec4f,
            Value::List(_) => ValueType::List,
        })
    }

    /// Tag equality, ignoring payloads.
    pub fn same_type(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }
}

macro_rules! accessors {
    ($($name:ident => $variant:ident: $ty:ty),* $(,)?) => {
        impl Value {
            $(
                pub fn $name(&self) -> Option<$ty> {
                    match self {
                        Value::$variant(v) => Some(*v),
                        _ => None,
                    }
                }
            )*
        }

        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

accessors! {
    as_bool => Bool: bool,
    as_int => Int: i32,
    as_float => Float: f32,
    as_char => Char: char,
    as_vec2f => Vec2f: [f32; 2],
    as_vec3f => Vec3f: [f32; 3],
    as_vec4f => Vec4f: [f32; 4],
}

impl From<Impulse> for Value {
    fn from(_: Impulse) -> Self {
        Value::Impulse
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v as f32)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Impulse, _) | (_, Impulse) => true,
            (Invalid, Invalid) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Vec2f(a), Vec2f(b)) => a == b,
            (Vec3f(a), Vec3f(b)) => a == b,
            (Vec4f(a), Vec4f(b)) => a == b,
            (List(a), List(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Value {
    /// Same-type values order naturally (lists lexicographically). Values of
    /// different types are unordered, except that an impulse compares equal
    /// to everything.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Impulse, _) | (_, Impulse) => Some(Ordering::Equal),
            (Invalid, Invalid) => Some(Ordering::Equal),
            (Bool(a), Bool(b)) => a.partial_cmp(b),
            (Int(a), Int(b)) => a.partial_cmp(b),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Char(a), Char(b)) => a.partial_cmp(b),
            (String(a), String(b)) => a.partial_cmp(b),
            (Vec2f(a), Vec2f(b)) => a.partial_cmp(b),
            (Vec3f(a), Vec3f(b)) => a.partial_cmp(b),
            (Vec4f(a), Vec4f(b)) => a.partial_cmp(b),
            (List(a), List(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

fn write_floats(f: &mut fmt::Formatter<'_>, v: &[f32]) -> fmt::Result {
    f.write_str("[")?;
    for (i, x) in v.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{x}")?;
    }
    f.write_str("]")
}

impl fmt::Display for Value {
    /// Strings print raw at top level and quoted inside lists.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Invalid => f.write_str("<invalid>"),
            Value::Impulse => f.write_str("impulse"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::String(s) => f.write_str(s),
            Value::Vec2f(v) => write_floats(f, v),
            Value::Vec3f(v) => write_floats(f, v),
            Value::Vec4f(v) => write_floats(f, v),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match item {
                        Value::String(s) => write!(f, "{s:?}")?,
                        Value::Char(c) => write!(f, "{c:?}")?,
                        other => write!(f, "{other}")?,
                    }
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn impulse_absorbs_comparisons() {
        let samples = [
            Value::Int(3),
            Value::Float(-1.5),
            Value::String("x".into()),
            Value::Vec3f([1.0, 2.0, 3.0]),
            Value::List(vec![Value::Bool(true)]),
            Value::Invalid,
        ];
        for v in &samples {
            assert_eq!(Value::Impulse, *v);
            assert_eq!(*v, Value::Impulse);
            assert!(Value::Impulse <= *v);
            assert!(Value::Impulse >= *v);
            assert!(!(Value::Impulse < *v));
        }
    }

    #[test]
    fn cross_type_values_are_unequal_and_unordered() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Int(1).partial_cmp(&Value::Float(1.0)), None);
        assert!(Value::Int(1) < Value::Int(2));
        assert!(Value::from("a") < Value::from("b"));
    }

    #[test]
    fn default_values_match_their_type() {
        for t in ValueType::iter() {
            assert_eq!(t.default_value().value_type(), Some(t));
        }
        assert_eq!(Value::default().value_type(), None);
    }

    #[test]
    fn type_names_parse_back() {
        for t in ValueType::iter() {
            let name: &'static str = t.into();
            assert_eq!(name.parse::<ValueType>().ok(), Some(t));
        }
        assert_eq!("VEC3F".parse::<ValueType>().ok(), Some(ValueType::Vec3f));
    }

    #[test]
    fn display() {
        assert_eq!(Value::Vec2f([1.0, 2.5]).to_string(), "[1, 2.5]");
        assert_eq!(
            Value::List(vec![Value::Int(1), "a".into()]).to_string(),
            "[1, \"a\"]"
        );
    }

    #[test]
    fn json_shape() {
        let v = Value::Vec2f([0.5, 1.0]);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"type":"vec2f","value":[0.5,1.0]}"#);
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);

        let imp: Value = serde_json::from_str(r#"{"type":"impulse"}"#).unwrap();
        assert!(imp.is_impulse());
    }
}
