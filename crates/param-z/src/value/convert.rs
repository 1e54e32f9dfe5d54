use super::{Value, ValueType};

impl Value {
    /// Converts to `target`. Every conversion is defined:
    ///
    /// - numeric scalars cast into each other; strings parse, falling back
    ///   to zero
    /// - anything prints to a string
    /// - scalars broadcast into vectors; vectors truncate or zero-pad; lists
    ///   contribute their leading elements
    /// - scalars wrap into a one-element list; vectors become float lists
    /// - impulse and invalid become the target's zero value (empty list)
    pub fn convert(&self, target: ValueType) -> Value {
        match target {
            ValueType::Impulse => Value::Impulse,
            ValueType::Bool => Value::Bool(self.to_bool()),
            ValueType::Int => Value::Int(self.to_int()),
            ValueType::Float => Value::Float(self.to_float()),
            ValueType::Char => Value::Char(self.to_char()),
            ValueType::String => Value::String(self.to_plain_string()),
            ValueType::Vec2f => Value::Vec2f(self.to_array()),
            ValueType::Vec3f => Value::Vec3f(self.to_array()),
            ValueType::Vec4f => Value::Vec4f(self.to_array()),
            ValueType::List => Value::List(self.to_list()),
        }
    }

    /// Consuming variant of [`convert`](Self::convert) that avoids a clone
    /// when the value already has the target type.
    pub fn into_type(self, target: ValueType) -> Value {
        if self.value_type() == Some(target) {
            self
        } else {
            self.convert(target)
        }
    }

    /// Conversion used by parameter writes: an impulse stands for "the same
    /// value again" and resolves to `previous`.
    pub(crate) fn convert_with_previous(self, previous: &Value, target: ValueType) -> Value {
        match self {
            Value::Impulse if target != ValueType::Impulse => previous.clone().into_type(target),
            other => other.into_type(target),
        }
    }

    pub fn to_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Char(c) => *c != '\0',
            Value::String(s) => {
                let s = s.trim();
                s.eq_ignore_ascii_case("true") || s.parse::<f64>().is_ok_and(|x| x != 0.0)
            }
            Value::Vec2f(v) => v[0] != 0.0,
            Value::Vec3f(v) => v[0] != 0.0,
            Value::Vec4f(v) => v[0] != 0.0,
            Value::List(l) => l.first().is_some_and(Value::to_bool),
            Value::Impulse | Value::Invalid => false,
        }
    }

    pub fn to_int(&self) -> i32 {
        match self {
            Value::Int(i) => *i,
            Value::Bool(b) => *b as i32,
            Value::Float(f) => *f as i32,
            Value::Char(c) => *c as i32,
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i32>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|x| x as i32))
                    .unwrap_or(0)
            }
            Value::Vec2f(v) => v[0] as i32,
            Value::Vec3f(v) => v[0] as i32,
            Value::Vec4f(v) => v[0] as i32,
            Value::List(l) => l.first().map_or(0, Value::to_int),
            Value::Impulse | Value::Invalid => 0,
        }
    }

    pub fn to_float(&self) -> f32 {
        match self {
            Value::Float(f) => *f,
            Value::Bool(b) => *b as i32 as f32,
            Value::Int(i) => *i as f32,
            Value::Char(c) => *c as u32 as f32,
            Value::String(s) => s.trim().parse::<f32>().unwrap_or(0.0),
            Value::Vec2f(v) => v[0],
            Value::Vec3f(v) => v[0],
            Value::Vec4f(v) => v[0],
            Value::List(l) => l.first().map_or(0.0, Value::to_float),
            Value::Impulse | Value::Invalid => 0.0,
        }
    }

    pub fn to_char(&self) -> char {
        fn from_code(code: f64) -> char {
            if code >= 0.0 && code <= u32::MAX as f64 {
                char::from_u32(code as u32).unwrap_or('\0')
            } else {
                '\0'
            }
        }
        match self {
            Value::Char(c) => *c,
            Value::Bool(b) => char::from(*b as u8),
            Value::Int(i) => from_code(*i as f64),
            Value::Float(f) => from_code(*f as f64),
            Value::String(s) => s.chars().next().unwrap_or('\0'),
            Value::Vec2f(v) => from_code(v[0] as f64),
            Value::Vec3f(v) => from_code(v[0] as f64),
            Value::Vec4f(v) => from_code(v[0] as f64),
            Value::List(l) => l.first().map_or('\0', Value::to_char),
            Value::Impulse | Value::Invalid => '\0',
        }
    }

    /// Text form used by string conversion: like `Display`, but impulse and
    /// invalid print as the empty string.
    pub fn to_plain_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Impulse | Value::Invalid => String::new(),
            other => other.to_string(),
        }
    }

    /// Float components, broadcasting scalars and zero-padding short inputs.
    pub fn to_array<const N: usize>(&self) -> [f32; N] {
        let mut out = [0.0f32; N];
        let copy = |out: &mut [f32; N], src: &[f32]| {
            for (o, s) in out.iter_mut().zip(src) {
                *o = *s;
            }
        };
        match self {
            Value::Vec2f(v) => copy(&mut out, v),
            Value::Vec3f(v) => copy(&mut out, v),
            Value::Vec4f(v) => copy(&mut out, v),
            Value::List(l) => {
                for (o, item) in out.iter_mut().zip(l) {
                    *o = item.to_float();
                }
            }
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Char(_) => {
                out = [self.to_float(); N];
            }
            Value::String(s) => {
                if let Ok(x) = s.trim().parse::<f32>() {
                    out = [x; N];
                }
            }
            Value::Impulse | Value::Invalid => {}
        }
        out
    }

    pub fn to_list(&self) -> Vec<Value> {
        let floats = |v: &[f32]| v.iter().copied().map(Value::Float).collect();
        match self {
            Value::List(l) => l.clone(),
            Value::Vec2f(v) => floats(v),
            Value::Vec3f(v) => floats(v),
            Value::Vec4f(v) => floats(v),
            Value::Impulse | Value::Invalid => Vec::new(),
            scalar => vec![scalar.clone()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn conversion_is_total() {
        let samples = [
            Value::Impulse,
            Value::Bool(true),
            Value::Int(-7),
            Value::Float(2.75),
            Value::Char('A'),
            Value::from("12"),
            Value::Vec2f([1.0, 2.0]),
            Value::Vec4f([1.0, 2.0, 3.0, 4.0]),
            Value::List(vec![Value::Int(3), Value::from("x")]),
        ];
        for v in &samples {
            for t in ValueType::iter() {
                assert_eq!(v.convert(t).value_type(), Some(t), "{v:?} -> {t}");
            }
        }
    }

    #[test]
    fn scalar_casts() {
        assert_eq!(Value::Float(3.9).convert(ValueType::Int), Value::Int(3));
        assert_eq!(Value::Int(0).convert(ValueType::Bool), Value::Bool(false));
        assert_eq!(Value::Char('A').convert(ValueType::Int), Value::Int(65));
        assert_eq!(Value::Int(66).convert(ValueType::Char), Value::Char('B'));
        assert_eq!(Value::Int(-1).convert(ValueType::Char), Value::Char('\0'));
        assert_eq!(Value::from(" 42 ").convert(ValueType::Int), Value::Int(42));
        assert_eq!(Value::from("2.5").convert(ValueType::Int), Value::Int(2));
        assert_eq!(Value::from("nope").convert(ValueType::Float), Value::Float(0.0));
        assert_eq!(Value::from("true").convert(ValueType::Bool), Value::Bool(true));
    }

    #[test]
    fn vector_shapes() {
        assert_eq!(Value::Float(0.5).convert(ValueType::Vec3f), Value::Vec3f([0.5; 3]));
        assert_eq!(
            Value::Vec4f([1.0, 2.0, 3.0, 4.0]).convert(ValueType::Vec2f),
            Value::Vec2f([1.0, 2.0])
        );
        assert_eq!(
            Value::Vec2f([1.0, 2.0]).convert(ValueType::Vec4f),
            Value::Vec4f([1.0, 2.0, 0.0, 0.0])
        );
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Bool(true)]).convert(ValueType::Vec3f),
            Value::Vec3f([1.0, 1.0, 0.0])
        );
        assert_eq!(
            Value::Vec2f([1.0, 2.0]).convert(ValueType::List),
            Value::List(vec![Value::Float(1.0), Value::Float(2.0)])
        );
        assert_eq!(Value::Int(4).convert(ValueType::List), Value::List(vec![Value::Int(4)]));
    }

    #[test]
    fn impulse_resolves_to_previous() {
        let prev = Value::Float(0.25);
        assert_eq!(
            Value::Impulse.convert_with_previous(&prev, ValueType::Float),
            Value::Float(0.25)
        );
        let got = Value::Impulse.convert_with_previous(&prev, ValueType::Int);
        assert!(matches!(got, Value::Int(0)));
        assert!(Value::Impulse
            .convert_with_previous(&prev, ValueType::Impulse)
            .is_impulse());
    }

    #[test]
    fn string_conversion() {
        assert_eq!(Value::Int(5).to_plain_string(), "5");
        assert_eq!(Value::Impulse.to_plain_string(), "");
        assert_eq!(Value::Vec2f([1.0, 0.5]).to_plain_string(), "[1, 0.5]");
    }
}
