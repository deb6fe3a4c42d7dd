//! The tagged dynamic value carried by instructions and properties (spec §3, §9).
//!
//! Numeric casts and string compares on a `Value` only ever happen on the
//! control thread: node property setters consult `Value` when validating
//! `SET_PROPERTY` instructions, never from inside `process`.

use std::collections::BTreeMap;
use std::sync::Arc;
use ecow::EcoString;

/// A name used as a map key: node property names, shared-resource names, event kinds.
pub type Name = EcoString;

/// An immutable, reference-counted block of `f32` samples, used both for
/// shared immutable resources (sample data, tables) and for array-valued
/// properties (`seq`'s step array, `sparseq`'s event list encoded as pairs).
pub type FloatArray = Arc<[f32]>;

/// A tagged dynamic value. Mirrors the wire-format `Value` of spec.md §3/§6.1.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    /// A raw byte buffer, e.g. for binary blobs referenced by property values.
    Bytes(Arc<[u8]>),
    /// A contiguous block of floats, e.g. sample data or a `seq` step array.
    FloatArray(FloatArray),
    Map(BTreeMap<Name, Value>),
    /// Functions are part of the client-facing `Value` union (spec §3) but are
    /// never produced or consumed by the runtime core; they only matter to
    /// the (out of scope) client-side tree builder.
    Function,
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        self.as_f64().map(|v| v as f32)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.as_f64().map(|v| v as i32)
    }

    pub fn as_usize(&self) -> Option<usize> {
        self.as_f64().and_then(|v| {
            if v >= 0.0 {
                Some(v as usize)
            } else {
                None
            }
        })
    }

    pub fn as_float_array(&self) -> Option<&FloatArray> {
        match self {
            Value::FloatArray(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<Name, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Bytes(_) => "bytes",
            Value::FloatArray(_) => "float_array",
            Value::Map(_) => "map",
            Value::Function => "function",
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}
impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Number(v as f64)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(v as f64)
    }
}
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(String::from(v))
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}
impl From<Vec<f32>> for Value {
    fn from(v: Vec<f32>) -> Self {
        Value::FloatArray(Arc::from(v.into_boxed_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_casts_are_control_thread_only_but_pure() {
        let v = Value::Number(3.5);
        assert_eq!(v.as_f32(), Some(3.5));
        assert_eq!(v.as_i32(), Some(3));
        assert_eq!(Value::Bool(true).as_f64(), Some(1.0));
    }

    #[test]
    fn wrong_type_casts_return_none() {
        let v = Value::String("hi".into());
        assert_eq!(v.as_f64(), None);
        assert_eq!(v.as_bool(), None);
    }
}
