//! WebAssembly value representation

use crate::parser::module::ValueType;
use fhex::ToHex;
use std::fmt;

/// A value on the operand stack, in a local, or in a global
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    /// The default value of a type; locals and fresh globals start here
    pub fn zero(typ: ValueType) -> Value {
        match typ {
            ValueType::I32 => Value::I32(0),
            ValueType::I64 => Value::I64(0),
            ValueType::F32 => Value::F32(0.0),
            ValueType::F64 => Value::F64(0.0),
        }
    }

    pub fn typ(&self) -> ValueType {
        match self {
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Bitwise equality, so two NaNs with the same payload compare equal
    pub fn bit_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (a, b) => a == b,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "i32:{v}"),
            Value::I64(v) => write!(f, "i64:{v}"),
            Value::F32(v) => write!(f, "f32:{}", v.to_hex()),
            Value::F64(v) => write!(f, "f64:{}", v.to_hex()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero() {
        assert_eq!(Value::zero(ValueType::I32), Value::I32(0));
        assert_eq!(Value::zero(ValueType::F64), Value::F64(0.0));
        assert_eq!(Value::zero(ValueType::I64).typ(), ValueType::I64);
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::I32(42).as_i32(), Some(42));
        assert_eq!(Value::I32(42).as_i64(), None);
        assert_eq!(Value::from(7i64).as_i64(), Some(7));
        assert_eq!(Value::from(1.5f32).as_f32(), Some(1.5));
        assert_eq!(Value::F64(42.0).as_f32(), None);
    }

    #[test]
    fn test_bit_eq() {
        let nan = Value::F32(f32::NAN);
        assert_ne!(nan, nan);
        assert!(nan.bit_eq(&nan));
        assert!(!Value::F64(0.0).bit_eq(&Value::F64(-0.0)));
        assert!(!Value::I32(1).bit_eq(&Value::I64(1)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::I32(-3).to_string(), "i32:-3");
        assert_eq!(Value::I64(9).to_string(), "i64:9");
        assert_eq!(Value::F32(1.0).to_string(), format!("f32:{}", 1.0f32.to_hex()));
    }
}
