//! WebAssembly value representation
//!
//! Inside the interpreter every value is a raw `u64` word. `Value` is the
//! typed view used at the API boundary; `to_word` and `from_word` convert
//! between the two. 32-bit values occupy the low half of the word with the
//! upper half zero.

use crate::parser::module::ValueType;
use fhex::ToHex;
use std::fmt;

/// Runtime representation of WebAssembly values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    /// Get the WebAssembly type of this value
    pub fn typ(&self) -> ValueType {
        match self {
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
        }
    }

    /// The zero value of a type
    pub fn default_for(typ: ValueType) -> Value {
        Value::from_word(typ, 0)
    }

    /// Encode as an operand-stack word
    pub fn to_word(&self) -> u64 {
        match self {
            Value::I32(v) => *v as u32 as u64,
            Value::I64(v) => *v as u64,
            Value::F32(v) => v.to_bits() as u64,
            Value::F64(v) => v.to_bits(),
        }
    }

    /// Decode an operand-stack word; upper bits are ignored for 32-bit types
    pub fn from_word(typ: ValueType, word: u64) -> Value {
        match typ {
            ValueType::I32 => Value::I32(word as u32 as i32),
            ValueType::I64 => Value::I64(word as i64),
            ValueType::F32 => Value::F32(f32::from_bits(word as u32)),
            ValueType::F64 => Value::F64(f64::from_bits(word)),
        }
    }

    /// Decode a list of words against their types
    pub fn from_words(types: &[ValueType], words: &[u64]) -> Vec<Value> {
        types.iter().zip(words).map(|(t, w)| Value::from_word(*t, *w)).collect()
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
