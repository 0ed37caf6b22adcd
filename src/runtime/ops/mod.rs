//! Handlers for IR operations
//!
//! Each handler pops its operands from the untyped [`Stack`], reinterprets
//! the words as the operation's type and pushes the result. Handlers that
//! can trap return a `Result`; the rest are infallible.

pub mod bitwise;
pub mod comparison;
pub mod conversion;
pub mod memory;
pub mod numeric;

pub(crate) use crate::ir::{FloatType, IntType, NumType, SignedInt, SignedType};
pub(crate) use crate::runtime::stack::Stack;
pub(crate) use crate::runtime::{RuntimeError, TrapKind};

pub(crate) const F32_SIGN: u64 = 0x8000_0000;
pub(crate) const F64_SIGN: u64 = 0x8000_0000_0000_0000;
