//! Test and comparison operations
//!
//! All comparisons push an i32 boolean. Any comparison involving a float NaN
//! is false, except `ne` which is true.

use super::*;

pub fn eqz(stack: &mut Stack, t: IntType) {
    let v = match t {
        IntType::I32 => stack.pop_u32() as u64,
        IntType::I64 => stack.pop(),
    };
    stack.push_bool(v == 0);
}

pub fn eq(stack: &mut Stack, t: NumType) {
    let result = match t {
        NumType::I32 => stack.pop_u32() == stack.pop_u32(),
        NumType::I64 => stack.pop() == stack.pop(),
        NumType::F32 => stack.pop_f32() == stack.pop_f32(),
        NumType::F64 => stack.pop_f64() == stack.pop_f64(),
    };
    stack.push_bool(result);
}

pub fn ne(stack: &mut Stack, t: NumType) {
    let result = match t {
        NumType::I32 => stack.pop_u32() != stack.pop_u32(),
        NumType::I64 => stack.pop() != stack.pop(),
        NumType::F32 => stack.pop_f32() != stack.pop_f32(),
        NumType::F64 => stack.pop_f64() != stack.pop_f64(),
    };
    stack.push_bool(result);
}

pub fn lt(stack: &mut Stack, t: SignedType) {
    compare(stack, t, |o| o == Some(std::cmp::Ordering::Less));
}

pub fn gt(stack: &mut Stack, t: SignedType) {
    compare(stack, t, |o| o == Some(std::cmp::Ordering::Greater));
}

pub fn le(stack: &mut Stack, t: SignedType) {
    compare(stack, t, |o| matches!(o, Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)));
}

pub fn ge(stack: &mut Stack, t: SignedType) {
    compare(stack, t, |o| {
        matches!(o, Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal))
    });
}

/// Pop `c2` then `c1` and push `accept(c1.partial_cmp(c2))`
fn compare(stack: &mut Stack, t: SignedType, accept: impl Fn(Option<std::cmp::Ordering>) -> bool) {
    let c2 = stack.pop();
    let c1 = stack.pop();
    let ordering = match t {
        SignedType::I32 => (c1 as u32 as i32).partial_cmp(&(c2 as u32 as i32)),
        SignedType::U32 => (c1 as u32).partial_cmp(&(c2 as u32)),
        SignedType::I64 => (c1 as i64).partial_cmp(&(c2 as i64)),
        SignedType::U64 => c1.partial_cmp(&c2),
        SignedType::F32 => f32::from_bits(c1 as u32).partial_cmp(&f32::from_bits(c2 as u32)),
        SignedType::F64 => f64::from_bits(c1).partial_cmp(&f64::from_bits(c2)),
    };
    stack.push_bool(accept(ordering));
}
