//! Arithmetic operations
//!
//! Integer arithmetic wraps. Division traps on a zero divisor and on the one
//! unrepresentable quotient (`MIN / -1`); the matching remainder is defined
//! as zero. Float `abs`, `neg` and `copysign` touch only the sign bit, so NaN
//! payloads pass through unchanged.

use super::*;

pub fn add(stack: &mut Stack, t: NumType) {
    match t {
        NumType::I32 => {
            let (c1, c2) = pop2_u32(stack);
            stack.push_u32(c1.wrapping_add(c2));
        }
        NumType::I64 => {
            let c2 = stack.pop();
            let c1 = stack.pop();
            stack.push(c1.wrapping_add(c2));
        }
        NumType::F32 => {
            let c2 = stack.pop_f32();
            let c1 = stack.pop_f32();
            stack.push_f32(c1 + c2);
        }
        NumType::F64 => {
            let c2 = stack.pop_f64();
            let c1 = stack.pop_f64();
            stack.push_f64(c1 + c2);
        }
    }
}

pub fn sub(stack: &mut Stack, t: NumType) {
    match t {
        NumType::I32 => {
            let (c1, c2) = pop2_u32(stack);
            stack.push_u32(c1.wrapping_sub(c2));
        }
        NumType::I64 => {
            let c2 = stack.pop();
            let c1 = stack.pop();
            stack.push(c1.wrapping_sub(c2));
        }
        NumType::F32 => {
            let c2 = stack.pop_f32();
            let c1 = stack.pop_f32();
            stack.push_f32(c1 - c2);
        }
        NumType::F64 => {
            let c2 = stack.pop_f64();
            let c1 = stack.pop_f64();
            stack.push_f64(c1 - c2);
        }
    }
}

pub fn mul(stack: &mut Stack, t: NumType) {
    match t {
        NumType::I32 => {
            let (c1, c2) = pop2_u32(stack);
            stack.push_u32(c1.wrapping_mul(c2));
        }
        NumType::I64 => {
            let c2 = stack.pop();
            let c1 = stack.pop();
            stack.push(c1.wrapping_mul(c2));
        }
        NumType::F32 => {
            let c2 = stack.pop_f32();
            let c1 = stack.pop_f32();
            stack.push_f32(c1 * c2);
        }
        NumType::F64 => {
            let c2 = stack.pop_f64();
            let c1 = stack.pop_f64();
            stack.push_f64(c1 * c2);
        }
    }
}

/// Traps with `IntegerDivideByZero` on a zero divisor and `IntegerOverflow`
/// for signed `MIN / -1`. Float division follows IEEE 754.
pub fn div(stack: &mut Stack, t: SignedType) -> Result<(), RuntimeError> {
    match t {
        SignedType::I32 => {
            let c2 = stack.pop_i32();
            let c1 = stack.pop_i32();
            if c2 == 0 {
                return Err(TrapKind::IntegerDivideByZero.into());
            }
            if c1 == i32::MIN && c2 == -1 {
                return Err(TrapKind::IntegerOverflow.into());
            }
            stack.push_i32(c1 / c2);
        }
        SignedType::U32 => {
            let (c1, c2) = pop2_u32(stack);
            if c2 == 0 {
                return Err(TrapKind::IntegerDivideByZero.into());
            }
            stack.push_u32(c1 / c2);
        }
        SignedType::I64 => {
            let c2 = stack.pop_i64();
            let c1 = stack.pop_i64();
            if c2 == 0 {
                return Err(TrapKind::IntegerDivideByZero.into());
            }
            if c1 == i64::MIN && c2 == -1 {
                return Err(TrapKind::IntegerOverflow.into());
            }
            stack.push_i64(c1 / c2);
        }
        SignedType::U64 => {
            let c2 = stack.pop();
            let c1 = stack.pop();
            if c2 == 0 {
                return Err(TrapKind::IntegerDivideByZero.into());
            }
            stack.push(c1 / c2);
        }
        SignedType::F32 => {
            let c2 = stack.pop_f32();
            let c1 = stack.pop_f32();
            stack.push_f32(c1 / c2);
        }
        SignedType::F64 => {
            let c2 = stack.pop_f64();
            let c1 = stack.pop_f64();
            stack.push_f64(c1 / c2);
        }
    }
    Ok(())
}

/// Remainder takes the sign of the dividend; `rem_s(MIN, -1)` is 0.
pub fn rem(stack: &mut Stack, t: SignedInt) -> Result<(), RuntimeError> {
    match t {
        SignedInt::I32 => {
            let c2 = stack.pop_i32();
            let c1 = stack.pop_i32();
            if c2 == 0 {
                return Err(TrapKind::IntegerDivideByZero.into());
            }
            stack.push_i32(c1.wrapping_rem(c2));
        }
        SignedInt::U32 => {
            let (c1, c2) = pop2_u32(stack);
            if c2 == 0 {
                return Err(TrapKind::IntegerDivideByZero.into());
            }
            stack.push_u32(c1 % c2);
        }
        SignedInt::I64 => {
            let c2 = stack.pop_i64();
            let c1 = stack.pop_i64();
            if c2 == 0 {
                return Err(TrapKind::IntegerDivideByZero.into());
            }
            stack.push_i64(c1.wrapping_rem(c2));
        }
        SignedInt::U64 => {
            let c2 = stack.pop();
            let c1 = stack.pop();
            if c2 == 0 {
                return Err(TrapKind::IntegerDivideByZero.into());
            }
            stack.push(c1 % c2);
        }
    }
    Ok(())
}

pub fn clz(stack: &mut Stack, t: IntType) {
    match t {
        IntType::I32 => {
            let v = stack.pop_u32();
            stack.push_u32(v.leading_zeros());
        }
        IntType::I64 => {
            let v = stack.pop();
            stack.push(v.leading_zeros() as u64);
        }
    }
}

pub fn ctz(stack: &mut Stack, t: IntType) {
    match t {
        IntType::I32 => {
            let v = stack.pop_u32();
            stack.push_u32(v.trailing_zeros());
        }
        IntType::I64 => {
            let v = stack.pop();
            stack.push(v.trailing_zeros() as u64);
        }
    }
}

pub fn popcnt(stack: &mut Stack, t: IntType) {
    match t {
        IntType::I32 => {
            let v = stack.pop_u32();
            stack.push_u32(v.count_ones());
        }
        IntType::I64 => {
            let v = stack.pop();
            stack.push(v.count_ones() as u64);
        }
    }
}

pub fn abs(stack: &mut Stack, t: FloatType) {
    let v = stack.pop();
    stack.push(v & !sign_bit(t));
}

pub fn neg(stack: &mut Stack, t: FloatType) {
    let v = stack.pop();
    stack.push(v ^ sign_bit(t));
}

pub fn copysign(stack: &mut Stack, t: FloatType) {
    let sign = sign_bit(t);
    let c2 = stack.pop();
    let c1 = stack.pop();
    stack.push((c1 & !sign) | (c2 & sign));
}

pub fn ceil(stack: &mut Stack, t: FloatType) {
    float_unary(stack, t, f32::ceil, f64::ceil);
}

pub fn floor(stack: &mut Stack, t: FloatType) {
    float_unary(stack, t, f32::floor, f64::floor);
}

pub fn trunc(stack: &mut Stack, t: FloatType) {
    float_unary(stack, t, f32::trunc, f64::trunc);
}

/// Round to nearest, ties to even
pub fn nearest(stack: &mut Stack, t: FloatType) {
    float_unary(stack, t, f32::round_ties_even, f64::round_ties_even);
}

pub fn sqrt(stack: &mut Stack, t: FloatType) {
    float_unary(stack, t, f32::sqrt, f64::sqrt);
}

/// NaN if either operand is NaN; -0 is less than +0
pub fn min(stack: &mut Stack, t: FloatType) {
    match t {
        FloatType::F32 => {
            let c2 = stack.pop_f32();
            let c1 = stack.pop_f32();
            let result = if c1.is_nan() || c2.is_nan() {
                f32::NAN
            } else if c1 == 0.0 && c2 == 0.0 {
                f32::from_bits(c1.to_bits() | c2.to_bits())
            } else {
                c1.min(c2)
            };
            stack.push_f32(result);
        }
        FloatType::F64 => {
            let c2 = stack.pop_f64();
            let c1 = stack.pop_f64();
            let result = if c1.is_nan() || c2.is_nan() {
                f64::NAN
            } else if c1 == 0.0 && c2 == 0.0 {
                f64::from_bits(c1.to_bits() | c2.to_bits())
            } else {
                c1.min(c2)
            };
            stack.push_f64(result);
        }
    }
}

/// NaN if either operand is NaN; +0 is greater than -0
pub fn max(stack: &mut Stack, t: FloatType) {
    match t {
        FloatType::F32 => {
            let c2 = stack.pop_f32();
            let c1 = stack.pop_f32();
            let result = if c1.is_nan() || c2.is_nan() {
                f32::NAN
            } else if c1 == 0.0 && c2 == 0.0 {
                f32::from_bits(c1.to_bits() & c2.to_bits())
            } else {
                c1.max(c2)
            };
            stack.push_f32(result);
        }
        FloatType::F64 => {
            let c2 = stack.pop_f64();
            let c1 = stack.pop_f64();
            let result = if c1.is_nan() || c2.is_nan() {
                f64::NAN
            } else if c1 == 0.0 && c2 == 0.0 {
                f64::from_bits(c1.to_bits() & c2.to_bits())
            } else {
                c1.max(c2)
            };
            stack.push_f64(result);
        }
    }
}

fn float_unary(stack: &mut Stack, t: FloatType, f32_op: fn(f32) -> f32, f64_op: fn(f64) -> f64) {
    match t {
        FloatType::F32 => {
            let v = stack.pop_f32();
            stack.push_f32(f32_op(v));
        }
        FloatType::F64 => {
            let v = stack.pop_f64();
            stack.push_f64(f64_op(v));
        }
    }
}

fn sign_bit(t: FloatType) -> u64 {
    match t {
        FloatType::F32 => F32_SIGN,
        FloatType::F64 => F64_SIGN,
    }
}

fn pop2_u32(stack: &mut Stack) -> (u32, u32) {
    let c2 = stack.pop_u32();
    let c1 = stack.pop_u32();
    (c1, c2)
}
