//! Type conversion operations
//!
//! Conversions include:
//! - Integer width conversions (wrap, extend) and in-place sign extension
//! - Float width conversions (promote, demote)
//! - Integer to float conversions
//! - Float to integer truncation, trapping and saturating
//!
//! Reinterpretations have no handler: on the untyped stack they are no-ops.

use super::*;

/// i32.wrap_i64 - keep the low 32 bits
pub fn i32_wrap_i64(stack: &mut Stack) {
    let v = stack.pop();
    stack.push(v & 0xffff_ffff);
}

/// i64.extend_i32_s / i64.extend_i32_u
pub fn i64_extend_i32(stack: &mut Stack, signed: bool) {
    let v = stack.pop_u32();
    if signed {
        stack.push_i64(v as i32 as i64);
    } else {
        stack.push(v as u64);
    }
}

pub fn sign_extend_32_from_8(stack: &mut Stack) {
    let v = stack.pop();
    stack.push_i32(v as u8 as i8 as i32);
}

pub fn sign_extend_32_from_16(stack: &mut Stack) {
    let v = stack.pop();
    stack.push_i32(v as u16 as i16 as i32);
}

pub fn sign_extend_64_from_8(stack: &mut Stack) {
    let v = stack.pop();
    stack.push_i64(v as u8 as i8 as i64);
}

pub fn sign_extend_64_from_16(stack: &mut Stack) {
    let v = stack.pop();
    stack.push_i64(v as u16 as i16 as i64);
}

pub fn sign_extend_64_from_32(stack: &mut Stack) {
    let v = stack.pop();
    stack.push_i64(v as u32 as i32 as i64);
}

/// Float to integer truncation toward zero
///
/// Saturating: NaN gives 0, values beyond the output range clamp to its
/// minimum or maximum. Trapping: NaN traps with `InvalidConversionToInteger`
/// and out-of-range values with `IntegerOverflow`.
pub fn trunc_float_to_int(
    stack: &mut Stack,
    input: FloatType,
    output: SignedInt,
    saturating: bool,
) -> Result<(), RuntimeError> {
    // every f32 is exactly representable as f64
    let v = match input {
        FloatType::F32 => stack.pop_f32() as f64,
        FloatType::F64 => stack.pop_f64(),
    };

    if !saturating {
        if v.is_nan() {
            return Err(TrapKind::InvalidConversionToInteger.into());
        }
        let t = v.trunc();
        let in_range = match output {
            SignedInt::I32 => (-2147483648.0..2147483648.0).contains(&t),
            SignedInt::U32 => t > -1.0 && t < 4294967296.0,
            SignedInt::I64 => (-9223372036854775808.0..9223372036854775808.0).contains(&t),
            SignedInt::U64 => t > -1.0 && t < 18446744073709551616.0,
        };
        if !in_range {
            return Err(TrapKind::IntegerOverflow.into());
        }
    }

    // `as` truncates toward zero, saturates at the bounds and maps NaN to 0
    match output {
        SignedInt::I32 => stack.push_i32(v as i32),
        SignedInt::U32 => stack.push_u32(v as u32),
        SignedInt::I64 => stack.push_i64(v as i64),
        SignedInt::U64 => stack.push(v as u64),
    }
    Ok(())
}

/// Integer to float conversion, rounding to nearest
pub fn convert_int_to_float(stack: &mut Stack, input: SignedInt, output: FloatType) {
    let v = stack.pop();
    match output {
        FloatType::F32 => stack.push_f32(match input {
            SignedInt::I32 => v as u32 as i32 as f32,
            SignedInt::U32 => v as u32 as f32,
            SignedInt::I64 => v as i64 as f32,
            SignedInt::U64 => v as f32,
        }),
        FloatType::F64 => stack.push_f64(match input {
            SignedInt::I32 => v as u32 as i32 as f64,
            SignedInt::U32 => v as u32 as f64,
            SignedInt::I64 => v as i64 as f64,
            SignedInt::U64 => v as f64,
        }),
    }
}

pub fn f32_demote_f64(stack: &mut Stack) {
    let v = stack.pop_f64();
    stack.push_f32(v as f32);
}

pub fn f64_promote_f32(stack: &mut Stack) {
    let v = stack.pop_f32();
    stack.push_f64(v as f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn trunc_f64(v: f64, output: SignedInt, saturating: bool) -> Result<u64, RuntimeError> {
        let mut stack = Stack::new();
        stack.push_f64(v);
        trunc_float_to_int(&mut stack, FloatType::F64, output, saturating)?;
        Ok(stack.pop())
    }

    fn trunc_f32(v: f32, output: SignedInt, saturating: bool) -> Result<u64, RuntimeError> {
        let mut stack = Stack::new();
        stack.push_f32(v);
        trunc_float_to_int(&mut stack, FloatType::F32, output, saturating)?;
        Ok(stack.pop())
    }

    #[rstest]
    #[case(1.9, SignedInt::I32, 1)]
    #[case(-1.9, SignedInt::I32, 0xffff_ffff)]
    #[case(2147483647.0, SignedInt::I32, 0x7fff_ffff)]
    #[case(-2147483648.9, SignedInt::I32, 0x8000_0000)]
    #[case(-0.9, SignedInt::U32, 0)]
    #[case(4294967295.0, SignedInt::U32, 0xffff_ffff)]
    #[case(-9223372036854775808.0, SignedInt::I64, 0x8000_0000_0000_0000)]
    #[case(18446744073709549568.0, SignedInt::U64, 0xffff_ffff_ffff_f800)]
    fn test_trapping_truncation_in_range(#[case] input: f64, #[case] output: SignedInt, #[case] expected: u64) {
        assert_eq!(trunc_f64(input, output, false), Ok(expected));
    }

    #[rstest]
    #[case(2147483648.0, SignedInt::I32)]
    #[case(-2147483649.0, SignedInt::I32)]
    #[case(-1.0, SignedInt::U32)]
    #[case(4294967296.0, SignedInt::U32)]
    #[case(9223372036854775808.0, SignedInt::I64)]
    #[case(18446744073709551616.0, SignedInt::U64)]
    #[case(f64::INFINITY, SignedInt::I64)]
    #[case(f64::NEG_INFINITY, SignedInt::U64)]
    fn test_trapping_truncation_overflow(#[case] input: f64, #[case] output: SignedInt) {
        assert_eq!(
            trunc_f64(input, output, false),
            Err(RuntimeError::Trap(TrapKind::IntegerOverflow))
        );
    }

    #[test]
    fn test_trapping_truncation_nan() {
        assert_eq!(
            trunc_f32(f32::NAN, SignedInt::I32, false),
            Err(RuntimeError::Trap(TrapKind::InvalidConversionToInteger))
        );
    }

    #[test]
    fn test_saturating_never_traps() {
        assert_eq!(trunc_f32(f32::NAN, SignedInt::U64, true), Ok(0));
        assert_eq!(trunc_f32(f32::INFINITY, SignedInt::I32, true), Ok(0x7fff_ffff));
        assert_eq!(trunc_f64(-1e300, SignedInt::I64, true), Ok(i64::MIN as u64));
        assert_eq!(trunc_f64(-1.0, SignedInt::U32, true), Ok(0));
    }

    #[test]
    fn test_wrap_and_extend() {
        let mut stack = Stack::from(vec![0x1234_5678_9abc_def0]);
        i32_wrap_i64(&mut stack);
        assert_eq!(stack.pop(), 0x9abc_def0);

        let mut stack = Stack::from(vec![0x8000_0000]);
        i64_extend_i32(&mut stack, true);
        assert_eq!(stack.pop(), 0xffff_ffff_8000_0000);

        let mut stack = Stack::from(vec![0x8000_0000]);
        i64_extend_i32(&mut stack, false);
        assert_eq!(stack.pop(), 0x8000_0000);
    }

    #[test]
    fn test_sign_extension_keeps_upper_half_clear() {
        let mut stack = Stack::from(vec![0x80]);
        sign_extend_32_from_8(&mut stack);
        assert_eq!(stack.pop(), 0xffff_ff80);

        let mut stack = Stack::from(vec![0xffff_8000]);
        sign_extend_32_from_16(&mut stack);
        assert_eq!(stack.pop(), 0xffff_8000);
    }

    #[test]
    fn test_int_to_float() {
        let mut stack = Stack::from(vec![0xffff_ffff]);
        convert_int_to_float(&mut stack, SignedInt::I32, FloatType::F64);
        assert_eq!(stack.pop_f64(), -1.0);

        let mut stack = Stack::from(vec![0xffff_ffff]);
        convert_int_to_float(&mut stack, SignedInt::U32, FloatType::F64);
        assert_eq!(stack.pop_f64(), 4294967295.0);

        let mut stack = Stack::from(vec![u64::MAX]);
        convert_int_to_float(&mut stack, SignedInt::U64, FloatType::F32);
        assert_eq!(stack.pop_f32(), 18446744073709551616.0);

        // round to nearest, ties to even
        let mut stack = Stack::from(vec![16777217]);
        convert_int_to_float(&mut stack, SignedInt::I64, FloatType::F32);
        assert_eq!(stack.pop_f32(), 16777216.0);
    }

    #[test]
    fn test_float_width() {
        let mut stack = Stack::new();
        stack.push_f32(1.5);
        f64_promote_f32(&mut stack);
        assert_eq!(stack.pop_f64(), 1.5);

        stack.push_f64(1e300);
        f32_demote_f64(&mut stack);
        assert_eq!(stack.pop_f32(), f32::INFINITY);
    }
}
