//! Bitwise logic, shifts and rotations
//!
//! Shift and rotate counts are taken modulo the operand width.

use super::*;

pub fn and(stack: &mut Stack, _t: IntType) {
    // 32-bit operands have zero upper halves, so one word operation covers both widths
    let c2 = stack.pop();
    let c1 = stack.pop();
    stack.push(c1 & c2);
}

pub fn or(stack: &mut Stack, _t: IntType) {
    let c2 = stack.pop();
    let c1 = stack.pop();
    stack.push(c1 | c2);
}

pub fn xor(stack: &mut Stack, _t: IntType) {
    let c2 = stack.pop();
    let c1 = stack.pop();
    stack.push(c1 ^ c2);
}

pub fn shl(stack: &mut Stack, t: IntType) {
    let c2 = stack.pop();
    let c1 = stack.pop();
    match t {
        IntType::I32 => stack.push_u32((c1 as u32).wrapping_shl(c2 as u32)),
        IntType::I64 => stack.push(c1.wrapping_shl(c2 as u32)),
    }
}

pub fn shr(stack: &mut Stack, t: SignedInt) {
    let c2 = stack.pop();
    let c1 = stack.pop();
    match t {
        SignedInt::I32 => stack.push_i32((c1 as u32 as i32).wrapping_shr(c2 as u32)),
        SignedInt::U32 => stack.push_u32((c1 as u32).wrapping_shr(c2 as u32)),
        SignedInt::I64 => stack.push_i64((c1 as i64).wrapping_shr(c2 as u32)),
        SignedInt::U64 => stack.push(c1.wrapping_shr(c2 as u32)),
    }
}

pub fn rotl(stack: &mut Stack, t: IntType) {
    let c2 = stack.pop();
    let c1 = stack.pop();
    match t {
        IntType::I32 => stack.push_u32((c1 as u32).rotate_left(c2 as u32 % 32)),
        IntType::I64 => stack.push(c1.rotate_left((c2 % 64) as u32)),
    }
}

pub fn rotr(stack: &mut Stack, t: IntType) {
    let c2 = stack.pop();
    let c1 = stack.pop();
    match t {
        IntType::I32 => stack.push_u32((c1 as u32).rotate_right(c2 as u32 % 32)),
        IntType::I64 => stack.push(c1.rotate_right((c2 % 64) as u32)),
    }
}
