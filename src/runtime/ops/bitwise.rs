//! Bitwise operations for WebAssembly
//!
//! Shift and rotate counts are taken modulo the operand width.

use super::*;

pub fn i32_and(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| Ok(c1 & c2))
}

pub fn i32_or(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| Ok(c1 | c2))
}

pub fn i32_xor(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| Ok(c1 ^ c2))
}

pub fn i32_shl(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| Ok(c1.wrapping_shl(c2 as u32)))
}

/// i32.shr_s: arithmetic shift, fills with the sign bit
pub fn i32_shr_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| Ok(c1.wrapping_shr(c2 as u32)))
}

/// i32.shr_u: logical shift, fills with zeros
pub fn i32_shr_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| Ok((c1 as u32).wrapping_shr(c2 as u32) as i32))
}

pub fn i32_rotl(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| Ok(c1.rotate_left(c2 as u32 % 32)))
}

pub fn i32_rotr(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| Ok(c1.rotate_right(c2 as u32 % 32)))
}

pub fn i32_clz(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i32| Ok(c.leading_zeros() as i32))
}

pub fn i32_ctz(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i32| Ok(c.trailing_zeros() as i32))
}

pub fn i32_popcnt(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i32| Ok(c.count_ones() as i32))
}

pub fn i64_and(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| Ok(c1 & c2))
}

pub fn i64_or(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| Ok(c1 | c2))
}

pub fn i64_xor(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| Ok(c1 ^ c2))
}

pub fn i64_shl(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| Ok(c1.wrapping_shl(c2 as u32)))
}

pub fn i64_shr_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| Ok(c1.wrapping_shr(c2 as u32)))
}

pub fn i64_shr_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| Ok((c1 as u64).wrapping_shr(c2 as u32) as i64))
}

pub fn i64_rotl(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| Ok(c1.rotate_left((c2 as u64 % 64) as u32)))
}

pub fn i64_rotr(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| Ok(c1.rotate_right((c2 as u64 % 64) as u32)))
}

pub fn i64_clz(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i64| Ok(c.leading_zeros() as i64))
}

pub fn i64_ctz(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i64| Ok(c.trailing_zeros() as i64))
}

pub fn i64_popcnt(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i64| Ok(c.count_ones() as i64))
}
