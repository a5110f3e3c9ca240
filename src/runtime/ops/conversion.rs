//! Conversion operations for WebAssembly
//!
//! Float to integer truncation traps: NaN is an invalid conversion, and a
//! value whose truncation doesn't fit the target is an integer overflow.
//! Reinterpretations relabel the bits without changing them.

use super::*;

const TWO_POW_31: f64 = 2_147_483_648.0;
const TWO_POW_32: f64 = 4_294_967_296.0;
const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

/// Truncate toward zero, requiring `min <= trunc(x) < max_exclusive`. Every
/// f32 is exactly representable as an f64, so f32 sources come through here
/// too.
fn trunc_checked(x: f64, min: f64, max_exclusive: f64) -> Result<f64, Trap> {
    if x.is_nan() {
        return Err(Trap::InvalidConversion);
    }
    let t = x.trunc();
    if t < min || t >= max_exclusive {
        return Err(Trap::IntegerOverflow);
    }
    Ok(t)
}

fn trunc_i32_s(x: f64) -> Result<i32, Trap> {
    trunc_checked(x, -TWO_POW_31, TWO_POW_31).map(|t| t as i32)
}

fn trunc_i32_u(x: f64) -> Result<i32, Trap> {
    trunc_checked(x, 0.0, TWO_POW_32).map(|t| t as u32 as i32)
}

fn trunc_i64_s(x: f64) -> Result<i64, Trap> {
    trunc_checked(x, -TWO_POW_63, TWO_POW_63).map(|t| t as i64)
}

fn trunc_i64_u(x: f64) -> Result<i64, Trap> {
    trunc_checked(x, 0.0, TWO_POW_64).map(|t| t as u64 as i64)
}

pub fn i32_wrap_i64(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i64| Ok(c as i32))
}

pub fn i64_extend_i32_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i32| Ok(c as i64))
}

pub fn i64_extend_i32_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i32| Ok(c as u32 as i64))
}

pub fn i32_trunc_f32_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|x: f32| trunc_i32_s(x as f64))
}

pub fn i32_trunc_f32_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|x: f32| trunc_i32_u(x as f64))
}

pub fn i32_trunc_f64_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(trunc_i32_s)
}

pub fn i32_trunc_f64_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(trunc_i32_u)
}

pub fn i64_trunc_f32_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|x: f32| trunc_i64_s(x as f64))
}

pub fn i64_trunc_f32_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|x: f32| trunc_i64_u(x as f64))
}

pub fn i64_trunc_f64_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(trunc_i64_s)
}

pub fn i64_trunc_f64_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(trunc_i64_u)
}

pub fn f32_convert_i32_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i32| Ok(c as f32))
}

pub fn f32_convert_i32_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i32| Ok(c as u32 as f32))
}

pub fn f32_convert_i64_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i64| Ok(c as f32))
}

pub fn f32_convert_i64_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i64| Ok(c as u64 as f32))
}

pub fn f32_demote_f64(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|x: f64| Ok(x as f32))
}

pub fn f64_convert_i32_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i32| Ok(c as f64))
}

pub fn f64_convert_i32_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i32| Ok(c as u32 as f64))
}

pub fn f64_convert_i64_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i64| Ok(c as f64))
}

pub fn f64_convert_i64_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i64| Ok(c as u64 as f64))
}

pub fn f64_promote_f32(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|x: f32| Ok(x as f64))
}

pub fn i32_reinterpret_f32(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|x: f32| Ok(x.to_bits() as i32))
}

pub fn i64_reinterpret_f64(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|x: f64| Ok(x.to_bits() as i64))
}

pub fn f32_reinterpret_i32(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i32| Ok(f32::from_bits(c as u32)))
}

pub fn f64_reinterpret_i64(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i64| Ok(f64::from_bits(c as u64)))
}
