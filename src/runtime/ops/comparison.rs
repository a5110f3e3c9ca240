//! Comparison operations for WebAssembly
//!
//! Every comparison pushes an i32: 1 when it holds, 0 otherwise. Float
//! comparisons are IEEE-754 ones, so anything involving NaN is false except
//! `ne`.

use super::*;

fn flag(b: bool) -> Result<i32, Trap> {
    Ok(i32::from(b))
}

pub fn i32_eqz(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i32| flag(c == 0))
}

pub fn i32_eq(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| flag(c1 == c2))
}

pub fn i32_ne(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| flag(c1 != c2))
}

pub fn i32_lt_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| flag(c1 < c2))
}

pub fn i32_lt_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| flag((c1 as u32) < (c2 as u32)))
}

pub fn i32_gt_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| flag(c1 > c2))
}

pub fn i32_gt_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| flag((c1 as u32) > (c2 as u32)))
}

pub fn i32_le_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| flag(c1 <= c2))
}

pub fn i32_le_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| flag((c1 as u32) <= (c2 as u32)))
}

pub fn i32_ge_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| flag(c1 >= c2))
}

pub fn i32_ge_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| flag((c1 as u32) >= (c2 as u32)))
}

pub fn i64_eqz(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|c: i64| flag(c == 0))
}

pub fn i64_eq(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| flag(c1 == c2))
}

pub fn i64_ne(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| flag(c1 != c2))
}

pub fn i64_lt_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| flag(c1 < c2))
}

pub fn i64_lt_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| flag((c1 as u64) < (c2 as u64)))
}

pub fn i64_gt_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| flag(c1 > c2))
}

pub fn i64_gt_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| flag((c1 as u64) > (c2 as u64)))
}

pub fn i64_le_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| flag(c1 <= c2))
}

pub fn i64_le_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| flag((c1 as u64) <= (c2 as u64)))
}

pub fn i64_ge_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| flag(c1 >= c2))
}

pub fn i64_ge_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| flag((c1 as u64) >= (c2 as u64)))
}

pub fn f32_eq(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f32, b: f32| flag(a == b))
}

pub fn f32_ne(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f32, b: f32| flag(a != b))
}

pub fn f32_lt(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f32, b: f32| flag(a < b))
}

pub fn f32_gt(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f32, b: f32| flag(a > b))
}

pub fn f32_le(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f32, b: f32| flag(a <= b))
}

pub fn f32_ge(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f32, b: f32| flag(a >= b))
}

pub fn f64_eq(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f64, b: f64| flag(a == b))
}

pub fn f64_ne(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f64, b: f64| flag(a != b))
}

pub fn f64_lt(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f64, b: f64| flag(a < b))
}

pub fn f64_gt(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f64, b: f64| flag(a > b))
}

pub fn f64_le(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f64, b: f64| flag(a <= b))
}

pub fn f64_ge(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f64, b: f64| flag(a >= b))
}
