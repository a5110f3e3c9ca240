//! Numeric operations for WebAssembly
//!
//! Constants and arithmetic for all four value types. Integer arithmetic
//! wraps; division and remainder trap on a zero divisor, and signed division
//! also traps when the quotient doesn't fit. Float arithmetic is plain
//! IEEE-754 except where min, max and nearest need WebAssembly's NaN and
//! signed-zero rules.

use super::*;

// ============================================================================
// Constants
// ============================================================================

pub fn i32_const(stack: &mut Stack, value: i32) -> Result<(), RuntimeError> {
    stack.push(Value::I32(value));
    Ok(())
}

pub fn i64_const(stack: &mut Stack, value: i64) -> Result<(), RuntimeError> {
    stack.push(Value::I64(value));
    Ok(())
}

pub fn f32_const(stack: &mut Stack, value: f32) -> Result<(), RuntimeError> {
    stack.push(Value::F32(value));
    Ok(())
}

pub fn f64_const(stack: &mut Stack, value: f64) -> Result<(), RuntimeError> {
    stack.push(Value::F64(value));
    Ok(())
}

// ============================================================================
// Integer arithmetic
// ============================================================================

pub fn i32_add(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| Ok(c1.wrapping_add(c2)))
}

pub fn i32_sub(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| Ok(c1.wrapping_sub(c2)))
}

pub fn i32_mul(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| Ok(c1.wrapping_mul(c2)))
}

/// i32.div_s: traps on a zero divisor and on `i32::MIN / -1`
pub fn i32_div_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| {
        if c2 == 0 {
            return Err(Trap::DivisionByZero);
        }
        c1.checked_div(c2).ok_or(Trap::IntegerOverflow)
    })
}

pub fn i32_div_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| {
        (c1 as u32)
            .checked_div(c2 as u32)
            .map(|q| q as i32)
            .ok_or(Trap::DivisionByZero)
    })
}

/// i32.rem_s: the result takes the sign of the dividend; `i32::MIN % -1` is 0
pub fn i32_rem_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| {
        if c2 == 0 {
            return Err(Trap::DivisionByZero);
        }
        Ok(c1.wrapping_rem(c2))
    })
}

pub fn i32_rem_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i32, c2: i32| {
        (c1 as u32)
            .checked_rem(c2 as u32)
            .map(|r| r as i32)
            .ok_or(Trap::DivisionByZero)
    })
}

pub fn i64_add(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| Ok(c1.wrapping_add(c2)))
}

pub fn i64_sub(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| Ok(c1.wrapping_sub(c2)))
}

pub fn i64_mul(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| Ok(c1.wrapping_mul(c2)))
}

pub fn i64_div_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| {
        if c2 == 0 {
            return Err(Trap::DivisionByZero);
        }
        c1.checked_div(c2).ok_or(Trap::IntegerOverflow)
    })
}

pub fn i64_div_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| {
        (c1 as u64)
            .checked_div(c2 as u64)
            .map(|q| q as i64)
            .ok_or(Trap::DivisionByZero)
    })
}

pub fn i64_rem_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| {
        if c2 == 0 {
            return Err(Trap::DivisionByZero);
        }
        Ok(c1.wrapping_rem(c2))
    })
}

pub fn i64_rem_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|c1: i64, c2: i64| {
        (c1 as u64)
            .checked_rem(c2 as u64)
            .map(|r| r as i64)
            .ok_or(Trap::DivisionByZero)
    })
}

// ============================================================================
// Float arithmetic
// ============================================================================

fn min_f32(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        f32::NAN
    } else if a == b {
        // -0.0 and 0.0 compare equal; min prefers the negative one
        if a.is_sign_negative() {
            a
        } else {
            b
        }
    } else {
        a.min(b)
    }
}

fn max_f32(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        f32::NAN
    } else if a == b {
        if a.is_sign_positive() {
            a
        } else {
            b
        }
    } else {
        a.max(b)
    }
}

fn min_f64(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == b {
        if a.is_sign_negative() {
            a
        } else {
            b
        }
    } else {
        a.min(b)
    }
}

fn max_f64(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == b {
        if a.is_sign_positive() {
            a
        } else {
            b
        }
    } else {
        a.max(b)
    }
}

pub fn f32_abs(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|a: f32| Ok(a.abs()))
}

pub fn f32_neg(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|a: f32| Ok(-a))
}

pub fn f32_ceil(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|a: f32| Ok(a.ceil()))
}

pub fn f32_floor(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|a: f32| Ok(a.floor()))
}

pub fn f32_trunc(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|a: f32| Ok(a.trunc()))
}

/// f32.nearest: round to nearest, ties to even
pub fn f32_nearest(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|a: f32| Ok(a.round_ties_even()))
}

pub fn f32_sqrt(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|a: f32| Ok(a.sqrt()))
}

pub fn f32_add(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f32, b: f32| Ok(a + b))
}

pub fn f32_sub(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f32, b: f32| Ok(a - b))
}

pub fn f32_mul(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f32, b: f32| Ok(a * b))
}

/// f32.div: division by zero gives an infinity or NaN, never a trap
pub fn f32_div(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f32, b: f32| Ok(a / b))
}

pub fn f32_min(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f32, b: f32| Ok(min_f32(a, b)))
}

pub fn f32_max(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f32, b: f32| Ok(max_f32(a, b)))
}

pub fn f32_copysign(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f32, b: f32| Ok(a.copysign(b)))
}

pub fn f64_abs(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|a: f64| Ok(a.abs()))
}

pub fn f64_neg(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|a: f64| Ok(-a))
}

pub fn f64_ceil(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|a: f64| Ok(a.ceil()))
}

pub fn f64_floor(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|a: f64| Ok(a.floor()))
}

pub fn f64_trunc(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|a: f64| Ok(a.trunc()))
}

pub fn f64_nearest(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|a: f64| Ok(a.round_ties_even()))
}

pub fn f64_sqrt(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.unary(|a: f64| Ok(a.sqrt()))
}

pub fn f64_add(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f64, b: f64| Ok(a + b))
}

pub fn f64_sub(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f64, b: f64| Ok(a - b))
}

pub fn f64_mul(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f64, b: f64| Ok(a * b))
}

pub fn f64_div(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f64, b: f64| Ok(a / b))
}

pub fn f64_min(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f64, b: f64| Ok(min_f64(a, b)))
}

pub fn f64_max(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f64, b: f64| Ok(max_f64(a, b)))
}

pub fn f64_copysign(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.binary(|a: f64, b: f64| Ok(a.copysign(b)))
}
