//! Parametric operations for WebAssembly

use super::*;

/// drop
pub fn drop(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.pop()?;
    Ok(())
}

/// select: pop c, then val2, then val1; push val1 if c is non-zero, else val2
pub fn select(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i32()?;
    let val2 = stack.pop()?;
    let val1 = stack.pop()?;
    stack.push(if c != 0 { val1 } else { val2 });
    Ok(())
}
