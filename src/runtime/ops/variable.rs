//! Variable operations for WebAssembly
//!
//! Locals live in the current [`Frame`]; globals live in the store and are
//! reached through the frame's module instance by the executor, which hands
//! the resolved [`GlobalInstance`] in here.

use super::*;
use crate::runtime::frame::Frame;
use crate::runtime::GlobalInstance;

/// local.get x
pub fn local_get(stack: &mut Stack, frame: &Frame, local_idx: u32) -> Result<(), RuntimeError> {
    stack.push(frame.local(local_idx)?);
    Ok(())
}

/// local.set x
pub fn local_set(stack: &mut Stack, frame: &mut Frame, local_idx: u32) -> Result<(), RuntimeError> {
    let value = stack.pop()?;
    frame.set_local(local_idx, value)
}

/// local.tee x: like local.set but leaves the value on the stack
pub fn local_tee(stack: &mut Stack, frame: &mut Frame, local_idx: u32) -> Result<(), RuntimeError> {
    let value = stack.pop()?;
    frame.set_local(local_idx, value)?;
    stack.push(value);
    Ok(())
}

/// global.get x
pub fn global_get(stack: &mut Stack, global: &GlobalInstance) -> Result<(), RuntimeError> {
    stack.push(global.get());
    Ok(())
}

/// global.set x
pub fn global_set(stack: &mut Stack, global: &mut GlobalInstance) -> Result<(), RuntimeError> {
    let value = stack.pop()?;
    global.set(value)
}
