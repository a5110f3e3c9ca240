//! Memory operations for WebAssembly
//!
//! Loads pop an i32 base address, stores pop the value and then the base.
//! The effective address is the unsigned base plus the static offset,
//! computed in 64 bits so it can't wrap; anything that runs past the end of
//! memory traps.

use super::*;

fn effective_address(base: i32, memarg: &MemArg) -> u64 {
    base as u32 as u64 + memarg.offset as u64
}

fn load<const N: usize>(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<[u8; N], RuntimeError> {
    let base = stack.pop_i32()?;
    Ok(memory.load::<N>(effective_address(base, memarg))?)
}

fn store<const N: usize>(
    stack: &mut Stack,
    memory: &mut MemoryInstance,
    memarg: &MemArg,
    bytes: [u8; N],
) -> Result<(), RuntimeError> {
    let base = stack.pop_i32()?;
    Ok(memory.store(effective_address(base, memarg), bytes)?)
}

pub fn i32_load(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = i32::from_le_bytes(load(stack, memory, memarg)?);
    stack.push(Value::I32(value));
    Ok(())
}

pub fn i64_load(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = i64::from_le_bytes(load(stack, memory, memarg)?);
    stack.push(Value::I64(value));
    Ok(())
}

pub fn f32_load(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = f32::from_le_bytes(load(stack, memory, memarg)?);
    stack.push(Value::F32(value));
    Ok(())
}

pub fn f64_load(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = f64::from_le_bytes(load(stack, memory, memarg)?);
    stack.push(Value::F64(value));
    Ok(())
}

pub fn i32_load8_s(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = i8::from_le_bytes(load(stack, memory, memarg)?);
    stack.push(Value::I32(value as i32));
    Ok(())
}

pub fn i32_load8_u(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = u8::from_le_bytes(load(stack, memory, memarg)?);
    stack.push(Value::I32(value as i32));
    Ok(())
}

pub fn i32_load16_s(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = i16::from_le_bytes(load(stack, memory, memarg)?);
    stack.push(Value::I32(value as i32));
    Ok(())
}

pub fn i32_load16_u(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = u16::from_le_bytes(load(stack, memory, memarg)?);
    stack.push(Value::I32(value as i32));
    Ok(())
}

pub fn i64_load8_s(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = i8::from_le_bytes(load(stack, memory, memarg)?);
    stack.push(Value::I64(value as i64));
    Ok(())
}

pub fn i64_load8_u(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = u8::from_le_bytes(load(stack, memory, memarg)?);
    stack.push(Value::I64(value as i64));
    Ok(())
}

pub fn i64_load16_s(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = i16::from_le_bytes(load(stack, memory, memarg)?);
    stack.push(Value::I64(value as i64));
    Ok(())
}

pub fn i64_load16_u(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = u16::from_le_bytes(load(stack, memory, memarg)?);
    stack.push(Value::I64(value as i64));
    Ok(())
}

pub fn i64_load32_s(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = i32::from_le_bytes(load(stack, memory, memarg)?);
    stack.push(Value::I64(value as i64));
    Ok(())
}

pub fn i64_load32_u(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = u32::from_le_bytes(load(stack, memory, memarg)?);
    stack.push(Value::I64(value as i64));
    Ok(())
}

pub fn i32_store(stack: &mut Stack, memory: &mut MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_i32()?;
    store(stack, memory, memarg, value.to_le_bytes())
}

pub fn i64_store(stack: &mut Stack, memory: &mut MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_i64()?;
    store(stack, memory, memarg, value.to_le_bytes())
}

pub fn f32_store(stack: &mut Stack, memory: &mut MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_typed::<f32>()?;
    store(stack, memory, memarg, value.to_le_bytes())
}

pub fn f64_store(stack: &mut Stack, memory: &mut MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_typed::<f64>()?;
    store(stack, memory, memarg, value.to_le_bytes())
}

/// i32.store8: stores the low 8 bits
pub fn i32_store8(stack: &mut Stack, memory: &mut MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_i32()?;
    store(stack, memory, memarg, (value as u8).to_le_bytes())
}

pub fn i32_store16(stack: &mut Stack, memory: &mut MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_i32()?;
    store(stack, memory, memarg, (value as u16).to_le_bytes())
}

pub fn i64_store8(stack: &mut Stack, memory: &mut MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_i64()?;
    store(stack, memory, memarg, (value as u8).to_le_bytes())
}

pub fn i64_store16(stack: &mut Stack, memory: &mut MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_i64()?;
    store(stack, memory, memarg, (value as u16).to_le_bytes())
}

pub fn i64_store32(stack: &mut Stack, memory: &mut MemoryInstance, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_i64()?;
    store(stack, memory, memarg, (value as u32).to_le_bytes())
}

/// memory.size: current size in pages
pub fn memory_size(stack: &mut Stack, memory: &MemoryInstance) -> Result<(), RuntimeError> {
    stack.push(Value::I32(memory.size() as i32));
    Ok(())
}

/// memory.grow: push the old size in pages, or -1 if the memory can't grow
pub fn memory_grow(stack: &mut Stack, memory: &mut MemoryInstance) -> Result<(), RuntimeError> {
    let delta = stack.pop_i32()? as u32;
    let result = match memory.grow(delta) {
        Ok(old) => old as i32,
        Err(RuntimeError::MemoryTooBig) => -1,
        Err(e) => return Err(e),
    };
    stack.push(Value::I32(result));
    Ok(())
}
