//! WebAssembly runtime implementation
//!
//! This module provides the execution engine for WebAssembly modules: the
//! store that owns every instance, instantiation and linking, the operand
//! stack machine, value representation, and the instruction interpreter.

pub mod code;
pub mod control;
pub mod executor;
pub mod frame;
pub mod global;
pub mod memory;
pub mod ops;
pub mod stack;
pub mod store;
pub mod table;
#[cfg(test)]
pub mod test_utils;
pub mod value;
pub mod vm;

pub use global::GlobalInstance;
pub use memory::{MemoryInstance, PAGE_SIZE};
pub use stack::Stack;
pub use store::{
    ExportInstance, ExternVal, FuncAddr, FunctionInstance, GlobalAddr, HostFunc, MemAddr, ModuleAddr,
    ModuleInstance, Store, TableAddr,
};
pub use table::TableInstance;
pub use value::Value;
pub use vm::Vm;

use crate::parser::module::{ExternType, ValueType};
use crate::parser::validate::ValidationError;

/// Nested calls deeper than this trap with [`Trap::CallStackExhausted`].
/// Calls are kept on the heap, so the limit does not depend on the size of
/// the native stack.
pub const MAX_CALL_DEPTH: usize = 1024;

/// Execution-time aborts defined by WebAssembly semantics.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Trap {
    #[error("unreachable")]
    Unreachable,
    #[error("integer divide by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid conversion to integer")]
    InvalidConversion,
    #[error("out of bounds memory access")]
    OutOfBoundsMemoryAccess,
    #[error("undefined element")]
    UndefinedElement,
    #[error("uninitialized element")]
    UninitializedElement,
    #[error("indirect call type mismatch")]
    IndirectCallTypeMismatch,
    #[error("call stack exhausted")]
    CallStackExhausted,
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("invalid module: {0}")]
    Validation(#[from] ValidationError),
    #[error("import count mismatch: module expects {expected}, given {given}")]
    ImportCountMismatch { expected: usize, given: usize },
    #[error("incompatible import type: expected {expected}, given {given}")]
    ExternTypeMismatch { expected: ExternType, given: ExternType },
    #[error("table initialization out of bounds")]
    TableInitOutOfBounds,
    #[error("memory initialization out of bounds")]
    MemoryInitOutOfBounds,
    #[error("argument count mismatch: expected {expected}, given {given}")]
    ArgumentCountMismatch { expected: usize, given: usize },
    #[error("argument type mismatch: expected {expected}, given {given}")]
    ArgumentTypeMismatch { expected: ValueType, given: ValueType },
    #[error("table too big")]
    TableTooBig,
    #[error("memory too big")]
    MemoryTooBig,
    #[error("trap: {0}")]
    Trap(#[from] Trap),
    #[error("stack underflow")]
    StackUnderflow,
    #[error("operand type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: ValueType, actual: ValueType },
    #[error("unknown export {0:?}")]
    UnknownExport(String),
    #[error("host function returned {given} values, expected {expected}")]
    HostResultMismatch { expected: usize, given: usize },
    #[error("global is immutable")]
    ImmutableGlobal,
    #[error("invalid {0} address")]
    InvalidAddress(&'static str),
    #[error("invalid {kind} index {index}")]
    InvalidIndex { kind: &'static str, index: u32 },
}
