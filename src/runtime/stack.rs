//! WebAssembly operand stack implementation

use super::{RuntimeError, Trap, Value};
use crate::parser::module::ValueType;

/// A Rust type that can sit on the operand stack
pub trait StackValue: Sized + Into<Value> {
    const TYPE: ValueType;
    fn from_value(value: Value) -> Option<Self>;
}

impl StackValue for i32 {
    const TYPE: ValueType = ValueType::I32;
    fn from_value(value: Value) -> Option<Self> {
        value.as_i32()
    }
}

impl StackValue for i64 {
    const TYPE: ValueType = ValueType::I64;
    fn from_value(value: Value) -> Option<Self> {
        value.as_i64()
    }
}

impl StackValue for f32 {
    const TYPE: ValueType = ValueType::F32;
    fn from_value(value: Value) -> Option<Self> {
        value.as_f32()
    }
}

impl StackValue for f64 {
    const TYPE: ValueType = ValueType::F64;
    fn from_value(value: Value) -> Option<Self> {
        value.as_f64()
    }
}

/// The operand stack shared by every activation of one invocation
#[derive(Debug, Default)]
pub struct Stack {
    values: Vec<Value>,
}

impl Stack {
    pub fn new() -> Self {
        Stack { values: Vec::new() }
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn push_all(&mut self, values: impl IntoIterator<Item = Value>) {
        self.values.extend(values);
    }

    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.values.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Pop a value of a statically known type
    pub fn pop_typed<T: StackValue>(&mut self) -> Result<T, RuntimeError> {
        let value = self.pop()?;
        T::from_value(value).ok_or(RuntimeError::TypeMismatch {
            expected: T::TYPE,
            actual: value.typ(),
        })
    }

    pub fn pop_i32(&mut self) -> Result<i32, RuntimeError> {
        self.pop_typed()
    }

    pub fn pop_i64(&mut self) -> Result<i64, RuntimeError> {
        self.pop_typed()
    }

    /// Pop the top `n` values, returned bottom first
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, RuntimeError> {
        if n > self.values.len() {
            return Err(RuntimeError::StackUnderflow);
        }
        Ok(self.values.split_off(self.values.len() - n))
    }

    /// Drop everything above `height`
    pub fn truncate(&mut self, height: usize) {
        self.values.truncate(height);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn peek(&self) -> Option<&Value> {
        self.values.last()
    }

    /// `t.unop`, `t.testop` and `cvtop`: pop one operand, push one result
    pub fn unary<A, R, F>(&mut self, op: F) -> Result<(), RuntimeError>
    where
        A: StackValue,
        R: Into<Value>,
        F: FnOnce(A) -> Result<R, Trap>,
    {
        let c = self.pop_typed::<A>()?;
        self.push(op(c)?.into());
        Ok(())
    }

    /// `t.binop` and `t.relop`: pop c2 then c1, push `op(c1, c2)`
    pub fn binary<A, R, F>(&mut self, op: F) -> Result<(), RuntimeError>
    where
        A: StackValue,
        R: Into<Value>,
        F: FnOnce(A, A) -> Result<R, Trap>,
    {
        let c2 = self.pop_typed::<A>()?;
        let c1 = self.pop_typed::<A>()?;
        self.push(op(c1, c2)?.into());
        Ok(())
    }
}
