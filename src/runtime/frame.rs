//! Call frames
//!
//! A [`Frame`] is what an instruction can see of the function it runs in: its
//! locals and the module instance that resolves its indices. An
//! [`Activation`] adds the bookkeeping the executor needs to step through the
//! function and return from it. Activations live on the executor's call
//! stack, never on the native one.

use super::code::Code;
use super::control::LabelStack;
use super::store::ModuleInstance;
use super::{RuntimeError, Value};
use std::rc::Rc;

#[derive(Debug)]
pub struct Frame {
    /// Parameters followed by declared locals
    pub locals: Vec<Value>,
    pub module: Rc<ModuleInstance>,
}

impl Frame {
    pub fn local(&self, idx: u32) -> Result<Value, RuntimeError> {
        self.locals
            .get(idx as usize)
            .copied()
            .ok_or(RuntimeError::InvalidIndex { kind: "local", index: idx })
    }

    pub fn set_local(&mut self, idx: u32, value: Value) -> Result<(), RuntimeError> {
        let slot = self
            .locals
            .get_mut(idx as usize)
            .ok_or(RuntimeError::InvalidIndex { kind: "local", index: idx })?;
        *slot = value;
        Ok(())
    }
}

#[derive(Debug)]
pub struct Activation {
    /// Number of results the function returns
    pub arity: usize,
    pub frame: Frame,
    pub code: Rc<Code>,
    /// Position of the next op in `code`
    pub pc: usize,
    pub labels: LabelStack,
    /// Operand stack height below this activation's values
    pub stack_height: usize,
}

impl Activation {
    pub fn new(arity: usize, frame: Frame, code: Rc<Code>, stack_height: usize) -> Activation {
        Activation {
            arity,
            frame,
            code,
            pc: 0,
            labels: LabelStack::new(),
            stack_height,
        }
    }
}
