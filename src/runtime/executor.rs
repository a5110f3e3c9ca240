//! WebAssembly instruction executor
//!
//! Functions run from their laid-out [`Code`](super::code::Code). Each call is an [`Activation`]
//! on the executor's own call stack and each `block`, `loop` or `if` a label
//! inside it, so nesting and recursion cost heap, not native stack. Every
//! other instruction is dispatched to its implementation under [`ops`].

use super::{
    code::Op,
    control::{Label, LabelType},
    frame::{Activation, Frame},
    ops::{self, control::BlockEnd},
    stack::Stack,
    store::{FuncAddr, FunctionInstance, MemAddr, ModuleInstance, Store},
    RuntimeError, Trap, Value, MAX_CALL_DEPTH,
};
use crate::parser::instruction::Instruction;
use crate::parser::module::{FunctionType, ValueType};
use log::trace;
use std::rc::Rc;

/// What the current activation asks of the call loop after one op
enum Flow {
    Continue,
    Call(FuncAddr),
    Return,
}

/// Runs functions against a store. An executor lives for one top-level
/// invocation; its operand stack is shared by every nested call.
pub struct Executor<'s> {
    store: &'s mut Store,
    stack: Stack,
}

impl<'s> Executor<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Executor {
            store,
            stack: Stack::new(),
        }
    }

    /// Call the function at `addr` with `args`, checking them against its type
    /// before anything runs.
    pub fn invoke(&mut self, addr: FuncAddr, args: &[Value]) -> Result<Vec<Value>, RuntimeError> {
        let func_type = self.store.function(addr)?.func_type().clone();
        if args.len() != func_type.parameters.len() {
            return Err(RuntimeError::ArgumentCountMismatch {
                expected: func_type.parameters.len(),
                given: args.len(),
            });
        }
        for (arg, expected) in args.iter().zip(&func_type.parameters) {
            if arg.typ() != *expected {
                return Err(RuntimeError::ArgumentTypeMismatch {
                    expected: *expected,
                    given: arg.typ(),
                });
            }
        }

        let height = self.stack.len();
        self.stack.push_all(args.iter().copied());
        self.call(addr)?;
        let results = self.stack.pop_n(func_type.return_types.len())?;
        self.stack.truncate(height);
        Ok(results)
    }

    /// Evaluate a constant expression in the scope of `module`
    pub fn eval_const(
        &mut self,
        module: Rc<ModuleInstance>,
        expr: &[Instruction],
        result: ValueType,
    ) -> Result<Value, RuntimeError> {
        let mut frame = Frame {
            locals: Vec::new(),
            module,
        };
        for instruction in expr {
            self.execute_plain(&mut frame, instruction)?;
        }
        let value = self.stack.pop()?;
        if value.typ() != result {
            return Err(RuntimeError::TypeMismatch {
                expected: result,
                actual: value.typ(),
            });
        }
        Ok(value)
    }

    /// Call a function whose arguments are already on the stack, leaving its
    /// results in their place. Nested calls are pushed onto `calls` and run
    /// by this same loop.
    fn call(&mut self, addr: FuncAddr) -> Result<(), RuntimeError> {
        let mut calls: Vec<Activation> = Vec::new();
        if let Some(activation) = self.enter(addr)? {
            calls.push(activation);
        }

        while let Some(act) = calls.last_mut() {
            let code = Rc::clone(&act.code);
            let flow = match code.ops.get(act.pc) {
                Some(op) => {
                    act.pc += 1;
                    self.step(act, op)?
                }
                None => Flow::Return,
            };

            match flow {
                Flow::Continue => {}
                Flow::Call(callee) => {
                    if let Some(activation) = self.enter(callee)? {
                        if calls.len() >= MAX_CALL_DEPTH {
                            return Err(Trap::CallStackExhausted.into());
                        }
                        calls.push(activation);
                    }
                }
                Flow::Return => {
                    if let Some(done) = calls.pop() {
                        self.leave(&done)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Start a call. Host functions run to completion right away; module
    /// functions get an activation for the call loop to step through.
    fn enter(&mut self, addr: FuncAddr) -> Result<Option<Activation>, RuntimeError> {
        let (func_type, module, code) = match self.store.function(addr)? {
            FunctionInstance::Host { func_type, callback } => {
                trace!("invoke host func {} {}", addr.0, func_type);
                let args = self.stack.pop_n(func_type.parameters.len())?;
                let results = callback(&args)?;
                check_results(func_type, &results)?;
                self.stack.push_all(results);
                return Ok(None);
            }
            FunctionInstance::Module {
                func_type,
                module,
                code,
            } => (func_type, *module, Rc::clone(code)),
        };
        trace!("invoke func {} {}", addr.0, func_type);

        let mut locals = self.stack.pop_n(func_type.parameters.len())?;
        locals.extend(code.locals.iter().map(|t| Value::zero(*t)));
        let arity = func_type.return_types.len();
        let frame = Frame {
            locals,
            module: self.store.module(module)?,
        };
        let height = self.stack.len();
        let end = code.ops.len();
        let mut activation = Activation::new(arity, frame, code, height);
        activation
            .labels
            .push(Label::new(LabelType::Function, arity, height, end));
        Ok(Some(activation))
    }

    /// Running off the end, `return` and a branch to the function's own label
    /// all leave the results on top.
    fn leave(&mut self, activation: &Activation) -> Result<(), RuntimeError> {
        let results = self.stack.pop_n(activation.arity)?;
        self.stack.truncate(activation.stack_height);
        self.stack.push_all(results);
        Ok(())
    }

    fn step(&mut self, act: &mut Activation, op: &Op) -> Result<Flow, RuntimeError> {
        match op {
            Op::Block { arity, end } => {
                act.labels
                    .push(Label::new(LabelType::Block, *arity, self.stack.len(), end + 1))
            }
            // pc has already moved past the loop op
            Op::Loop => act
                .labels
                .push(Label::new(LabelType::Loop, 0, self.stack.len(), act.pc - 1)),
            Op::If { arity, else_pc, end } => {
                let condition = self.stack.pop_i32()?;
                act.labels
                    .push(Label::new(LabelType::If, *arity, self.stack.len(), end + 1));
                if condition == 0 {
                    act.pc = else_pc + 1;
                }
            }
            Op::Else { end } => act.pc = *end,
            Op::End => {
                act.labels.pop();
            }
            Op::Instr(instruction) => return self.execute_instruction(act, instruction),
        }
        Ok(Flow::Continue)
    }

    fn execute_instruction(&mut self, act: &mut Activation, instruction: &Instruction) -> Result<Flow, RuntimeError> {
        let end = match instruction {
            Instruction::Unreachable => ops::control::unreachable()?,
            Instruction::Nop => BlockEnd::Normal,
            Instruction::Br { label_idx } => ops::control::br(&mut self.stack, &act.labels, *label_idx)?,
            Instruction::BrIf { label_idx } => ops::control::br_if(&mut self.stack, &act.labels, *label_idx)?,
            Instruction::BrTable { labels, default } => {
                ops::control::br_table(&mut self.stack, &act.labels, labels, *default)?
            }
            Instruction::Return => BlockEnd::Return,
            Instruction::Call { func_idx } => return Ok(Flow::Call(act.frame.module.func_addr(*func_idx)?)),
            Instruction::CallIndirect { type_idx } => {
                return Ok(Flow::Call(self.resolve_indirect(&act.frame.module, *type_idx)?))
            }
            _ => {
                self.execute_plain(&mut act.frame, instruction)?;
                BlockEnd::Normal
            }
        };
        Self::branch(act, end)
    }

    /// Follow a branch that has already unwound the operand stack
    fn branch(act: &mut Activation, end: BlockEnd) -> Result<Flow, RuntimeError> {
        match end {
            BlockEnd::Normal => Ok(Flow::Continue),
            BlockEnd::Return => Ok(Flow::Return),
            BlockEnd::Branch(depth) => {
                let label = act.labels.branch_to(depth).ok_or(RuntimeError::InvalidIndex {
                    kind: "label",
                    index: depth,
                })?;
                if label.label_type == LabelType::Function {
                    return Ok(Flow::Return);
                }
                act.pc = label.continuation;
                Ok(Flow::Continue)
            }
        }
    }

    /// Pop the table index for `call_indirect` and find the function there,
    /// trapping unless its type matches `type_idx` exactly.
    fn resolve_indirect(&mut self, module: &ModuleInstance, type_idx: u32) -> Result<FuncAddr, RuntimeError> {
        let expected = module.func_type(type_idx)?;
        let table = self.store.table(module.table_addr(0)?)?;
        let index = self.stack.pop_i32()? as u32;
        let addr = table.get(index)?;
        if self.store.function(addr)?.func_type() != expected {
            return Err(Trap::IndirectCallTypeMismatch.into());
        }
        Ok(addr)
    }

    fn memory_addr(frame: &Frame) -> Result<MemAddr, RuntimeError> {
        frame.module.mem_addr(0)
    }

    fn execute_plain(&mut self, frame: &mut Frame, instruction: &Instruction) -> Result<(), RuntimeError> {
        use Instruction::*;
        let stack = &mut self.stack;

        match instruction {
            // Parametric
            Drop => ops::parametric::drop(stack),
            Select => ops::parametric::select(stack),

            // Variable
            LocalGet { local_idx } => ops::variable::local_get(stack, frame, *local_idx),
            LocalSet { local_idx } => ops::variable::local_set(stack, frame, *local_idx),
            LocalTee { local_idx } => ops::variable::local_tee(stack, frame, *local_idx),
            GlobalGet { global_idx } => {
                let addr = frame.module.global_addr(*global_idx)?;
                ops::variable::global_get(stack, self.store.global(addr)?)
            }
            GlobalSet { global_idx } => {
                let addr = frame.module.global_addr(*global_idx)?;
                ops::variable::global_set(stack, self.store.global_mut(addr)?)
            }

            // Memory
            I32Load { memarg } => ops::memory::i32_load(stack, self.store.memory(Self::memory_addr(frame)?)?, memarg),
            I64Load { memarg } => ops::memory::i64_load(stack, self.store.memory(Self::memory_addr(frame)?)?, memarg),
            F32Load { memarg } => ops::memory::f32_load(stack, self.store.memory(Self::memory_addr(frame)?)?, memarg),
            F64Load { memarg } => ops::memory::f64_load(stack, self.store.memory(Self::memory_addr(frame)?)?, memarg),
            I32Load8S { memarg } => {
                ops::memory::i32_load8_s(stack, self.store.memory(Self::memory_addr(frame)?)?, memarg)
            }
            I32Load8U { memarg } => {
                ops::memory::i32_load8_u(stack, self.store.memory(Self::memory_addr(frame)?)?, memarg)
            }
            I32Load16S { memarg } => {
                ops::memory::i32_load16_s(stack, self.store.memory(Self::memory_addr(frame)?)?, memarg)
            }
            I32Load16U { memarg } => {
                ops::memory::i32_load16_u(stack, self.store.memory(Self::memory_addr(frame)?)?, memarg)
            }
            I64Load8S { memarg } => {
                ops::memory::i64_load8_s(stack, self.store.memory(Self::memory_addr(frame)?)?, memarg)
            }
            I64Load8U { memarg } => {
                ops::memory::i64_load8_u(stack, self.store.memory(Self::memory_addr(frame)?)?, memarg)
            }
            I64Load16S { memarg } => {
                ops::memory::i64_load16_s(stack, self.store.memory(Self::memory_addr(frame)?)?, memarg)
            }
            I64Load16U { memarg } => {
                ops::memory::i64_load16_u(stack, self.store.memory(Self::memory_addr(frame)?)?, memarg)
            }
            I64Load32S { memarg } => {
                ops::memory::i64_load32_s(stack, self.store.memory(Self::memory_addr(frame)?)?, memarg)
            }
            I64Load32U { memarg } => {
                ops::memory::i64_load32_u(stack, self.store.memory(Self::memory_addr(frame)?)?, memarg)
            }
            I32Store { memarg } => {
                ops::memory::i32_store(stack, self.store.memory_mut(Self::memory_addr(frame)?)?, memarg)
            }
            I64Store { memarg } => {
                ops::memory::i64_store(stack, self.store.memory_mut(Self::memory_addr(frame)?)?, memarg)
            }
            F32Store { memarg } => {
                ops::memory::f32_store(stack, self.store.memory_mut(Self::memory_addr(frame)?)?, memarg)
            }
            F64Store { memarg } => {
                ops::memory::f64_store(stack, self.store.memory_mut(Self::memory_addr(frame)?)?, memarg)
            }
            I32Store8 { memarg } => {
                ops::memory::i32_store8(stack, self.store.memory_mut(Self::memory_addr(frame)?)?, memarg)
            }
            I32Store16 { memarg } => {
                ops::memory::i32_store16(stack, self.store.memory_mut(Self::memory_addr(frame)?)?, memarg)
            }
            I64Store8 { memarg } => {
                ops::memory::i64_store8(stack, self.store.memory_mut(Self::memory_addr(frame)?)?, memarg)
            }
            I64Store16 { memarg } => {
                ops::memory::i64_store16(stack, self.store.memory_mut(Self::memory_addr(frame)?)?, memarg)
            }
            I64Store32 { memarg } => {
                ops::memory::i64_store32(stack, self.store.memory_mut(Self::memory_addr(frame)?)?, memarg)
            }
            MemorySize => ops::memory::memory_size(stack, self.store.memory(Self::memory_addr(frame)?)?),
            MemoryGrow => ops::memory::memory_grow(stack, self.store.memory_mut(Self::memory_addr(frame)?)?),

            // Constants
            I32Const { value } => ops::numeric::i32_const(stack, *value),
            I64Const { value } => ops::numeric::i64_const(stack, *value),
            F32Const { value } => ops::numeric::f32_const(stack, *value),
            F64Const { value } => ops::numeric::f64_const(stack, *value),

            // Comparison
            I32Eqz => ops::comparison::i32_eqz(stack),
            I32Eq => ops::comparison::i32_eq(stack),
            I32Ne => ops::comparison::i32_ne(stack),
            I32LtS => ops::comparison::i32_lt_s(stack),
            I32LtU => ops::comparison::i32_lt_u(stack),
            I32GtS => ops::comparison::i32_gt_s(stack),
            I32GtU => ops::comparison::i32_gt_u(stack),
            I32LeS => ops::comparison::i32_le_s(stack),
            I32LeU => ops::comparison::i32_le_u(stack),
            I32GeS => ops::comparison::i32_ge_s(stack),
            I32GeU => ops::comparison::i32_ge_u(stack),
            I64Eqz => ops::comparison::i64_eqz(stack),
            I64Eq => ops::comparison::i64_eq(stack),
            I64Ne => ops::comparison::i64_ne(stack),
            I64LtS => ops::comparison::i64_lt_s(stack),
            I64LtU => ops::comparison::i64_lt_u(stack),
            I64GtS => ops::comparison::i64_gt_s(stack),
            I64GtU => ops::comparison::i64_gt_u(stack),
            I64LeS => ops::comparison::i64_le_s(stack),
            I64LeU => ops::comparison::i64_le_u(stack),
            I64GeS => ops::comparison::i64_ge_s(stack),
            I64GeU => ops::comparison::i64_ge_u(stack),
            F32Eq => ops::comparison::f32_eq(stack),
            F32Ne => ops::comparison::f32_ne(stack),
            F32Lt => ops::comparison::f32_lt(stack),
            F32Gt => ops::comparison::f32_gt(stack),
            F32Le => ops::comparison::f32_le(stack),
            F32Ge => ops::comparison::f32_ge(stack),
            F64Eq => ops::comparison::f64_eq(stack),
            F64Ne => ops::comparison::f64_ne(stack),
            F64Lt => ops::comparison::f64_lt(stack),
            F64Gt => ops::comparison::f64_gt(stack),
            F64Le => ops::comparison::f64_le(stack),
            F64Ge => ops::comparison::f64_ge(stack),

            // Integer arithmetic and bitwise
            I32Clz => ops::bitwise::i32_clz(stack),
            I32Ctz => ops::bitwise::i32_ctz(stack),
            I32Popcnt => ops::bitwise::i32_popcnt(stack),
            I32Add => ops::numeric::i32_add(stack),
            I32Sub => ops::numeric::i32_sub(stack),
            I32Mul => ops::numeric::i32_mul(stack),
            I32DivS => ops::numeric::i32_div_s(stack),
            I32DivU => ops::numeric::i32_div_u(stack),
            I32RemS => ops::numeric::i32_rem_s(stack),
            I32RemU => ops::numeric::i32_rem_u(stack),
            I32And => ops::bitwise::i32_and(stack),
            I32Or => ops::bitwise::i32_or(stack),
            I32Xor => ops::bitwise::i32_xor(stack),
            I32Shl => ops::bitwise::i32_shl(stack),
            I32ShrS => ops::bitwise::i32_shr_s(stack),
            I32ShrU => ops::bitwise::i32_shr_u(stack),
            I32Rotl => ops::bitwise::i32_rotl(stack),
            I32Rotr => ops::bitwise::i32_rotr(stack),
            I64Clz => ops::bitwise::i64_clz(stack),
            I64Ctz => ops::bitwise::i64_ctz(stack),
            I64Popcnt => ops::bitwise::i64_popcnt(stack),
            I64Add => ops::numeric::i64_add(stack),
            I64Sub => ops::numeric::i64_sub(stack),
            I64Mul => ops::numeric::i64_mul(stack),
            I64DivS => ops::numeric::i64_div_s(stack),
            I64DivU => ops::numeric::i64_div_u(stack),
            I64RemS => ops::numeric::i64_rem_s(stack),
            I64RemU => ops::numeric::i64_rem_u(stack),
            I64And => ops::bitwise::i64_and(stack),
            I64Or => ops::bitwise::i64_or(stack),
            I64Xor => ops::bitwise::i64_xor(stack),
            I64Shl => ops::bitwise::i64_shl(stack),
            I64ShrS => ops::bitwise::i64_shr_s(stack),
            I64ShrU => ops::bitwise::i64_shr_u(stack),
            I64Rotl => ops::bitwise::i64_rotl(stack),
            I64Rotr => ops::bitwise::i64_rotr(stack),

            // Float arithmetic
            F32Abs => ops::numeric::f32_abs(stack),
            F32Neg => ops::numeric::f32_neg(stack),
            F32Ceil => ops::numeric::f32_ceil(stack),
            F32Floor => ops::numeric::f32_floor(stack),
            F32Trunc => ops::numeric::f32_trunc(stack),
            F32Nearest => ops::numeric::f32_nearest(stack),
            F32Sqrt => ops::numeric::f32_sqrt(stack),
            F32Add => ops::numeric::f32_add(stack),
            F32Sub => ops::numeric::f32_sub(stack),
            F32Mul => ops::numeric::f32_mul(stack),
            F32Div => ops::numeric::f32_div(stack),
            F32Min => ops::numeric::f32_min(stack),
            F32Max => ops::numeric::f32_max(stack),
            F32Copysign => ops::numeric::f32_copysign(stack),
            F64Abs => ops::numeric::f64_abs(stack),
            F64Neg => ops::numeric::f64_neg(stack),
            F64Ceil => ops::numeric::f64_ceil(stack),
            F64Floor => ops::numeric::f64_floor(stack),
            F64Trunc => ops::numeric::f64_trunc(stack),
            F64Nearest => ops::numeric::f64_nearest(stack),
            F64Sqrt => ops::numeric::f64_sqrt(stack),
            F64Add => ops::numeric::f64_add(stack),
            F64Sub => ops::numeric::f64_sub(stack),
            F64Mul => ops::numeric::f64_mul(stack),
            F64Div => ops::numeric::f64_div(stack),
            F64Min => ops::numeric::f64_min(stack),
            F64Max => ops::numeric::f64_max(stack),
            F64Copysign => ops::numeric::f64_copysign(stack),

            // Conversions
            I32WrapI64 => ops::conversion::i32_wrap_i64(stack),
            I32TruncF32S => ops::conversion::i32_trunc_f32_s(stack),
            I32TruncF32U => ops::conversion::i32_trunc_f32_u(stack),
            I32TruncF64S => ops::conversion::i32_trunc_f64_s(stack),
            I32TruncF64U => ops::conversion::i32_trunc_f64_u(stack),
            I64ExtendI32S => ops::conversion::i64_extend_i32_s(stack),
            I64ExtendI32U => ops::conversion::i64_extend_i32_u(stack),
            I64TruncF32S => ops::conversion::i64_trunc_f32_s(stack),
            I64TruncF32U => ops::conversion::i64_trunc_f32_u(stack),
            I64TruncF64S => ops::conversion::i64_trunc_f64_s(stack),
            I64TruncF64U => ops::conversion::i64_trunc_f64_u(stack),
            F32ConvertI32S => ops::conversion::f32_convert_i32_s(stack),
            F32ConvertI32U => ops::conversion::f32_convert_i32_u(stack),
            F32ConvertI64S => ops::conversion::f32_convert_i64_s(stack),
            F32ConvertI64U => ops::conversion::f32_convert_i64_u(stack),
            F32DemoteF64 => ops::conversion::f32_demote_f64(stack),
            F64ConvertI32S => ops::conversion::f64_convert_i32_s(stack),
            F64ConvertI32U => ops::conversion::f64_convert_i32_u(stack),
            F64ConvertI64S => ops::conversion::f64_convert_i64_s(stack),
            F64ConvertI64U => ops::conversion::f64_convert_i64_u(stack),
            F64PromoteF32 => ops::conversion::f64_promote_f32(stack),
            I32ReinterpretF32 => ops::conversion::i32_reinterpret_f32(stack),
            I64ReinterpretF64 => ops::conversion::i64_reinterpret_f64(stack),
            F32ReinterpretI32 => ops::conversion::f32_reinterpret_i32(stack),
            F64ReinterpretI64 => ops::conversion::f64_reinterpret_i64(stack),

            // Control instructions are handled by execute_instruction
            Unreachable | Nop | Block { .. } | Loop { .. } | If { .. } | Br { .. } | BrIf { .. }
            | BrTable { .. } | Return | Call { .. } | CallIndirect { .. } => {
                unreachable!("control instruction {} dispatched as plain", instruction.mnemonic())
            }
        }
    }
}

/// A host function must return exactly what its type promises.
fn check_results(func_type: &FunctionType, results: &[Value]) -> Result<(), RuntimeError> {
    if results.len() != func_type.return_types.len() {
        return Err(RuntimeError::HostResultMismatch {
            expected: func_type.return_types.len(),
            given: results.len(),
        });
    }
    for (value, expected) in results.iter().zip(&func_type.return_types) {
        if value.typ() != *expected {
            return Err(RuntimeError::TypeMismatch {
                expected: *expected,
                actual: value.typ(),
            });
        }
    }
    Ok(())
}
