use super::instruction::{BlockType, Instruction, MemArg};
use super::limits;
use super::module::{
    ExportDescriptor, ExternType, FunctionType, GlobalType, ImportDescriptor, Limits, MemoryType,
    Module, TableType, ValueType, ValueType::*,
};
use std::collections::HashSet;
use thiserror::Error;
use MaybeValue::{Unknown, Val};

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("type mismatch")]
    TypeMismatch,

    #[error("unknown type {0}")]
    UnknownType(u32),

    #[error("unknown function {0}")]
    UnknownFunction(u32),

    #[error("unknown table {0}")]
    UnknownTable(u32),

    #[error("unknown memory {0}")]
    UnknownMemory(u32),

    #[error("unknown global {0}")]
    UnknownGlobal(u32),

    #[error("unknown local {0}")]
    UnknownLocal(u32),

    #[error("unknown label {0}")]
    UnknownLabel(u32),

    #[error("global {0} is immutable")]
    ImmutableGlobal(u32),

    #[error("constant expression required")]
    ConstantExpressionRequired,

    #[error("alignment must not be larger than natural")]
    BadAlignment,

    #[error("multiple tables")]
    MultipleTables,

    #[error("multiple memories")]
    MultipleMemories,

    #[error("size minimum must not be greater than maximum")]
    InvalidLimits,

    #[error("memory size must be at most 65536 pages (4GiB)")]
    MemoryTooLarge,

    #[error("duplicate export name {0:?}")]
    DuplicateExport(String),

    #[error("start function must have type [] -> []")]
    InvalidStartFunction,

    #[error("invalid result arity")]
    InvalidResultArity(usize),
}

/// What a valid module needs from its imports and what it offers as exports,
/// in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleSignature {
    pub imports: Vec<ExternType>,
    pub exports: Vec<ExternType>,
}

/// The index spaces of a module, imports first.
struct Context<'a> {
    types: &'a [FunctionType],
    functions: Vec<u32>,
    tables: Vec<TableType>,
    memories: Vec<MemoryType>,
    globals: Vec<GlobalType>,
    imported_globals: usize,
}

impl<'a> Context<'a> {
    fn function_type(&self, fi: u32) -> Result<&'a FunctionType, ValidationError> {
        let type_idx = self
            .functions
            .get(fi as usize)
            .ok_or(ValidationError::UnknownFunction(fi))?;
        self.type_at(*type_idx)
    }

    fn type_at(&self, ti: u32) -> Result<&'a FunctionType, ValidationError> {
        self.types.get(ti as usize).ok_or(ValidationError::UnknownType(ti))
    }

    fn global(&self, gi: u32) -> Result<&GlobalType, ValidationError> {
        self.globals
            .get(gi as usize)
            .ok_or(ValidationError::UnknownGlobal(gi))
    }
}

/// Check a decoded module and compute its import/export signature.
pub fn validate(module: &Module) -> Result<ModuleSignature, ValidationError> {
    for func_type in &module.types {
        if func_type.return_types.len() > 1 {
            return Err(ValidationError::InvalidResultArity(func_type.return_types.len()));
        }
    }

    let mut context = Context {
        types: &module.types,
        functions: module.imported_functions().collect(),
        tables: module.imported_tables().copied().collect(),
        memories: module.imported_memories().copied().collect(),
        globals: module.imported_globals().copied().collect(),
        imported_globals: 0,
    };
    context.imported_globals = context.globals.len();

    let mut imports = Vec::with_capacity(module.imports.len());
    for import in &module.imports {
        let extern_type = match &import.descriptor {
            ImportDescriptor::Function(ti) => ExternType::Function(context.type_at(*ti)?.clone()),
            ImportDescriptor::Table(t) => {
                check_table_type(t)?;
                ExternType::Table(*t)
            }
            ImportDescriptor::Memory(m) => {
                check_memory_type(m)?;
                ExternType::Memory(*m)
            }
            ImportDescriptor::Global(g) => ExternType::Global(*g),
        };
        imports.push(extern_type);
    }

    for function in &module.functions {
        context.type_at(function.type_idx)?;
        context.functions.push(function.type_idx);
    }
    for table in &module.tables {
        check_table_type(table)?;
        context.tables.push(*table);
    }
    for memory in &module.memories {
        check_memory_type(memory)?;
        context.memories.push(*memory);
    }
    if context.tables.len() > 1 {
        return Err(ValidationError::MultipleTables);
    }
    if context.memories.len() > 1 {
        return Err(ValidationError::MultipleMemories);
    }

    // initializers only see imported globals
    for global in &module.globals {
        check_constant_expression(&context, &global.init, global.global_type.value_type)?;
        context.globals.push(global.global_type);
    }

    for function in &module.functions {
        let func_type = context.type_at(function.type_idx)?;
        CodeValidator::new(&context, func_type, &function.locals).validate_function(&function.body)?;
    }

    for element in &module.elements {
        if element.table_idx as usize >= context.tables.len() {
            return Err(ValidationError::UnknownTable(element.table_idx));
        }
        check_constant_expression(&context, &element.offset, I32)?;
        for fi in &element.init {
            if *fi as usize >= context.functions.len() {
                return Err(ValidationError::UnknownFunction(*fi));
            }
        }
    }

    for data in &module.data {
        if data.memory_idx as usize >= context.memories.len() {
            return Err(ValidationError::UnknownMemory(data.memory_idx));
        }
        check_constant_expression(&context, &data.offset, I32)?;
    }

    if let Some(start) = module.start {
        let func_type = context.function_type(start)?;
        if !func_type.parameters.is_empty() || !func_type.return_types.is_empty() {
            return Err(ValidationError::InvalidStartFunction);
        }
    }

    let mut names = HashSet::new();
    let mut exports = Vec::with_capacity(module.exports.len());
    for export in &module.exports {
        if !names.insert(export.name.as_str()) {
            return Err(ValidationError::DuplicateExport(export.name.clone()));
        }
        let extern_type = match export.descriptor {
            ExportDescriptor::Function(fi) => ExternType::Function(context.function_type(fi)?.clone()),
            ExportDescriptor::Table(ti) => ExternType::Table(
                *context
                    .tables
                    .get(ti as usize)
                    .ok_or(ValidationError::UnknownTable(ti))?,
            ),
            ExportDescriptor::Memory(mi) => ExternType::Memory(
                *context
                    .memories
                    .get(mi as usize)
                    .ok_or(ValidationError::UnknownMemory(mi))?,
            ),
            ExportDescriptor::Global(gi) => ExternType::Global(*context.global(gi)?),
        };
        exports.push(extern_type);
    }

    Ok(ModuleSignature { imports, exports })
}

fn check_limits(limits: &Limits) -> Result<(), ValidationError> {
    match limits.max {
        Some(max) if max < limits.min => Err(ValidationError::InvalidLimits),
        _ => Ok(()),
    }
}

fn check_table_type(table: &TableType) -> Result<(), ValidationError> {
    check_limits(&table.limits)
}

fn check_memory_type(memory: &MemoryType) -> Result<(), ValidationError> {
    check_limits(&memory.limits)?;
    if memory.limits.min > limits::MAX_MEMORY_PAGES
        || memory.limits.max.map_or(false, |max| max > limits::MAX_MEMORY_PAGES)
    {
        return Err(ValidationError::MemoryTooLarge);
    }
    Ok(())
}

/// A constant expression is a single `*.const`, or a `global.get` of an
/// imported immutable global.
fn check_constant_expression(
    context: &Context,
    expr: &[Instruction],
    expected: ValueType,
) -> Result<(), ValidationError> {
    let value_type = match expr {
        [Instruction::I32Const { .. }] => I32,
        [Instruction::I64Const { .. }] => I64,
        [Instruction::F32Const { .. }] => F32,
        [Instruction::F64Const { .. }] => F64,
        [Instruction::GlobalGet { global_idx }] => {
            if *global_idx as usize >= context.imported_globals {
                return Err(ValidationError::UnknownGlobal(*global_idx));
            }
            let global = context.global(*global_idx)?;
            if global.mutable {
                return Err(ValidationError::ConstantExpressionRequired);
            }
            global.value_type
        }
        [] => return Err(ValidationError::TypeMismatch),
        _ => return Err(ValidationError::ConstantExpressionRequired),
    };
    if value_type != expected {
        return Err(ValidationError::TypeMismatch);
    }
    Ok(())
}

#[derive(PartialEq, Debug, Clone, Copy)]
enum MaybeValue {
    Val(ValueType),
    Unknown,
}

#[derive(Clone, Copy, PartialEq)]
enum FrameKind {
    Function,
    Block,
    Loop,
    If,
}

#[derive(Clone)]
struct CtrlFrame {
    kind: FrameKind,
    end_types: Vec<MaybeValue>,
    height: usize,
    unreachable: bool,
}

/// Type-checks one function body by simulating the operand stack over value
/// types, with a control frame per enclosing construct.
struct CodeValidator<'a> {
    context: &'a Context<'a>,
    locals: Vec<ValueType>,
    vals: Vec<MaybeValue>,
    ctrls: Vec<CtrlFrame>,
}

impl<'a> CodeValidator<'a> {
    fn new(context: &'a Context<'a>, func_type: &FunctionType, locals: &[ValueType]) -> CodeValidator<'a> {
        let mut all_locals = func_type.parameters.clone();
        all_locals.extend_from_slice(locals);

        let mut v = CodeValidator {
            context,
            locals: all_locals,
            vals: vec![],
            ctrls: vec![],
        };

        // parameters aren't on the stack until explicitly loaded with local.get
        let end_types = func_type.return_types.iter().map(|v| Val(*v)).collect();
        v.push_ctrl(FrameKind::Function, end_types);

        v
    }

    fn validate_function(mut self, body: &[Instruction]) -> Result<(), ValidationError> {
        self.validate_sequence(body)?;
        self.pop_ctrl()?;
        Ok(())
    }

    fn validate_sequence(&mut self, body: &[Instruction]) -> Result<(), ValidationError> {
        body.iter().try_for_each(|inst| self.validate(inst))
    }

    fn push_val(&mut self, val_type: MaybeValue) {
        self.vals.push(val_type);
    }

    fn push_vals(&mut self, val_types: &[MaybeValue]) {
        self.vals.extend_from_slice(val_types);
    }

    fn pop_val(&mut self) -> Result<MaybeValue, ValidationError> {
        let frame = self.ctrls.last().ok_or(ValidationError::TypeMismatch)?;
        if self.vals.len() == frame.height {
            if frame.unreachable {
                Ok(Unknown)
            } else {
                Err(ValidationError::TypeMismatch)
            }
        } else {
            self.vals.pop().ok_or(ValidationError::TypeMismatch)
        }
    }

    fn pop_expected(&mut self, val_type: MaybeValue) -> Result<MaybeValue, ValidationError> {
        let popped = self.pop_val()?;
        if popped != val_type && popped != Unknown && val_type != Unknown {
            Err(ValidationError::TypeMismatch)
        } else {
            Ok(popped)
        }
    }

    fn pop_expecteds(&mut self, val_types: &[MaybeValue]) -> Result<(), ValidationError> {
        for val_type in val_types.iter().rev() {
            self.pop_expected(*val_type)?;
        }
        Ok(())
    }

    fn push_ctrl(&mut self, kind: FrameKind, end_types: Vec<MaybeValue>) {
        self.ctrls.push(CtrlFrame {
            kind,
            end_types,
            height: self.vals.len(),
            unreachable: false,
        });
    }

    fn pop_ctrl(&mut self) -> Result<CtrlFrame, ValidationError> {
        let end_types = self
            .ctrls
            .last()
            .ok_or(ValidationError::TypeMismatch)?
            .end_types
            .clone();
        self.pop_expecteds(&end_types)?;
        let frame = self.ctrls.pop().ok_or(ValidationError::TypeMismatch)?;
        if self.vals.len() != frame.height {
            return Err(ValidationError::TypeMismatch);
        }
        Ok(frame)
    }

    fn unreachable(&mut self) -> Result<(), ValidationError> {
        let ctrl = self.ctrls.last_mut().ok_or(ValidationError::TypeMismatch)?;
        self.vals.truncate(ctrl.height);
        ctrl.unreachable = true;
        Ok(())
    }

    fn sig_unary(&mut self, in_type: ValueType, out_type: ValueType) -> Result<(), ValidationError> {
        self.pop_expected(Val(in_type))?;
        self.push_val(Val(out_type));
        Ok(())
    }

    fn sig_binary(&mut self, in_type: ValueType, out_type: ValueType) -> Result<(), ValidationError> {
        self.pop_expected(Val(in_type))?;
        self.pop_expected(Val(in_type))?;
        self.push_val(Val(out_type));
        Ok(())
    }

    fn local(&self, li: u32) -> Result<ValueType, ValidationError> {
        self.locals
            .get(li as usize)
            .copied()
            .ok_or(ValidationError::UnknownLocal(li))
    }

    /// Types a branch to label `li` must carry; a loop's label takes its
    /// (empty in the MVP) parameters, everything else its results.
    fn label_types_at(&self, li: u32) -> Result<Vec<MaybeValue>, ValidationError> {
        if self.ctrls.len() <= li as usize {
            return Err(ValidationError::UnknownLabel(li));
        }
        let frame = &self.ctrls[self.ctrls.len() - li as usize - 1];
        if frame.kind == FrameKind::Loop {
            Ok(vec![])
        } else {
            Ok(frame.end_types.clone())
        }
    }

    fn require_memory(&self) -> Result<(), ValidationError> {
        if self.context.memories.is_empty() {
            Err(ValidationError::UnknownMemory(0))
        } else {
            Ok(())
        }
    }

    fn load(&mut self, memarg: &MemArg, natural: u32, out_type: ValueType) -> Result<(), ValidationError> {
        self.require_memory()?;
        check_alignment(memarg, natural)?;
        self.sig_unary(I32, out_type)
    }

    fn store(&mut self, memarg: &MemArg, natural: u32, in_type: ValueType) -> Result<(), ValidationError> {
        self.require_memory()?;
        check_alignment(memarg, natural)?;
        self.pop_expected(Val(in_type))?;
        self.pop_expected(Val(I32))?;
        Ok(())
    }

    fn block(&mut self, kind: FrameKind, block_type: &BlockType, body: &[Instruction]) -> Result<(), ValidationError> {
        let end_types: Vec<MaybeValue> = block_type.results().iter().map(|v| Val(*v)).collect();
        self.push_ctrl(kind, end_types);
        self.validate_sequence(body)?;
        let frame = self.pop_ctrl()?;
        self.push_vals(&frame.end_types);
        Ok(())
    }

    fn validate(&mut self, inst: &Instruction) -> Result<(), ValidationError> {
        use Instruction::*;
        match inst {
            Unreachable => self.unreachable(),
            Nop => Ok(()),

            Block { block_type, body } => self.block(FrameKind::Block, block_type, body),
            Loop { block_type, body } => self.block(FrameKind::Loop, block_type, body),
            If {
                block_type,
                then_body,
                else_body,
            } => {
                self.pop_expected(Val(I32))?;
                let end_types: Vec<MaybeValue> = block_type.results().iter().map(|v| Val(*v)).collect();
                self.push_ctrl(FrameKind::If, end_types.clone());
                self.validate_sequence(then_body)?;
                self.pop_ctrl()?;
                // a missing else is an empty one, so it must also produce the results
                self.push_ctrl(FrameKind::If, end_types);
                self.validate_sequence(else_body)?;
                let frame = self.pop_ctrl()?;
                self.push_vals(&frame.end_types);
                Ok(())
            }

            Br { label_idx } => {
                let label_types = self.label_types_at(*label_idx)?;
                self.pop_expecteds(&label_types)?;
                self.unreachable()
            }
            BrIf { label_idx } => {
                self.pop_expected(Val(I32))?;
                let label_types = self.label_types_at(*label_idx)?;
                self.pop_expecteds(&label_types)?;
                self.push_vals(&label_types);
                Ok(())
            }
            BrTable { labels, default } => {
                self.pop_expected(Val(I32))?;
                let default_types = self.label_types_at(*default)?;
                for li in labels {
                    let label_types = self.label_types_at(*li)?;
                    if label_types.len() != default_types.len() {
                        return Err(ValidationError::TypeMismatch);
                    }
                    self.pop_expecteds(&label_types)?;
                    self.push_vals(&label_types);
                }
                self.pop_expecteds(&default_types)?;
                self.unreachable()
            }
            Return => {
                let outermost = self.ctrls.len() as u32 - 1;
                let label_types = self.label_types_at(outermost)?;
                self.pop_expecteds(&label_types)?;
                self.unreachable()
            }
            Call { func_idx } => {
                let func_type = self.context.function_type(*func_idx)?;
                self.call(func_type)
            }
            CallIndirect { type_idx } => {
                if self.context.tables.is_empty() {
                    return Err(ValidationError::UnknownTable(0));
                }
                let func_type = self.context.type_at(*type_idx)?;
                self.pop_expected(Val(I32))?;
                self.call(func_type)
            }

            Drop => self.pop_val().map(|_| ()),
            Select => {
                self.pop_expected(Val(I32))?;
                let t1 = self.pop_val()?;
                let t2 = self.pop_expected(t1)?;
                self.push_val(if t1 == Unknown { t2 } else { t1 });
                Ok(())
            }

            LocalGet { local_idx } => {
                let local = self.local(*local_idx)?;
                self.push_val(Val(local));
                Ok(())
            }
            LocalSet { local_idx } => {
                let local = self.local(*local_idx)?;
                self.pop_expected(Val(local)).map(|_| ())
            }
            LocalTee { local_idx } => {
                let local = self.local(*local_idx)?;
                self.sig_unary(local, local)
            }
            GlobalGet { global_idx } => {
                let global = *self.context.global(*global_idx)?;
                self.push_val(Val(global.value_type));
                Ok(())
            }
            GlobalSet { global_idx } => {
                let global = *self.context.global(*global_idx)?;
                if !global.mutable {
                    return Err(ValidationError::ImmutableGlobal(*global_idx));
                }
                self.pop_expected(Val(global.value_type)).map(|_| ())
            }

            // natural alignment exponents: 1 byte = 2^0 ... 8 bytes = 2^3
            I32Load { memarg } => self.load(memarg, 2, I32),
            I64Load { memarg } => self.load(memarg, 3, I64),
            F32Load { memarg } => self.load(memarg, 2, F32),
            F64Load { memarg } => self.load(memarg, 3, F64),
            I32Load8S { memarg } | I32Load8U { memarg } => self.load(memarg, 0, I32),
            I32Load16S { memarg } | I32Load16U { memarg } => self.load(memarg, 1, I32),
            I64Load8S { memarg } | I64Load8U { memarg } => self.load(memarg, 0, I64),
            I64Load16S { memarg } | I64Load16U { memarg } => self.load(memarg, 1, I64),
            I64Load32S { memarg } | I64Load32U { memarg } => self.load(memarg, 2, I64),
            I32Store { memarg } => self.store(memarg, 2, I32),
            I64Store { memarg } => self.store(memarg, 3, I64),
            F32Store { memarg } => self.store(memarg, 2, F32),
            F64Store { memarg } => self.store(memarg, 3, F64),
            I32Store8 { memarg } => self.store(memarg, 0, I32),
            I32Store16 { memarg } => self.store(memarg, 1, I32),
            I64Store8 { memarg } => self.store(memarg, 0, I64),
            I64Store16 { memarg } => self.store(memarg, 1, I64),
            I64Store32 { memarg } => self.store(memarg, 2, I64),
            MemorySize => {
                self.require_memory()?;
                self.push_val(Val(I32));
                Ok(())
            }
            MemoryGrow => {
                self.require_memory()?;
                self.sig_unary(I32, I32)
            }

            I32Const { .. } => {
                self.push_val(Val(I32));
                Ok(())
            }
            I64Const { .. } => {
                self.push_val(Val(I64));
                Ok(())
            }
            F32Const { .. } => {
                self.push_val(Val(F32));
                Ok(())
            }
            F64Const { .. } => {
                self.push_val(Val(F64));
                Ok(())
            }

            // itestop (i32):i32
            I32Eqz => self.sig_unary(I32, I32),
            // irelop (i32,i32):i32
            I32Eq | I32Ne | I32LtS | I32LtU | I32GtS | I32GtU | I32LeS | I32LeU | I32GeS
            | I32GeU => self.sig_binary(I32, I32),

            // itestop (i64):i32
            I64Eqz => self.sig_unary(I64, I32),
            // irelop (i64,i64):i32
            I64Eq | I64Ne | I64LtS | I64LtU | I64GtS | I64GtU | I64LeS | I64LeU | I64GeS
            | I64GeU => self.sig_binary(I64, I32),

            // frelop (f32,f32):i32
            F32Eq | F32Ne | F32Lt | F32Gt | F32Le | F32Ge => self.sig_binary(F32, I32),
            // frelop (f64,f64):i32
            F64Eq | F64Ne | F64Lt | F64Gt | F64Le | F64Ge => self.sig_binary(F64, I32),

            // iunop (i32):i32
            I32Clz | I32Ctz | I32Popcnt => self.sig_unary(I32, I32),
            // ibinop (i32,i32):i32
            I32Add | I32Sub | I32Mul | I32DivS | I32DivU | I32RemS | I32RemU | I32And | I32Or
            | I32Xor | I32Shl | I32ShrS | I32ShrU | I32Rotl | I32Rotr => self.sig_binary(I32, I32),

            // iunop (i64):i64
            I64Clz | I64Ctz | I64Popcnt => self.sig_unary(I64, I64),
            // ibinop (i64,i64):i64
            I64Add | I64Sub | I64Mul | I64DivS | I64DivU | I64RemS | I64RemU | I64And | I64Or
            | I64Xor | I64Shl | I64ShrS | I64ShrU | I64Rotl | I64Rotr => self.sig_binary(I64, I64),

            // funop (f32):f32
            F32Abs | F32Neg | F32Ceil | F32Floor | F32Trunc | F32Nearest | F32Sqrt => {
                self.sig_unary(F32, F32)
            }
            // fbinop (f32,f32):f32
            F32Add | F32Sub | F32Mul | F32Div | F32Min | F32Max | F32Copysign => self.sig_binary(F32, F32),

            // funop (f64):f64
            F64Abs | F64Neg | F64Ceil | F64Floor | F64Trunc | F64Nearest | F64Sqrt => {
                self.sig_unary(F64, F64)
            }
            // fbinop (f64,f64):f64
            F64Add | F64Sub | F64Mul | F64Div | F64Min | F64Max | F64Copysign => self.sig_binary(F64, F64),

            // cvtop
            I32WrapI64 => self.sig_unary(I64, I32),
            I32TruncF32S | I32TruncF32U | I32ReinterpretF32 => self.sig_unary(F32, I32),
            I32TruncF64S | I32TruncF64U => self.sig_unary(F64, I32),
            I64ExtendI32S | I64ExtendI32U => self.sig_unary(I32, I64),
            I64TruncF32S | I64TruncF32U => self.sig_unary(F32, I64),
            I64TruncF64S | I64TruncF64U | I64ReinterpretF64 => self.sig_unary(F64, I64),
            F32ConvertI32S | F32ConvertI32U | F32ReinterpretI32 => self.sig_unary(I32, F32),
            F32ConvertI64S | F32ConvertI64U => self.sig_unary(I64, F32),
            F32DemoteF64 => self.sig_unary(F64, F32),
            F64ConvertI32S | F64ConvertI32U => self.sig_unary(I32, F64),
            F64ConvertI64S | F64ConvertI64U | F64ReinterpretI64 => self.sig_unary(I64, F64),
            F64PromoteF32 => self.sig_unary(F32, F64),
        }
    }

    fn call(&mut self, func_type: &FunctionType) -> Result<(), ValidationError> {
        // parameters are stack ordered, so pick them in reverse
        for v in func_type.parameters.iter().rev() {
            self.pop_expected(Val(*v))?;
        }
        for v in &func_type.return_types {
            self.push_val(Val(*v));
        }
        Ok(())
    }
}

fn check_alignment(memarg: &MemArg, natural: u32) -> Result<(), ValidationError> {
    if memarg.align > natural {
        Err(ValidationError::BadAlignment)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::module::{
        Data, Element, ElementType, Export, Function, Global, Import,
    };

    fn func_module(params: Vec<ValueType>, results: Vec<ValueType>, body: Vec<Instruction>) -> Module {
        Module {
            types: vec![FunctionType::new(params, results)],
            functions: vec![Function {
                type_idx: 0,
                locals: vec![],
                body,
            }],
            ..Default::default()
        }
    }

    fn check_body(results: Vec<ValueType>, body: Vec<Instruction>) -> Result<ModuleSignature, ValidationError> {
        validate(&func_module(vec![I32], results, body))
    }

    #[test]
    fn test_simple_function() {
        let mut module = func_module(
            vec![I32, I32],
            vec![I32],
            vec![
                Instruction::LocalGet { local_idx: 0 },
                Instruction::LocalGet { local_idx: 1 },
                Instruction::I32Add,
            ],
        );
        module.exports.push(Export {
            name: "add".to_string(),
            descriptor: ExportDescriptor::Function(0),
        });
        let signature = validate(&module).unwrap();
        assert_eq!(
            signature.exports,
            vec![ExternType::Function(FunctionType::new(vec![I32, I32], vec![I32]))]
        );
        assert!(signature.imports.is_empty());
    }

    #[test]
    fn test_type_mismatch() {
        assert_eq!(
            check_body(vec![I32], vec![Instruction::I64Const { value: 1 }]),
            Err(ValidationError::TypeMismatch)
        );
        // leftover value
        assert_eq!(
            check_body(vec![], vec![Instruction::I32Const { value: 1 }]),
            Err(ValidationError::TypeMismatch)
        );
        // underflow
        assert_eq!(
            check_body(vec![I32], vec![Instruction::I32Add]),
            Err(ValidationError::TypeMismatch)
        );
    }

    #[test]
    fn test_unreachable_is_polymorphic() {
        assert!(check_body(vec![I32], vec![Instruction::Unreachable, Instruction::I32Add]).is_ok());
        assert!(check_body(
            vec![I64],
            vec![Instruction::I32Const { value: 0 }, Instruction::Return]
        )
        .is_err());
        assert!(check_body(
            vec![I64],
            vec![Instruction::I64Const { value: 0 }, Instruction::Return, Instruction::Drop]
        )
        .is_ok());
    }

    #[test]
    fn test_blocks_and_branches() {
        let body = vec![Instruction::Block {
            block_type: BlockType::Value(I32),
            body: vec![
                Instruction::I32Const { value: 7 },
                Instruction::LocalGet { local_idx: 0 },
                Instruction::BrIf { label_idx: 0 },
                Instruction::Drop,
                Instruction::I32Const { value: 8 },
            ],
        }];
        assert!(check_body(vec![I32], body).is_ok());

        assert_eq!(
            check_body(vec![], vec![Instruction::Br { label_idx: 1 }]),
            Err(ValidationError::UnknownLabel(1))
        );

        // branching to a loop carries no values
        let body = vec![Instruction::Loop {
            block_type: BlockType::Value(I32),
            body: vec![
                Instruction::LocalGet { local_idx: 0 },
                Instruction::BrIf { label_idx: 0 },
                Instruction::I32Const { value: 1 },
            ],
        }];
        assert!(check_body(vec![I32], body).is_ok());
    }

    #[test]
    fn test_if_without_else_must_be_empty() {
        let body = vec![
            Instruction::LocalGet { local_idx: 0 },
            Instruction::If {
                block_type: BlockType::Value(I32),
                then_body: vec![Instruction::I32Const { value: 1 }],
                else_body: vec![],
            },
        ];
        assert_eq!(check_body(vec![I32], body), Err(ValidationError::TypeMismatch));

        let body = vec![
            Instruction::LocalGet { local_idx: 0 },
            Instruction::If {
                block_type: BlockType::Value(I32),
                then_body: vec![Instruction::I32Const { value: 1 }],
                else_body: vec![Instruction::I32Const { value: 2 }],
            },
        ];
        assert!(check_body(vec![I32], body).is_ok());
    }

    #[test]
    fn test_br_table_arity() {
        let body = vec![Instruction::Block {
            block_type: BlockType::Empty,
            body: vec![
                Instruction::Block {
                    block_type: BlockType::Value(I32),
                    body: vec![
                        Instruction::I32Const { value: 1 },
                        Instruction::LocalGet { local_idx: 0 },
                        Instruction::BrTable {
                            labels: vec![0],
                            default: 1,
                        },
                    ],
                },
                Instruction::Drop,
            ],
        }];
        assert_eq!(check_body(vec![], body), Err(ValidationError::TypeMismatch));
    }

    #[test]
    fn test_memory_instructions() {
        let load = vec![
            Instruction::I32Const { value: 0 },
            Instruction::I32Load {
                memarg: MemArg { align: 2, offset: 0 },
            },
        ];
        assert_eq!(check_body(vec![I32], load.clone()), Err(ValidationError::UnknownMemory(0)));

        let mut module = func_module(vec![I32], vec![I32], load);
        module.memories.push(MemoryType {
            limits: Limits { min: 1, max: None },
        });
        assert!(validate(&module).is_ok());

        module.functions[0].body[1] = Instruction::I32Load {
            memarg: MemArg { align: 3, offset: 0 },
        };
        assert_eq!(validate(&module), Err(ValidationError::BadAlignment));
    }

    #[test]
    fn test_globals() {
        let mut module = func_module(
            vec![I32],
            vec![],
            vec![
                Instruction::LocalGet { local_idx: 0 },
                Instruction::GlobalSet { global_idx: 0 },
            ],
        );
        module.globals.push(Global {
            global_type: GlobalType {
                value_type: I32,
                mutable: false,
            },
            init: vec![Instruction::I32Const { value: 1 }],
        });
        assert_eq!(validate(&module), Err(ValidationError::ImmutableGlobal(0)));

        module.globals[0].global_type.mutable = true;
        assert!(validate(&module).is_ok());

        module.globals[0].init = vec![Instruction::F32Const { value: 1.0 }];
        assert_eq!(validate(&module), Err(ValidationError::TypeMismatch));
    }

    #[test]
    fn test_constant_expressions() {
        let imported = Import {
            module: "env".to_string(),
            name: "g".to_string(),
            descriptor: ImportDescriptor::Global(GlobalType {
                value_type: I64,
                mutable: false,
            }),
        };
        let global = |init| Global {
            global_type: GlobalType {
                value_type: I64,
                mutable: false,
            },
            init,
        };

        let module = Module {
            imports: vec![imported.clone()],
            globals: vec![global(vec![Instruction::GlobalGet { global_idx: 0 }])],
            ..Default::default()
        };
        let signature = validate(&module).unwrap();
        assert_eq!(
            signature.imports,
            vec![ExternType::Global(GlobalType {
                value_type: I64,
                mutable: false
            })]
        );

        // locally defined globals aren't visible to initializers
        let module = Module {
            imports: vec![imported],
            globals: vec![
                global(vec![Instruction::I64Const { value: 1 }]),
                global(vec![Instruction::GlobalGet { global_idx: 1 }]),
            ],
            ..Default::default()
        };
        assert_eq!(validate(&module), Err(ValidationError::UnknownGlobal(1)));

        let module = Module {
            globals: vec![global(vec![
                Instruction::I64Const { value: 1 },
                Instruction::I64Const { value: 2 },
                Instruction::I64Add,
            ])],
            ..Default::default()
        };
        assert_eq!(validate(&module), Err(ValidationError::ConstantExpressionRequired));
    }

    #[test]
    fn test_segments() {
        let mut module = func_module(vec![], vec![], vec![]);
        module.elements.push(Element {
            table_idx: 0,
            offset: vec![Instruction::I32Const { value: 0 }],
            init: vec![0],
        });
        assert_eq!(validate(&module), Err(ValidationError::UnknownTable(0)));

        module.tables.push(TableType {
            element_type: ElementType::FuncRef,
            limits: Limits { min: 1, max: None },
        });
        assert!(validate(&module).is_ok());

        module.elements[0].init = vec![1];
        assert_eq!(validate(&module), Err(ValidationError::UnknownFunction(1)));

        let module = Module {
            data: vec![Data {
                memory_idx: 0,
                offset: vec![Instruction::I32Const { value: 0 }],
                init: vec![1],
            }],
            ..Default::default()
        };
        assert_eq!(validate(&module), Err(ValidationError::UnknownMemory(0)));
    }

    #[test]
    fn test_module_level_rules() {
        let mem = |min, max| MemoryType {
            limits: Limits { min, max },
        };

        let module = Module {
            memories: vec![mem(2, Some(1))],
            ..Default::default()
        };
        assert_eq!(validate(&module), Err(ValidationError::InvalidLimits));

        let module = Module {
            memories: vec![mem(1, Some(65_537))],
            ..Default::default()
        };
        assert_eq!(validate(&module), Err(ValidationError::MemoryTooLarge));

        let module = Module {
            memories: vec![mem(1, None), mem(1, None)],
            ..Default::default()
        };
        assert_eq!(validate(&module), Err(ValidationError::MultipleMemories));

        let mut module = func_module(vec![I32], vec![], vec![Instruction::Nop]);
        module.start = Some(0);
        assert_eq!(validate(&module), Err(ValidationError::InvalidStartFunction));

        let mut module = func_module(vec![], vec![], vec![]);
        let export = Export {
            name: "f".to_string(),
            descriptor: ExportDescriptor::Function(0),
        };
        module.exports = vec![export.clone(), export];
        assert_eq!(
            validate(&module),
            Err(ValidationError::DuplicateExport("f".to_string()))
        );
    }

    #[test]
    fn test_at_most_one_result() {
        let body = vec![
            Instruction::LocalGet { local_idx: 0 },
            Instruction::LocalGet { local_idx: 0 },
        ];
        assert_eq!(
            check_body(vec![I32, I32], body),
            Err(ValidationError::InvalidResultArity(2))
        );

        // types nothing refers to are checked too
        let module = Module {
            types: vec![FunctionType::new(vec![], vec![I64, F32, F64])],
            ..Default::default()
        };
        assert_eq!(validate(&module), Err(ValidationError::InvalidResultArity(3)));
    }

    #[test]
    fn test_imported_table_and_memory_count() {
        let limits = Limits { min: 1, max: None };
        let import = |descriptor| Import {
            module: "env".to_string(),
            name: "x".to_string(),
            descriptor,
        };
        let module = Module {
            imports: vec![import(ImportDescriptor::Table(TableType {
                element_type: ElementType::FuncRef,
                limits,
            }))],
            tables: vec![TableType {
                element_type: ElementType::FuncRef,
                limits,
            }],
            ..Default::default()
        };
        assert_eq!(validate(&module), Err(ValidationError::MultipleTables));

        let module = Module {
            imports: vec![import(ImportDescriptor::Memory(MemoryType { limits }))],
            memories: vec![MemoryType { limits }],
            ..Default::default()
        };
        assert_eq!(validate(&module), Err(ValidationError::MultipleMemories));
    }
}
