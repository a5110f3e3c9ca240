//! WebAssembly Store - owns every runtime instance and links modules
//!
//! The Store holds one arena per kind of instance. An address is the position
//! of an instance in its arena; addresses are handed out in order, never freed
//! and never reused, so they stay valid for as long as the Store lives.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                     Store                     │
//! │  functions: [Host print] [Module 0 f0] ...    │
//! │  tables:    [table 0] ...                     │
//! │  memories:  [memory 0] ...                    │
//! │  globals:   [global 0] [global 1] ...         │
//! │  modules:   [ModuleInstance 0] ...            │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! A [`ModuleInstance`] maps a module's own index spaces, imports first, onto
//! store addresses. Module functions refer back to their instance by
//! [`ModuleAddr`] so that calls, globals and memory accesses inside them
//! resolve against the right module.

use super::code::Code;
use super::executor::Executor;
use super::{GlobalInstance, MemoryInstance, RuntimeError, TableInstance, Value};
use crate::parser::instruction::Instruction;
use crate::parser::module::{
    ElementType, ExportDescriptor, ExternType, Function, FunctionType, GlobalType, Limits,
    MemoryType, Module, TableType, ValueType,
};
use crate::parser::validate::validate;
use log::debug;
use std::fmt;
use std::rc::Rc;

/// Native implementation of an imported function
pub type HostFunc = Box<dyn Fn(&[Value]) -> Result<Vec<Value>, RuntimeError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncAddr(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableAddr(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemAddr(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalAddr(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleAddr(pub usize);

/// A reference to one store-resident entity, as passed across module
/// boundaries by imports and exports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternVal {
    Function(FuncAddr),
    Table(TableAddr),
    Memory(MemAddr),
    Global(GlobalAddr),
}

impl fmt::Display for ExternVal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExternVal::Function(a) => write!(f, "func@{}", a.0),
            ExternVal::Table(a) => write!(f, "table@{}", a.0),
            ExternVal::Memory(a) => write!(f, "memory@{}", a.0),
            ExternVal::Global(a) => write!(f, "global@{}", a.0),
        }
    }
}

pub enum FunctionInstance {
    Module {
        func_type: FunctionType,
        module: ModuleAddr,
        code: Rc<Code>,
    },
    Host {
        func_type: FunctionType,
        callback: HostFunc,
    },
}

impl FunctionInstance {
    pub fn func_type(&self) -> &FunctionType {
        match self {
            FunctionInstance::Module { func_type, .. } => func_type,
            FunctionInstance::Host { func_type, .. } => func_type,
        }
    }
}

impl fmt::Debug for FunctionInstance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FunctionInstance::Module { func_type, module, .. } => f
                .debug_struct("Module")
                .field("func_type", func_type)
                .field("module", module)
                .finish(),
            FunctionInstance::Host { func_type, .. } => {
                f.debug_struct("Host").field("func_type", func_type).finish()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportInstance {
    pub name: String,
    pub value: ExternVal,
}

/// The linked form of a module: its index spaces resolved to store addresses
#[derive(Debug, Default)]
pub struct ModuleInstance {
    pub types: Vec<FunctionType>,
    pub func_addrs: Vec<FuncAddr>,
    pub table_addrs: Vec<TableAddr>,
    pub mem_addrs: Vec<MemAddr>,
    pub global_addrs: Vec<GlobalAddr>,
    pub exports: Vec<ExportInstance>,
}

impl ModuleInstance {
    pub fn export(&self, name: &str) -> Option<ExternVal> {
        self.exports.iter().find(|e| e.name == name).map(|e| e.value)
    }

    pub fn func_addr(&self, idx: u32) -> Result<FuncAddr, RuntimeError> {
        lookup(&self.func_addrs, "function", idx)
    }

    pub fn table_addr(&self, idx: u32) -> Result<TableAddr, RuntimeError> {
        lookup(&self.table_addrs, "table", idx)
    }

    pub fn mem_addr(&self, idx: u32) -> Result<MemAddr, RuntimeError> {
        lookup(&self.mem_addrs, "memory", idx)
    }

    pub fn global_addr(&self, idx: u32) -> Result<GlobalAddr, RuntimeError> {
        lookup(&self.global_addrs, "global", idx)
    }

    pub fn func_type(&self, idx: u32) -> Result<&FunctionType, RuntimeError> {
        self.types
            .get(idx as usize)
            .ok_or(RuntimeError::InvalidIndex { kind: "type", index: idx })
    }
}

fn lookup<T: Copy>(addrs: &[T], kind: &'static str, idx: u32) -> Result<T, RuntimeError> {
    addrs
        .get(idx as usize)
        .copied()
        .ok_or(RuntimeError::InvalidIndex { kind, index: idx })
}

/// A write into a table or memory, checked but not yet applied
enum SegmentWrite<'m> {
    Table {
        addr: TableAddr,
        offset: usize,
        funcs: Vec<FuncAddr>,
    },
    Memory {
        addr: MemAddr,
        offset: usize,
        bytes: &'m [u8],
    },
}

#[derive(Debug, Default)]
pub struct Store {
    functions: Vec<FunctionInstance>,
    tables: Vec<TableInstance>,
    memories: Vec<MemoryInstance>,
    globals: Vec<GlobalInstance>,
    modules: Vec<Rc<ModuleInstance>>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    pub fn alloc_host_function(&mut self, func_type: FunctionType, callback: HostFunc) -> FuncAddr {
        self.functions.push(FunctionInstance::Host { func_type, callback });
        FuncAddr(self.functions.len() - 1)
    }

    fn alloc_module_function(&mut self, func_type: FunctionType, module: ModuleAddr, function: &Function) -> FuncAddr {
        self.functions.push(FunctionInstance::Module {
            func_type,
            module,
            code: Rc::new(Code::compile(function)),
        });
        FuncAddr(self.functions.len() - 1)
    }

    pub fn alloc_table(&mut self, table_type: &TableType) -> Result<TableAddr, RuntimeError> {
        self.tables.push(TableInstance::new(table_type)?);
        Ok(TableAddr(self.tables.len() - 1))
    }

    pub fn alloc_memory(&mut self, memory_type: &MemoryType) -> Result<MemAddr, RuntimeError> {
        self.memories.push(MemoryInstance::new(memory_type)?);
        Ok(MemAddr(self.memories.len() - 1))
    }

    pub fn alloc_global(&mut self, global_type: GlobalType, value: Value) -> Result<GlobalAddr, RuntimeError> {
        self.globals.push(GlobalInstance::new(global_type, value)?);
        Ok(GlobalAddr(self.globals.len() - 1))
    }

    pub fn function(&self, addr: FuncAddr) -> Result<&FunctionInstance, RuntimeError> {
        self.functions
            .get(addr.0)
            .ok_or(RuntimeError::InvalidAddress("function"))
    }

    pub fn table(&self, addr: TableAddr) -> Result<&TableInstance, RuntimeError> {
        self.tables.get(addr.0).ok_or(RuntimeError::InvalidAddress("table"))
    }

    pub fn table_mut(&mut self, addr: TableAddr) -> Result<&mut TableInstance, RuntimeError> {
        self.tables
            .get_mut(addr.0)
            .ok_or(RuntimeError::InvalidAddress("table"))
    }

    pub fn memory(&self, addr: MemAddr) -> Result<&MemoryInstance, RuntimeError> {
        self.memories
            .get(addr.0)
            .ok_or(RuntimeError::InvalidAddress("memory"))
    }

    pub fn memory_mut(&mut self, addr: MemAddr) -> Result<&mut MemoryInstance, RuntimeError> {
        self.memories
            .get_mut(addr.0)
            .ok_or(RuntimeError::InvalidAddress("memory"))
    }

    pub fn global(&self, addr: GlobalAddr) -> Result<&GlobalInstance, RuntimeError> {
        self.globals
            .get(addr.0)
            .ok_or(RuntimeError::InvalidAddress("global"))
    }

    pub fn global_mut(&mut self, addr: GlobalAddr) -> Result<&mut GlobalInstance, RuntimeError> {
        self.globals
            .get_mut(addr.0)
            .ok_or(RuntimeError::InvalidAddress("global"))
    }

    pub fn module(&self, addr: ModuleAddr) -> Result<Rc<ModuleInstance>, RuntimeError> {
        self.modules
            .get(addr.0)
            .cloned()
            .ok_or(RuntimeError::InvalidAddress("module"))
    }

    /// Grow a table by `delta` slots, returning its previous size
    pub fn grow_table(&mut self, addr: TableAddr, delta: u32) -> Result<u32, RuntimeError> {
        self.table_mut(addr)?.grow(delta)
    }

    /// Grow a memory by `delta` pages, returning its previous size in pages
    pub fn grow_memory(&mut self, addr: MemAddr, delta: u32) -> Result<u32, RuntimeError> {
        self.memory_mut(addr)?.grow(delta)
    }

    /// The type an entity in the store currently has; tables and memories
    /// report their current size as the minimum.
    pub fn extern_type(&self, val: ExternVal) -> Result<ExternType, RuntimeError> {
        Ok(match val {
            ExternVal::Function(addr) => ExternType::Function(self.function(addr)?.func_type().clone()),
            ExternVal::Table(addr) => {
                let table = self.table(addr)?;
                ExternType::Table(TableType {
                    element_type: ElementType::FuncRef,
                    limits: Limits {
                        min: table.size(),
                        max: table.max(),
                    },
                })
            }
            ExternVal::Memory(addr) => {
                let memory = self.memory(addr)?;
                ExternType::Memory(MemoryType {
                    limits: Limits {
                        min: memory.size(),
                        max: memory.max(),
                    },
                })
            }
            ExternVal::Global(addr) => ExternType::Global(self.global(addr)?.global_type),
        })
    }

    /// Link `module` against `imports` and allocate everything it defines.
    ///
    /// Segments are all bounds-checked before any of them is written, so an
    /// out-of-bounds segment leaves existing tables and memories untouched.
    /// Instances allocated before a failure stay in the store.
    pub fn instantiate(&mut self, module: &Module, imports: &[ExternVal]) -> Result<ModuleAddr, RuntimeError> {
        let signature = validate(module)?;
        if signature.imports.len() != imports.len() {
            return Err(RuntimeError::ImportCountMismatch {
                expected: signature.imports.len(),
                given: imports.len(),
            });
        }

        let mut instance = ModuleInstance {
            types: module.types.clone(),
            ..ModuleInstance::default()
        };
        for (val, expected) in imports.iter().zip(&signature.imports) {
            let given = self.extern_type(*val)?;
            if !given.is_subtype_of(expected) {
                return Err(RuntimeError::ExternTypeMismatch {
                    expected: expected.clone(),
                    given,
                });
            }
            match *val {
                ExternVal::Function(addr) => instance.func_addrs.push(addr),
                ExternVal::Table(addr) => instance.table_addrs.push(addr),
                ExternVal::Memory(addr) => instance.mem_addrs.push(addr),
                ExternVal::Global(addr) => instance.global_addrs.push(addr),
            }
        }
        debug!("linked {} imports", imports.len());

        // initialisers only see imported globals
        let init_scope = Rc::new(ModuleInstance {
            types: module.types.clone(),
            global_addrs: instance.global_addrs.clone(),
            ..ModuleInstance::default()
        });
        let mut global_values = Vec::with_capacity(module.globals.len());
        for global in &module.globals {
            let value = Executor::new(self).eval_const(
                Rc::clone(&init_scope),
                &global.init,
                global.global_type.value_type,
            )?;
            global_values.push(value);
        }
        debug!("evaluated {} global initialisers", global_values.len());

        let module_addr = ModuleAddr(self.modules.len());
        for function in &module.functions {
            let func_type = instance.func_type(function.type_idx)?.clone();
            let addr = self.alloc_module_function(func_type, module_addr, function);
            instance.func_addrs.push(addr);
        }
        for table_type in &module.tables {
            let addr = self.alloc_table(table_type)?;
            instance.table_addrs.push(addr);
        }
        for memory_type in &module.memories {
            let addr = self.alloc_memory(memory_type)?;
            instance.mem_addrs.push(addr);
        }
        for (global, value) in module.globals.iter().zip(global_values) {
            let addr = self.alloc_global(global.global_type, value)?;
            instance.global_addrs.push(addr);
        }
        for export in &module.exports {
            let value = match export.descriptor {
                ExportDescriptor::Function(idx) => ExternVal::Function(instance.func_addr(idx)?),
                ExportDescriptor::Table(idx) => ExternVal::Table(instance.table_addr(idx)?),
                ExportDescriptor::Memory(idx) => ExternVal::Memory(instance.mem_addr(idx)?),
                ExportDescriptor::Global(idx) => ExternVal::Global(instance.global_addr(idx)?),
            };
            instance.exports.push(ExportInstance {
                name: export.name.clone(),
                value,
            });
        }
        let instance = Rc::new(instance);
        self.modules.push(Rc::clone(&instance));
        debug!(
            "allocated module {}: {} functions, {} tables, {} memories, {} globals, {} exports",
            module_addr.0,
            instance.func_addrs.len(),
            instance.table_addrs.len(),
            instance.mem_addrs.len(),
            instance.global_addrs.len(),
            instance.exports.len()
        );

        let mut writes = Vec::with_capacity(module.elements.len() + module.data.len());
        for element in &module.elements {
            let offset = self.eval_offset(&instance, &element.offset)?;
            let addr = instance.table_addr(element.table_idx)?;
            let size = self.table(addr)?.size() as usize;
            if offset.checked_add(element.init.len()).map_or(true, |end| end > size) {
                return Err(RuntimeError::TableInitOutOfBounds);
            }
            let funcs = element
                .init
                .iter()
                .map(|idx| instance.func_addr(*idx))
                .collect::<Result<Vec<_>, _>>()?;
            writes.push(SegmentWrite::Table { addr, offset, funcs });
        }
        for data in &module.data {
            let offset = self.eval_offset(&instance, &data.offset)?;
            let addr = instance.mem_addr(data.memory_idx)?;
            let size = self.memory(addr)?.len();
            if offset.checked_add(data.init.len()).map_or(true, |end| end > size) {
                return Err(RuntimeError::MemoryInitOutOfBounds);
            }
            writes.push(SegmentWrite::Memory {
                addr,
                offset,
                bytes: &data.init,
            });
        }
        debug!(
            "checked {} element and {} data segments",
            module.elements.len(),
            module.data.len()
        );

        for write in writes {
            match write {
                SegmentWrite::Table { addr, offset, funcs } => self.table_mut(addr)?.init(offset, &funcs)?,
                SegmentWrite::Memory { addr, offset, bytes } => self.memory_mut(addr)?.write(offset, bytes)?,
            }
        }

        if let Some(start) = module.start {
            let addr = instance.func_addr(start)?;
            debug!("running start function {}", start);
            Executor::new(self).invoke(addr, &[])?;
        }

        Ok(module_addr)
    }

    fn eval_offset(&mut self, instance: &Rc<ModuleInstance>, expr: &[Instruction]) -> Result<usize, RuntimeError> {
        let value = Executor::new(self).eval_const(Rc::clone(instance), expr, ValueType::I32)?;
        match value {
            Value::I32(offset) => Ok(offset as u32 as usize),
            other => Err(RuntimeError::TypeMismatch {
                expected: ValueType::I32,
                actual: other.typ(),
            }),
        }
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Store:")?;
        writeln!(f, "  functions: {}", self.functions.len())?;
        for (i, table) in self.tables.iter().enumerate() {
            writeln!(f, "  table {}: {} elements", i, table.size())?;
        }
        for (i, memory) in self.memories.iter().enumerate() {
            writeln!(f, "  memory {}: {} pages", i, memory.size())?;
        }
        for (i, global) in self.globals.iter().enumerate() {
            writeln!(f, "  global {}: {} = {}", i, global.global_type, global.get())?;
        }
        write!(f, "  modules: {}", self.modules.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::module::{Data, Element, Export, Global, Import, ImportDescriptor};

    fn memory_type(min: u32, max: Option<u32>) -> MemoryType {
        MemoryType {
            limits: Limits { min, max },
        }
    }

    fn i32_const(value: i32) -> Vec<Instruction> {
        vec![Instruction::I32Const { value }]
    }

    #[test]
    fn test_addresses_are_sequential() {
        let mut store = Store::new();
        let a = store.alloc_memory(&memory_type(0, None)).unwrap();
        let b = store.alloc_memory(&memory_type(1, None)).unwrap();
        assert_eq!(a, MemAddr(0));
        assert_eq!(b, MemAddr(1));
        let f = store.alloc_host_function(FunctionType::default(), Box::new(|_| Ok(vec![])));
        assert_eq!(f, FuncAddr(0));
        assert!(matches!(store.memory(MemAddr(2)), Err(RuntimeError::InvalidAddress("memory"))));
    }

    #[test]
    fn test_extern_type() {
        let mut store = Store::new();
        let mem = store.alloc_memory(&memory_type(1, Some(4))).unwrap();
        store.grow_memory(mem, 1).unwrap();
        assert_eq!(
            store.extern_type(ExternVal::Memory(mem)).unwrap(),
            ExternType::Memory(memory_type(2, Some(4)))
        );

        let typ = GlobalType {
            value_type: ValueType::I64,
            mutable: true,
        };
        let global = store.alloc_global(typ, Value::I64(3)).unwrap();
        assert_eq!(store.extern_type(ExternVal::Global(global)).unwrap(), ExternType::Global(typ));
    }

    #[test]
    fn test_grow_beyond_max_leaves_state() {
        let mut store = Store::new();
        let table = store
            .alloc_table(&TableType {
                element_type: ElementType::FuncRef,
                limits: Limits { min: 1, max: Some(2) },
            })
            .unwrap();
        assert!(matches!(store.grow_table(table, 2), Err(RuntimeError::TableTooBig)));
        assert_eq!(store.table(table).unwrap().size(), 1);

        let mem = store.alloc_memory(&memory_type(1, Some(1))).unwrap();
        assert!(matches!(store.grow_memory(mem, 1), Err(RuntimeError::MemoryTooBig)));
        assert_eq!(store.memory(mem).unwrap().size(), 1);
    }

    #[test]
    fn test_instantiate_exports_and_data() {
        let module = Module {
            memories: vec![memory_type(1, None)],
            data: vec![Data {
                memory_idx: 0,
                offset: i32_const(8),
                init: b"hi".to_vec(),
            }],
            exports: vec![Export {
                name: "mem".to_string(),
                descriptor: ExportDescriptor::Memory(0),
            }],
            ..Module::default()
        };
        let mut store = Store::new();
        let addr = store.instantiate(&module, &[]).unwrap();
        let instance = store.module(addr).unwrap();
        assert_eq!(instance.exports.len(), 1);
        let mem = match instance.export("mem") {
            Some(ExternVal::Memory(mem)) => mem,
            other => panic!("unexpected export {:?}", other),
        };
        assert_eq!(store.memory(mem).unwrap().bytes(8, 2).unwrap(), b"hi");
        assert!(instance.export("missing").is_none());
    }

    #[test]
    fn test_global_initialiser_reads_import() {
        let imported = GlobalType {
            value_type: ValueType::I32,
            mutable: false,
        };
        let module = Module {
            imports: vec![Import {
                module: "env".to_string(),
                name: "base".to_string(),
                descriptor: ImportDescriptor::Global(imported),
            }],
            globals: vec![Global {
                global_type: imported,
                init: vec![Instruction::GlobalGet { global_idx: 0 }],
            }],
            ..Module::default()
        };
        let mut store = Store::new();
        let base = store.alloc_global(imported, Value::I32(42)).unwrap();
        let addr = store.instantiate(&module, &[ExternVal::Global(base)]).unwrap();
        let instance = store.module(addr).unwrap();
        let own = instance.global_addr(1).unwrap();
        assert_eq!(store.global(own).unwrap().get(), Value::I32(42));
    }

    #[test]
    fn test_import_count_mismatch() {
        let mut store = Store::new();
        let mem = store.alloc_memory(&memory_type(1, None)).unwrap();
        let result = store.instantiate(&Module::default(), &[ExternVal::Memory(mem)]);
        assert!(matches!(
            result,
            Err(RuntimeError::ImportCountMismatch { expected: 0, given: 1 })
        ));
    }

    #[test]
    fn test_import_type_mismatch() {
        let module = Module {
            imports: vec![Import {
                module: "env".to_string(),
                name: "mem".to_string(),
                descriptor: ImportDescriptor::Memory(memory_type(2, None)),
            }],
            ..Module::default()
        };
        let mut store = Store::new();
        let small = store.alloc_memory(&memory_type(1, None)).unwrap();
        assert!(matches!(
            store.instantiate(&module, &[ExternVal::Memory(small)]),
            Err(RuntimeError::ExternTypeMismatch { .. })
        ));
        let global = store
            .alloc_global(
                GlobalType {
                    value_type: ValueType::I32,
                    mutable: false,
                },
                Value::I32(0),
            )
            .unwrap();
        assert!(matches!(
            store.instantiate(&module, &[ExternVal::Global(global)]),
            Err(RuntimeError::ExternTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_segments_are_all_or_nothing() {
        let module = Module {
            imports: vec![Import {
                module: "env".to_string(),
                name: "mem".to_string(),
                descriptor: ImportDescriptor::Memory(memory_type(1, None)),
            }],
            data: vec![
                Data {
                    memory_idx: 0,
                    offset: i32_const(0),
                    init: vec![1, 2, 3],
                },
                Data {
                    memory_idx: 0,
                    offset: i32_const(PAGE_SIZE_I32 - 1),
                    init: vec![4, 5],
                },
            ],
            ..Module::default()
        };
        let mut store = Store::new();
        let mem = store.alloc_memory(&memory_type(1, None)).unwrap();
        assert!(matches!(
            store.instantiate(&module, &[ExternVal::Memory(mem)]),
            Err(RuntimeError::MemoryInitOutOfBounds)
        ));
        assert!(store.memory(mem).unwrap().data().iter().all(|b| *b == 0));
    }

    const PAGE_SIZE_I32: i32 = crate::runtime::PAGE_SIZE as i32;

    #[test]
    fn test_element_segment_out_of_bounds() {
        let module = Module {
            types: vec![FunctionType::default()],
            functions: vec![Function {
                type_idx: 0,
                locals: vec![],
                body: vec![],
            }],
            tables: vec![TableType {
                element_type: ElementType::FuncRef,
                limits: Limits { min: 1, max: None },
            }],
            elements: vec![Element {
                table_idx: 0,
                offset: i32_const(1),
                init: vec![0],
            }],
            ..Module::default()
        };
        let mut store = Store::new();
        assert!(matches!(
            store.instantiate(&module, &[]),
            Err(RuntimeError::TableInitOutOfBounds)
        ));
    }
}
