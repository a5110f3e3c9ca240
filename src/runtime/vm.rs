//! The embedder-facing virtual machine
//!
//! A [`Vm`] owns a [`Store`] and remembers the module instantiated into it most
//! recently, so exports can be called by name.

use super::executor::Executor;
use super::store::{ExternVal, FuncAddr, ModuleAddr, ModuleInstance, Store};
use super::{RuntimeError, Value};
use crate::parser::module::Module;
use log::{debug, trace};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct Vm {
    store: Store,
    module: Option<ModuleAddr>,
}

impl Module {
    /// Instantiate into a fresh store. Only modules without imports, or whose
    /// imports are all satisfied by `imports`, can succeed here; build a
    /// [`Vm`] over a prepared [`Store`] to supply host functions.
    pub fn instantiate(&self, imports: &[ExternVal]) -> Result<Vm, RuntimeError> {
        let mut vm = Vm::new(Store::new());
        vm.instantiate(self, imports)?;
        Ok(vm)
    }
}

impl Vm {
    pub fn new(store: Store) -> Self {
        Vm { store, module: None }
    }

    /// Instantiate another module into this VM's store. It becomes the module
    /// whose exports [`Vm::invoke_export`] resolves.
    pub fn instantiate(&mut self, module: &Module, imports: &[ExternVal]) -> Result<ModuleAddr, RuntimeError> {
        let addr = self.store.instantiate(module, imports)?;
        debug!("instantiated module {}", addr.0);
        self.module = Some(addr);
        Ok(addr)
    }

    pub fn invoke(&mut self, addr: FuncAddr, args: &[Value]) -> Result<Vec<Value>, RuntimeError> {
        trace!("invoke {} with {} args", addr.0, args.len());
        Executor::new(&mut self.store).invoke(addr, args)
    }

    /// Call a function exported by the current module
    pub fn invoke_export(&mut self, name: &str, args: &[Value]) -> Result<Vec<Value>, RuntimeError> {
        match self.export(name) {
            Some(ExternVal::Function(addr)) => self.invoke(addr, args),
            _ => Err(RuntimeError::UnknownExport(name.to_string())),
        }
    }

    pub fn export(&self, name: &str) -> Option<ExternVal> {
        self.instance()?.export(name)
    }

    /// The current module instance, if anything has been instantiated
    pub fn instance(&self) -> Option<Rc<ModuleInstance>> {
        self.store.module(self.module?).ok()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }
}

impl fmt::Display for Vm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.store)?;
        match self.instance() {
            Some(instance) => {
                write!(f, "Exports:")?;
                for export in &instance.exports {
                    write!(f, "\n  {} -> {}", export.name, export.value)?;
                }
                Ok(())
            }
            None => write!(f, "No module instantiated"),
        }
    }
}
