//! WebAssembly table instances
//!
//! A table is a growable vector of function addresses used by
//! `call_indirect`. Slots start out empty; element segments fill them in at
//! instantiation.
//!
//! ```rust,ignore
//! let mut table = TableInstance::new(&table_type)?;
//! table.set(0, Some(func_addr))?;
//! let callee = table.get(0)?;
//! ```

use super::store::FuncAddr;
use super::{RuntimeError, Trap};
use crate::parser::module::TableType;

/// Tables can't hold more entries than a u32 can index.
const MAX_TABLE_SIZE: u64 = u32::MAX as u64;

#[derive(Debug)]
pub struct TableInstance {
    elements: Vec<Option<FuncAddr>>,
    max: Option<u32>,
}

impl TableInstance {
    /// Create a table holding `limits.min` empty slots
    pub fn new(table_type: &TableType) -> Result<Self, RuntimeError> {
        let min = table_type.limits.min as usize;
        let mut elements = Vec::new();
        elements
            .try_reserve_exact(min)
            .map_err(|_| RuntimeError::TableTooBig)?;
        elements.resize(min, None);
        Ok(TableInstance {
            elements,
            max: table_type.limits.max,
        })
    }

    pub fn size(&self) -> u32 {
        self.elements.len() as u32
    }

    pub fn max(&self) -> Option<u32> {
        self.max
    }

    /// The function at `index`, trapping on an index past the end or an
    /// empty slot.
    pub fn get(&self, index: u32) -> Result<FuncAddr, Trap> {
        self.elements
            .get(index as usize)
            .copied()
            .ok_or(Trap::UndefinedElement)?
            .ok_or(Trap::UninitializedElement)
    }

    pub fn set(&mut self, index: u32, value: Option<FuncAddr>) -> Result<(), Trap> {
        let slot = self
            .elements
            .get_mut(index as usize)
            .ok_or(Trap::UndefinedElement)?;
        *slot = value;
        Ok(())
    }

    /// Grow by `delta` empty slots and return the previous size. Fails,
    /// leaving the table untouched, past the declared maximum.
    pub fn grow(&mut self, delta: u32) -> Result<u32, RuntimeError> {
        let old = self.size();
        let new = old as u64 + delta as u64;
        if new > self.max.map_or(MAX_TABLE_SIZE, u64::from) {
            return Err(RuntimeError::TableTooBig);
        }
        self.elements
            .try_reserve_exact(delta as usize)
            .map_err(|_| RuntimeError::TableTooBig)?;
        self.elements.resize(new as usize, None);
        Ok(old)
    }

    /// Copy function addresses in starting at `offset`; used by element
    /// segment initialisation
    pub fn init(&mut self, offset: usize, funcs: &[FuncAddr]) -> Result<(), Trap> {
        let end = offset.checked_add(funcs.len()).ok_or(Trap::UndefinedElement)?;
        let slots = self
            .elements
            .get_mut(offset..end)
            .ok_or(Trap::UndefinedElement)?;
        for (slot, func) in slots.iter_mut().zip(funcs) {
            *slot = Some(*func);
        }
        Ok(())
    }
}
