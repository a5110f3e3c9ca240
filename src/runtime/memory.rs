//! WebAssembly linear memory instances
//!
//! A memory is a byte buffer whose length is always a whole number of 64KiB
//! pages. Every access is bounds-checked against the current length and an
//! out-of-bounds access traps; nothing here indexes without checking first.

use super::{RuntimeError, Trap};
use crate::parser::limits::MAX_MEMORY_PAGES;
use crate::parser::module::MemoryType;

/// WebAssembly page size in bytes (64KiB)
pub const PAGE_SIZE: usize = 65536;

#[derive(Debug)]
pub struct MemoryInstance {
    data: Vec<u8>,
    max: Option<u32>,
}

impl MemoryInstance {
    /// Allocate a memory at its declared minimum, zero filled
    pub fn new(memory_type: &MemoryType) -> Result<Self, RuntimeError> {
        let limits = memory_type.limits;
        if limits.min > MAX_MEMORY_PAGES {
            return Err(RuntimeError::MemoryTooBig);
        }
        let mut data = Vec::new();
        data.try_reserve_exact(limits.min as usize * PAGE_SIZE)
            .map_err(|_| RuntimeError::MemoryTooBig)?;
        data.resize(limits.min as usize * PAGE_SIZE, 0);
        Ok(MemoryInstance {
            data,
            max: limits.max,
        })
    }

    /// Current size in pages
    pub fn size(&self) -> u32 {
        (self.data.len() / PAGE_SIZE) as u32
    }

    pub fn max(&self) -> Option<u32> {
        self.max
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Grow by `delta` pages and return the previous size in pages. Fails,
    /// leaving the memory untouched, past the declared maximum or the 4GiB
    /// ceiling, or when the host can't provide the bytes.
    pub fn grow(&mut self, delta: u32) -> Result<u32, RuntimeError> {
        let old = self.size();
        let new = old.checked_add(delta).ok_or(RuntimeError::MemoryTooBig)?;
        if new > self.max.unwrap_or(MAX_MEMORY_PAGES).min(MAX_MEMORY_PAGES) {
            return Err(RuntimeError::MemoryTooBig);
        }
        let new_len = new as usize * PAGE_SIZE;
        self.data
            .try_reserve_exact(new_len - self.data.len())
            .map_err(|_| RuntimeError::MemoryTooBig)?;
        self.data.resize(new_len, 0);
        Ok(old)
    }

    /// Borrow `len` bytes at `addr`
    pub fn bytes(&self, addr: u64, len: usize) -> Result<&[u8], Trap> {
        let range = self.range(addr, len)?;
        Ok(&self.data[range])
    }

    pub fn bytes_mut(&mut self, addr: u64, len: usize) -> Result<&mut [u8], Trap> {
        let range = self.range(addr, len)?;
        Ok(&mut self.data[range])
    }

    /// Read exactly `N` bytes at `addr`
    pub fn load<const N: usize>(&self, addr: u64) -> Result<[u8; N], Trap> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(addr, N)?);
        Ok(out)
    }

    pub fn store<const N: usize>(&mut self, addr: u64, bytes: [u8; N]) -> Result<(), Trap> {
        self.bytes_mut(addr, N)?.copy_from_slice(&bytes);
        Ok(())
    }

    /// Copy `bytes` in at `offset`; used by data segment initialisation
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), Trap> {
        self.bytes_mut(offset as u64, bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    fn range(&self, addr: u64, len: usize) -> Result<std::ops::Range<usize>, Trap> {
        let end = addr
            .checked_add(len as u64)
            .ok_or(Trap::OutOfBoundsMemoryAccess)?;
        if end > self.data.len() as u64 {
            return Err(Trap::OutOfBoundsMemoryAccess);
        }
        Ok(addr as usize..end as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::module::Limits;

    fn memory(min: u32, max: Option<u32>) -> MemoryInstance {
        MemoryInstance::new(&MemoryType {
            limits: Limits { min, max },
        })
        .unwrap()
    }

    #[test]
    fn test_memory_creation() {
        let mem = memory(1, None);
        assert_eq!(mem.size(), 1);
        assert_eq!(mem.len(), PAGE_SIZE);
        assert!(mem.data().iter().all(|b| *b == 0));

        let empty = memory(0, Some(0));
        assert!(empty.is_empty());
        assert_eq!(empty.max(), Some(0));
    }

    #[test]
    fn test_memory_too_big_at_creation() {
        let result = MemoryInstance::new(&MemoryType {
            limits: Limits {
                min: MAX_MEMORY_PAGES + 1,
                max: None,
            },
        });
        assert!(matches!(result, Err(RuntimeError::MemoryTooBig)));
    }

    #[test]
    fn test_grow() {
        let mut mem = memory(1, Some(3));
        assert_eq!(mem.grow(1).unwrap(), 1);
        assert_eq!(mem.size(), 2);
        assert_eq!(mem.grow(0).unwrap(), 2);

        assert!(matches!(mem.grow(2), Err(RuntimeError::MemoryTooBig)));
        assert_eq!(mem.size(), 2);
        assert_eq!(mem.len(), 2 * PAGE_SIZE);
    }

    #[test]
    fn test_grow_past_ceiling_without_max() {
        let mut mem = memory(0, None);
        assert!(matches!(mem.grow(MAX_MEMORY_PAGES + 1), Err(RuntimeError::MemoryTooBig)));
        assert!(matches!(mem.grow(u32::MAX), Err(RuntimeError::MemoryTooBig)));
        assert_eq!(mem.size(), 0);
    }

    #[test]
    fn test_load_store() {
        let mut mem = memory(1, None);
        mem.store(8, 0x12345678u32.to_le_bytes()).unwrap();
        assert_eq!(mem.load::<4>(8).unwrap(), [0x78, 0x56, 0x34, 0x12]);
        assert_eq!(mem.load::<1>(9).unwrap(), [0x56]);
        assert_eq!(mem.bytes(8, 2).unwrap(), &[0x78, 0x56]);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut mem = memory(1, None);
        let last = PAGE_SIZE as u64;
        assert!(mem.load::<1>(last - 1).is_ok());
        assert_eq!(mem.load::<1>(last), Err(Trap::OutOfBoundsMemoryAccess));
        assert_eq!(mem.load::<4>(last - 3), Err(Trap::OutOfBoundsMemoryAccess));
        assert_eq!(mem.load::<8>(u64::MAX), Err(Trap::OutOfBoundsMemoryAccess));
        assert_eq!(mem.store(last - 1, [1, 2]), Err(Trap::OutOfBoundsMemoryAccess));
        // a failed store writes nothing
        assert_eq!(mem.load::<1>(last - 1).unwrap(), [0]);
    }

    #[test]
    fn test_write_segment() {
        let mut mem = memory(1, None);
        mem.write(PAGE_SIZE - 2, b"hi").unwrap();
        assert_eq!(mem.bytes(PAGE_SIZE as u64 - 2, 2).unwrap(), b"hi");
        assert!(mem.write(PAGE_SIZE - 1, b"hi").is_err());
        assert!(mem.write(PAGE_SIZE, b"").is_ok());
    }
}
