//! WebAssembly linear memory implementation
//!
//! Memory layout follows the WebAssembly core rules:
//! - Page size: 64KB (65,536 bytes)
//! - Address space: 32-bit (max 4GB)
//! - Every access is bounds-checked; out-of-bounds access traps
//!
//! Effective addresses are computed as `base + offset` in 64 bits, so the
//! sum can never wrap back into bounds.

use super::{RuntimeError, TrapKind};
use byteorder::{ByteOrder, LittleEndian};

/// WebAssembly page size in bytes (64KB)
pub const PAGE_SIZE: usize = 65536;

/// Maximum number of pages (2^16 = 64K pages = 4GB total)
pub const MAX_PAGES: u32 = 65536;

/// A WebAssembly linear memory instance
#[derive(Debug)]
pub struct Memory {
    data: Vec<u8>,
    current_pages: u32,
    max_pages: Option<u32>,
}

impl Memory {
    /// Create a new zeroed memory of `initial_pages`
    ///
    /// # Errors
    /// - Initial pages exceeds maximum
    /// - Maximum exceeds the 4GB address space
    pub fn new(initial_pages: u32, max_pages: Option<u32>) -> Result<Self, RuntimeError> {
        if initial_pages > MAX_PAGES {
            return Err(RuntimeError::MemoryLimits(format!(
                "initial size {initial_pages} pages exceeds maximum {MAX_PAGES} pages"
            )));
        }
        if let Some(max) = max_pages {
            if initial_pages > max {
                return Err(RuntimeError::MemoryLimits(format!(
                    "initial size {initial_pages} pages exceeds specified maximum {max} pages"
                )));
            }
            if max > MAX_PAGES {
                return Err(RuntimeError::MemoryLimits(format!(
                    "maximum size {max} pages exceeds system maximum {MAX_PAGES} pages"
                )));
            }
        }

        Ok(Memory {
            data: vec![0u8; initial_pages as usize * PAGE_SIZE],
            current_pages: initial_pages,
            max_pages,
        })
    }

    /// Current size in pages
    pub fn size(&self) -> u32 {
        self.current_pages
    }

    pub fn max_pages(&self) -> Option<u32> {
        self.max_pages
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Grow memory by `delta_pages`
    ///
    /// Returns the previous size in pages, or -1 if growth fails
    pub fn grow(&mut self, delta_pages: u32) -> i32 {
        let current = self.current_pages;
        let Some(new_pages) = current.checked_add(delta_pages) else {
            return -1;
        };
        if new_pages > self.max_pages.unwrap_or(MAX_PAGES) {
            return -1;
        }

        let new_bytes = new_pages as usize * PAGE_SIZE;
        match self.data.try_reserve(new_bytes - self.data.len()) {
            Ok(()) => {
                self.data.resize(new_bytes, 0);
                self.current_pages = new_pages;
                current as i32
            }
            Err(_) => -1,
        }
    }

    /// Resolve `base + offset` to a checked start index for an access of `size` bytes
    #[inline]
    fn check_bounds(&self, base: u32, offset: u32, size: usize) -> Result<usize, RuntimeError> {
        let start = base as u64 + offset as u64;
        if start + size as u64 > self.data.len() as u64 {
            return Err(TrapKind::OutOfBoundsMemoryAccess.into());
        }
        Ok(start as usize)
    }

    #[inline]
    fn slice(&self, base: u32, offset: u32, size: usize) -> Result<&[u8], RuntimeError> {
        let start = self.check_bounds(base, offset, size)?;
        Ok(&self.data[start..start + size])
    }

    #[inline]
    fn slice_mut(&mut self, base: u32, offset: u32, size: usize) -> Result<&mut [u8], RuntimeError> {
        let start = self.check_bounds(base, offset, size)?;
        Ok(&mut self.data[start..start + size])
    }

    pub fn read_u8(&self, base: u32, offset: u32) -> Result<u8, RuntimeError> {
        Ok(self.slice(base, offset, 1)?[0])
    }

    pub fn read_u16(&self, base: u32, offset: u32) -> Result<u16, RuntimeError> {
        Ok(LittleEndian::read_u16(self.slice(base, offset, 2)?))
    }

    pub fn read_u32(&self, base: u32, offset: u32) -> Result<u32, RuntimeError> {
        Ok(LittleEndian::read_u32(self.slice(base, offset, 4)?))
    }

    pub fn read_u64(&self, base: u32, offset: u32) -> Result<u64, RuntimeError> {
        Ok(LittleEndian::read_u64(self.slice(base, offset, 8)?))
    }

    pub fn write_u8(&mut self, base: u32, offset: u32, value: u8) -> Result<(), RuntimeError> {
        self.slice_mut(base, offset, 1)?[0] = value;
        Ok(())
    }

    pub fn write_u16(&mut self, base: u32, offset: u32, value: u16) -> Result<(), RuntimeError> {
        LittleEndian::write_u16(self.slice_mut(base, offset, 2)?, value);
        Ok(())
    }

    pub fn write_u32(&mut self, base: u32, offset: u32, value: u32) -> Result<(), RuntimeError> {
        LittleEndian::write_u32(self.slice_mut(base, offset, 4)?, value);
        Ok(())
    }

    pub fn write_u64(&mut self, base: u32, offset: u32, value: u64) -> Result<(), RuntimeError> {
        LittleEndian::write_u64(self.slice_mut(base, offset, 8)?, value);
        Ok(())
    }

    /// Copy `len` bytes out of memory
    pub fn read_bytes(&self, addr: u32, len: usize) -> Result<Vec<u8>, RuntimeError> {
        Ok(self.slice(addr, 0, len)?.to_vec())
    }

    pub fn write_bytes(&mut self, addr: u32, bytes: &[u8]) -> Result<(), RuntimeError> {
        self.slice_mut(addr, 0, bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_creation() {
        let mem = Memory::new(1, None).unwrap();
        assert_eq!(mem.size(), 1);
        assert_eq!(mem.len(), PAGE_SIZE);

        let mem = Memory::new(0, Some(0)).unwrap();
        assert!(mem.is_empty());

        assert!(Memory::new(2, Some(1)).is_err());
        assert!(Memory::new(MAX_PAGES + 1, None).is_err());
        assert!(Memory::new(1, Some(MAX_PAGES + 1)).is_err());
    }

    #[test]
    fn test_grow() {
        let mut mem = Memory::new(1, Some(3)).unwrap();
        assert_eq!(mem.grow(1), 1);
        assert_eq!(mem.size(), 2);
        assert_eq!(mem.grow(0), 2);
        assert_eq!(mem.grow(2), -1);
        assert_eq!(mem.size(), 2);
        assert_eq!(mem.grow(u32::MAX), -1);

        // new pages are zeroed
        assert_eq!(mem.read_u64(PAGE_SIZE as u32, 8).unwrap(), 0);
    }

    #[test]
    fn test_read_write_little_endian() {
        let mut mem = Memory::new(1, None).unwrap();
        mem.write_u32(0, 4, 0x0403_0201).unwrap();
        assert_eq!(mem.read_u8(4, 0).unwrap(), 0x01);
        assert_eq!(mem.read_u16(0, 5).unwrap(), 0x0302);
        assert_eq!(mem.read_bytes(4, 4).unwrap(), vec![1, 2, 3, 4]);

        mem.write_u64(100, 0, u64::MAX - 1).unwrap();
        assert_eq!(mem.read_u64(96, 4).unwrap(), u64::MAX - 1);
    }

    #[test]
    fn test_bounds() {
        let mut mem = Memory::new(1, None).unwrap();
        let last = (PAGE_SIZE - 4) as u32;
        assert!(mem.read_u32(last, 0).is_ok());
        assert_eq!(
            mem.read_u32(last, 1),
            Err(RuntimeError::Trap(TrapKind::OutOfBoundsMemoryAccess))
        );
        // base + offset must not wrap around
        assert!(mem.read_u8(u32::MAX, 1).is_err());
        assert!(mem.write_u8(u32::MAX, u32::MAX, 0).is_err());
        assert!(mem.write_bytes(last, &[0; 5]).is_err());
        assert!(mem.read_bytes(0, 0).unwrap().is_empty());
    }
}
