use thiserror::Error;

use crate::constants::{FONT, FONT_START, MEMORY_SIZE};

/// Represents errors related to memory accesses
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// The given address was outside the address space
    #[error("invalid address {0:#06x}")]
    InvalidAddress(u16),
}

/// The 4 KiB address space of the machine.
///
/// Every access goes through a bounds-checked accessor; a derived address
/// that lands outside the array is reported as [`MemoryError::InvalidAddress`]
/// instead of being read through.
#[derive(Clone)]
pub struct Memory {
    inner: Box<[u8; MEMORY_SIZE]>,
}

impl Default for Memory {
    fn default() -> Self {
        let mut inner = Box::new([0; MEMORY_SIZE]);

        // The glyph table lives in the reserved low region
        let start = usize::from(FONT_START);
        inner[start..start + FONT.len()].copy_from_slice(&FONT);

        Self { inner }
    }
}

impl Memory {
    /// Read the byte at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn get(&self, address: u16) -> Result<u8, MemoryError> {
        self.inner
            .get(usize::from(address))
            .copied()
            .ok_or(MemoryError::InvalidAddress(address))
    }

    /// Get a mutable reference to the byte at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn get_mut(&mut self, address: u16) -> Result<&mut u8, MemoryError> {
        self.inner
            .get_mut(usize::from(address))
            .ok_or(MemoryError::InvalidAddress(address))
    }

    /// Borrow `len` bytes starting at an address
    ///
    /// # Errors
    ///
    /// It fails if any byte of the block is out of bounds.
    pub fn slice(&self, address: u16, len: usize) -> Result<&[u8], MemoryError> {
        let start = usize::from(address);
        let end = start
            .checked_add(len)
            .filter(|&end| end <= MEMORY_SIZE)
            .ok_or(MemoryError::InvalidAddress(address))?;
        Ok(&self.inner[start..end])
    }

    /// Borrow `len` bytes starting at an address, mutably
    ///
    /// # Errors
    ///
    /// It fails if any byte of the block is out of bounds.
    pub fn slice_mut(&mut self, address: u16, len: usize) -> Result<&mut [u8], MemoryError> {
        let start = usize::from(address);
        let end = start
            .checked_add(len)
            .filter(|&end| end <= MEMORY_SIZE)
            .ok_or(MemoryError::InvalidAddress(address))?;
        Ok(&mut self.inner[start..end])
    }

    /// Read the big-endian 2-byte opcode at an address
    ///
    /// # Errors
    ///
    /// It fails if either byte is out of bounds.
    pub fn read_opcode(&self, address: u16) -> Result<u16, MemoryError> {
        let high = self.get(address)?;
        let low = self.get(address.wrapping_add(1))?;
        Ok((u16::from(high) << 8) | u16::from(low))
    }

    /// Copy a block of bytes into memory, starting at an address
    ///
    /// # Errors
    ///
    /// It fails if the block does not fit; nothing is copied in that case.
    pub fn load(&mut self, address: u16, bytes: &[u8]) -> Result<(), MemoryError> {
        let target = self.slice_mut(address, bytes.len())?;
        target.copy_from_slice(bytes);
        Ok(())
    }
}
