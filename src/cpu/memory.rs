//! LS-8 memory subsystem.
//!
//! The LS-8 has 256 eight-bit cells holding both program instructions
//! and runtime stack data. The stack grows downward from high addresses.

use serde::{Serialize, Deserialize};

/// The number of memory cells in the LS-8.
pub const MEMORY_SIZE: usize = 256;

/// LS-8 memory: 256 eight-bit cells.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<u8>,
}

impl Memory {
    /// Create a new memory with all cells zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE],
        }
    }

    /// Read a cell by address.
    ///
    /// Every `u8` address is a valid cell, so this cannot fail.
    #[inline]
    pub fn read(&self, addr: u8) -> u8 {
        self.cells[addr as usize]
    }

    /// Write a cell by address.
    #[inline]
    pub fn write(&mut self, addr: u8, value: u8) {
        self.cells[addr as usize] = value;
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell = 0;
        }
    }

    /// Load a program into memory starting at address 0.
    ///
    /// Overwrites prior contents of the covered cells. Registers, PC and
    /// flags are untouched; resetting those is the CPU's job.
    pub fn load(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        if program.len() > MEMORY_SIZE {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available: MEMORY_SIZE,
            });
        }

        for (i, &byte) in program.iter().enumerate() {
            self.cells[i] = byte;
        }

        Ok(())
    }

    /// Dump memory contents (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, u8)> {
        let end = (start + count).min(MEMORY_SIZE);
        (start..end)
            .map(|i| (i, self.cells[i]))
            .collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only show non-zero cells
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// Program is too large to fit in memory.
    ProgramTooLarge { size: usize, available: usize },
}

impl std::fmt::Display for MemoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryError::ProgramTooLarge { size, available } => {
                write!(f, "program size {} exceeds available space {}", size, available)
            }
        }
    }
}

impl std::error::Error for MemoryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new();

        mem.write(10, 42);
        assert_eq!(mem.read(10), 42);
    }

    #[test]
    fn test_memory_covers_full_address_space() {
        let mut mem = Memory::new();

        mem.write(0, 1);
        mem.write(255, 2);
        assert_eq!(mem.read(0), 1);
        assert_eq!(mem.read(255), 2);
    }

    #[test]
    fn test_load_program() {
        let mut mem = Memory::new();
        let program = vec![0b1000_0010, 0, 8];

        mem.load(&program).unwrap();

        assert_eq!(mem.read(0), 0b1000_0010);
        assert_eq!(mem.read(1), 0);
        assert_eq!(mem.read(2), 8);
    }

    #[test]
    fn test_load_overwrites_previous_program() {
        let mut mem = Memory::new();

        mem.load(&[1, 2, 3]).unwrap();
        mem.load(&[9]).unwrap();

        assert_eq!(mem.read(0), 9);
        // Cells past the new program keep their old contents
        assert_eq!(mem.read(1), 2);
    }

    #[test]
    fn test_load_too_large() {
        let mut mem = Memory::new();
        let program = vec![0; MEMORY_SIZE + 1];

        assert!(mem.load(&program).is_err());
    }
}
