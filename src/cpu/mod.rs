//! CPU emulation for the LS-8 microcomputer.
//!
//! This module implements the complete LS-8 architecture:
//! - 256 eight-bit memory cells shared by program and stack
//! - 8 general-purpose registers (R7 is the stack pointer), PC, and
//!   E/L/G comparison flags
//! - 13-instruction set with a byte-exact fetch-decode-execute loop

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;

pub use memory::{Memory, MemoryError, MEMORY_SIZE};
pub use registers::{Registers, Flags, NUM_REGISTERS, SP, STACK_TOP};
pub use decode::{Instruction, DecodeError};
pub use execute::{Cpu, CpuError, CpuState, AluOp, Output};
