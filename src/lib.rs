//! # LS-8 Emulator
//!
//! An emulator of the LS-8, an 8-bit microcomputer with 256 bytes of
//! memory, eight general-purpose registers, and a small fixed
//! instruction set covering loads, arithmetic, a downward-growing
//! stack, subroutine call/return, and flag-driven conditional jumps.

pub mod cpu;
pub mod asm;

// Re-export commonly used types
pub use cpu::{Cpu, CpuState, CpuError, Memory, Registers, Flags, Instruction, Output};
pub use asm::{assemble, disassemble, AssemblerError, ProgramFile, load_program_file, save_program_file, parse_source};
