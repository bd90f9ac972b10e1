//! Assembler, disassembler and the textual `.ls8` program format.

pub mod assembler;
pub mod disasm;
pub mod loader;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, format_instruction};
pub use loader::{ProgramFile, parse_source, load_program_file, save_program_file, LoadError};
