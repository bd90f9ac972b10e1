//! Instruction decoder for the LS-8.
//!
//! An LS-8 instruction is a single opcode byte followed by 0-2 operand
//! bytes. The opcode's two high bits encode the operand count and bit 5
//! marks ALU instructions; decoding dispatches on the exact byte value,
//! with widths carried per instruction.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Decoded LS-8 instruction.
///
/// The 13 instructions fall into groups:
/// - Loads and output: LDI, PRN
/// - Arithmetic: ADD, MUL, CMP
/// - Stack: PUSH, POP
/// - Control flow: CALL, RET, JMP, JEQ, JNE, HALT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Load immediate: reg := value
    Ldi { reg: u8, value: u8 },

    /// Print register: emit the value of reg to the output sink
    Prn { reg: u8 },

    /// Stop execution
    Halt,

    /// Multiply: dst := dst * src (wraps mod 256)
    Mul { dst: u8, src: u8 },

    /// Add via the ALU: dst := dst + src (wraps mod 256)
    Add { dst: u8, src: u8 },

    /// Compare via the ALU: set E/L/G flags from the values of a and b
    Cmp { a: u8, b: u8 },

    /// Push register onto the stack: SP := SP - 1; [SP] := reg
    Push { reg: u8 },

    /// Pop from the stack into a register: reg := [SP]; SP := SP + 1
    Pop { reg: u8 },

    /// Call subroutine: push the address after this instruction,
    /// then PC := value of reg
    Call { reg: u8 },

    /// Return from subroutine: PC := [SP]; SP := SP + 1
    Ret,

    /// Unconditional jump: PC := value of reg
    Jmp { reg: u8 },

    /// Jump if the E flag is set, otherwise fall through
    Jeq { reg: u8 },

    /// Jump if the E flag is clear, otherwise fall through
    Jne { reg: u8 },
}

/// Opcode byte values.
///
/// Bits 7-6 encode the operand count, bit 5 marks ALU instructions,
/// bit 4 marks instructions that set the PC.
struct Opcode;

impl Opcode {
    const LDI: u8 = 0b1000_0010;
    const PRN: u8 = 0b0100_0111;
    const HALT: u8 = 0b0000_0001;
    const MUL: u8 = 0b1010_0010;
    const ADD: u8 = 0b1010_0000;
    const CMP: u8 = 0b1010_0111;
    const PUSH: u8 = 0b0100_0101;
    const POP: u8 = 0b0100_0110;
    const CALL: u8 = 0b0101_0000;
    const RET: u8 = 0b0001_0001;
    const JMP: u8 = 0b0101_0100;
    const JEQ: u8 = 0b0101_0101;
    const JNE: u8 = 0b0101_0110;
}

/// Number of operand bytes implied by an opcode's two high bits.
///
/// This is the generic LS-8 bit encoding; dispatch uses the
/// per-instruction `width` table instead. The two agree for every
/// defined opcode.
#[inline]
pub fn operand_count(opcode: u8) -> u8 {
    opcode >> 6
}

/// Decode an opcode byte and its two following memory bytes.
///
/// `a` and `b` are the bytes at PC+1 and PC+2; instructions with fewer
/// operands ignore the extras.
pub fn decode(opcode: u8, a: u8, b: u8) -> Result<Instruction, DecodeError> {
    let instruction = match opcode {
        Opcode::LDI => Instruction::Ldi { reg: a, value: b },
        Opcode::PRN => Instruction::Prn { reg: a },
        Opcode::HALT => Instruction::Halt,
        Opcode::MUL => Instruction::Mul { dst: a, src: b },
        Opcode::ADD => Instruction::Add { dst: a, src: b },
        Opcode::CMP => Instruction::Cmp { a, b },
        Opcode::PUSH => Instruction::Push { reg: a },
        Opcode::POP => Instruction::Pop { reg: a },
        Opcode::CALL => Instruction::Call { reg: a },
        Opcode::RET => Instruction::Ret,
        Opcode::JMP => Instruction::Jmp { reg: a },
        Opcode::JEQ => Instruction::Jeq { reg: a },
        Opcode::JNE => Instruction::Jne { reg: a },
        _ => return Err(DecodeError::UnknownOpcode(opcode)),
    };

    Ok(instruction)
}

/// Encode an instruction back to its byte sequence.
pub fn encode(instr: &Instruction) -> Vec<u8> {
    match *instr {
        Instruction::Ldi { reg, value } => vec![Opcode::LDI, reg, value],
        Instruction::Prn { reg } => vec![Opcode::PRN, reg],
        Instruction::Halt => vec![Opcode::HALT],
        Instruction::Mul { dst, src } => vec![Opcode::MUL, dst, src],
        Instruction::Add { dst, src } => vec![Opcode::ADD, dst, src],
        Instruction::Cmp { a, b } => vec![Opcode::CMP, a, b],
        Instruction::Push { reg } => vec![Opcode::PUSH, reg],
        Instruction::Pop { reg } => vec![Opcode::POP, reg],
        Instruction::Call { reg } => vec![Opcode::CALL, reg],
        Instruction::Ret => vec![Opcode::RET],
        Instruction::Jmp { reg } => vec![Opcode::JMP, reg],
        Instruction::Jeq { reg } => vec![Opcode::JEQ, reg],
        Instruction::Jne { reg } => vec![Opcode::JNE, reg],
    }
}

impl Instruction {
    /// Total instruction width in bytes: the opcode plus its operands.
    ///
    /// Instructions that assign the PC (CALL, RET, JMP) still report
    /// their encoded width; the execution loop decides whether to
    /// advance by it.
    pub fn width(&self) -> u8 {
        match self {
            Instruction::Ldi { .. }
            | Instruction::Mul { .. }
            | Instruction::Add { .. }
            | Instruction::Cmp { .. } => 3,

            Instruction::Prn { .. }
            | Instruction::Push { .. }
            | Instruction::Pop { .. }
            | Instruction::Call { .. }
            | Instruction::Jmp { .. }
            | Instruction::Jeq { .. }
            | Instruction::Jne { .. } => 2,

            Instruction::Halt | Instruction::Ret => 1,
        }
    }

    /// True if executing this instruction assigns the PC directly
    /// instead of advancing it by `width()`.
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            Instruction::Call { .. } | Instruction::Ret | Instruction::Jmp { .. }
        )
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    #[error("unknown opcode: {0:#010b}")]
    UnknownOpcode(u8),
}
