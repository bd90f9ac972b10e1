//! Disassembler for LS-8 programs.
//!
//! Converts raw instruction bytes back to readable assembly.

use crate::cpu::decode::{decode, Instruction};

/// Disassemble a byte stream to an address-annotated listing.
///
/// Instruction widths drive the walk; a byte that decodes to no known
/// opcode is rendered as `???` and skipped as a single byte.
pub fn disassemble(bytes: &[u8]) -> String {
    let mut output = String::new();
    output.push_str("; LS-8 disassembly\n");
    output.push_str("; ----------------\n\n");

    let mut addr = 0;
    while addr < bytes.len() {
        let opcode = bytes[addr];
        let a = bytes.get(addr + 1).copied().unwrap_or(0);
        let b = bytes.get(addr + 2).copied().unwrap_or(0);

        let (text, width) = match decode(opcode, a, b) {
            Ok(instr) => (format_instruction(&instr), instr.width() as usize),
            Err(_) => (format!("??? ; {:#010b}", opcode), 1),
        };

        output.push_str(&format!("{:03}: {}\n", addr, text));
        addr += width;
    }

    output
}

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction) -> String {
    match *instr {
        Instruction::Ldi { reg, value } => format!("LDI R{},{}", reg, value),
        Instruction::Prn { reg } => format!("PRN R{}", reg),
        Instruction::Halt => "HLT".to_string(),
        Instruction::Mul { dst, src } => format!("MUL R{},R{}", dst, src),
        Instruction::Add { dst, src } => format!("ADD R{},R{}", dst, src),
        Instruction::Cmp { a, b } => format!("CMP R{},R{}", a, b),
        Instruction::Push { reg } => format!("PUSH R{}", reg),
        Instruction::Pop { reg } => format!("POP R{}", reg),
        Instruction::Call { reg } => format!("CALL R{}", reg),
        Instruction::Ret => "RET".to_string(),
        Instruction::Jmp { reg } => format!("JMP R{}", reg),
        Instruction::Jeq { reg } => format!("JEQ R{}", reg),
        Instruction::Jne { reg } => format!("JNE R{}", reg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assembler::assemble;

    #[test]
    fn test_disassemble_mul_program() {
        let bytes = [
            0b1000_0010, 0, 8,
            0b1000_0010, 1, 9,
            0b1010_0010, 0, 1,
            0b0100_0111, 0,
            0b0000_0001,
        ];

        let listing = disassemble(&bytes);

        assert!(listing.contains("000: LDI R0,8"));
        assert!(listing.contains("003: LDI R1,9"));
        assert!(listing.contains("006: MUL R0,R1"));
        assert!(listing.contains("009: PRN R0"));
        assert!(listing.contains("011: HLT"));
    }

    #[test]
    fn test_disassemble_unknown_byte() {
        let listing = disassemble(&[0b1111_1111, 0b0000_0001]);

        assert!(listing.contains("000: ???"));
        assert!(listing.contains("001: HLT"));
    }

    #[test]
    fn test_disassemble_assemble_roundtrip() {
        let source = "LDI R0,8\nPUSH R0\nPOP R1\nHLT\n";
        let bytes = assemble(source).unwrap();

        let listing = disassemble(&bytes);
        let reassembled = assemble(&listing).unwrap();

        assert_eq!(bytes, reassembled);
    }
}
