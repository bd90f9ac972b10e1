//! Simple assembler for LS-8 programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//! LABEL:          ; Define a label
//!     LDI R0,8    ; Load immediate into a register
//!     LDI R1,SUB  ; Immediates may be labels
//!     CALL R1
//!     PRN R0
//!     HLT
//!
//!     ORG 100     ; Pad with zeros up to address 100
//!     DAT 42      ; Define a data byte
//! ```

use crate::cpu::decode::{Instruction, encode};
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to LS-8 instruction bytes.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// A parsed operand value: either a literal byte or a label reference
/// resolved in pass 2.
enum Value {
    Imm(u8),
    Label(String),
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> address).
    symbols: HashMap<String, u8>,
    /// Pending references (byte index in output, label, source line).
    pending: Vec<(usize, String, usize)>,
    /// Output bytes.
    output: Vec<u8>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u8>, AssemblerError> {
        // Pass 1: Collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: Resolve forward references
        self.resolve_references()?;

        Ok(self.output.clone())
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with(';') {
            return Ok(());
        }

        // Remove inline comments
        let line = if let Some(idx) = line.find(';') {
            line[..idx].trim()
        } else {
            line
        };

        if line.is_empty() {
            return Ok(());
        }

        // Check for label definition
        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_uppercase();
            if !label.is_empty() {
                let addr = self.current_addr(line_num)?;
                self.symbols.insert(label, addr);
            }

            // Process rest of line if any
            let rest = line[colon_idx + 1..].trim();
            if !rest.is_empty() {
                return self.process_instruction(rest, line_num);
            }
            return Ok(());
        }

        self.process_instruction(line, line_num)
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let parts: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            return Ok(());
        }

        let mnemonic = parts[0].to_uppercase();
        let operands = &parts[1..];

        match mnemonic.as_str() {
            // Directives
            "ORG" => {
                let target = self.parse_literal(self.operand(operands, 0, line_num)?, line_num)?;
                if (target as usize) < self.output.len() {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: format!("ORG {} is behind the current address", target),
                    });
                }
                self.output.resize(target as usize, 0);
            }

            "DAT" | "DATA" => {
                let byte = match self.parse_value(self.operand(operands, 0, line_num)?, line_num)? {
                    Value::Imm(v) => v,
                    Value::Label(name) => {
                        self.pending.push((self.output.len(), name, line_num));
                        0
                    }
                };
                self.output.push(byte);
            }

            // Instructions
            _ => {
                let instr = self.parse_instruction(&mnemonic, operands, line_num)?;
                self.output.extend(encode(&instr));
            }
        }

        Ok(())
    }

    fn parse_instruction(
        &mut self,
        mnemonic: &str,
        operands: &[&str],
        line_num: usize,
    ) -> Result<Instruction, AssemblerError> {
        let instr = match mnemonic {
            "LDI" => {
                let reg = self.parse_register(self.operand(operands, 0, line_num)?, line_num)?;
                // Resolve the immediate, leaving a placeholder byte for
                // label references (patched in pass 2)
                let value = match self.parse_value(self.operand(operands, 1, line_num)?, line_num)? {
                    Value::Imm(v) => v,
                    Value::Label(name) => {
                        self.pending.push((self.output.len() + 2, name, line_num));
                        0
                    }
                };
                Instruction::Ldi { reg, value }
            }

            "PRN" => Instruction::Prn { reg: self.single_register(operands, line_num)? },
            "PUSH" => Instruction::Push { reg: self.single_register(operands, line_num)? },
            "POP" => Instruction::Pop { reg: self.single_register(operands, line_num)? },
            "CALL" => Instruction::Call { reg: self.single_register(operands, line_num)? },
            "JMP" => Instruction::Jmp { reg: self.single_register(operands, line_num)? },
            "JEQ" => Instruction::Jeq { reg: self.single_register(operands, line_num)? },
            "JNE" => Instruction::Jne { reg: self.single_register(operands, line_num)? },

            "ADD" => {
                let (dst, src) = self.register_pair(operands, line_num)?;
                Instruction::Add { dst, src }
            }
            "MUL" => {
                let (dst, src) = self.register_pair(operands, line_num)?;
                Instruction::Mul { dst, src }
            }
            "CMP" => {
                let (a, b) = self.register_pair(operands, line_num)?;
                Instruction::Cmp { a, b }
            }

            "HLT" | "HALT" => Instruction::Halt,
            "RET" => Instruction::Ret,

            _ => {
                return Err(AssemblerError::UnknownMnemonic {
                    line: line_num,
                    mnemonic: mnemonic.to_string(),
                })
            }
        };

        Ok(instr)
    }

    fn operand<'a>(
        &self,
        operands: &[&'a str],
        index: usize,
        line_num: usize,
    ) -> Result<&'a str, AssemblerError> {
        operands.get(index).copied().ok_or_else(|| AssemblerError::SyntaxError {
            line: line_num,
            message: format!("missing operand {}", index + 1),
        })
    }

    fn single_register(&self, operands: &[&str], line_num: usize) -> Result<u8, AssemblerError> {
        self.parse_register(self.operand(operands, 0, line_num)?, line_num)
    }

    fn register_pair(&self, operands: &[&str], line_num: usize) -> Result<(u8, u8), AssemblerError> {
        let a = self.parse_register(self.operand(operands, 0, line_num)?, line_num)?;
        let b = self.parse_register(self.operand(operands, 1, line_num)?, line_num)?;
        Ok((a, b))
    }

    fn parse_register(&self, operand: &str, line_num: usize) -> Result<u8, AssemblerError> {
        let upper = operand.to_uppercase();
        let index = upper
            .strip_prefix('R')
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|&n| n < 8);

        index.ok_or_else(|| AssemblerError::SyntaxError {
            line: line_num,
            message: format!("expected register R0-R7, found {:?}", operand),
        })
    }

    /// Parse a literal or label operand.
    fn parse_value(&self, operand: &str, line_num: usize) -> Result<Value, AssemblerError> {
        let operand = operand.trim();

        let literal = if let Some(hex) = operand.strip_prefix("0x").or_else(|| operand.strip_prefix("0X")) {
            Some(i64::from_str_radix(hex, 16).map_err(|_| AssemblerError::SyntaxError {
                line: line_num,
                message: "invalid hex literal".into(),
            })?)
        } else if let Some(bin) = operand.strip_prefix("0b").or_else(|| operand.strip_prefix("0B")) {
            Some(i64::from_str_radix(bin, 2).map_err(|_| AssemblerError::SyntaxError {
                line: line_num,
                message: "invalid binary literal".into(),
            })?)
        } else {
            operand.parse::<i64>().ok()
        };

        if let Some(value) = literal {
            if !(0..=255).contains(&value) {
                return Err(AssemblerError::ValueOutOfRange { line: line_num, value });
            }
            return Ok(Value::Imm(value as u8));
        }

        // Must be a label reference - resolved in pass 2
        Ok(Value::Label(operand.to_uppercase()))
    }

    /// Parse an operand that must be a literal (no label allowed).
    fn parse_literal(&self, operand: &str, line_num: usize) -> Result<u8, AssemblerError> {
        match self.parse_value(operand, line_num)? {
            Value::Imm(v) => Ok(v),
            Value::Label(name) => Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("expected a literal value, found label {:?}", name),
            }),
        }
    }

    fn current_addr(&self, line_num: usize) -> Result<u8, AssemblerError> {
        u8::try_from(self.output.len()).map_err(|_| AssemblerError::ValueOutOfRange {
            line: line_num,
            value: self.output.len() as i64,
        })
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for (byte_idx, label, line_num) in &self.pending {
            let addr = self.symbols.get(label).ok_or_else(|| AssemblerError::UndefinedLabel {
                line: *line_num,
                label: label.clone(),
            })?;

            self.output[*byte_idx] = *addr;
        }
        Ok(())
    }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },
}
