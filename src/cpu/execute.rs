//! CPU execution engine for the LS-8.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::cpu::{Memory, Registers};
use crate::cpu::decode::{self, Instruction, DecodeError};
use crate::cpu::memory::MemoryError;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted cleanly (executed HALT).
    Halted,
    /// CPU stopped on an unrecoverable error.
    Fault,
}

/// Sink for values emitted by the PRN instruction.
///
/// The CPU only carries the 8-bit value; collaborators decide how to
/// render it.
pub trait Output {
    fn emit(&mut self, value: u8);
}

impl Output for Vec<u8> {
    fn emit(&mut self, value: u8) {
        self.push(value);
    }
}

/// ALU operation selector.
///
/// Only ADD and CMP are implemented; SUB is reserved and fails with
/// [`CpuError::UnsupportedAluOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AluOp {
    Add,
    Sub,
    Cmp,
}

/// The LS-8 CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count (for profiling).
    pub cycles: u64,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU in the power-on state.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
            last_instr: None,
        }
    }

    /// Reset the CPU to the power-on state.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.last_instr = None;
    }

    /// Load a program into memory starting at address 0.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        self.mem.load(program)
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed, or an error. Decode
    /// and execution errors leave the CPU in [`CpuState::Fault`].
    pub fn step(&mut self, out: &mut dyn Output) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        // Fetch: the opcode at PC plus the two bytes an instruction may
        // use as operands.
        let pc = self.regs.pc;
        let opcode = self.mem.read(pc);
        let a = self.mem.read(pc.wrapping_add(1));
        let b = self.mem.read(pc.wrapping_add(2));

        // Decode
        let instr = match decode::decode(opcode, a, b) {
            Ok(instr) => instr,
            Err(e) => {
                self.state = CpuState::Fault;
                return Err(CpuError::Decode(e));
            }
        };

        // Execute
        if let Err(e) = self.execute(instr, out) {
            self.state = CpuState::Fault;
            return Err(e);
        }

        // Update state
        self.cycles += 1;
        self.last_instr = Some(instr);

        Ok(instr)
    }

    /// Run until halt or error.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self, out: &mut dyn Output) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step(out)?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, out: &mut dyn Output, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles + max_cycles;

        while self.state == CpuState::Running && self.cycles < limit {
            self.step(out)?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Execute a decoded instruction.
    ///
    /// Each arm either advances the PC by the instruction's width or
    /// assigns it a new value.
    fn execute(&mut self, instr: Instruction, out: &mut dyn Output) -> Result<(), CpuError> {
        let pc = self.regs.pc;

        match instr {
            Instruction::Ldi { reg, value } => {
                self.write_reg(reg, value)?;
                self.regs.advance_pc(instr.width());
            }

            Instruction::Prn { reg } => {
                let value = self.read_reg(reg)?;
                out.emit(value);
                self.regs.advance_pc(instr.width());
            }

            Instruction::Halt => {
                self.state = CpuState::Halted;
            }

            Instruction::Mul { dst, src } => {
                let product = self.read_reg(dst)?.wrapping_mul(self.read_reg(src)?);
                self.write_reg(dst, product)?;
                self.regs.advance_pc(instr.width());
            }

            Instruction::Add { dst, src } => {
                // ADD hands the ALU register indices.
                self.alu(AluOp::Add, dst, src)?;
                self.regs.advance_pc(instr.width());
            }

            Instruction::Cmp { a, b } => {
                // CMP hands the ALU the already-read values.
                let value_a = self.read_reg(a)?;
                let value_b = self.read_reg(b)?;
                self.alu(AluOp::Cmp, value_a, value_b)?;
                self.regs.advance_pc(instr.width());
            }

            Instruction::Push { reg } => {
                let value = self.read_reg(reg)?;
                self.push(value);
                self.regs.advance_pc(instr.width());
            }

            Instruction::Pop { reg } => {
                let value = self.pop();
                self.write_reg(reg, value)?;
                self.regs.advance_pc(instr.width());
            }

            Instruction::Call { reg } => {
                let target = self.read_reg(reg)?;
                self.push(pc.wrapping_add(instr.width()));
                self.regs.jump(target);
            }

            Instruction::Ret => {
                let addr = self.pop();
                self.regs.jump(addr);
            }

            Instruction::Jmp { reg } => {
                let target = self.read_reg(reg)?;
                self.regs.jump(target);
            }

            Instruction::Jeq { reg } => {
                let target = self.read_reg(reg)?;
                if self.regs.flags.equal {
                    self.regs.jump(target);
                } else {
                    self.regs.advance_pc(instr.width());
                }
            }

            Instruction::Jne { reg } => {
                let target = self.read_reg(reg)?;
                if self.regs.flags.equal {
                    self.regs.advance_pc(instr.width());
                } else {
                    self.regs.jump(target);
                }
            }
        }

        Ok(())
    }

    /// Perform an ALU operation.
    ///
    /// The calling convention differs per operation: `Add` treats `a`
    /// and `b` as register indices and writes the wrapped sum back to
    /// register `a`; `Cmp` treats them as the two values already read
    /// from registers and only sets the flags. Callers must respect
    /// this distinction.
    pub fn alu(&mut self, op: AluOp, a: u8, b: u8) -> Result<(), CpuError> {
        match op {
            AluOp::Add => {
                let sum = self.read_reg(a)?.wrapping_add(self.read_reg(b)?);
                self.write_reg(a, sum)?;
            }
            AluOp::Cmp => {
                self.regs.flags.set_compare(a, b);
            }
            _ => return Err(CpuError::UnsupportedAluOp(op)),
        }

        Ok(())
    }

    /// Push a value onto the downward-growing stack.
    fn push(&mut self, value: u8) {
        let sp = self.regs.sp().wrapping_sub(1);
        self.regs.set_sp(sp);
        self.mem.write(sp, value);
    }

    /// Pop a value off the stack.
    fn pop(&mut self) -> u8 {
        let sp = self.regs.sp();
        let value = self.mem.read(sp);
        self.regs.set_sp(sp.wrapping_add(1));
        value
    }

    /// Read a general-purpose register, checking the index.
    fn read_reg(&self, index: u8) -> Result<u8, CpuError> {
        self.regs
            .gp
            .get(index as usize)
            .copied()
            .ok_or(CpuError::RegisterOutOfRange(index))
    }

    /// Write a general-purpose register, checking the index.
    fn write_reg(&mut self, index: u8, value: u8) -> Result<(), CpuError> {
        match self.regs.gp.get_mut(index as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(CpuError::RegisterOutOfRange(index)),
        }
    }

    /// Format the machine state as a one-line trace: PC, the three
    /// bytes at PC, and all eight registers, in two-digit hex.
    pub fn trace(&self) -> String {
        let pc = self.regs.pc;
        let mut line = format!(
            "TRACE: {:02X} | {:02X} {:02X} {:02X} |",
            pc,
            self.mem.read(pc),
            self.mem.read(pc.wrapping_add(1)),
            self.mem.read(pc.wrapping_add(2)),
        );

        for value in self.regs.gp {
            line.push_str(&format!(" {:02X}", value));
        }

        line
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU halted cleanly.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("register index {0} out of range (0-7)")]
    RegisterOutOfRange(u8),

    #[error("unsupported ALU operation: {0:?}")]
    UnsupportedAluOp(AluOp),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::encode;
    use crate::cpu::registers::STACK_TOP;
    use proptest::prelude::*;

    fn make_program(instructions: &[Instruction]) -> Vec<u8> {
        instructions.iter().flat_map(encode).collect()
    }

    fn run_program(instructions: &[Instruction]) -> (Cpu, Vec<u8>) {
        let mut cpu = Cpu::new();
        cpu.load_program(&make_program(instructions)).unwrap();

        let mut out = Vec::new();
        cpu.run(&mut out).unwrap();

        (cpu, out)
    }

    #[test]
    fn test_cpu_halt() {
        let mut cpu = Cpu::new();
        cpu.load_program(&make_program(&[Instruction::Halt])).unwrap();

        let mut out = Vec::new();
        let executed = cpu.run(&mut out).unwrap();

        assert_eq!(executed, 1);
        assert!(cpu.is_halted());
        assert!(out.is_empty());
    }

    #[test]
    fn test_cpu_ldi_prn() {
        let (cpu, out) = run_program(&[
            Instruction::Ldi { reg: 0, value: 8 },
            Instruction::Prn { reg: 0 },
            Instruction::Halt,
        ]);

        assert_eq!(cpu.regs.gp[0], 8);
        assert_eq!(out, vec![8]);
    }

    #[test]
    fn test_cpu_mul_program() {
        // LDI R0,8; LDI R1,9; MUL R0,R1; PRN R0; HALT -> emits 72
        let (cpu, out) = run_program(&[
            Instruction::Ldi { reg: 0, value: 8 },
            Instruction::Ldi { reg: 1, value: 9 },
            Instruction::Mul { dst: 0, src: 1 },
            Instruction::Prn { reg: 0 },
            Instruction::Halt,
        ]);

        assert_eq!(out, vec![72]);
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_cpu_add_wraps() {
        let (_, out) = run_program(&[
            Instruction::Ldi { reg: 0, value: 250 },
            Instruction::Ldi { reg: 1, value: 10 },
            Instruction::Add { dst: 0, src: 1 },
            Instruction::Prn { reg: 0 },
            Instruction::Halt,
        ]);

        assert_eq!(out, vec![4]);
    }

    #[test]
    fn test_cpu_cmp_sets_flags() {
        let (cpu, _) = run_program(&[
            Instruction::Ldi { reg: 0, value: 3 },
            Instruction::Ldi { reg: 1, value: 3 },
            Instruction::Cmp { a: 0, b: 1 },
            Instruction::Halt,
        ]);

        assert!(cpu.regs.flags.equal);
        assert!(!cpu.regs.flags.less);
        assert!(!cpu.regs.flags.greater);
    }

    #[test]
    fn test_cpu_push_pop_transfers_value() {
        let (cpu, _) = run_program(&[
            Instruction::Ldi { reg: 0, value: 42 },
            Instruction::Push { reg: 0 },
            Instruction::Pop { reg: 1 },
            Instruction::Halt,
        ]);

        assert_eq!(cpu.regs.gp[1], 42);
        // Net zero stack displacement
        assert_eq!(cpu.regs.sp(), STACK_TOP);
    }

    #[test]
    fn test_cpu_push_decrements_sp() {
        let (cpu, _) = run_program(&[
            Instruction::Ldi { reg: 0, value: 7 },
            Instruction::Push { reg: 0 },
            Instruction::Halt,
        ]);

        assert_eq!(cpu.regs.sp(), STACK_TOP - 1);
        assert_eq!(cpu.mem.read(STACK_TOP - 1), 7);
    }

    #[test]
    fn test_cpu_call_ret() {
        // 0: LDI R1,8
        // 3: CALL R1    (pushes 5, the address of PRN)
        // 5: PRN R0
        // 7: HALT
        // 8: LDI R0,5
        // 11: RET
        let (cpu, out) = run_program(&[
            Instruction::Ldi { reg: 1, value: 8 },
            Instruction::Call { reg: 1 },
            Instruction::Prn { reg: 0 },
            Instruction::Halt,
            Instruction::Ldi { reg: 0, value: 5 },
            Instruction::Ret,
        ]);

        assert_eq!(out, vec![5]);
        assert!(cpu.is_halted());
        // RET popped the return address back off the stack
        assert_eq!(cpu.regs.sp(), STACK_TOP);
    }

    #[test]
    fn test_cpu_jmp() {
        // 0: LDI R0,6; 3: JMP R0; 5: HALT; 6: LDI R1,1; 9: HALT
        let (cpu, _) = run_program(&[
            Instruction::Ldi { reg: 0, value: 6 },
            Instruction::Jmp { reg: 0 },
            Instruction::Halt,
            Instruction::Ldi { reg: 1, value: 1 },
            Instruction::Halt,
        ]);

        assert_eq!(cpu.regs.gp[1], 1);
    }

    #[test]
    fn test_cpu_jeq_taken() {
        // 0: LDI R0,1  3: LDI R1,1  6: CMP R0,R1  9: LDI R2,17
        // 12: JEQ R2  14: LDI R3,99  17: HALT
        let (cpu, _) = run_program(&[
            Instruction::Ldi { reg: 0, value: 1 },
            Instruction::Ldi { reg: 1, value: 1 },
            Instruction::Cmp { a: 0, b: 1 },
            Instruction::Ldi { reg: 2, value: 17 },
            Instruction::Jeq { reg: 2 },
            Instruction::Ldi { reg: 3, value: 99 },
            Instruction::Halt,
        ]);

        // The branch skipped the LDI R3,99
        assert_eq!(cpu.regs.gp[3], 0);
    }

    #[test]
    fn test_cpu_jeq_falls_through() {
        let (cpu, _) = run_program(&[
            Instruction::Ldi { reg: 0, value: 1 },
            Instruction::Ldi { reg: 1, value: 2 },
            Instruction::Cmp { a: 0, b: 1 },
            Instruction::Ldi { reg: 2, value: 17 },
            Instruction::Jeq { reg: 2 },
            Instruction::Ldi { reg: 3, value: 99 },
            Instruction::Halt,
        ]);

        assert_eq!(cpu.regs.gp[3], 99);
    }

    #[test]
    fn test_cpu_jne_taken() {
        let (cpu, _) = run_program(&[
            Instruction::Ldi { reg: 0, value: 1 },
            Instruction::Ldi { reg: 1, value: 2 },
            Instruction::Cmp { a: 0, b: 1 },
            Instruction::Ldi { reg: 2, value: 17 },
            Instruction::Jne { reg: 2 },
            Instruction::Ldi { reg: 3, value: 99 },
            Instruction::Halt,
        ]);

        assert_eq!(cpu.regs.gp[3], 0);
    }

    #[test]
    fn test_cpu_unknown_opcode_faults() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0b1111_1111]).unwrap();

        let mut out = Vec::new();
        let err = cpu.run(&mut out).unwrap_err();

        assert!(matches!(err, CpuError::Decode(_)));
        assert_eq!(cpu.state, CpuState::Fault);
        assert!(!cpu.is_halted());
    }

    #[test]
    fn test_cpu_register_out_of_range_faults() {
        // PRN with a malformed register operand
        let mut cpu = Cpu::new();
        cpu.load_program(&[0b0100_0111, 9, 0b0000_0001]).unwrap();

        let mut out = Vec::new();
        let err = cpu.run(&mut out).unwrap_err();

        assert!(matches!(err, CpuError::RegisterOutOfRange(9)));
        assert_eq!(cpu.state, CpuState::Fault);
    }

    #[test]
    fn test_cpu_step_after_halt() {
        let mut cpu = Cpu::new();
        cpu.load_program(&make_program(&[Instruction::Halt])).unwrap();

        let mut out = Vec::new();
        cpu.run(&mut out).unwrap();

        assert!(matches!(
            cpu.step(&mut out),
            Err(CpuError::NotRunning(CpuState::Halted))
        ));
    }

    #[test]
    fn test_cpu_run_limited_stops() {
        // LDI R0,0; JMP R0 loops forever
        let mut cpu = Cpu::new();
        cpu.load_program(&make_program(&[
            Instruction::Ldi { reg: 0, value: 0 },
            Instruction::Jmp { reg: 0 },
        ]))
        .unwrap();

        let mut out = Vec::new();
        let executed = cpu.run_limited(&mut out, 10).unwrap();

        assert_eq!(executed, 10);
        assert!(cpu.is_running());
    }

    #[test]
    fn test_alu_add_takes_register_indices() {
        let mut cpu = Cpu::new();
        cpu.regs.gp[0] = 3;
        cpu.regs.gp[1] = 4;

        cpu.alu(AluOp::Add, 0, 1).unwrap();

        assert_eq!(cpu.regs.gp[0], 7);
    }

    #[test]
    fn test_alu_cmp_takes_values() {
        let mut cpu = Cpu::new();

        // 200 > 7 would be out of range as register indices
        cpu.alu(AluOp::Cmp, 200, 7).unwrap();

        assert!(cpu.regs.flags.greater);
    }

    #[test]
    fn test_alu_unsupported_operation() {
        let mut cpu = Cpu::new();

        assert!(matches!(
            cpu.alu(AluOp::Sub, 0, 1),
            Err(CpuError::UnsupportedAluOp(AluOp::Sub))
        ));
    }

    #[test]
    fn test_trace_format() {
        let mut cpu = Cpu::new();
        cpu.load_program(&make_program(&[Instruction::Ldi { reg: 0, value: 8 }]))
            .unwrap();

        let line = cpu.trace();
        assert!(line.starts_with("TRACE: 00 | 82 00 08 |"));
        // All eight registers follow the second separator
        assert_eq!(line.split_whitespace().count(), 15);
    }

    proptest! {
        #[test]
        fn prop_ldi_stores_exactly(reg in 0u8..8, value: u8) {
            let (cpu, _) = run_program(&[
                Instruction::Ldi { reg, value },
                Instruction::Halt,
            ]);
            prop_assert_eq!(cpu.regs.gp[reg as usize], value);
        }

        #[test]
        fn prop_add_wraps_mod_256(x: u8, y: u8) {
            let (cpu, _) = run_program(&[
                Instruction::Ldi { reg: 0, value: x },
                Instruction::Ldi { reg: 1, value: y },
                Instruction::Add { dst: 0, src: 1 },
                Instruction::Halt,
            ]);
            prop_assert_eq!(cpu.regs.gp[0], x.wrapping_add(y));
        }

        #[test]
        fn prop_mul_wraps_mod_256(x: u8, y: u8) {
            let (cpu, _) = run_program(&[
                Instruction::Ldi { reg: 0, value: x },
                Instruction::Ldi { reg: 1, value: y },
                Instruction::Mul { dst: 0, src: 1 },
                Instruction::Halt,
            ]);
            prop_assert_eq!(cpu.regs.gp[0], x.wrapping_mul(y));
        }

        #[test]
        fn prop_cmp_sets_exactly_one_flag(a: u8, b: u8) {
            let mut cpu = Cpu::new();
            cpu.alu(AluOp::Cmp, a, b).unwrap();

            let flags = cpu.regs.flags;
            let set = [flags.equal, flags.less, flags.greater]
                .iter()
                .filter(|&&f| f)
                .count();
            prop_assert_eq!(set, 1);
        }
    }
}
