//! LS-8 CPU registers.
//!
//! The LS-8 has:
//! - 8 general-purpose 8-bit registers R0-R7, where R7 is reserved as
//!   the stack pointer (SP) by convention
//! - PC: 8-bit program counter
//! - FL: comparison flags (Equal / Less / Greater), set by CMP

use serde::{Serialize, Deserialize};

/// Number of general-purpose registers.
pub const NUM_REGISTERS: usize = 8;

/// Index of the stack pointer register.
pub const SP: u8 = 7;

/// Initial stack pointer value: the top of memory reserved for the stack.
pub const STACK_TOP: u8 = 0xF4;

/// Comparison flags set by CMP and read by conditional jumps.
///
/// At most one flag is set at a time; all three are clear only before
/// the first comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flags {
    /// E: the two compared values were equal.
    pub equal: bool,
    /// L: the first value was less than the second.
    pub less: bool,
    /// G: the first value was greater than the second.
    pub greater: bool,
}

impl Flags {
    /// Set the flags from a three-way comparison of two values.
    ///
    /// Exactly one of E/L/G is set afterwards.
    pub fn set_compare(&mut self, a: u8, b: u8) {
        use std::cmp::Ordering;

        self.equal = false;
        self.less = false;
        self.greater = false;

        match a.cmp(&b) {
            Ordering::Equal => self.equal = true,
            Ordering::Less => self.less = true,
            Ordering::Greater => self.greater = true,
        }
    }

    /// Clear all flags to the undefined (pre-comparison) state.
    pub fn clear(&mut self) {
        *self = Flags::default();
    }
}

/// The LS-8 register file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Registers {
    /// General-purpose registers R0-R7. R7 is the stack pointer.
    pub gp: [u8; NUM_REGISTERS],

    /// PC: 8-bit program counter, address of the next instruction byte.
    pub pc: u8,

    /// FL: comparison flags.
    pub flags: Flags,
}

impl Registers {
    /// Create a new register file in the power-on state: everything
    /// zeroed except the stack pointer, which starts at the top of the
    /// stack region.
    pub fn new() -> Self {
        let mut gp = [0; NUM_REGISTERS];
        gp[SP as usize] = STACK_TOP;

        Self {
            gp,
            pc: 0,
            flags: Flags::default(),
        }
    }

    /// Reset all registers to the power-on state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Read the stack pointer.
    #[inline]
    pub fn sp(&self) -> u8 {
        self.gp[SP as usize]
    }

    /// Write the stack pointer.
    #[inline]
    pub fn set_sp(&mut self, value: u8) {
        self.gp[SP as usize] = value;
    }

    /// Advance the program counter by an instruction's width, wrapping
    /// around the 8-bit address space.
    pub fn advance_pc(&mut self, width: u8) {
        self.pc = self.pc.wrapping_add(width);
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, addr: u8) {
        self.pc = addr;
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_on_state() {
        let regs = Registers::new();

        assert_eq!(regs.pc, 0);
        assert_eq!(regs.sp(), STACK_TOP);
        for i in 0..NUM_REGISTERS - 1 {
            assert_eq!(regs.gp[i], 0);
        }
        assert_eq!(regs.flags, Flags::default());
    }

    #[test]
    fn test_flags_exclusive() {
        let mut flags = Flags::default();

        flags.set_compare(1, 2);
        assert!(flags.less && !flags.equal && !flags.greater);

        flags.set_compare(2, 2);
        assert!(flags.equal && !flags.less && !flags.greater);

        flags.set_compare(3, 2);
        assert!(flags.greater && !flags.equal && !flags.less);
    }

    #[test]
    fn test_flags_start_clear() {
        let flags = Flags::default();
        assert!(!flags.equal && !flags.less && !flags.greater);
    }

    #[test]
    fn test_advance_pc_wraps() {
        let mut regs = Registers::new();
        regs.pc = 254;

        regs.advance_pc(3);
        assert_eq!(regs.pc, 1);
    }

    #[test]
    fn test_jump() {
        let mut regs = Registers::new();

        regs.jump(0x40);
        assert_eq!(regs.pc, 0x40);
    }
}
