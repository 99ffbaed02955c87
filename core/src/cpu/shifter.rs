//! Barrel shifter.
//!
//! The primitives return the shifted value and the carry-out, or `None` when
//! the shift leaves the carry flag untouched. Flag-setting and plain forms
//! compute the same value; only the flag-setting forms store the carry.

use super::Cpu;
use crate::bus::BusAccess;

#[inline]
fn bit(value: u32, n: u32) -> bool { (value >> n) & 1 != 0 }

/// LSL #amount. An encoded 0 is a plain move.
pub fn lsl_imm(value: u32, amount: u32) -> (u32, Option<bool>) {
    if amount == 0 {
        (value, None)
    } else {
        (value << amount, Some(bit(value, 32 - amount)))
    }
}

/// LSR #amount. An encoded 0 means LSR #32.
pub fn lsr_imm(value: u32, amount: u32) -> (u32, Option<bool>) {
    if amount == 0 {
        (0, Some(bit(value, 31)))
    } else {
        (value >> amount, Some(bit(value, amount - 1)))
    }
}

/// ASR #amount. An encoded 0 means ASR #32.
pub fn asr_imm(value: u32, amount: u32) -> (u32, Option<bool>) {
    if amount == 0 {
        (((value as i32) >> 31) as u32, Some(bit(value, 31)))
    } else {
        (((value as i32) >> amount) as u32, Some(bit(value, amount - 1)))
    }
}

/// ROR #amount. An encoded 0 is RRX through the incoming carry.
pub fn ror_imm(value: u32, amount: u32, carry_in: bool) -> (u32, Option<bool>) {
    if amount == 0 {
        (((carry_in as u32) << 31) | (value >> 1), Some(bit(value, 0)))
    } else {
        (value.rotate_right(amount), Some(bit(value, amount - 1)))
    }
}

/// LSL by the low byte of a register.
pub fn lsl_reg(value: u32, amount: u32) -> (u32, Option<bool>) {
    match amount {
        0 => (value, None),
        1..=31 => (value << amount, Some(bit(value, 32 - amount))),
        32 => (0, Some(bit(value, 0))),
        _ => (0, Some(false)),
    }
}

pub fn lsr_reg(value: u32, amount: u32) -> (u32, Option<bool>) {
    match amount {
        0 => (value, None),
        1..=31 => (value >> amount, Some(bit(value, amount - 1))),
        32 => (0, Some(bit(value, 31))),
        _ => (0, Some(false)),
    }
}

pub fn asr_reg(value: u32, amount: u32) -> (u32, Option<bool>) {
    match amount {
        0 => (value, None),
        1..=31 => (((value as i32) >> amount) as u32, Some(bit(value, amount - 1))),
        _ => (((value as i32) >> 31) as u32, Some(bit(value, 31))),
    }
}

pub fn ror_reg(value: u32, amount: u32) -> (u32, Option<bool>) {
    if amount == 0 {
        return (value, None);
    }
    match amount & 0x1F {
        0 => (value, Some(bit(value, 31))),
        rot => (value.rotate_right(rot), Some(bit(value, rot - 1))),
    }
}

/// 8-bit immediate rotated right by twice the rotate field.
pub fn rotated_imm(instr: u32) -> (u32, Option<bool>) {
    let rotate = (instr >> 7) & 0x1E;
    let value = (instr & 0xFF).rotate_right(rotate);
    if rotate > 0 { (value, Some(bit(value, 31))) } else { (value, None) }
}

impl Cpu {
    fn shift_by_immediate(&self, instr: u32) -> (u32, Option<bool>) {
        let rm = self.regs.read((instr & 0xF) as usize);
        let amount = (instr >> 7) & 0x1F;
        match (instr >> 5) & 3 {
            0 => lsl_imm(rm, amount),
            1 => lsr_imm(rm, amount),
            2 => asr_imm(rm, amount),
            _ => ror_imm(rm, amount, self.flags.c()),
        }
    }

    /// Rm is read before the extra internal cycle, Rs after it.
    fn shift_by_register<B: BusAccess>(&mut self, bus: &mut B, instr: u32) -> (u32, Option<bool>) {
        let rm = self.regs.read((instr & 0xF) as usize);
        bus.internal_cycle(self.regs.pc());
        let amount = self.regs.read(((instr >> 8) & 0xF) as usize) & 0xFF;
        match (instr >> 5) & 3 {
            0 => lsl_reg(rm, amount),
            1 => lsr_reg(rm, amount),
            2 => asr_reg(rm, amount),
            _ => ror_reg(rm, amount),
        }
    }

    fn store_shifter_carry(&mut self, carry: Option<bool>) {
        if let Some(c) = carry {
            self.flags.set_carry_bit(c);
        }
    }

    /// Immediate-shifted register or rotated immediate, carry untouched.
    pub(super) fn operand2(&self, instr: u32) -> u32 {
        if instr & 0x0200_0000 != 0 {
            rotated_imm(instr).0
        } else {
            self.shift_by_immediate(instr).0
        }
    }

    /// As `operand2`, storing the shifter carry-out.
    pub(super) fn operand2_s(&mut self, instr: u32) -> u32 {
        let (value, carry) = if instr & 0x0200_0000 != 0 {
            rotated_imm(instr)
        } else {
            self.shift_by_immediate(instr)
        };
        self.store_shifter_carry(carry);
        value
    }

    /// Register-shifted register, carry untouched.
    pub(super) fn operand2_reg<B: BusAccess>(&mut self, bus: &mut B, instr: u32) -> u32 {
        self.shift_by_register(bus, instr).0
    }

    pub(super) fn operand2_reg_s<B: BusAccess>(&mut self, bus: &mut B, instr: u32) -> u32 {
        let (value, carry) = self.shift_by_register(bus, instr);
        self.store_shifter_carry(carry);
        value
    }

    /// Scaled register offset of a word/byte transfer.
    pub(super) fn shifted_offset(&self, instr: u32) -> u32 {
        self.shift_by_immediate(instr).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifter_lsl_immediate_edges() {
        assert_eq!(lsl_imm(0x1234_5678, 0), (0x1234_5678, None));
        assert_eq!(lsl_imm(0x8000_0001, 1), (0x0000_0002, Some(true)));
        assert_eq!(lsl_imm(0x0000_0001, 31), (0x8000_0000, Some(false)));
        assert_eq!(lsl_imm(0x0000_0003, 31), (0x8000_0000, Some(true)));
    }

    #[test]
    fn shifter_lsr_asr_immediate_zero_means_32() {
        assert_eq!(lsr_imm(0x8000_0000, 0), (0, Some(true)));
        assert_eq!(lsr_imm(0x7FFF_FFFF, 0), (0, Some(false)));
        assert_eq!(lsr_imm(0x0000_0003, 1), (1, Some(true)));
        assert_eq!(asr_imm(0x8000_0000, 0), (0xFFFF_FFFF, Some(true)));
        assert_eq!(asr_imm(0x4000_0000, 0), (0, Some(false)));
        assert_eq!(asr_imm(0x8000_0000, 4), (0xF800_0000, Some(false)));
    }

    #[test]
    fn shifter_ror_immediate_and_rrx() {
        assert_eq!(ror_imm(0x0000_0001, 1, false), (0x8000_0000, Some(true)));
        assert_eq!(ror_imm(0x0000_00F0, 4, false), (0x0000_000F, Some(false)));
        assert_eq!(ror_imm(0x0000_0003, 0, true), (0x8000_0001, Some(true)));
        assert_eq!(ror_imm(0x0000_0002, 0, false), (0x0000_0001, Some(false)));
    }

    #[test]
    fn register_shift_boundary_law() {
        let v = 0x8000_0001;
        let cases: [(u32, (u32, Option<bool>), (u32, Option<bool>), (u32, Option<bool>)); 6] = [
            (0, (v, None), (v, None), (v, None)),
            (1, (0x0000_0002, Some(true)), (0x4000_0000, Some(true)), (0xC000_0000, Some(true))),
            (31, (0x8000_0000, Some(false)), (0x0000_0001, Some(false)), (0xFFFF_FFFF, Some(false))),
            (32, (0, Some(true)), (0, Some(true)), (0xFFFF_FFFF, Some(true))),
            (33, (0, Some(false)), (0, Some(false)), (0xFFFF_FFFF, Some(true))),
            (255, (0, Some(false)), (0, Some(false)), (0xFFFF_FFFF, Some(true))),
        ];
        for (amount, lsl, lsr, asr) in cases {
            assert_eq!(lsl_reg(v, amount), lsl, "lsl {amount}");
            assert_eq!(lsr_reg(v, amount), lsr, "lsr {amount}");
            assert_eq!(asr_reg(v, amount), asr, "asr {amount}");
        }

        // positive operand fills with zeros
        assert_eq!(asr_reg(0x7FFF_FFFF, 32), (0, Some(false)));
        assert_eq!(lsr_reg(0x7FFF_FFFF, 32), (0, Some(false)));
        assert_eq!(lsl_reg(0x0000_0002, 32), (0, Some(false)));
    }

    #[test]
    fn register_rotate_multiples_of_32() {
        assert_eq!(ror_reg(0x8000_0001, 0), (0x8000_0001, None));
        assert_eq!(ror_reg(0x8000_0001, 32), (0x8000_0001, Some(true)));
        assert_eq!(ror_reg(0x0000_0001, 64), (0x0000_0001, Some(false)));
        assert_eq!(ror_reg(0x0000_0001, 33), (0x8000_0000, Some(true)));
        assert_eq!(ror_reg(0x0000_0010, 4), (0x0000_0001, Some(false)));
    }

    #[test]
    fn rotated_immediate_carry_only_when_rotated() {
        // #0xFF, rotate 0
        assert_eq!(rotated_imm(0xFF), (0xFF, None));
        // #0x02 ror 2 -> 0x8000_0000
        assert_eq!(rotated_imm((1 << 8) | 0x02), (0x8000_0000, Some(true)));
        // #0x01 ror 8
        assert_eq!(rotated_imm((4 << 8) | 0x01), (0x0100_0000, Some(false)));
    }
}
